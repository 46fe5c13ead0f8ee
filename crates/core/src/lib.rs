//! Core domain logic for the TaskFlow client: categories, todos, the dense
//! position-ordering rules that drive drag-and-drop, the in-memory entity
//! store, and the live sync bridge that reconciles it with the remote
//! backend.

pub mod auth;
pub mod backend;
pub mod categories;
pub mod errors;
pub mod ordering;
pub mod store;
pub mod sync;
pub mod todos;

pub use errors::{Result, StoreError};
