//! Remote implementation of the core `DataBackend` trait.
//!
//! Speaks a PostgREST-style REST surface (`/rest/v1/{table}` with column
//! filters and `Prefer: return=representation`) over reqwest, and backs
//! `subscribe` with a polling change feed since the transport offers no
//! push channel.

pub mod client;
pub mod error;

pub use client::{RemoteBackend, RemoteConfig};
