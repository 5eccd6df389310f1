//! Voice query API: library crate for the resolver HTTP server.
//!
//! Exposes the router and state so the binary and `vq-e2e-tests` can build
//! the same application.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
