#![warn(missing_docs)]
//! Community cache node server.
//!
//! Wires the [`outpost`] fetch pipeline, registration agent, and latency
//! probe into an axum application. Everything is configured through
//! environment variables; see [`config::Config::from_env`] for the full
//! list and defaults.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod upstream;
