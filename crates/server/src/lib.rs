//! Cyclemart marketplace API library.
//!
//! The binary in `main.rs` only wires configuration, telemetry and the
//! listener around [`routes::rate_limited_app`]; everything else lives here
//! so it can be exercised by the integration tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
