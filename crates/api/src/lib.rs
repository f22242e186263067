//! Emporium REST backend.
//!
//! The binary in `main.rs` wires configuration, telemetry and the server
//! around [`routes::router`]; everything else lives here so it can be
//! exercised from tests and the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod import;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod scraper;
pub mod search;
pub mod services;
pub mod state;
