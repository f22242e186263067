//! Emporium Core - Shared domain types.
//!
//! This crate provides the types shared by every Emporium component:
//! - `api` - REST backend (`/api/v1`)
//! - `cli` - Command-line tools for migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure business rules - no I/O, no
//! database access, no HTTP clients. Rules that do not need storage (order
//! status transitions, role permissions, slug and money validation) live here
//! so they can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, slugs, money, roles and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
