//! Core types for Emporium.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod role;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Adjustment, Money, MoneyError};
pub use role::Role;
pub use slug::{Slug, SlugError};
pub use status::*;
