//! Core types for Cyclemart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod status;

pub use id::*;
pub use money::{MoneyError, decimal_places, round_to_cents, to_minor_units};
pub use status::*;
