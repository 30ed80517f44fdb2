//! Cyclemart Core - Shared domain types and marketplace rules.
//!
//! This crate provides the types and pure business rules used by the
//! Cyclemart components:
//! - `server` - JSON API for listings, stores, offers, checkout and support
//! - `cli` - Command-line tools for migrations and taxonomy management
//!
//! # Architecture
//!
//! The core crate contains only types and deterministic functions - no I/O, no
//! database access, no HTTP clients. Handlers fetch rows, call into these
//! modules, and persist whatever they decide.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money helpers and status enums
//! - [`similarity`] - Weighted similar-products scoring
//! - [`images`] - Image curation state machine and JSONB/table reconciliation
//! - [`offers`] - Offer / counter-offer negotiation rules
//! - [`delivery`] - Store delivery fee quotes
//! - [`support`] - Support ticket wizard validation and status flow

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod delivery;
pub mod images;
pub mod offers;
pub mod similarity;
pub mod support;
pub mod types;

pub use types::*;
