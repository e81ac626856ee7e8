//! COA Bridge Core - Shared types library.
//!
//! This crate provides common types used across all COA Bridge components:
//! - `server` - OAuth install flow and the COA listing API
//! - `cli` - Command-line tools for migrations and ad-hoc fetches
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Shop domains, credentials, and certificate-of-analysis records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
