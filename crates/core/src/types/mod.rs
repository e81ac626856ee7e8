//! Core types for COA Bridge.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod coa;
pub mod credential;
pub mod shop;

pub use coa::{CoaDate, CoaFields, CoaRecord, DatedCoa, sort_newest_first};
pub use credential::{AccessToken, ShopCredential};
pub use shop::{ShopDomain, ShopDomainError};
