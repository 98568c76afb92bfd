//! Podforge Core - Shared domain types.
//!
//! This crate provides the types shared by every Podforge component:
//! - `client` - Query cache, mutations, polling and integration state
//! - `cli` - Command-line front end for operators
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no async. It mirrors the REST contract of the product service so
//! that both the HTTP gateway and test doubles speak the same language.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, statuses, shop domains, credentials and
//!   the server-owned records (templates, assets, drafts, integrations)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
