//! devfaq Shared Types and Utilities
//!
//! This crate contains the domain types and database helpers shared by the
//! devfaq API server and its tooling.

pub mod db;
pub mod types;

pub use db::*;
pub use types::*;
