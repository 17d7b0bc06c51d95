//! Shared Utilities
//!
//! Common utilities used across all layers.

pub mod codes;
pub mod error;
pub mod pagination;
pub mod snowflake;
pub mod validation;
