//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! - **Money**: integer minor-unit amount with its currency

mod money;

pub use money::*;
