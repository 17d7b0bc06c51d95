//! # Domain Layer
//!
//! The domain layer contains the core business logic of the cinema server.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (Movie, Showtime, Booking, Payment, etc.)
//! - **value_objects**: Immutable value types (Money)
//! - **services**: Pure business rules and ports to external systems
//! - **unit_of_work**: Transaction contracts for multi-row writes
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Entities encapsulate status transitions

pub mod entities;
pub mod services;
pub mod unit_of_work;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use unit_of_work::{TransactionScope, UnitOfWork};
pub use value_objects::*;
