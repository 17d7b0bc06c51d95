//! # Cinema Server Library
//!
//! Booking backend for a cinema chain:
//! - Movie catalog, branches, halls and showtimes
//! - Seat holds that expire on their own
//! - Card payments through Stripe (or a mock provider) and ticket issuance
//! - Admin back office and sales dashboard
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Entities, status rules, repository traits and ports
//! - **Application Layer**: Services, DTOs and background jobs
//! - **Infrastructure Layer**: PostgreSQL, Redis, payment and email adapters
//! - **Presentation Layer**: HTTP handlers and middleware
//!
//! ## Module Structure
//!
//! ```text
//! cinema_server/
//! +-- config/         Configuration management
//! +-- domain/         Entities, value objects, traits and pure rules
//! +-- application/    Services, DTOs and the hold sweeper
//! +-- infrastructure/ Database, cache, payments, email, metrics
//! +-- presentation/   HTTP routes, handlers and middleware
//! +-- shared/         Errors, pagination, validation, snowflake IDs
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
