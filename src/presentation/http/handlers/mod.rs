//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints. Each module builds the
//! service it needs from `AppState` per request.

pub mod auth;
pub mod booking;
pub mod branch;
pub mod dashboard;
pub mod genre;
pub mod hall;
pub mod health;
pub mod movie;
pub mod payment;
pub mod showtime;
pub mod ticket;
pub mod user;
