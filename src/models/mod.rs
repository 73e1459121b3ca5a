//! Data models representing database entities.
//!
//! Row structs derive `sqlx::FromRow` and are decoded from the data-access
//! layer's key-addressable rows; request/response types live next to the
//! entity they describe.

/// Circuit listings
pub mod circuit;
/// Constructor (team) listings
pub mod constructor;
/// Driver listings
pub mod driver;
/// Race and per-race result rows
pub mod race;
/// User account and session types
pub mod user;
