//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Acquires a database handle, does its work, and closes the handle on
//!    every path
//! 3. Returns an HTTP response (JSON, status code)

/// Admin back-office CRUD endpoints
pub mod admin;
/// Account and session endpoints
pub mod auth;
/// Comparison/reporting endpoints
pub mod compare;
/// Service health endpoint
pub mod health;
/// Per-user data listings
pub mod user_data;
