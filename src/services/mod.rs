//! Business logic services.
//!
//! Services contain core logic separated from HTTP handlers: account and
//! session management, the generic admin CRUD layer, and transactional
//! mail delivery.

pub mod admin_service;
pub mod auth_service;
pub mod mail_service;
