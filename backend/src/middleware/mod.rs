//! Request middleware

pub mod auth;

pub use auth::{auth_middleware, require_admin, require_writer, AuthUser, CurrentUser, Role};
