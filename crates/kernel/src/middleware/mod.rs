//! HTTP middleware components.
//!
//! Admin authentication and front-end page resolution.

pub mod admin_auth;
pub mod cms_page;

pub use admin_auth::{ADMIN_ACTOR, authenticate_admin};
pub use cms_page::resolve_cms_page;
