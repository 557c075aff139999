//! Folio CMS Kernel Library
//!
//! Page schema engine, page lifecycle services, XML interchange and the
//! admin/front HTTP surface. The `folio` binary wraps this library.

pub mod cache;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod file;
pub mod form;
pub mod interchange;
pub mod middleware;
pub mod models;
pub mod permissions;
pub mod resolver;
pub mod routes;
pub mod services;
pub mod sitemap;
pub mod state;
pub mod theme;

pub use config::Config;
pub use error::{CmsError, CmsResult};
pub use state::AppState;
