//! Kernel services.
//!
//! Services own the multi-step operations behind the admin routes and the
//! CLI. Handlers stay thin and call into these.

pub mod audit;
pub mod page;

pub use audit::{AuditAction, AuditEntry, AuditService};
pub use page::{NewPage, PageList, PageService, PageSettings, PageUpdate, SectionStatus};
