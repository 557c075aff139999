//! Database models.

pub mod page;
pub mod path;
pub mod rendered;
pub mod value;

pub use page::{CreatePage, Page, PageFilter, PageMeta, PageState, PathEntry};
pub use path::CmsPath;
pub use rendered::Rendered;
pub use value::CmsValue;
