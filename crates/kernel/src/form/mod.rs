//! Edit forms for page sections.
//!
//! Field types describe their widgets, field-set nodes assemble them into
//! nested [`FormDescriptor`]s, and submissions come back as a
//! [`Submission`]. AJAX saves are answered with an [`AjaxStatus`].

pub mod ajax;
mod descriptor;
mod submission;
mod types;

pub use ajax::{AjaxFieldError, AjaxOutcome, AjaxStatus};
pub use descriptor::{FormBody, FormDescriptor, FormField, SeveralRow};
pub use submission::{Submission, UploadedFile};
pub use types::{ElementType, FormElement};
