//! Page schema engine.
//!
//! Page templates declare sections; each section holds a field-set tree
//! whose leaves are typed fields. Trees load flat value rows, build edit
//! form descriptors, validate submissions into rows to write, report how
//! much of the page is filled in, and produce render contexts.

mod field_type;
mod fieldset;
pub mod loader;
pub mod naming;
mod template;
mod type_registry;

use thiserror::Error;

pub use field_type::{
    DATE_FORMAT, DATETIME_FORMAT, DisplayValue, FieldType, ImageRef, LOOKUP_URL, PendingRaw,
    TypeKind, parse_flag,
};
pub use fieldset::{
    FieldSet, GROUP_FORM, PendingValue, SEVERAL_FORM, SeveralItem, VALUE_FORM,
};
pub use template::{PageTemplate, Section, TemplateChoiceGroup, TemplateRegistry};
pub use type_registry::{
    ReferenceEntry, ReferenceLookup, StaticLookup, TypeEntry, TypeRegistry, XmlValue,
};

/// Schema definition and addressing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("no form template selector for `{0}`")]
    MissingFormTemplate(String),

    #[error("a single field set takes exactly one field, got {0}")]
    SingleFieldCount(usize),

    #[error("no field set at `{0}`")]
    UnknownNode(String),

    #[error("unknown page template `{0}`")]
    UnknownTemplate(String),

    #[error("unknown field type `{0}`")]
    UnknownFieldType(String),

    #[error("type `{0}` is already registered")]
    DuplicateType(String),

    #[error("list position `{0}` is not a number")]
    InvalidPosition(String),

    #[error("`{0}` is declared twice")]
    DuplicateName(String),

    #[error("invalid page template {path}: {message}")]
    Definition { path: String, message: String },
}
