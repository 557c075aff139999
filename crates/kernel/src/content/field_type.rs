//! Scalar field types.
//!
//! A [`FieldType`] knows how to present itself as a form widget, how to turn
//! a submission into the raw string stored on a value row, and how to turn
//! that raw string back into a [`DisplayValue`] for templates.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

use super::type_registry::TypeRegistry;
use crate::file;
use crate::form::{FormElement, Submission, UploadedFile};

/// Admin endpoint listing reference candidates.
pub const LOOKUP_URL: &str = "/admin/cms/rawid";

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_INPUTS: &[&str] = &[
    DATETIME_FORMAT,
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// The codec family a type name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Text,
    RichText,
    Option,
    Flag,
    Image,
    Date,
    DateTime,
    Reference,
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// One line of text.
    Text,
    /// HTML edited in a rich text widget.
    RichText,
    /// One of a fixed set of `(value, label)` choices.
    Option { choices: Vec<(String, String)> },
    Flag,
    /// Stored as a file storage key.
    Image,
    Date,
    DateTime,
    /// Id of an entity resolved through a registered lookup.
    Reference { kind: String },
}

/// A value ready to be written to a value row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRaw {
    Text(String),
    /// Bytes still to be stored; the row gets the resulting key.
    Upload(UploadedFile),
}

/// Image attributes exposed to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub key: String,
    pub name: String,
    pub url: String,
}

/// A coerced value for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DisplayValue {
    Empty,
    Text(String),
    Flag(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Image(ImageRef),
    Entity(Value),
}

impl DisplayValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DisplayValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DisplayValue::Empty => true,
            DisplayValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// Checkbox semantics: empty and the usual "no" spellings are false.
pub fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "f" | "false" | "off" | "no"
    )
}

pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_INPUTS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

impl FieldType {
    pub fn option<I, V, L>(choices: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<String>,
        L: Into<String>,
    {
        FieldType::Option {
            choices: choices
                .into_iter()
                .map(|(v, l)| (v.into(), l.into()))
                .collect(),
        }
    }

    pub fn reference(kind: impl Into<String>) -> Self {
        FieldType::Reference { kind: kind.into() }
    }

    /// Name persisted on value rows.
    pub fn type_name(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::RichText => "richtext",
            FieldType::Option { .. } => "option",
            FieldType::Flag => "flag",
            FieldType::Image => "image",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Reference { kind } => kind,
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            FieldType::Text => TypeKind::Text,
            FieldType::RichText => TypeKind::RichText,
            FieldType::Option { .. } => TypeKind::Option,
            FieldType::Flag => TypeKind::Flag,
            FieldType::Image => TypeKind::Image,
            FieldType::Date => TypeKind::Date,
            FieldType::DateTime => TypeKind::DateTime,
            FieldType::Reference { .. } => TypeKind::Reference,
        }
    }

    /// Edit widget labelled `label`.
    pub fn form_element(&self, label: &str) -> FormElement {
        let element = match self {
            FieldType::Text => FormElement::textfield(),
            FieldType::RichText => FormElement::textarea(10).class("richtext"),
            FieldType::Option { choices } => {
                let mut options = vec![(String::new(), "---------".to_string())];
                options.extend(choices.iter().cloned());
                FormElement::select(options)
            }
            FieldType::Flag => FormElement::checkbox(),
            FieldType::Image => FormElement::file().class("image"),
            FieldType::Date => FormElement::date().placeholder("YYYY-MM-DD"),
            FieldType::DateTime => FormElement::datetime().placeholder("YYYY-MM-DD HH:MM:SS"),
            FieldType::Reference { kind } => FormElement::textfield()
                .class("raw-id")
                .lookup_url(format!("{LOOKUP_URL}?type={}", urlencoding::encode(kind))),
        };
        element.title(label)
    }

    /// Current value as the edit widget expects it.
    pub fn form_value(&self, raw: Option<&str>) -> Value {
        let raw = raw.unwrap_or_default();
        match self {
            FieldType::Flag => Value::Bool(parse_flag(raw)),
            FieldType::DateTime => Value::String(raw.replacen(' ', "T", 1)),
            _ => Value::String(raw.to_string()),
        }
    }

    /// Coerce a stored raw string for display.
    pub fn display(&self, raw: Option<&str>, registry: &TypeRegistry) -> DisplayValue {
        let Some(raw) = raw else {
            return match self {
                FieldType::Flag => DisplayValue::Flag(false),
                _ => DisplayValue::Empty,
            };
        };
        match self {
            FieldType::Text | FieldType::RichText | FieldType::Option { .. } => {
                DisplayValue::Text(raw.to_string())
            }
            FieldType::Flag => DisplayValue::Flag(parse_flag(raw)),
            FieldType::Date if raw.is_empty() => DisplayValue::Empty,
            FieldType::Date => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
                .map(DisplayValue::Date)
                .unwrap_or_else(|_| DisplayValue::Text(raw.to_string())),
            FieldType::DateTime if raw.is_empty() => DisplayValue::Empty,
            FieldType::DateTime => parse_datetime(raw)
                .map(DisplayValue::DateTime)
                .unwrap_or_else(|| DisplayValue::Text(raw.to_string())),
            FieldType::Image if raw.is_empty() => DisplayValue::Empty,
            FieldType::Image => DisplayValue::Image(ImageRef {
                key: raw.to_string(),
                name: file::file_name_of(raw).to_string(),
                url: registry.files().public_url(raw),
            }),
            FieldType::Reference { .. } if raw.is_empty() => DisplayValue::Empty,
            FieldType::Reference { kind } => registry
                .lookup(kind)
                .and_then(|lookup| lookup.resolve(raw))
                .map(DisplayValue::Entity)
                .unwrap_or(DisplayValue::Empty),
        }
    }

    /// Coerce the submitted value for `name`.
    ///
    /// `Ok(None)` means nothing should be written: the field was not part of
    /// the submission, or an image field received no new upload.
    pub fn to_database(
        &self,
        name: &str,
        submission: &Submission,
        registry: &TypeRegistry,
    ) -> Result<Option<PendingRaw>, String> {
        if let FieldType::Image = self {
            return match submission.file(name) {
                None => Ok(None),
                Some(upload) if file::is_image(&upload.data) => {
                    Ok(Some(PendingRaw::Upload(upload.clone())))
                }
                Some(_) => Err("Upload a valid image. The file you uploaded was either not an \
                                image or a corrupted image."
                    .to_string()),
            };
        }
        if let FieldType::Flag = self {
            let checked = submission.field(name).is_some_and(parse_flag);
            return Ok(Some(PendingRaw::Text(checked.to_string())));
        }

        let Some(value) = submission.field(name) else {
            return Ok(None);
        };
        let value = value.trim();
        let raw = match self {
            FieldType::Text | FieldType::RichText => value.to_string(),
            FieldType::Option { choices } => {
                if !value.is_empty() && !choices.iter().any(|(v, _)| v == value) {
                    return Err(format!(
                        "Select a valid choice. {value} is not one of the available choices."
                    ));
                }
                value.to_string()
            }
            FieldType::Date if value.is_empty() => String::new(),
            FieldType::Date => NaiveDate::parse_from_str(value, DATE_FORMAT)
                .map(|d| d.format(DATE_FORMAT).to_string())
                .map_err(|_| "Enter a valid date.".to_string())?,
            FieldType::DateTime if value.is_empty() => String::new(),
            FieldType::DateTime => parse_datetime(value)
                .map(|d| d.format(DATETIME_FORMAT).to_string())
                .ok_or_else(|| "Enter a valid date/time.".to_string())?,
            FieldType::Reference { kind } => {
                if !value.is_empty() {
                    let found = registry
                        .lookup(kind)
                        .is_some_and(|lookup| lookup.resolve(value).is_some());
                    if !found {
                        return Err("Select a valid choice. That choice is not one of the \
                                    available choices."
                            .to_string());
                    }
                }
                value.to_string()
            }
            FieldType::Flag | FieldType::Image => return Ok(None),
        };
        Ok(Some(PendingRaw::Text(raw)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::content::{StaticLookup, TypeRegistry};
    use crate::file::MemoryFileStorage;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new(Arc::new(MemoryFileStorage::new("/files")));
        registry
            .register_reference(
                "author",
                "Author",
                Arc::new(StaticLookup::new().with_entry(
                    "7",
                    "Ada",
                    serde_json::json!({"id": "7", "name": "Ada"}),
                )),
            )
            .unwrap();
        registry
    }

    fn text(raw: &str) -> PendingRaw {
        PendingRaw::Text(raw.to_string())
    }

    #[test]
    fn option_rejects_unknown_choices() {
        let ty = FieldType::option([("a", "Alpha"), ("b", "Beta")]);
        let reg = registry();
        let ok = Submission::new().with_field("c", "b");
        assert_eq!(ty.to_database("c", &ok, &reg), Ok(Some(text("b"))));
        let bad = Submission::new().with_field("c", "z");
        assert!(ty.to_database("c", &bad, &reg).is_err());
        let blank = Submission::new().with_field("c", "");
        assert_eq!(ty.to_database("c", &blank, &reg), Ok(Some(text(""))));
    }

    #[test]
    fn flags_follow_checkbox_semantics() {
        let reg = registry();
        let absent = Submission::new();
        assert_eq!(FieldType::Flag.to_database("f", &absent, &reg), Ok(Some(text("false"))));
        let on = Submission::new().with_field("f", "on");
        assert_eq!(FieldType::Flag.to_database("f", &on, &reg), Ok(Some(text("true"))));
        assert!(parse_flag("t"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("False"));
        assert_eq!(
            FieldType::Flag.display(Some("true"), &reg),
            DisplayValue::Flag(true)
        );
        assert_eq!(FieldType::Flag.display(None, &reg), DisplayValue::Flag(false));
    }

    #[test]
    fn dates_are_normalized() {
        let reg = registry();
        let sub = Submission::new()
            .with_field("d", "2026-01-05")
            .with_field("dt", "2026-01-05T10:30");
        assert_eq!(FieldType::Date.to_database("d", &sub, &reg), Ok(Some(text("2026-01-05"))));
        assert_eq!(
            FieldType::DateTime.to_database("dt", &sub, &reg),
            Ok(Some(text("2026-01-05 10:30:00")))
        );
        let bad = Submission::new().with_field("d", "05/01/2026");
        assert_eq!(
            FieldType::Date.to_database("d", &bad, &reg),
            Err("Enter a valid date.".to_string())
        );
        assert_eq!(
            FieldType::Date.display(Some("2026-01-05"), &reg),
            DisplayValue::Date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())
        );
    }

    #[test]
    fn absent_text_is_skipped() {
        let reg = registry();
        assert_eq!(FieldType::Text.to_database("t", &Submission::new(), &reg), Ok(None));
    }

    #[test]
    fn images_require_image_bytes() {
        let reg = registry();
        let none = Submission::new();
        assert_eq!(FieldType::Image.to_database("i", &none, &reg), Ok(None));

        let png = UploadedFile::new("a.png", folio_test_utils::TINY_PNG.to_vec());
        let good = Submission::new().with_file("i", png.clone());
        assert_eq!(
            FieldType::Image.to_database("i", &good, &reg),
            Ok(Some(PendingRaw::Upload(png)))
        );

        let bad = Submission::new().with_file("i", UploadedFile::new("a.png", b"text".to_vec()));
        assert!(FieldType::Image.to_database("i", &bad, &reg).is_err());
    }

    #[test]
    fn image_display_exposes_url() {
        let reg = registry();
        match FieldType::Image.display(Some("cms/image/a.png"), &reg) {
            DisplayValue::Image(img) => {
                assert_eq!(img.name, "a.png");
                assert_eq!(img.url, "/files/cms/image/a.png");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(FieldType::Image.display(Some(""), &reg), DisplayValue::Empty);
    }

    #[test]
    fn references_resolve_through_lookup() {
        let reg = registry();
        let ty = FieldType::reference("author");
        assert_eq!(ty.type_name(), "author");
        match ty.display(Some("7"), &reg) {
            DisplayValue::Entity(v) => assert_eq!(v["name"], "Ada"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ty.display(Some("8"), &reg), DisplayValue::Empty);
        let bad = Submission::new().with_field("a", "8");
        assert!(ty.to_database("a", &bad, &reg).is_err());
        let el = ty.form_element("Author");
        assert_eq!(el.lookup_url.as_deref(), Some("/admin/cms/rawid?type=author"));
    }

    #[test]
    fn widgets_match_types() {
        let el = FieldType::option([("a", "A")]).form_element("Choice");
        match el.element_type {
            crate::form::ElementType::Select { options } => {
                assert_eq!(options.len(), 2);
                assert_eq!(options[0].0, "");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(FieldType::Flag.form_value(Some("true")), Value::Bool(true));
        assert_eq!(
            FieldType::DateTime.form_value(Some("2026-01-05 10:30:00")),
            Value::from("2026-01-05T10:30:00")
        );
    }

    #[test]
    fn display_values_serialize_plainly() {
        assert_eq!(serde_json::to_value(DisplayValue::Empty).unwrap(), Value::Null);
        assert_eq!(
            serde_json::to_value(DisplayValue::Text("hi".into())).unwrap(),
            Value::from("hi")
        );
        assert_eq!(
            serde_json::to_value(DisplayValue::Date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()))
                .unwrap(),
            Value::from("2026-01-05")
        );
    }
}
