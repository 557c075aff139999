//! Form element types.
//!
//! Field types describe their edit widget as a [`FormElement`]; templates
//! switch on the serialized `type` tag to pick the HTML input.

use serde::{Deserialize, Serialize};

/// A single input widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormElement {
    /// Element type with type-specific configuration.
    #[serde(flatten)]
    pub element_type: ElementType,

    /// Element title/label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Placeholder text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Extra CSS class for the widget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    /// Endpoint the widget can query for suggestions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_url: Option<String>,
}

impl FormElement {
    /// Create a textfield element.
    pub fn textfield() -> Self {
        Self::new(ElementType::Textfield)
    }

    /// Create a textarea element.
    pub fn textarea(rows: u32) -> Self {
        Self::new(ElementType::Textarea { rows })
    }

    /// Create a select element.
    pub fn select(options: Vec<(String, String)>) -> Self {
        Self::new(ElementType::Select { options })
    }

    /// Create a checkbox element.
    pub fn checkbox() -> Self {
        Self::new(ElementType::Checkbox)
    }

    /// Create a file upload field.
    pub fn file() -> Self {
        Self::new(ElementType::File)
    }

    /// Create a date picker.
    pub fn date() -> Self {
        Self::new(ElementType::Date)
    }

    /// Create a date and time picker.
    pub fn datetime() -> Self {
        Self::new(ElementType::Datetime)
    }

    fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            title: None,
            placeholder: None,
            class: None,
            lookup_url: None,
        }
    }

    /// Set the element title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set placeholder text.
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Set the widget CSS class.
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Attach a lookup endpoint.
    pub fn lookup_url(mut self, url: impl Into<String>) -> Self {
        self.lookup_url = Some(url.into());
        self
    }
}

/// Element type variants with type-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementType {
    /// Single-line text input.
    Textfield,

    /// Multi-line text input.
    Textarea { rows: u32 },

    /// Dropdown select.
    Select { options: Vec<(String, String)> },

    /// Single checkbox.
    Checkbox,

    /// File upload.
    File,

    /// Date input.
    Date,

    /// Date and time input.
    Datetime,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let el = FormElement::select(vec![("a".into(), "A".into())])
            .title("Colour")
            .class("wide");
        assert_eq!(el.title.as_deref(), Some("Colour"));
        assert_eq!(el.class.as_deref(), Some("wide"));
        assert!(matches!(
            el.element_type,
            ElementType::Select { ref options } if options.len() == 1
        ));
    }

    #[test]
    fn serializes_only_what_templates_read() {
        let el = FormElement::textarea(10).title("Body");
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(json["type"], "textarea");
        assert_eq!(json["rows"], 10);
        assert_eq!(json["title"], "Body");
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 3, "unexpected keys {keys:?}");
    }

    #[test]
    fn lookup_widgets_carry_their_endpoint() {
        let json = serde_json::to_value(FormElement::textfield().lookup_url("/rawid?type=author"))
            .unwrap();
        assert_eq!(json["type"], "textfield");
        assert_eq!(json["lookup_url"], "/rawid?type=author");
    }
}
