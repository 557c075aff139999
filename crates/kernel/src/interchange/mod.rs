//! Portable XML page documents.
//!
//! ```xml
//! <cms-page version="1">
//! <page path="/about/" template="static" locale="">
//!   <description>About us</description>
//!   <search_image file_name="cms/image/2026/10/16/a1b2c3d4_team.png">iVBORw0...</search_image>
//! </page>
//! <value name="heading/text" type="text">Hello</value>
//! <value name="image/image" type="image" file_name="cms/image/...">iVBORw0...</value>
//! </cms-page>
//! ```
//!
//! Leaf text is written verbatim (escaped), so values survive a round trip
//! byte for byte. Image payloads are base64; `file_name` is the storage key
//! they were exported from.

use std::collections::HashMap;
use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::content::XmlValue;
use crate::models::PageMeta;

pub const ROOT: &str = "cms-page";
pub const FORMAT_VERSION: &str = "1";

/// Interchange parse and write failures.
#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed XML attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("malformed XML encoding: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    #[error("failed to write XML: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Invalid(String),
}

/// One exported value row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    pub name: String,
    pub type_name: String,
    pub value: XmlValue,
}

/// A page in interchange form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageDocument {
    pub path: String,
    pub template: String,
    pub locale: String,
    pub meta: PageMeta,
    pub search_image: Option<XmlValue>,
    pub values: Vec<ValueRecord>,
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn write_leaf(
    writer: &mut XmlWriter,
    tag: &str,
    attrs: &[(&str, &str)],
    text: &str,
) -> Result<(), InterchangeError> {
    let mut elem = BytesStart::new(tag);
    for attr in attrs {
        elem.push_attribute(*attr);
    }
    if text.is_empty() {
        writer.write_event(Event::Empty(elem))?;
    } else {
        writer.write_event(Event::Start(elem))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(BytesEnd::new(tag)))?;
    }
    Ok(())
}

fn newline(writer: &mut XmlWriter, indent: &str) -> Result<(), InterchangeError> {
    writer.write_event(Event::Text(BytesText::new(&format!("\n{indent}"))))?;
    Ok(())
}

/// Serialize a page document.
pub fn to_xml(doc: &PageDocument) -> Result<String, InterchangeError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut root = BytesStart::new(ROOT);
    root.push_attribute(("version", FORMAT_VERSION));
    writer.write_event(Event::Start(root))?;
    newline(&mut writer, "")?;

    let mut page = BytesStart::new("page");
    page.push_attribute(("path", doc.path.as_str()));
    page.push_attribute(("template", doc.template.as_str()));
    page.push_attribute(("locale", doc.locale.as_str()));
    writer.write_event(Event::Start(page))?;

    let meta = [
        ("description", &doc.meta.description),
        ("meta_title", &doc.meta.meta_title),
        ("meta_description", &doc.meta.meta_description),
        ("meta_keywords", &doc.meta.meta_keywords),
        ("search_text", &doc.meta.search_text),
    ];
    for (tag, text) in meta {
        newline(&mut writer, "  ")?;
        write_leaf(&mut writer, tag, &[], text)?;
    }
    if let Some(image) = &doc.search_image {
        newline(&mut writer, "  ")?;
        let attrs: Vec<(&str, &str)> = image
            .file_name
            .as_deref()
            .map(|name| ("file_name", name))
            .into_iter()
            .collect();
        write_leaf(&mut writer, "search_image", &attrs, &image.value)?;
    }
    newline(&mut writer, "")?;
    writer.write_event(Event::End(BytesEnd::new("page")))?;

    for record in &doc.values {
        newline(&mut writer, "")?;
        let mut attrs = vec![
            ("name", record.name.as_str()),
            ("type", record.type_name.as_str()),
        ];
        if let Some(file_name) = &record.value.file_name {
            attrs.push(("file_name", file_name.as_str()));
        }
        write_leaf(&mut writer, "value", &attrs, &record.value.value)?;
    }

    newline(&mut writer, "")?;
    writer.write_event(Event::End(BytesEnd::new(ROOT)))?;
    newline(&mut writer, "")?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| InterchangeError::Invalid(e.to_string()))
}

#[derive(Debug, Default)]
struct XmlNode {
    tag: String,
    attrs: HashMap<String, String>,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    fn child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    fn child_text(&self, tag: &str) -> String {
        self.child(tag).map(|c| c.text.clone()).unwrap_or_default()
    }
}

fn start_node(reader: &Reader<&[u8]>, elem: &BytesStart<'_>) -> Result<XmlNode, InterchangeError> {
    let tag = reader.decoder().decode(elem.name().as_ref())?.into_owned();
    let mut attrs = HashMap::new();
    for attr in elem.attributes() {
        let attr = attr?;
        let key = reader.decoder().decode(attr.key.as_ref())?.into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.insert(key, value);
    }
    Ok(XmlNode {
        tag,
        attrs,
        ..XmlNode::default()
    })
}

fn resolve_entity(entity: &str) -> Option<String> {
    let named = match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    };
    if let Some(ch) = named {
        return Some(ch.to_string());
    }
    let code = entity.strip_prefix('#')?;
    let code = match code.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => code.parse().ok()?,
    };
    char::from_u32(code).map(String::from)
}

fn parse_tree(xml: &str) -> Result<XmlNode, InterchangeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event()? {
            Event::Start(elem) => stack.push(start_node(&reader, &elem)?),
            Event::Empty(elem) => {
                let node = start_node(&reader, &elem)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| InterchangeError::Invalid("unbalanced end tag".into()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Text(text) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&reader.decoder().decode(&text)?);
                }
            }
            Event::GeneralRef(entity) => {
                let name = reader.decoder().decode(&entity)?.into_owned();
                let resolved = resolve_entity(&name)
                    .ok_or_else(|| InterchangeError::Invalid(format!("unknown entity &{name};")))?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&resolved);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(InterchangeError::Invalid("unexpected end of document".into()));
    }
    root.ok_or_else(|| InterchangeError::Invalid("empty document".into()))
}

fn xml_value(node: &XmlNode) -> XmlValue {
    XmlValue {
        value: node.text.clone(),
        file_name: node.attr("file_name").map(str::to_string),
    }
}

/// Parse a page document. Only the shape is checked here; template and
/// path rules are applied by the caller.
pub fn from_xml(xml: &str) -> Result<PageDocument, InterchangeError> {
    let root = parse_tree(xml)?;
    if root.tag != ROOT {
        return Err(InterchangeError::Invalid(format!(
            "root element must be <{ROOT}>, found <{}>",
            root.tag
        )));
    }
    let page = root
        .child("page")
        .ok_or_else(|| InterchangeError::Invalid("missing <page> element".into()))?;

    let mut values = Vec::new();
    for node in root.children.iter().filter(|c| c.tag == "value") {
        let name = node
            .attr("name")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| InterchangeError::Invalid("<value> without a name".into()))?;
        let type_name = node
            .attr("type")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| InterchangeError::Invalid(format!("value `{name}` has no type")))?;
        values.push(ValueRecord {
            name: name.to_string(),
            type_name: type_name.to_string(),
            value: xml_value(node),
        });
    }

    Ok(PageDocument {
        path: page.attr("path").unwrap_or_default().to_string(),
        template: page.attr("template").unwrap_or_default().to_string(),
        locale: page.attr("locale").unwrap_or_default().to_string(),
        meta: PageMeta {
            description: page.child_text("description"),
            meta_title: page.child_text("meta_title"),
            meta_description: page.child_text("meta_description"),
            meta_keywords: page.child_text("meta_keywords"),
            search_text: page.child_text("search_text"),
        },
        search_image: page
            .child("search_image")
            .map(xml_value)
            .filter(|v| !v.value.is_empty()),
        values,
    })
}

/// Download file name for an exported page: the slugified path, or
/// `homepage` for `/`.
pub fn export_file_name(path: &str) -> String {
    let slug: String = path
        .trim_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "homepage.xml".to_string()
    } else {
        format!("{slug}.xml")
    }
}
