//! Folio test utilities.
//!
//! Fixtures shared by the kernel's integration tests: image bytes that pass
//! content sniffing, form field builders, unique URLs and a small multipart
//! body encoder for driving upload endpoints.

use std::collections::HashMap;

use uuid::Uuid;

/// A 1x1 transparent PNG.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// Build a field map from string pairs.
pub fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// A URL that no other test will use, e.g. `/news-0192.../`.
pub fn unique_url(prefix: &str) -> String {
    format!("/{}-{}/", prefix, Uuid::now_v7().simple())
}

/// A file part for [`MultipartBuilder`].
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Builds `multipart/form-data` request bodies.
#[derive(Debug, Clone, Default)]
pub struct MultipartBuilder {
    fields: Vec<(String, String)>,
    files: Vec<FilePart>,
}

impl MultipartBuilder {
    const BOUNDARY: &'static str = "folio-test-boundary-7MA4YWxkTrZu0gW";

    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a file field.
    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.files.push(FilePart {
            field: name.to_string(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            data: data.to_vec(),
        });
        self
    }

    /// The `Content-Type` header value matching [`MultipartBuilder::body`].
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", Self::BOUNDARY)
    }

    /// Encode the body.
    pub fn body(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in &self.fields {
            out.extend_from_slice(format!("--{}\r\n", Self::BOUNDARY).as_bytes());
            out.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        for file in &self.files {
            out.extend_from_slice(format!("--{}\r\n", Self::BOUNDARY).as_bytes());
            out.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    file.field, file.file_name
                )
                .as_bytes(),
            );
            out.extend_from_slice(
                format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes(),
            );
            out.extend_from_slice(&file.data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", Self::BOUNDARY).as_bytes());
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn tiny_png_has_png_signature() {
        assert_eq!(&TINY_PNG[1..4], b"PNG");
    }

    #[test]
    fn unique_urls_differ() {
        assert_ne!(unique_url("a"), unique_url("a"));
        assert!(unique_url("news").starts_with("/news-"));
    }

    #[test]
    fn multipart_body_contains_parts() {
        let builder = MultipartBuilder::new()
            .text("basename", "heading")
            .file("image", "a.png", "image/png", TINY_PNG);
        let body = String::from_utf8_lossy(&builder.body()).to_string();
        assert!(body.contains("name=\"basename\"\r\n\r\nheading"));
        assert!(body.contains("filename=\"a.png\""));
        assert!(body.ends_with("--\r\n"));
        assert!(builder.content_type().contains("boundary="));
    }
}
