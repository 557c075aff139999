//! Submitted form data.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::{CmsError, CmsResult};

/// An uploaded file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }
}

/// Text fields and file parts of one form post.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        Self {
            fields,
            files: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, file: UploadedFile) -> Self {
        self.files.insert(name.into(), file);
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    /// Address of the form being saved.
    pub fn basename(&self) -> &str {
        self.field("basename").unwrap_or_default()
    }

    /// Whether the client asked for the JSON-in-textarea reply.
    pub fn is_ajax(&self) -> bool {
        self.fields.contains_key("is_ajax")
    }

    /// Collect a multipart body. File inputs left empty by the browser are
    /// dropped.
    pub async fn from_multipart(mut multipart: Multipart) -> CmsResult<Self> {
        let mut submission = Self::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| CmsError::Validation(format!("invalid form data: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            match file_name {
                Some(file_name) => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| CmsError::Validation(format!("invalid upload: {e}")))?;
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    submission.files.insert(
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            data: data.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| CmsError::Validation(format!("invalid form data: {e}")))?;
                    submission.fields.insert(name, text);
                }
            }
        }
        Ok(submission)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn basename_and_ajax_flags() {
        let submission = Submission::new()
            .with_field("basename", "heading")
            .with_field("is_ajax", "1");
        assert_eq!(submission.basename(), "heading");
        assert!(submission.is_ajax());
        assert!(!Submission::new().is_ajax());
        assert_eq!(Submission::new().basename(), "");
    }

    #[test]
    fn files_are_kept_apart_from_fields() {
        let mut submission =
            Submission::new().with_file("image", UploadedFile::new("a.png", vec![1, 2]));
        assert!(submission.field("image").is_none());
        assert_eq!(submission.file("image").unwrap().data, vec![1, 2]);
        assert!(submission.take_file("image").is_some());
        assert!(submission.file("image").is_none());
    }
}
