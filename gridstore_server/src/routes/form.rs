use std::collections::HashMap;
use std::io::Write;

use axum::extract::Multipart;
use tempfile::NamedTempFile;

use gridstore_core::errors::GridError;
use gridstore_core::storage::{parse_csv_file, ParsedCsv};

use crate::error::{bad_multipart, ApiError, ApiResult};

/// A decoded upload form: at most one file part spooled to a temp file,
/// plus any number of text parts. The temp file is removed when the form
/// drops, on success and failure paths alike.
pub struct UploadForm {
    pub file: Option<NamedTempFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(multipart: &mut Multipart) -> ApiResult<UploadForm> {
        let mut form = UploadForm {
            file: None,
            fields: HashMap::new(),
        };

        while let Some(mut field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();

            if field.file_name().is_some() {
                let mut tmp = NamedTempFile::new().map_err(GridError::from)?;
                while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
                    tmp.write_all(&chunk).map_err(GridError::from)?;
                }
                form.file = Some(tmp);
            } else {
                let value = field.text().await.map_err(bad_multipart)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Text field accessor; empty and whitespace-only values count as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Parse the uploaded file as CSV on a blocking thread. Consumes the
    /// temp file so it is unlinked as soon as parsing finishes.
    pub async fn parse_csv(self) -> ApiResult<ParsedCsv> {
        let file = self
            .file
            .ok_or_else(|| ApiError(GridError::validation("No file uploaded")))?;

        let parsed = tokio::task::spawn_blocking(move || parse_csv_file(file.path()))
            .await
            .map_err(|e| GridError::Internal(format!("csv parse task failed: {}", e)))??;

        Ok(parsed)
    }
}
