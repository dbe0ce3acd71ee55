//! Uploaded file descriptors
//!
//! Receiving and naming the bytes is handled upstream; detection only sees
//! these descriptors.

use serde::{Deserialize, Serialize};

/// One file uploaded for a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Name the user uploaded the file under
    pub original_name: String,
    /// Name the upload store saved it as
    pub stored_name: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, stored_name: impl Into<String>, size: u64) -> Self {
        Self {
            original_name: original_name.into(),
            stored_name: stored_name.into(),
            size,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Lowercased extension of the original name, if any
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}
