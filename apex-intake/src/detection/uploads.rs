//! Uploaded-files registry
//!
//! Tiers read the files uploaded for a job through [`UploadRegistry`].
//! From the orchestrator's side the list is read-only and append-only.

use crate::models::UploadedFile;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait::async_trait]
pub trait UploadRegistry: Send + Sync {
    /// Files uploaded for a job, oldest first
    async fn files_for(&self, job_id: &str) -> Vec<UploadedFile>;

    /// Append descriptors for a job; returns the job's new file count
    async fn register(&self, job_id: &str, files: Vec<UploadedFile>) -> usize;
}

#[derive(Debug, Default)]
pub struct InMemoryUploadRegistry {
    files: RwLock<HashMap<String, Vec<UploadedFile>>>,
}

impl InMemoryUploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UploadRegistry for InMemoryUploadRegistry {
    async fn files_for(&self, job_id: &str) -> Vec<UploadedFile> {
        self.files
            .read()
            .await
            .get(job_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn register(&self, job_id: &str, files: Vec<UploadedFile>) -> usize {
        let mut registry = self.files.write().await;
        let entry = registry.entry(job_id.to_string()).or_default();
        entry.extend(files);
        entry.len()
    }
}
