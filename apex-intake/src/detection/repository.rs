//! Job repository
//!
//! The orchestrator reaches job records only through [`JobRepository`], so a
//! persistent or expiring store can replace the in-memory map without
//! touching scheduling logic. Records are stored and returned whole; a
//! reader never sees a half-applied step.

use crate::models::DetectionJob;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),
}

/// get / create / update-by-id store for detection jobs
#[async_trait::async_trait]
pub trait JobRepository: Send + Sync {
    /// Copy of the stored job
    async fn get(&self, job_id: &str) -> Result<Option<DetectionJob>, RepositoryError>;

    /// Insert a new job; fails if the id is taken
    async fn create(&self, job: DetectionJob) -> Result<(), RepositoryError>;

    /// Replace an existing job record
    async fn update(&self, job: DetectionJob) -> Result<(), RepositoryError>;

    async fn count(&self) -> Result<usize, RepositoryError>;
}

/// Process-lifetime job map
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<String, DetectionJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn get(&self, job_id: &str) -> Result<Option<DetectionJob>, RepositoryError> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn create(&self, job: DetectionJob) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(RepositoryError::AlreadyExists(job.id));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn update(&self, job: DetectionJob) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(job.id)),
        }
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.jobs.read().await.len())
    }
}
