//! Tier contract
//!
//! Both resolution tiers implement [`ResolutionTier`] and return the same
//! [`TierResult`] shape, so the orchestrator merges them without caring which
//! implementation answered.

use crate::models::{MappingStatus, UploadedFile};
use apex_common::ReferenceDataset;
use std::sync::Arc;
use thiserror::Error;

/// Inputs for one tier call
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub job_id: String,
    pub report_key: String,
    /// Files uploaded for the job, in upload order
    pub files: Vec<UploadedFile>,
    pub dataset: Arc<ReferenceDataset>,
    pub engagement_id: Option<String>,
    pub admin_id: Option<String>,
    /// Routine codes the user selected
    pub routines: Vec<String>,
}

/// Answer from a single tier
///
/// `Pending` on an axis means the tier could not decide it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierResult {
    pub fields_mapped: MappingStatus,
    pub attributes_mapped: MappingStatus,
    /// Label of the tier that located the fields
    pub located_source: Option<String>,
    pub mapped_count: u32,
    pub total_fields: u32,
    pub message: Option<String>,
}

impl TierResult {
    /// Abstain on both axes
    pub fn abstain(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Definite `no` on both axes
    pub fn negative(total_fields: u32, message: impl Into<String>) -> Self {
        Self {
            fields_mapped: MappingStatus::No,
            attributes_mapped: MappingStatus::No,
            total_fields,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Both axes decided
    pub fn is_conclusive(&self) -> bool {
        self.fields_mapped.is_decided() && self.attributes_mapped.is_decided()
    }
}

/// A tier failed outright (as opposed to abstaining)
#[derive(Debug, Error)]
pub enum TierError {
    /// Reference dataset is unusable for this report
    #[error("Reference dataset error: {0}")]
    Dataset(String),

    /// Out-of-process inference failed
    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Resolution strategy attempted by the orchestrator
///
/// Implementations must not touch job state; everything they need is in the
/// [`TaskContext`]. Expected "cannot tell" cases return `Pending`/`No`
/// rather than an error, since an error fails the whole job.
#[async_trait::async_trait]
pub trait ResolutionTier: Send + Sync {
    /// Provenance label recorded as `locatedSource`
    fn label(&self) -> &'static str;

    async fn resolve(&self, ctx: &TaskContext) -> Result<TierResult, TierError>;
}
