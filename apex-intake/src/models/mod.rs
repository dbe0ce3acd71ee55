//! Data models for apex-intake
//!
//! - Detection job state machine and per-report tasks
//! - Point-in-time job snapshots served by the status endpoint
//! - Uploaded file descriptors

pub mod detection_job;
pub mod upload;

pub use detection_job::{
    DetectionJob, DetectionSeed, JobOutcome, JobProgress, JobSnapshot, JobState, MappingStatus,
    ReportSnapshot, ReportTask,
};
pub use upload::UploadedFile;
