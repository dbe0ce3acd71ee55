//! Report detection
//!
//! Two resolution tiers behind one contract, the normalization helpers that
//! combine their answers, the stores the orchestrator reads from, and the
//! orchestrator that drives each job.
//!
//! ## Tiers
//! - `rule_tier` - deterministic file-name rules against the reference dataset
//! - `fallback_tier` - softer heuristic, consulted only for undecided axes

pub mod fallback_tier;
pub mod normalize;
pub mod orchestrator;
pub mod repository;
pub mod rule_tier;
pub mod types;
pub mod uploads;

pub use fallback_tier::{FallbackTier, FALLBACK_TIER_LABEL};
pub use normalize::{merge_tier_results, normalize_name, terminalize};
pub use orchestrator::{
    DetectionOrchestrator, OrchestratorConfig, OrchestratorError, StartAck, StartRequest,
    StepOutcome,
};
pub use repository::{InMemoryJobRepository, JobRepository, RepositoryError};
pub use rule_tier::{RuleTier, RULE_TIER_LABEL};
pub use types::{ResolutionTier, TaskContext, TierError, TierResult};
pub use uploads::{InMemoryUploadRegistry, UploadRegistry};
