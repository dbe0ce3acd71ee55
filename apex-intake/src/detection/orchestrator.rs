//! Detection orchestrator
//!
//! Owns one [`DetectionJob`] per job id and advances it one report per
//! scheduling tick:
//!
//! 1. Rule tier
//! 2. Fallback tier, only if the rule tier left an axis undecided
//! 3. Per-axis merge (rule tier wins where it decided), then terminalize
//! 4. Write the task, advance the cursor, finish when the cursor hits the end
//!
//! Each job has at most one scheduling loop and the loop awaits every step
//! before the next tick, so steps of one job never overlap. The loop is the
//! only writer of a job record after creation; status callers read whole
//! copies from the repository.

use super::normalize::{merge_tier_results, terminalize};
use super::repository::{InMemoryJobRepository, JobRepository, RepositoryError};
use super::types::{ResolutionTier, TaskContext, TierError, TierResult};
use super::uploads::UploadRegistry;
use super::{FallbackTier, RuleTier};
use crate::models::{DetectionJob, DetectionSeed, JobSnapshot, JobState};
use apex_common::{ApexEvent, EventBus, ReferenceDataset};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default scheduling cadence
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);
/// Default bound on a single tier call
pub const DEFAULT_TIER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub tick_interval: Duration,
    /// A tier exceeding this is treated as abstaining
    pub tier_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            tier_timeout: DEFAULT_TIER_TIMEOUT,
        }
    }
}

/// Errors that cross the start/status boundary
///
/// Job-internal failures never appear here; they are recorded on the job.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Job identifier is required")]
    MissingJobId,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Start request
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    pub job_id: String,
    /// Reports to track, in processing order
    pub report_keys: Vec<String>,
    pub seed: DetectionSeed,
}

impl StartRequest {
    pub fn new<I, S>(job_id: impl Into<String>, report_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            job_id: job_id.into(),
            report_keys: report_keys.into_iter().map(Into::into).collect(),
            seed: DetectionSeed::default(),
        }
    }

    pub fn with_seed(mut self, seed: DetectionSeed) -> Self {
        self.seed = seed;
        self
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Acknowledgement returned by `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAck {
    pub started: bool,
    /// Job had no reports and completed immediately
    #[serde(default, skip_serializing_if = "is_false")]
    pub empty: bool,
    /// Job was already terminal or already being scheduled
    #[serde(default, skip_serializing_if = "is_false")]
    pub already: bool,
}

impl StartAck {
    fn started() -> Self {
        Self {
            started: true,
            empty: false,
            already: false,
        }
    }

    fn empty() -> Self {
        Self {
            empty: true,
            ..Self::started()
        }
    }

    fn already() -> Self {
        Self {
            already: true,
            ..Self::started()
        }
    }
}

/// Result of one scheduling tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// One report processed, more remain
    Advanced,
    /// Job reached SUCCESS on this tick
    Completed,
    /// A tier failed; job is FAILED
    Failed,
    /// Job missing or already terminal; nothing done
    Idle,
}

impl StepOutcome {
    /// Whether the loop should keep ticking
    pub fn continues(self) -> bool {
        matches!(self, StepOutcome::Advanced)
    }
}

/// Handle on one job's scheduling task
struct SchedulingLoop {
    /// Distinguishes a loop from its replacement under the same job id
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SchedulingLoop {
    /// Not yet asked to stop
    fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

/// Per-job detection state machine driver
pub struct DetectionOrchestrator {
    repository: Arc<dyn JobRepository>,
    uploads: Arc<dyn UploadRegistry>,
    dataset: Arc<ReferenceDataset>,
    rule_tier: Arc<dyn ResolutionTier>,
    fallback_tier: Arc<dyn ResolutionTier>,
    event_bus: EventBus,
    config: OrchestratorConfig,
    /// Scheduling loops by job id, including stopped ones still finishing a step
    loops: Mutex<HashMap<String, SchedulingLoop>>,
    next_generation: AtomicU64,
}

impl DetectionOrchestrator {
    /// Orchestrator with the in-memory repository and the default tiers
    pub fn new(
        dataset: Arc<ReferenceDataset>,
        uploads: Arc<dyn UploadRegistry>,
        event_bus: EventBus,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            repository: Arc::new(InMemoryJobRepository::new()),
            uploads,
            dataset,
            rule_tier: Arc::new(RuleTier::new()),
            fallback_tier: Arc::new(FallbackTier::new()),
            event_bus,
            config,
            loops: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn JobRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_tiers(
        mut self,
        rule_tier: Arc<dyn ResolutionTier>,
        fallback_tier: Arc<dyn ResolutionTier>,
    ) -> Self {
        self.rule_tier = rule_tier;
        self.fallback_tier = fallback_tier;
        self
    }

    pub fn config(&self) -> OrchestratorConfig {
        self.config
    }

    /// Seed a job (first call) and make sure it is being scheduled
    ///
    /// Idempotent per job id: repeated calls never reseed tasks or spawn a
    /// second loop. A RUNNING job whose loop was stopped is resumed from its
    /// cursor.
    pub async fn start(self: &Arc<Self>, request: StartRequest) -> Result<StartAck, OrchestratorError> {
        let job_id = request.job_id.trim().to_string();
        if job_id.is_empty() {
            return Err(OrchestratorError::MissingJobId);
        }

        // Held across check-and-create so concurrent starts serialize
        let mut loops = self.loops.lock().await;

        if let Some(existing) = self.repository.get(&job_id).await? {
            let active = loops.get(&job_id).map_or(false, SchedulingLoop::is_active);
            if existing.is_terminal() || active {
                debug!(job_id = %job_id, state = ?existing.state, "Start ignored, job already known");
                return Ok(StartAck::already());
            }

            // A stopped loop may still be inside its last step; the
            // replacement waits for it so steps never overlap
            let previous = loops.remove(&job_id).map(|stopped| stopped.handle);
            info!(
                job_id = %job_id,
                done = existing.cursor,
                total = existing.total(),
                draining = previous.is_some(),
                "Resuming detection scheduling"
            );
            self.spawn_loop(job_id, previous, &mut loops);
            return Ok(StartAck::started());
        }

        let job = DetectionJob::new(job_id.clone(), request.report_keys, request.seed);
        let total = job.total();
        let empty = job.is_terminal();
        let outcome = job.outcome();
        self.repository.create(job).await?;

        self.event_bus.emit_lossy(ApexEvent::DetectionStarted {
            job_id: job_id.clone(),
            total,
        });

        if empty {
            info!(job_id = %job_id, "Detection job has no reports, completed immediately");
            self.event_bus.emit_lossy(ApexEvent::DetectionCompleted {
                job_id,
                fields_all_yes: outcome.fields_all_yes,
                fields_any_no: outcome.fields_any_no,
                attributes_all_yes: outcome.attributes_all_yes,
                attributes_any_no: outcome.attributes_any_no,
            });
            return Ok(StartAck::empty());
        }

        info!(job_id = %job_id, total, "Detection job seeded");
        self.spawn_loop(job_id, None, &mut loops);
        Ok(StartAck::started())
    }

    /// Point-in-time copy of a job; `None` for unknown ids
    pub async fn status(&self, job_id: &str) -> Result<Option<JobSnapshot>, OrchestratorError> {
        let job = self.repository.get(job_id).await?;
        debug!(job_id = %job_id, found = job.is_some(), "Status query");
        Ok(job.map(|j| j.snapshot()))
    }

    /// Stop a job's scheduling loop without changing the job
    ///
    /// The loop exits after any in-flight step. Returns `false` if no live
    /// loop existed.
    pub async fn stop(&self, job_id: &str) -> bool {
        let loops = self.loops.lock().await;
        match loops.get(job_id) {
            Some(active) if active.is_active() => {
                active.token.cancel();
                info!(job_id = %job_id, "Detection scheduling stop requested");
                true
            }
            _ => false,
        }
    }

    /// Stop every scheduling loop
    pub async fn shutdown(&self) {
        let loops = self.loops.lock().await;
        for scheduled in loops.values() {
            scheduled.token.cancel();
        }
        info!(loops = loops.len(), "Detection scheduling shut down");
    }

    /// Whether a scheduling loop is live for the job
    pub async fn is_scheduling(&self, job_id: &str) -> bool {
        self.loops.lock().await.contains_key(job_id)
    }

    pub async fn active_loops(&self) -> usize {
        self.loops.lock().await.len()
    }

    pub async fn job_count(&self) -> Result<usize, OrchestratorError> {
        Ok(self.repository.count().await?)
    }

    fn spawn_loop(
        self: &Arc<Self>,
        job_id: String,
        previous: Option<JoinHandle<()>>,
        loops: &mut HashMap<String, SchedulingLoop>,
    ) {
        let token = CancellationToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let orchestrator = Arc::clone(self);
        let loop_job_id = job_id.clone();
        let loop_token = token.clone();
        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    warn!(job_id = %loop_job_id, error = %e, "Previous scheduling loop ended abnormally");
                }
            }
            orchestrator.run_loop(&loop_job_id, loop_token).await;

            // Only drop our own entry; a resumed loop may have replaced it
            let mut loops = orchestrator.loops.lock().await;
            if loops
                .get(&loop_job_id)
                .map_or(false, |entry| entry.generation == generation)
            {
                loops.remove(&loop_job_id);
            }
            debug!(job_id = %loop_job_id, "Detection scheduling loop exited");
        });

        loops.insert(
            job_id,
            SchedulingLoop {
                generation,
                token,
                handle,
            },
        );
    }

    async fn run_loop(&self, job_id: &str, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; the first step waits one interval
        ticker.tick().await;

        loop {
            // Cancellation wins over a tick that became ready during a long step
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!(job_id = %job_id, "Detection scheduling stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.step(job_id).await {
                Ok(outcome) if outcome.continues() => {}
                Ok(outcome) => {
                    debug!(job_id = %job_id, outcome = ?outcome, "Detection scheduling finished");
                    return;
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Detection step could not persist state");
                    return;
                }
            }
        }
    }

    /// Process the report at the cursor
    pub(crate) async fn step(&self, job_id: &str) -> Result<StepOutcome, RepositoryError> {
        let Some(mut job) = self.repository.get(job_id).await? else {
            return Ok(StepOutcome::Idle);
        };
        if job.is_terminal() {
            return Ok(StepOutcome::Idle);
        }

        let Some(task) = job.current_task().cloned() else {
            job.transition_to(JobState::Success);
            self.repository.update(job.clone()).await?;
            self.emit_completed(&job);
            return Ok(StepOutcome::Completed);
        };

        let ctx = self.task_context(&job, &task.report_key).await;
        debug!(
            job_id = %job_id,
            report_key = %task.report_key,
            index = job.cursor,
            total = job.total(),
            "Resolving report"
        );

        let merged = match self.resolve(&ctx).await {
            Ok(merged) => merged,
            Err(e) => {
                let message = e.to_string();
                error!(job_id = %job_id, report_key = %task.report_key, error = %message, "Detection job failed");
                job.mark_failed(message.clone());
                self.repository.update(job).await?;
                self.event_bus.emit_lossy(ApexEvent::DetectionFailed {
                    job_id: job_id.to_string(),
                    message,
                });
                return Ok(StepOutcome::Failed);
            }
        };

        if !merged.is_conclusive() {
            warn!(
                job_id = %job_id,
                report_key = %task.report_key,
                fields = ?merged.fields_mapped,
                attributes = ?merged.attributes_mapped,
                "Report inconclusive after all tiers, recording as no"
            );
        }

        let resolved = terminalize(&task.report_key, merged);
        let fields_mapped = resolved.fields_mapped.is_yes();
        let attributes_mapped = resolved.attributes_mapped.is_yes();
        job.complete_current(resolved);
        self.repository.update(job.clone()).await?;

        let progress = job.progress();
        info!(
            job_id = %job_id,
            report_key = %task.report_key,
            fields_mapped,
            attributes_mapped,
            progress = format!("{}/{}", progress.done, progress.total),
            "Report resolved"
        );
        self.event_bus.emit_lossy(ApexEvent::ReportResolved {
            job_id: job_id.to_string(),
            report_key: task.report_key,
            fields_mapped,
            attributes_mapped,
            done: progress.done,
            total: progress.total,
        });

        if job.is_terminal() {
            self.emit_completed(&job);
            Ok(StepOutcome::Completed)
        } else {
            Ok(StepOutcome::Advanced)
        }
    }

    async fn task_context(&self, job: &DetectionJob, report_key: &str) -> TaskContext {
        TaskContext {
            job_id: job.id.clone(),
            report_key: report_key.to_string(),
            files: self.uploads.files_for(&job.id).await,
            dataset: Arc::clone(&self.dataset),
            engagement_id: job.seed.engagement_id.clone(),
            admin_id: job.seed.admin_id.clone(),
            routines: job.seed.routines.clone(),
        }
    }

    /// Rule tier, then the fallback tier when needed, merged per axis
    async fn resolve(&self, ctx: &TaskContext) -> Result<TierResult, TierError> {
        let primary = self.call_tier(self.rule_tier.as_ref(), ctx).await?;
        if primary.is_conclusive() {
            return Ok(merge_tier_results(&primary, None));
        }

        debug!(
            job_id = %ctx.job_id,
            report_key = %ctx.report_key,
            "Rule tier inconclusive, consulting fallback tier"
        );
        let fallback = self.call_tier(self.fallback_tier.as_ref(), ctx).await?;
        Ok(merge_tier_results(&primary, Some(&fallback)))
    }

    /// One bounded tier call; timeout counts as abstention, panic as failure
    async fn call_tier(
        &self,
        tier: &dyn ResolutionTier,
        ctx: &TaskContext,
    ) -> Result<TierResult, TierError> {
        let call = AssertUnwindSafe(tier.resolve(ctx)).catch_unwind();
        match tokio::time::timeout(self.config.tier_timeout, call).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(e))) => Err(TierError::Internal(format!(
                "{} tier failed on report '{}': {}",
                tier.label(),
                ctx.report_key,
                e
            ))),
            Ok(Err(_panic)) => Err(TierError::Internal(format!(
                "{} tier panicked on report '{}'",
                tier.label(),
                ctx.report_key
            ))),
            Err(_elapsed) => {
                warn!(
                    job_id = %ctx.job_id,
                    report_key = %ctx.report_key,
                    tier = tier.label(),
                    timeout_ms = self.config.tier_timeout.as_millis() as u64,
                    "Tier call timed out, treating as abstention"
                );
                Ok(TierResult::abstain(format!(
                    "{} tier timed out after {}ms",
                    tier.label(),
                    self.config.tier_timeout.as_millis()
                )))
            }
        }
    }

    fn emit_completed(&self, job: &DetectionJob) {
        let outcome = job.outcome();
        info!(
            job_id = %job.id,
            total = job.total(),
            fields_all_yes = outcome.fields_all_yes,
            attributes_all_yes = outcome.attributes_all_yes,
            "Detection job completed"
        );
        self.event_bus.emit_lossy(ApexEvent::DetectionCompleted {
            job_id: job.id.clone(),
            fields_all_yes: outcome.fields_all_yes,
            fields_any_no: outcome.fields_any_no,
            attributes_all_yes: outcome.attributes_all_yes,
            attributes_any_no: outcome.attributes_any_no,
        });
    }
}
