//! Shared fixtures for apex-intake integration tests

#![allow(dead_code)]

use apex_common::{EventBus, ReferenceDataset};
use apex_intake::detection::{
    DetectionOrchestrator, InMemoryUploadRegistry, OrchestratorConfig, ResolutionTier,
    TaskContext, TierError, TierResult, UploadRegistry,
};
use apex_intake::models::{JobSnapshot, MappingStatus};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type Script = Box<dyn Fn(&TaskContext) -> Result<TierResult, TierError> + Send + Sync>;

/// Tier double answering from a closure and counting its calls
pub struct ScriptedTier {
    label: &'static str,
    script: Script,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedTier {
    pub fn new(
        label: &'static str,
        script: impl Fn(&TaskContext) -> Result<TierResult, TierError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            label,
            script: Box::new(script),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    /// Commits to `no` after sleeping for `delay`
    pub fn slow(label: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            label,
            script: Box::new(|_: &TaskContext| Ok(TierResult::negative(0, "not found"))),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    /// Leaves both axes pending
    pub fn abstaining(label: &'static str) -> Arc<Self> {
        Self::new(label, |_: &TaskContext| Ok(TierResult::abstain("undecided")))
    }

    /// Commits to `no` on both axes
    pub fn negative(label: &'static str) -> Arc<Self> {
        Self::new(label, |_: &TaskContext| Ok(TierResult::negative(0, "not found")))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ResolutionTier for ScriptedTier {
    fn label(&self) -> &'static str {
        self.label
    }

    async fn resolve(&self, ctx: &TaskContext) -> Result<TierResult, TierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.script)(ctx)
    }
}

/// Located with every field mapped
pub fn located(source: &str, total_fields: u32) -> TierResult {
    TierResult {
        fields_mapped: MappingStatus::Yes,
        attributes_mapped: MappingStatus::Yes,
        located_source: Some(source.to_string()),
        mapped_count: total_fields,
        total_fields,
        message: Some("located".to_string()),
    }
}

pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("reference_dataset.json")
}

pub fn fixture_dataset() -> ReferenceDataset {
    ReferenceDataset::load(&fixture_path()).expect("fixture dataset should parse")
}

/// Short ticks so jobs finish quickly under test
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        tick_interval: Duration::from_millis(10),
        tier_timeout: Duration::from_millis(500),
    }
}

/// Orchestrator over the fixture dataset with the default tiers
pub fn default_orchestrator() -> (Arc<DetectionOrchestrator>, Arc<dyn UploadRegistry>, EventBus) {
    let uploads: Arc<dyn UploadRegistry> = Arc::new(InMemoryUploadRegistry::new());
    let event_bus = EventBus::new(100);
    let orchestrator = DetectionOrchestrator::new(
        Arc::new(fixture_dataset()),
        Arc::clone(&uploads),
        event_bus.clone(),
        fast_config(),
    );
    (Arc::new(orchestrator), uploads, event_bus)
}

/// Orchestrator with scripted tiers
pub fn scripted_orchestrator(
    rule: Arc<ScriptedTier>,
    fallback: Arc<ScriptedTier>,
    config: OrchestratorConfig,
) -> Arc<DetectionOrchestrator> {
    let uploads: Arc<dyn UploadRegistry> = Arc::new(InMemoryUploadRegistry::new());
    let orchestrator = DetectionOrchestrator::new(
        Arc::new(fixture_dataset()),
        uploads,
        EventBus::new(100),
        config,
    )
    .with_tiers(rule, fallback);
    Arc::new(orchestrator)
}

/// Poll until the job leaves RUNNING (panics after 5s)
pub async fn wait_for_terminal(orchestrator: &DetectionOrchestrator, job_id: &str) -> JobSnapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(snapshot) = orchestrator.status(job_id).await.unwrap() {
                if snapshot.overall.is_terminal() {
                    return snapshot;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job should reach a terminal state")
}

/// Poll until the job's scheduling loop has exited (panics after 5s)
pub async fn wait_for_idle(orchestrator: &DetectionOrchestrator, job_id: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while orchestrator.is_scheduling(job_id).await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("scheduling loop should exit");
}
