//! Detection job state machine
//!
//! A job moves RUNNING → SUCCESS | FAILED. Terminal states are final.
//! Reports are processed strictly in seed order; `cursor` points at the next
//! unprocessed report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-axis detection result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
    /// Not yet decided (or the tier abstained)
    #[default]
    Pending,
    Yes,
    No,
}

impl MappingStatus {
    /// `yes` or `no`
    pub fn is_decided(self) -> bool {
        !matches!(self, MappingStatus::Pending)
    }

    pub fn is_yes(self) -> bool {
        matches!(self, MappingStatus::Yes)
    }

    pub fn from_bool(value: bool) -> Self {
        if value {
            MappingStatus::Yes
        } else {
            MappingStatus::No
        }
    }
}

/// Overall job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Success,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Running)
    }
}

/// Detection state of one report within a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTask {
    pub report_key: String,
    pub fields_mapped: MappingStatus,
    pub attributes_mapped: MappingStatus,
    /// Tier label that located the fields; only set when `fields_mapped` is yes
    pub located_source: Option<String>,
    pub mapped_count: u32,
    pub total_fields: u32,
    pub message: Option<String>,
}

impl ReportTask {
    /// Seed state for a report key
    pub fn pending(report_key: impl Into<String>) -> Self {
        Self {
            report_key: report_key.into(),
            fields_mapped: MappingStatus::Pending,
            attributes_mapped: MappingStatus::Pending,
            located_source: None,
            mapped_count: 0,
            total_fields: 0,
            message: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.fields_mapped.is_decided() && self.attributes_mapped.is_decided()
    }
}

/// Context supplied at start and handed to every tier call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSeed {
    pub engagement_id: Option<String>,
    pub admin_id: Option<String>,
    #[serde(default)]
    pub routines: Vec<String>,
}

/// `{done, total}` progress counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub done: usize,
    pub total: usize,
}

/// Aggregate yes/no summary across all reports of a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub fields_all_yes: bool,
    pub fields_any_no: bool,
    pub attributes_all_yes: bool,
    pub attributes_any_no: bool,
}

impl JobOutcome {
    /// Recompute the outcome flags over a task list
    ///
    /// All-yes flags require a non-empty list.
    pub fn compute(reports: &[ReportTask]) -> Self {
        let non_empty = !reports.is_empty();
        Self {
            fields_all_yes: non_empty && reports.iter().all(|r| r.fields_mapped.is_yes()),
            fields_any_no: reports.iter().any(|r| r.fields_mapped == MappingStatus::No),
            attributes_all_yes: non_empty && reports.iter().all(|r| r.attributes_mapped.is_yes()),
            attributes_any_no: reports
                .iter()
                .any(|r| r.attributes_mapped == MappingStatus::No),
        }
    }
}

/// One detection run (in-memory state)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionJob {
    /// Caller-supplied job identifier
    pub id: String,

    pub state: JobState,

    /// Processing order = seed order
    pub reports: Vec<ReportTask>,

    /// Index of the next unprocessed report (0 ≤ cursor ≤ reports.len())
    pub cursor: usize,

    pub seed: DetectionSeed,

    /// Failure message for FAILED jobs
    pub message: Option<String>,

    pub started_at: DateTime<Utc>,

    /// Set when the job reaches a terminal state
    pub ended_at: Option<DateTime<Utc>>,
}

impl DetectionJob {
    /// Seed a job with one pending task per distinct report key
    ///
    /// Duplicate keys collapse onto their first occurrence. A job with no
    /// keys is created already SUCCESS.
    pub fn new<I, S>(id: impl Into<String>, report_keys: I, seed: DetectionSeed) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut reports: Vec<ReportTask> = Vec::new();
        for key in report_keys {
            let key = key.into();
            if !reports.iter().any(|r| r.report_key == key) {
                reports.push(ReportTask::pending(key));
            }
        }

        let now = Utc::now();
        let empty = reports.is_empty();
        Self {
            id: id.into(),
            state: if empty { JobState::Success } else { JobState::Running },
            reports,
            cursor: 0,
            seed,
            message: None,
            started_at: now,
            ended_at: if empty { Some(now) } else { None },
        }
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn progress(&self) -> JobProgress {
        JobProgress {
            done: self.cursor,
            total: self.total(),
        }
    }

    pub fn outcome(&self) -> JobOutcome {
        JobOutcome::compute(&self.reports)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.total()
    }

    /// Report the next step should process
    pub fn current_task(&self) -> Option<&ReportTask> {
        self.reports.get(self.cursor)
    }

    /// Store the resolved task at the cursor and advance
    ///
    /// Moves the job to SUCCESS once the last report is written. Ignored on
    /// terminal jobs and when the task key does not match the cursor.
    pub fn complete_current(&mut self, task: ReportTask) -> bool {
        if self.is_terminal() {
            return false;
        }
        match self.reports.get_mut(self.cursor) {
            Some(slot) if slot.report_key == task.report_key => {
                *slot = task;
                self.cursor += 1;
                if self.is_exhausted() {
                    self.transition_to(JobState::Success);
                }
                true
            }
            _ => false,
        }
    }

    /// Transition to new state; terminal states are final
    pub fn transition_to(&mut self, new_state: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = new_state;
        if new_state.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        true
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) -> bool {
        if self.transition_to(JobState::Failed) {
            self.message = Some(message.into());
            true
        } else {
            false
        }
    }

    /// Read-only copy for status callers
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            overall: self.state,
            progress: self.progress(),
            outcome: self.outcome(),
            reports: self.reports.iter().map(ReportSnapshot::from).collect(),
            message: self.message.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Status view of one report
///
/// `located` and `mapped` repeat `fieldsMapped` and `attributesMapped` for
/// older observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSnapshot {
    pub report_key: String,
    pub fields_mapped: MappingStatus,
    pub attributes_mapped: MappingStatus,
    pub located: MappingStatus,
    pub mapped: MappingStatus,
    pub located_source: Option<String>,
    pub mapped_count: u32,
    pub total_fields: u32,
    pub message: Option<String>,
}

impl From<&ReportTask> for ReportSnapshot {
    fn from(task: &ReportTask) -> Self {
        Self {
            report_key: task.report_key.clone(),
            fields_mapped: task.fields_mapped,
            attributes_mapped: task.attributes_mapped,
            located: task.fields_mapped,
            mapped: task.attributes_mapped,
            located_source: task.located_source.clone(),
            mapped_count: task.mapped_count,
            total_fields: task.total_fields,
            message: task.message.clone(),
        }
    }
}

/// Point-in-time copy of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: String,
    pub overall: JobState,
    pub progress: JobProgress,
    pub outcome: JobOutcome,
    pub reports: Vec<ReportSnapshot>,
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(key: &str, fields: MappingStatus, attributes: MappingStatus) -> ReportTask {
        ReportTask {
            fields_mapped: fields,
            attributes_mapped: attributes,
            ..ReportTask::pending(key)
        }
    }

    #[test]
    fn test_duplicate_keys_collapse_in_first_seen_order() {
        let job = DetectionJob::new("job", ["soi", "pands", "soi"], DetectionSeed::default());
        let keys: Vec<_> = job.reports.iter().map(|r| r.report_key.as_str()).collect();
        assert_eq!(keys, ["soi", "pands"]);
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.progress(), JobProgress { done: 0, total: 2 });
    }

    #[test]
    fn test_empty_job_is_immediately_successful() {
        let job = DetectionJob::new("job", Vec::<String>::new(), DetectionSeed::default());
        assert_eq!(job.state, JobState::Success);
        assert!(job.ended_at.is_some());
        assert_eq!(job.progress(), JobProgress { done: 0, total: 0 });
        assert_eq!(job.outcome(), JobOutcome::default());
    }

    #[test]
    fn test_complete_current_advances_and_finishes() {
        let mut job = DetectionJob::new("job", ["soi", "pands"], DetectionSeed::default());

        assert!(job.complete_current(resolved("soi", MappingStatus::Yes, MappingStatus::No)));
        assert_eq!(job.cursor, 1);
        assert_eq!(job.state, JobState::Running);

        // Out-of-order key is rejected
        assert!(!job.complete_current(resolved("soi", MappingStatus::Yes, MappingStatus::Yes)));

        assert!(job.complete_current(resolved("pands", MappingStatus::No, MappingStatus::No)));
        assert_eq!(job.state, JobState::Success);
        assert_eq!(job.progress(), JobProgress { done: 2, total: 2 });

        // Terminal jobs ignore further writes
        assert!(!job.complete_current(resolved("pands", MappingStatus::Yes, MappingStatus::Yes)));
    }

    #[test]
    fn test_outcome_flags() {
        let all_yes = [
            resolved("a", MappingStatus::Yes, MappingStatus::Yes),
            resolved("b", MappingStatus::Yes, MappingStatus::Yes),
        ];
        let outcome = JobOutcome::compute(&all_yes);
        assert!(outcome.fields_all_yes && outcome.attributes_all_yes);
        assert!(!outcome.fields_any_no && !outcome.attributes_any_no);

        let mixed = [
            resolved("a", MappingStatus::Yes, MappingStatus::No),
            ReportTask::pending("b"),
        ];
        let outcome = JobOutcome::compute(&mixed);
        assert!(!outcome.fields_all_yes);
        assert!(!outcome.fields_any_no);
        assert!(!outcome.attributes_all_yes);
        assert!(outcome.attributes_any_no);

        assert_eq!(JobOutcome::compute(&[]), JobOutcome::default());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut job = DetectionJob::new("job", ["soi"], DetectionSeed::default());
        assert!(job.mark_failed("tier exploded"));
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.message.as_deref(), Some("tier exploded"));

        assert!(!job.transition_to(JobState::Success));
        assert!(!job.mark_failed("again"));
        assert_eq!(job.message.as_deref(), Some("tier exploded"));
    }

    #[test]
    fn test_snapshot_carries_legacy_aliases() {
        let mut job = DetectionJob::new("job-7", ["soi"], DetectionSeed::default());
        job.complete_current(ReportTask {
            located_source: Some("rules".to_string()),
            total_fields: 3,
            mapped_count: 3,
            ..resolved("soi", MappingStatus::Yes, MappingStatus::Yes)
        });

        let json = serde_json::to_value(job.snapshot()).unwrap();
        assert_eq!(json["jobId"], "job-7");
        assert_eq!(json["overall"], "success");
        assert_eq!(json["progress"]["done"], 1);
        assert_eq!(json["outcome"]["fieldsAllYes"], true);

        let report = &json["reports"][0];
        assert_eq!(report["fieldsMapped"], "yes");
        assert_eq!(report["located"], "yes");
        assert_eq!(report["attributesMapped"], "yes");
        assert_eq!(report["mapped"], "yes");
        assert_eq!(report["locatedSource"], "rules");
    }
}
