//! Deterministic rule tier
//!
//! Locates a report by matching uploaded file names against the report's
//! human name and key from the reference dataset.

use super::normalize::normalize_name;
use super::types::{ResolutionTier, TaskContext, TierError, TierResult};
use crate::models::MappingStatus;
use tracing::debug;

pub const RULE_TIER_LABEL: &str = "rules";

/// Filename rule matcher
///
/// **Algorithm:**
/// 1. Look up the report definition; unknown key → abstain
/// 2. Fields located if any normalized file name contains the normalized
///    report name or key
/// 3. Attributes mapped if located and the report has a field spec
/// 4. Anything undecided stays `pending` for the fallback tier
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleTier;

impl RuleTier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ResolutionTier for RuleTier {
    fn label(&self) -> &'static str {
        RULE_TIER_LABEL
    }

    async fn resolve(&self, ctx: &TaskContext) -> Result<TierResult, TierError> {
        let Some(definition) = ctx.dataset.report(&ctx.report_key) else {
            debug!(
                job_id = %ctx.job_id,
                report_key = %ctx.report_key,
                "Report not in reference dataset"
            );
            return Ok(TierResult::abstain(format!(
                "Report '{}' is not defined in the reference dataset",
                ctx.report_key
            )));
        };

        let name = normalize_name(&definition.name);
        let key = normalize_name(&ctx.report_key);
        let total_fields = u32::try_from(definition.fields.len()).unwrap_or(u32::MAX);

        let matched = ctx.files.iter().find(|file| {
            let file_name = normalize_name(&file.original_name);
            (!name.is_empty() && file_name.contains(&name))
                || (!key.is_empty() && file_name.contains(&key))
        });

        let Some(file) = matched else {
            debug!(
                job_id = %ctx.job_id,
                report_key = %ctx.report_key,
                files = ctx.files.len(),
                "No uploaded file name matches report"
            );
            return Ok(TierResult {
                total_fields,
                message: Some(format!(
                    "No uploaded file name matches '{}'",
                    definition.name
                )),
                ..TierResult::default()
            });
        };

        debug!(
            job_id = %ctx.job_id,
            report_key = %ctx.report_key,
            file = %file.original_name,
            "Report located by file name"
        );

        let (attributes_mapped, mapped_count, message) = if total_fields > 0 {
            (
                MappingStatus::Yes,
                total_fields,
                format!("Located in '{}'", file.original_name),
            )
        } else {
            (
                MappingStatus::Pending,
                0,
                format!(
                    "Located in '{}' but no field specification exists",
                    file.original_name
                ),
            )
        };

        Ok(TierResult {
            fields_mapped: MappingStatus::Yes,
            attributes_mapped,
            located_source: Some(RULE_TIER_LABEL.to_string()),
            mapped_count,
            total_fields,
            message: Some(message),
        })
    }
}
