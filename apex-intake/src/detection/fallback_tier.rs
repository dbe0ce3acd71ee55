//! Fallback heuristic tier
//!
//! Consulted only when the rule tier leaves an axis undecided. Looks at
//! spreadsheet-like uploads and accepts a partial word overlap between the
//! report name and a file name. Unlike the rule tier it commits to `no` when
//! nothing fits.

use super::normalize::normalize_name;
use super::types::{ResolutionTier, TaskContext, TierError, TierResult};
use crate::models::{MappingStatus, UploadedFile};
use tracing::debug;

pub const FALLBACK_TIER_LABEL: &str = "heuristic";

const SPREADSHEET_EXTENSIONS: &[&str] = &["csv", "tsv", "xls", "xlsx", "xlsm", "ods"];
const SPREADSHEET_MIME_HINTS: &[&str] = &["csv", "spreadsheet", "excel"];
const STOP_WORDS: &[&str] = &["and", "the", "for", "with", "from"];

/// Word-overlap heuristic over spreadsheet uploads
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackTier;

impl FallbackTier {
    pub fn new() -> Self {
        Self
    }
}

/// Whether an upload looks like a spreadsheet or delimited text export
pub fn is_spreadsheet(file: &UploadedFile) -> bool {
    let by_extension = file
        .extension()
        .map(|ext| SPREADSHEET_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    let by_mime = file
        .mime_type
        .as_deref()
        .map(|mime| {
            let mime = mime.to_ascii_lowercase();
            SPREADSHEET_MIME_HINTS.iter().any(|hint| mime.contains(hint))
        })
        .unwrap_or(false);
    by_extension || by_mime
}

/// Significant words of a report name (≥3 chars, no stop words, deduplicated)
pub fn name_tokens(name: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for word in name.split(|c: char| !c.is_ascii_alphanumeric()) {
        let word = word.to_ascii_lowercase();
        if word.len() >= 3 && !STOP_WORDS.contains(&word.as_str()) && !tokens.contains(&word) {
            tokens.push(word);
        }
    }
    tokens
}

#[async_trait::async_trait]
impl ResolutionTier for FallbackTier {
    fn label(&self) -> &'static str {
        FALLBACK_TIER_LABEL
    }

    async fn resolve(&self, ctx: &TaskContext) -> Result<TierResult, TierError> {
        let Some(definition) = ctx.dataset.report(&ctx.report_key) else {
            return Ok(TierResult::abstain(format!(
                "Report '{}' is not defined in the reference dataset",
                ctx.report_key
            )));
        };
        let total_fields = u32::try_from(definition.fields.len()).unwrap_or(u32::MAX);

        let candidates: Vec<&UploadedFile> =
            ctx.files.iter().filter(|f| is_spreadsheet(f)).collect();
        if candidates.is_empty() {
            return Ok(TierResult::negative(
                total_fields,
                "No spreadsheet uploads to inspect",
            ));
        }

        if !ctx.routines.is_empty() && !ctx.dataset.is_required_by(&ctx.report_key, &ctx.routines)
        {
            return Ok(TierResult::negative(
                total_fields,
                format!(
                    "'{}' is not required by the selected routines",
                    definition.name
                ),
            ));
        }

        let mut tokens = name_tokens(&definition.name);
        if tokens.is_empty() {
            let key = normalize_name(&ctx.report_key);
            if !key.is_empty() {
                tokens.push(key);
            }
        }

        let best = candidates
            .iter()
            .map(|file| {
                let file_name = normalize_name(&file.original_name);
                let hits = tokens.iter().filter(|t| file_name.contains(t.as_str())).count();
                (hits, *file)
            })
            .max_by_key(|(hits, _)| *hits);

        let located = match best {
            Some((hits, file)) if hits > 0 && hits * 2 >= tokens.len() => Some(file),
            _ => None,
        };

        debug!(
            job_id = %ctx.job_id,
            report_key = %ctx.report_key,
            candidates = candidates.len(),
            located = located.is_some(),
            "Heuristic match evaluated"
        );

        Ok(match located {
            Some(file) => {
                let attributes = total_fields > 0;
                TierResult {
                    fields_mapped: MappingStatus::Yes,
                    attributes_mapped: MappingStatus::from_bool(attributes),
                    located_source: Some(FALLBACK_TIER_LABEL.to_string()),
                    mapped_count: if attributes { total_fields } else { 0 },
                    total_fields,
                    message: Some(format!("Probable match '{}'", file.original_name)),
                }
            }
            None => TierResult::negative(
                total_fields,
                format!("No spreadsheet resembles '{}'", definition.name),
            ),
        })
    }
}
