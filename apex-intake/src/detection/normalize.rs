//! Result normalization
//!
//! Tier answers are combined per axis (first tier wins when it decided),
//! then terminalized so that no processed report is left `pending`.

use super::types::TierResult;
use crate::models::{MappingStatus, ReportTask};

/// Message recorded when neither tier could decide an axis and no tier said why
pub const INCONCLUSIVE_MESSAGE: &str = "No tier could resolve this report";

/// Lowercase ASCII alphanumerics only, for name matching
///
/// `"Statement_of-Investments.xlsx"` → `"statementofinvestmentsxlsx"`
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Merge the rule tier's answer with the fallback tier's
///
/// Each axis keeps the primary value if it is `yes`/`no`, else takes the
/// fallback value (`pending` if there is none). `located_source` follows the
/// fields axis; counts follow the attributes axis.
pub fn merge_tier_results(primary: &TierResult, fallback: Option<&TierResult>) -> TierResult {
    let Some(fallback) = fallback else {
        return primary.clone();
    };

    let (fields_mapped, located_source) = if primary.fields_mapped.is_decided() {
        (primary.fields_mapped, primary.located_source.clone())
    } else {
        (fallback.fields_mapped, fallback.located_source.clone())
    };

    let (attributes_mapped, mapped_count, total_fields) = if primary.attributes_mapped.is_decided() {
        (
            primary.attributes_mapped,
            primary.mapped_count,
            primary.total_fields,
        )
    } else {
        (
            fallback.attributes_mapped,
            fallback.mapped_count,
            fallback.total_fields,
        )
    };

    let message = if primary.is_conclusive() {
        primary.message.clone()
    } else {
        fallback.message.clone().or_else(|| primary.message.clone())
    };

    TierResult {
        fields_mapped,
        attributes_mapped,
        located_source,
        mapped_count,
        total_fields,
        message,
    }
}

/// Force every undecided axis to `no` and build the stored task
pub fn terminalize(report_key: &str, merged: TierResult) -> ReportTask {
    let fields_mapped = MappingStatus::from_bool(merged.fields_mapped.is_yes());
    let attributes_mapped = MappingStatus::from_bool(merged.attributes_mapped.is_yes());

    let message = match merged.message {
        Some(message) => Some(message),
        None if !merged.fields_mapped.is_decided() || !merged.attributes_mapped.is_decided() => {
            Some(INCONCLUSIVE_MESSAGE.to_string())
        }
        None => None,
    };

    ReportTask {
        report_key: report_key.to_string(),
        fields_mapped,
        attributes_mapped,
        located_source: if fields_mapped.is_yes() {
            merged.located_source
        } else {
            None
        },
        mapped_count: merged.mapped_count.min(merged.total_fields),
        total_fields: merged.total_fields,
        message,
    }
}
