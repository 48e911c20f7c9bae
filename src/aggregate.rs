//! Result aggregation: merge per-stage outcomes into one composite result.
//!
//! A pure, order-independent merge. `Success` payloads fill the matching
//! result field; every other outcome leaves its field `None` and is
//! explained by the stage's entry in `stage_statuses`. A missing field is
//! always distinguishable from a genuinely empty one.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::models::{
    AnalysisResult, OverallStatus, StageName, StagePayload, StageResult, StageStatus,
};

/// Merge stage results for one run into an immutable [`AnalysisResult`].
///
/// `Complete` iff every stage succeeded; `Failed` iff every stage failed or
/// timed out; otherwise `PartialSuccess`. A skipped stage is neither a
/// success nor a failure.
pub fn aggregate(
    document_id: &str,
    stage_results: BTreeMap<StageName, StageResult>,
) -> AnalysisResult {
    let mut summary = None;
    let mut plagiarism = None;
    let mut citations = None;
    let mut fact_checks = None;
    let mut stage_statuses: BTreeMap<StageName, StageStatus> = BTreeMap::new();

    for (name, result) in stage_results {
        stage_statuses.insert(name, result.status());
        if let StageResult::Success(payload) = result {
            match payload {
                StagePayload::Summary(value) => summary = Some(value),
                StagePayload::Plagiarism(report) => plagiarism = Some(report),
                StagePayload::Citations(list) => citations = Some(list),
                StagePayload::FactChecks(list) => fact_checks = Some(list),
            }
        }
    }

    let total = stage_statuses.len();
    let successes = stage_statuses
        .values()
        .filter(|s| matches!(s, StageStatus::Success))
        .count();
    let failures = stage_statuses
        .values()
        .filter(|s| matches!(s, StageStatus::Failed { .. } | StageStatus::TimedOut))
        .count();

    let overall_status = if total > 0 && successes == total {
        OverallStatus::Complete
    } else if total > 0 && failures == total {
        OverallStatus::Failed
    } else {
        OverallStatus::PartialSuccess
    };

    AnalysisResult {
        document_id: document_id.to_string(),
        summary,
        plagiarism,
        citations,
        fact_checks,
        overall_status,
        stage_statuses,
        created_at: Utc::now(),
    }
}
