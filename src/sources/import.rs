//! Import batch source: uploaded XML files entering the pipeline.
//!
//! Files are read to text concurrently but reassembled in submission order,
//! because the downstream positional join depends on it. A read failure for
//! one file excludes only that file and is surfaced as a distinguishable
//! error before validation is ever attempted.
//!
//! This module also interprets import commit results: the server's per-item
//! outcome list is zipped positionally back onto the submitted items, with
//! missing tail entries accounted as failures.

use std::path::{Path, PathBuf};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::correlate::{BatchItem, ReviewItem};
use crate::error::BatchError;
use crate::transfer::types::WireImportResponse;

/// Error entry assigned to submitted items the server returned no outcome
/// for.
const NO_OUTCOME_ERROR: &str = "No import result for this item";

// ─────────────────────────────────────────────────────────────────────────────
// Refresh signal
// ─────────────────────────────────────────────────────────────────────────────

/// Hook the core fires after an import commit lands at least one item, so
/// the external case-list collaborator can refresh. Firing it is a
/// post-condition of a successful import, not optional.
pub trait CaseListRefresh: Send + Sync {
    fn refresh(&self);
}

// ─────────────────────────────────────────────────────────────────────────────
// File loading
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of reading a batch of uploaded files.
#[derive(Debug)]
pub struct LoadedBatch {
    /// Successfully read files wrapped as batch items, in submission order.
    pub items: Vec<BatchItem>,
    /// Files that could not be read, each as an isolated `FileReadFailed`.
    pub failures: Vec<BatchError>,
}

/// Reads uploaded files to text and wraps them as batch items.
///
/// Reads are issued concurrently; results are reassembled in submission
/// order. Each item gets a generated temporary local id, its file name as
/// display name, and the raw text content as payload reference.
pub async fn load_files(paths: &[PathBuf]) -> LoadedBatch {
    let reads = paths.iter().map(|path| async move {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BatchError::FileReadFailed {
                file: file_name(path),
                message: e.to_string(),
            })
    });

    let mut items = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();

    for (path, result) in paths.iter().zip(join_all(reads).await) {
        match result {
            Ok(content) => items.push(BatchItem {
                local_id: temp_local_id(),
                display_name: file_name(path),
                payload_ref: content,
            }),
            Err(e) => {
                warn!("[IMPORT] {}", e);
                failures.push(e);
            }
        }
    }

    LoadedBatch { items, failures }
}

/// Generated local id for an uploaded file, stable for the batch's lifetime.
fn temp_local_id() -> String {
    format!("temp_{}", Uuid::new_v4())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Commit interpretation
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one submitted item after an import commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub local_id: String,
    pub display_name: String,
    pub success: bool,
    /// Id the backend assigned to the newly created case, on success.
    pub assigned_id: Option<i64>,
    pub error: Option<String>,
}

/// Per-item accounting for a committed import batch.
///
/// Mixed successes and failures within one batch are a normal outcome, not
/// an error; only a transport-level failure of the whole commit call is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub successful: u64,
    pub failed: u64,
    pub outcomes: Vec<ItemOutcome>,
}

/// Joins an import commit response back onto the submitted items.
///
/// The join is positional and tolerant: a results list shorter than the
/// submission yields explicit "no result" failures for the tail, and extra
/// trailing results are dropped. Aggregate counts are recomputed from the
/// joined outcomes so they stay consistent with the per-item view even when
/// the server's own counts do not cover dropped entries.
pub fn interpret_commit(submitted: &[ReviewItem], response: &WireImportResponse) -> ImportReport {
    let outcomes: Vec<ItemOutcome> = submitted
        .iter()
        .enumerate()
        .map(|(i, item)| match response.results.get(i) {
            Some(result) => ItemOutcome {
                local_id: item.local_id.clone(),
                display_name: item.display_name.clone(),
                success: result.success,
                assigned_id: result.id,
                error: result.error.clone(),
            },
            None => ItemOutcome {
                local_id: item.local_id.clone(),
                display_name: item.display_name.clone(),
                success: false,
                assigned_id: None,
                error: Some(NO_OUTCOME_ERROR.to_string()),
            },
        })
        .collect();

    let successful = outcomes.iter().filter(|o| o.success).count() as u64;
    let failed = outcomes.len() as u64 - successful;

    ImportReport {
        successful,
        failed,
        outcomes,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::types::WireImportResult;
    use tempfile::TempDir;

    fn submitted(n: usize) -> Vec<ReviewItem> {
        (0..n)
            .map(|i| ReviewItem {
                local_id: format!("temp_{}", i),
                external_key: None,
                display_name: format!("file_{}.xml", i),
                is_valid: Some(true),
                field_errors: Vec::new(),
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // File loading
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn load_files_preserves_submission_order() {
        let dir = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for i in 0..3 {
            let path = dir.path().join(format!("report_{}.xml", i));
            tokio::fs::write(&path, format!("<ICSR id=\"{}\"/>", i))
                .await
                .unwrap();
            paths.push(path);
        }

        let loaded = load_files(&paths).await;

        assert!(loaded.failures.is_empty());
        assert_eq!(loaded.items.len(), 3);
        for (i, item) in loaded.items.iter().enumerate() {
            assert_eq!(item.display_name, format!("report_{}.xml", i));
            assert_eq!(item.payload_ref, format!("<ICSR id=\"{}\"/>", i));
            assert!(item.local_id.starts_with("temp_"));
        }
    }

    #[tokio::test]
    async fn one_unreadable_file_fails_only_itself() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.xml");
        tokio::fs::write(&good, "<ICSR/>").await.unwrap();
        let missing = dir.path().join("missing.xml");

        let loaded = load_files(&[good, missing]).await;

        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].display_name, "good.xml");

        assert_eq!(loaded.failures.len(), 1);
        match &loaded.failures[0] {
            BatchError::FileReadFailed { file, .. } => assert_eq!(file, "missing.xml"),
            other => panic!("expected FileReadFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn temp_ids_are_unique_within_a_batch() {
        let dir = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for i in 0..4 {
            let path = dir.path().join(format!("{}.xml", i));
            tokio::fs::write(&path, "<ICSR/>").await.unwrap();
            paths.push(path);
        }

        let loaded = load_files(&paths).await;

        let mut ids: Vec<_> = loaded.items.iter().map(|i| i.local_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commit interpretation
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn mixed_outcomes_are_counted_per_item() {
        let items = submitted(3);
        let response = WireImportResponse {
            results: vec![
                WireImportResult {
                    success: true,
                    id: Some(10),
                    error: None,
                    filename: None,
                },
                WireImportResult {
                    success: true,
                    id: Some(11),
                    error: None,
                    filename: None,
                },
                WireImportResult {
                    success: false,
                    id: None,
                    error: Some("bad xml".into()),
                    filename: None,
                },
            ],
            successful: 2,
            failed: 1,
            total: Some(3),
        };

        let report = interpret_commit(&items, &response);

        assert_eq!(report.successful, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.outcomes[0].assigned_id, Some(10));
        assert_eq!(report.outcomes[2].error.as_deref(), Some("bad xml"));
        assert_eq!(report.outcomes[2].local_id, "temp_2");
    }

    #[test]
    fn short_result_list_fails_the_tail_explicitly() {
        let items = submitted(3);
        let response = WireImportResponse {
            results: vec![WireImportResult {
                success: true,
                id: Some(5),
                error: None,
                filename: None,
            }],
            successful: 1,
            failed: 0,
            total: None,
        };

        let report = interpret_commit(&items, &response);

        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 2);
        for outcome in &report.outcomes[1..] {
            assert!(!outcome.success);
            assert_eq!(outcome.error.as_deref(), Some(NO_OUTCOME_ERROR));
        }
    }

    #[test]
    fn counts_come_from_outcomes_not_server_totals() {
        let items = submitted(2);
        // Server claims everything succeeded but only answered for one item.
        let response = WireImportResponse {
            results: vec![WireImportResult {
                success: true,
                id: Some(1),
                error: None,
                filename: None,
            }],
            successful: 2,
            failed: 0,
            total: Some(2),
        };

        let report = interpret_commit(&items, &response);

        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 1);
    }
}
