//! The review state machine: owns a batch from selection through
//! validation, review, exclusion, and commit.
//!
//! Lifecycle: `Empty -> Selecting -> Validating -> Reviewing -> Committing
//! -> Completed`, with a Reviewing self-loop on exclusion and a return to
//! `Empty` on close or when the last item is excluded. The machine
//! exclusively owns the current batch; the transfer client is stateless and
//! source adapters hand their content over at selection time.
//!
//! State lives behind an async mutex that is never held across a remote
//! call, so the operator can exclude items or close the review surface
//! while a validate or commit is in flight. In-flight calls are not
//! cancelled at the transport level; their results are discarded via an
//! epoch check if the batch they belong to is gone by the time they return.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::correlate::{correlate, BatchItem, ReviewItem};
use crate::error::BatchError;
use crate::sources::import::{interpret_commit, CaseListRefresh, ImportReport};
use crate::transfer::types::ExportArtifact;
use crate::transfer::{BatchKind, CommitResponse, TransferApi};

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Where a batch is in its lifecycle. `Empty` means no batch is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReviewPhase {
    Empty,
    Selecting,
    Validating,
    Reviewing,
    Committing,
    Completed,
}

impl std::fmt::Display for ReviewPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReviewPhase::Empty => "Empty",
            ReviewPhase::Selecting => "Selecting",
            ReviewPhase::Validating => "Validating",
            ReviewPhase::Reviewing => "Reviewing",
            ReviewPhase::Committing => "Committing",
            ReviewPhase::Completed => "Completed",
        };
        f.write_str(name)
    }
}

/// Read-only snapshot of the current batch for presentation layers.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSnapshot {
    pub kind: BatchKind,
    pub phase: ReviewPhase,
    pub items: Vec<ReviewItem>,
    /// Batch-level error from the most recent failed call, reported once
    /// per call rather than per item.
    pub last_error: Option<String>,
}

/// Caller-visible outcome of a committed batch.
#[derive(Debug, Clone)]
pub enum CommitReport {
    /// Export: one downloadable artifact for the whole batch.
    Exported(ExportArtifact),
    /// Import: independent per-item outcomes with aggregate counts.
    Imported(ImportReport),
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal state
// ─────────────────────────────────────────────────────────────────────────────

struct BatchOperation {
    kind: BatchKind,
    /// Review items in original selection order; the list shrinks as
    /// exclusions occur and never grows back.
    items: Vec<ReviewItem>,
    /// The original selection with payload references, untouched by
    /// exclusion. Current payloads are derived by filtering this against
    /// the live item ids, preserving order.
    originals: Vec<BatchItem>,
    phase: ReviewPhase,
    last_error: Option<String>,
}

impl BatchOperation {
    /// Payload-carrying items for the current (possibly reduced) list, in
    /// original order.
    fn live_originals(&self) -> Vec<BatchItem> {
        let live: HashSet<&str> = self.items.iter().map(|i| i.local_id.as_str()).collect();
        self.originals
            .iter()
            .filter(|item| live.contains(item.local_id.as_str()))
            .cloned()
            .collect()
    }
}

struct MachineState {
    /// Bumped whenever the machine returns to `Empty` or a new batch
    /// replaces the old one; in-flight results from an older epoch are
    /// discarded on arrival.
    epoch: u64,
    /// At most one remote call per batch may be outstanding.
    in_flight: bool,
    op: Option<BatchOperation>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ReviewMachine
// ─────────────────────────────────────────────────────────────────────────────

/// Drives batch selection, validation, review, exclusion, and commit.
///
/// Cloning is cheap; clones share the same batch state, which is how a
/// presentation layer holds one handle for rendering while another drives
/// transitions.
#[derive(Clone)]
pub struct ReviewMachine {
    api: Arc<dyn TransferApi>,
    state: Arc<Mutex<MachineState>>,
    refresh: Option<Arc<dyn CaseListRefresh>>,
}

impl ReviewMachine {
    /// Creates a machine in the `Empty` state.
    pub fn new(api: Arc<dyn TransferApi>) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(MachineState {
                epoch: 0,
                in_flight: false,
                op: None,
            })),
            refresh: None,
        }
    }

    /// Registers the hook fired after an import commit lands at least one
    /// item, so the external case list can refresh.
    pub fn with_refresh_hook(mut self, hook: Arc<dyn CaseListRefresh>) -> Self {
        self.refresh = Some(hook);
        self
    }

    /// Opens a new batch from the operator's selection.
    ///
    /// The review list is populated immediately with every item pending
    /// (`is_valid = None`), so it can be shown before validation completes.
    /// Any previously open batch is replaced; if one was abandoned mid-call
    /// its result is discarded when it arrives.
    ///
    /// # Errors
    ///
    /// - `BatchError::BatchBusy` - a call for the current batch is in flight
    /// - `BatchError::EmptyBatch` - the selection is empty
    pub async fn start_batch(
        &self,
        kind: BatchKind,
        items: Vec<BatchItem>,
    ) -> Result<(), BatchError> {
        let mut state = self.state.lock().await;
        if state.in_flight {
            return Err(BatchError::BatchBusy);
        }
        if items.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        info!("[REVIEW] Starting {:?} batch of {} items", kind, items.len());
        state.epoch += 1;
        state.op = Some(BatchOperation {
            kind,
            items: items.iter().map(ReviewItem::pending).collect(),
            originals: items,
            phase: ReviewPhase::Selecting,
            last_error: None,
        });
        Ok(())
    }

    /// Sends the current item list for validation and correlates the
    /// results back onto it.
    ///
    /// On success every item's `is_valid`/`field_errors` is populated in
    /// place, preserving order, and exclusions made while the call was in
    /// flight are re-applied. On failure the machine moves to `Reviewing`
    /// with every item marked invalid and a single batch-level error, never
    /// with stale pending validities.
    ///
    /// # Errors
    ///
    /// - `BatchError::NoBatch` / `BatchBusy` / `PhaseMismatch` - lifecycle
    /// - `BatchError::TransferFailed` / `MalformedResponse` - the call
    pub async fn validate_batch(&self) -> Result<(), BatchError> {
        let (epoch, kind, submitted) = {
            let mut state = self.state.lock().await;
            if state.in_flight {
                return Err(BatchError::BatchBusy);
            }
            let epoch = state.epoch;
            let op = state.op.as_mut().ok_or(BatchError::NoBatch)?;
            match op.phase {
                ReviewPhase::Selecting | ReviewPhase::Reviewing => {}
                phase => {
                    return Err(BatchError::PhaseMismatch {
                        phase: phase.to_string(),
                    })
                }
            }
            let kind = op.kind;
            let submitted = op.live_originals();
            op.phase = ReviewPhase::Validating;
            state.in_flight = true;
            (epoch, kind, submitted)
        };

        let refs: Vec<String> = submitted.iter().map(|i| i.payload_ref.clone()).collect();
        let result = self.api.validate(kind, &refs).await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            info!("[REVIEW] Discarding validation result for a closed batch");
            return Ok(());
        }
        state.in_flight = false;
        let Some(op) = state.op.as_mut() else {
            return Ok(());
        };

        match result {
            Ok(response) => {
                // Join against the full list that was sent, then re-apply
                // any exclusions made during the wait.
                let reviewed = correlate(&submitted, &response);
                let live: HashSet<String> =
                    op.items.iter().map(|i| i.local_id.clone()).collect();
                op.items = reviewed
                    .into_iter()
                    .filter(|item| live.contains(&item.local_id))
                    .collect();
                op.phase = ReviewPhase::Reviewing;
                op.last_error = None;
                info!(
                    "[REVIEW] Validation complete: {}/{} items valid",
                    op.items.iter().filter(|i| i.is_valid == Some(true)).count(),
                    op.items.len()
                );
                Ok(())
            }
            Err(e) => {
                warn!("[REVIEW] Validation failed: {}", e);
                for item in &mut op.items {
                    item.is_valid = Some(false);
                    item.field_errors.clear();
                }
                op.phase = ReviewPhase::Reviewing;
                op.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Removes one item from the review list by local id.
    ///
    /// Unknown ids are ignored. If the removal empties the list the machine
    /// goes to `Empty` and any in-flight validation result is discarded on
    /// arrival; a batch of zero items is not reviewable.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::NoBatch` when no batch is open and
    /// `BatchError::PhaseMismatch` once the batch is committing or done.
    pub async fn exclude_item(&self, local_id: &str) -> Result<(), BatchError> {
        let mut state = self.state.lock().await;
        let op = state.op.as_mut().ok_or(BatchError::NoBatch)?;
        match op.phase {
            ReviewPhase::Committing | ReviewPhase::Completed => {
                return Err(BatchError::PhaseMismatch {
                    phase: op.phase.to_string(),
                })
            }
            _ => {}
        }

        op.items.retain(|item| item.local_id != local_id);
        if op.items.is_empty() {
            info!("[REVIEW] Last item excluded, closing review");
            state.epoch += 1;
            state.in_flight = false;
            state.op = None;
        }
        Ok(())
    }

    /// Commits the current (possibly reduced) item list.
    ///
    /// A transport-level failure returns the machine to `Reviewing` with a
    /// batch-level error. An import whose items individually succeeded or
    /// failed in any mix still reaches `Completed`; the mix is reported in
    /// the `ImportReport`, and the refresh hook fires when at least one
    /// item landed.
    ///
    /// # Errors
    ///
    /// - `BatchError::NoBatch` / `BatchBusy` / `PhaseMismatch` - lifecycle
    /// - `BatchError::TransferFailed` / `MalformedResponse` - the call
    pub async fn commit_batch(&self) -> Result<CommitReport, BatchError> {
        let (epoch, kind, submitted, refs) = {
            let mut state = self.state.lock().await;
            if state.in_flight {
                return Err(BatchError::BatchBusy);
            }
            let epoch = state.epoch;
            let op = state.op.as_mut().ok_or(BatchError::NoBatch)?;
            if op.phase != ReviewPhase::Reviewing {
                return Err(BatchError::PhaseMismatch {
                    phase: op.phase.to_string(),
                });
            }

            let kind = op.kind;
            let submitted = op.items.clone();
            let refs: Vec<String> = op
                .live_originals()
                .into_iter()
                .map(|i| i.payload_ref)
                .collect();
            op.phase = ReviewPhase::Committing;
            state.in_flight = true;
            (epoch, kind, submitted, refs)
        };

        info!("[REVIEW] Committing {:?} batch of {} items", kind, refs.len());
        let result = self.api.commit(kind, &refs).await;

        let mut state = self.state.lock().await;
        let stale = state.epoch != epoch;
        if !stale {
            state.in_flight = false;
        }

        match result {
            Ok(CommitResponse::Export(artifact)) => {
                info!(
                    "[REVIEW] Export commit complete: {} bytes",
                    artifact.bytes.len()
                );
                if let Some(op) = state.op.as_mut().filter(|_| !stale) {
                    op.phase = ReviewPhase::Completed;
                    op.last_error = None;
                }
                Ok(CommitReport::Exported(artifact))
            }
            Ok(CommitResponse::Import(response)) => {
                let report = interpret_commit(&submitted, &response);
                info!(
                    "[REVIEW] Import commit complete: {} succeeded, {} failed",
                    report.successful, report.failed
                );
                if let Some(op) = state.op.as_mut().filter(|_| !stale) {
                    op.phase = ReviewPhase::Completed;
                    op.last_error = None;
                }
                drop(state);
                // The import happened server-side even if the review surface
                // is already closed; the case list is stale either way.
                if report.successful > 0 {
                    if let Some(hook) = &self.refresh {
                        hook.refresh();
                    }
                }
                Ok(CommitReport::Imported(report))
            }
            Err(e) => {
                warn!("[REVIEW] Commit failed: {}", e);
                if let Some(op) = state.op.as_mut().filter(|_| !stale) {
                    op.phase = ReviewPhase::Reviewing;
                    op.last_error = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Closes the review surface, returning the machine to `Empty`.
    ///
    /// In-flight calls are not cancelled; their results are discarded when
    /// they return.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if state.op.is_some() || state.in_flight {
            info!("[REVIEW] Closing batch");
        }
        state.epoch += 1;
        state.in_flight = false;
        state.op = None;
    }

    /// Snapshot of the current batch, or `None` when the machine is
    /// `Empty`.
    pub async fn review_state(&self) -> Option<BatchSnapshot> {
        let state = self.state.lock().await;
        state.op.as_ref().map(|op| BatchSnapshot {
            kind: op.kind,
            phase: op.phase,
            items: op.items.clone(),
            last_error: op.last_error.clone(),
        })
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> ReviewPhase {
        let state = self.state.lock().await;
        state
            .op
            .as_ref()
            .map(|op| op.phase)
            .unwrap_or(ReviewPhase::Empty)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
