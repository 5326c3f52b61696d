//! Batch validation and correlation pipeline for E2B(R3) case transfers.
//!
//! Case records (export) or uploaded XML files (import) are validated as a
//! batch against a remote endpoint, the per-item results are correlated
//! back onto the selection, and the operator reviews, excludes, and finally
//! commits what remains.

pub mod correlate;
pub mod error;
pub mod review;
pub mod sources;
pub mod transfer;

pub use crate::correlate::{BatchItem, FieldError, ReviewItem};
pub use crate::error::{BatchError, TransferOp};
pub use crate::review::{BatchSnapshot, CommitReport, ReviewMachine, ReviewPhase};
pub use crate::sources::{CaseListRefresh, CaseRecord, ImportReport, ItemOutcome};
pub use crate::transfer::{BatchKind, ExportArtifact, TransferApi, TransferClient};
