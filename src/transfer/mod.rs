//! Batch transfer layer: wire types, HTTP client, and the `TransferApi`
//! seam the review state machine talks through.
//!
//! Keeping the state machine behind a trait lets tests drive the whole
//! review lifecycle with a scripted fake instead of a live backend.

pub mod client;
pub mod types;

use std::future::Future;
use std::pin::Pin;

use crate::error::BatchError;

pub use client::TransferClient;
pub use types::{
    BatchKind, CommitResponse, ExportArtifact, RawValidationResponse, WireImportResponse,
    WireImportResult, XML_CONTENT_TYPE,
};

/// The three remote batch operations, as seen by the review state machine.
///
/// All operations take an ordered sequence of opaque payload references
/// (case ids for export, raw XML text for import) and return only after the
/// remote side responds or the call fails. Implementations own no batch
/// state across calls.
pub trait TransferApi: Send + Sync {
    /// Sends a batch for validation.
    fn validate<'a>(
        &'a self,
        kind: BatchKind,
        payload_refs: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<RawValidationResponse, BatchError>> + Send + 'a>>;

    /// Performs the final batch transfer.
    fn commit<'a>(
        &'a self,
        kind: BatchKind,
        payload_refs: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<CommitResponse, BatchError>> + Send + 'a>>;
}

impl TransferApi for TransferClient {
    fn validate<'a>(
        &'a self,
        kind: BatchKind,
        payload_refs: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<RawValidationResponse, BatchError>> + Send + 'a>> {
        Box::pin(TransferClient::validate(self, kind, payload_refs))
    }

    fn commit<'a>(
        &'a self,
        kind: BatchKind,
        payload_refs: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<CommitResponse, BatchError>> + Send + 'a>> {
        Box::pin(TransferClient::commit(self, kind, payload_refs))
    }
}
