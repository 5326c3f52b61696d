//! Wire types for the batch transfer endpoints.
//!
//! The request and response structs here mirror the backend JSON exactly.
//! Validation result entries are kept as raw `serde_json::Value`s because
//! their business-key field is loosely shaped (string or number, sometimes
//! absent); the correlator is responsible for flattening them.

use serde::{Deserialize, Serialize};

use crate::error::BatchError;

/// Content type assigned to export artifacts, including degraded string
/// responses that get wrapped into one.
pub const XML_CONTENT_TYPE: &str = "application/xml";

// ─────────────────────────────────────────────────────────────────────────────
// Batch kind
// ─────────────────────────────────────────────────────────────────────────────

/// Direction of a batch transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchKind {
    /// Known case records leave the system as one combined XML artifact.
    Export,
    /// Uploaded XML file contents enter the system, one record per file.
    Import,
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Body of a validate-multiple request.
///
/// Export batches send case ids, import batches send raw file contents; the
/// unused field is omitted from the JSON entirely.
#[derive(Debug, Serialize)]
pub struct WireValidateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    pub validation: bool,
}

impl WireValidateRequest {
    /// Builds the request body for the given batch direction.
    pub fn new(kind: BatchKind, payload_refs: &[String]) -> Self {
        let refs = payload_refs.to_vec();
        match kind {
            BatchKind::Export => Self {
                ids: Some(refs),
                files: None,
                validation: true,
            },
            BatchKind::Import => Self {
                ids: None,
                files: Some(refs),
                validation: true,
            },
        }
    }
}

/// Body of an export-multiple commit request.
#[derive(Debug, Serialize)]
pub struct WireExportRequest {
    pub ids: Vec<String>,
}

/// Body of an import-multiple commit request.
#[derive(Debug, Serialize)]
pub struct WireImportRequest {
    pub files: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation response
// ─────────────────────────────────────────────────────────────────────────────

/// A validate-multiple response with its results list checked for shape but
/// not yet flattened.
///
/// The results list length need not equal the request length, and entries
/// carry an external business key rather than a request-order index.
#[derive(Debug, Clone)]
pub struct RawValidationResponse {
    /// One loosely-shaped entry per validated item, in server order.
    pub results: Vec<serde_json::Value>,
    /// Aggregate counts as reported by the server, when present.
    pub total: Option<u64>,
    pub successful: Option<u64>,
    pub failed: Option<u64>,
}

impl RawValidationResponse {
    /// Checks the shape of a validate-multiple response body.
    ///
    /// A body without a `results` array is a failed validation call, never
    /// "all items valid".
    ///
    /// # Errors
    ///
    /// Returns `BatchError::MalformedResponse` if the body is not an object
    /// or its `results` field is missing or not a list.
    pub fn from_body(body: serde_json::Value) -> Result<Self, BatchError> {
        let obj = body
            .as_object()
            .ok_or_else(|| BatchError::MalformedResponse("body is not an object".into()))?;

        let results = match obj.get("results") {
            Some(serde_json::Value::Array(entries)) => entries.clone(),
            Some(_) => {
                return Err(BatchError::MalformedResponse(
                    "results is not a list".into(),
                ))
            }
            None => {
                return Err(BatchError::MalformedResponse(
                    "results list is missing".into(),
                ))
            }
        };

        Ok(Self {
            results,
            total: obj.get("total").and_then(serde_json::Value::as_u64),
            successful: obj.get("successful").and_then(serde_json::Value::as_u64),
            failed: obj.get("failed").and_then(serde_json::Value::as_u64),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commit responses
// ─────────────────────────────────────────────────────────────────────────────

/// The downloadable XML artifact produced by an export commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportArtifact {
    /// Raw artifact bytes.
    pub bytes: Vec<u8>,
    /// Always `application/xml`, including for wrapped string responses.
    pub content_type: String,
    /// Filename from the Content-Disposition header, if the server sent one.
    pub filename: Option<String>,
}

impl ExportArtifact {
    /// Wraps a degraded string/JSON export response into an XML-tagged
    /// artifact, matching how a native binary response is represented.
    pub fn from_text(text: String, filename: Option<String>) -> Self {
        Self {
            bytes: text.into_bytes(),
            content_type: XML_CONTENT_TYPE.to_string(),
            filename,
        }
    }
}

/// One entry of an import-multiple response.
///
/// The backend historically labeled the assigned id `icsr_result_id`; both
/// spellings are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireImportResult {
    pub success: bool,
    #[serde(default, alias = "icsr_result_id")]
    pub id: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Full import-multiple response.
///
/// The results list MAY be shorter or reordered relative to the request; the
/// client hands it over unreconciled and the state machine accounts for
/// missing entries at commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireImportResponse {
    #[serde(default)]
    pub results: Vec<WireImportResult>,
    #[serde(default)]
    pub successful: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Result of a commit call, one variant per batch direction.
#[derive(Debug, Clone)]
pub enum CommitResponse {
    /// Export: a single artifact for the whole batch, or the call failed.
    Export(ExportArtifact),
    /// Import: independent per-item successes and failures.
    Import(WireImportResponse),
}
