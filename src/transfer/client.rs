//! HTTP client for the batch transfer endpoints.
//!
//! Thin async wrapper around the backend's three batch operations:
//!
//! - **validate-multiple** - required-field validation for a whole batch
//! - **export-multiple** - commit an export batch to one XML artifact
//! - **import-multiple** - commit an import batch with per-item outcomes
//!
//! The client is stateless: it owns no batch data across calls and never
//! mutates review state. Any transport or non-2xx failure propagates as a
//! typed `TransferFailed`; the client never silently returns an empty
//! success.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::error::{BatchError, TransferOp};
use crate::transfer::types::{
    BatchKind, CommitResponse, ExportArtifact, RawValidationResponse, WireExportRequest,
    WireImportRequest, WireImportResponse, WireValidateRequest, XML_CONTENT_TYPE,
};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// User agent string for all backend requests.
const CLIENT_USER_AGENT: &str = "e2b-batch/0.1.0";

/// Default request timeout in seconds. A timeout is handled like any other
/// transport failure.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Endpoint paths relative to the configured base URL.
const VALIDATE_PATH: &str = "validate-multiple";
const EXPORT_PATH: &str = "export-multiple";
const IMPORT_PATH: &str = "import-multiple";

/// Longest slice of an error body carried into a `TransferFailed` message.
const ERROR_BODY_SNIPPET_LEN: usize = 200;

// ─────────────────────────────────────────────────────────────────────────────
// TransferClient
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the batch validate/export/import endpoints.
#[derive(Clone)]
pub struct TransferClient {
    /// The underlying HTTP client.
    http: reqwest::Client,
    /// Base URL all endpoint paths are joined onto.
    base_url: Url,
}

impl TransferClient {
    /// Creates a new transfer client for the given backend base URL.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::Internal` if the base URL cannot be parsed or the
    /// HTTP client fails to initialize.
    pub fn new(base_url: &str) -> Result<Self, BatchError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BatchError::Internal(format!("Invalid base URL: {}", e)))?;
        let http = build_http_client()?;
        Ok(Self { http, base_url })
    }

    /// Sends a batch for required-field validation.
    ///
    /// The request carries the full ordered payload list plus the validation
    /// flag. The response's results list length need not equal the request
    /// length; correlating it back onto the batch is the correlator's job.
    ///
    /// # Errors
    ///
    /// - `BatchError::TransferFailed` - network error or non-2xx status
    /// - `BatchError::MalformedResponse` - body without a results list
    pub async fn validate(
        &self,
        kind: BatchKind,
        payload_refs: &[String],
    ) -> Result<RawValidationResponse, BatchError> {
        let request = WireValidateRequest::new(kind, payload_refs);
        let response = self
            .post_json(TransferOp::Validate, VALIDATE_PATH, &request)
            .await?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BatchError::MalformedResponse(format!("not valid JSON: {}", e)))?;

        RawValidationResponse::from_body(body)
    }

    /// Commits a batch, producing the direction-specific outcome.
    ///
    /// Export returns one artifact for the whole batch; import returns the
    /// server's per-item outcome list unreconciled.
    ///
    /// # Errors
    ///
    /// Returns `BatchError::TransferFailed` for transport or non-2xx
    /// failures, `BatchError::MalformedResponse` for an unparseable import
    /// response body.
    pub async fn commit(
        &self,
        kind: BatchKind,
        payload_refs: &[String],
    ) -> Result<CommitResponse, BatchError> {
        match kind {
            BatchKind::Export => self.commit_export(payload_refs).await.map(CommitResponse::Export),
            BatchKind::Import => self.commit_import(payload_refs).await.map(CommitResponse::Import),
        }
    }

    /// Commits an export batch and normalizes the response into an artifact.
    ///
    /// The backend normally answers with a binary XML body, but a degraded
    /// deployment may answer with a plain string or JSON; both are accepted
    /// and the latter is wrapped into an `application/xml` artifact.
    async fn commit_export(&self, payload_refs: &[String]) -> Result<ExportArtifact, BatchError> {
        let request = WireExportRequest {
            ids: payload_refs.to_vec(),
        };
        let response = self
            .post_json(TransferOp::Export, EXPORT_PATH, &request)
            .await?;

        let content_type = header_str(response.headers(), CONTENT_TYPE.as_str());
        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_filename);

        if is_xml_content_type(content_type.as_deref()) {
            let bytes = response.bytes().await.map_err(|e| {
                transfer_failed(TransferOp::Export, format!("could not read body: {}", e))
            })?;
            return Ok(ExportArtifact {
                bytes: bytes.to_vec(),
                content_type: XML_CONTENT_TYPE.to_string(),
                filename,
            });
        }

        // Degraded path: wrap whatever text came back into an XML artifact.
        let text = response.text().await.map_err(|e| {
            transfer_failed(TransferOp::Export, format!("could not read body: {}", e))
        })?;
        Ok(ExportArtifact::from_text(text, filename))
    }

    /// Commits an import batch.
    async fn commit_import(&self, payload_refs: &[String]) -> Result<WireImportResponse, BatchError> {
        let request = WireImportRequest {
            files: payload_refs.to_vec(),
        };
        let response = self
            .post_json(TransferOp::Import, IMPORT_PATH, &request)
            .await?;

        response
            .json()
            .await
            .map_err(|e| BatchError::MalformedResponse(format!("import response: {}", e)))
    }

    /// POSTs a JSON body with timing, logging, and status handling.
    async fn post_json<B: Serialize>(
        &self,
        operation: TransferOp,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, BatchError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|_| BatchError::Internal(format!("Invalid path: {}", path)))?;

        let start = Instant::now();
        let result = self.http.post(url.clone()).json(body).send().await;
        let duration_ms = start.elapsed().as_millis();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                info!("[XFER] POST {} FAILED {}ms", url.path(), duration_ms);
                return Err(transfer_failed(
                    operation,
                    format!("connection failed: {}", e),
                ));
            }
        };

        let status = response.status();
        info!(
            "[XFER] POST {} {} {}ms",
            url.path(),
            status.as_u16(),
            duration_ms
        );

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unable to read error body"));
            let snippet: String = body.chars().take(ERROR_BODY_SNIPPET_LEN).collect();
            return Err(transfer_failed(
                operation,
                format!("HTTP {}: {}", status.as_u16(), snippet),
            ));
        }

        Ok(response)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn transfer_failed(operation: TransferOp, message: String) -> BatchError {
    BatchError::TransferFailed { operation, message }
}

/// Reads a header value as a string, if present and valid UTF-8.
fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Returns true for XML content types, ignoring charset parameters.
fn is_xml_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        Some(value) => {
            let media_type = value.split(';').next().unwrap_or("").trim();
            media_type.eq_ignore_ascii_case("application/xml")
                || media_type.eq_ignore_ascii_case("text/xml")
        }
        None => false,
    }
}

/// Extracts the filename from a Content-Disposition attachment header.
fn attachment_filename(header: &str) -> Option<String> {
    let marker = "filename=";
    let start = header.find(marker)? + marker.len();
    let rest = &header[start..];
    let name = rest.split(';').next().unwrap_or(rest).trim();
    let name = name.trim_matches('"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Builds the configured HTTP client.
fn build_http_client() -> Result<reqwest::Client, BatchError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| BatchError::Internal(format!("Failed to build HTTP client: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_new_accepts_valid_base_url() {
        let result = TransferClient::new("https://backend.example.com/api/");
        assert!(result.is_ok());
    }

    #[test]
    fn client_new_rejects_garbage_base_url() {
        let result = TransferClient::new("not a url");
        assert!(matches!(result, Err(BatchError::Internal(_))));
    }

    #[test]
    fn endpoint_paths_join_onto_base_url() {
        let client = TransferClient::new("https://backend.example.com/api/").unwrap();

        let url = client.base_url.join(EXPORT_PATH).unwrap();
        assert_eq!(url.as_str(), "https://backend.example.com/api/export-multiple");

        let url = client.base_url.join(VALIDATE_PATH).unwrap();
        assert_eq!(
            url.as_str(),
            "https://backend.example.com/api/validate-multiple"
        );

        let url = client.base_url.join(IMPORT_PATH).unwrap();
        assert_eq!(url.as_str(), "https://backend.example.com/api/import-multiple");
    }

    #[test]
    fn xml_content_type_detection() {
        assert!(is_xml_content_type(Some("application/xml")));
        assert!(is_xml_content_type(Some("application/XML; charset=utf-8")));
        assert!(is_xml_content_type(Some("text/xml")));

        assert!(!is_xml_content_type(Some("application/json")));
        assert!(!is_xml_content_type(Some("text/plain")));
        assert!(!is_xml_content_type(None));
    }

    #[test]
    fn attachment_filename_parses_quoted_and_bare_names() {
        assert_eq!(
            attachment_filename("attachment; filename=\"e2b_export_1_3_records.xml\""),
            Some("e2b_export_1_3_records.xml".to_string())
        );
        assert_eq!(
            attachment_filename("attachment; filename=export.xml"),
            Some("export.xml".to_string())
        );
        assert_eq!(
            attachment_filename("attachment; filename=export.xml; size=123"),
            Some("export.xml".to_string())
        );
    }

    #[test]
    fn attachment_filename_rejects_missing_or_empty_names() {
        assert_eq!(attachment_filename("attachment"), None);
        assert_eq!(attachment_filename("attachment; filename=\"\""), None);
    }

    #[test]
    fn build_http_client_succeeds() {
        assert!(build_http_client().is_ok());
    }
}
