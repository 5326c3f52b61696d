use serde::Serialize;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Transfer operations
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies which remote call a `TransferFailed` error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferOp {
    /// The validate-multiple call.
    Validate,
    /// The export-multiple commit call.
    Export,
    /// The import-multiple commit call.
    Import,
}

impl std::fmt::Display for TransferOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransferOp::Validate => "validate",
            TransferOp::Export => "export",
            TransferOp::Import => "import",
        };
        f.write_str(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BatchError
// ─────────────────────────────────────────────────────────────────────────────

/// User-friendly error presentation for the frontend.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Error type for the batch validation and transfer pipeline.
///
/// Partial import failure is deliberately absent: a commit that succeeds at
/// the transport level but fails for individual items is a data outcome
/// (`ImportReport`), not an error.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Remote calls ──────────────────────────────────────────────────────────
    #[error("{operation} call failed: {message}")]
    TransferFailed {
        operation: TransferOp,
        message: String,
    },

    #[error("Malformed validation response: {0}")]
    MalformedResponse(String),

    // ── File sources ──────────────────────────────────────────────────────────
    #[error("Could not read {file}: {message}")]
    FileReadFailed { file: String, message: String },

    // ── Batch lifecycle ───────────────────────────────────────────────────────
    #[error("No batch is open")]
    NoBatch,

    #[error("Batch has no items")]
    EmptyBatch,

    #[error("Another call for this batch is still in flight")]
    BatchBusy,

    #[error("Operation not allowed while the batch is {phase}")]
    PhaseMismatch { phase: String },

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchError {
    /// Converts the error into a user-friendly presentation suitable for UI
    /// display. Batch-level errors are reported once per failed call, never
    /// per item.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            // ── Remote calls ──────────────────────────────────────────────────
            BatchError::TransferFailed { operation, .. } => {
                let (title, message) = match operation {
                    TransferOp::Validate => (
                        "Validation Failed",
                        "The batch could not be validated. No item was checked.",
                    ),
                    TransferOp::Export => (
                        "Export Failed",
                        "The export could not be completed. No file was generated.",
                    ),
                    TransferOp::Import => (
                        "Import Failed",
                        "The import could not be completed. No file was imported.",
                    ),
                };
                ErrorPresentation {
                    title: title.into(),
                    message: message.into(),
                    action: Some("Check your connection and try again".into()),
                }
            }

            BatchError::MalformedResponse(_) => ErrorPresentation {
                title: "Unexpected Server Response".into(),
                message: "The server returned a response that could not be understood.".into(),
                action: Some("Try again".into()),
            },

            // ── File sources ──────────────────────────────────────────────────
            BatchError::FileReadFailed { file, .. } => ErrorPresentation {
                title: "File Could Not Be Read".into(),
                message: format!("{} could not be read and was left out of the batch.", file),
                action: Some("Check the file and select it again".into()),
            },

            // ── Batch lifecycle ───────────────────────────────────────────────
            BatchError::NoBatch => ErrorPresentation {
                title: "No Batch Open".into(),
                message: "There is no batch to act on. Select items first.".into(),
                action: Some("Select cases or files".into()),
            },

            BatchError::EmptyBatch => ErrorPresentation {
                title: "Empty Batch".into(),
                message: "At least one item must be selected.".into(),
                action: Some("Select cases or files".into()),
            },

            BatchError::BatchBusy => ErrorPresentation {
                title: "Operation In Progress".into(),
                message: "Another operation for this batch is still running.".into(),
                action: Some("Wait for it to finish".into()),
            },

            BatchError::PhaseMismatch { .. } => ErrorPresentation {
                title: "Not Ready".into(),
                message: "The batch is not in a state where this action is allowed.".into(),
                action: None,
            },

            // ── Generic ───────────────────────────────────────────────────────
            BatchError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }
}

// Allow BatchError to cross the API boundary as its UI presentation
impl Serialize for BatchError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns all BatchError variants for exhaustive testing.
    fn all_variants() -> Vec<BatchError> {
        vec![
            BatchError::TransferFailed {
                operation: TransferOp::Validate,
                message: "HTTP 502".into(),
            },
            BatchError::TransferFailed {
                operation: TransferOp::Export,
                message: "connection refused".into(),
            },
            BatchError::TransferFailed {
                operation: TransferOp::Import,
                message: "HTTP 500".into(),
            },
            BatchError::MalformedResponse("results is not a list".into()),
            BatchError::FileReadFailed {
                file: "case_42.xml".into(),
                message: "permission denied".into(),
            },
            BatchError::NoBatch,
            BatchError::EmptyBatch,
            BatchError::BatchBusy,
            BatchError::PhaseMismatch {
                phase: "Selecting".into(),
            },
            BatchError::Internal("something broke".into()),
        ]
    }

    #[test]
    fn all_variants_have_nonempty_title_and_message() {
        for variant in all_variants() {
            let presentation = variant.to_presentation();
            assert!(
                !presentation.title.trim().is_empty(),
                "Empty title for {:?}",
                variant
            );
            assert!(
                !presentation.message.trim().is_empty(),
                "Empty message for {:?}",
                variant
            );
        }
    }

    #[test]
    fn transfer_failures_name_the_operation_in_display() {
        let cases = [
            (TransferOp::Validate, "validate"),
            (TransferOp::Export, "export"),
            (TransferOp::Import, "import"),
        ];

        for (op, expected) in cases {
            let err = BatchError::TransferFailed {
                operation: op,
                message: "HTTP 500".into(),
            };
            assert!(
                err.to_string().starts_with(expected),
                "Display for {:?} should start with '{}', got: {}",
                op,
                expected,
                err
            );
        }
    }

    #[test]
    fn file_read_failed_presentation_names_the_file() {
        let err = BatchError::FileReadFailed {
            file: "report_7.xml".into(),
            message: "not found".into(),
        };

        let presentation = err.to_presentation();
        assert!(presentation.message.contains("report_7.xml"));
    }

    #[test]
    fn serialization_produces_presentation_fields() {
        for variant in all_variants() {
            let json = serde_json::to_string(&variant)
                .unwrap_or_else(|_| panic!("Failed to serialize {:?}", variant));
            let parsed: serde_json::Value = serde_json::from_str(&json)
                .unwrap_or_else(|_| panic!("Failed to parse JSON for {:?}", variant));

            assert!(
                parsed.get("title").is_some(),
                "missing 'title' for {:?}",
                variant
            );
            assert!(
                parsed.get("message").is_some(),
                "missing 'message' for {:?}",
                variant
            );
            assert!(
                parsed.get("action").is_some(),
                "missing 'action' for {:?}",
                variant
            );
        }
    }
}
