//! Correlates raw validation results back onto the originating batch items.
//!
//! The validator labels each result entry with an external business key (the
//! E2B C.1.1 sender safety report unique id), not with the item's local
//! identifier and not with a request-order index. For import batches that key
//! is only assigned server-side from the as-yet-unparsed file, so the only
//! join available before parsing is positional: flattened entry *i* belongs
//! to request item *i*. That assumption lives entirely in this module; a
//! keyed join can replace it without touching the state machine.

use serde::{Deserialize, Serialize};

use crate::transfer::types::RawValidationResponse;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Field carrying the business key in a validation result entry.
const BUSINESS_KEY_FIELD: &str = "c_1_1";

/// Field carrying the nested fieldId -> message map in a result entry.
const VALIDATION_STATUS_FIELD: &str = "validation_status";

/// Defined fallback when a result entry carries no business key.
pub const UNKNOWN_KEY: &str = "unknown";

/// Field id of the synthetic error assigned to items the server returned no
/// result for.
pub const SYNTHETIC_ERROR_ID: &str = "validation_error";

/// Description of the synthetic no-result error.
const NO_RESULT_DESCRIPTION: &str = "No validation result for this file";

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// An item entering the pipeline, before validation.
///
/// `payload_ref` is opaque to everything but the transfer client: a case id
/// for export batches, raw XML text for import batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// Stable local identifier: the case id, or a generated temporary id for
    /// uploaded files.
    pub local_id: String,
    /// What the operator sees in the review list.
    pub display_name: String,
    /// Opaque reference to the content to be transferred.
    pub payload_ref: String,
}

/// One violation of a required or invalid field, scoped to a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// E2B field id, e.g. `c_1_2_date_creation`.
    pub field_id: String,
    /// Display label. The validator sends none, so this repeats the field id.
    pub label: String,
    /// Human-readable message from the validator.
    pub description: String,
    /// Business key of the result entry this error came from. Synthetic
    /// no-result errors carry none.
    pub external_key: Option<String>,
}

/// The unit the operator reviews: a batch item joined with its correlated
/// validation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub local_id: String,
    /// Business key the validator assigned, once known.
    pub external_key: Option<String>,
    pub display_name: String,
    /// `None` until a validation result has been correlated onto this item.
    pub is_valid: Option<bool>,
    pub field_errors: Vec<FieldError>,
}

impl ReviewItem {
    /// Wraps a batch item as a not-yet-validated review item, so the review
    /// list can be shown before validation completes.
    pub fn pending(item: &BatchItem) -> Self {
        Self {
            local_id: item.local_id.clone(),
            external_key: None,
            display_name: item.display_name.clone(),
            is_valid: None,
            field_errors: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Correlation
// ─────────────────────────────────────────────────────────────────────────────

/// Joins a validation response onto the items it was requested for.
///
/// Produces exactly one `ReviewItem` per input item, in input order; the
/// response is joined by position. Items past the end of the results list
/// are marked invalid with a single synthetic `validation_error` entry
/// rather than being silently treated as valid. Extra trailing results are
/// dropped.
pub fn correlate(items: &[BatchItem], response: &RawValidationResponse) -> Vec<ReviewItem> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match response.results.get(i) {
            Some(entry) => {
                let (external_key, field_errors) = flatten_entry(entry);
                ReviewItem {
                    local_id: item.local_id.clone(),
                    external_key: Some(external_key),
                    display_name: item.display_name.clone(),
                    is_valid: Some(field_errors.is_empty()),
                    field_errors,
                }
            }
            None => ReviewItem {
                local_id: item.local_id.clone(),
                external_key: None,
                display_name: item.display_name.clone(),
                is_valid: Some(false),
                field_errors: vec![no_result_error()],
            },
        })
        .collect()
}

/// Flattens one result entry into its business key and field-error list.
///
/// The entry's business key is read from `c_1_1` (string or number), falling
/// back to the literal marker `"unknown"` when absent. The nested
/// `validation_status` map becomes one `FieldError` per field, each tagged
/// with that key. An entry that is not even an object flattens to an empty
/// error list under the unknown key.
pub fn flatten_entry(entry: &serde_json::Value) -> (String, Vec<FieldError>) {
    let external_key = entry
        .get(BUSINESS_KEY_FIELD)
        .and_then(scalar_to_string)
        .unwrap_or_else(|| UNKNOWN_KEY.to_string());

    let mut field_errors = Vec::new();
    if let Some(status) = entry
        .get(VALIDATION_STATUS_FIELD)
        .and_then(serde_json::Value::as_object)
    {
        for (field_id, message) in status {
            field_errors.push(FieldError {
                field_id: field_id.clone(),
                label: field_id.clone(),
                description: scalar_to_string(message).unwrap_or_else(|| message.to_string()),
                external_key: Some(external_key.clone()),
            });
        }
    }

    (external_key, field_errors)
}

/// Builds the synthetic error for an item the server dropped from its
/// results list.
fn no_result_error() -> FieldError {
    FieldError {
        field_id: SYNTHETIC_ERROR_ID.to_string(),
        label: SYNTHETIC_ERROR_ID.to_string(),
        description: NO_RESULT_DESCRIPTION.to_string(),
        external_key: None,
    }
}

/// Renders a string or number JSON value as a plain string.
fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
