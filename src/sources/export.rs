//! Export batch source: already-known case records entering the pipeline.
//!
//! The payload reference for an export item is simply the record's id; the
//! backend fetches the case itself. Commit interpretation for this direction
//! is trivial by design: one artifact for the whole batch, or one failure.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::correlate::BatchItem;
use crate::transfer::types::ExportArtifact;

/// A case record selected for export, as known to the caller's case list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    /// The case's id, used as both local id and payload reference.
    pub id: String,
    /// Operator-facing case number; falls back to the id when absent.
    #[serde(default)]
    pub case_number: Option<String>,
}

/// Wraps selected case records as batch items, preserving selection order.
pub fn batch_items(records: &[CaseRecord]) -> Vec<BatchItem> {
    records
        .iter()
        .map(|record| BatchItem {
            local_id: record.id.clone(),
            display_name: record
                .case_number
                .clone()
                .unwrap_or_else(|| record.id.clone()),
            payload_ref: record.id.clone(),
        })
        .collect()
}

/// Name the downloaded artifact should be saved under.
///
/// Prefers the server-assigned name from the Content-Disposition header and
/// falls back to a dated default.
pub fn artifact_file_name(artifact: &ExportArtifact) -> String {
    match &artifact.filename {
        Some(name) => name.clone(),
        None => default_artifact_name(),
    }
}

fn default_artifact_name() -> String {
    format!("icsr_export_{}.xml", Utc::now().format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::types::XML_CONTENT_TYPE;

    #[test]
    fn batch_items_preserve_selection_order_and_ids() {
        let records = vec![
            CaseRecord {
                id: "12".into(),
                case_number: Some("FR-2024-0012".into()),
            },
            CaseRecord {
                id: "7".into(),
                case_number: None,
            },
        ];

        let items = batch_items(&records);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].local_id, "12");
        assert_eq!(items[0].display_name, "FR-2024-0012");
        assert_eq!(items[0].payload_ref, "12");
        assert_eq!(items[1].display_name, "7");
        assert_eq!(items[1].payload_ref, "7");
    }

    #[test]
    fn artifact_name_prefers_server_assigned_filename() {
        let artifact = ExportArtifact {
            bytes: vec![],
            content_type: XML_CONTENT_TYPE.into(),
            filename: Some("e2b_export_12_2_records.xml".into()),
        };

        assert_eq!(artifact_file_name(&artifact), "e2b_export_12_2_records.xml");
    }

    #[test]
    fn artifact_name_falls_back_to_dated_default() {
        let artifact = ExportArtifact {
            bytes: vec![],
            content_type: XML_CONTENT_TYPE.into(),
            filename: None,
        };

        let name = artifact_file_name(&artifact);
        assert!(name.starts_with("icsr_export_"));
        assert!(name.ends_with(".xml"));
    }
}
