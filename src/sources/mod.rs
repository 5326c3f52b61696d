//! Batch source adapters: the two symmetric entry points that populate the
//! pipeline's input, and the matching commit-result interpreters.
//!
//! - **export** - already-known case records; commit yields one artifact
//!   for the whole batch
//! - **import** - uploaded XML files read to text; commit yields per-item
//!   success/failure accounting and a case-list refresh signal

pub mod export;
pub mod import;

pub use export::{artifact_file_name, batch_items, CaseRecord};
pub use import::{
    interpret_commit, load_files, CaseListRefresh, ImportReport, ItemOutcome, LoadedBatch,
};
