//! Result correlation: turning a raw validation response into per-item
//! review data.
//!
//! The positional join and its business-key fallback rules are isolated
//! here so the review state machine never sees a raw response.

pub mod correlator;

pub use correlator::{
    correlate, flatten_entry, BatchItem, FieldError, ReviewItem, SYNTHETIC_ERROR_ID, UNKNOWN_KEY,
};
