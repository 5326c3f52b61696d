//! Review lifecycle: the state machine that owns a batch between selection
//! and commit.

pub mod machine;

pub use machine::{BatchSnapshot, CommitReport, ReviewMachine, ReviewPhase};
