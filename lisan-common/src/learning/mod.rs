//! Learning-path rules
//!
//! - [`scoring`]: exact-set grading of level submissions
//! - [`unlock`]: progressive unlock status derived at read time
//! - [`sequence`]: dense renumbering after a delete

pub mod scoring;
pub mod sequence;
pub mod unlock;

pub use scoring::{score_submissions, ScoreSummary, Submission};
pub use sequence::{close_sequence_gap, SequenceScope};
pub use unlock::derive_statuses;
