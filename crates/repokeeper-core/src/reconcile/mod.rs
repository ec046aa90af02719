//! Diff/converge algorithms: branches, membership, and the repository
//! lifecycle state machine that drives them.

pub(crate) mod branch;
pub(crate) mod member;
pub mod repo;

pub use member::MemberOutcome;
pub use repo::{should_process, RepoReconciler, RepoTarget};
