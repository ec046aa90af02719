//! GitHub REST client for the repokeeper reconciliation engine.
//!
//! Implements the [`repokeeper_core::platform::HostPlatform`] capability
//! trait over the GitHub v3 REST API, plus the community identity
//! directory used to translate community ids to GitHub logins.

mod client;
mod identity;

pub use client::GithubClient;
pub use identity::OmDirectory;
