//! Error types for Vaultline operations.
//!
//! This module defines the main error type [`VaultlineError`] which covers
//! input validation, network fetching, index and note I/O, and the dossier
//! citation rule, plus [`FetchError`], the classified transport failure that
//! drives the retry policy in [`crate::fetch`].
//!
//! # Example
//!
//! ```rust
//! use vaultline_core::{VaultlineError, Result};
//!
//! fn require_topic(topic: &str) -> Result<&str> {
//!     if topic.trim().is_empty() {
//!         return Err(VaultlineError::MissingTopic);
//!     }
//!     Ok(topic)
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Classified failure of a single transport attempt.
///
/// The class decides what the fetcher does next: certificate failures get
/// exactly one retry with verification disabled, transient failures get one
/// plain retry, everything else propagates unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// TLS certificate verification failed.
    #[error("certificate verification failed: {0}")]
    Certificate(String),

    /// Timeout or connection failure.
    #[error("transient network failure: {0}")]
    Transient(String),

    /// Server answered with a non-success status.
    #[error("server responded with HTTP {status}")]
    Status { status: u16 },

    /// Any other request or body-decoding failure.
    #[error("request failed: {0}")]
    Request(String),
}

impl FetchError {
    pub fn is_certificate(&self) -> bool {
        matches!(self, FetchError::Certificate(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Main error type for ingestion runs.
///
/// # Example
///
/// ```rust
/// use vaultline_core::VaultlineError;
///
/// let err = VaultlineError::InsufficientCitations { found: 1, required: 3 };
/// assert!(err.is_validation());
/// ```
#[derive(Error, Debug)]
pub enum VaultlineError {
    /// Invalid URL provided.
    ///
    /// Returned when a URL cannot be parsed or lacks a scheme or host.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Dossier mode was requested without a topic identifier.
    #[error("Dossier mode requires a topic (use --topic)")]
    MissingTopic,

    /// A dossier did not gather enough usable sources.
    #[error("Dossier has {found} usable citation(s), at least {required} required")]
    InsufficientCitations { found: usize, required: usize },

    /// The primary resource could not be fetched.
    #[error("Could not fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// Unknown group identifier.
    #[error("Unknown group: {0} (expected agents, ai, supercomputing or projects)")]
    InvalidGroup(String),

    /// Unknown level identifier.
    #[error("Unknown level: {0} (expected beginner, intermediate or advanced)")]
    InvalidLevel(String),

    /// Secondary metadata payload could not be decoded.
    #[error("Malformed metadata response: {0}")]
    Json(#[from] serde_json::Error),

    /// Abstracts feed could not be decoded.
    #[error("Malformed abstracts feed: {0}")]
    Feed(String),

    /// Note path does not live under its index directory.
    #[error("Note path {0} is outside the knowledge directory")]
    NotePath(PathBuf),

    /// A local HTML file given in place of a fetch does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Vault file read/write errors.
    #[error("Vault I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultlineError {
    /// True for malformed input and business-rule violations, which are
    /// reported before anything is written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            VaultlineError::InvalidUrl(_)
                | VaultlineError::MissingTopic
                | VaultlineError::InsufficientCitations { .. }
                | VaultlineError::InvalidGroup(_)
                | VaultlineError::InvalidLevel(_)
        )
    }

    /// True when the run failed because the primary source was unreachable.
    pub fn is_network(&self) -> bool {
        matches!(self, VaultlineError::Fetch { .. })
    }
}

impl From<quick_xml::Error> for VaultlineError {
    fn from(err: quick_xml::Error) -> Self {
        VaultlineError::Feed(err.to_string())
    }
}

/// Result type alias for VaultlineError.
pub type Result<T> = std::result::Result<T, VaultlineError>;
