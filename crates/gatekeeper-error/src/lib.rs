//! Unified error type for the gatekeeper content store.
//!
//! Every fallible operation in the workspace returns [`Result`]. The variants
//! mirror the store's failure taxonomy: client input that never reaches disk
//! (`MalformedUrl`), I/O failures surfaced unmodified, on-disk format damage
//! (`Corrupt`), and startup-fatal directory problems (`InvalidSegmentName`).
//! A missing key is not an error; lookups return `Ok(None)`.

use thiserror::Error;

/// Result alias used across the gatekeeper crates.
pub type Result<T, E = GatekeeperError> = std::result::Result<T, E>;

/// Error type shared by every gatekeeper crate.
#[derive(Debug, Error)]
pub enum GatekeeperError {
    /// The caller-supplied URL could not be parsed into a store key.
    ///
    /// Raised before any disk or index interaction; transports should map
    /// this to a client-input failure rather than a server fault.
    #[error("malformed url `{url}`: {reason}")]
    MalformedUrl { url: String, reason: String },

    /// An operating-system I/O failure. Never retried internally; retry
    /// policy belongs to the caller.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// On-disk record data did not match the segment format. During startup
    /// replay this is fatal: the store must not serve from a partially
    /// rebuilt index.
    #[error("segment corrupt: {0}")]
    Corrupt(String),

    /// A file in the storage directory is not named by a decimal segment id.
    /// Fatal at startup; the directory is left untouched.
    #[error("invalid segment file name `{name}`")]
    InvalidSegmentName { name: String },
}

impl GatekeeperError {
    /// Build a [`GatekeeperError::Corrupt`] from anything displayable.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::Corrupt(detail.into())
    }

    /// Whether this error was caused by caller input rather than store state.
    ///
    /// Transport layers use this to pick a 4xx-style response instead of a
    /// 5xx-style one.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedUrl { .. })
    }
}
