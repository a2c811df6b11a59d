//! Error taxonomy
//!
//! Scope enumeration failures abort a run. Counting failures are per
//! (scope, asset type) pair and end up as tagged lines in the report.

use thiserror::Error;

/// Failure while enumerating the scopes of a run
#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("no scopes found or accessible")]
    NoneFound,

    #[error("command failed: {0}")]
    Command(String),

    #[error("failed to decode scope list: {0}")]
    Decode(String),
}

/// Classified failure of a single asset count.
///
/// The `Display` output is the tag written to the report file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CountError {
    #[error("Rate limit exceeded")]
    RateLimited { detail: String },

    #[error("Permission Denied")]
    PermissionDenied { detail: String },

    #[error("JSON decoding error")]
    Decode { detail: String },

    #[error("{}", fold_lines(.0))]
    Command(String),
}

impl CountError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CountError::RateLimited { .. })
    }

    /// Raw diagnostic behind the classification, for logging
    pub fn detail(&self) -> &str {
        match self {
            CountError::RateLimited { detail }
            | CountError::PermissionDenied { detail }
            | CountError::Decode { detail } => detail,
            CountError::Command(text) => text,
        }
    }
}

/// Collapse multi-line diagnostics onto one report line
fn fold_lines(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
