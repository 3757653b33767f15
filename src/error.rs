//! Error taxonomy for ingest, enrichment and persistence.
//!
//! Configuration and validation failures abort an operation before any row
//! is touched. Remote and parse failures belong to a single row and are
//! recorded on that row instead of stopping the batch.
use thiserror::Error;

/// Errors surfaced by the enrichment pipeline.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Missing credential or unusable settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Rejected ingest input or settings edit.
    #[error("{0}")]
    Validation(String),

    /// The completion service call failed.
    #[error("{message}")]
    RemoteService { message: String, rate_limited: bool },

    /// The completion service answered with something that is not a JSON object.
    #[error("could not parse enrichment response: {0}")]
    Parse(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl EnrichError {
    /// Build a remote failure from the raw service message, clarifying quota
    /// and rate-limit wording so callers can tell it apart from other failures.
    pub fn remote(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if looks_rate_limited(&raw) {
            EnrichError::RemoteService {
                message: format!(
                    "Rate limit exceeded: \"{raw}\". Requests are already spaced out; \
                     wait a minute before retrying or check the API plan limits."
                ),
                rate_limited: true,
            }
        } else {
            EnrichError::RemoteService {
                message: raw,
                rate_limited: false,
            }
        }
    }

    /// Whether the failure is confined to the row being processed.
    pub fn is_row_local(&self) -> bool {
        matches!(
            self,
            EnrichError::RemoteService { .. } | EnrichError::Parse(_)
        )
    }
}

const RATE_LIMIT_MARKERS: [&str; 5] = [
    "quota",
    "rate limit",
    "rate-limit",
    "resource_exhausted",
    "too many requests",
];

fn looks_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}
