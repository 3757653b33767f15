//! Remote completion of catalog fields.
//!
//! The client turns an identity record plus the configured fields and
//! instructions into a schema-constrained request, and validates the reply
//! into one string per configured field. Each call is a single attempt;
//! spacing and failure handling belong to the orchestrator.
use crate::config::Instruction;
use crate::error::EnrichError;
use crate::model::IdentityRecord;
use indexmap::IndexMap;

mod gemini;
mod prompt;
mod response;

pub use gemini::{
    resolve_api_key, GeminiClient, GeminiConfig, API_KEY_ENVS, ENDPOINT_ENV, GEMINI_ENDPOINT,
};
pub use prompt::{build_prompt, is_image_field, is_sources_field, response_schema};
pub use response::parse_enrichment_response;

/// Enriched values keyed by configured field name, in configuration order.
pub type EnrichedFields = IndexMap<String, String>;

/// A completion service able to fill in configured fields for one item.
pub trait EnrichmentClient {
    /// Fail with [`EnrichError::Configuration`] when no request can be made.
    /// Never touches the network.
    fn preflight(&self) -> Result<(), EnrichError>;

    /// Request values for every field in `fields`. Fields the service leaves
    /// out come back as `"N/A"`.
    fn enrich(
        &self,
        identity: &IdentityRecord,
        fields: &[String],
        instructions: &[Instruction],
    ) -> Result<EnrichedFields, EnrichError>;

    /// Send a trivial request to confirm the credential works.
    fn test_connection(&self) -> Result<(), EnrichError>;
}
