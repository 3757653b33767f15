//! Validation of completion replies into configured field values.
use super::EnrichedFields;
use crate::error::EnrichError;
use crate::model::NOT_APPLICABLE;
use serde_json::Value;

/// Parse reply text into one value per configured field.
///
/// The reply must be a JSON object. Configured fields it omits (or sets to
/// null) become `"N/A"`; keys that are not configured are dropped.
pub fn parse_enrichment_response(
    text: &str,
    fields: &[String],
) -> Result<EnrichedFields, EnrichError> {
    let json_text = extract_json(text);
    let value: Value = serde_json::from_str(json_text).map_err(|err| {
        EnrichError::Parse(format!(
            "{err} (line {}, column {}); first 200 chars: {}",
            err.line(),
            err.column(),
            preview(text, 200)
        ))
    })?;
    let Value::Object(mut object) = value else {
        return Err(EnrichError::Parse(format!(
            "expected a JSON object, got: {}",
            preview(json_text, 200)
        )));
    };

    let mut enriched = EnrichedFields::with_capacity(fields.len());
    for field in fields {
        let value = match object.remove(field) {
            None | Some(Value::Null) => NOT_APPLICABLE.to_string(),
            Some(Value::String(text)) => text.trim().to_string(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| scalar_text(item).trim().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            Some(other) => scalar_text(&other),
        };
        enriched.insert(field.clone(), value);
    }
    if !object.is_empty() {
        tracing::debug!(
            dropped = ?object.keys().collect::<Vec<_>>(),
            "ignoring unconfigured fields in response"
        );
    }
    Ok(enriched)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn preview(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Reply body with an optional surrounding code fence removed.
///
/// Requests ask for `application/json`, so the body is normally bare. A
/// reply wrapped in a single fence (with or without a `json` tag) is
/// unwrapped; anything else is returned as-is and left to the JSON parser.
fn extract_json(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return text;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}
