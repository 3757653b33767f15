//! Prompt and response-schema construction.
use crate::config::{instruction_id_for, Instruction};
use crate::model::IdentityRecord;
use regex::Regex;
use serde_json::{json, Map, Value};

const ENRICH_PRODUCT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/enrich_product.md"
));

/// Matches instruction tags such as `[SOURCES_PRIORITY]`.
const TAG_PATTERN: &str = r"\[[A-Z][A-Z0-9_/]*\]";

const NOT_PROVIDED: &str = "Not provided";

/// Whether a field holds imagery; those are always requested empty.
pub fn is_image_field(field: &str) -> bool {
    matches!(
        field.to_lowercase().as_str(),
        "image" | "images" | "gallery"
    )
}

pub fn is_sources_field(field: &str) -> bool {
    field.eq_ignore_ascii_case("sources")
}

/// Build the request text for one item.
///
/// Each instruction replaces its tag in the template. Instructions whose tag
/// the template does not mention are listed under the additional section;
/// template tags without an instruction read as "Not specified.".
pub fn build_prompt(identity: &IdentityRecord, instructions: &[Instruction]) -> String {
    let mut prompt = ENRICH_PRODUCT.to_string();
    let mut additional = Vec::new();
    for instruction in instructions {
        if prompt.contains(&instruction.tag) {
            prompt = prompt.replace(&instruction.tag, &instruction.instruction);
        } else {
            additional.push(format!(
                "- {}: {}",
                instruction.label, instruction.instruction
            ));
        }
    }
    if let Ok(tags) = Regex::new(TAG_PATTERN) {
        prompt = tags.replace_all(&prompt, "Not specified.").into_owned();
    }

    let additional = if additional.is_empty() {
        "None.".to_string()
    } else {
        additional.join("\n")
    };

    prompt
        .replace("{additional_instructions}", &additional)
        .replace("{name}", or_not_provided(&identity.name))
        .replace("{brand}", or_not_provided(identity.brand.as_deref().unwrap_or_default()))
        .replace("{size}", or_not_provided(&identity.size))
        .replace("{shade}", or_not_provided(&identity.shade))
        .replace(
            "{product_type}",
            or_not_provided(identity.product_type.as_deref().unwrap_or_default()),
        )
}

fn or_not_provided(value: &str) -> &str {
    if value.trim().is_empty() {
        NOT_PROVIDED
    } else {
        value
    }
}

/// JSON schema asking for exactly one string property per configured field.
pub fn response_schema(fields: &[String], instructions: &[Instruction]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        let description = if is_image_field(field) {
            "Leave this field empty. Do not source images.".to_string()
        } else if is_sources_field(field) {
            "List the URLs of the sources used, comma-separated.".to_string()
        } else {
            let id = instruction_id_for(field);
            instructions
                .iter()
                .find(|i| i.id == id)
                .map(|i| i.instruction.clone())
                .unwrap_or_default()
        };
        properties.insert(
            field.clone(),
            json!({ "type": "STRING", "description": description }),
        );
    }
    json!({
        "type": "OBJECT",
        "properties": properties,
        "propertyOrdering": fields,
    })
}
