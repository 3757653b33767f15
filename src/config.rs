//! Enrichment settings: field list, prompt instructions and normalization rules.
//!
//! Settings are loaded once per command and passed down as an immutable
//! value; edits go through the methods here and are persisted explicitly.
use crate::error::EnrichError;
use crate::model::IDENTITY_COLUMNS;
use crate::store::{load_document, save_document, DocumentStore, SETTINGS_KEY};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Current schema version for the settings document.
pub const SETTINGS_SCHEMA_VERSION: u32 = 1;
/// Completion model used when settings do not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
/// Pause after each remote call; bounds the batch at 12 requests per minute.
pub const DEFAULT_THROTTLE_MS: u64 = 5000;

/// Fields the marketplace export and prompt contract rely on.
pub const CORE_FIELDS: [&str; 5] = [
    "Product Category",
    "Short Description",
    "Detailed Description",
    "Image",
    "Sources",
];

const DEFAULT_FIELDS: [&str; 21] = [
    "Product Category",
    "Short Description",
    "Detailed Description",
    "Key Ingredients",
    "How to Apply",
    "Top Notes",
    "Middle Notes",
    "Base Notes",
    "Fragrance Family",
    "Occasion",
    "Gender",
    "Intent of Use",
    "Finish",
    "Consistency",
    "Sun Protection",
    "Skin Type",
    "Skincare Concern",
    "What it Treats / Solves",
    "Image",
    "Gallery",
    "Sources",
];

const DEFAULT_STANDARDIZABLE: [&str; 9] = [
    "Product Category",
    "Fragrance Family",
    "Occasion",
    "Gender",
    "Intent of Use",
    "Finish",
    "Consistency",
    "Skin Type",
    "Skincare Concern",
];

/// A prompt instruction substituted wherever its tag appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: String,
    pub tag: String,
    pub label: String,
    pub instruction: String,
}

impl Instruction {
    fn new(id: &str, label: &str, instruction: &str) -> Self {
        Instruction {
            id: id.to_string(),
            tag: format!("[{id}]"),
            label: label.to_string(),
            instruction: instruction.to_string(),
        }
    }
}

/// Rewrites a standardizable term to its canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationRule {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// Immutable configuration handed to the orchestrator and the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub schema_version: u32,
    /// Ordered configured fields; defines record schema and export order.
    pub fields: Vec<String>,
    /// Fields whose observed values feed the standardized dictionary.
    #[serde(default)]
    pub standardizable: Vec<String>,
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub normalization_rules: Vec<NormalizationRule>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_throttle_ms() -> u64 {
    DEFAULT_THROTTLE_MS
}

fn default_instructions() -> Vec<Instruction> {
    vec![
        Instruction::new(
            "KEY_INGREDIENTS_FORMAT",
            "Key Ingredients Format",
            "3-4 key items in bullet format with brief benefits. Example: • Ingredient Name – Brief benefit.",
        ),
        Instruction::new(
            "DETAILED_DESCRIPTION_FORMAT",
            "Detailed Description Format",
            "500-700 word engaging paragraph + 3-6 bullet Benefits & Effects. Include bundle list names info if applicable.",
        ),
        Instruction::new(
            "SHORT_DESCRIPTION_FORMAT",
            "Short Description Format",
            "1-2 factual sentences. Must include the product type and/or features and/or uses.",
        ),
        Instruction::new(
            "FRAGRANCE_NOTES_FORMAT",
            "Fragrance Notes Format",
            "Top/Middle/Base/Fragrance Family for perfumes only, comma-separated, standardized spelling.",
        ),
        Instruction::new(
            "SOURCES_PRIORITY",
            "Sources Priority",
            "Prioritize official brand websites (e.g., dior.com), then major retailers (Sephora.com, Ulta.com), then specialized databases (Fragrantica.com for perfumes).",
        ),
        Instruction::new(
            "INAPPLICABLE_DATA_HANDLER",
            "Inapplicable Data Handler",
            "Use \"N/A\" for fields that do not apply to the product (e.g., fragrance notes for a lipstick).",
        ),
        Instruction::new(
            "VARIATIONS_COMBINATION_LOGIC",
            "Variations Combination Logic",
            "If multiple rows represent the same product with different shades or sizes, combine them into one. List the different values in their respective fields, separated by commas.",
        ),
    ]
}

fn default_rules() -> Vec<NormalizationRule> {
    [
        ("1", "citrus note", "Citrus"),
        ("2", "citrus plant", "Citrus"),
        ("3", "woody note", "Woody"),
        ("4", "dry", "Dry"),
        ("5", "oily skin", "Oily"),
    ]
    .into_iter()
    .map(|(id, from, to)| NormalizationRule {
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    })
    .collect()
}

/// Build the settings used when nothing has been saved yet.
pub fn default_settings() -> Settings {
    Settings {
        schema_version: SETTINGS_SCHEMA_VERSION,
        fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
        standardizable: DEFAULT_STANDARDIZABLE.iter().map(|f| f.to_string()).collect(),
        instructions: default_instructions(),
        normalization_rules: default_rules(),
        model: default_model(),
        throttle_ms: DEFAULT_THROTTLE_MS,
    }
}

/// Instruction id paired with a configured field (`Skin Type` -> `SKIN_TYPE_FORMAT`).
pub fn instruction_id_for(field: &str) -> String {
    let upper: String = field
        .to_uppercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{upper}_FORMAT")
}

pub fn is_core_field(field: &str) -> bool {
    CORE_FIELDS.contains(&field)
}

/// Load settings from the store, falling back to defaults when absent.
pub fn load_settings(store: &dyn DocumentStore) -> Result<Settings> {
    let settings = load_document::<Settings>(store, SETTINGS_KEY)?.unwrap_or_else(default_settings);
    Ok(settings)
}

/// Validate, then persist settings.
pub fn save_settings(store: &mut dyn DocumentStore, settings: &Settings) -> Result<(), EnrichError> {
    validate_settings(settings)?;
    save_document(store, SETTINGS_KEY, settings)?;
    Ok(())
}

/// Validate schema version and field/instruction consistency.
pub fn validate_settings(settings: &Settings) -> Result<(), EnrichError> {
    if settings.schema_version != SETTINGS_SCHEMA_VERSION {
        return Err(EnrichError::Configuration(format!(
            "unsupported settings schema_version {}",
            settings.schema_version
        )));
    }
    let mut seen = BTreeSet::new();
    for field in &settings.fields {
        if field.trim().is_empty() {
            return Err(EnrichError::Configuration(
                "field names must be non-empty".to_string(),
            ));
        }
        if IDENTITY_COLUMNS.contains(&field.as_str()) {
            return Err(EnrichError::Configuration(format!(
                "field {field:?} collides with an identity column"
            )));
        }
        if !seen.insert(field.as_str()) {
            return Err(EnrichError::Configuration(format!(
                "duplicate field {field:?}"
            )));
        }
    }
    if let Some(missing) = CORE_FIELDS.iter().find(|core| !seen.contains(**core)) {
        return Err(EnrichError::Configuration(format!(
            "core field {missing:?} is missing from the field list"
        )));
    }
    if let Some(stray) = settings
        .standardizable
        .iter()
        .find(|field| !seen.contains(field.as_str()))
    {
        return Err(EnrichError::Configuration(format!(
            "standardizable field {stray:?} is not a configured field"
        )));
    }
    let mut tags = BTreeSet::new();
    for instruction in &settings.instructions {
        if instruction.tag.trim().is_empty() {
            return Err(EnrichError::Configuration(format!(
                "instruction {:?} has an empty tag",
                instruction.id
            )));
        }
        if !tags.insert(instruction.tag.as_str()) {
            return Err(EnrichError::Configuration(format!(
                "duplicate instruction tag {:?}",
                instruction.tag
            )));
        }
    }
    if settings.throttle_ms == 0 {
        tracing::warn!("throttle_ms is 0; remote calls will not be spaced out");
    }
    Ok(())
}

impl Settings {
    pub fn is_standardizable(&self, field: &str) -> bool {
        self.standardizable.iter().any(|f| f == field)
    }

    pub fn instruction(&self, id: &str) -> Option<&Instruction> {
        self.instructions.iter().find(|i| i.id == id)
    }

    /// Append a field and its `<NAME>_FORMAT` instruction.
    pub fn add_field(&mut self, name: &str) -> Result<(), EnrichError> {
        let name = name.trim();
        if name.is_empty() || self.fields.iter().any(|f| f == name) {
            return Err(EnrichError::Validation(
                "field name cannot be empty and must be unique".to_string(),
            ));
        }
        if IDENTITY_COLUMNS.contains(&name) {
            return Err(EnrichError::Validation(format!(
                "{name:?} is an identity column"
            )));
        }
        self.fields.push(name.to_string());
        let id = instruction_id_for(name);
        if self.instruction(&id).is_none() {
            self.instructions.push(Instruction::new(
                &id,
                &format!("{name} Format"),
                &format!("Provide details for {name}."),
            ));
        }
        Ok(())
    }

    /// Remove a non-core field together with its instruction.
    pub fn remove_field(&mut self, name: &str) -> Result<(), EnrichError> {
        if is_core_field(name) {
            return Err(EnrichError::Validation(format!(
                "cannot remove core field {name:?}"
            )));
        }
        let before = self.fields.len();
        self.fields.retain(|f| f != name);
        if self.fields.len() == before {
            return Err(EnrichError::Validation(format!("unknown field {name:?}")));
        }
        let id = instruction_id_for(name);
        self.instructions.retain(|i| i.id != id);
        self.standardizable.retain(|f| f != name);
        Ok(())
    }

    pub fn set_instruction(&mut self, id: &str, text: &str) -> Result<(), EnrichError> {
        let instruction = self
            .instructions
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| EnrichError::Validation(format!("unknown instruction {id:?}")))?;
        instruction.instruction = text.to_string();
        Ok(())
    }

    /// Add a normalization rule and return its id.
    pub fn add_rule(&mut self, from: &str, to: &str) -> Result<String, EnrichError> {
        if from.trim().is_empty() || to.trim().is_empty() {
            return Err(EnrichError::Validation(
                "normalization rules need both a from and a to value".to_string(),
            ));
        }
        let next = self
            .normalization_rules
            .iter()
            .filter_map(|r| r.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = next.to_string();
        self.normalization_rules.push(NormalizationRule {
            id: id.clone(),
            from: from.trim().to_string(),
            to: to.trim().to_string(),
        });
        Ok(id)
    }

    pub fn remove_rule(&mut self, id: &str) -> Result<(), EnrichError> {
        let before = self.normalization_rules.len();
        self.normalization_rules.retain(|r| r.id != id);
        if self.normalization_rules.len() == before {
            return Err(EnrichError::Validation(format!("unknown rule {id:?}")));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
