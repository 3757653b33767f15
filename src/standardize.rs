//! Standardized value dictionary and normalization rules.
//!
//! The dictionary collects every distinct value seen per standardizable
//! field so later edits can be offered consistent spellings. Membership is
//! case-sensitive: "Matte" and "matte" are distinct entries.
use crate::config::NormalizationRule;
use crate::model::{EnrichedRecord, RowStatus, StandardizedValues, NOT_APPLICABLE};
use crate::store::{load_document, save_document, DocumentStore, STANDARDIZED_VALUES_KEY};
use anyhow::Result;
use indexmap::IndexMap;

pub fn load_standardized_values(store: &dyn DocumentStore) -> Result<StandardizedValues> {
    Ok(load_document(store, STANDARDIZED_VALUES_KEY)?.unwrap_or_default())
}

pub fn save_standardized_values(
    store: &mut dyn DocumentStore,
    values: &StandardizedValues,
) -> Result<()> {
    save_document(store, STANDARDIZED_VALUES_KEY, values)
}

/// Add values from enriched records to the dictionary. Returns the number of
/// new entries.
pub fn merge_observed_values(
    values: &mut StandardizedValues,
    records: &[EnrichedRecord],
    standardizable: &[String],
) -> usize {
    let mut inserted = 0;
    for record in records.iter().filter(|r| r.status == RowStatus::Enriched) {
        for field in standardizable {
            let value = record.field(field);
            if value.is_empty() || value.eq_ignore_ascii_case(NOT_APPLICABLE) {
                continue;
            }
            if values
                .entry(field.clone())
                .or_default()
                .insert(value.to_string())
            {
                inserted += 1;
            }
        }
    }
    inserted
}

/// Merge observed values and persist only when something new was added.
pub fn update_standardized_values(
    store: &mut dyn DocumentStore,
    records: &[EnrichedRecord],
    standardizable: &[String],
) -> Result<usize> {
    let mut values = load_standardized_values(store)?;
    let inserted = merge_observed_values(&mut values, records, standardizable);
    if inserted > 0 {
        save_standardized_values(store, &values)?;
    }
    tracing::debug!(inserted, "standardized values merged");
    Ok(inserted)
}

/// Rewrite comma-separated terms of standardizable fields using `rules`.
///
/// Terms match a rule's `from` ignoring case and surrounding whitespace.
/// A value with no matching term is left untouched.
pub fn apply_normalization(
    fields: &mut IndexMap<String, String>,
    rules: &[NormalizationRule],
    standardizable: &[String],
) {
    if rules.is_empty() {
        return;
    }
    for field in standardizable {
        let Some(value) = fields.get_mut(field) else {
            continue;
        };
        let mut changed = false;
        let terms: Vec<String> = value
            .split(',')
            .map(|term| {
                let trimmed = term.trim();
                match rules
                    .iter()
                    .find(|rule| rule.from.trim().eq_ignore_ascii_case(trimmed))
                {
                    Some(rule) => {
                        changed = true;
                        rule.to.clone()
                    }
                    None => trimmed.to_string(),
                }
            })
            .collect();
        if changed {
            *value = terms.join(", ");
        }
    }
}

/// Dictionary values for `field` containing `query` (ignoring case), in
/// sorted order.
pub fn suggest<'a>(
    values: &'a StandardizedValues,
    field: &str,
    query: &str,
    limit: usize,
) -> Vec<&'a str> {
    let needle = query.to_lowercase();
    values
        .get(field)
        .into_iter()
        .flatten()
        .filter(|value| value.to_lowercase().contains(&needle))
        .take(limit)
        .map(String::as_str)
        .collect()
}
