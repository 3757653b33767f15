//! The library of approved enriched records, unique per identity key.
use super::{load_document, save_document, DocumentStore, LIBRARY_KEY};
use crate::model::{EnrichedRecord, HistoryBatch, RowStatus};
use anyhow::Result;

pub fn load_library(store: &dyn DocumentStore) -> Result<Vec<EnrichedRecord>> {
    Ok(load_document(store, LIBRARY_KEY)?.unwrap_or_default())
}

pub fn save_library(store: &mut dyn DocumentStore, library: &[EnrichedRecord]) -> Result<()> {
    save_document(store, LIBRARY_KEY, library)
}

/// Insert records, replacing any entry with the same identity key.
///
/// Later records win over earlier ones, including within `records`.
pub fn upsert_records(store: &mut dyn DocumentStore, records: &[EnrichedRecord]) -> Result<usize> {
    let mut library = load_library(store)?;
    for record in records {
        let key = record.identity.key();
        match library.iter().position(|r| r.identity.key() == key) {
            Some(index) => library[index] = record.clone(),
            None => library.push(record.clone()),
        }
    }
    save_library(store, &library)?;
    tracing::info!(saved = records.len(), total = library.len(), "library updated");
    Ok(records.len())
}

/// Save the enriched records of a history batch into the library.
pub fn approve_batch(store: &mut dyn DocumentStore, batch: &HistoryBatch) -> Result<usize> {
    let approved: Vec<EnrichedRecord> = batch
        .records()
        .iter()
        .filter(|r| r.status == RowStatus::Enriched)
        .cloned()
        .collect();
    upsert_records(store, &approved)
}

/// Replace the record with the same id. Returns false when no record matched.
pub fn update_record(store: &mut dyn DocumentStore, record: &EnrichedRecord) -> Result<bool> {
    let mut library = load_library(store)?;
    let Some(slot) = library.iter_mut().find(|r| r.id() == record.id()) else {
        return Ok(false);
    };
    *slot = record.clone();
    save_library(store, &library)?;
    Ok(true)
}

/// Set one field on a library record and return the updated record.
pub fn set_field(
    store: &mut dyn DocumentStore,
    id: &str,
    field: &str,
    value: &str,
) -> Result<Option<EnrichedRecord>> {
    let mut library = load_library(store)?;
    let Some(record) = library.iter_mut().find(|r| r.id() == id) else {
        return Ok(None);
    };
    record.fields.insert(field.to_string(), value.trim().to_string());
    let updated = record.clone();
    save_library(store, &library)?;
    Ok(Some(updated))
}

/// Delete by id. Returns false when no record matched.
pub fn delete_record(store: &mut dyn DocumentStore, id: &str) -> Result<bool> {
    let mut library = load_library(store)?;
    let before = library.len();
    library.retain(|r| r.id() != id);
    if library.len() == before {
        return Ok(false);
    }
    save_library(store, &library)?;
    Ok(true)
}

/// Records with any identity or field value containing `term`, ignoring case.
pub fn search_library<'a>(library: &'a [EnrichedRecord], term: &str) -> Vec<&'a EnrichedRecord> {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return library.iter().collect();
    }
    library
        .iter()
        .filter(|record| {
            let identity = &record.identity;
            [
                Some(identity.name.as_str()),
                Some(identity.size.as_str()),
                Some(identity.shade.as_str()),
                identity.brand.as_deref(),
                identity.product_type.as_deref(),
            ]
            .into_iter()
            .flatten()
            .chain(record.fields.values().map(String::as_str))
            .any(|value| value.to_lowercase().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IdentityRecord, PendingRow};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use indexmap::IndexMap;

    fn enriched(id: &str, name: &str, finish: &str) -> EnrichedRecord {
        let identity = IdentityRecord {
            id: id.to_string(),
            name: name.to_string(),
            size: "3g".to_string(),
            shade: "999".to_string(),
            brand: Some("Dior".to_string()),
            product_type: Some("Lipstick".to_string()),
            extra: IndexMap::new(),
        };
        let fields = vec!["Finish".to_string()];
        let mut values = IndexMap::new();
        values.insert("Finish".to_string(), finish.to_string());
        PendingRow::new(identity, &fields).start().succeed(values, &fields)
    }

    #[test]
    fn upsert_replaces_same_identity_key() {
        let mut store = MemoryStore::default();
        upsert_records(&mut store, &[enriched("a", "Rouge", "Matte")]).expect("first upsert");
        upsert_records(&mut store, &[enriched("b", "ROUGE", "Satin")]).expect("second upsert");
        let library = load_library(&store).expect("load");
        assert_eq!(library.len(), 1);
        assert_eq!(library[0].id(), "b");
        assert_eq!(library[0].field("Finish"), "Satin");
    }

    #[test]
    fn approve_batch_skips_failed_rows() {
        let mut store = MemoryStore::default();
        let mut failed = enriched("f", "Other", "");
        failed.status = RowStatus::Failed;
        let batch = HistoryBatch::new(
            "b".to_string(),
            Utc::now(),
            vec![enriched("a", "Rouge", "Matte"), failed],
        );
        assert_eq!(approve_batch(&mut store, &batch).expect("approve"), 1);
        assert_eq!(load_library(&store).expect("load").len(), 1);
    }

    #[test]
    fn set_field_and_delete_by_id() {
        let mut store = MemoryStore::default();
        upsert_records(&mut store, &[enriched("a", "Rouge", "Matte")]).expect("upsert");
        let updated = set_field(&mut store, "a", "Finish", " Velvet\n")
            .expect("set field")
            .expect("record exists");
        assert_eq!(updated.field("Finish"), "Velvet");
        assert!(set_field(&mut store, "zzz", "Finish", "x").expect("set").is_none());

        assert!(delete_record(&mut store, "a").expect("delete"));
        assert!(!delete_record(&mut store, "a").expect("delete again"));
        assert!(load_library(&store).expect("load").is_empty());
    }

    #[test]
    fn update_record_replaces_by_id_only() {
        let mut store = MemoryStore::default();
        upsert_records(&mut store, &[enriched("a", "Rouge", "Matte")]).expect("upsert");
        let mut edited = enriched("a", "Rouge", "Matte");
        edited.fields.insert("Finish".to_string(), "Cream".to_string());
        assert!(update_record(&mut store, &edited).expect("update"));
        assert!(!update_record(&mut store, &enriched("b", "Gloss", "x")).expect("update"));
        let library = load_library(&store).expect("load");
        assert_eq!(library.len(), 1);
        assert_eq!(library[0].field("Finish"), "Cream");
    }

    #[test]
    fn search_matches_identity_and_fields_case_insensitively() {
        let library = vec![enriched("a", "Rouge", "Matte"), enriched("b", "Gloss", "Shine")];
        assert_eq!(search_library(&library, "rOUGE").len(), 1);
        assert_eq!(search_library(&library, "shine")[0].id(), "b");
        assert_eq!(search_library(&library, "dior").len(), 2);
        assert_eq!(search_library(&library, "").len(), 2);
    }
}
