//! Append-only batch history, newest first.
use super::{load_document, save_document, DocumentStore, HISTORY_KEY};
use crate::model::HistoryBatch;
use anyhow::{bail, Result};

pub fn load_history(store: &dyn DocumentStore) -> Result<Vec<HistoryBatch>> {
    let history: Vec<HistoryBatch> = load_document(store, HISTORY_KEY)?.unwrap_or_default();
    let inconsistent: Vec<&str> = history
        .iter()
        .filter(|batch| !batch.counts_consistent())
        .map(HistoryBatch::id)
        .collect();
    if !inconsistent.is_empty() {
        bail!(
            "history batches with counts that disagree with their records: {}",
            inconsistent.join(", ")
        );
    }
    Ok(history)
}

/// Prepend a batch. Existing entries are never modified.
pub fn append_batch(store: &mut dyn DocumentStore, batch: &HistoryBatch) -> Result<()> {
    let mut history = load_history(store)?;
    history.insert(0, batch.clone());
    save_document(store, HISTORY_KEY, &history)?;
    tracing::info!(
        batch = batch.id(),
        total = batch.total_products(),
        enriched = batch.enriched_count(),
        failed = batch.failed_count(),
        "history batch appended"
    );
    Ok(())
}

pub fn find_batch(store: &dyn DocumentStore, id: &str) -> Result<Option<HistoryBatch>> {
    Ok(load_history(store)?.into_iter().find(|b| b.id() == id))
}

pub fn clear_history(store: &mut dyn DocumentStore) -> Result<()> {
    store.remove(HISTORY_KEY)
}
