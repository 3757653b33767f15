//! In-progress batch snapshot used to resume after an interruption.
use crate::model::{EnrichedRecord, IdentityRecord, PendingRow};
use crate::store::{load_document, save_document, DocumentStore, CHECKPOINT_KEY};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCheckpoint {
    pub batch_id: String,
    pub started_at: DateTime<Utc>,
    pub rows: Vec<EnrichedRecord>,
}

impl BatchCheckpoint {
    pub fn new(batch_id: String, started_at: DateTime<Utc>, rows: Vec<EnrichedRecord>) -> Self {
        Self {
            batch_id,
            started_at,
            rows,
        }
    }

    /// Rows already finished.
    pub fn completed(&self) -> usize {
        self.rows.iter().filter(|r| r.status.is_terminal()).count()
    }
}

pub fn load_checkpoint(store: &dyn DocumentStore) -> Result<Option<BatchCheckpoint>> {
    load_document(store, CHECKPOINT_KEY)
}

pub fn save_checkpoint(store: &mut dyn DocumentStore, checkpoint: &BatchCheckpoint) -> Result<()> {
    save_document(store, CHECKPOINT_KEY, checkpoint)
}

pub fn clear_checkpoint(store: &mut dyn DocumentStore) -> Result<()> {
    store.remove(CHECKPOINT_KEY)
}

/// A row of a resumed batch: either already finished or due to run again.
#[derive(Debug)]
pub enum ResumedRow {
    Done(EnrichedRecord),
    Pending(PendingRow),
}

impl ResumedRow {
    /// Terminal rows are kept; anything interrupted restarts from pending
    /// with the values it was ingested with.
    pub fn from_record(record: EnrichedRecord, fields: &[String]) -> Self {
        if record.status.is_terminal() {
            return ResumedRow::Done(record);
        }
        let identity: IdentityRecord = record.identity;
        ResumedRow::Pending(PendingRow::new(identity, fields))
    }

    pub fn record(&self) -> &EnrichedRecord {
        match self {
            ResumedRow::Done(record) => record,
            ResumedRow::Pending(row) => row.record(),
        }
    }
}
