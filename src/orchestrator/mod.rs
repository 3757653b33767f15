//! Sequential batch enrichment.
//!
//! Rows run strictly one at a time in ingest order. Each row first checks the
//! library; only misses reach the enrichment client, and every remote attempt
//! except the one for the final row is followed by a throttle pause. A failing
//! row is marked failed and the batch moves on.
//!
//! The batch state is checkpointed after every finished row so an interrupted
//! run can be resumed without repeating completed work.
use crate::config::Settings;
use crate::dedup::find_existing;
use crate::enrich::EnrichmentClient;
use crate::error::EnrichError;
use crate::model::{EnrichedRecord, HistoryBatch, IdentityRecord, PendingRow};
use crate::standardize::{apply_normalization, update_standardized_values};
use crate::store::{append_batch, load_library, DocumentStore};
use chrono::{DateTime, Utc};
use serde::Serialize;

mod checkpoint;
mod throttle;

pub use checkpoint::{
    clear_checkpoint, load_checkpoint, save_checkpoint, BatchCheckpoint, ResumedRow,
};
pub use throttle::{FixedIntervalThrottle, Throttle};

/// Failure recorded for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based position in the batch.
    pub row: usize,
    pub id: String,
    pub name: String,
    pub message: String,
}

/// Outcome of a completed batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch: HistoryBatch,
    /// Most recent row failure, if any row failed.
    pub last_error: Option<String>,
    pub row_errors: Vec<RowError>,
    pub dedup_hits: usize,
    pub remote_calls: usize,
}

pub struct Orchestrator<'a> {
    client: &'a dyn EnrichmentClient,
    throttle: &'a mut dyn Throttle,
    store: &'a mut dyn DocumentStore,
    settings: &'a Settings,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        client: &'a dyn EnrichmentClient,
        throttle: &'a mut dyn Throttle,
        store: &'a mut dyn DocumentStore,
        settings: &'a Settings,
    ) -> Self {
        Self {
            client,
            throttle,
            store,
            settings,
        }
    }

    /// Enrich freshly ingested rows as a new batch.
    pub fn run(&mut self, identities: Vec<IdentityRecord>) -> Result<BatchReport, EnrichError> {
        if let Some(stale) = load_checkpoint(&*self.store)? {
            tracing::warn!(
                batch = %stale.batch_id,
                completed = stale.completed(),
                total = stale.rows.len(),
                "discarding unfinished batch checkpoint"
            );
        }
        let fields = &self.settings.fields;
        let rows = identities
            .into_iter()
            .map(|identity| ResumedRow::Pending(PendingRow::new(identity, fields)))
            .collect();
        let batch_id = format!("batch-{}", uuid::Uuid::new_v4());
        self.execute(batch_id, Utc::now(), rows)
    }

    /// Continue the batch left behind by an interrupted run, if any.
    pub fn resume(&mut self) -> Result<Option<BatchReport>, EnrichError> {
        let Some(checkpoint) = load_checkpoint(&*self.store)? else {
            return Ok(None);
        };
        tracing::info!(
            batch = %checkpoint.batch_id,
            completed = checkpoint.completed(),
            total = checkpoint.rows.len(),
            "resuming batch"
        );
        let fields = &self.settings.fields;
        let rows = checkpoint
            .rows
            .into_iter()
            .map(|record| ResumedRow::from_record(record, fields))
            .collect();
        self.execute(checkpoint.batch_id, checkpoint.started_at, rows).map(Some)
    }

    fn execute(
        &mut self,
        batch_id: String,
        started_at: DateTime<Utc>,
        rows: Vec<ResumedRow>,
    ) -> Result<BatchReport, EnrichError> {
        self.client.preflight()?;
        let library = load_library(&*self.store)?;
        let total = rows.len();

        let mut records: Vec<EnrichedRecord> =
            rows.iter().map(|row| row.record().clone()).collect();
        self.checkpoint(&batch_id, started_at, &records)?;

        let mut last_error = None;
        let mut row_errors = Vec::new();
        let mut dedup_hits = 0;
        let mut remote_calls = 0;

        for (index, row) in rows.into_iter().enumerate() {
            let ResumedRow::Pending(pending) = row else {
                continue;
            };
            let in_flight = pending.start();
            let fields = &self.settings.fields;

            let finished = if let Some(matched) = find_existing(&library, in_flight.identity()) {
                dedup_hits += 1;
                tracing::info!(row = index + 1, total, id = matched.id(), "library match");
                in_flight.reuse(matched, fields)
            } else {
                remote_calls += 1;
                let outcome = self.client.enrich(
                    in_flight.identity(),
                    fields,
                    &self.settings.instructions,
                );
                let finished = match outcome {
                    Ok(mut values) => {
                        apply_normalization(
                            &mut values,
                            &self.settings.normalization_rules,
                            &self.settings.standardizable,
                        );
                        in_flight.succeed(values, fields)
                    }
                    Err(err) if err.is_row_local() => {
                        let message = row_error_message(&in_flight.identity().name, &err);
                        tracing::warn!(row = index + 1, total, error = %message, "row failed");
                        row_errors.push(RowError {
                            row: index + 1,
                            id: in_flight.identity().id.clone(),
                            name: in_flight.identity().name.clone(),
                            message: message.clone(),
                        });
                        last_error = Some(message);
                        in_flight.fail()
                    }
                    Err(err) => return Err(err),
                };
                if index + 1 < total {
                    self.throttle.pause();
                }
                finished
            };

            tracing::info!(
                row = index + 1,
                total,
                id = finished.id(),
                status = %finished.status,
                "row finished"
            );
            records[index] = finished;
            self.checkpoint(&batch_id, started_at, &records)?;
        }

        update_standardized_values(self.store, &records, &self.settings.standardizable)?;
        let batch = HistoryBatch::new(batch_id, Utc::now(), records);
        append_batch(self.store, &batch)?;
        clear_checkpoint(self.store)?;

        tracing::info!(
            batch = batch.id(),
            total = batch.total_products(),
            enriched = batch.enriched_count(),
            failed = batch.failed_count(),
            dedup_hits,
            remote_calls,
            "batch complete"
        );
        Ok(BatchReport {
            batch,
            last_error,
            row_errors,
            dedup_hits,
            remote_calls,
        })
    }

    fn checkpoint(
        &mut self,
        batch_id: &str,
        started_at: DateTime<Utc>,
        records: &[EnrichedRecord],
    ) -> Result<(), EnrichError> {
        let checkpoint = BatchCheckpoint::new(batch_id.to_string(), started_at, records.to_vec());
        save_checkpoint(self.store, &checkpoint)?;
        Ok(())
    }
}

/// Rate-limit messages already carry their own explanation.
fn row_error_message(name: &str, err: &EnrichError) -> String {
    match err {
        EnrichError::RemoteService {
            rate_limited: true,
            message,
        } => message.clone(),
        other => format!("Failed to enrich {name}: {other}"),
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
