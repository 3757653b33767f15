use super::*;
use crate::config::{default_settings, Instruction, NormalizationRule};
use crate::enrich::EnrichedFields;
use crate::model::{PendingRow, RowStatus, NOT_APPLICABLE};
use crate::standardize::load_standardized_values;
use crate::store::{load_history, save_library, MemoryStore};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

type Reply = Result<Vec<(&'static str, &'static str)>, EnrichError>;

/// Enrichment client answering from a fixed script, one reply per call.
struct ScriptedClient {
    replies: RefCell<VecDeque<Reply>>,
    calls: Cell<usize>,
    requested: RefCell<Vec<String>>,
    preflight: Option<String>,
}

impl ScriptedClient {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            calls: Cell::new(0),
            requested: RefCell::new(Vec::new()),
            preflight: None,
        }
    }

    fn without_credential() -> Self {
        Self {
            preflight: Some("no key".to_string()),
            ..Self::new(Vec::new())
        }
    }
}

impl EnrichmentClient for ScriptedClient {
    fn preflight(&self) -> Result<(), EnrichError> {
        match &self.preflight {
            Some(message) => Err(EnrichError::Configuration(message.clone())),
            None => Ok(()),
        }
    }

    fn enrich(
        &self,
        identity: &IdentityRecord,
        fields: &[String],
        _instructions: &[Instruction],
    ) -> Result<EnrichedFields, EnrichError> {
        self.calls.set(self.calls.get() + 1);
        self.requested.borrow_mut().push(identity.name.clone());
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(EnrichError::remote("script exhausted")))?;
        let mut values = EnrichedFields::new();
        for field in fields {
            let value = reply
                .iter()
                .find(|(name, _)| *name == field.as_str())
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| NOT_APPLICABLE.to_string());
            values.insert(field.clone(), value);
        }
        Ok(values)
    }

    fn test_connection(&self) -> Result<(), EnrichError> {
        self.preflight()
    }
}

#[derive(Default)]
struct RecordingThrottle {
    pauses: usize,
}

impl Throttle for RecordingThrottle {
    fn pause(&mut self) {
        self.pauses += 1;
    }
}

fn identity(name: &str, brand: &str) -> IdentityRecord {
    IdentityRecord {
        id: format!("row-{name}"),
        name: name.to_string(),
        size: "100ml".to_string(),
        shade: String::new(),
        brand: Some(brand.to_string()),
        product_type: Some("Perfume".to_string()),
        extra: IndexMap::new(),
    }
}

fn ok(values: &[(&'static str, &'static str)]) -> Reply {
    Ok(values.to_vec())
}

fn run_batch(
    client: &ScriptedClient,
    throttle: &mut RecordingThrottle,
    store: &mut MemoryStore,
    settings: &Settings,
    rows: Vec<IdentityRecord>,
) -> Result<BatchReport, EnrichError> {
    Orchestrator::new(client, throttle, store, settings).run(rows)
}

#[test]
fn three_remote_rows_pause_twice() {
    let settings = default_settings();
    let client = ScriptedClient::new(vec![
        ok(&[("Short Description", "a")]),
        ok(&[("Short Description", "b")]),
        ok(&[("Short Description", "c")]),
    ]);
    let mut throttle = RecordingThrottle::default();
    let mut store = MemoryStore::default();
    let rows = vec![identity("A", "X"), identity("B", "X"), identity("C", "X")];

    let report = run_batch(&client, &mut throttle, &mut store, &settings, rows).expect("batch");

    assert_eq!(client.calls.get(), 3);
    assert_eq!(throttle.pauses, 2);
    assert_eq!(report.remote_calls, 3);
    assert_eq!(report.batch.enriched_count(), 3);
    assert!(report.last_error.is_none());
}

#[test]
fn library_match_skips_remote_call_and_pause() {
    let settings = default_settings();
    let mut store = MemoryStore::default();
    let mut stored = PendingRow::new(identity("Chanel No 5", "Chanel"), &settings.fields)
        .start()
        .succeed(IndexMap::new(), &settings.fields);
    stored.identity.id = "library-1".to_string();
    stored
        .fields
        .insert("Short Description".to_string(), "Iconic aldehydic floral".to_string());
    save_library(&mut store, &[stored]).expect("seed library");

    let client = ScriptedClient::new(Vec::new());
    let mut throttle = RecordingThrottle::default();
    let row = identity("CHANEL NO 5", "chanel");
    let report =
        run_batch(&client, &mut throttle, &mut store, &settings, vec![row]).expect("batch");

    assert_eq!(client.calls.get(), 0);
    assert_eq!(throttle.pauses, 0);
    assert_eq!(report.dedup_hits, 1);
    let record = &report.batch.records()[0];
    assert_eq!(record.id(), "row-CHANEL NO 5");
    assert_eq!(record.status, RowStatus::Enriched);
    assert_eq!(record.field("Short Description"), "Iconic aldehydic floral");
}

#[test]
fn dedup_hits_in_the_middle_do_not_add_pauses() {
    let settings = default_settings();
    let mut store = MemoryStore::default();
    let known = PendingRow::new(identity("Known", "X"), &settings.fields)
        .start()
        .succeed(IndexMap::new(), &settings.fields);
    save_library(&mut store, &[known]).expect("seed library");

    let client = ScriptedClient::new(vec![ok(&[]), ok(&[])]);
    let mut throttle = RecordingThrottle::default();
    let rows = vec![identity("A", "X"), identity("Known", "X"), identity("B", "X")];
    let report = run_batch(&client, &mut throttle, &mut store, &settings, rows).expect("batch");

    assert_eq!(client.calls.get(), 2);
    assert_eq!(*client.requested.borrow(), ["A", "B"]);
    assert_eq!(throttle.pauses, 1);
    assert_eq!(report.dedup_hits, 1);
}

#[test]
fn failing_row_does_not_stop_the_batch() {
    let settings = default_settings();
    let client = ScriptedClient::new(vec![
        Err(EnrichError::remote("HTTP 500: upstream unavailable")),
        Err(EnrichError::Parse("not json".to_string())),
        ok(&[("Product Category", "Fragrance")]),
    ]);
    let mut throttle = RecordingThrottle::default();
    let mut store = MemoryStore::default();
    let rows = vec![identity("A", "X"), identity("B", "X"), identity("C", "X")];

    let report = run_batch(&client, &mut throttle, &mut store, &settings, rows).expect("batch");

    let statuses: Vec<_> = report.batch.records().iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [RowStatus::Failed, RowStatus::Failed, RowStatus::Enriched]
    );
    assert_eq!(throttle.pauses, 2);
    assert_eq!(report.row_errors.len(), 2);
    assert_eq!(report.row_errors[0].row, 1);
    assert!(report.row_errors[0].message.contains("upstream unavailable"));
    assert_eq!(
        report.last_error.as_deref(),
        Some(report.row_errors[1].message.as_str())
    );
    assert!(report
        .last_error
        .as_deref()
        .unwrap_or_default()
        .starts_with("Failed to enrich B"));
}

#[test]
fn failure_on_final_row_does_not_pause() {
    let settings = default_settings();
    let client = ScriptedClient::new(vec![ok(&[]), Err(EnrichError::remote("boom"))]);
    let mut throttle = RecordingThrottle::default();
    let mut store = MemoryStore::default();
    let rows = vec![identity("A", "X"), identity("B", "X")];

    let report = run_batch(&client, &mut throttle, &mut store, &settings, rows).expect("batch");

    assert_eq!(throttle.pauses, 1);
    assert_eq!(report.batch.failed_count(), 1);
}

#[test]
fn rate_limit_message_is_surfaced_as_is() {
    let settings = default_settings();
    let client = ScriptedClient::new(vec![Err(EnrichError::remote(
        "Resource has been exhausted (e.g. check quota).",
    ))]);
    let mut throttle = RecordingThrottle::default();
    let mut store = MemoryStore::default();

    let report = run_batch(
        &client,
        &mut throttle,
        &mut store,
        &settings,
        vec![identity("A", "X")],
    )
    .expect("batch");

    let message = report.last_error.unwrap_or_default();
    assert!(message.starts_with("Rate limit exceeded"));
}

#[test]
fn missing_credential_aborts_before_any_row() {
    let settings = default_settings();
    let client = ScriptedClient::without_credential();
    let mut throttle = RecordingThrottle::default();
    let mut store = MemoryStore::default();

    let err = run_batch(
        &client,
        &mut throttle,
        &mut store,
        &settings,
        vec![identity("A", "X")],
    )
    .expect_err("configuration error");

    assert!(matches!(err, EnrichError::Configuration(_)));
    assert_eq!(client.calls.get(), 0);
    assert!(load_history(&store).expect("history").is_empty());
}

#[test]
fn omitted_fields_are_back_filled_with_sentinel() {
    let settings = default_settings();
    let client = ScriptedClient::new(vec![ok(&[("Short Description", "Fresh")])]);
    let mut throttle = RecordingThrottle::default();
    let mut store = MemoryStore::default();

    let report = run_batch(
        &client,
        &mut throttle,
        &mut store,
        &settings,
        vec![identity("A", "X")],
    )
    .expect("batch");

    let record = &report.batch.records()[0];
    assert_eq!(record.field("Short Description"), "Fresh");
    assert_eq!(record.field("Key Ingredients"), NOT_APPLICABLE);
    let keys: Vec<_> = record.fields.keys().cloned().collect();
    assert_eq!(keys, settings.fields);
}

#[test]
fn history_accounting_matches_row_statuses() {
    let settings = default_settings();
    let client = ScriptedClient::new(vec![
        ok(&[]),
        Err(EnrichError::remote("boom")),
        ok(&[]),
        Err(EnrichError::Parse("bad".to_string())),
    ]);
    let mut throttle = RecordingThrottle::default();
    let mut store = MemoryStore::default();
    let rows = vec![
        identity("A", "X"),
        identity("B", "X"),
        identity("C", "X"),
        identity("D", "X"),
    ];

    run_batch(&client, &mut throttle, &mut store, &settings, rows).expect("batch");

    let history = load_history(&store).expect("history");
    assert_eq!(history.len(), 1);
    let batch = &history[0];
    assert_eq!(batch.total_products(), 4);
    assert_eq!(batch.enriched_count(), 2);
    assert_eq!(batch.failed_count(), 2);
    assert!(batch.counts_consistent());
    assert!(batch.records().iter().all(|r| r.status.is_terminal()));
}

#[test]
fn enriched_values_are_normalized_and_recorded() {
    let mut settings = default_settings();
    settings.normalization_rules = vec![NormalizationRule {
        id: "1".to_string(),
        from: "woody note".to_string(),
        to: "Woody".to_string(),
    }];
    let client = ScriptedClient::new(vec![
        ok(&[("Fragrance Family", "Woody Note, Amber"), ("Gender", "Unisex")]),
        Err(EnrichError::remote("boom")),
    ]);
    let mut throttle = RecordingThrottle::default();
    let mut store = MemoryStore::default();
    let rows = vec![identity("A", "X"), identity("B", "X")];

    let report = run_batch(&client, &mut throttle, &mut store, &settings, rows).expect("batch");

    assert_eq!(
        report.batch.records()[0].field("Fragrance Family"),
        "Woody, Amber"
    );
    let values = load_standardized_values(&store).expect("values");
    let gender: Vec<_> = values["Gender"].iter().map(String::as_str).collect();
    assert_eq!(gender, ["Unisex"]);
    assert!(!values.contains_key("Key Ingredients"));
}

#[test]
fn completed_batch_leaves_no_checkpoint() {
    let settings = default_settings();
    let client = ScriptedClient::new(vec![ok(&[])]);
    let mut throttle = RecordingThrottle::default();
    let mut store = MemoryStore::default();

    run_batch(
        &client,
        &mut throttle,
        &mut store,
        &settings,
        vec![identity("A", "X")],
    )
    .expect("batch");

    assert!(load_checkpoint(&store).expect("checkpoint").is_none());
}

#[test]
fn interrupted_batch_resumes_only_unfinished_rows() {
    let settings = default_settings();
    let mut store = MemoryStore::default();

    // Row A finished, row B was in flight when the run stopped.
    let done = PendingRow::new(identity("A", "X"), &settings.fields)
        .start()
        .succeed(IndexMap::new(), &settings.fields);
    let mut interrupted = PendingRow::new(identity("B", "X"), &settings.fields)
        .record()
        .clone();
    interrupted.status = RowStatus::Enriching;
    let started_at = Utc::now();
    save_checkpoint(
        &mut store,
        &BatchCheckpoint::new("batch-7".to_string(), started_at, vec![done, interrupted]),
    )
    .expect("seed checkpoint");

    let client = ScriptedClient::new(vec![ok(&[("Short Description", "resumed")])]);
    let mut throttle = RecordingThrottle::default();
    let report = Orchestrator::new(&client, &mut throttle, &mut store, &settings)
        .resume()
        .expect("resume")
        .expect("checkpoint present");

    assert_eq!(*client.requested.borrow(), ["B"]);
    assert_eq!(throttle.pauses, 0);
    assert_eq!(report.batch.id(), "batch-7");
    assert_eq!(report.batch.enriched_count(), 2);
    assert_eq!(report.batch.records()[1].field("Short Description"), "resumed");
    assert!(load_checkpoint(&store).expect("checkpoint").is_none());
}

#[test]
fn resume_without_checkpoint_is_a_no_op() {
    let settings = default_settings();
    let client = ScriptedClient::new(Vec::new());
    let mut throttle = RecordingThrottle::default();
    let mut store = MemoryStore::default();

    let report = Orchestrator::new(&client, &mut throttle, &mut store, &settings)
        .resume()
        .expect("resume");
    assert!(report.is_none());
}

#[test]
fn fatal_error_mid_batch_keeps_checkpoint() {
    let settings = default_settings();
    let client = ScriptedClient::new(vec![
        ok(&[]),
        Err(EnrichError::Configuration("key revoked".to_string())),
    ]);
    let mut throttle = RecordingThrottle::default();
    let mut store = MemoryStore::default();
    let rows = vec![identity("A", "X"), identity("B", "X"), identity("C", "X")];

    let err = run_batch(&client, &mut throttle, &mut store, &settings, rows).expect_err("fatal");

    assert!(matches!(err, EnrichError::Configuration(_)));
    let checkpoint = load_checkpoint(&store)
        .expect("checkpoint")
        .expect("checkpoint kept");
    assert_eq!(checkpoint.completed(), 1);
    assert!(load_history(&store).expect("history").is_empty());
}
