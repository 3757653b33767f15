//! Record types shared by ingest, enrichment, persistence and export.
//!
//! An enriched record is a fixed identity plus an ordered field map whose
//! keys follow the field configuration in effect when it was written.
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Sentinel for fields that do not apply or were not returned.
pub const NOT_APPLICABLE: &str = "N/A";

pub const NAME_COLUMN: &str = "Name";
pub const SIZE_COLUMN: &str = "Size";
pub const SHADE_COLUMN: &str = "Shade";
pub const BRAND_COLUMN: &str = "Brand";
pub const PRODUCT_TYPE_COLUMN: &str = "Product Type";

/// Columns every ingest file must carry.
pub const REQUIRED_COLUMNS: [&str; 3] = [NAME_COLUMN, SIZE_COLUMN, SHADE_COLUMN];
/// Identity columns in export order.
pub const IDENTITY_COLUMNS: [&str; 5] = [
    NAME_COLUMN,
    SIZE_COLUMN,
    SHADE_COLUMN,
    BRAND_COLUMN,
    PRODUCT_TYPE_COLUMN,
];

/// Per-field dictionary of previously observed values, sorted ascending.
pub type StandardizedValues = BTreeMap<String, BTreeSet<String>>;

/// Minimal description of an item as read from an ingest file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Ingest-local id; not stable across runs.
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Size")]
    pub size: String,
    #[serde(rename = "Shade")]
    pub shade: String,
    #[serde(rename = "Brand", default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(
        rename = "Product Type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub product_type: Option<String>,
    /// Non-identity columns carried by the ingest file, in header order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, String>,
}

impl IdentityRecord {
    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            name: self.name.to_lowercase(),
            brand: self.brand.as_deref().unwrap_or_default().to_lowercase(),
            size: self.size.clone(),
            shade: self.shade.clone(),
        }
    }

    /// Value of an identity column, `None` for non-identity names.
    pub fn column(&self, column: &str) -> Option<&str> {
        match column {
            NAME_COLUMN => Some(&self.name),
            SIZE_COLUMN => Some(&self.size),
            SHADE_COLUMN => Some(&self.shade),
            BRAND_COLUMN => Some(self.brand.as_deref().unwrap_or_default()),
            PRODUCT_TYPE_COLUMN => Some(self.product_type.as_deref().unwrap_or_default()),
            _ => None,
        }
    }
}

/// Dedup and library uniqueness key: case-insensitive name and brand, exact
/// size and shade. A missing brand compares equal to an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    name: String,
    brand: String,
    size: String,
    shade: String,
}

/// Lifecycle of a single row within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Pending,
    Enriching,
    Enriched,
    Failed,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Pending => "pending",
            RowStatus::Enriching => "enriching",
            RowStatus::Enriched => "enriched",
            RowStatus::Failed => "failed",
        }
    }

    /// Transition table: `pending -> enriching -> {enriched, failed}`.
    pub fn can_transition_to(self, next: RowStatus) -> bool {
        matches!(
            (self, next),
            (RowStatus::Pending, RowStatus::Enriching)
                | (RowStatus::Enriching, RowStatus::Enriched)
                | (RowStatus::Enriching, RowStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RowStatus::Enriched | RowStatus::Failed)
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity plus configured field values and row status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub identity: IdentityRecord,
    #[serde(default)]
    pub fields: IndexMap<String, String>,
    pub status: RowStatus,
}

impl EnrichedRecord {
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    /// Field value; absent fields read as empty.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    /// Value for any export column: identity first, then configured fields,
    /// then extra ingest columns.
    pub fn value(&self, column: &str) -> &str {
        if let Some(value) = self.identity.column(column) {
            return value;
        }
        if let Some(value) = self.fields.get(column) {
            return value;
        }
        self.identity
            .extra
            .get(column)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Re-key the field map to exactly `fields`, in order. Missing fields
    /// become empty, fields no longer configured are dropped.
    pub fn conform_fields(&mut self, fields: &[String]) {
        let mut conformed = IndexMap::with_capacity(fields.len());
        for name in fields {
            let value = self.fields.swap_remove(name).unwrap_or_default();
            conformed.insert(name.clone(), value);
        }
        self.fields = conformed;
    }
}

/// A row that has not been picked up yet.
#[derive(Debug, Clone)]
pub struct PendingRow(EnrichedRecord);

impl PendingRow {
    /// Seed a row from its identity. Configured fields already present as
    /// ingest columns keep their values, the rest start empty.
    pub fn new(identity: IdentityRecord, fields: &[String]) -> Self {
        let values = fields
            .iter()
            .map(|name| {
                let value = identity.extra.get(name).cloned().unwrap_or_default();
                (name.clone(), value)
            })
            .collect();
        PendingRow(EnrichedRecord {
            identity,
            fields: values,
            status: RowStatus::Pending,
        })
    }

    pub fn record(&self) -> &EnrichedRecord {
        &self.0
    }

    pub fn start(self) -> InFlightRow {
        let mut record = self.0;
        advance(&mut record, RowStatus::Enriching);
        InFlightRow(record)
    }
}

/// A row currently being enriched; can only end as enriched or failed.
#[derive(Debug)]
pub struct InFlightRow(EnrichedRecord);

impl InFlightRow {
    pub fn identity(&self) -> &IdentityRecord {
        &self.0.identity
    }

    /// Finish from a library match, keeping this row's id.
    pub fn reuse(self, matched: &EnrichedRecord, fields: &[String]) -> EnrichedRecord {
        let mut record = matched.clone();
        record.identity.id = self.0.identity.id;
        record.status = self.0.status;
        record.conform_fields(fields);
        advance(&mut record, RowStatus::Enriched);
        record
    }

    /// Finish with remotely enriched values merged over the seeded ones.
    pub fn succeed(self, values: IndexMap<String, String>, fields: &[String]) -> EnrichedRecord {
        let mut record = self.0;
        for (name, value) in values {
            record.fields.insert(name, value);
        }
        record.conform_fields(fields);
        advance(&mut record, RowStatus::Enriched);
        record
    }

    pub fn fail(self) -> EnrichedRecord {
        let mut record = self.0;
        advance(&mut record, RowStatus::Failed);
        record
    }
}

fn advance(record: &mut EnrichedRecord, next: RowStatus) {
    debug_assert!(
        record.status.can_transition_to(next),
        "illegal row transition {} -> {next}",
        record.status
    );
    record.status = next;
}

/// Immutable record of one enrichment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryBatch {
    id: String,
    timestamp: DateTime<Utc>,
    total_products: usize,
    enriched_count: usize,
    failed_count: usize,
    records: Vec<EnrichedRecord>,
}

impl HistoryBatch {
    /// Assemble a batch; counts are derived from the record statuses.
    pub fn new(id: String, timestamp: DateTime<Utc>, records: Vec<EnrichedRecord>) -> Self {
        let enriched_count = count_status(&records, RowStatus::Enriched);
        let failed_count = count_status(&records, RowStatus::Failed);
        HistoryBatch {
            id,
            timestamp,
            total_products: records.len(),
            enriched_count,
            failed_count,
            records,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn total_products(&self) -> usize {
        self.total_products
    }

    pub fn enriched_count(&self) -> usize {
        self.enriched_count
    }

    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    /// Whether the stored counts agree with the record statuses.
    pub fn counts_consistent(&self) -> bool {
        self.total_products == self.records.len()
            && self.enriched_count == count_status(&self.records, RowStatus::Enriched)
            && self.failed_count == count_status(&self.records, RowStatus::Failed)
    }
}

fn count_status(records: &[EnrichedRecord], status: RowStatus) -> usize {
    records.iter().filter(|r| r.status == status).count()
}
