//! Parse an uploaded catalog file into identity records.
//!
//! The file is comma-delimited with a header row. Only `Name`, `Size` and
//! `Shade` are required; every other column is carried along so configured
//! fields already present in the file survive into enrichment.
use crate::error::EnrichError;
use crate::model::{
    IdentityRecord, BRAND_COLUMN, NAME_COLUMN, PRODUCT_TYPE_COLUMN, REQUIRED_COLUMNS,
    SHADE_COLUMN, SIZE_COLUMN,
};
use indexmap::IndexMap;
use uuid::Uuid;

/// Largest batch accepted from a single file.
pub const MAX_ROWS: usize = 100;

/// Parse catalog text. The whole file is rejected on any validation failure.
pub fn parse_catalog(text: &str) -> Result<Vec<IdentityRecord>, EnrichError> {
    let text = text.trim_start_matches('\u{FEFF}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| EnrichError::Validation(format!("failed to read CSV header: {err}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let rows = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| EnrichError::Validation(format!("failed to parse CSV: {err}")))?;

    if headers.iter().all(|h| h.is_empty()) || rows.is_empty() {
        return Err(EnrichError::Validation(
            "CSV file must have a header and at least one data row.".to_string(),
        ));
    }

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| !headers.iter().any(|h| h == required))
        .collect();
    if !missing.is_empty() {
        return Err(EnrichError::Validation(format!(
            "CSV is missing required headers: {}",
            missing.join(", ")
        )));
    }

    if rows.len() > MAX_ROWS {
        return Err(EnrichError::Validation(format!(
            "CSV file cannot contain more than {MAX_ROWS} products (found {}).",
            rows.len()
        )));
    }

    let records: Vec<IdentityRecord> = rows
        .iter()
        .map(|row| {
            let cells = headers
                .iter()
                .enumerate()
                .map(|(index, header)| (header.as_str(), row.get(index).unwrap_or_default()));
            identity_from_cells(cells)
        })
        .collect();

    tracing::info!(rows = records.len(), columns = headers.len(), "catalog parsed");
    Ok(records)
}

fn identity_from_cells<'a>(cells: impl Iterator<Item = (&'a str, &'a str)>) -> IdentityRecord {
    let mut record = IdentityRecord {
        id: format!("product-{}", Uuid::new_v4()),
        name: String::new(),
        size: String::new(),
        shade: String::new(),
        brand: None,
        product_type: None,
        extra: IndexMap::new(),
    };
    for (header, value) in cells {
        // Identity cells are trimmed; every other cell is kept verbatim.
        let trimmed = value.trim();
        let optional = (!trimmed.is_empty()).then(|| trimmed.to_string());
        match header {
            NAME_COLUMN => record.name = trimmed.to_string(),
            SIZE_COLUMN => record.size = trimmed.to_string(),
            SHADE_COLUMN => record.shade = trimmed.to_string(),
            BRAND_COLUMN => record.brand = optional,
            PRODUCT_TYPE_COLUMN => record.product_type = optional,
            "" => {}
            other => {
                record.extra.insert(other.to_string(), value.to_string());
            }
        }
    }
    record
}
