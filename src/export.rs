//! Tabular projections of enriched records.
//!
//! Both projections are pure: same records in, same bytes out. Cells are
//! quoted only when they contain a delimiter, a quote or a line break.
use crate::model::{EnrichedRecord, BRAND_COLUMN, IDENTITY_COLUMNS, SHADE_COLUMN, SIZE_COLUMN};
use anyhow::{anyhow, Context, Result};
use std::fmt;

/// Column layout of the marketplace product import.
pub const MARKETPLACE_COLUMNS: [&str; 24] = [
    "ID",
    "Type",
    "SKU",
    "Name",
    "Published",
    "Is featured?",
    "Visibility in catalog",
    "Short description",
    "Description",
    "Regular price",
    "Categories",
    "Images",
    "Attribute 1 name",
    "Attribute 1 value(s)",
    "Attribute 1 visible",
    "Attribute 1 global",
    "Attribute 2 name",
    "Attribute 2 value(s)",
    "Attribute 2 visible",
    "Attribute 2 global",
    "Attribute 3 name",
    "Attribute 3 value(s)",
    "Attribute 3 visible",
    "Attribute 3 global",
];

const MARKETPLACE_ATTRIBUTES: [&str; 3] = [BRAND_COLUMN, SIZE_COLUMN, SHADE_COLUMN];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Standard,
    Marketplace,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Standard => "standard",
            ExportFormat::Marketplace => "marketplace",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn export(format: ExportFormat, records: &[EnrichedRecord], fields: &[String]) -> Result<String> {
    match format {
        ExportFormat::Standard => export_standard(records, fields),
        ExportFormat::Marketplace => export_marketplace(records),
    }
}

/// Identity columns followed by configured fields, in configuration order.
pub fn export_standard(records: &[EnrichedRecord], fields: &[String]) -> Result<String> {
    let columns: Vec<&str> = IDENTITY_COLUMNS
        .iter()
        .copied()
        .chain(fields.iter().map(String::as_str))
        .collect();
    let rows = records
        .iter()
        .map(|record| columns.iter().map(|column| record.value(column)).collect::<Vec<_>>());
    write_csv(&columns, rows)
}

/// Fixed marketplace layout, independent of the configured fields.
pub fn export_marketplace(records: &[EnrichedRecord]) -> Result<String> {
    let rows = records.iter().map(|record| {
        let mut row = vec![
            "",
            "simple",
            "",
            record.identity.name.as_str(),
            "1",
            "0",
            "visible",
            record.field("Short Description"),
            record.field("Detailed Description"),
            "",
            record.field("Product Category"),
            record.field("Image"),
        ];
        for attribute in MARKETPLACE_ATTRIBUTES {
            row.extend([attribute, record.value(attribute), "1", "1"]);
        }
        row
    });
    write_csv(&MARKETPLACE_COLUMNS, rows)
}

fn write_csv<'a>(header: &[&str], rows: impl Iterator<Item = Vec<&'a str>>) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(header).context("write CSV header")?;
    for row in rows {
        writer.write_record(&row).context("write CSV row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("flush CSV: {}", err.error()))?;
    String::from_utf8(bytes).context("encode CSV as UTF-8")
}
