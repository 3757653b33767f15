//! Command handlers behind the CLI.
use crate::cli::{
    EnrichArgs, ExportArgs, HistoryCommand, IngestArgs, LibraryCommand, SettingsCommand,
    TestConnectionArgs, ValuesArgs,
};
use anyhow::{anyhow, Context, Result};
use product_enricher::config::{default_settings, load_settings, save_settings};
use product_enricher::enrich::{EnrichmentClient, GeminiClient, GeminiConfig};
use product_enricher::export::{export, ExportFormat};
use product_enricher::ingest::parse_catalog;
use product_enricher::model::{EnrichedRecord, IdentityRecord};
use product_enricher::orchestrator::{BatchReport, FixedIntervalThrottle, Orchestrator};
use product_enricher::standardize::{load_standardized_values, suggest, update_standardized_values};
use product_enricher::store::{
    approve_batch, clear_history, delete_record, find_batch, load_history, load_library,
    resolve_data_dir, search_library, set_field, FileStore,
};
use serde::Serialize;
use std::fs;
use std::path::Path;

fn open_store(data_dir: Option<&Path>) -> Result<FileStore> {
    let root = resolve_data_dir(data_dir)?;
    tracing::debug!(data_dir = %root.display(), "using data directory");
    Ok(FileStore::new(root))
}

fn read_catalog(path: &Path) -> Result<Vec<IdentityRecord>> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(parse_catalog(&text)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{text}");
    Ok(())
}

pub fn run_ingest(args: IngestArgs) -> Result<()> {
    let rows = read_catalog(&args.csv)?;
    if args.json {
        return print_json(&rows);
    }
    for (index, row) in rows.iter().enumerate() {
        println!("{:>3}  {}", index + 1, describe(row));
    }
    println!("{} rows ready for enrichment", rows.len());
    Ok(())
}

pub fn run_enrich(data_dir: Option<&Path>, args: EnrichArgs) -> Result<()> {
    let mut store = open_store(data_dir)?;
    let settings = load_settings(&store)?;
    let client = GeminiClient::new(GeminiConfig::resolve(
        args.api_key.as_deref(),
        &settings.model,
    ));
    let mut throttle =
        FixedIntervalThrottle::from_millis(args.throttle_ms.unwrap_or(settings.throttle_ms));
    tracing::debug!(
        interval_ms = throttle.interval().as_millis() as u64,
        model = %settings.model,
        "enrichment client ready"
    );

    let report = {
        let mut orchestrator = Orchestrator::new(&client, &mut throttle, &mut store, &settings);
        if args.resume {
            orchestrator
                .resume()?
                .ok_or_else(|| anyhow!("no unfinished batch to resume"))?
        } else {
            let path = args
                .csv
                .as_deref()
                .ok_or_else(|| anyhow!("a catalog CSV is required unless --resume is given"))?;
            orchestrator.run(read_catalog(path)?)?
        }
    };

    let approved = if args.approve {
        Some(approve_batch(&mut store, &report.batch)?)
    } else {
        None
    };

    if args.json {
        return print_json(&report);
    }
    print_report(&report);
    if let Some(count) = approved {
        println!("{count} records saved to the library");
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    let batch = &report.batch;
    for (index, record) in batch.records().iter().enumerate() {
        println!(
            "{:>3}  {:<9} {}",
            index + 1,
            record.status.as_str(),
            describe(&record.identity)
        );
    }
    println!(
        "batch {}: {} rows, {} enriched, {} failed ({} from library)",
        batch.id(),
        batch.total_products(),
        batch.enriched_count(),
        batch.failed_count(),
        report.dedup_hits
    );
    for error in &report.row_errors {
        println!("  row {}: {}", error.row, error.message);
    }
}

fn describe(identity: &IdentityRecord) -> String {
    let mut parts = vec![identity.name.as_str()];
    if let Some(brand) = identity.brand.as_deref().filter(|b| !b.is_empty()) {
        parts.push(brand);
    }
    for value in [identity.size.as_str(), identity.shade.as_str()] {
        if !value.is_empty() {
            parts.push(value);
        }
    }
    parts.join(" | ")
}

pub fn run_export(data_dir: Option<&Path>, args: ExportArgs) -> Result<()> {
    let store = open_store(data_dir)?;
    let settings = load_settings(&store)?;
    let records: Vec<EnrichedRecord> = match &args.batch {
        Some(id) => find_batch(&store, id)?
            .ok_or_else(|| anyhow!("no history batch with id {id}"))?
            .records()
            .to_vec(),
        None => load_library(&store)?,
    };
    let format = ExportFormat::from(args.format);
    let csv = export(format, &records, &settings.fields)?;
    match &args.out {
        Some(path) => {
            fs::write(path, csv).with_context(|| format!("write {}", path.display()))?;
            eprintln!("wrote {} {format} rows to {}", records.len(), path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}

pub fn run_library(data_dir: Option<&Path>, command: LibraryCommand) -> Result<()> {
    let mut store = open_store(data_dir)?;
    match command {
        LibraryCommand::List { search, json } => {
            let library = load_library(&store)?;
            let matches = search_library(&library, search.as_deref().unwrap_or_default());
            if json {
                return print_json(&matches);
            }
            for record in &matches {
                println!("{}  {}", record.id(), describe(&record.identity));
            }
            println!("{} of {} records", matches.len(), library.len());
        }
        LibraryCommand::Set { id, field, value } => {
            let settings = load_settings(&store)?;
            if !settings.fields.contains(&field) {
                return Err(anyhow!("{field:?} is not a configured field"));
            }
            let record = set_field(&mut store, &id, &field, &value)?
                .ok_or_else(|| anyhow!("no library record with id {id}"))?;
            update_standardized_values(&mut store, &[record], &settings.standardizable)?;
            println!("updated {id}: {field} = {value}");
        }
        LibraryCommand::Delete { id } => {
            if !delete_record(&mut store, &id)? {
                return Err(anyhow!("no library record with id {id}"));
            }
            println!("deleted {id}");
        }
        LibraryCommand::Approve { batch_id } => {
            let batch = find_batch(&store, &batch_id)?
                .ok_or_else(|| anyhow!("no history batch with id {batch_id}"))?;
            let count = approve_batch(&mut store, &batch)?;
            println!("{count} records saved to the library");
        }
    }
    Ok(())
}

pub fn run_history(data_dir: Option<&Path>, command: HistoryCommand) -> Result<()> {
    let mut store = open_store(data_dir)?;
    match command {
        HistoryCommand::List { json } => {
            let history = load_history(&store)?;
            if json {
                return print_json(&history);
            }
            for batch in &history {
                println!(
                    "{}  {}  {} rows, {} enriched, {} failed",
                    batch.id(),
                    batch.timestamp().to_rfc3339(),
                    batch.total_products(),
                    batch.enriched_count(),
                    batch.failed_count()
                );
            }
        }
        HistoryCommand::Show { id } => {
            let batch =
                find_batch(&store, &id)?.ok_or_else(|| anyhow!("no history batch with id {id}"))?;
            print_json(&batch)?;
        }
        HistoryCommand::Clear => {
            clear_history(&mut store)?;
            println!("history cleared");
        }
    }
    Ok(())
}

pub fn run_values(data_dir: Option<&Path>, args: ValuesArgs) -> Result<()> {
    let store = open_store(data_dir)?;
    let values = load_standardized_values(&store)?;
    let query = args.query.as_deref().unwrap_or_default();
    let fields: Vec<&String> = match &args.field {
        Some(field) => vec![field],
        None => values.keys().collect(),
    };
    for field in fields {
        let found = suggest(&values, field, query, args.limit);
        println!("{field}: {}", found.join(", "));
    }
    Ok(())
}

pub fn run_settings(data_dir: Option<&Path>, command: SettingsCommand) -> Result<()> {
    let mut store = open_store(data_dir)?;
    let mut settings = load_settings(&store)?;
    let message = match command {
        SettingsCommand::Show => return print_json(&settings),
        SettingsCommand::Reset => {
            settings = default_settings();
            "settings reset to defaults".to_string()
        }
        SettingsCommand::AddField {
            name,
            standardizable,
        } => {
            settings.add_field(&name)?;
            let name = name.trim().to_string();
            if standardizable && !settings.is_standardizable(&name) {
                settings.standardizable.push(name.clone());
            }
            format!("added field {name}")
        }
        SettingsCommand::RemoveField { name } => {
            settings.remove_field(&name)?;
            format!("removed field {name}")
        }
        SettingsCommand::SetInstruction { id, text } => {
            settings.set_instruction(&id, &text)?;
            format!("updated instruction {id}")
        }
        SettingsCommand::AddRule { from, to } => {
            let id = settings.add_rule(&from, &to)?;
            format!("added rule {id}: {from} -> {to}")
        }
        SettingsCommand::RemoveRule { id } => {
            settings.remove_rule(&id)?;
            format!("removed rule {id}")
        }
    };
    save_settings(&mut store, &settings)?;
    println!("{message}");
    Ok(())
}

pub fn run_test_connection(data_dir: Option<&Path>, args: TestConnectionArgs) -> Result<()> {
    let store = open_store(data_dir)?;
    let settings = load_settings(&store)?;
    let client = GeminiClient::new(GeminiConfig::resolve(
        args.api_key.as_deref(),
        &settings.model,
    ));
    client.test_connection()?;
    println!("connection ok ({})", settings.model);
    Ok(())
}
