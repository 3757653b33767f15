//! CLI argument parsing for the enrichment workflow.
//!
//! Commands stay thin: each one resolves the data directory, loads settings
//! and hands off to the library.
use clap::{Args, Parser, Subcommand, ValueEnum};
use product_enricher::export::ExportFormat;
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "penrich",
    version,
    about = "Catalog enrichment and standardization",
    after_help = "Examples:\n  penrich ingest products.csv\n  penrich enrich products.csv --approve\n  penrich enrich --resume\n  penrich export --format marketplace --library --out shop.csv\n  penrich values --field Finish --query mat",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Data directory holding library, history and settings documents
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Ingest(IngestArgs),
    Enrich(EnrichArgs),
    Export(ExportArgs),
    #[command(subcommand, about = "Inspect and edit the product library")]
    Library(LibraryCommand),
    #[command(subcommand, about = "Inspect past enrichment batches")]
    History(HistoryCommand),
    Values(ValuesArgs),
    #[command(subcommand, about = "Show or edit enrichment settings")]
    Settings(SettingsCommand),
    TestConnection(TestConnectionArgs),
}

#[derive(Args, Debug)]
#[command(about = "Validate a catalog CSV and show its rows")]
pub struct IngestArgs {
    /// Catalog CSV with at least Name, Size and Shade columns
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
#[command(about = "Enrich a catalog CSV as a new batch")]
pub struct EnrichArgs {
    /// Catalog CSV with at least Name, Size and Shade columns
    #[arg(value_name = "CSV", required_unless_present = "resume")]
    pub csv: Option<PathBuf>,

    /// Continue the batch left unfinished by an interrupted run
    #[arg(long, conflicts_with = "csv")]
    pub resume: bool,

    /// Save enriched rows to the library once the batch completes
    #[arg(long)]
    pub approve: bool,

    /// Pause between remote calls, in milliseconds (defaults to settings)
    #[arg(long, value_name = "MS")]
    pub throttle_ms: Option<u64>,

    /// API key (overrides GEMINI_API_KEY / API_KEY)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Standard,
    Marketplace,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Standard => ExportFormat::Standard,
            FormatArg::Marketplace => ExportFormat::Marketplace,
        }
    }
}

#[derive(Args, Debug)]
#[command(about = "Export a batch or the library as CSV")]
pub struct ExportArgs {
    /// Column layout
    #[arg(long, value_enum)]
    pub format: FormatArg,

    /// History batch to export
    #[arg(long, value_name = "ID", conflicts_with = "library", required_unless_present = "library")]
    pub batch: Option<String>,

    /// Export the whole library
    #[arg(long)]
    pub library: bool,

    /// Output path (stdout when omitted)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum LibraryCommand {
    /// List library records
    List {
        /// Only records with a value containing TERM
        #[arg(long, value_name = "TERM")]
        search: Option<String>,

        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Set one field of a library record
    Set {
        id: String,
        field: String,
        value: String,
    },
    /// Delete a library record
    Delete { id: String },
    /// Save the enriched rows of a history batch into the library
    Approve {
        #[arg(value_name = "BATCH_ID")]
        batch_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// List batches, newest first
    List {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Print one batch as JSON
    Show { id: String },
    /// Delete all history
    Clear,
}

#[derive(Args, Debug)]
#[command(about = "Show standardized values collected so far")]
pub struct ValuesArgs {
    /// Restrict to one field
    #[arg(long, value_name = "FIELD")]
    pub field: Option<String>,

    /// Only values containing this text (requires --field)
    #[arg(long, value_name = "TEXT", requires = "field")]
    pub query: Option<String>,

    /// Maximum values per field
    #[arg(long, value_name = "N", default_value_t = 20)]
    pub limit: usize,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print the active settings as JSON
    Show,
    /// Restore default settings
    Reset,
    /// Add a configured field
    AddField {
        name: String,
        /// Also collect its values into the standardized dictionary
        #[arg(long)]
        standardizable: bool,
    },
    /// Remove a configured field
    RemoveField { name: String },
    /// Replace the text of a prompt instruction
    SetInstruction { id: String, text: String },
    /// Add a normalization rule
    AddRule { from: String, to: String },
    /// Remove a normalization rule
    RemoveRule { id: String },
}

#[derive(Args, Debug)]
#[command(about = "Send a trivial request to check the API key")]
pub struct TestConnectionArgs {
    /// API key (overrides GEMINI_API_KEY / API_KEY)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,
}
