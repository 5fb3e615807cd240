use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;

use registry_importer::app::import_use_case::{ImportOptions, ImportReport, ImportUseCase};
use registry_importer::app::ports::{MappingAssistantPort, RegistryPort};
use registry_importer::config::Config;
use registry_importer::domain::{MappingSource, TargetField};
use registry_importer::infra::assistant_client::HttpMappingAssistant;
use registry_importer::infra::http_geocoder::HttpGeocoder;
use registry_importer::infra::json_registry::JsonFileRegistry;
use registry_importer::logging;
use registry_importer::pipeline::template;

#[derive(Parser)]
#[command(name = "registry-importer")]
#[command(about = "Bulk spreadsheet import pipeline for the company registry")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a spreadsheet (.csv, .tsv, .txt, .xlsx, .xlsm) into the registry
    Import {
        /// Source file to import
        file: PathBuf,
        /// Ask the mapping assistant to map the columns
        #[arg(long)]
        assistant: bool,
        /// Validate and detect duplicates without writing to the registry
        #[arg(long)]
        dry_run: bool,
        /// Mapping override, e.g. --map "Nombre Empresa=name" (repeatable)
        #[arg(long = "map", value_name = "COLUMN=FIELD")]
        map: Vec<String>,
    },
    /// Delete every record created by an import batch
    Rollback {
        /// Batch id printed at the end of an import run
        #[arg(long, conflicts_with = "all")]
        batch_id: Option<Uuid>,
        /// Delete all imported records instead of a single batch
        #[arg(long)]
        all: bool,
    },
    /// Write an empty CSV template with every importable column
    Template {
        /// Output path for the template file
        out: PathBuf,
    },
}

fn parse_override(raw: &str) -> Result<(String, TargetField), String> {
    let (column, field_name) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=FIELD, got '{}'", raw))?;
    let field = TargetField::ALL
        .iter()
        .copied()
        .find(|f| f.as_str() == field_name.trim())
        .ok_or_else(|| format!("unknown target field '{}'", field_name.trim()))?;
    Ok((column.trim().to_string(), field))
}

fn print_report(report: &ImportReport) {
    let source = match report.mapping_source {
        MappingSource::Heuristic => "heuristic",
        MappingSource::Assistant => "assistant",
        MappingSource::HeuristicFallback => "heuristic (assistant unavailable)",
        MappingSource::Manual => "manual",
    };

    println!("\n📋 Column mapping ({}):", source);
    for (column, field) in report.mapping.pairs() {
        println!("   {} -> {}", column, field);
    }

    println!("\n📊 Import summary:");
    println!("   Total rows:  {}", report.summary.total);
    println!("   Imported:    {}", report.summary.success);
    println!("   Errors:      {}", report.summary.errors);
    println!("   Duplicates:  {}", report.summary.duplicates);

    if !report.violations.is_empty() {
        println!("\n⚠️  Validation errors:");
        for v in &report.violations {
            println!("   - row {}: {} — {}", v.row_index, v.field, v.reason);
        }
    }

    if !report.duplicates.is_empty() {
        println!("\n🔁 Duplicates (not imported):");
        for d in &report.duplicates {
            println!(
                "   - row {}: matches '{}' ({}, similarity {})",
                d.row_index,
                d.matched_name,
                d.kind.as_str(),
                d.similarity
            );
        }
    }

    match &report.batch {
        Some(batch) => println!("\n✅ Batch {} committed", batch.id),
        None => println!("\n✅ Dry run, registry unchanged"),
    }
}

async fn run_import(
    config: &Config,
    file: &Path,
    assistant: bool,
    dry_run: bool,
    overrides: Vec<(String, TargetField)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry: Arc<dyn RegistryPort> =
        Arc::new(JsonFileRegistry::open(Path::new(&config.registry.path))?);

    let mapping_assistant: Option<Arc<dyn MappingAssistantPort>> = if assistant {
        match HttpMappingAssistant::new(&config.assistant) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Assistant unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let use_case = ImportUseCase::new(
        registry,
        Arc::new(HttpGeocoder::new(&config.geocoder)?),
        mapping_assistant,
        Duration::from_millis(config.geocoder.delay_ms),
        Duration::from_secs(config.geocoder.timeout_seconds),
    );

    let options = ImportOptions {
        use_assistant: assistant,
        dry_run,
        overrides,
        sample_rows: config.assistant.sample_rows,
    };

    info!("Starting import of {}", file.display());
    let report = use_case.run(file, &options, None).await?;
    print_report(&report);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Import {
            file,
            assistant,
            dry_run,
            map,
        } => {
            let mut overrides = Vec::with_capacity(map.len());
            for raw in &map {
                overrides.push(parse_override(raw)?);
            }
            println!("🔄 Running import pipeline...");
            run_import(&config, &file, assistant, dry_run, overrides).await?;
        }
        Commands::Rollback { batch_id, all } => {
            let registry = JsonFileRegistry::open(Path::new(&config.registry.path))?;
            let deleted = if all {
                registry.delete_all().await?
            } else {
                let batch_id = batch_id.ok_or("pass --batch-id <uuid> or --all")?;
                registry.delete_by_batch(batch_id).await?
            };
            info!("Rollback deleted {} records", deleted);
            println!("🗑️  Deleted {} records", deleted);
        }
        Commands::Template { out } => {
            template::write_template_csv(&out)?;
            println!("📄 Template written to {}", out.display());
        }
    }

    Ok(())
}
