use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use memomap::{
    BatchProcessor, BatchReport, CoercionPolicy, InMemoryStore, MapperConfig, SchemaCatalog,
};
use serde_json::{Value as JsonValue, json};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "memomap")]
#[command(about = "Map server payloads into an in-memory object graph and print the result")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Map one batch of records (or static data) of a single entity type
    Map {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        entity: String,
        /// Treat the payload as header-plus-rows static data
        #[arg(long = "static")]
        static_data: bool,
    },
    /// Map an {"entities": {..}} payload type by type
    Entities {
        #[command(flatten)]
        common: CommonArgs,
        /// Comma-separated processing order
        #[arg(long, value_delimiter = ',', required = true)]
        order: Vec<String>,
    },
    /// Load and validate a schema definition
    CheckSchema {
        #[arg(long)]
        schema: PathBuf,
    },
}

#[derive(Args)]
struct CommonArgs {
    #[arg(long)]
    schema: PathBuf,
    #[arg(long)]
    data: PathBuf,
    #[arg(long)]
    delete_not_provided: bool,
    #[arg(long)]
    abort_on_coercion_error: bool,
    #[arg(long, default_value_t = 1)]
    to_many_depth: usize,
}

impl CommonArgs {
    fn config(&self) -> MapperConfig {
        let policy = if self.abort_on_coercion_error {
            CoercionPolicy::AbortRecord
        } else {
            CoercionPolicy::SkipField
        };
        MapperConfig::new()
            .delete_not_provided(self.delete_not_provided)
            .coercion_policy(policy)
            .to_many_depth(self.to_many_depth)
    }

    fn processor(&self) -> Result<(BatchProcessor<InMemoryStore>, JsonValue)> {
        let catalog = load_schema(&self.schema)?;
        let payload = read_json(&self.data)?;
        let store = InMemoryStore::new(catalog.clone());
        let mut processor = BatchProcessor::new(store, catalog, self.config());
        processor.reset_mapper();
        Ok((processor, payload))
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Command::Map {
                common,
                entity,
                static_data,
            } => {
                let (mut processor, payload) = common.processor()?;
                let report = if static_data {
                    processor.process_static_data(&entity, &payload)
                } else {
                    processor.process_data(&entity, &payload)
                }
                .with_context(|| format!("Failed to map '{}' payload", entity))?;
                print_result(processor.store(), &[report])
            }
            Command::Entities { common, order } => {
                let (mut processor, payload) = common.processor()?;
                let order: Vec<&str> = order.iter().map(String::as_str).collect();
                let reports = processor
                    .process_entities(&payload, &order)
                    .context("Failed to map entities payload")?;
                print_result(processor.store(), &reports)
            }
            Command::CheckSchema { schema } => {
                let catalog = load_schema(&schema)?;
                let names: Vec<&str> = catalog
                    .entity_types()
                    .into_iter()
                    .map(|t| t.as_str())
                    .collect();
                println!("Schema OK: {} entity types ({})", names.len(), names.join(", "));
                Ok(())
            }
        }
    }
}

fn read_json(path: &Path) -> Result<JsonValue> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}

fn load_schema(path: &Path) -> Result<SchemaCatalog> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema '{}'", path.display()))?;
    SchemaCatalog::from_json_str(&raw)
        .map_err(|err| anyhow!("Invalid schema '{}': {}", path.display(), err))
}

fn print_result(store: &InMemoryStore, reports: &[BatchReport]) -> Result<()> {
    let reports: Vec<JsonValue> = reports
        .iter()
        .map(|report| {
            json!({
                "entity_type": report.entity_type.as_str(),
                "summary": report.summary(),
                "failures": report
                    .failures
                    .iter()
                    .map(|f| json!({
                        "index": f.index,
                        "partial": f.partial.map(|h| h.raw()),
                        "error": f.error.to_string(),
                    }))
                    .collect::<Vec<_>>(),
                "skipped_fields": report
                    .skipped_fields
                    .iter()
                    .map(|issue| json!({
                        "entity_type": issue.entity_type.as_str(),
                        "field": issue.field,
                        "reason": issue.reason,
                    }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    let output = json!({
        "reports": reports,
        "store": store.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
