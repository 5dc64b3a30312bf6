//! CLI for submitting sampled data to the schema registry.

mod error;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use snafu::{OptionExt, ResultExt};

use lakeschema_core::{
    adapter,
    canonical::{CanonicalSchema, DatasetIdentity, SourceFormat},
    pipeline,
    policy::DriftPolicy,
    registry::SchemaRegistry,
    storage::StoreLocation,
};
use serde_json::Value;

use crate::error::{
    BuildSchemaSnafu, CliResult, NoRecordsSnafu, OpenRegistrySnafu, ReadInputSnafu,
    RenderOutputSnafu, SubmitSnafu, UnknownEntitySnafu,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Strict,
    Warn,
    Auto,
}

impl From<PolicyArg> for DriftPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Strict => DriftPolicy::Strict,
            PolicyArg::Warn => DriftPolicy::Warn,
            PolicyArg::Auto => DriftPolicy::Auto,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Infer a schema from a JSON/JSONL sample and submit it
    Submit {
        /// JSON object, JSON array of objects, or JSONL file
        #[arg(long)]
        input: PathBuf,

        /// Registry document path (created on first submission)
        #[arg(long)]
        registry: PathBuf,

        /// How breaking schema drift is handled
        #[arg(long, value_enum, default_value_t = PolicyArg::Strict)]
        policy: PolicyArg,

        /// Business domain, e.g. sales
        #[arg(long)]
        domain: String,

        /// Deployment environment, e.g. prod
        #[arg(long)]
        environment: String,

        /// Storage zone, e.g. curated
        #[arg(long)]
        zone: String,

        /// Modelling layer, e.g. raw
        #[arg(long)]
        layer: String,

        /// Logical entity name; defaults to the input file stem
        #[arg(long)]
        entity: Option<String>,
    },

    /// Print an entity's registered version history
    Show {
        /// Registry document path
        #[arg(long)]
        registry: PathBuf,

        /// Registered entity name (the normalized table name)
        #[arg(long)]
        entity: String,
    },
}

#[derive(Debug, Parser)]
#[command(name = "lakeschema", about = "Schema inference and registry CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

struct SubmitArgs {
    input: PathBuf,
    registry: PathBuf,
    policy: PolicyArg,
    domain: String,
    environment: String,
    zone: String,
    layer: String,
    entity: Option<String>,
}

/// Parse an input file into record objects: full JSON first, JSONL as a
/// fallback. Unparseable JSONL lines are skipped with a warning.
fn parse_records(path: &Path, raw: &str) -> Vec<Value> {
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        match parsed {
            Value::Array(items) => return items,
            Value::Object(_) => return vec![parsed],
            _ => {}
        }
    }

    let mut records = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value @ Value::Object(_)) => records.push(value),
            _ => log::warn!("{}:{}: skipping unparseable line", path.display(), line_no + 1),
        }
    }
    records
}

fn entity_name(input: &Path, entity: Option<String>) -> String {
    match entity {
        Some(name) => name,
        None => input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "entity".to_string()),
    }
}

async fn open_registry(path: &Path) -> CliResult<SchemaRegistry> {
    SchemaRegistry::open(StoreLocation::local(path))
        .await
        .context(OpenRegistrySnafu {
            path: path.display().to_string(),
        })
}

async fn cmd_submit(args: SubmitArgs) -> CliResult<()> {
    let raw = tokio::fs::read_to_string(&args.input)
        .await
        .context(ReadInputSnafu {
            path: args.input.display().to_string(),
        })?;
    let records = parse_records(&args.input, &raw);
    if records.is_empty() {
        return NoRecordsSnafu {
            path: args.input.display().to_string(),
        }
        .fail();
    }

    let entity = entity_name(&args.input, args.entity);
    let table = adapter::build_table(&entity, &records).context(BuildSchemaSnafu)?;

    let mut schema = CanonicalSchema::new(
        SourceFormat::Json,
        DatasetIdentity {
            domain: args.domain,
            environment: args.environment,
            zone: args.zone,
            layer: args.layer,
            entity,
            dataset_name: None,
        },
        vec![table],
    );
    schema
        .metadata
        .insert("source_file".into(), args.input.display().to_string());

    let mut registry = open_registry(&args.registry).await?;
    let outcomes = pipeline::submit(&mut schema, &mut registry, args.policy.into())
        .await
        .context(SubmitSnafu)?;

    if let Some(dataset) = &schema.dataset.dataset_name {
        println!("Dataset: {dataset}");
    }
    for outcome in &outcomes {
        println!(
            "Entity {}: {:?} (version {})",
            outcome.entity, outcome.action, outcome.active_version
        );
        for change in &outcome.diff.breaking_changes {
            println!("  breaking: {change}");
        }
        for change in &outcome.diff.non_breaking_changes {
            println!("  non-breaking: {change}");
        }
    }
    Ok(())
}

async fn cmd_show(registry_path: &Path, entity: &str) -> CliResult<()> {
    let registry = open_registry(registry_path).await?;
    let entry = registry.get_entity(entity).context(UnknownEntitySnafu {
        entity: entity.to_string(),
    })?;

    let rendered = serde_json::to_string_pretty(entry).context(RenderOutputSnafu)?;
    println!("{rendered}");
    Ok(())
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Submit {
            input,
            registry,
            policy,
            domain,
            environment,
            zone,
            layer,
            entity,
        } => {
            cmd_submit(SubmitArgs {
                input,
                registry,
                policy,
                domain,
                environment,
                zone,
                layer,
                entity,
            })
            .await
        }

        Command::Show { registry, entity } => cmd_show(&registry, &entity).await,
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
