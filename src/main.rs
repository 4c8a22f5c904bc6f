use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use buildstate::serdes::{self, StateValue};
use buildstate::tree::context::{
    base_component_tree, current_component_tree, lock_tree, scope_component_tree, shared,
};
use buildstate::tree::factory::{build_session_component_tree, ingest_bmc_component_tree};
use buildstate::tree::{Branch, SerialisedComponents};
use buildstate::StateConfig;

#[derive(Parser)]
#[command(name = "buildstate")]
#[command(about = "Inspect component trees and state serialisation")]
struct Cli {
    /// YAML config file (ingest mode, log filter)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a session tree from a builder export and print its snapshot
    Snapshot {
        /// JSON object of builder-managed components, keyed by id
        builder: PathBuf,

        /// JSON object of session components to ingest on top
        #[arg(long)]
        session: Option<PathBuf>,
    },
    /// Serialise a JSON value through the core registry
    Serialise {
        /// JSON file holding the value
        value: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => StateConfig::load(path).map_err(anyhow::Error::msg)?,
        None => StateConfig::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Snapshot { builder, session } => {
            snapshot(&config, &builder, session.as_deref()).await
        }
        Commands::Serialise { value } => serialise_file(&value),
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn read_components(path: &Path) -> Result<SerialisedComponents> {
    match read_json(path)? {
        Value::Object(map) => Ok(map),
        other => bail!(
            "{}: expected an object of components keyed by id, got {}",
            path.display(),
            json_kind(&other)
        ),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

async fn snapshot(config: &StateConfig, builder: &Path, session: Option<&Path>) -> Result<()> {
    let builder_components = read_components(builder)?;
    let session_components = session.map(read_components).transpose()?;

    let base = base_component_tree();
    let session_tree = {
        let mut base = lock_tree(&base);
        base.set_ingest_mode(config.ingest);
        ingest_bmc_component_tree(&mut base, &builder_components)
            .context("ingesting builder components")?;
        build_session_component_tree(&base).context("building session tree")?
    };
    info!(
        builder = builder_components.len(),
        ingest = ?config.ingest,
        "base tree ready"
    );

    let snapshot = scope_component_tree(shared(session_tree), async move {
        let current = current_component_tree();
        let mut tree = lock_tree(&current);
        if let Some(components) = &session_components {
            tree.ingest(components, Some(Branch::Session))
                .context("ingesting session components")?;
        }
        // an untouched session still reports its full view
        let snapshot = match tree.fetch_updates()? {
            Some(snapshot) => snapshot,
            None => tree.to_dict()?,
        };
        Ok::<_, anyhow::Error>(snapshot)
    })
    .await?;

    println!("{}", serde_json::to_string_pretty(&Value::Object(snapshot))?);
    Ok(())
}

fn serialise_file(path: &Path) -> Result<()> {
    let value = StateValue::from_json(&read_json(path)?);
    let registry = serdes::SerdesRegistry::with_defaults();
    let wire = registry
        .serialise_to_json(&value)
        .with_context(|| format!("serialising {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&wire)?);
    Ok(())
}
