use std::future::Future;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use operon_config::{ElementDef, PipelineDef, ScriptLanguage};
use operon_engine::{PipelineEngine, PipelineExecutor, RunStatus};
use operon_registry::{FsElementStore, StepRegistry, script_template};
use operon_runtime_lua::LuaRunner;
use operon_runtime_process::ProcessRunner;

mod builtins;

/// Operon - a pipeline engine for sandboxed analysis steps
#[derive(Parser)]
#[command(name = "operon")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.operon)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Enable debug logging
  #[arg(long, short, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a pipeline; the payload is read from stdin
  Run {
    /// Path to the pipeline file (JSON)
    pipeline_file: PathBuf,
  },

  /// Check a pipeline without running anything
  Validate {
    /// Path to the pipeline file (JSON)
    pipeline_file: PathBuf,
  },

  /// Manage custom elements
  Element {
    #[command(subcommand)]
    action: ElementAction,
  },
}

#[derive(Subcommand)]
enum ElementAction {
  /// Register an element from a definition file
  Add {
    /// Path to the element definition (JSON)
    element_file: PathBuf,
  },

  /// List stored elements
  List,

  /// Delete a stored element
  Rm {
    /// The element id
    id: String,
  },

  /// Print a starter script for a language
  Template {
    /// lua, python or shell
    #[arg(long)]
    language: ScriptLanguage,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let data_dir = cli.data_dir.unwrap_or_else(|| {
    dirs::home_dir()
      .expect("could not determine home directory")
      .join(".operon")
  });

  match cli.command {
    Some(Commands::Run { pipeline_file }) => block_on(run_pipeline(pipeline_file, data_dir))?,
    Some(Commands::Validate { pipeline_file }) => {
      block_on(validate_pipeline(pipeline_file, data_dir))?;
    }
    Some(Commands::Element { action }) => match action {
      ElementAction::Add { element_file } => block_on(add_element(element_file, data_dir))?,
      ElementAction::List => block_on(list_elements(data_dir))?,
      ElementAction::Rm { id } => block_on(remove_element(id, data_dir))?,
      ElementAction::Template { language } => println!("{}", script_template(language)),
    },
    None => {
      println!("operon - use --help to see available commands");
    }
  }

  Ok(())
}

fn block_on<F>(future: F) -> Result<()>
where
  F: Future<Output = Result<()>>,
{
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(future)
}

fn init_logging(verbose: bool) {
  let level = if verbose { "debug" } else { "warn" };
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

  // Logs go to stderr; stdout carries command output only.
  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(io::stderr)
    .with_target(false)
    .init();
}

async fn run_pipeline(pipeline_file: PathBuf, data_dir: PathBuf) -> Result<()> {
  let def = read_pipeline(&pipeline_file).await?;
  eprintln!("Loaded pipeline: {}", def.name);

  let payload = read_payload_from_stdin()?;

  let registry = load_registry(&data_dir).await?;
  let engine = PipelineEngine::new(Arc::new(default_executor(registry)));

  let snapshot = engine
    .execute(def, payload)
    .await
    .context("pipeline execution failed")?;

  eprintln!(
    "Run {} finished after {} steps",
    snapshot.run_id,
    snapshot.steps.len()
  );

  println!("{}", serde_json::to_string_pretty(&snapshot)?);

  if snapshot.status == RunStatus::Failed {
    bail!(
      "run failed: {}",
      snapshot.error.as_deref().unwrap_or("unknown error")
    );
  }
  Ok(())
}

async fn validate_pipeline(pipeline_file: PathBuf, data_dir: PathBuf) -> Result<()> {
  let def = read_pipeline(&pipeline_file).await?;

  let registry = load_registry(&data_dir).await?;
  let executor = default_executor(registry);

  let order = executor.validate(def).await.context("pipeline is invalid")?;

  eprintln!("Pipeline is valid ({} steps)", order.len());
  println!("{}", serde_json::to_string_pretty(&order)?);
  Ok(())
}

async fn add_element(element_file: PathBuf, data_dir: PathBuf) -> Result<()> {
  let content = tokio::fs::read_to_string(&element_file)
    .await
    .with_context(|| format!("failed to read element file: {}", element_file.display()))?;
  let def: ElementDef = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse element file: {}", element_file.display()))?;

  // Registration is the security gate: a rejected script never reaches
  // the store.
  let registry = StepRegistry::empty();
  let id = registry
    .register_element(def)
    .await
    .context("element was not admitted")?;
  let element = registry
    .element(&id)
    .await
    .context("registered element disappeared")?;

  let store = FsElementStore::new(data_dir.join("elements"));
  store
    .save(&element)
    .await
    .context("failed to persist element")?;

  eprintln!(
    "Registered {} element '{}'",
    element.language(),
    element.name()
  );
  println!("{id}");
  Ok(())
}

async fn list_elements(data_dir: PathBuf) -> Result<()> {
  let store = FsElementStore::new(data_dir.join("elements"));
  let elements = store
    .load_all()
    .await
    .context("failed to load stored elements")?;

  if elements.is_empty() {
    eprintln!("No elements stored under {}", store.root().display());
    return Ok(());
  }

  for element in elements {
    println!(
      "{}  {:<6}  {}  {}",
      element.id,
      element.language().to_string(),
      element.created_at.to_rfc3339(),
      element.name()
    );
  }
  Ok(())
}

async fn remove_element(id: String, data_dir: PathBuf) -> Result<()> {
  let store = FsElementStore::new(data_dir.join("elements"));
  store
    .delete(&id)
    .await
    .with_context(|| format!("failed to remove element '{id}'"))?;

  eprintln!("Removed element {id}");
  Ok(())
}

async fn read_pipeline(pipeline_file: &Path) -> Result<PipelineDef> {
  let content = tokio::fs::read_to_string(pipeline_file)
    .await
    .with_context(|| format!("failed to read pipeline file: {}", pipeline_file.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse pipeline file: {}", pipeline_file.display()))
}

/// Builtins plus every stored element that still passes analysis.
async fn load_registry(data_dir: &Path) -> Result<StepRegistry> {
  let registry = builtins::default_registry();
  let store = FsElementStore::new(data_dir.join("elements"));

  for element in store
    .load_all()
    .await
    .context("failed to load stored elements")?
  {
    let id = element.id.clone();
    if let Err(error) = registry.restore_element(element).await {
      warn!(element_id = %id, %error, "stored element no longer admitted");
    }
  }

  Ok(registry)
}

fn default_executor(registry: StepRegistry) -> PipelineExecutor {
  PipelineExecutor::new(Arc::new(registry))
    .with_runner(Arc::new(LuaRunner::new()))
    .with_runner(Arc::new(ProcessRunner::python()))
    .with_runner(Arc::new(ProcessRunner::shell()))
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // Interactive invocation without a pipe: empty payload.
    Ok(serde_json::json!({}))
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read payload from stdin")?;

    if input.trim().is_empty() {
      Ok(serde_json::json!({}))
    } else {
      serde_json::from_str(&input).context("failed to parse payload JSON from stdin")
    }
  }
}
