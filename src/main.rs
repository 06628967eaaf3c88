use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use relay_compiler::compile;
use relay_config::{StepBindings, WorkflowDefinition};
use relay_engine::{ExecutionEvent, RunRequest, WorkflowEngine};
use relay_host::{
  HostError, HttpConnectionDirectory, HttpToolExecutor, StaticConnectionDirectory, ToolExecution,
  ToolExecutor, ToolInvocation,
};
use relay_resolver::{ConnectionResolver, StandardResolver};
use relay_runtime_lua::LuaCodeRunner;
use relay_store::{FsWorkflowStore, WorkflowService};

/// Relay - compile and run multi-step workflows against third-party tools
#[derive(Parser)]
#[command(name = "relay")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.relay)
  #[arg(long, global = true, env = "RELAY_DATA_DIR")]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a workflow file and print the result without saving it
  Compile {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// Print the rendered pipeline instead of JSON
    #[arg(long)]
    render: bool,
  },

  /// Compile a workflow file and save it to the data directory
  Save {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Run a saved workflow, reading the input JSON from stdin
  Run {
    /// ID of the saved workflow
    workflow_id: String,

    /// Identity the run acts on behalf of
    #[arg(long, env = "RELAY_CALLER_ID", default_value = "local")]
    caller: String,

    /// Base URL of the tool service
    #[arg(long, env = "RELAY_TOOL_ENDPOINT")]
    tool_endpoint: Option<String>,

    /// API key sent to the tool service
    #[arg(long, env = "RELAY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
  },

  /// List saved workflows
  List,

  /// Delete a saved workflow and its compiled pipeline
  Delete {
    /// ID of the saved workflow
    workflow_id: String,
  },
}

/// A workflow file holding a definition with its bindings.
#[derive(Deserialize)]
struct WorkflowBundle {
  definition: WorkflowDefinition,
  #[serde(default)]
  bindings: StepBindings,
}

/// Parse a workflow file: either a bare definition or a `{definition, bindings}` bundle.
fn parse_workflow_file(content: &str) -> Result<(WorkflowDefinition, StepBindings)> {
  let value: serde_json::Value = serde_json::from_str(content).context("file is not valid JSON")?;

  if value.get("definition").is_some() {
    let bundle: WorkflowBundle =
      serde_json::from_value(value).context("invalid workflow bundle")?;
    Ok((bundle.definition, bundle.bindings))
  } else {
    let definition: WorkflowDefinition =
      serde_json::from_value(value).context("invalid workflow definition")?;
    Ok((definition, StepBindings::new()))
  }
}

/// Initialize the tracing subscriber, writing to stderr.
///
/// The filter comes from `RELAY_LOG` and defaults to `info`.
fn init_tracing() {
  let filter = EnvFilter::try_from_env("RELAY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry()
    .with(fmt::layer().with_target(false).with_writer(io::stderr))
    .with(filter)
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".relay"),
  };

  let Some(command) = cli.command else {
    println!("relay - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match command {
      Commands::Compile {
        workflow_file,
        render,
      } => compile_workflow(workflow_file, render).await,
      Commands::Save { workflow_file } => save_workflow(workflow_file, data_dir).await,
      Commands::Run {
        workflow_id,
        caller,
        tool_endpoint,
        api_key,
      } => run_workflow(workflow_id, caller, tool_endpoint, api_key, data_dir).await,
      Commands::List => list_workflows(data_dir).await,
      Commands::Delete { workflow_id } => delete_workflow(workflow_id, data_dir).await,
    }
  })
}

fn service(data_dir: PathBuf) -> WorkflowService<FsWorkflowStore> {
  WorkflowService::new(FsWorkflowStore::new(data_dir.join("workflows")))
}

async fn read_workflow_file(workflow_file: &PathBuf) -> Result<(WorkflowDefinition, StepBindings)> {
  let content = tokio::fs::read_to_string(workflow_file)
    .await
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  parse_workflow_file(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))
}

async fn compile_workflow(workflow_file: PathBuf, render: bool) -> Result<()> {
  let (definition, bindings) = read_workflow_file(&workflow_file).await?;

  let output = compile(&definition, &bindings).context("invalid workflow definition")?;

  for error in &output.errors {
    eprintln!("warning: {}", error);
  }

  if render {
    match &output.pipeline {
      Some(pipeline) => print!("{}", pipeline.render().context("failed to render pipeline")?),
      None => bail!("workflow '{}' has no executable pipeline", definition.id),
    }
    return Ok(());
  }

  let result = serde_json::json!({
    "pipeline": output.pipeline,
    "metadata": output.metadata,
    "errors": output.error_messages(),
  });
  println!("{}", serde_json::to_string_pretty(&result)?);

  Ok(())
}

async fn save_workflow(workflow_file: PathBuf, data_dir: PathBuf) -> Result<()> {
  let (definition, bindings) = read_workflow_file(&workflow_file).await?;

  let outcome = service(data_dir)
    .save(definition, bindings)
    .await
    .context("failed to save workflow")?;

  for warning in &outcome.warnings {
    eprintln!("warning: {}", warning);
  }

  eprintln!(
    "Saved workflow: {} ({})",
    outcome.workflow.id(),
    if outcome.is_executable() {
      "executable"
    } else {
      "not executable"
    }
  );

  println!("{}", serde_json::to_string_pretty(&outcome.metadata)?);

  Ok(())
}

async fn run_workflow(
  workflow_id: String,
  caller: String,
  tool_endpoint: Option<String>,
  api_key: Option<String>,
  data_dir: PathBuf,
) -> Result<()> {
  let pipeline = service(data_dir)
    .pipeline(&workflow_id)
    .await
    .with_context(|| format!("failed to load workflow '{}'", workflow_id))?
    .with_context(|| format!("workflow '{}' has no executable pipeline", workflow_id))?;

  eprintln!("Loaded workflow: {}", pipeline.name);

  let input = read_input_from_stdin()?;

  let (tools, resolver): (Arc<dyn ToolExecutor>, Arc<dyn ConnectionResolver>) =
    match tool_endpoint {
      Some(endpoint) => (
        Arc::new(
          HttpToolExecutor::new(&endpoint, api_key.clone()).context("invalid tool endpoint")?,
        ),
        Arc::new(StandardResolver::new(
          HttpConnectionDirectory::new(&endpoint, api_key).context("invalid tool endpoint")?,
        )),
      ),
      None => (
        Arc::new(UnconfiguredTools),
        Arc::new(StandardResolver::new(StaticConnectionDirectory::new())),
      ),
    };

  let engine = WorkflowEngine::new(tools, resolver, Arc::new(LuaCodeRunner::new()));
  let mut events = engine.stream(pipeline, RunRequest::new(caller, input));

  let mut failed = false;
  loop {
    tokio::select! {
      event = events.recv() => {
        let Some(event) = event else { break };
        failed |= matches!(event, ExecutionEvent::WorkflowError { .. });
        println!("{}", serde_json::to_string(&event)?);
      }
      _ = tokio::signal::ctrl_c() => {
        bail!("interrupted");
      }
    }
  }

  if failed {
    bail!("workflow '{}' failed", workflow_id);
  }

  Ok(())
}

async fn list_workflows(data_dir: PathBuf) -> Result<()> {
  let workflows = service(data_dir)
    .list()
    .await
    .context("failed to list workflows")?;

  println!("{}", serde_json::to_string_pretty(&workflows)?);

  Ok(())
}

async fn delete_workflow(workflow_id: String, data_dir: PathBuf) -> Result<()> {
  let existed = service(data_dir)
    .delete(&workflow_id)
    .await
    .context("failed to delete workflow")?;

  if !existed {
    bail!("workflow '{}' not found", workflow_id);
  }

  eprintln!("Deleted workflow: {}", workflow_id);

  Ok(())
}

/// Tool executor used when no tool endpoint is configured.
struct UnconfiguredTools;

#[async_trait]
impl ToolExecutor for UnconfiguredTools {
  async fn execute(
    &self,
    tool_id: &str,
    _invocation: ToolInvocation,
  ) -> Result<ToolExecution, HostError> {
    Ok(ToolExecution::failure(format!(
      "cannot run tool '{}': no tool endpoint configured (set RELAY_TOOL_ENDPOINT)",
      tool_id
    )))
  }
}

fn read_input_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    Ok(serde_json::json!({}))
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read input from stdin")?;

    if input.trim().is_empty() {
      Ok(serde_json::json!({}))
    } else {
      serde_json::from_str(&input).context("failed to parse input JSON from stdin")
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_bare_definition() {
    let (definition, bindings) =
      parse_workflow_file(r#"{"id": "wf", "name": "Digest"}"#).unwrap();

    assert_eq!(definition.id, "wf");
    assert!(bindings.is_empty());
  }

  #[test]
  fn test_parse_bundle() {
    let content = r#"{
      "definition": {"id": "wf", "name": "Digest"},
      "bindings": {"a": {"x": {"sourceType": "literal", "literalValue": 1}}}
    }"#;
    let (definition, bindings) = parse_workflow_file(content).unwrap();

    assert_eq!(definition.name, "Digest");
    assert_eq!(bindings["a"].len(), 1);
  }

  #[test]
  fn test_parse_error_names_the_field() {
    let err = parse_workflow_file(r#"{"definition": {"id": "wf"}}"#).unwrap_err();
    let message = format!("{:#}", err);

    assert!(message.contains("invalid workflow bundle"), "{}", message);
    assert!(message.contains("name"), "{}", message);
    assert!(!message.contains("did not match any variant"), "{}", message);
  }
}
