use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_compiler::CompiledPipeline;
use relay_config::{StepBindings, WorkflowDefinition};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::error::StoreError;
use crate::store::WorkflowStore;
use crate::types::{StoredWorkflow, WorkflowSummary, check_id};

const WORKFLOW_FILE: &str = "workflow.json";
const PIPELINE_FILE: &str = "pipeline.json";
const AUDIT_FILE: &str = "pipeline.txt";

/// Filesystem-based workflow store.
///
/// Each workflow lives in its own directory:
/// ```text
/// {root}/
/// └── page-digest/
///     ├── workflow.json   (definition, bindings, compile errors)
///     ├── pipeline.json   (compiled pipeline, absent when withheld)
///     └── pipeline.txt    (rendered pipeline for review)
/// ```
///
/// Files are replaced by rename. The artifact is written before
/// `workflow.json` and both carry the save time; a pipeline whose save time
/// does not match the definition's is never returned.
pub struct FsWorkflowStore {
  root: PathBuf,
}

/// Contents of `workflow.json`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowFile {
  definition: WorkflowDefinition,
  #[serde(default)]
  bindings: StepBindings,
  #[serde(default)]
  compile_errors: Vec<String>,
  saved_at: DateTime<Utc>,
}

/// Contents of `pipeline.json`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipelineFile {
  saved_at: DateTime<Utc>,
  pipeline: CompiledPipeline,
}

impl FsWorkflowStore {
  /// Create a new filesystem store at the given root path.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Get the root directory of the store.
  pub fn root(&self) -> &Path {
    &self.root
  }

  fn workflow_dir(&self, workflow_id: &str) -> Result<PathBuf, StoreError> {
    check_id(workflow_id)?;
    Ok(self.root.join(workflow_id))
  }

  async fn read(&self, dir: &Path) -> Result<Option<StoredWorkflow>, StoreError> {
    let workflow_path = dir.join(WORKFLOW_FILE);
    if !fs::try_exists(&workflow_path).await? {
      return Ok(None);
    }

    let content = fs::read_to_string(&workflow_path).await?;
    let file: WorkflowFile = serde_json::from_str(&content)?;

    let pipeline_path = dir.join(PIPELINE_FILE);
    let pipeline = if fs::try_exists(&pipeline_path).await? {
      let content = fs::read_to_string(&pipeline_path).await?;
      let artifact: PipelineFile = serde_json::from_str(&content)?;
      if artifact.saved_at == file.saved_at {
        Some(artifact.pipeline)
      } else {
        warn!(
          workflow_id = %file.definition.id,
          "pipeline does not belong to the stored definition, ignoring it"
        );
        None
      }
    } else {
      None
    };

    Ok(Some(StoredWorkflow {
      definition: file.definition,
      bindings: file.bindings,
      pipeline,
      compile_errors: file.compile_errors,
      saved_at: file.saved_at,
    }))
  }
}

#[async_trait]
impl WorkflowStore for FsWorkflowStore {
  async fn get(&self, workflow_id: &str) -> Result<Option<StoredWorkflow>, StoreError> {
    let dir = self.workflow_dir(workflow_id)?;
    self.read(&dir).await
  }

  async fn put(&self, workflow: &StoredWorkflow) -> Result<(), StoreError> {
    let dir = self.workflow_dir(workflow.id())?;
    fs::create_dir_all(&dir).await?;

    // Artifact first, definition last.
    let pipeline_path = dir.join(PIPELINE_FILE);
    let audit_path = dir.join(AUDIT_FILE);
    match &workflow.pipeline {
      Some(pipeline) => {
        let artifact = PipelineFile {
          saved_at: workflow.saved_at,
          pipeline: pipeline.clone(),
        };
        write_atomic(&pipeline_path, &serde_json::to_vec_pretty(&artifact)?).await?;
        match pipeline.render() {
          Ok(text) => write_atomic(&audit_path, text.as_bytes()).await?,
          Err(e) => {
            warn!(workflow_id = %workflow.id(), error = %e, "failed to render pipeline");
            remove_if_exists(&audit_path).await?;
          }
        }
      }
      None => {
        remove_if_exists(&pipeline_path).await?;
        remove_if_exists(&audit_path).await?;
      }
    }

    let file = WorkflowFile {
      definition: workflow.definition.clone(),
      bindings: workflow.bindings.clone(),
      compile_errors: workflow.compile_errors.clone(),
      saved_at: workflow.saved_at,
    };
    write_atomic(&dir.join(WORKFLOW_FILE), &serde_json::to_vec_pretty(&file)?).await?;

    Ok(())
  }

  async fn list(&self) -> Result<Vec<WorkflowSummary>, StoreError> {
    let mut summaries = Vec::new();

    if !fs::try_exists(&self.root).await? {
      return Ok(summaries);
    }

    let mut entries = fs::read_dir(&self.root).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if !path.is_dir() {
        continue;
      }

      match self.read(&path).await {
        Ok(Some(workflow)) => summaries.push(workflow.summary()),
        Ok(None) => {}
        Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable workflow"),
      }
    }

    summaries.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(summaries)
  }

  async fn delete(&self, workflow_id: &str) -> Result<bool, StoreError> {
    let dir = self.workflow_dir(workflow_id)?;
    if !fs::try_exists(&dir).await? {
      return Ok(false);
    }

    fs::remove_dir_all(&dir).await?;
    Ok(true)
  }
}

async fn remove_if_exists(path: &Path) -> Result<(), std::io::Error> {
  match fs::remove_file(path).await {
    Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
    _ => Ok(()),
  }
}

/// Write to a sibling temp file, then rename it over `path`.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), std::io::Error> {
  let mut tmp = path.as_os_str().to_owned();
  tmp.push(".tmp");
  let tmp = PathBuf::from(tmp);

  fs::write(&tmp, contents).await?;
  fs::rename(&tmp, path).await
}
