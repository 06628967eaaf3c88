//! Save lifecycle.
//!
//! Every save compiles the workflow. A definition that passes validation is
//! always persisted, even when compilation reports errors; those come back as
//! warnings and the stored pipeline is partial or withheld. Runs read the
//! latest stored pipeline through the [`PipelineCache`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_compiler::{CompiledPipeline, PipelineCache, PipelineMetadata, compile};
use relay_config::{StepBindings, WorkflowDefinition};
use tracing::{info, instrument, warn};

use crate::error::StoreError;
use crate::store::WorkflowStore;
use crate::types::{StoredWorkflow, WorkflowSummary};

/// What a save produced.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
  pub workflow: StoredWorkflow,
  pub metadata: PipelineMetadata,
  /// Compile errors. The definition was saved regardless.
  pub warnings: Vec<String>,
}

impl SaveOutcome {
  /// A pipeline was stored and can be run.
  pub fn is_executable(&self) -> bool {
    self.workflow.pipeline.is_some()
  }
}

/// Workflow persistence with compile-on-save and pipeline caching.
pub struct WorkflowService<S: WorkflowStore> {
  store: S,
  cache: PipelineCache,
}

impl<S: WorkflowStore> WorkflowService<S> {
  pub fn new(store: S) -> Self {
    Self::with_cache(store, PipelineCache::new())
  }

  /// Use a cache shared with other services.
  pub fn with_cache(store: S, cache: PipelineCache) -> Self {
    Self { store, cache }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn cache(&self) -> &PipelineCache {
    &self.cache
  }

  /// Compile and persist a workflow.
  ///
  /// Only a malformed definition is rejected. Compile errors are returned as
  /// warnings alongside the saved workflow.
  #[instrument(name = "workflow_save", skip(self, definition, bindings), fields(workflow_id = %definition.id))]
  pub async fn save(
    &self,
    mut definition: WorkflowDefinition,
    bindings: StepBindings,
  ) -> Result<SaveOutcome, StoreError> {
    let output = compile(&definition, &bindings)?;
    let warnings = output.error_messages();

    if definition.created_at.is_none() {
      definition.created_at = self.created_at(&definition.id).await?;
    }

    let now = Utc::now();
    definition.created_at.get_or_insert(now);
    definition.updated_at = Some(now);
    definition.required_connections = output.metadata.required_connections.clone();

    let workflow = StoredWorkflow {
      definition,
      bindings,
      pipeline: output.pipeline,
      compile_errors: warnings.clone(),
      saved_at: now,
    };

    self.store.put(&workflow).await?;
    self.cache.invalidate(workflow.id());

    if warnings.is_empty() {
      info!(event = "workflow_saved", executable = workflow.pipeline.is_some(), "saved workflow");
    } else {
      warn!(
        event = "workflow_saved",
        executable = workflow.pipeline.is_some(),
        warnings = ?warnings,
        "saved workflow with compile errors"
      );
    }

    Ok(SaveOutcome {
      workflow,
      metadata: output.metadata,
      warnings,
    })
  }

  pub async fn get(&self, workflow_id: &str) -> Result<Option<StoredWorkflow>, StoreError> {
    self.store.get(workflow_id).await
  }

  pub async fn list(&self) -> Result<Vec<WorkflowSummary>, StoreError> {
    self.store.list().await
  }

  /// The latest compiled pipeline for a workflow.
  ///
  /// Fails with [`StoreError::NotFound`] when the workflow does not exist.
  /// Returns `None` when it exists but its pipeline was withheld.
  pub async fn pipeline(
    &self,
    workflow_id: &str,
  ) -> Result<Option<Arc<CompiledPipeline>>, StoreError> {
    // Try the cache first
    if let Some(pipeline) = self.cache.get(workflow_id) {
      return Ok(Some(pipeline));
    }

    let generation = self.cache.generation(workflow_id);
    let workflow = self
      .store
      .get(workflow_id)
      .await?
      .ok_or_else(|| StoreError::NotFound(workflow_id.to_string()))?;

    Ok(
      workflow
        .pipeline
        .map(|pipeline| self.cache.insert_if_current(pipeline, generation)),
    )
  }

  /// Creation time of the stored version, if there is one.
  ///
  /// An unreadable stored version does not block the save that replaces it.
  async fn created_at(&self, workflow_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
    match self.store.get(workflow_id).await {
      Ok(existing) => Ok(existing.and_then(|w| w.definition.created_at)),
      Err(e @ StoreError::InvalidId(_)) => Err(e),
      Err(e) => {
        warn!(workflow_id, error = %e, "could not read stored workflow, keeping new creation time");
        Ok(None)
      }
    }
  }

  /// Delete a workflow and its pipeline, and drop it from the cache.
  #[instrument(name = "workflow_delete", skip(self))]
  pub async fn delete(&self, workflow_id: &str) -> Result<bool, StoreError> {
    let existed = self.store.delete(workflow_id).await?;
    self.cache.invalidate(workflow_id);
    info!(event = "workflow_deleted", existed, "deleted workflow");
    Ok(existed)
  }
}
