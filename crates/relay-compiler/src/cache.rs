//! Compiled pipeline caching.
//!
//! Pipelines are compiled when a workflow is saved and reused by every run
//! until the workflow changes. The cache is an injected service; whoever
//! persists workflows is responsible for invalidating it.
//!
//! Each workflow id carries a generation that every invalidation bumps. A
//! reader that loads a pipeline from storage takes the generation first and
//! fills the cache with [`PipelineCache::insert_if_current`], so a pipeline
//! read before a concurrent save never replaces the newer one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::pipeline::CompiledPipeline;

#[derive(Debug, Default)]
struct Entries {
  pipelines: HashMap<String, Arc<CompiledPipeline>>,
  generations: HashMap<String, u64>,
}

impl Entries {
  fn generation(&self, workflow_id: &str) -> u64 {
    self.generations.get(workflow_id).copied().unwrap_or(0)
  }
}

/// Caches compiled pipelines by workflow id.
#[derive(Debug, Clone, Default)]
pub struct PipelineCache {
  cache: Arc<RwLock<Entries>>,
}

impl PipelineCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, workflow_id: &str) -> Option<Arc<CompiledPipeline>> {
    let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
    cache.pipelines.get(workflow_id).cloned()
  }

  /// Current generation of a workflow id. Take it before reading storage.
  pub fn generation(&self, workflow_id: &str) -> u64 {
    let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
    cache.generation(workflow_id)
  }

  /// Store a pipeline, replacing any earlier one for the same workflow.
  pub fn insert(&self, pipeline: CompiledPipeline) -> Arc<CompiledPipeline> {
    let pipeline = Arc::new(pipeline);
    let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
    cache
      .pipelines
      .insert(pipeline.workflow_id.clone(), Arc::clone(&pipeline));
    pipeline
  }

  /// Store a pipeline read at `generation`, unless the workflow was
  /// invalidated since. The pipeline is returned either way.
  pub fn insert_if_current(
    &self,
    pipeline: CompiledPipeline,
    generation: u64,
  ) -> Arc<CompiledPipeline> {
    let pipeline = Arc::new(pipeline);
    let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
    if cache.generation(&pipeline.workflow_id) == generation {
      cache
        .pipelines
        .insert(pipeline.workflow_id.clone(), Arc::clone(&pipeline));
    }
    pipeline
  }

  /// Drop the pipeline for one workflow and bump its generation.
  ///
  /// Returns whether a pipeline was cached.
  pub fn invalidate(&self, workflow_id: &str) -> bool {
    let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
    *cache.generations.entry(workflow_id.to_string()).or_insert(0) += 1;
    cache.pipelines.remove(workflow_id).is_some()
  }

  /// Clear the cache.
  pub fn clear(&self) {
    let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
    let Entries {
      pipelines,
      generations,
    } = &mut *cache;
    for (id, _) in pipelines.drain() {
      generations.entry(id).or_insert(0);
    }
    for generation in generations.values_mut() {
      *generation += 1;
    }
  }

  pub fn len(&self) -> usize {
    self
      .cache
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .pipelines
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use relay_schema::Validator;

  use super::*;
  use crate::pipeline::PipelineMetadata;

  fn pipeline(id: &str) -> CompiledPipeline {
    CompiledPipeline::new(
      id.to_string(),
      format!("workflow {}", id),
      Validator::Any,
      Validator::Any,
      Vec::new(),
      PipelineMetadata::default(),
    )
  }

  #[test]
  fn test_same_arc_until_invalidated() {
    let cache = PipelineCache::new();
    cache.insert(pipeline("wf"));

    let first = cache.get("wf").unwrap();
    let second = cache.get("wf").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    assert!(cache.invalidate("wf"));
    assert!(cache.get("wf").is_none());
    assert!(!cache.invalidate("wf"));
  }

  #[test]
  fn test_stale_read_is_not_cached() {
    let cache = PipelineCache::new();
    let generation = cache.generation("wf");

    // A save lands between the read and the fill.
    cache.invalidate("wf");
    let stale = cache.insert_if_current(pipeline("wf"), generation);

    assert_eq!(stale.workflow_id, "wf");
    assert!(cache.get("wf").is_none());

    let generation = cache.generation("wf");
    cache.insert_if_current(pipeline("wf"), generation);
    assert!(cache.get("wf").is_some());
  }

  #[test]
  fn test_clear() {
    let cache = PipelineCache::new();
    cache.insert(pipeline("a"));
    cache.insert(pipeline("b"));
    assert_eq!(cache.len(), 2);

    let generation = cache.generation("a");
    cache.clear();
    assert!(cache.is_empty());
    assert_ne!(cache.generation("a"), generation);
  }
}
