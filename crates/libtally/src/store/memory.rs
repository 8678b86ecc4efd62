use std::{path::Path, sync::Arc};

use anyhow::Context;

use crate::{
  error::TallyError,
  model::Record,
  store::{DocumentStore, Documents},
};

/// A document store kept in memory.
///
/// Unknown models hold no documents.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
  models: Arc<Documents>,
}

impl MemoryStore {
  pub fn with_documents(models: Documents) -> MemoryStore {
    MemoryStore { models: Arc::new(models) }
  }

  /// Load documents from a JSON object mapping model names to record arrays.
  pub fn from_path(path: impl AsRef<Path>) -> Result<MemoryStore, TallyError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("could not open documents file at {}", path.display()))?;
    let models: Documents = serde_json::from_reader(std::io::BufReader::new(file)).context("invalid documents file")?;

    tracing::info!(path = %path.display(), models = models.len(), "loaded documents");

    Ok(MemoryStore::with_documents(models))
  }
}

impl DocumentStore for MemoryStore {
  async fn health(&self) -> Result<bool, TallyError> {
    Ok(true)
  }

  async fn documents(&self, model: &str) -> Result<Vec<Record>, TallyError> {
    Ok(self.models.get(model).cloned().unwrap_or_default())
  }
}
