mod http;
mod memory;

use std::collections::HashMap;

use ahash::RandomState;

use crate::{error::TallyError, model::Record};

pub use self::{http::HttpStore, memory::MemoryStore};

/// Intermediate documents fetched for a run, keyed by logical model name.
pub type Documents = HashMap<String, Vec<Record>, RandomState>;

/// Access to the external record store holding intermediate documents (sales
/// and purchase orders).
///
/// Each relation model is read in full at most once per run; predicates are
/// then evaluated locally, so a run never issues one lookup per record pair.
pub trait DocumentStore: Clone + Send + Sync + 'static {
  fn health(&self) -> impl Future<Output = Result<bool, TallyError>> + Send;
  fn documents(&self, model: &str) -> impl Future<Output = Result<Vec<Record>, TallyError>> + Send;
}
