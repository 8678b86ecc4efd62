use std::sync::Arc;

use libtally::prelude::*;

use crate::api::{AppState, config::Config};

mod api;

/// A record store that is never reachable.
#[derive(Clone, Default)]
pub struct FailingStore;

impl DocumentStore for FailingStore {
  async fn health(&self) -> Result<bool, TallyError> {
    Ok(false)
  }

  async fn documents(&self, model: &str) -> Result<Vec<Record>, TallyError> {
    Err(TallyError::LookupError(format!("could not fetch {model}")))
  }
}

pub fn state<S: DocumentStore>(config: Config, store: S, rules: RuleSet) -> AppState<S> {
  AppState {
    config,
    prometheus: None,
    tally: Tally::new(store).workers(2).build().unwrap(),
    rules: Arc::new(rules),
  }
}
