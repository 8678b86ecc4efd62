use std::time::Duration;

use anyhow::Context;
use reqwest::Client;

use crate::{error::TallyError, model::Record, store::DocumentStore};

/// A document store reached over HTTP.
///
/// Documents of a model are read with `GET {base}/{model}`, which must return
/// a JSON array of records. Health is checked with `GET {base}/healthz`.
#[derive(Clone, Debug)]
pub struct HttpStore {
  client: Client,
  base: String,
}

impl HttpStore {
  pub fn new(base: &str) -> Result<HttpStore, TallyError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build().context("could not build HTTP client")?;

    Ok(HttpStore {
      client,
      base: base.trim_end_matches('/').to_string(),
    })
  }
}

impl DocumentStore for HttpStore {
  async fn health(&self) -> Result<bool, TallyError> {
    match self.client.get(format!("{}/healthz", self.base)).send().await {
      Ok(response) => Ok(response.status().is_success()),
      Err(err) => {
        tracing::warn!(error = %err, "record store is unreachable");

        Ok(false)
      }
    }
  }

  #[tracing::instrument(name = "fetch_documents", skip(self))]
  async fn documents(&self, model: &str) -> Result<Vec<Record>, TallyError> {
    let response = self.client.get(format!("{}/{model}", self.base)).send().await?;

    if !response.status().is_success() {
      return Err(TallyError::LookupError(format!("record store returned {} for model '{model}'", response.status())));
    }

    let documents = response.json::<Vec<Record>>().await?;

    tracing::debug!(count = documents.len(), "fetched documents");

    Ok(documents)
  }
}
