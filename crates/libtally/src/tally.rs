use std::sync::Arc;

use anyhow::Context;
use bon::bon;
use itertools::Itertools;
use jiff::Timestamp;
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{Span, instrument};

use crate::{
  aggregate::{Reconciliation, RunParams, aggregate},
  engine::{self, MatchCandidate, RuleReport},
  error::TallyError,
  model::Record,
  rules::{CompiledRule, RuleConfig, RuleMode, compile_rules},
  store::{DocumentStore, Documents},
};

/// Result of running a single rule on its own, for rule authors.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RulePreview {
  #[serde(flatten)]
  pub report: RuleReport,
  pub matches: Vec<MatchCandidate>,
  pub matched_sources: usize,
  /// Share of the rule's sources that found at least one target.
  pub match_percentage: f64,
}

/// The main entrypoint for using the tally library.
///
/// It holds the [`DocumentStore`] relation rules read intermediate documents
/// from, and a bounded worker pool on which rules are evaluated.
///
/// # Examples
///
/// ```rust
/// # use libtally::prelude::*;
/// # tokio_test::block_on(async {
/// let tally = Tally::new(MemoryStore::default()).workers(2).build().unwrap();
///
/// let rules = RuleSet::from_yaml("rules: [{ name: number, source_field: payment_ref, target_field: name, match_type: equals }]").unwrap();
/// let sources = vec![Record::builder("p1").fields(&[("payment_ref", "INV-1001".into())]).build()];
/// let targets = vec![Record::builder("inv1").name("INV-1001").build()];
///
/// let result = tally.run_reconciliation(&rules.rules, sources, targets, &RunParams::default()).await.unwrap();
///
/// assert_eq!(result.suggestions[0].target_id, "inv1");
/// # });
/// ```
///
/// This struct can be safely cloned and sent across thread boundaries.
#[derive(Clone, Debug)]
pub struct Tally<S: DocumentStore> {
  store: S,
  pool: Arc<ThreadPool>,
}

#[bon]
impl<S: DocumentStore> Tally<S> {
  /// Create a new Tally instance.
  ///
  /// `workers` bounds the number of threads evaluating rules; it defaults to
  /// the number of available cores.
  #[allow(clippy::new_ret_no_self)]
  #[builder(start_fn = new, finish_fn = build)]
  pub fn _new(#[builder(start_fn)] store: S, workers: Option<usize>) -> Result<Tally<S>, TallyError> {
    let pool = ThreadPoolBuilder::new()
      .num_threads(workers.unwrap_or_default())
      .thread_name(|index| format!("tally-worker-{index}"))
      .build()
      .context("could not build rule evaluation pool")?;

    Ok(Tally { store, pool: Arc::new(pool) })
  }
}

impl<S: DocumentStore> Tally<S> {
  /// Retrieve the record store availability.
  pub async fn health(&self) -> Result<bool, TallyError> {
    self.store.health().await
  }

  pub fn workers(&self) -> usize {
    self.pool.current_num_threads()
  }

  /// Fetch the intermediate documents every relation rule needs, once per
  /// model.
  #[instrument(name = "prefetch_documents", skip_all)]
  pub async fn fetch_documents(&self, rules: &[CompiledRule]) -> Result<Documents, TallyError> {
    let mut documents = Documents::default();

    let models = rules.iter().filter(|rule| rule.mode() != RuleMode::Direct).filter_map(|rule| rule.relation_model()).unique().collect::<Vec<_>>();

    for model in models {
      let records = self.store.documents(model).await?;

      tracing::debug!(model, count = records.len(), "fetched documents");

      documents.insert(model.to_string(), records);
    }

    Ok(documents)
  }

  /// Evaluate already compiled rules and aggregate their matches.
  ///
  /// Runs on the worker pool and blocks the calling thread until done.
  pub fn reconcile(&self, rules: &[CompiledRule], sources: &[Record], targets: &[Record], documents: &Documents, params: &RunParams) -> Result<Reconciliation, TallyError> {
    self.pool.install(|| reconcile(rules, sources, targets, documents, params))
  }

  /// Run every active rule over the candidate pools and propose at most one
  /// target per source record.
  ///
  /// Invalid rules are reported in the result and do not prevent the others
  /// from running. A failing record store lookup fails the whole run.
  #[instrument(name = "run_reconciliation", skip_all, fields(rules = rules.len(), sources = sources.len(), targets = targets.len()))]
  pub async fn run_reconciliation(&self, rules: &[RuleConfig], sources: Vec<Record>, targets: Vec<Record>, params: &RunParams) -> Result<Reconciliation, TallyError> {
    let (compiled, rejected) = compile_rules(rules);
    let documents = self.fetch_documents(&compiled).await?;
    let params = params.clone();

    let mut reconciliation = self.spawn(move || reconcile(&compiled, &sources, &targets, &documents, &params)).await??;

    reconciliation.summary.rules_rejected = rejected.len();
    reconciliation.rejected = rejected;

    let summary = &reconciliation.summary;

    tracing::info!(
      processed = summary.processed,
      suggested = summary.suggested,
      unmatched = summary.unmatched,
      confirmed = summary.confirmed,
      rejected_rules = summary.rules_rejected,
      "reconciliation complete"
    );

    Ok(reconciliation)
  }

  /// Run a single rule alone and report what it would match.
  ///
  /// An invalid rule is returned as an error rather than reported.
  #[instrument(name = "test_rule", skip_all, fields(rule = rule.name))]
  pub async fn test_rule(&self, rule: &RuleConfig, sources: Vec<Record>, targets: Vec<Record>) -> Result<RulePreview, TallyError> {
    let compiled = rule.compile()?;
    let documents = self.fetch_documents(std::slice::from_ref(&compiled)).await?;

    let outcome = self.spawn(move || engine::evaluate(&compiled, &sources, &targets, &documents)).await??;

    let matched_sources = outcome.candidates.iter().map(|candidate| candidate.source_id.as_str()).unique().count();
    let match_percentage = match outcome.report.sources_in {
      0 => 0.0,
      total => 100.0 * matched_sources as f64 / total as f64,
    };

    Ok(RulePreview {
      report: outcome.report,
      matches: outcome.candidates,
      matched_sources,
      match_percentage,
    })
  }

  async fn spawn<T, F>(&self, task: F) -> Result<T, TallyError>
  where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    let span = Span::current();

    self.pool.spawn(move || {
      let _ = tx.send(span.in_scope(task));
    });

    Ok(rx.await.context("rule evaluation was interrupted")?)
  }
}

fn reconcile(rules: &[CompiledRule], sources: &[Record], targets: &[Record], documents: &Documents, params: &RunParams) -> Result<Reconciliation, TallyError> {
  let outcomes = rules.par_iter().map(|rule| engine::evaluate(rule, sources, targets, documents)).collect::<Result<Vec<_>, _>>()?;
  let (candidates, reports): (Vec<_>, Vec<_>) = outcomes.into_iter().map(|outcome| (outcome.candidates, outcome.report)).unzip();

  let mut reconciliation = aggregate(sources, candidates.into_iter().flatten(), params, Timestamp::now());

  reconciliation.summary.rules_evaluated = reports.len();
  reconciliation.rules = reports;

  Ok(reconciliation)
}
