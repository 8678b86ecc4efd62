use std::sync::Arc;

use axum::{
  Router, middleware,
  routing::{get, post},
};
use libtally::prelude::*;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::{api::config::Config, trace};

pub mod config;
pub mod dto;
pub mod errors;

pub mod handlers;
mod middlewares;

#[derive(Clone)]
pub struct AppState<S: DocumentStore> {
  pub config: Config,
  pub prometheus: Option<PrometheusHandle>,
  pub tally: Tally<S>,
  pub rules: Arc<RuleSet>,
}

pub fn routes<S: DocumentStore>(config: &Config, store: S) -> anyhow::Result<Router> {
  let rules = match &config.rules_path {
    Some(path) => RuleSet::from_path(path)?,
    None => RuleSet::default(),
  };

  tracing::info!(rules = rules.rules.len(), "loaded rule set");

  let tally = Tally::new(store).maybe_workers(config.workers).build()?;

  let prometheus = match config.enable_prometheus {
    true => Some(trace::build_prometheus()?),
    false => None,
  };

  let state = AppState {
    config: config.clone(),
    prometheus,
    tally,
    rules: Arc::new(rules),
  };

  Ok(router(state))
}

pub fn router<S: DocumentStore>(state: AppState<S>) -> Router {
  Router::new()
    .route("/reconcile", post(handlers::reconcile::<S>))
    .route("/rules", get(handlers::list_rules::<S>))
    .route("/rules/test", post(handlers::test_rule::<S>))
    .fallback(handlers::not_found)
    .layer(middleware::from_fn(middlewares::metrics))
    .layer(TraceLayer::new_for_http().make_span_with(middlewares::create_request_span))
    // The routes below will not go through the observability middlewares above
    .route("/healthz", get(handlers::healthz))
    .route("/readyz", get(handlers::readyz::<S>))
    .route("/metrics", get(handlers::prometheus::<S>))
    .layer(middleware::from_fn_with_state(state.clone(), middlewares::logging::api_logger::<S>))
    .layer(middleware::from_fn(middlewares::request_id))
    .with_state(state)
}
