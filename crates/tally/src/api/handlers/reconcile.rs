use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use libtally::prelude::*;
use tracing::instrument;

use crate::api::{
  AppState,
  dto::ReconcilePayload,
  errors::AppError,
  middlewares::{auth::Auth, json_rejection::TypedJson},
};

#[instrument(skip_all)]
pub async fn reconcile<S: DocumentStore>(State(state): State<AppState<S>>, _: Auth<S>, TypedJson(body): TypedJson<ReconcilePayload>) -> Result<(StatusCode, impl IntoResponse), AppError> {
  let ReconcilePayload { rules, sources, targets, params } = body;

  let rules = match rules {
    Some(rules) => rules,
    None => state.rules.rules.clone(),
  };

  let params = params.unwrap_or_else(|| state.config.params.clone());
  let reconciliation = state.tally.run_reconciliation(&rules, sources, targets, &params).await?;

  Ok((StatusCode::OK, Json(reconciliation)))
}
