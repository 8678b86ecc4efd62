use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use libtally::prelude::*;
use tracing::instrument;

use crate::api::{
  AppState,
  dto::{RuleListing, TestRulePayload},
  errors::AppError,
  middlewares::{auth::Auth, json_rejection::TypedJson},
};

pub async fn list_rules<S: DocumentStore>(State(state): State<AppState<S>>, _: Auth<S>) -> impl IntoResponse {
  Json(RuleListing {
    rules: &state.rules.rules,
    count: state.rules.rules.len(),
  })
  .into_response()
}

/// Preview a single rule against sample records.
///
/// The evaluation is abandoned once the configured preview deadline passes;
/// nothing it computed is kept.
#[instrument(skip_all)]
pub async fn test_rule<S: DocumentStore>(State(state): State<AppState<S>>, _: Auth<S>, TypedJson(body): TypedJson<TestRulePayload>) -> Result<(StatusCode, impl IntoResponse), AppError> {
  let TestRulePayload { rule, sources, targets } = body;

  match tokio::time::timeout(state.config.preview_timeout, state.tally.test_rule(&rule, sources, targets)).await {
    Ok(preview) => Ok((StatusCode::OK, Json(preview?))),

    Err(_) => {
      tracing::warn!(timeout = state.config.preview_timeout.as_millis(), "rule preview exceeded its deadline");

      Err(AppError::Timeout)
    }
  }
}
