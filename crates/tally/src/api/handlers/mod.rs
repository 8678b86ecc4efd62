mod reconcile;
mod rules;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use libtally::prelude::*;

use crate::api::{AppState, errors::AppError};

pub use self::reconcile::reconcile;
pub use self::rules::{list_rules, test_rule};

pub async fn not_found() -> impl IntoResponse {
  AppError::ResourceNotFound
}

pub async fn healthz() -> StatusCode {
  StatusCode::OK
}

pub async fn readyz<S: DocumentStore>(State(state): State<AppState<S>>) -> StatusCode {
  match state.tally.health().await {
    Ok(true) => StatusCode::OK,
    Ok(false) => StatusCode::SERVICE_UNAVAILABLE,

    Err(err) => {
      tracing::error!(error = err.to_string(), "could not check record store health");

      StatusCode::SERVICE_UNAVAILABLE
    }
  }
}

pub async fn prometheus<S: DocumentStore>(State(state): State<AppState<S>>) -> Result<String, AppError> {
  match state.prometheus {
    Some(handle) => Ok(handle.render()),
    None => Err(AppError::ResourceNotFound),
  }
}
