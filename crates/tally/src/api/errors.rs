use std::error::Error;

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use libtally::prelude::*;
use serde_json::json;
use tracing::*;

pub(crate) struct ApiError(pub StatusCode, pub String, pub Option<Vec<String>>);

#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error("invalid credentials")]
  InvalidCredentials,
  #[error("missing resource")]
  ResourceNotFound,
  #[error("rule evaluation took too long")]
  Timeout,
  #[error(transparent)]
  OtherError(#[from] anyhow::Error),

  #[error("invalid configuration: {0}")]
  ConfigError(String),
  #[error("invalid rule '{rule}'")]
  RuleError { rule: String, reason: String },
  #[error("could not evaluate record '{record}'")]
  EvaluationError { record: String, reason: String },
  #[error("record store is unavailable: {0}")]
  LookupError(String),
}

impl From<TallyError> for AppError {
  fn from(value: TallyError) -> Self {
    match value {
      TallyError::ConfigError { rule, reason } => AppError::RuleError { rule, reason },
      TallyError::EvaluationError { record, reason } => AppError::EvaluationError { record, reason },
      TallyError::LookupError(err) => AppError::LookupError(err),
      TallyError::OtherError(err) => AppError::OtherError(err),
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    error!(error = self.source(), "{}", self.to_string());

    ApiError::from(&self).into_response()
  }
}

impl From<&AppError> for ApiError {
  fn from(value: &AppError) -> Self {
    match value {
      AppError::InvalidCredentials => ApiError(StatusCode::UNAUTHORIZED, value.to_string(), None),
      AppError::ResourceNotFound => ApiError(StatusCode::NOT_FOUND, value.to_string(), None),
      AppError::Timeout => ApiError(StatusCode::REQUEST_TIMEOUT, value.to_string(), None),
      AppError::RuleError { reason, .. } => ApiError(StatusCode::UNPROCESSABLE_ENTITY, value.to_string(), Some(vec![reason.clone()])),
      AppError::EvaluationError { reason, .. } => ApiError(StatusCode::UNPROCESSABLE_ENTITY, value.to_string(), Some(vec![reason.clone()])),
      AppError::LookupError(_) => ApiError(StatusCode::BAD_GATEWAY, value.to_string(), None),
      AppError::OtherError(inner) if inner.is::<AppError>() => match inner.downcast_ref::<AppError>() {
        Some(inner) => inner.into(),
        _ => ApiError(StatusCode::INTERNAL_SERVER_ERROR, value.to_string(), None),
      },
      _ => ApiError(StatusCode::INTERNAL_SERVER_ERROR, value.to_string(), None),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let payload = match self.2 {
      Some(details) => json!({
          "message": self.1.to_string(),
          "details": details,
      }),
      None => json!({
          "message": self.1.to_string(),
      }),
    };

    (self.0, Json(payload)).into_response()
  }
}
