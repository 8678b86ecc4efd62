#[derive(Debug, thiserror::Error)]
pub enum TallyError {
  #[error("invalid rule '{rule}': {reason}")]
  ConfigError { rule: String, reason: String },
  #[error("could not evaluate record '{record}': {reason}")]
  EvaluationError { record: String, reason: String },
  #[error("record store lookup failed: {0}")]
  LookupError(String),
  #[error(transparent)]
  OtherError(#[from] anyhow::Error),
}

impl TallyError {
  pub(crate) fn config(rule: &str, reason: impl Into<String>) -> TallyError {
    TallyError::ConfigError {
      rule: rule.to_string(),
      reason: reason.into(),
    }
  }

  pub(crate) fn evaluation(record: &str, reason: impl Into<String>) -> TallyError {
    TallyError::EvaluationError {
      record: record.to_string(),
      reason: reason.into(),
    }
  }
}

impl From<reqwest::Error> for TallyError {
  fn from(value: reqwest::Error) -> Self {
    TallyError::LookupError(value.to_string())
  }
}
