use std::{
  env::{self, VarError},
  fmt::Display,
  str::FromStr,
  time::Duration,
};

use libtally::prelude::*;
use validator::Validate;

use crate::api::errors::AppError;

#[derive(Clone, Debug)]
pub struct Config {
  pub env: Env,
  pub listen_addr: String,
  pub api_key: Option<String>,

  // Rules and records
  pub rules_path: Option<String>,
  pub record_store_url: Option<String>,
  pub documents_path: Option<String>,

  // Match settings
  pub params: RunParams,
  pub workers: Option<usize>,
  pub preview_timeout: Duration,

  // Debugging
  pub enable_tracing: bool,
  pub enable_prometheus: bool,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      env: Env::Dev,
      listen_addr: "0.0.0.0:8000".into(),
      api_key: None,
      rules_path: None,
      record_store_url: None,
      documents_path: None,
      params: RunParams::default(),
      workers: None,
      preview_timeout: Duration::from_millis(10_000),
      enable_tracing: false,
      enable_prometheus: false,
    }
  }
}

impl Config {
  pub fn from_env() -> Result<Config, AppError> {
    let defaults = RunParams::default();

    let config = Config {
      env: Env::from(env::var("ENV").unwrap_or("dev".into())),
      listen_addr: env::var("LISTEN_ADDR").unwrap_or("0.0.0.0:8000".into()),
      api_key: env::var("API_KEY").ok().filter(|key| !key.is_empty()),
      rules_path: env::var("RULES_PATH").ok().filter(|path| !path.is_empty()),
      record_store_url: env::var("RECORD_STORE_URL").ok().filter(|url| !url.is_empty()),
      documents_path: env::var("DOCUMENTS_PATH").ok().filter(|path| !path.is_empty()),
      params: RunParams {
        min_match_score: parse_env("MIN_MATCH_SCORE", defaults.min_match_score)?,
        auto_confirm_score: parse_env("AUTO_CONFIRM_SCORE", defaults.auto_confirm_score)?,
      },
      workers: Some(parse_env::<usize>("WORKERS", 0)?).filter(|workers| *workers > 0),
      preview_timeout: Duration::from_millis(parse_env("PREVIEW_TIMEOUT_MS", 10_000)?),
      enable_tracing: env::var("ENABLE_TRACING").unwrap_or_default() == "1",
      enable_prometheus: env::var("ENABLE_PROMETHEUS").unwrap_or_default() == "1",
    };

    if config.params.validate().is_err() {
      return Err(AppError::ConfigError("MIN_MATCH_SCORE and AUTO_CONFIRM_SCORE must be between 0 and 100".into()));
    }

    Ok(config)
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Env {
  Dev,
  Production,
}

impl From<String> for Env {
  fn from(value: String) -> Self {
    match value.as_ref() {
      "dev" => Env::Dev,
      "production" => Env::Production,
      _ => Env::Dev,
    }
  }
}

pub fn parse_env<T>(name: &str, default: T) -> anyhow::Result<T>
where
  T: FromStr,
  T::Err: Display,
{
  match env::var(name) {
    Ok(value) if value.is_empty() => Ok(default),
    Ok(value) => Ok(value.parse::<T>().map_err(|err| AppError::ConfigError(format!("could not read {name}: {err}")))?),
    Err(err) => match err {
      VarError::NotPresent => Ok(default),
      _ => Err(AppError::ConfigError(format!("could not read {name}: {err}")).into()),
    },
  }
}
