use libtally::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Clone, Debug, Deserialize, Validate)]
pub(crate) struct ReconcilePayload {
  /// Rules to run instead of the rule set loaded at startup.
  #[serde(default)]
  pub rules: Option<Vec<RuleConfig>>,
  #[validate(length(min = 1, message = "at least one source record must be provided"))]
  pub sources: Vec<Record>,
  #[serde(default)]
  pub targets: Vec<Record>,
  #[serde(default)]
  #[validate(nested)]
  pub params: Option<RunParams>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub(crate) struct TestRulePayload {
  pub rule: RuleConfig,
  #[validate(length(min = 1, message = "at least one source record must be provided"))]
  pub sources: Vec<Record>,
  #[serde(default)]
  pub targets: Vec<Record>,
}

#[derive(Serialize)]
pub(crate) struct RuleListing<'r> {
  pub rules: &'r [RuleConfig],
  pub count: usize,
}

