use std::{cmp::Reverse, path::Path};

use anyhow::Context;
use itertools::Itertools;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use validator::Validate;

use crate::{
  error::TallyError,
  field::FieldDescriptor,
  filter::{self, Filter, Literal, Operator},
  matching::{MatchType, extract::Extractor, normalize::NormalizationOptions},
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMode {
  /// Source field compared against a target field.
  #[default]
  Direct,
  /// Source value locates intermediate documents, whose invoices are matched.
  Relation,
  /// Intermediate documents are enumerated first and matched back to sources.
  RelationReverse,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
  High,
  #[default]
  Medium,
  Low,
}

impl Priority {
  fn weight(&self) -> u8 {
    match self {
      Priority::High => 2,
      Priority::Medium => 1,
      Priority::Low => 0,
    }
  }
}

/// How a source value is looked up on intermediate documents in relation mode.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub enum SearchOperator {
  #[serde(rename = "=")]
  Equals,
  #[default]
  #[serde(rename = "ilike")]
  ILike,
  #[serde(rename = "like")]
  Like,
  #[serde(rename = "in")]
  In,
  /// Exact match or case-insensitive containment.
  #[serde(rename = "=ilike")]
  EqualsOrILike,
}

impl SearchOperator {
  pub(crate) fn filter(&self, field: &str, value: &str) -> Filter {
    let text = || Literal::Text(value.to_string());

    match self {
      SearchOperator::Equals => Filter::condition(field, Operator::Eq, text()),
      SearchOperator::ILike => Filter::condition(field, Operator::ILike, text()),
      SearchOperator::Like => Filter::condition(field, Operator::Like, text()),
      SearchOperator::In => Filter::condition(field, Operator::In, Literal::List(vec![text()])),
      SearchOperator::EqualsOrILike => Filter::Or(vec![Filter::condition(field, Operator::Eq, text()), Filter::condition(field, Operator::ILike, text())]),
    }
  }
}

/// A user-defined matching rule, as stored by the configuration service.
#[serde_inline_default]
#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
pub struct RuleConfig {
  #[validate(length(min = 1, message = "rule name cannot be empty"))]
  pub name: String,
  #[serde_inline_default(true)]
  pub active: bool,
  #[serde(default)]
  pub mode: RuleMode,
  #[serde_inline_default(10)]
  pub sequence: i32,
  #[serde(default)]
  pub priority: Priority,

  pub source_field: FieldDescriptor,
  #[serde(default)]
  pub target_field: Option<FieldDescriptor>,

  #[serde(default)]
  pub match_type: MatchType,
  #[serde(default)]
  pub normalization: NormalizationOptions,
  #[serde_inline_default(70.0)]
  #[validate(range(min = 0.0, max = 100.0, message = "minimum score must be between 0 and 100"))]
  pub min_score: f64,
  #[serde(default)]
  pub extract_pattern: Option<String>,
  /// Pattern both values must contain, for the `regex` match type.
  #[serde(default)]
  pub match_pattern: Option<String>,

  #[serde(default)]
  pub source_domain_filter: Option<String>,
  #[serde(default)]
  pub target_domain_filter: Option<String>,
  #[serde(default)]
  pub relation_domain_filter: Option<String>,

  #[serde(default)]
  pub relation_model: Option<String>,
  #[serde(default)]
  pub relation_search_field: Option<String>,
  #[serde_inline_default("invoice_ids".to_string())]
  pub invoice_relation_field: String,
  #[serde(default)]
  pub search_operator: SearchOperator,

  #[serde(default)]
  pub description: Option<String>,
}

/// A rule that passed validation, with its patterns and filters compiled.
#[derive(Clone, Debug)]
pub struct CompiledRule {
  pub config: RuleConfig,
  /// Position in the evaluation order, used to break score ties.
  pub(crate) rank: usize,
  pub(crate) extractor: Extractor,
  pub(crate) pattern: Option<Regex>,
  pub(crate) source_filter: Filter,
  pub(crate) target_filter: Filter,
  pub(crate) relation_filter: Filter,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RuleRejection {
  pub rule: String,
  pub reason: String,
}

impl RuleConfig {
  pub fn compile(&self) -> Result<CompiledRule, TallyError> {
    let rule = self.name.as_str();

    if let Err(errs) = self.validate() {
      let reasons = errs.field_errors().into_iter().flat_map(|(_, errors)| errors.iter().filter_map(|err| err.message.as_ref().map(|message| message.to_string()))).join(", ");

      return Err(TallyError::config(rule, reasons));
    }

    match self.mode {
      RuleMode::Direct if self.target_field.is_none() => return Err(TallyError::config(rule, "direct rules require a target field")),
      RuleMode::Relation | RuleMode::RelationReverse => {
        if self.relation_model.as_deref().is_none_or(|model| model.trim().is_empty()) {
          return Err(TallyError::config(rule, "relation rules require a relation model"));
        }
        if self.relation_search_field.as_deref().is_none_or(|field| field.trim().is_empty()) {
          return Err(TallyError::config(rule, "relation rules require a relation search field"));
        }
        if self.invoice_relation_field.trim().is_empty() {
          return Err(TallyError::config(rule, "relation rules require an invoice relation field"));
        }
      }
      _ => {}
    }

    let case_sensitive = self.normalization.case_sensitive;
    let extractor = Extractor::compile(self.extract_pattern.as_deref(), case_sensitive).map_err(|err| TallyError::config(rule, format!("invalid extraction pattern: {err}")))?;

    let pattern = match (self.match_type, self.match_pattern.as_deref()) {
      (MatchType::Regex, None) => return Err(TallyError::config(rule, "regex rules require a match pattern")),
      (_, Some(pattern)) => Some(
        RegexBuilder::new(pattern)
          .case_insensitive(!case_sensitive)
          .build()
          .map_err(|err| TallyError::config(rule, format!("invalid match pattern: {err}")))?,
      ),
      (_, None) => None,
    };

    let compile_filter = |which: &str, domain: &Option<String>| match domain {
      Some(domain) => filter::parse(domain).map_err(|err| TallyError::config(rule, format!("invalid {which} filter: {err}"))),
      None => Ok(Filter::default()),
    };

    Ok(CompiledRule {
      config: self.clone(),
      rank: 0,
      extractor,
      pattern,
      source_filter: compile_filter("source", &self.source_domain_filter)?,
      target_filter: compile_filter("target", &self.target_domain_filter)?,
      relation_filter: compile_filter("relation", &self.relation_domain_filter)?,
    })
  }
}

impl CompiledRule {
  pub fn name(&self) -> &str {
    &self.config.name
  }

  pub fn mode(&self) -> RuleMode {
    self.config.mode
  }

  pub fn rank(&self) -> usize {
    self.rank
  }
}

/// Compile the active rules and put them in evaluation order: ascending
/// sequence, then descending priority, then name. Rules that fail validation
/// are returned separately and do not prevent the others from running.
pub fn compile_rules(configs: &[RuleConfig]) -> (Vec<CompiledRule>, Vec<RuleRejection>) {
  let mut rejections = Vec::new();

  let rules = configs
    .iter()
    .filter(|config| config.active)
    .filter_map(|config| match config.compile() {
      Ok(rule) => Some(rule),

      Err(err) => {
        tracing::warn!(rule = config.name, error = %err, "rejected invalid rule");

        rejections.push(RuleRejection {
          rule: config.name.clone(),
          reason: match err {
            TallyError::ConfigError { reason, .. } => reason,
            err => err.to_string(),
          },
        });

        None
      }
    })
    .sorted_by_key(|rule| (rule.config.sequence, Reverse(rule.config.priority.weight()), rule.config.name.clone()))
    .enumerate()
    .map(|(rank, mut rule)| {
      rule.rank = rank;
      rule
    })
    .collect::<Vec<_>>();

  (rules, rejections)
}

/// A named collection of rules, as loaded from a YAML or JSON file.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RuleSet {
  #[serde(default)]
  pub rules: Vec<RuleConfig>,
}

impl RuleSet {
  pub fn from_yaml(source: &str) -> Result<RuleSet, TallyError> {
    Ok(serde_yaml::from_str(source).context("could not parse rule set")?)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<RuleSet, TallyError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).with_context(|| format!("could not read rule set at {}", path.display()))?;

    RuleSet::from_yaml(&source)
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    error::TallyError,
    field::FieldKind,
    filter::{Filter, Literal, Operator},
    matching::MatchType,
  };

  use super::{Priority, RuleConfig, RuleMode, RuleSet, SearchOperator, compile_rules};

  fn rule(yaml: &str) -> RuleConfig {
    serde_yaml::from_str(yaml).unwrap()
  }

  fn reason(err: TallyError) -> String {
    match err {
      TallyError::ConfigError { reason, .. } => reason,
      err => panic!("unexpected error: {err}"),
    }
  }

  #[test]
  fn defaults() {
    let config = rule("{ name: by ref, source_field: payment_ref, target_field: ref }");

    assert!(config.active);
    assert_eq!(config.mode, RuleMode::Direct);
    assert_eq!(config.sequence, 10);
    assert_eq!(config.priority, Priority::Medium);
    assert_eq!(config.match_type, MatchType::Auto);
    assert_eq!(config.min_score, 70.0);
    assert_eq!(config.invoice_relation_field, "invoice_ids");
    assert_eq!(config.search_operator, SearchOperator::ILike);
    assert!(config.normalization.strip_spaces);
    assert!(!config.normalization.case_sensitive);
  }

  #[test]
  fn full_rule() {
    let config = rule(
      r#"
        name: Sale order reference
        mode: relation
        sequence: 5
        priority: high
        source_field: payment_ref
        extract_pattern: 'SO\d+'
        relation_model: sale.order
        relation_search_field: name
        relation_domain_filter: "[('state', '=', 'sale')]"
        search_operator: "=ilike"
        normalization:
          strip_special_chars: true
      "#,
    );

    let compiled = config.compile().unwrap();

    assert_eq!(compiled.mode(), RuleMode::Relation);
    assert_eq!(compiled.config.search_operator, SearchOperator::EqualsOrILike);
    assert!(compiled.extractor.is_configured());
    assert!(compiled.config.normalization.strip_special_chars);
    assert_eq!(compiled.relation_filter, Filter::condition("state", Operator::Eq, Literal::Text("sale".into())));
    assert!(compiled.source_filter.is_empty());
  }

  #[test]
  fn reference_source_field() {
    let config = rule("{ name: partner, source_field: { name: partner_id, kind: reference }, target_field: { name: partner_id, kind: reference } }");

    assert_eq!(config.source_field.kind, FieldKind::Reference);
    assert!(config.compile().is_ok());
  }

  #[test]
  fn invalid_configurations() {
    let cases = [
      ("{ name: a, source_field: ref }", "direct rules require a target field"),
      ("{ name: a, mode: relation, source_field: ref }", "relation rules require a relation model"),
      ("{ name: a, mode: relation_reverse, source_field: ref, relation_model: sale.order }", "relation rules require a relation search field"),
      ("{ name: a, source_field: ref, target_field: ref, match_type: regex }", "regex rules require a match pattern"),
      ("{ name: a, source_field: ref, target_field: ref, min_score: 120 }", "minimum score must be between 0 and 100"),
      ("{ name: '', source_field: ref, target_field: ref }", "rule name cannot be empty"),
    ];

    for (yaml, expected) in cases {
      assert_eq!(reason(rule(yaml).compile().unwrap_err()), expected, "{yaml}");
    }
  }

  #[test]
  fn invalid_patterns_and_filters() {
    let err = rule(r"{ name: a, source_field: ref, target_field: ref, extract_pattern: 'SO(\d+' }").compile().unwrap_err();

    assert!(reason(err).starts_with("invalid extraction pattern"));

    let err = rule("{ name: a, source_field: ref, target_field: ref, target_domain_filter: \"[('amount', '>')]\" }").compile().unwrap_err();

    assert!(reason(err).starts_with("invalid target filter"));

    let err = rule(r"{ name: a, source_field: ref, target_field: ref, match_type: regex, match_pattern: 'INV-(\d+' }").compile().unwrap_err();

    assert!(reason(err).starts_with("invalid match pattern"));

    let deep = format!("{}{}", "'!', ".repeat(10_000), "('a', '=', 1)");
    let err = rule(&format!("{{ name: a, source_field: ref, target_field: ref, source_domain_filter: \"[{deep}]\" }}")).compile().unwrap_err();

    assert_eq!(reason(err), "invalid source filter: filter is nested deeper than 64 levels");
  }

  #[test]
  fn ordering_and_rejections() {
    let configs = vec![
      rule("{ name: low, sequence: 10, priority: low, source_field: ref, target_field: ref }"),
      rule("{ name: broken, source_field: ref }"),
      rule("{ name: high, sequence: 10, priority: high, source_field: ref, target_field: ref }"),
      rule("{ name: first, sequence: 1, priority: low, source_field: ref, target_field: ref }"),
      rule("{ name: inactive, active: false, sequence: 0, source_field: ref }"),
      rule("{ name: medium, sequence: 10, source_field: ref, target_field: ref }"),
    ];

    let (rules, rejections) = compile_rules(&configs);

    assert_eq!(rules.iter().map(|rule| rule.name()).collect::<Vec<_>>(), vec!["first", "high", "medium", "low"]);
    assert_eq!(rules.iter().map(|rule| rule.rank()).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].rule, "broken");
  }

  #[test]
  fn search_operator_filters() {
    assert_eq!(SearchOperator::In.filter("name", "so1"), Filter::condition("name", Operator::In, Literal::List(vec![Literal::Text("so1".into())])));
    assert!(matches!(SearchOperator::EqualsOrILike.filter("name", "so1"), Filter::Or(filters) if filters.len() == 2));
  }

  #[test]
  fn load_rule_set() {
    let set = RuleSet::from_yaml(
      r#"
        rules:
          - name: Invoice number
            source_field: payment_ref
            target_field: name
            match_type: equals
          - name: Order
            mode: relation_reverse
            source_field: payment_ref
            relation_model: sale.order
            relation_search_field: name
      "#,
    )
    .unwrap();

    assert_eq!(set.rules.len(), 2);
    assert_eq!(set.rules[1].mode, RuleMode::RelationReverse);
    assert!(RuleSet::from_yaml("rules: [{ name: 1 }]").is_err());
  }
}
