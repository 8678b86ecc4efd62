use std::time::Instant;

use metrics::histogram;
use rayon::prelude::*;
use serde::Serialize;
use tracing::instrument;

use crate::{
  error::TallyError,
  field::{self, FieldDescriptor},
  matching::{self, normalize::normalize},
  model::{Record, RecordId},
  relation::InvoicePool,
  rules::{CompiledRule, RuleMode},
  store::Documents,
};

/// Score given to every pair linked through an intermediate document.
///
/// Relational matches are verified structurally rather than textually, so
/// they carry a fixed confidence instead of a similarity.
pub const RELATION_SCORE: f64 = 85.0;

/// A scored pair produced by a single rule.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchCandidate {
  pub source_id: RecordId,
  pub target_id: RecordId,
  pub score: f64,
  pub rule: String,
  pub mode: RuleMode,
  pub evidence: String,
  /// Normalized source value the match was made on.
  pub matched_value: String,
  #[serde(skip)]
  pub(crate) rank: usize,
}

/// A record a rule could not evaluate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkippedRecord {
  pub record: RecordId,
  pub reason: String,
}

impl From<TallyError> for SkippedRecord {
  fn from(value: TallyError) -> Self {
    match value {
      TallyError::EvaluationError { record, reason } => SkippedRecord { record, reason },
      err => SkippedRecord {
        record: String::new(),
        reason: err.to_string(),
      },
    }
  }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RuleReport {
  pub rule: String,
  pub mode: RuleMode,
  pub sources_in: usize,
  pub targets_in: usize,
  pub documents_in: usize,
  pub matches_out: usize,
  pub skipped: Vec<SkippedRecord>,
}

#[derive(Clone, Debug)]
pub struct RuleOutcome {
  pub candidates: Vec<MatchCandidate>,
  pub report: RuleReport,
}

#[derive(Default)]
struct Partial {
  candidates: Vec<MatchCandidate>,
  skipped: Vec<SkippedRecord>,
}

impl Partial {
  fn skipped(err: TallyError) -> Partial {
    Partial {
      candidates: vec![],
      skipped: vec![err.into()],
    }
  }
}

impl RuleMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      RuleMode::Direct => "direct",
      RuleMode::Relation => "relation",
      RuleMode::RelationReverse => "relation_reverse",
    }
  }
}

impl CompiledRule {
  pub(crate) fn relation_model(&self) -> Option<&str> {
    self.config.relation_model.as_deref()
  }

  /// Comparable value of a source record, after extraction and normalization.
  ///
  /// `None` when the record has nothing to compare: empty field, or an
  /// extraction pattern that did not match.
  fn source_value(&self, record: &Record) -> Result<Option<String>, TallyError> {
    let Some(raw) = field::resolve(record, &self.config.source_field)? else {
      return Ok(None);
    };

    let Some(token) = self.extractor.extract(&raw) else {
      tracing::trace!(record = record.id, "extraction pattern did not match");

      return Ok(None);
    };

    Ok(self.normalized(token))
  }

  fn normalized(&self, value: &str) -> Option<String> {
    let value = normalize(value, &self.config.normalization);

    (!value.is_empty()).then_some(value)
  }

  fn score(&self, lhs: &str, rhs: &str) -> Option<f64> {
    let score = matching::score(self.config.match_type, lhs, rhs, self.pattern.as_ref());

    (score > 0.0 && score >= self.config.min_score).then_some(score)
  }

  fn candidate(&self, source: &Record, target: &Record, score: f64, evidence: String, matched_value: &str) -> MatchCandidate {
    tracing::debug!(source = source.id, target = target.id, score, evidence, "found match");

    MatchCandidate {
      source_id: source.id.clone(),
      target_id: target.id.clone(),
      score,
      rule: self.config.name.clone(),
      mode: self.config.mode,
      evidence,
      matched_value: matched_value.to_string(),
      rank: self.rank,
    }
  }
}

/// Run one rule over the candidate pools.
///
/// Emits every qualifying pair; a source may match several targets. Records
/// the rule cannot evaluate are reported and skipped.
#[instrument(name = "evaluate_rule", skip_all, fields(rule = rule.name(), mode = rule.mode().as_str()))]
pub fn evaluate(rule: &CompiledRule, sources: &[Record], targets: &[Record], documents: &Documents) -> Result<RuleOutcome, TallyError> {
  let then = Instant::now();

  let sources = sources.iter().filter(|source| rule.source_filter.matches(*source)).collect::<Vec<_>>();
  let targets = targets.iter().filter(|target| rule.target_filter.matches(*target)).collect::<Vec<_>>();

  let mut report = RuleReport {
    rule: rule.name().to_string(),
    mode: rule.mode(),
    sources_in: sources.len(),
    targets_in: targets.len(),
    ..Default::default()
  };

  let partials = match rule.mode() {
    RuleMode::Direct => direct(rule, &sources, &targets),

    RuleMode::Relation | RuleMode::RelationReverse => {
      let model = rule.relation_model().unwrap_or_default();
      let documents = documents
        .get(model)
        .ok_or_else(|| TallyError::LookupError(format!("documents of model '{model}' were not fetched")))?
        .iter()
        .filter(|document| rule.relation_filter.matches(*document))
        .collect::<Vec<_>>();

      report.documents_in = documents.len();

      match rule.mode() {
        RuleMode::Relation => relation(rule, &sources, &targets, &documents),
        _ => relation_reverse(rule, &sources, &targets, &documents),
      }
    }
  };

  let mut candidates = Vec::new();

  for partial in partials {
    candidates.extend(partial.candidates);
    report.skipped.extend(partial.skipped);
  }

  for skipped in &report.skipped {
    tracing::warn!(record = skipped.record, reason = skipped.reason, "skipped record");
  }

  for candidate in &candidates {
    histogram!("tally_match_scores").record(candidate.score);
  }

  report.matches_out = candidates.len();

  histogram!("tally_rule_latency_seconds", "mode" => rule.mode().as_str()).record(then.elapsed().as_secs_f64());

  tracing::debug!(sources = report.sources_in, targets = report.targets_in, matches = report.matches_out, skipped = report.skipped.len(), "evaluated rule");

  Ok(RuleOutcome { candidates, report })
}

fn direct(rule: &CompiledRule, sources: &[&Record], targets: &[&Record]) -> Vec<Partial> {
  let Some(target_field) = rule.config.target_field.as_ref() else {
    return vec![];
  };

  let mut head = Partial::default();
  let mut values = Vec::with_capacity(targets.len());

  for target in targets {
    match field::resolve(*target, target_field) {
      Ok(Some(value)) => {
        if let Some(value) = rule.normalized(&value) {
          values.push((*target, value));
        }
      }

      Ok(None) => {}
      Err(err) => head.skipped.push(err.into()),
    }
  }

  let rest = sources.par_iter().map(|source| {
    let value = match rule.source_value(source) {
      Ok(Some(value)) => value,
      Ok(None) => return Partial::default(),
      Err(err) => return Partial::skipped(err),
    };

    let candidates = values
      .iter()
      .filter_map(|(target, target_value)| {
        let score = rule.score(&value, target_value)?;

        Some(rule.candidate(source, target, score, format!("direct: {value} = {target_value}"), &value))
      })
      .collect();

    Partial { candidates, skipped: vec![] }
  });

  let mut partials = vec![head];
  partials.par_extend(rest);
  partials
}

fn relation(rule: &CompiledRule, sources: &[&Record], targets: &[&Record], documents: &[&Record]) -> Vec<Partial> {
  let pool = InvoicePool::new(targets);
  let model = rule.relation_model().unwrap_or_default();
  let search_field = rule.config.relation_search_field.as_deref().unwrap_or("name");

  if RELATION_SCORE < rule.config.min_score {
    tracing::debug!(min_score = rule.config.min_score, "relation score is below the rule threshold");
  }

  sources
    .par_iter()
    .map(|source| {
      let value = match rule.source_value(source) {
        Ok(Some(value)) => value,
        Ok(None) => return Partial::default(),
        Err(err) => return Partial::skipped(err),
      };

      let search = rule.config.search_operator.filter(search_field, &value);
      let found = documents.iter().copied().filter(|document| search.matches(*document));
      let (reached, errors) = pool.reachable_from(found, &rule.config.invoice_relation_field);

      let candidates = match RELATION_SCORE >= rule.config.min_score {
        true => reached.into_iter().map(|(document, invoice)| rule.candidate(source, invoice, RELATION_SCORE, format!("{model}: {}", document.name), &value)).collect(),
        false => vec![],
      };

      Partial {
        candidates,
        skipped: errors.into_iter().map(Into::into).collect(),
      }
    })
    .collect()
}

fn relation_reverse(rule: &CompiledRule, sources: &[&Record], targets: &[&Record], documents: &[&Record]) -> Vec<Partial> {
  let pool = InvoicePool::new(targets);
  let search_field = FieldDescriptor::scalar(rule.config.relation_search_field.as_deref().unwrap_or("name"));

  let mut head = Partial::default();
  let mut values = Vec::with_capacity(sources.len());

  for source in sources {
    match rule.source_value(source) {
      Ok(Some(value)) => values.push((*source, value)),
      Ok(None) => {}
      Err(err) => head.skipped.push(err.into()),
    }
  }

  let rest = documents.par_iter().map(|document| {
    let document_value = match field::resolve(*document, &search_field) {
      Ok(Some(value)) => match rule.normalized(&value) {
        Some(value) => value,
        None => return Partial::default(),
      },
      Ok(None) => return Partial::default(),
      Err(err) => return Partial::skipped(err),
    };

    let matched = values.iter().filter_map(|(source, value)| Some((*source, value, rule.score(&document_value, value)?))).collect::<Vec<_>>();

    if matched.is_empty() {
      return Partial::default();
    }

    let invoices = match pool.reachable(document, &rule.config.invoice_relation_field) {
      Ok(invoices) => invoices,
      Err(err) => return Partial::skipped(err),
    };

    let candidates = matched
      .into_iter()
      .flat_map(|(source, value, score)| invoices.iter().map(move |invoice| rule.candidate(source, invoice, score, format!("{} → {}", document.name, invoice.name), value)))
      .collect();

    Partial { candidates, skipped: vec![] }
  });

  let mut partials = vec![head];
  partials.par_extend(rest);
  partials
}
