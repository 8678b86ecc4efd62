use std::collections::{HashMap, HashSet, hash_map::Entry};

use ahash::RandomState;
use jiff::Timestamp;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use validator::Validate;

use crate::{
  engine::{MatchCandidate, RuleReport},
  model::{Record, RecordId},
  rules::{RuleMode, RuleRejection},
};

/// Thresholds applied to a whole run.
#[serde_inline_default]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, Validate)]
pub struct RunParams {
  /// Candidates scoring below this value are dropped before aggregation,
  /// whatever the threshold of the rule that produced them.
  #[serde_inline_default(80.0)]
  #[validate(range(min = 0.0, max = 100.0))]
  pub min_match_score: f64,
  /// Suggestions scoring at least this value are logged as confirmed.
  #[serde_inline_default(95.0)]
  #[validate(range(min = 0.0, max = 100.0))]
  pub auto_confirm_score: f64,
}

impl Default for RunParams {
  fn default() -> Self {
    RunParams {
      min_match_score: 80.0,
      auto_confirm_score: 95.0,
    }
  }
}

/// The single best target proposed for a source record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Suggestion {
  pub source_id: RecordId,
  pub target_id: RecordId,
  pub score: f64,
  pub rule: String,
  pub mode: RuleMode,
  pub evidence: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogState {
  Pending,
  Confirmed,
  Rejected,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuditLogEntry {
  pub source_id: RecordId,
  pub target_id: RecordId,
  pub rule: String,
  pub mode: RuleMode,
  pub score: f64,
  pub state: LogState,
  pub evidence: String,
  pub matched_value: String,
  pub timestamp: Timestamp,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunSummary {
  pub processed: usize,
  pub suggested: usize,
  pub unmatched: usize,
  pub confirmed: usize,
  pub rules_evaluated: usize,
  pub rules_rejected: usize,
}

/// Outcome of a reconciliation run. Nothing in here has been applied to the
/// records; committing suggestions is up to the caller.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Reconciliation {
  pub suggestions: Vec<Suggestion>,
  pub unmatched: Vec<RecordId>,
  pub logs: Vec<AuditLogEntry>,
  pub summary: RunSummary,
  pub rules: Vec<RuleReport>,
  pub rejected: Vec<RuleRejection>,
}

/// Whether `candidate` should replace the current best match for its source.
///
/// Higher scores win; on equal scores the earlier rule wins, and within the
/// same rule the first candidate seen is kept.
fn supersedes(candidate: &MatchCandidate, best: &MatchCandidate) -> bool {
  candidate.score > best.score || (candidate.score == best.score && candidate.rank < best.rank)
}

/// Collapse every candidate into at most one suggestion per source record.
///
/// Candidates must be supplied in rule order then emission order for ties to
/// resolve deterministically. Suggestions and unmatched records follow the
/// order of `sources`.
pub fn aggregate(sources: &[Record], candidates: impl IntoIterator<Item = MatchCandidate>, params: &RunParams, timestamp: Timestamp) -> Reconciliation {
  let mut best: HashMap<RecordId, MatchCandidate, RandomState> = HashMap::default();

  for candidate in candidates.into_iter().filter(|candidate| candidate.score >= params.min_match_score) {
    match best.entry(candidate.source_id.clone()) {
      Entry::Vacant(entry) => {
        entry.insert(candidate);
      }

      Entry::Occupied(mut entry) => {
        if supersedes(&candidate, entry.get()) {
          entry.insert(candidate);
        }
      }
    }
  }

  let mut reconciliation = Reconciliation::default();
  let mut seen = HashSet::<&str, RandomState>::default();

  for source in sources {
    if !seen.insert(source.id.as_str()) {
      continue;
    }

    let Some(candidate) = best.remove(&source.id) else {
      reconciliation.unmatched.push(source.id.clone());

      continue;
    };

    let state = match candidate.score >= params.auto_confirm_score {
      true => LogState::Confirmed,
      false => LogState::Pending,
    };

    reconciliation.logs.push(AuditLogEntry {
      source_id: candidate.source_id.clone(),
      target_id: candidate.target_id.clone(),
      rule: candidate.rule.clone(),
      mode: candidate.mode,
      score: candidate.score,
      state,
      evidence: candidate.evidence.clone(),
      matched_value: candidate.matched_value,
      timestamp,
    });

    reconciliation.suggestions.push(Suggestion {
      source_id: candidate.source_id,
      target_id: candidate.target_id,
      score: candidate.score,
      rule: candidate.rule,
      mode: candidate.mode,
      evidence: candidate.evidence,
    });
  }

  reconciliation.summary = RunSummary {
    processed: seen.len(),
    suggested: reconciliation.suggestions.len(),
    unmatched: reconciliation.unmatched.len(),
    confirmed: reconciliation.logs.iter().filter(|log| log.state == LogState::Confirmed).count(),
    ..Default::default()
  };

  counter!("tally_suggestions_total").increment(reconciliation.summary.suggested as u64);
  counter!("tally_unmatched_total").increment(reconciliation.summary.unmatched as u64);

  reconciliation
}

#[cfg(test)]
mod tests {
  use jiff::Timestamp;

  use crate::{
    engine::MatchCandidate,
    rules::RuleMode,
    tests::payment,
  };

  use super::{LogState, RunParams, aggregate};

  fn candidate(source: &str, target: &str, score: f64, rank: usize) -> MatchCandidate {
    MatchCandidate {
      source_id: source.to_string(),
      target_id: target.to_string(),
      score,
      rule: format!("rule{rank}"),
      mode: RuleMode::Direct,
      evidence: String::new(),
      matched_value: String::new(),
      rank,
    }
  }

  #[test]
  fn keeps_highest_score() {
    let sources = [payment("p1", "x"), payment("p2", "y"), payment("p3", "z")];
    let candidates = vec![candidate("p1", "a", 85.0, 0), candidate("p1", "b", 99.0, 1), candidate("p2", "c", 90.0, 0), candidate("p3", "d", 40.0, 0)];

    let result = aggregate(&sources, candidates, &RunParams::default(), Timestamp::UNIX_EPOCH);

    assert_eq!(result.suggestions.len(), 2);
    assert_eq!(result.suggestions[0].target_id, "b");
    assert_eq!(result.suggestions[0].rule, "rule1");
    assert_eq!(result.suggestions[1].target_id, "c");
    assert_eq!(result.unmatched, vec!["p3".to_string()]);
  }

  #[test]
  fn ties_go_to_the_earliest_rule() {
    let sources = [payment("p1", "x")];

    let result = aggregate(&sources, vec![candidate("p1", "late", 90.0, 3), candidate("p1", "early", 90.0, 1), candidate("p1", "early-second", 90.0, 1)], &RunParams::default(), Timestamp::UNIX_EPOCH);

    assert_eq!(result.suggestions[0].target_id, "early");
  }

  #[test]
  fn audit_states() {
    let sources = [payment("p1", "x"), payment("p2", "y"), payment("p3", "z")];
    let candidates = vec![candidate("p1", "a", 95.0, 0), candidate("p2", "b", 94.9, 0), candidate("p3", "c", 100.0, 0)];

    let result = aggregate(&sources, candidates, &RunParams::default(), Timestamp::UNIX_EPOCH);

    assert_eq!(result.logs.iter().map(|log| log.state).collect::<Vec<_>>(), vec![LogState::Confirmed, LogState::Pending, LogState::Confirmed]);
    assert_eq!(result.summary.confirmed, 2);
    assert_eq!(result.summary.processed, 3);
    assert!(result.logs.iter().all(|log| log.timestamp == Timestamp::UNIX_EPOCH));
  }

  #[test]
  fn global_threshold() {
    let sources = [payment("p1", "x")];
    let params = RunParams {
      min_match_score: 90.0,
      ..Default::default()
    };

    let result = aggregate(&sources, vec![candidate("p1", "a", 85.0, 0)], &params, Timestamp::UNIX_EPOCH);

    assert!(result.suggestions.is_empty());
    assert_eq!(result.summary.unmatched, 1);
  }

  #[test]
  fn params_defaults() {
    let params: RunParams = serde_json::from_str("{}").unwrap();

    assert_eq!(params, RunParams::default());
  }
}
