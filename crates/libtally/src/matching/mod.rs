use regex::Regex;
use serde::{Deserialize, Serialize};

pub(crate) mod comparisons;
pub(crate) mod extract;
pub(crate) mod normalize;
pub(crate) mod sequence;

use self::comparisons::{Cascade, Contains, Equals, FuzzyRatio, PatternPresence, WordOverlap};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
  Equals,
  Contains,
  FuzzyRatio,
  WordOverlap,
  Regex,
  /// Exact equality, then containment ratio, then fuzzy ratio.
  #[default]
  Auto,
}

pub trait Comparison: Send + Sync {
  fn name(&self) -> &'static str;
  fn compare(&self, lhs: &str, rhs: &str, pattern: Option<&Regex>) -> f64;
}

impl MatchType {
  pub(crate) fn comparison(&self) -> &'static dyn Comparison {
    match self {
      MatchType::Equals => &Equals,
      MatchType::Contains => &Contains,
      MatchType::FuzzyRatio => &FuzzyRatio,
      MatchType::WordOverlap => &WordOverlap,
      MatchType::Regex => &PatternPresence,
      MatchType::Auto => &Cascade,
    }
  }
}

/// Similarity between two normalized values, in `[0, 100]`.
///
/// An empty value on either side never matches.
pub fn score(match_type: MatchType, lhs: &str, rhs: &str, pattern: Option<&Regex>) -> f64 {
  if lhs.trim().is_empty() || rhs.trim().is_empty() {
    return 0.0;
  }

  let score = match_type.comparison().compare(lhs, rhs, pattern);

  tracing::trace!(comparison = match_type.comparison().name(), score, "compared values");

  score.clamp(0.0, 100.0)
}
