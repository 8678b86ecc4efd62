use ahash::HashSet;
use libtally_macros::comparison;
use regex::Regex;

use crate::matching::{Comparison, sequence};

#[comparison(Equals, name = "equals")]
fn compare(&self, lhs: &str, rhs: &str, _: Option<&Regex>) -> f64 {
  if lhs == rhs { 100.0 } else { 0.0 }
}

#[comparison(Contains, name = "contains")]
fn compare(&self, lhs: &str, rhs: &str, _: Option<&Regex>) -> f64 {
  containment(lhs, rhs).unwrap_or(0.0)
}

#[comparison(FuzzyRatio, name = "fuzzy_ratio")]
fn compare(&self, lhs: &str, rhs: &str, _: Option<&Regex>) -> f64 {
  sequence::ratio(lhs, rhs) * 100.0
}

#[comparison(WordOverlap, name = "word_overlap")]
fn compare(&self, lhs: &str, rhs: &str, _: Option<&Regex>) -> f64 {
  let lhs = lhs.split_whitespace().collect::<HashSet<_>>();
  let rhs = rhs.split_whitespace().collect::<HashSet<_>>();
  let common = lhs.intersection(&rhs).count();

  if common == 0 {
    return 0.0;
  }

  100.0 * common as f64 / lhs.union(&rhs).count() as f64
}

// Checks that the pattern is present on both sides, not that both sides
// carry the same matched text.
#[comparison(PatternPresence, name = "regex")]
fn compare(&self, lhs: &str, rhs: &str, pattern: Option<&Regex>) -> f64 {
  match pattern {
    Some(pattern) if pattern.is_match(lhs) && pattern.is_match(rhs) => 100.0,
    _ => 0.0,
  }
}

#[comparison(Cascade, name = "auto")]
fn compare(&self, lhs: &str, rhs: &str, _: Option<&Regex>) -> f64 {
  if lhs == rhs {
    return 100.0;
  }

  match containment(lhs, rhs) {
    Some(score) => score,
    None => sequence::ratio(lhs, rhs) * 100.0,
  }
}

fn containment(lhs: &str, rhs: &str) -> Option<f64> {
  if !lhs.contains(rhs) && !rhs.contains(lhs) {
    return None;
  }

  let (lhs_len, rhs_len) = (lhs.chars().count(), rhs.chars().count());

  Some(100.0 * lhs_len.min(rhs_len) as f64 / lhs_len.max(rhs_len) as f64)
}

#[cfg(test)]
mod tests {
  use float_cmp::assert_approx_eq;
  use regex::Regex;

  use crate::matching::Comparison;

  use super::{Cascade, Contains, Equals, FuzzyRatio, PatternPresence, WordOverlap};

  #[test]
  fn equals() {
    assert_eq!(Equals.compare("inv-1001", "inv-1001", None), 100.0);
    assert_eq!(Equals.compare("inv-1001", "inv-1002", None), 0.0);
    assert_eq!(Equals.name(), "equals");
  }

  #[test]
  fn contains() {
    assert_approx_eq!(f64, Contains.compare("pago ref 555", "555", None), 25.0);
    assert_approx_eq!(f64, Contains.compare("555", "pago ref 555", None), 25.0);
    assert_approx_eq!(f64, Contains.compare("abc", "abc", None), 100.0);
    assert_eq!(Contains.compare("abc", "xyz", None), 0.0);
  }

  #[test]
  fn fuzzy_ratio() {
    assert_approx_eq!(f64, FuzzyRatio.compare("hello", "hallo", None), 80.0);
    assert_approx_eq!(f64, FuzzyRatio.compare("so0042", "so0042", None), 100.0);
  }

  #[test]
  fn word_overlap() {
    assert_approx_eq!(f64, WordOverlap.compare("foo bar", "bar baz", None), 100.0 / 3.0);
    assert_approx_eq!(f64, WordOverlap.compare("foo foo bar", "bar foo", None), 100.0);
    assert_eq!(WordOverlap.compare("foo", "bar", None), 0.0);
  }

  #[test]
  fn pattern_presence() {
    let pattern = Regex::new(r"\d{4}").unwrap();

    assert_eq!(PatternPresence.compare("ref 1234", "inv 9876", Some(&pattern)), 100.0);
    assert_eq!(PatternPresence.compare("ref 1234", "inv", Some(&pattern)), 0.0);
    assert_eq!(PatternPresence.compare("ref 1234", "inv 9876", None), 0.0);
  }

  #[test]
  fn cascade() {
    assert_eq!(Cascade.compare("so0099", "so0099", None), 100.0);
    assert_approx_eq!(f64, Cascade.compare("pagoso0099", "so0099", None), 60.0);
    assert_approx_eq!(f64, Cascade.compare("hello", "hallo", None), 80.0);
  }
}
