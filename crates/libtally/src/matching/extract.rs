use regex::{Regex, RegexBuilder};

/// Pulls a sub-token (an order code, a folio) out of a raw value before it is
/// normalized.
#[derive(Clone, Debug, Default)]
pub struct Extractor {
  pattern: Option<Regex>,
}

impl Extractor {
  pub fn compile(pattern: Option<&str>, case_sensitive: bool) -> Result<Extractor, regex::Error> {
    let pattern = match pattern {
      Some(pattern) if !pattern.trim().is_empty() => Some(RegexBuilder::new(pattern).case_insensitive(!case_sensitive).build()?),
      _ => None,
    };

    Ok(Extractor { pattern })
  }

  pub fn is_configured(&self) -> bool {
    self.pattern.is_some()
  }

  /// Returns the first capture group when the pattern has one, the whole first
  /// match otherwise. `None` means the pattern did not match and the record
  /// should be skipped.
  pub fn extract<'s>(&self, value: &'s str) -> Option<&'s str> {
    let Some(ref pattern) = self.pattern else {
      return Some(value);
    };

    let captures = pattern.captures(value)?;

    match pattern.captures_len() {
      1 => captures.get(0).map(|m| m.as_str()),
      _ => captures.get(1).map(|m| m.as_str()),
    }
  }
}
