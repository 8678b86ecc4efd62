use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;

#[serde_inline_default]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct NormalizationOptions {
  #[serde_inline_default(false)]
  pub case_sensitive: bool,
  #[serde_inline_default(true)]
  pub strip_spaces: bool,
  #[serde_inline_default(false)]
  pub strip_special_chars: bool,
}

impl Default for NormalizationOptions {
  fn default() -> Self {
    NormalizationOptions {
      case_sensitive: false,
      strip_spaces: true,
      strip_special_chars: false,
    }
  }
}

/// Canonicalize a raw value before comparison.
///
/// Steps always run in the same order: case folding, whitespace removal,
/// then removal of everything outside `[A-Za-z0-9]`.
pub fn normalize(value: &str, options: &NormalizationOptions) -> String {
  let mut value = match options.case_sensitive {
    true => value.to_string(),
    false => value.to_lowercase(),
  };

  if options.strip_spaces {
    value.retain(|c| !c.is_whitespace());
  }

  if options.strip_special_chars {
    value.retain(|c| c.is_ascii_alphanumeric());
  }

  value.trim().to_string()
}
