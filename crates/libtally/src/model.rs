use std::{collections::HashMap, fmt};

use ahash::RandomState;
use bon::bon;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

pub type RecordId = String;

/// Read access to the named fields of a record.
///
/// Sources (payments, statement lines), targets (invoices) and intermediate
/// documents (orders) all go through this accessor, so the matching code
/// never reaches into a concrete record layout.
pub trait HasFields {
  fn id(&self) -> &str;
  fn display_name(&self) -> &str;
  fn field(&self, name: &str) -> Option<&Value>;
}

/// A reference to another record, as carried by relational fields.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Reference {
  pub id: RecordId,
  #[serde(default)]
  pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Number(f64),
  Date(Date),
  Text(String),
  Reference(Reference),
  References(Vec<Reference>),
}

impl Value {
  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  /// Textual rendering of a scalar value, `None` when the value carries no content.
  pub(crate) fn scalar_text(&self) -> Option<String> {
    match self {
      Value::Null | Value::Bool(false) => None,
      Value::Bool(true) => Some("true".to_string()),
      Value::Number(number) => Some(number.to_string()),
      Value::Date(date) => Some(date.to_string()),
      Value::Text(text) if text.is_empty() => None,
      Value::Text(text) => Some(text.clone()),
      Value::Reference(_) | Value::References(_) => None,
    }
  }

  /// All references held by a relational value.
  pub(crate) fn references(&self) -> Option<Vec<&Reference>> {
    match self {
      Value::Null => Some(vec![]),
      Value::Reference(reference) => Some(vec![reference]),
      Value::References(references) => Some(references.iter().collect()),
      _ => None,
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Null => Ok(()),
      Value::Bool(value) => write!(f, "{value}"),
      Value::Number(value) => write!(f, "{value}"),
      Value::Date(value) => write!(f, "{value}"),
      Value::Text(value) => f.write_str(value),
      Value::Reference(reference) => f.write_str(&reference.name),
      Value::References(references) => {
        for (index, reference) in references.iter().enumerate() {
          if index > 0 {
            f.write_str(", ")?;
          }

          f.write_str(&reference.name)?;
        }

        Ok(())
      }
    }
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::Text(value.to_string())
  }
}

impl From<String> for Value {
  fn from(value: String) -> Self {
    Value::Text(value)
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Value::Number(value)
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Value::Bool(value)
  }
}

impl From<Date> for Value {
  fn from(value: Date) -> Self {
    Value::Date(value)
  }
}

impl From<Reference> for Value {
  fn from(value: Reference) -> Self {
    Value::Reference(value)
  }
}

/// An opaque business record: a payment, a statement line, an invoice or an
/// intermediate document.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Record {
  pub id: RecordId,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub fields: HashMap<String, Value, RandomState>,
}

#[bon]
impl Record {
  #[builder(finish_fn = build)]
  pub fn builder(#[builder(start_fn)] id: &str, name: Option<&str>, #[builder(default)] fields: &[(&str, Value)]) -> Record {
    let mut values: HashMap<_, _, RandomState> = HashMap::default();

    for (field, value) in fields {
      values.insert(field.to_string(), value.clone());
    }

    Record {
      id: id.to_string(),
      name: name.map(ToOwned::to_owned).unwrap_or_else(|| id.to_string()),
      fields: values,
    }
  }

  pub fn reference(&self) -> Reference {
    Reference {
      id: self.id.clone(),
      name: self.name.clone(),
    }
  }
}

impl HasFields for Record {
  fn id(&self) -> &str {
    &self.id
  }

  fn display_name(&self) -> &str {
    &self.name
  }

  fn field(&self, name: &str) -> Option<&Value> {
    self.fields.get(name)
  }
}
