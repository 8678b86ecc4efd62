use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};

use crate::{
  error::TallyError,
  model::{HasFields, Value},
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
  #[default]
  Scalar,
  /// Single-valued relation; the comparable value is the referenced record's name.
  Reference,
}

/// Names a field on a record and how its value should be read.
///
/// Deserializes either from a bare field name (a scalar field) or from a
/// `{ name, kind }` map.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(from = "FieldDescriptorRepr")]
pub struct FieldDescriptor {
  pub name: String,
  pub kind: FieldKind,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldDescriptorRepr {
  Name(String),
  Full {
    name: String,
    #[serde(default)]
    kind: FieldKind,
  },
}

impl From<FieldDescriptorRepr> for FieldDescriptor {
  fn from(value: FieldDescriptorRepr) -> Self {
    match value {
      FieldDescriptorRepr::Name(name) => FieldDescriptor { name, kind: FieldKind::Scalar },
      FieldDescriptorRepr::Full { name, kind } => FieldDescriptor { name, kind },
    }
  }
}

impl FieldDescriptor {
  pub fn scalar(name: &str) -> FieldDescriptor {
    FieldDescriptor {
      name: name.to_string(),
      kind: FieldKind::Scalar,
    }
  }

  pub fn reference(name: &str) -> FieldDescriptor {
    FieldDescriptor {
      name: name.to_string(),
      kind: FieldKind::Reference,
    }
  }
}

impl fmt::Display for FieldDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}

/// Look up a field by name.
///
/// `id` and `name` fall back to the record identity when the record does not
/// carry them as regular fields, and `field.name` / `field.id` reach into a
/// single reference.
pub(crate) fn lookup<'r, R: HasFields + ?Sized>(record: &'r R, path: &str) -> Option<Cow<'r, Value>> {
  if let Some(value) = record.field(path) {
    return Some(Cow::Borrowed(value));
  }

  match path.split_once('.') {
    Some((field, attribute)) => match (record.field(field)?, attribute) {
      (Value::Reference(reference), "name") => Some(Cow::Owned(Value::Text(reference.name.clone()))),
      (Value::Reference(reference), "id") => Some(Cow::Owned(Value::Text(reference.id.clone()))),
      (Value::Null, _) => Some(Cow::Owned(Value::Null)),
      _ => None,
    },

    None => match path {
      "id" => Some(Cow::Owned(Value::Text(record.id().to_string()))),
      "name" | "display_name" if !record.display_name().is_empty() => Some(Cow::Owned(Value::Text(record.display_name().to_string()))),
      _ => None,
    },
  }
}

/// Read the comparable value of a field.
///
/// Returns `Ok(None)` when the field is absent or holds no content, so callers
/// can skip the record. A value whose shape does not match the descriptor (a
/// reference read as a scalar, or the other way around) is an evaluation
/// error for that record.
pub fn resolve<R: HasFields + ?Sized>(record: &R, descriptor: &FieldDescriptor) -> Result<Option<String>, TallyError> {
  let Some(value) = lookup(record, &descriptor.name) else {
    return Ok(None);
  };

  match (descriptor.kind, value.as_ref()) {
    (_, Value::Null) => Ok(None),

    (FieldKind::Reference, Value::Reference(reference)) if reference.name.is_empty() => Ok(None),
    (FieldKind::Reference, Value::Reference(reference)) => Ok(Some(reference.name.clone())),
    (FieldKind::Reference, other) => Err(TallyError::evaluation(record.id(), format!("field '{}' is not a single reference (got {other:?})", descriptor.name))),

    (FieldKind::Scalar, Value::Reference(_) | Value::References(_)) => {
      Err(TallyError::evaluation(record.id(), format!("field '{}' is relational and cannot be read as a scalar", descriptor.name)))
    }
    (FieldKind::Scalar, value) => Ok(value.scalar_text()),
  }
}
