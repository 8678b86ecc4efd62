//! Typed predicates restricting candidate pools.
//!
//! Filters are written in the legacy domain notation (see [`parser`]) and
//! compiled once, when a rule is loaded, into a [`Filter`] tree.

use std::{cmp::Ordering, fmt};

use jiff::civil::Date;

use crate::{
  field::lookup,
  model::{HasFields, Value},
};

pub(crate) mod parser;

pub use self::parser::{FilterError, parse};

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
  Condition(Condition),
  And(Vec<Filter>),
  Or(Vec<Filter>),
  Not(Box<Filter>),
}

impl Default for Filter {
  fn default() -> Self {
    Filter::And(vec![])
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
  pub field: String,
  pub operator: Operator,
  pub value: Literal,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operator {
  Eq,
  Ne,
  In,
  NotIn,
  Gt,
  Ge,
  Lt,
  Le,
  /// Case-insensitive substring.
  ILike,
  /// Case-sensitive substring.
  Like,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
  Null,
  Bool(bool),
  Number(f64),
  Text(String),
  List(Vec<Literal>),
}

impl Operator {
  pub(crate) fn from_token(token: &str) -> Option<Operator> {
    match token {
      "=" | "==" => Some(Operator::Eq),
      "!=" | "<>" => Some(Operator::Ne),
      "in" => Some(Operator::In),
      "not in" => Some(Operator::NotIn),
      ">" => Some(Operator::Gt),
      ">=" => Some(Operator::Ge),
      "<" => Some(Operator::Lt),
      "<=" => Some(Operator::Le),
      "ilike" => Some(Operator::ILike),
      "like" => Some(Operator::Like),
      _ => None,
    }
  }
}

impl fmt::Display for Literal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Literal::Null => Ok(()),
      Literal::Bool(value) => write!(f, "{value}"),
      Literal::Number(value) => write!(f, "{value}"),
      Literal::Text(value) => f.write_str(value),
      Literal::List(values) => write!(f, "{values:?}"),
    }
  }
}

impl Filter {
  pub fn condition(field: &str, operator: Operator, value: Literal) -> Filter {
    Filter::Condition(Condition {
      field: field.to_string(),
      operator,
      value,
    })
  }

  pub fn is_empty(&self) -> bool {
    matches!(self, Filter::And(filters) if filters.is_empty())
  }

  /// Conjunction of two filters, flattening nested conjunctions.
  pub fn and(self, other: Filter) -> Filter {
    match (self, other) {
      (lhs, rhs) if rhs.is_empty() => lhs,
      (lhs, rhs) if lhs.is_empty() => rhs,
      (Filter::And(mut lhs), Filter::And(rhs)) => {
        lhs.extend(rhs);
        Filter::And(lhs)
      }
      (Filter::And(mut lhs), rhs) => {
        lhs.push(rhs);
        Filter::And(lhs)
      }
      (lhs, rhs) => Filter::And(vec![lhs, rhs]),
    }
  }

  /// Evaluate the filter against a record.
  ///
  /// Conjunctions stop at the first failing condition.
  pub fn matches<R: HasFields + ?Sized>(&self, record: &R) -> bool {
    match self {
      Filter::Condition(condition) => condition.matches(record),
      Filter::And(filters) => filters.iter().all(|filter| filter.matches(record)),
      Filter::Or(filters) => filters.iter().any(|filter| filter.matches(record)),
      Filter::Not(filter) => !filter.matches(record),
    }
  }
}

impl Condition {
  fn matches<R: HasFields + ?Sized>(&self, record: &R) -> bool {
    let value = lookup(record, &self.field);

    let value = match value.as_deref() {
      None | Some(Value::Null) => return self.operator == Operator::Ne,
      Some(value) => value,
    };

    match self.operator {
      Operator::Eq => equals(value, &self.value),
      Operator::Ne => !equals(value, &self.value),
      Operator::In => contained(value, &self.value),
      Operator::NotIn => !contained(value, &self.value),
      Operator::Gt => compare(value, &self.value) == Some(Ordering::Greater),
      Operator::Ge => matches!(compare(value, &self.value), Some(Ordering::Greater | Ordering::Equal)),
      Operator::Lt => compare(value, &self.value) == Some(Ordering::Less),
      Operator::Le => matches!(compare(value, &self.value), Some(Ordering::Less | Ordering::Equal)),
      Operator::ILike => substring(value, &self.value, false),
      Operator::Like => substring(value, &self.value, true),
    }
  }
}

fn equals(value: &Value, literal: &Literal) -> bool {
  match (value, literal) {
    (Value::Text(lhs), Literal::Text(rhs)) => lhs == rhs,
    (Value::Number(lhs), Literal::Number(rhs)) => lhs == rhs,
    (Value::Bool(lhs), Literal::Bool(rhs)) => lhs == rhs,
    (Value::Date(lhs), Literal::Text(rhs)) => rhs.parse::<Date>().is_ok_and(|rhs| *lhs == rhs),
    (Value::Reference(reference), Literal::Text(rhs)) => &reference.id == rhs || &reference.name == rhs,
    (Value::Reference(reference), Literal::Number(rhs)) => reference.id == rhs.to_string(),
    (Value::References(references), literal) => references.iter().any(|reference| equals(&Value::Reference(reference.clone()), literal)),
    _ => false,
  }
}

fn contained(value: &Value, literal: &Literal) -> bool {
  match literal {
    Literal::List(items) => items.iter().any(|item| equals(value, item)),
    literal => equals(value, literal),
  }
}

fn compare(value: &Value, literal: &Literal) -> Option<Ordering> {
  match (value, literal) {
    (Value::Number(lhs), Literal::Number(rhs)) => lhs.partial_cmp(rhs),
    (Value::Text(lhs), Literal::Text(rhs)) => Some(lhs.as_str().cmp(rhs.as_str())),
    (Value::Date(lhs), Literal::Text(rhs)) => rhs.parse::<Date>().ok().map(|rhs| lhs.cmp(&rhs)),
    (Value::Bool(lhs), Literal::Bool(rhs)) => Some(lhs.cmp(rhs)),
    _ => None,
  }
}

fn substring(value: &Value, literal: &Literal, case_sensitive: bool) -> bool {
  let needle = literal.to_string();

  let haystacks = match value {
    Value::References(references) => references.iter().map(|reference| reference.name.clone()).collect(),
    value => vec![value.to_string()],
  };

  match case_sensitive {
    true => haystacks.iter().any(|haystack| haystack.contains(&needle)),
    false => {
      let needle = needle.to_lowercase();

      haystacks.iter().any(|haystack| haystack.to_lowercase().contains(&needle))
    }
  }
}
