//! Parser for the legacy domain notation.
//!
//! A domain is a bracketed list of `(field, operator, value)` triples,
//! implicitly AND-ed, with optional prefix operators `'|'`, `'&'` (each taking
//! the next two terms) and `'!'` (taking the next term):
//!
//! ```text
//! [('amount', '>', 1000), '|', ('state', '=', 'posted'), ('state', '=', 'paid')]
//! ```
//!
//! Values may be quoted strings, numbers, `True`, `False`, `None`, or lists
//! and tuples of those.

use std::{iter::Peekable, str::CharIndices};

use crate::filter::{Condition, Filter, Literal, Operator};

/// Deepest nesting of lists, tuples and prefix operators a domain may use.
const MAX_DEPTH: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FilterError {
  #[error("unexpected end of filter")]
  UnexpectedEnd,
  #[error("unexpected '{0}' at position {1}")]
  UnexpectedToken(String, usize),
  #[error("unterminated string starting at position {0}")]
  UnterminatedString(usize),
  #[error("unsupported operator '{0}'")]
  UnsupportedOperator(String),
  #[error("'{0}' is missing an operand")]
  MissingOperand(String),
  #[error("conditions must be (field, operator, value) triples")]
  InvalidCondition,
  #[error("filter is nested deeper than {0} levels")]
  TooDeep(usize),
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
  Open(char),
  Close(char),
  Comma,
  Text(String),
  Number(f64),
  Ident(String),
}

/// A flat domain element, before prefix operators are resolved.
enum Term {
  Or,
  And,
  Not,
  Condition(Condition),
}

/// Parse a domain string into a filter. Blank input and `[]` yield the empty
/// filter, which matches every record.
pub fn parse(domain: &str) -> Result<Filter, FilterError> {
  if domain.trim().is_empty() {
    return Ok(Filter::default());
  }

  let tokens = tokenize(domain)?;
  let mut position = 0;

  if !matches!(tokens.first(), Some((Token::Open('['), _))) {
    return Err(FilterError::InvalidCondition);
  }

  let Literal::List(items) = parse_literal(&tokens, &mut position, 0)? else {
    return Err(FilterError::InvalidCondition);
  };

  if let Some((token, offset)) = tokens.get(position) {
    return Err(FilterError::UnexpectedToken(format!("{token:?}"), *offset));
  }

  let terms = items.into_iter().map(into_term).collect::<Result<Vec<_>, _>>()?;
  let mut terms = terms.into_iter().peekable();
  let mut filters = Vec::new();

  while terms.peek().is_some() {
    filters.push(parse_prefix(&mut terms, 0)?);
  }

  Ok(match filters.len() {
    1 => filters.remove(0),
    _ => Filter::And(filters),
  })
}

fn parse_prefix<I: Iterator<Item = Term>>(terms: &mut Peekable<I>, depth: usize) -> Result<Filter, FilterError> {
  if depth > MAX_DEPTH {
    return Err(FilterError::TooDeep(MAX_DEPTH));
  }

  let operand = |terms: &mut Peekable<I>, operator: &str| match parse_prefix(terms, depth + 1) {
    Err(FilterError::TooDeep(limit)) => Err(FilterError::TooDeep(limit)),
    Err(_) => Err(FilterError::MissingOperand(operator.into())),
    Ok(filter) => Ok(filter),
  };

  match terms.next() {
    None => Err(FilterError::UnexpectedEnd),
    Some(Term::Condition(condition)) => Ok(Filter::Condition(condition)),
    Some(Term::Not) => Ok(Filter::Not(Box::new(operand(terms, "!")?))),
    Some(Term::Or) => {
      let lhs = operand(terms, "|")?;
      let rhs = operand(terms, "|")?;

      Ok(Filter::Or(vec![lhs, rhs]))
    }
    Some(Term::And) => {
      let lhs = operand(terms, "&")?;
      let rhs = operand(terms, "&")?;

      Ok(Filter::And(vec![lhs, rhs]))
    }
  }
}

fn into_term(item: Literal) -> Result<Term, FilterError> {
  match item {
    Literal::Text(token) => match token.as_str() {
      "|" => Ok(Term::Or),
      "&" => Ok(Term::And),
      "!" => Ok(Term::Not),
      other => Err(FilterError::UnsupportedOperator(other.to_string())),
    },

    Literal::List(mut parts) if parts.len() == 3 => {
      let value = parts.pop().ok_or(FilterError::InvalidCondition)?;

      let (Some(Literal::Text(operator)), Some(Literal::Text(field))) = (parts.pop(), parts.pop()) else {
        return Err(FilterError::InvalidCondition);
      };

      if field.trim().is_empty() {
        return Err(FilterError::InvalidCondition);
      }

      let operator = Operator::from_token(&operator.to_lowercase()).ok_or(FilterError::UnsupportedOperator(operator))?;

      Ok(Term::Condition(Condition { field, operator, value }))
    }

    _ => Err(FilterError::InvalidCondition),
  }
}

fn parse_literal(tokens: &[(Token, usize)], position: &mut usize, depth: usize) -> Result<Literal, FilterError> {
  if depth > MAX_DEPTH {
    return Err(FilterError::TooDeep(MAX_DEPTH));
  }

  let Some((token, offset)) = tokens.get(*position) else {
    return Err(FilterError::UnexpectedEnd);
  };

  *position += 1;

  match token {
    Token::Text(value) => Ok(Literal::Text(value.clone())),
    Token::Number(value) => Ok(Literal::Number(*value)),
    Token::Ident(ident) => match ident.as_str() {
      "True" | "true" => Ok(Literal::Bool(true)),
      "False" | "false" => Ok(Literal::Bool(false)),
      "None" | "null" => Ok(Literal::Null),
      other => Err(FilterError::UnexpectedToken(other.to_string(), *offset)),
    },
    Token::Open(open) => {
      let close = if *open == '[' { ']' } else { ')' };
      let mut items = Vec::new();

      loop {
        match tokens.get(*position) {
          None => return Err(FilterError::UnexpectedEnd),
          Some((Token::Close(c), _)) if *c == close => {
            *position += 1;
            break;
          }
          Some(_) => items.push(parse_literal(tokens, position, depth + 1)?),
        }

        match tokens.get(*position) {
          None => return Err(FilterError::UnexpectedEnd),
          Some((Token::Comma, _)) => *position += 1,
          Some((Token::Close(c), _)) if *c == close => {}
          Some((token, offset)) => return Err(FilterError::UnexpectedToken(format!("{token:?}"), *offset)),
        }
      }

      Ok(Literal::List(items))
    }
    token => Err(FilterError::UnexpectedToken(format!("{token:?}"), *offset)),
  }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, FilterError> {
  let mut tokens = Vec::new();
  let mut chars = input.char_indices().peekable();

  while let Some((offset, c)) = chars.next() {
    match c {
      c if c.is_whitespace() => continue,
      '[' | '(' => tokens.push((Token::Open(c), offset)),
      ']' | ')' => tokens.push((Token::Close(c), offset)),
      ',' => tokens.push((Token::Comma, offset)),
      '\'' | '"' => tokens.push((Token::Text(read_string(&mut chars, c, offset)?), offset)),
      c if c.is_ascii_digit() || c == '-' || c == '.' => {
        let mut number = String::from(c);

        while let Some((_, next)) = chars.peek() {
          if next.is_ascii_digit() || *next == '.' || *next == 'e' || *next == 'E' {
            number.push(*next);
            chars.next();
          } else {
            break;
          }
        }

        let value = number.parse::<f64>().map_err(|_| FilterError::UnexpectedToken(number.clone(), offset))?;

        tokens.push((Token::Number(value), offset));
      }
      c if c.is_alphabetic() || c == '_' => {
        let mut ident = String::from(c);

        while let Some((_, next)) = chars.peek() {
          if next.is_alphanumeric() || *next == '_' {
            ident.push(*next);
            chars.next();
          } else {
            break;
          }
        }

        tokens.push((Token::Ident(ident), offset));
      }
      other => return Err(FilterError::UnexpectedToken(other.to_string(), offset)),
    }
  }

  Ok(tokens)
}

fn read_string(chars: &mut Peekable<CharIndices<'_>>, quote: char, start: usize) -> Result<String, FilterError> {
  let mut value = String::new();

  while let Some((_, c)) = chars.next() {
    match c {
      '\\' => match chars.next() {
        Some((_, escaped)) => value.push(escaped),
        None => return Err(FilterError::UnterminatedString(start)),
      },
      c if c == quote => return Ok(value),
      c => value.push(c),
    }
  }

  Err(FilterError::UnterminatedString(start))
}
