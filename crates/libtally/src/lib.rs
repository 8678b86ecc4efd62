//! Rule-based matching of payments and bank statement lines to invoices.
//!
//! Rules compare a field of each source record with a field of each target
//! record, either directly or through intermediate documents such as sales
//! orders. Every rule produces scored candidates, and the best candidate per
//! source becomes a suggestion for a separate approval step to commit.

mod aggregate;
mod engine;
mod error;
mod field;
mod filter;
mod matching;
mod model;
mod relation;
mod rules;
mod store;
mod tally;

#[cfg(test)]
mod tests;

pub mod prelude {
  pub use crate::aggregate::{AuditLogEntry, LogState, Reconciliation, RunParams, RunSummary, Suggestion, aggregate};
  pub use crate::engine::{MatchCandidate, RELATION_SCORE, RuleOutcome, RuleReport, SkippedRecord, evaluate};
  pub use crate::error::TallyError;
  pub use crate::field::{FieldDescriptor, FieldKind, resolve};
  pub use crate::filter::{Condition, Filter, FilterError, Literal, Operator, parse as parse_filter};
  pub use crate::matching::{
    Comparison, MatchType,
    extract::Extractor,
    normalize::{NormalizationOptions, normalize},
    score,
  };
  pub use crate::model::{HasFields, Record, RecordId, Reference, Value};
  pub use crate::relation::{INVOICE_TYPE_FIELD, INVOICE_TYPES, is_invoice};
  pub use crate::rules::{CompiledRule, Priority, RuleConfig, RuleMode, RuleRejection, RuleSet, SearchOperator, compile_rules};
  pub use crate::store::{DocumentStore, Documents, HttpStore, MemoryStore};
  pub use crate::tally::{RulePreview, Tally};
}
