//! Invoices reachable from intermediate documents.

use std::collections::{HashMap, HashSet};

use ahash::RandomState;

use crate::{
  error::TallyError,
  field::lookup,
  model::{HasFields, Record, Value},
};

/// Field holding the accounting document subtype of a target record.
pub const INVOICE_TYPE_FIELD: &str = "move_type";

/// Customer and vendor invoices and their credit notes. Any other subtype
/// (journal entries, receipts) is never reached through a relation.
pub const INVOICE_TYPES: [&str; 4] = ["out_invoice", "in_invoice", "out_refund", "in_refund"];

pub fn is_invoice<R: HasFields + ?Sized>(record: &R) -> bool {
  matches!(lookup(record, INVOICE_TYPE_FIELD).as_deref(), Some(Value::Text(kind)) if INVOICE_TYPES.contains(&kind.as_str()))
}

/// The candidate targets a relation may land on, indexed by identifier.
pub(crate) struct InvoicePool<'t> {
  invoices: HashMap<&'t str, &'t Record, RandomState>,
}

impl<'t> InvoicePool<'t> {
  pub(crate) fn new(targets: &[&'t Record]) -> InvoicePool<'t> {
    let invoices = targets.iter().filter(|target| is_invoice(**target)).map(|target| (target.id.as_str(), *target)).collect();

    InvoicePool { invoices }
  }

  pub(crate) fn len(&self) -> usize {
    self.invoices.len()
  }

  /// Invoices linked from a document through `field`, restricted to the pool.
  ///
  /// A document whose relation field does not hold references cannot be
  /// followed and is reported as an evaluation error.
  pub(crate) fn reachable(&self, document: &Record, field: &str) -> Result<Vec<&'t Record>, TallyError> {
    let Some(value) = document.field(field) else {
      return Ok(vec![]);
    };

    let references = value.references().ok_or_else(|| TallyError::evaluation(&document.id, format!("field '{field}' does not link to invoices")))?;

    Ok(references.into_iter().filter_map(|reference| self.invoices.get(reference.id.as_str()).copied()).collect())
  }

  /// Invoices reachable from several documents, without duplicates, in the
  /// order they are first reached.
  pub(crate) fn reachable_from<'d>(&self, documents: impl IntoIterator<Item = &'d Record>, field: &str) -> (Vec<(&'d Record, &'t Record)>, Vec<TallyError>) {
    let mut seen = HashSet::<&str, RandomState>::default();
    let mut invoices = Vec::new();
    let mut errors = Vec::new();

    for document in documents {
      match self.reachable(document, field) {
        Ok(reached) => {
          for invoice in reached {
            if seen.insert(invoice.id.as_str()) {
              invoices.push((document, invoice));
            }
          }
        }

        Err(err) => errors.push(err),
      }
    }

    (invoices, errors)
  }
}
