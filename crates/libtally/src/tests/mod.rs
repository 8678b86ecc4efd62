use crate::{
  model::{Record, Reference, Value},
  rules::{CompiledRule, RuleConfig},
  store::Documents,
};

pub fn payment(id: &str, reference: &str) -> Record {
  Record::builder(id).fields(&[("payment_ref", Value::from(reference))]).build()
}

pub fn invoice(id: &str, name: &str, move_type: &str) -> Record {
  Record::builder(id).name(name).fields(&[("move_type", Value::from(move_type)), ("state", Value::from("posted"))]).build()
}

pub fn order(id: &str, name: &str, invoices: &[&str]) -> Record {
  let invoices = invoices
    .iter()
    .map(|id| Reference {
      id: id.to_string(),
      name: String::new(),
    })
    .collect();

  Record::builder(id).name(name).fields(&[("state", Value::from("sale")), ("invoice_ids", Value::References(invoices))]).build()
}

pub fn documents(model: &str, records: Vec<Record>) -> Documents {
  let mut documents = Documents::default();
  documents.insert(model.to_string(), records);
  documents
}

pub fn rule(yaml: &str) -> CompiledRule {
  serde_yaml::from_str::<RuleConfig>(yaml).unwrap().compile().unwrap()
}
