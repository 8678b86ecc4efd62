use float_cmp::assert_approx_eq;
use libtally::prelude::*;
use serde_json::json;
use serde_json_assert::assert_json_eq;

fn payment(id: &str, reference: &str) -> Record {
  Record::builder(id).fields(&[("payment_ref", reference.into())]).build()
}

fn invoice(id: &str, name: &str) -> Record {
  Record::builder(id).name(name).fields(&[("move_type", "out_invoice".into())]).build()
}

fn sale_order(id: &str, name: &str, invoices: &[&Record]) -> Record {
  Record::builder(id).name(name).fields(&[("state", "sale".into()), ("invoice_ids", Value::References(invoices.iter().map(|invoice| invoice.reference()).collect()))]).build()
}

fn rules(yaml: &str) -> Vec<RuleConfig> {
  RuleSet::from_yaml(yaml).unwrap().rules
}

async fn run(store: MemoryStore, rules: &[RuleConfig], sources: Vec<Record>, targets: Vec<Record>) -> Reconciliation {
  let tally = Tally::new(store).workers(2).build().unwrap();

  tally.run_reconciliation(rules, sources, targets, &RunParams::default()).await.unwrap()
}

#[tokio::test]
async fn direct_equals() {
  let rules = rules("rules: [{ name: Invoice number, source_field: payment_ref, target_field: name, match_type: equals, min_score: 80 }]");

  let result = run(MemoryStore::default(), &rules, vec![payment("p1", "INV-1001")], vec![invoice("inv1", "INV-1001"), invoice("inv2", "INV-1002")]).await;

  assert_eq!(result.suggestions.len(), 1);
  assert_eq!(result.suggestions[0].source_id, "p1");
  assert_eq!(result.suggestions[0].target_id, "inv1");
  assert_approx_eq!(f64, result.suggestions[0].score, 100.0);
  assert_eq!(result.logs[0].state, LogState::Confirmed);
  assert!(result.unmatched.is_empty());
}

#[tokio::test]
async fn direct_contains_below_threshold() {
  let rule = &rules("rules: [{ name: Reference, source_field: payment_ref, target_field: name, match_type: contains, min_score: 80, normalization: { strip_spaces: false } }]")[0];

  assert_approx_eq!(f64, score(MatchType::Contains, &normalize("PAGO REF 555", &rule.normalization), "555", None), 25.0);

  let result = run(MemoryStore::default(), std::slice::from_ref(rule), vec![payment("p1", "PAGO REF 555")], vec![invoice("inv1", "555")]).await;

  assert!(result.suggestions.is_empty());
  assert_eq!(result.rules[0].matches_out, 0);
  assert_eq!(result.unmatched, vec!["p1".to_string()]);
}

#[tokio::test]
async fn relation_forward() {
  let inv9 = invoice("inv9", "INV-9");
  let mut documents = Documents::default();
  documents.insert("sale.order".to_string(), vec![sale_order("so42", "SO0042", &[&inv9])]);

  let rules = rules("rules: [{ name: Sale order, mode: relation, source_field: payment_ref, relation_model: sale.order, relation_search_field: name, search_operator: ilike }]");

  let result = run(MemoryStore::with_documents(documents), &rules, vec![payment("p1", "SO0042")], vec![inv9]).await;

  assert_eq!(result.suggestions.len(), 1);
  assert_eq!(result.suggestions[0].target_id, "inv9");
  assert_eq!(result.suggestions[0].mode, RuleMode::Relation);
  assert_approx_eq!(f64, result.suggestions[0].score, RELATION_SCORE);
  assert_eq!(result.logs[0].state, LogState::Pending);
  assert_eq!(result.logs[0].evidence, "sale.order: SO0042");
}

#[tokio::test]
async fn relation_reverse() {
  let inv = invoice("inv99", "INV-99");
  let mut documents = Documents::default();
  documents.insert("sale.order".to_string(), vec![sale_order("so99", "SO0099", &[&inv]), sale_order("so100", "SO0100", &[])]);

  let rules = rules(
    r#"
      rules:
        - name: Orders back to payments
          mode: relation_reverse
          source_field: payment_ref
          relation_model: sale.order
          relation_search_field: name
          relation_domain_filter: "[('state', '=', 'sale')]"
          match_type: contains
          min_score: 50
    "#,
  );

  let sources = vec![payment("p1", "SO0099"), payment("p2", "pago so0099"), payment("p3", "transfer 12")];
  let tally = Tally::new(MemoryStore::with_documents(documents)).build().unwrap();
  let params = RunParams {
    min_match_score: 50.0,
    ..Default::default()
  };

  let result = tally.run_reconciliation(&rules, sources, vec![inv], &params).await.unwrap();

  assert_eq!(result.suggestions.len(), 2);
  assert_eq!(result.suggestions[0].source_id, "p1");
  assert_approx_eq!(f64, result.suggestions[0].score, 100.0);
  assert_eq!(result.suggestions[1].source_id, "p2");
  assert_approx_eq!(f64, result.suggestions[1].score, 60.0);
  assert!(result.suggestions.iter().all(|suggestion| suggestion.target_id == "inv99"));
  assert_eq!(result.suggestions[0].evidence, "SO0099 → INV-99");
  assert_eq!(result.unmatched, vec!["p3".to_string()]);
}

#[tokio::test]
async fn empty_values_stay_unmatched() {
  let rules = rules(
    r#"
      rules:
        - { name: Exact, source_field: payment_ref, target_field: name, match_type: equals }
        - { name: Fuzzy, source_field: payment_ref, target_field: name, match_type: fuzzy_ratio, min_score: 0 }
    "#,
  );

  let sources = vec![payment("p1", "   "), payment("p2", ""), Record::builder("p3").build(), payment("p4", "INV-1")];
  let result = run(MemoryStore::default(), &rules, sources, vec![invoice("inv1", "INV-1"), invoice("inv2", "   ")]).await;

  assert_eq!(result.suggestions.len(), 1);
  assert_eq!(result.suggestions[0].source_id, "p4");
  assert_eq!(result.unmatched, vec!["p1".to_string(), "p2".to_string(), "p3".to_string()]);
  assert_eq!(result.summary.processed, 4);
  assert_eq!(result.summary.unmatched, 3);
}

#[tokio::test]
async fn deterministic_across_runs() {
  let rules = rules(
    r#"
      rules:
        - { name: Fuzzy, sequence: 1, source_field: payment_ref, target_field: name, match_type: fuzzy_ratio, min_score: 60 }
        - { name: Words, sequence: 1, priority: high, source_field: payment_ref, target_field: name, match_type: word_overlap, min_score: 30, normalization: { strip_spaces: false } }
        - { name: Auto, sequence: 2, source_field: payment_ref, target_field: name }
    "#,
  );

  let sources = (0..200).map(|index| payment(&format!("p{index}"), &format!("INV {}", index % 37))).collect::<Vec<_>>();
  let targets = (0..50).map(|index| invoice(&format!("inv{index}"), &format!("INV {index}"))).collect::<Vec<_>>();

  let first = run(MemoryStore::default(), &rules, sources.clone(), targets.clone()).await;

  for _ in 0..3 {
    let again = run(MemoryStore::default(), &rules, sources.clone(), targets.clone()).await;

    assert_eq!(first.suggestions, again.suggestions);
    assert_eq!(first.unmatched, again.unmatched);
  }
}

#[tokio::test]
async fn serialized_result() {
  let rules = rules("rules: [{ name: Invoice number, source_field: payment_ref, target_field: name, match_type: equals }]");
  let result = run(MemoryStore::default(), &rules, vec![payment("p1", "INV-1001"), payment("p2", "nothing")], vec![invoice("inv1", "INV-1001")]).await;

  let value = serde_json::to_value(&result).unwrap();

  assert_json_eq!(
    value["suggestions"],
    json!([{ "source_id": "p1", "target_id": "inv1", "score": 100.0, "rule": "Invoice number", "mode": "direct", "evidence": "direct: inv-1001 = inv-1001" }])
  );
  assert_json_eq!(value["unmatched"], json!(["p2"]));
  assert_json_eq!(value["summary"], json!({ "processed": 2, "suggested": 1, "unmatched": 1, "confirmed": 1, "rules_evaluated": 1, "rules_rejected": 0 }));
  assert_json_eq!(value["logs"][0]["state"], json!("confirmed"));
  assert_json_eq!(value["logs"][0]["matched_value"], json!("inv-1001"));
}
