use axum_test::TestServer;
use libtally::prelude::*;
use serde_json::{Value as Json, json};
use serde_json_assert::assert_json_eq;

use crate::{
  api::{self, config::Config},
  tests::{FailingStore, state},
};

fn invoice(id: &str, name: &str) -> Json {
  json!({ "id": id, "name": name, "fields": { "move_type": "out_invoice", "state": "posted" } })
}

fn payment(id: &str, reference: &str) -> Json {
  json!({ "id": id, "fields": { "payment_ref": reference } })
}

fn server<S: DocumentStore>(store: S, rules: RuleSet) -> TestServer {
  TestServer::new(api::router(state(Config::default(), store, rules))).unwrap()
}

#[tokio::test]
async fn reconcile_with_payload_rules() {
  let server = server(MemoryStore::default(), RuleSet::default());

  let response = server
    .post("/reconcile")
    .json(&json!({
      "rules": [{ "name": "Invoice number", "source_field": "payment_ref", "target_field": "name", "match_type": "equals" }],
      "sources": [payment("p1", "INV-1001"), payment("p2", "nothing")],
      "targets": [invoice("inv1", "INV-1001"), invoice("inv2", "INV-1002")]
    }))
    .await;

  response.assert_status_ok();

  let body: Json = response.json();

  assert_json_eq!(
    body["suggestions"],
    json!([{
      "source_id": "p1",
      "target_id": "inv1",
      "score": 100.0,
      "rule": "Invoice number",
      "mode": "direct",
      "evidence": "direct: inv-1001 = inv-1001"
    }])
  );

  assert_json_eq!(body["unmatched"], json!(["p2"]));
  assert_eq!(body["logs"][0]["state"], "confirmed");
  assert_eq!(body["summary"]["processed"], 2);
}

#[tokio::test]
async fn reconcile_with_loaded_rules() {
  let rules = RuleSet::from_yaml("rules: [{ name: Invoice number, source_field: payment_ref, target_field: name, match_type: equals }]").unwrap();
  let server = server(MemoryStore::default(), rules);

  let response = server
    .post("/reconcile")
    .json(&json!({
      "sources": [payment("p1", "INV-1001")],
      "targets": [invoice("inv1", "INV-1001")],
      "params": { "min_match_score": 50, "auto_confirm_score": 101 }
    }))
    .await;

  response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);

  let response = server
    .post("/reconcile")
    .json(&json!({
      "sources": [payment("p1", "INV-1001")],
      "targets": [invoice("inv1", "INV-1001")],
      "params": { "min_match_score": 50, "auto_confirm_score": 100.0 }
    }))
    .await;

  response.assert_status_ok();
  response.assert_json_contains(&json!({
    "suggestions": [{ "source_id": "p1", "target_id": "inv1", "rule": "Invoice number" }],
    "logs": [{ "state": "confirmed" }]
  }));
}

#[tokio::test]
async fn reconcile_reports_invalid_rules() {
  let server = server(MemoryStore::default(), RuleSet::default());

  let response = server
    .post("/reconcile")
    .json(&json!({
      "rules": [
        { "name": "Broken", "mode": "relation", "source_field": "payment_ref" },
        { "name": "Invoice number", "source_field": "payment_ref", "target_field": "name", "match_type": "equals" }
      ],
      "sources": [payment("p1", "INV-1001")],
      "targets": [invoice("inv1", "INV-1001")]
    }))
    .await;

  response.assert_status_ok();
  response.assert_json_contains(&json!({
    "suggestions": [{ "target_id": "inv1" }],
    "rejected": [{ "rule": "Broken", "reason": "relation rules require a relation model" }],
    "summary": { "rules_rejected": 1 }
  }));
}

#[tokio::test]
async fn reconcile_requires_sources() {
  let server = server(MemoryStore::default(), RuleSet::default());

  let response = server.post("/reconcile").json(&json!({ "sources": [], "targets": [] })).await;

  response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
  response.assert_json(&json!({
    "message": "payload failed validation",
    "details": ["at least one source record must be provided"]
  }));
}

#[tokio::test]
async fn reconcile_store_unavailable() {
  let server = server(FailingStore, RuleSet::default());

  let response = server
    .post("/reconcile")
    .json(&json!({
      "rules": [{ "name": "Sale order", "mode": "relation", "source_field": "payment_ref", "relation_model": "sale.order", "relation_search_field": "name" }],
      "sources": [payment("p1", "SO0042")],
      "targets": []
    }))
    .await;

  response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
  response.assert_text_contains("could not fetch sale.order");
}

#[tokio::test]
async fn preview_rule() {
  let server = server(MemoryStore::default(), RuleSet::default());

  let response = server
    .post("/rules/test")
    .json(&json!({
      "rule": { "name": "Invoice number", "source_field": "payment_ref", "target_field": "name", "match_type": "equals" },
      "sources": [payment("p1", "INV-1"), payment("p2", "INV-2"), payment("p3", "INV-3"), payment("p4", "INV-4")],
      "targets": [invoice("inv1", "INV-1"), invoice("inv2", "INV-2"), invoice("inv3", "INV-3")]
    }))
    .await;

  response.assert_status_ok();
  response.assert_json_contains(&json!({
    "rule": "Invoice number",
    "sources_in": 4,
    "matched_sources": 3,
    "match_percentage": 75.0
  }));
}

#[tokio::test]
async fn preview_invalid_rule() {
  let server = server(MemoryStore::default(), RuleSet::default());

  let response = server
    .post("/rules/test")
    .json(&json!({
      "rule": { "name": "Regex", "source_field": "payment_ref", "target_field": "name", "match_type": "regex" },
      "sources": [payment("p1", "INV-1")]
    }))
    .await;

  response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
  response.assert_json(&json!({
    "message": "invalid rule 'Regex'",
    "details": ["regex rules require a match pattern"]
  }));
}

#[tokio::test]
async fn list_rules() {
  let rules = RuleSet::from_yaml("rules: [{ name: First, source_field: payment_ref, target_field: name }, { name: Second, source_field: ref, target_field: name, active: false }]").unwrap();
  let server = server(MemoryStore::default(), rules);

  let response = server.get("/rules").await;

  response.assert_status_ok();
  response.assert_json_contains(&json!({
    "count": 2,
    "rules": [{ "name": "First", "active": true }, { "name": "Second", "active": false }]
  }));
}

#[tokio::test]
async fn health_checks() {
  let server = server(FailingStore, RuleSet::default());

  server.get("/healthz").await.assert_status_ok();
  server.get("/readyz").await.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);

  let server = self::server(MemoryStore::default(), RuleSet::default());

  server.get("/readyz").await.assert_status_ok();
}

#[tokio::test]
async fn not_found() {
  let server = server(MemoryStore::default(), RuleSet::default());

  let response = server.get("/nothing").await;

  response.assert_status_not_found();
  response.assert_json(&json!({ "message": "missing resource" }));

  server.get("/metrics").await.assert_status_not_found();
}
