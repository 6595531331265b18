//! Cross-builder scenarios, including the run path against a mock queryable.

use super::*;
use crate::client::{JsonRow, Queryable};
use crate::compile::Query;
use crate::error::{SqlError, SqlResult};
use crate::expr::{parent, WhereSpec};
use crate::monitor::QueryMonitor;
use crate::values;
use crate::Monitored;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A queryable that replays canned rows and records every query it sees.
#[derive(Default)]
struct MockConn {
    rows: Vec<JsonRow>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl MockConn {
    fn returning(rows: Vec<Value>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|result| {
                    let mut row = JsonRow::new();
                    row.insert("result".to_string(), result);
                    row
                })
                .collect(),
            ..Self::default()
        }
    }

    fn raw_rows(rows: Vec<JsonRow>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Queryable for MockConn {
    async fn query(&self, query: &Query) -> SqlResult<Vec<JsonRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(query.text.clone());
        Ok(self.rows.clone())
    }
}

#[derive(Default)]
struct RecordingMonitor {
    events: Mutex<Vec<String>>,
}

impl QueryMonitor for RecordingMonitor {
    fn on_query(&self, query: &Query, transaction_id: Option<u64>) {
        self.events
            .lock()
            .unwrap()
            .push(format!("query txn={transaction_id:?} {}", query.text));
    }

    fn on_result(&self, _query: &Query, result: &Value, _elapsed: Duration, _txn: Option<u64>) {
        self.events.lock().unwrap().push(format!("result {result}"));
    }
}

#[tokio::test]
async fn noop_insert_skips_the_database() {
    let conn = MockConn::default();
    let out = insert_many("users", vec![]).run(&conn).await.unwrap();
    assert_eq!(out, json!([]));
    assert_eq!(conn.call_count(), 0);
}

#[tokio::test]
async fn forced_noop_insert_hits_the_database() {
    let conn = MockConn::default();
    let fragment = insert_many("users", vec![]).fragment();
    let out = fragment.run_forced(&conn).await.unwrap();
    assert_eq!(out, json!([]));
    assert_eq!(conn.call_count(), 1);
    assert_eq!(
        conn.seen.lock().unwrap()[0],
        r#"INSERT INTO "users" SELECT null WHERE false"#
    );
}

#[tokio::test]
async fn select_many_returns_the_aggregated_array() {
    let conn = MockConn::returning(vec![json!([{"id": 1}, {"id": 2}])]);
    let out = select("t", WhereSpec::All).run(&conn).await.unwrap();
    assert_eq!(out, json!([{"id": 1}, {"id": 2}]));
}

#[tokio::test]
async fn select_one_is_null_when_nothing_matches() {
    let conn = MockConn::returning(vec![]);
    let out = select_one("t", values! { "id" => 1_i32 }).run(&conn).await.unwrap();
    assert_eq!(out, Value::Null);
}

#[tokio::test]
async fn select_exactly_one_carries_the_compiled_query() {
    let conn = MockConn::returning(vec![]);
    let err = select_exactly_one("t", values! { "id" => 99_i32 })
        .run(&conn)
        .await
        .unwrap_err();
    match err {
        SqlError::NotExactlyOne { query } => {
            assert!(query.text.contains(r#"FROM "t" WHERE ("id" = $1)"#));
            assert_eq!(query.params.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn count_parses_the_driver_text_int8() {
    let conn = MockConn::returning(vec![json!("41")]);
    let out = count("t", WhereSpec::All).run(&conn).await.unwrap();
    assert_eq!(out, json!(41.0));
}

#[tokio::test]
async fn default_transform_camel_cases_rows() {
    let mut row = JsonRow::new();
    row.insert("user_id".to_string(), json!(1));
    let conn = MockConn::raw_rows(vec![row]);
    let out = crate::sql("SELECT user_id FROM t").run(&conn).await.unwrap();
    assert_eq!(out, json!([{"userId": 1}]));
}

#[tokio::test]
async fn monitor_sees_query_then_result_with_transaction_id() {
    use std::sync::Arc;
    let monitor = Arc::new(RecordingMonitor::default());
    let conn = Monitored::new(MockConn::returning(vec![json!([])]))
        .with_monitor_arc(monitor.clone())
        .with_transaction_id(7);
    select("t", WhereSpec::All).run(&conn).await.unwrap();

    let events = monitor.events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0].starts_with("query txn=Some(7) SELECT coalesce"));
    assert!(events[1].starts_with("result"));
}

#[tokio::test]
async fn monitor_fires_for_noop_runs_too() {
    use std::sync::Arc;
    let monitor = Arc::new(RecordingMonitor::default());
    let inner = MockConn::default();
    let conn = Monitored::new(inner).with_monitor_arc(monitor.clone());
    insert_many("users", vec![]).run(&conn).await.unwrap();

    assert_eq!(conn.inner().call_count(), 0);
    let events = monitor.events.lock().unwrap();
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn update_unwraps_every_returned_row() {
    let conn = MockConn::returning(vec![json!({"id": 1}), json!({"id": 2})]);
    let out = update("t", values! { "active" => true }, WhereSpec::All)
        .run(&conn)
        .await
        .unwrap();
    assert_eq!(out, json!([{"id": 1}, {"id": 2}]));
}

#[tokio::test]
async fn truncate_returns_null() {
    let conn = MockConn::default();
    let out = truncate(&["t"]).run(&conn).await.unwrap();
    assert_eq!(out, Value::Null);
}

#[test]
fn lateral_subquery_references_outer_alias_exactly_once() {
    let q = select("a", values! { "x" => 1_i32 })
        .lateral("bs", select("b", values! { "a_id" => parent("id") }))
        .fragment()
        .compile()
        .unwrap();
    assert_eq!(q.text.matches(r#""a"."id""#).count(), 1);
}

#[test]
fn placeholders_are_consecutive_across_builders() {
    let q = select("a", values! { "x" => 1_i32, "y" => 2_i32 })
        .lateral("bs", select("b", values! { "n" => 3_i32 }).limit(4))
        .limit(5)
        .fragment()
        .compile()
        .unwrap();
    for k in 1..=5 {
        assert!(q.text.contains(&format!("${k}")), "missing ${k} in {}", q.text);
    }
    assert!(!q.text.contains("$6"));
    assert_eq!(q.params.len(), 5);
}
