/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * Licensed under the Apache License, Version 2.0 (the "License").
 * You may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Boundary behaviors from §8 exercised against the executor directly,
//! bypassing the compiler so each `ExecutionPlan` is built by hand.

mod support;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dql::cancel::CancelToken;
use dql::executor::{DynamoClient, Executor, ExecutionOutcome, QueryPage};
use dql::plan::{ExpressionTriple, Operation, Paging, QueryOp, ScanOp};
use dql::value::Value;
use support::{item, MockDynamoClient};

fn query_op(limit: Option<u32>, select_count: bool) -> QueryOp {
    QueryOp {
        table: "t".to_string(),
        index: None,
        key_condition: ExpressionTriple {
            expression: "#n0 = :v0".to_string(),
            names: HashMap::from([("#n0".to_string(), "id".to_string())]),
            values: HashMap::from([(":v0".to_string(), Value::S("a".to_string()))]),
        },
        filter: None,
        projection: None,
        paging: Paging {
            limit,
            starting_token: None,
            consistent: false,
        },
        select_count,
        scan_forward: true,
    }
}

fn scan_op(limit: Option<u32>, select_count: bool) -> ScanOp {
    ScanOp {
        table: "t".to_string(),
        index: None,
        filter: None,
        projection: None,
        paging: Paging {
            limit,
            starting_token: None,
            consistent: false,
        },
        select_count,
        segments: None,
    }
}

#[tokio::test]
async fn limit_zero_query_returns_no_items_and_performs_no_io() {
    let client = MockDynamoClient::with_items("t", vec![item("a", 1, "x"), item("a", 2, "x")]);
    let executor = Executor::new(client);
    let plan = dql::ExecutionPlan::single(Operation::Query(query_op(Some(0), false)));
    let outcome = executor.execute(&plan, &CancelToken::noop()).await.unwrap();
    assert_eq!(outcome, ExecutionOutcome::Items(vec![]));
}

#[tokio::test]
async fn limit_zero_scan_performs_no_io() {
    let client = MockDynamoClient::with_items("t", vec![item("a", 1, "x")]);
    let executor = Executor::new(client);
    let plan = dql::ExecutionPlan::single(Operation::Scan(scan_op(Some(0), false)));
    let outcome = executor.execute(&plan, &CancelToken::noop()).await.unwrap();
    assert_eq!(outcome, ExecutionOutcome::Items(vec![]));
}

#[tokio::test]
async fn count_star_over_empty_result_is_zero() {
    let client = MockDynamoClient::with_items("t", vec![]);
    let executor = Executor::new(client);
    let plan = dql::ExecutionPlan::single(Operation::Query(query_op(None, true)));
    let outcome = executor.execute(&plan, &CancelToken::noop()).await.unwrap();
    assert_eq!(outcome, ExecutionOutcome::Count(0));
}

/// A client that always reports a non-empty `LastEvaluatedKey`, so the
/// executor would keep paginating forever if it didn't stop as soon as
/// `limit` is reached.
struct NeverExhaustedClient {
    calls: Arc<AtomicUsize>,
}

impl DynamoClient for NeverExhaustedClient {
    fn get_item<'a>(
        &'a self,
        _table: &'a str,
        _key: &'a HashMap<String, Value>,
        _consistent: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<HashMap<String, Value>>, dql::error::DynamoError>> + Send + 'a>> {
        Box::pin(async move { Ok(None) })
    }

    fn batch_get_item<'a>(
        &'a self,
        _table: &'a str,
        _keys: Vec<HashMap<String, Value>>,
        _consistent: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<HashMap<String, Value>>, dql::error::DynamoError>> + Send + 'a>> {
        Box::pin(async move { Ok(Vec::new()) })
    }

    fn query<'a>(
        &'a self,
        _op: &'a QueryOp,
        _exclusive_start_key: Option<&'a HashMap<String, Value>>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<QueryPage, dql::error::DynamoError>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Ok(QueryPage {
                items: vec![item("a", 1, "x"), item("a", 2, "x")],
                count: 2,
                scanned_count: 2,
                last_evaluated_key: Some(support::key("a", 2)),
            })
        })
    }

    fn scan<'a>(
        &'a self,
        _op: &'a ScanOp,
        _exclusive_start_key: Option<&'a HashMap<String, Value>>,
        _segment: Option<u32>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<QueryPage, dql::error::DynamoError>> + Send + 'a>> {
        Box::pin(async move {
            Ok(QueryPage {
                items: vec![],
                count: 0,
                scanned_count: 0,
                last_evaluated_key: None,
            })
        })
    }

    fn put_item<'a>(
        &'a self,
        _table: &'a str,
        _item: &'a HashMap<String, Value>,
        _condition: Option<&'a ExpressionTriple>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), dql::error::DynamoError>> + Send + 'a>> {
        Box::pin(async move { Ok(()) })
    }

    fn update_item<'a>(
        &'a self,
        _table: &'a str,
        _key: &'a HashMap<String, Value>,
        _update: &'a ExpressionTriple,
        _condition: Option<&'a ExpressionTriple>,
        _return_values: dql::ast::ReturnValues,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<HashMap<String, Value>>, dql::error::DynamoError>> + Send + 'a>> {
        Box::pin(async move { Ok(None) })
    }

    fn delete_item<'a>(
        &'a self,
        _table: &'a str,
        _key: &'a HashMap<String, Value>,
        _condition: Option<&'a ExpressionTriple>,
        _return_values: dql::ast::ReturnValues,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<HashMap<String, Value>>, dql::error::DynamoError>> + Send + 'a>> {
        Box::pin(async move { Ok(None) })
    }

    fn batch_write_item<'a>(
        &'a self,
        _table: &'a str,
        _requests: Vec<dql::plan::WriteRequest>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), dql::error::DynamoError>> + Send + 'a>> {
        Box::pin(async move { Ok(()) })
    }

    fn create_table<'a>(&'a self, _stmt: &'a dql::ast::CreateTable) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), dql::error::DynamoError>> + Send + 'a>> {
        Box::pin(async move { Ok(()) })
    }

    fn update_table<'a>(
        &'a self,
        _table: &'a str,
        _action: &'a dql::ast::AlterAction,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), dql::error::DynamoError>> + Send + 'a>> {
        Box::pin(async move { Ok(()) })
    }

    fn delete_table<'a>(&'a self, _table: &'a str) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), dql::error::DynamoError>> + Send + 'a>> {
        Box::pin(async move { Ok(()) })
    }

    fn describe_table<'a>(
        &'a self,
        table: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<dql::schema::TableSchema, dql::error::DynamoError>> + Send + 'a>> {
        let table = table.to_string();
        Box::pin(async move { Ok(support::seed_table_schema()).map(|mut s: dql::schema::TableSchema| { s.name = table; s }) })
    }
}

#[tokio::test]
async fn pagination_stops_as_soon_as_limit_is_reached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = NeverExhaustedClient { calls: calls.clone() };
    let executor = Executor::new(client);
    let plan = dql::ExecutionPlan::single(Operation::Query(query_op(Some(2), false)));
    let outcome = executor.execute(&plan, &CancelToken::noop()).await.unwrap();
    match outcome {
        ExecutionOutcome::Items(items) => assert_eq!(items.len(), 2),
        other => panic!("expected Items, got {:?}", other),
    }
    // `LastEvaluatedKey` was present on the only page fetched; reaching
    // `limit` there must short-circuit before a second call is made.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
