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

//! Fixtures shared across integration test binaries, mirroring the role
//! of `dynein`'s own `tests/util/mod.rs`: a fixture `TableSchema` for
//! the seed scenarios' table `t`, a `SchemaProvider` backed by a fixed
//! set of schemas, and an in-memory `MockDynamoClient` test double.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use dql::executor::{DynamoClient, QueryPage};
use dql::plan::{BatchSource, ExpressionTriple, KeySource, WriteRequest};
use dql::schema::{IndexKind, IndexSchema, KeyAttr, SchemaError, SchemaProvider, TableSchema};
use dql::value::{ScalarType, Value};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Table `t`: HASH `id:STRING`, RANGE `ts:NUMBER`, GSI `by_user(user:STRING)`, per §8's seed scenarios.
/// Built once and cloned per call, the way the teacher's own test fixtures
/// build their `Lazy` statics once and clone out of them.
static SEED_SCHEMA: Lazy<TableSchema> = Lazy::new(|| TableSchema {
    name: "t".to_string(),
    hash: KeyAttr {
        name: "id".to_string(),
        scalar_type: ScalarType::S,
    },
    range: Some(KeyAttr {
        name: "ts".to_string(),
        scalar_type: ScalarType::N,
    }),
    attributes: HashMap::from([
        ("id".to_string(), ScalarType::S),
        ("ts".to_string(), ScalarType::N),
        ("user".to_string(), ScalarType::S),
    ]),
    gsi: vec![IndexSchema {
        name: "by_user".to_string(),
        kind: IndexKind::Global,
        hash: KeyAttr {
            name: "user".to_string(),
            scalar_type: ScalarType::S,
        },
        range: None,
    }],
    lsi: vec![],
    throughput: dql::ast::Throughput::PayPerRequest,
    stream_enabled: false,
});

pub fn seed_table_schema() -> TableSchema {
    SEED_SCHEMA.clone()
}

/// A `SchemaProvider` serving a fixed set of schemas, for tests that
/// only need `describe`/`list` to resolve statements — no caching, no
/// TTL, since these tests care about compiler behavior, not the cache.
pub struct FixedSchemaProvider {
    tables: HashMap<String, TableSchema>,
}

impl FixedSchemaProvider {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        FixedSchemaProvider {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn seeded() -> Self {
        Self::new(vec![seed_table_schema()])
    }
}

impl SchemaProvider for FixedSchemaProvider {
    fn describe<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<TableSchema, SchemaError>> {
        let result = self.tables.get(table).cloned().ok_or_else(|| SchemaError::NotFound(table.to_string()));
        Box::pin(async move { result })
    }

    fn invalidate(&self, _table: &str) {}

    fn list<'a>(&'a self) -> BoxFuture<'a, Result<Vec<String>, SchemaError>> {
        let names: Vec<String> = self.tables.keys().cloned().collect();
        Box::pin(async move { Ok(names) })
    }
}

/// A `DynamoClient` test double backed by an in-memory, unindexed item
/// list per table. It supports exactly what the executor's tests need:
/// matching items by an explicit key-attribute subset, and returning
/// them as a single unpaginated page. It does not model
/// `LastEvaluatedKey` continuation across multiple pages; tests that
/// need pagination behavior construct pages explicitly instead.
pub struct MockDynamoClient {
    pub tables: Mutex<HashMap<String, Vec<HashMap<String, Value>>>>,
    pub query_calls: std::sync::atomic::AtomicUsize,
    pub scan_calls: std::sync::atomic::AtomicUsize,
}

impl MockDynamoClient {
    pub fn new() -> Self {
        MockDynamoClient {
            tables: Mutex::new(HashMap::new()),
            query_calls: std::sync::atomic::AtomicUsize::new(0),
            scan_calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn with_items(table: &str, items: Vec<HashMap<String, Value>>) -> Self {
        let client = Self::new();
        client.tables.lock().unwrap().insert(table.to_string(), items);
        client
    }

    fn matches(item: &HashMap<String, Value>, key: &HashMap<String, Value>) -> bool {
        key.iter().all(|(k, v)| item.get(k) == Some(v))
    }
}

impl Default for MockDynamoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamoClient for MockDynamoClient {
    fn get_item<'a>(&'a self, table: &'a str, key: &'a HashMap<String, Value>, _consistent: bool) -> BoxFuture<'a, Result<Option<HashMap<String, Value>>, dql::error::DynamoError>> {
        let found = self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .and_then(|items| items.iter().find(|item| Self::matches(item, key)).cloned());
        Box::pin(async move { Ok(found) })
    }

    fn batch_get_item<'a>(&'a self, table: &'a str, keys: Vec<HashMap<String, Value>>, _consistent: bool) -> BoxFuture<'a, Result<Vec<HashMap<String, Value>>, dql::error::DynamoError>> {
        let found: Vec<_> = self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .map(|items| items.iter().filter(|item| keys.iter().any(|key| Self::matches(item, key))).cloned().collect())
            .unwrap_or_default();
        Box::pin(async move { Ok(found) })
    }

    fn query<'a>(&'a self, op: &'a dql::plan::QueryOp, _exclusive_start_key: Option<&'a HashMap<String, Value>>) -> BoxFuture<'a, Result<QueryPage, dql::error::DynamoError>> {
        self.query_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let items = self.tables.lock().unwrap().get(&op.table).cloned().unwrap_or_default();
        Box::pin(async move {
            Ok(QueryPage {
                count: items.len() as u32,
                scanned_count: items.len() as u32,
                items,
                last_evaluated_key: None,
            })
        })
    }

    fn scan<'a>(&'a self, op: &'a dql::plan::ScanOp, _exclusive_start_key: Option<&'a HashMap<String, Value>>, _segment: Option<u32>) -> BoxFuture<'a, Result<QueryPage, dql::error::DynamoError>> {
        self.scan_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let items = self.tables.lock().unwrap().get(&op.table).cloned().unwrap_or_default();
        Box::pin(async move {
            Ok(QueryPage {
                count: items.len() as u32,
                scanned_count: items.len() as u32,
                items,
                last_evaluated_key: None,
            })
        })
    }

    fn put_item<'a>(&'a self, table: &'a str, item: &'a HashMap<String, Value>, _condition: Option<&'a ExpressionTriple>) -> BoxFuture<'a, Result<(), dql::error::DynamoError>> {
        self.tables.lock().unwrap().entry(table.to_string()).or_default().push(item.clone());
        Box::pin(async move { Ok(()) })
    }

    fn update_item<'a>(
        &'a self,
        _table: &'a str,
        _key: &'a HashMap<String, Value>,
        _update: &'a ExpressionTriple,
        _condition: Option<&'a ExpressionTriple>,
        _return_values: dql::ast::ReturnValues,
    ) -> BoxFuture<'a, Result<Option<HashMap<String, Value>>, dql::error::DynamoError>> {
        Box::pin(async move { Ok(None) })
    }

    fn delete_item<'a>(
        &'a self,
        table: &'a str,
        key: &'a HashMap<String, Value>,
        _condition: Option<&'a ExpressionTriple>,
        _return_values: dql::ast::ReturnValues,
    ) -> BoxFuture<'a, Result<Option<HashMap<String, Value>>, dql::error::DynamoError>> {
        if let Some(items) = self.tables.lock().unwrap().get_mut(table) {
            items.retain(|item| !Self::matches(item, key));
        }
        Box::pin(async move { Ok(None) })
    }

    fn batch_write_item<'a>(&'a self, table: &'a str, requests: Vec<WriteRequest>) -> BoxFuture<'a, Result<(), dql::error::DynamoError>> {
        let mut tables = self.tables.lock().unwrap();
        let items = tables.entry(table.to_string()).or_default();
        for req in requests {
            match req {
                WriteRequest::Put(item) => items.push(item),
                WriteRequest::Delete(key) => items.retain(|item| !Self::matches(item, &key)),
            }
        }
        Box::pin(async move { Ok(()) })
    }

    fn create_table<'a>(&'a self, _stmt: &'a dql::ast::CreateTable) -> BoxFuture<'a, Result<(), dql::error::DynamoError>> {
        Box::pin(async move { Ok(()) })
    }

    fn update_table<'a>(&'a self, _table: &'a str, _action: &'a dql::ast::AlterAction) -> BoxFuture<'a, Result<(), dql::error::DynamoError>> {
        Box::pin(async move { Ok(()) })
    }

    fn delete_table<'a>(&'a self, _table: &'a str) -> BoxFuture<'a, Result<(), dql::error::DynamoError>> {
        Box::pin(async move { Ok(()) })
    }

    fn describe_table<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<TableSchema, dql::error::DynamoError>> {
        let table = table.to_string();
        Box::pin(async move { Ok(seed_table_schema_named(&table)) })
    }
}

fn seed_table_schema_named(name: &str) -> TableSchema {
    let mut schema = seed_table_schema();
    schema.name = name.to_string();
    schema
}

/// A fixture key/item helper: `{"id": S("a"), "ts": N("1")}`.
pub fn key(id: &str, ts: i64) -> HashMap<String, Value> {
    HashMap::from([("id".to_string(), Value::S(id.to_string())), ("ts".to_string(), Value::N(ts.to_string()))])
}

pub fn item(id: &str, ts: i64, user: &str) -> HashMap<String, Value> {
    let mut i = key(id, ts);
    i.insert("user".to_string(), Value::S(user.to_string()));
    i
}

/// `KeySource::Literal`/`BatchSource::Literal` are straightforward to
/// construct inline; this exists only for readability at call sites
/// that want to name the prior-read expansion explicitly.
pub fn from_prior_read() -> KeySource {
    KeySource::FromPriorRead
}

pub fn delete_from_prior_read() -> BatchSource {
    BatchSource::DeleteFromPriorRead
}
