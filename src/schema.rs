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

//! `TableSchema` and the `SchemaProvider` collaborator contract, per
//! §3 and §4.6, plus the TTL-caching, coalescing implementation
//! described in §5. The shape of `TableSchema`/`IndexSchema` mirrors
//! `dynein`'s own `app::TableSchema`/`IndexSchema`, generalized from a
//! single cached "currently used" table to an arbitrary number of
//! named tables behind one provider.

use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::ast::Throughput;
use crate::value::ScalarType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Hash,
    Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyAttr {
    pub name: String,
    pub scalar_type: ScalarType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Local,
    Global,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSchema {
    pub name: String,
    pub kind: IndexKind,
    pub hash: KeyAttr,
    pub range: Option<KeyAttr>,
}

/// `{name, keys, attributes, gsi, lsi, throughput, stream?}`, per §3.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub hash: KeyAttr,
    pub range: Option<KeyAttr>,
    pub attributes: HashMap<String, ScalarType>,
    pub gsi: Vec<IndexSchema>,
    pub lsi: Vec<IndexSchema>,
    pub throughput: Throughput,
    pub stream_enabled: bool,
}

impl TableSchema {
    /// All key attributes across the base table and every secondary
    /// index, used by the planner's key-usage validation.
    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.hash.name == name
            || self.range.as_ref().is_some_and(|r| r.name == name)
            || self
                .gsi
                .iter()
                .chain(self.lsi.iter())
                .any(|idx| idx.hash.name == name || idx.range.as_ref().is_some_and(|r| r.name == name))
    }

    pub fn find_index(&self, name: &str) -> Option<&IndexSchema> {
        self.gsi.iter().chain(self.lsi.iter()).find(|idx| idx.name == name)
    }

    pub fn declared_type(&self, name: &str) -> Option<ScalarType> {
        self.attributes.get(name).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    NotFound(String),
    Backend(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::NotFound(table) => write!(f, "table '{}' not found", table),
            SchemaError::Backend(msg) => write!(f, "schema backend error: {}", msg),
        }
    }
}

impl std::error::Error for SchemaError {}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operations consumed by the core, per §4.6. Implementations are
/// expected to wrap a `DescribeTable`/`ListTables` call; this crate
/// only requires that `invalidate` is honored immediately.
pub trait SchemaProvider: Send + Sync {
    fn describe<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<TableSchema, SchemaError>>;
    fn invalidate(&self, table: &str);
    fn list<'a>(&'a self) -> BoxFuture<'a, Result<Vec<String>, SchemaError>>;
}

struct CacheEntry {
    value: TableSchema,
    fetched_at: Instant,
}

/// Wraps any [`SchemaProvider`] with the TTL cache and single-flight
/// coalescing described in §3 ("Schema entries are cached with a
/// configurable TTL") and §5 ("concurrent `describe` for the same
/// table coalesces into a single upstream call"). Each table name gets
/// its own `Mutex`, so concurrent lookups of *different* tables never
/// block each other — only same-key lookups serialize, which is what
/// produces the coalescing.
pub struct CachingSchemaProvider<S: SchemaProvider> {
    source: S,
    ttl: Duration,
    entries: StdMutex<HashMap<String, Arc<Mutex<Option<CacheEntry>>>>>,
}

impl<S: SchemaProvider> CachingSchemaProvider<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        CachingSchemaProvider {
            source,
            ttl,
            entries: StdMutex::new(HashMap::new()),
        }
    }

    fn slot(&self, table: &str) -> Arc<Mutex<Option<CacheEntry>>> {
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }
}

impl<S: SchemaProvider> SchemaProvider for CachingSchemaProvider<S> {
    fn describe<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<TableSchema, SchemaError>> {
        Box::pin(async move {
            let slot = self.slot(table);
            let mut guard = slot.lock().await;
            if let Some(entry) = guard.as_ref() {
                if entry.fetched_at.elapsed() < self.ttl {
                    debug!("schema cache hit for '{}'", table);
                    return Ok(entry.value.clone());
                }
            }
            debug!("schema cache miss for '{}', calling source", table);
            let fetched = self.source.describe(table).await?;
            *guard = Some(CacheEntry {
                value: fetched.clone(),
                fetched_at: Instant::now(),
            });
            Ok(fetched)
        })
    }

    fn invalidate(&self, table: &str) {
        // Dropping the slot's Arc here doesn't disturb a describe that
        // already cloned it before this call; that caller's cache
        // write lands in an orphaned entry and is simply never read
        // again, which is harmless for a TTL cache.
        self.entries.lock().unwrap().remove(table);
        self.source.invalidate(table);
    }

    fn list<'a>(&'a self) -> BoxFuture<'a, Result<Vec<String>, SchemaError>> {
        self.source.list()
    }
}
