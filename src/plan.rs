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

//! The `ExecutionPlan` data model, per §3: an ordered list of typed
//! `Operation` descriptors the executor drives against a `DynamoClient`.
//! Modeled as a tagged union, one struct per operation kind, rather
//! than a single struct with a field for every possible concern.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use crate::ast::{AlterAction, CreateTable, ReturnValues};
use crate::value::Value;

/// `(expression_string, name_placeholders, value_placeholders)`, per
/// §3/§6.2. The placeholder-map invariant — every `#nK`/`:vK` in
/// `expression` has an entry here and vice versa — is enforced by
/// construction in [`crate::expr_compiler`], not re-checked here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpressionTriple {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, Value>,
}

impl ExpressionTriple {
    /// Every `#nK` referenced in `expression` appears in `names`, and
    /// vice versa; same for `:vK`/`values`. Used by tests, not by the
    /// planner at runtime.
    #[cfg(test)]
    pub fn placeholders_are_consistent(&self) -> bool {
        for key in self.names.keys() {
            if !self.expression.contains(key.as_str()) {
                return false;
            }
        }
        for key in self.values.keys() {
            if !self.expression.contains(key.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    /// A single item operation (`GetItem`, `PutItem`, a point `UpdateItem`/`DeleteItem`).
    Single,
    /// A paginated `Query`/`Scan` stopped early by `LIMIT`.
    Bounded,
    /// A paginated `Query`/`Scan` run to exhaustion (no `LIMIT`, or a
    /// mutation-expansion key read).
    ScanAll,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paging {
    pub limit: Option<u32>,
    pub starting_token: Option<String>,
    pub consistent: bool,
}

impl Paging {
    pub fn mode(&self) -> PlanMode {
        if self.limit.is_some() {
            PlanMode::Bounded
        } else {
            PlanMode::ScanAll
        }
    }
}

/// Where the key(s) a write operation targets come from.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// A key already known at plan time (point lookup, or a key
    /// literally spelled out by `IN`).
    Literal(HashMap<String, Value>),
    /// Every key surfaced by the read operation immediately preceding
    /// this one in the same plan, whose projection the planner
    /// narrowed to key attributes only. This is how §4.4's mutation
    /// expansion threads a dynamic key set through a plan that's
    /// otherwise built entirely before execution starts.
    FromPriorRead,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put(HashMap<String, Value>),
    Delete(HashMap<String, Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchSource {
    Literal(Vec<WriteRequest>),
    /// Delete every key surfaced by the preceding read operation,
    /// chunked into `BatchWriteItem` requests of up to 25.
    DeleteFromPriorRead,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetItemOp {
    pub table: String,
    pub key: HashMap<String, Value>,
    pub projection: Option<ExpressionTriple>,
    pub consistent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchGetItemOp {
    pub table: String,
    pub keys: Vec<HashMap<String, Value>>,
    pub projection: Option<ExpressionTriple>,
    pub consistent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOp {
    pub table: String,
    pub index: Option<String>,
    pub key_condition: ExpressionTriple,
    pub filter: Option<ExpressionTriple>,
    /// Set to just the key attributes during mutation expansion's
    /// read phase; `None` means "whatever the SELECT list asked for".
    pub projection: Option<ExpressionTriple>,
    pub paging: Paging,
    pub select_count: bool,
    pub scan_forward: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOp {
    pub table: String,
    pub index: Option<String>,
    pub filter: Option<ExpressionTriple>,
    pub projection: Option<ExpressionTriple>,
    pub paging: Paging,
    pub select_count: bool,
    /// `Some(n)` for `THREADS n`, mapping to DynamoDB's native
    /// `Segment`/`TotalSegments` parallel scan per §5.
    pub segments: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutItemOp {
    pub table: String,
    pub item: HashMap<String, Value>,
    pub condition: Option<ExpressionTriple>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItemOp {
    pub table: String,
    pub target: KeySource,
    pub update: ExpressionTriple,
    pub condition: Option<ExpressionTriple>,
    pub return_values: ReturnValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItemOp {
    pub table: String,
    pub target: KeySource,
    pub condition: Option<ExpressionTriple>,
    pub return_values: ReturnValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchWriteItemOp {
    pub table: String,
    pub source: BatchSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTableOp {
    pub table: String,
    pub action: AlterAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteTableOp {
    pub table: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescribeTableOp {
    pub table: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    GetItem(GetItemOp),
    BatchGetItem(BatchGetItemOp),
    Query(QueryOp),
    Scan(ScanOp),
    PutItem(PutItemOp),
    UpdateItem(UpdateItemOp),
    DeleteItem(DeleteItemOp),
    BatchWriteItem(BatchWriteItemOp),
    CreateTable(CreateTable),
    UpdateTable(UpdateTableOp),
    DeleteTable(DeleteTableOp),
    DescribeTable(DescribeTableOp),
}

impl Operation {
    pub fn table(&self) -> &str {
        match self {
            Operation::GetItem(op) => &op.table,
            Operation::BatchGetItem(op) => &op.table,
            Operation::Query(op) => &op.table,
            Operation::Scan(op) => &op.table,
            Operation::PutItem(op) => &op.table,
            Operation::UpdateItem(op) => &op.table,
            Operation::DeleteItem(op) => &op.table,
            Operation::BatchWriteItem(op) => &op.table,
            Operation::CreateTable(op) => &op.table,
            Operation::UpdateTable(op) => &op.table,
            Operation::DeleteTable(op) => &op.table,
            Operation::DescribeTable(op) => &op.table,
        }
    }

    pub fn mode(&self) -> PlanMode {
        match self {
            Operation::Query(op) => op.paging.mode(),
            Operation::Scan(op) => op.paging.mode(),
            Operation::BatchWriteItem(BatchWriteItemOp {
                source: BatchSource::DeleteFromPriorRead,
                ..
            }) => PlanMode::ScanAll,
            Operation::UpdateItem(UpdateItemOp {
                target: KeySource::FromPriorRead,
                ..
            })
            | Operation::DeleteItem(DeleteItemOp {
                target: KeySource::FromPriorRead,
                ..
            }) => PlanMode::ScanAll,
            _ => PlanMode::Single,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::GetItem(op) => write!(f, "GetItem {} key={:?} consistent={}", op.table, op.key, op.consistent),
            Operation::BatchGetItem(op) => write!(f, "BatchGetItem {} keys={}", op.table, op.keys.len()),
            Operation::Query(op) => write!(
                f,
                "Query {}{} key_condition=\"{}\" filter={} mode={:?} limit={:?}",
                op.table,
                op.index.as_deref().map(|i| format!(" USING {}", i)).unwrap_or_default(),
                op.key_condition.expression,
                op.filter.as_ref().map(|e| e.expression.as_str()).unwrap_or("-"),
                op.paging.mode(),
                op.paging.limit
            ),
            Operation::Scan(op) => write!(
                f,
                "Scan {}{} filter={} mode={:?} limit={:?} segments={:?}",
                op.table,
                op.index.as_deref().map(|i| format!(" USING {}", i)).unwrap_or_default(),
                op.filter.as_ref().map(|e| e.expression.as_str()).unwrap_or("-"),
                op.paging.mode(),
                op.paging.limit,
                op.segments
            ),
            Operation::PutItem(op) => write!(f, "PutItem {} item keys={}", op.table, op.item.len()),
            Operation::UpdateItem(op) => write!(f, "UpdateItem {} target={:?} update=\"{}\"", op.table, op.target, op.update.expression),
            Operation::DeleteItem(op) => write!(f, "DeleteItem {} target={:?}", op.table, op.target),
            Operation::BatchWriteItem(op) => write!(f, "BatchWriteItem {} source={:?}", op.table, op.source),
            Operation::CreateTable(op) => write!(f, "CreateTable {}", op.table),
            Operation::UpdateTable(op) => write!(f, "UpdateTable {} action={:?}", op.table, op.action),
            Operation::DeleteTable(op) => write!(f, "DeleteTable {} if_exists={}", op.table, op.if_exists),
            Operation::DescribeTable(op) => write!(f, "DescribeTable {}", op.table),
        }
    }
}

/// An ordered list of [`Operation`]s, per §3. Two-phase mutation
/// expansions rely on plan order: a read operation followed by a
/// write operation whose [`KeySource`]/[`BatchSource`] is
/// `FromPriorRead` always refers to the operation immediately before
/// it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionPlan {
    pub operations: Vec<Operation>,
}

impl ExecutionPlan {
    pub fn single(op: Operation) -> Self {
        ExecutionPlan { operations: vec![op] }
    }

    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, op) in self.operations.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, op);
        }
        out
    }
}
