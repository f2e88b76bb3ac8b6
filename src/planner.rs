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

//! The access-path planner, per §4.4: picks `GetItem` > `Query` on the
//! base table > `Query` on a secondary index > `Scan`, in that order,
//! and expands non-point `UPDATE`/`DELETE` into a two-phase
//! read-keys-then-write plan.

use std::collections::HashMap;

use crate::ast::*;
use crate::error::{DqlError, PlanError, SemanticError, SemanticErrorKind};
use crate::expr_compiler::{self, RangeBound};
use crate::plan::*;
use crate::schema::{IndexSchema, KeyAttr, TableSchema};
use crate::semantic::ResolvedStatement;
use crate::value::Value;

pub fn plan(resolved: &ResolvedStatement) -> Result<ExecutionPlan, DqlError> {
    Ok(match resolved {
        ResolvedStatement::Select { stmt, schema } => plan_select(stmt, schema)?,
        ResolvedStatement::Scan { stmt, schema } => plan_scan(stmt, schema)?,
        ResolvedStatement::Insert { stmt, schema } => plan_insert(stmt, schema),
        ResolvedStatement::Update { stmt, schema } => plan_update(stmt, schema)?,
        ResolvedStatement::Delete { stmt, schema } => plan_delete(stmt, schema)?,
        ResolvedStatement::CreateTable(create) => ExecutionPlan::single(Operation::CreateTable(create.clone())),
        ResolvedStatement::AlterTable { stmt, .. } => ExecutionPlan::single(Operation::UpdateTable(UpdateTableOp {
            table: stmt.table.clone(),
            action: stmt.action.clone(),
        })),
        ResolvedStatement::DropTable(drop) => ExecutionPlan::single(Operation::DeleteTable(DeleteTableOp {
            table: drop.table.clone(),
            if_exists: drop.if_exists,
        })),
        ResolvedStatement::Explain(inner) | ResolvedStatement::Analyze(inner) => plan(inner)?,
        ResolvedStatement::DumpSchema(schemas) => ExecutionPlan {
            operations: schemas
                .iter()
                .map(|s| Operation::DescribeTable(DescribeTableOp { table: s.name.clone() }))
                .collect(),
        },
        ResolvedStatement::Help => ExecutionPlan::default(),
    })
}

/// A key attribute paired with the index (if any) it belongs to, used
/// while comparing candidate access paths.
struct Candidate<'a> {
    index: Option<&'a IndexSchema>,
    hash: &'a KeyAttr,
    range: Option<&'a KeyAttr>,
}

fn candidates(schema: &TableSchema) -> Vec<Candidate<'_>> {
    let mut out = vec![Candidate {
        index: None,
        hash: &schema.hash,
        range: schema.range.as_ref(),
    }];
    let mut lsi: Vec<&IndexSchema> = schema.lsi.iter().collect();
    lsi.sort_by(|a, b| a.name.cmp(&b.name));
    let mut gsi: Vec<&IndexSchema> = schema.gsi.iter().collect();
    gsi.sort_by(|a, b| a.name.cmp(&b.name));
    for idx in lsi.into_iter().chain(gsi) {
        out.push(Candidate {
            index: Some(idx),
            hash: &idx.hash,
            range: idx.range.as_ref(),
        });
    }
    out
}

/// Normalizes `expr` to `(path, op, value)` when it's a simple
/// attribute-vs-literal comparison naming `attr`, regardless of which
/// side the attribute appears on.
fn as_compare_on<'a>(expr: &'a Expr, attr: &str) -> Option<(&'a AttributePath, CompareOp, &'a Value)> {
    let Expr::Compare(op, lhs, rhs) = expr else { return None };
    match (lhs.as_ref(), rhs.as_ref()) {
        (Expr::AttrRef(path), Expr::Literal(v)) if path.as_simple_name() == Some(attr) => Some((path, *op, v)),
        (Expr::Literal(v), Expr::AttrRef(path)) if path.as_simple_name() == Some(attr) => Some((path, flip(*op), v)),
        _ => None,
    }
}

fn flip(op: CompareOp) -> CompareOp {
    match op {
        CompareOp::Lt => CompareOp::Gt,
        CompareOp::Le => CompareOp::Ge,
        CompareOp::Gt => CompareOp::Lt,
        CompareOp::Ge => CompareOp::Le,
        other => other,
    }
}

/// A resolved match of one or two conjuncts against a key attribute's
/// role, ready to become part of a `KeyConditionExpression`.
struct KeyMatch {
    path: AttributePath,
    bound: RangeMatchKind,
    /// Indices into the flattened conjunct list this match consumed.
    consumed: Vec<usize>,
}

enum RangeMatchKind {
    Eq(Value),
    Single(SortKeyOp, Value),
    Between(Value, Value),
    BeginsWith(Value),
    /// Two one-sided comparisons folded into a BETWEEN; `strict` notes
    /// whether either original bound was exclusive, in which case the
    /// original comparisons must also appear in the FilterExpression
    /// per §4.4's "exclusive ends rewritten to filter if strict".
    StrictPair { lo: Value, hi: Value, refilter: Vec<usize> },
}

fn match_hash_eq(conjuncts: &[&Expr], attr: &str) -> Option<KeyMatch> {
    for (i, expr) in conjuncts.iter().enumerate() {
        if let Some((path, CompareOp::Eq, value)) = as_compare_on(expr, attr) {
            return Some(KeyMatch {
                path: path.clone(),
                bound: RangeMatchKind::Eq(value.clone()),
                consumed: vec![i],
            });
        }
    }
    None
}

fn match_range(conjuncts: &[&Expr], attr: &str) -> Option<KeyMatch> {
    for (i, expr) in conjuncts.iter().enumerate() {
        match expr {
            Expr::Between(operand, lo, hi) => {
                if let (Expr::AttrRef(path), Expr::Literal(lo), Expr::Literal(hi)) = (operand.as_ref(), lo.as_ref(), hi.as_ref()) {
                    if path.as_simple_name() == Some(attr) {
                        return Some(KeyMatch {
                            path: path.clone(),
                            bound: RangeMatchKind::Between(lo.clone(), hi.clone()),
                            consumed: vec![i],
                        });
                    }
                }
            }
            Expr::BeginsWith(operand, prefix) => {
                if let (Expr::AttrRef(path), Expr::Literal(prefix)) = (operand.as_ref(), prefix.as_ref()) {
                    if path.as_simple_name() == Some(attr) {
                        return Some(KeyMatch {
                            path: path.clone(),
                            bound: RangeMatchKind::BeginsWith(prefix.clone()),
                            consumed: vec![i],
                        });
                    }
                }
            }
            _ => {}
        }
    }

    // A lower and an upper one-sided comparison on the same attribute
    // fold into a single BETWEEN key condition.
    let mut lower: Option<(usize, CompareOp, &Value, &AttributePath)> = None;
    let mut upper: Option<(usize, CompareOp, &Value, &AttributePath)> = None;
    for (i, expr) in conjuncts.iter().enumerate() {
        if let Some((path, op, value)) = as_compare_on(expr, attr) {
            match op {
                CompareOp::Gt | CompareOp::Ge if lower.is_none() => lower = Some((i, op, value, path)),
                CompareOp::Lt | CompareOp::Le if upper.is_none() => upper = Some((i, op, value, path)),
                _ => {}
            }
        }
    }
    if let (Some((li, lop, lv, path)), Some((ui, uop, uv, _))) = (lower, upper) {
        let strict = lop == CompareOp::Gt || uop == CompareOp::Lt;
        return Some(KeyMatch {
            path: path.clone(),
            bound: RangeMatchKind::StrictPair {
                lo: lv.clone(),
                hi: uv.clone(),
                refilter: if strict { vec![li, ui] } else { vec![] },
            },
            consumed: vec![li, ui],
        });
    }
    // A lone one-sided comparison is directly usable as a `KeyConditionExpression`.
    for (i, expr) in conjuncts.iter().enumerate() {
        if let Some((path, op, value)) = as_compare_on(expr, attr) {
            if let Some(sort_op) = SortKeyOp::from_compare(op) {
                if sort_op != SortKeyOp::Eq {
                    return Some(KeyMatch {
                        path: path.clone(),
                        bound: RangeMatchKind::Single(sort_op, value.clone()),
                        consumed: vec![i],
                    });
                }
            }
        }
    }
    None
}

/// Detects a single `attr IN (literal, literal, ...)` conjunct,
/// returning its index into `conjuncts` and the literal values.
fn match_in(conjuncts: &[&Expr], attr: &str) -> Option<(usize, Vec<Value>)> {
    for (i, expr) in conjuncts.iter().enumerate() {
        let Expr::In(operand, candidates) = expr else { continue };
        let Expr::AttrRef(path) = operand.as_ref() else { continue };
        if path.as_simple_name() != Some(attr) {
            continue;
        }
        let literals: Option<Vec<Value>> = candidates
            .iter()
            .map(|c| match c {
                Expr::Literal(v) => Some(v.clone()),
                _ => None,
            })
            .collect();
        if let Some(literals) = literals {
            return Some((i, literals));
        }
    }
    None
}

/// §4.4 rule 1's `IN`-list case: a WHERE clause that's purely `hash IN
/// (...)`, or `hash IN (...)` conjoined with an equality or `IN` list
/// on the range key, fully enumerates a set of primary keys without
/// needing a Query/Scan at all — resolved to `BatchGetItem` instead.
/// Anything left over in the filter (an extra conjunct, a non-`IN`
/// comparison on the hash key) means the keys aren't fully enumerable
/// here, so this returns `None` and the caller falls back to the
/// ordinary GetItem/Query/Scan access-path selection.
fn try_batch_get_item(schema: &TableSchema, filter: Option<&Expr>) -> Option<Vec<HashMap<String, Value>>> {
    let filter = filter?;
    let conjuncts = flatten_conjuncts(filter);
    let (hash_idx, hash_values) = match_in(&conjuncts, &schema.hash.name)?;

    let (range_values, mut consumed): (Vec<Option<Value>>, Vec<usize>) = match &schema.range {
        None => (vec![None], vec![]),
        Some(range) => {
            if let Some((range_idx, values)) = match_in(&conjuncts, &range.name) {
                (values.into_iter().map(Some).collect(), vec![range_idx])
            } else if let Some(range_match) = match_hash_eq(&conjuncts, &range.name) {
                let RangeMatchKind::Eq(v) = range_match.bound else {
                    unreachable!("match_hash_eq only ever returns RangeMatchKind::Eq")
                };
                (vec![Some(v)], range_match.consumed)
            } else {
                return None;
            }
        }
    };
    consumed.push(hash_idx);

    if consumed.len() != conjuncts.len() {
        return None;
    }

    let mut keys = Vec::with_capacity(hash_values.len() * range_values.len());
    for hash_value in &hash_values {
        for range_value in &range_values {
            let mut key = HashMap::new();
            key.insert(schema.hash.name.clone(), hash_value.clone());
            if let (Some(range), Some(range_value)) = (&schema.range, range_value) {
                key.insert(range.name.clone(), range_value.clone());
            }
            keys.push(key);
        }
    }
    Some(keys)
}

/// A fully resolved access path: which table/index, the compiled key
/// condition, and whatever's left over for the FilterExpression.
struct ResolvedAccessPath {
    index: Option<String>,
    key_condition: crate::plan::ExpressionTriple,
    filter: Option<Expr>,
    /// True when the match is a full-key equality (point lookup).
    is_point: bool,
}

fn fold(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(|acc, e| acc.and(e))
}

fn resolve_against(candidate: &Candidate, conjuncts: &[&Expr]) -> Option<ResolvedAccessPath> {
    let hash_match = match_hash_eq(conjuncts, &candidate.hash.name)?;
    let mut consumed = hash_match.consumed.clone();
    let RangeMatchKind::Eq(hash_value) = hash_match.bound else {
        unreachable!("match_hash_eq only ever returns RangeMatchKind::Eq")
    };

    let range_match = candidate.range.and_then(|r| match_range(conjuncts, &r.name));
    let mut extra_filter_conjuncts = Vec::new();
    let (range_descr, is_point) = match &range_match {
        None => (None, candidate.range.is_none()),
        Some(m) => {
            consumed.extend(&m.consumed);
            match &m.bound {
                RangeMatchKind::Eq(v) => {
                    (Some((m.path.clone(), SortKeyOp::Eq, RangeBound::Single(v.clone()))), true)
                }
                RangeMatchKind::Single(op, v) => (Some((m.path.clone(), *op, RangeBound::Single(v.clone()))), false),
                RangeMatchKind::Between(lo, hi) => (
                    Some((m.path.clone(), SortKeyOp::Ge, RangeBound::Between(lo.clone(), hi.clone()))),
                    false,
                ),
                RangeMatchKind::BeginsWith(prefix) => {
                    (Some((m.path.clone(), SortKeyOp::Ge, RangeBound::BeginsWith(prefix.clone()))), false)
                }
                RangeMatchKind::StrictPair { lo, hi, refilter } => {
                    for &i in refilter {
                        extra_filter_conjuncts.push((*conjuncts[i]).clone());
                    }
                    (Some((m.path.clone(), SortKeyOp::Ge, RangeBound::Between(lo.clone(), hi.clone()))), false)
                }
            }
        }
    };

    let key_condition = expr_compiler::compile_key_condition(
        (&hash_match.path, &hash_value),
        range_descr.as_ref().map(|(p, op, b)| (p, *op, b)),
    );

    let residual: Vec<Expr> = conjuncts
        .iter()
        .enumerate()
        .filter(|(i, _)| !consumed.contains(i))
        .map(|(_, e)| (**e).clone())
        .collect();
    let filter = fold(residual.into_iter().chain(extra_filter_conjuncts));

    Some(ResolvedAccessPath {
        index: candidate.index.map(|i| i.name.clone()),
        key_condition,
        filter,
        is_point,
    })
}

/// Picks the best access path per §4.4's ordered rules and tie-breaks.
fn choose_access_path(schema: &TableSchema, filter: Option<&Expr>, using_index: Option<&str>) -> Option<ResolvedAccessPath> {
    let filter = filter?;
    let conjuncts = flatten_conjuncts(filter);
    let all = candidates(schema);

    if let Some(name) = using_index {
        let candidate = all.iter().find(|c| c.index.is_some_and(|i| i.name == name))?;
        return resolve_against(candidate, &conjuncts);
    }

    for candidate in &all {
        if let Some(resolved) = resolve_against(candidate, &conjuncts) {
            return Some(resolved);
        }
    }
    None
}

fn validate_order_by(order_by: &Option<(String, SortDirection)>, schema: &TableSchema, index: Option<&str>) -> Result<(), SemanticError> {
    let Some((attr, _)) = order_by else { return Ok(()) };
    let range_name = match index {
        Some(name) => schema.find_index(name).and_then(|i| i.range.as_ref()).map(|r| r.name.as_str()),
        None => schema.range.as_ref().map(|r| r.name.as_str()),
    };
    if range_name != Some(attr.as_str()) {
        return Err(SemanticError::new(
            SemanticErrorKind::UnknownAttribute,
            format!("ORDER BY '{}' does not match the range key of the chosen access path", attr),
        ));
    }
    Ok(())
}

fn plan_select(stmt: &Select, schema: &TableSchema) -> Result<ExecutionPlan, DqlError> {
    let wants_batch =
        stmt.using_index.is_none() && stmt.order_by.is_none() && stmt.limit.is_none() && !matches!(stmt.select, SelectList::CountStar);
    if wants_batch {
        if let Some(keys) = try_batch_get_item(schema, stmt.filter.as_ref()) {
            return Ok(ExecutionPlan::single(Operation::BatchGetItem(BatchGetItemOp {
                table: schema.name.clone(),
                keys,
                projection: None,
                consistent: stmt.consistent_read,
            })));
        }
    }

    let access = choose_access_path(schema, stmt.filter.as_ref(), stmt.using_index.as_deref());

    let op = match access {
        Some(path) if path.is_point && path.filter.is_none() => {
            let mut key = HashMap::new();
            key.insert(schema.hash.name.clone(), key_value(&path.key_condition, 0));
            if let Some(range) = &schema.range {
                if let Some(v) = key_value_opt(&path.key_condition, 1) {
                    key.insert(range.name.clone(), v);
                }
            }
            Operation::GetItem(GetItemOp {
                table: schema.name.clone(),
                key,
                projection: None,
                consistent: stmt.consistent_read,
            })
        }
        Some(path) => {
            validate_order_by(&stmt.order_by, schema, path.index.as_deref())?;
            if stmt.consistent_read && path.index.as_ref().is_some_and(|n| schema.gsi.iter().any(|g| &g.name == n)) {
                return Err(PlanError::new("CONSISTENT READ is not supported for a query against a GSI").into());
            }
            Operation::Query(QueryOp {
                table: schema.name.clone(),
                index: path.index,
                key_condition: path.key_condition,
                filter: path.filter.map(|f| expr_compiler::compile_condition(&f)),
                projection: None,
                paging: Paging {
                    limit: stmt.limit,
                    starting_token: None,
                    consistent: stmt.consistent_read,
                },
                select_count: matches!(stmt.select, SelectList::CountStar),
                scan_forward: !matches!(stmt.order_by, Some((_, SortDirection::Desc))),
            })
        }
        None => {
            if stmt.consistent_read {
                return Err(PlanError::new("CONSISTENT READ is not supported for Scan").into());
            }
            Operation::Scan(ScanOp {
                table: schema.name.clone(),
                index: stmt.using_index.clone(),
                filter: stmt.filter.as_ref().map(expr_compiler::compile_condition),
                projection: None,
                paging: Paging {
                    limit: stmt.limit,
                    starting_token: None,
                    consistent: false,
                },
                select_count: matches!(stmt.select, SelectList::CountStar),
                segments: None,
            })
        }
    };
    Ok(ExecutionPlan::single(op))
}

fn plan_scan(stmt: &Scan, schema: &TableSchema) -> Result<ExecutionPlan, DqlError> {
    if stmt.consistent_read && stmt.using_index.as_ref().is_some_and(|n| schema.gsi.iter().any(|g| &g.name == n)) {
        return Err(PlanError::new("CONSISTENT READ is not supported for a Scan against a GSI").into());
    }
    Ok(ExecutionPlan::single(Operation::Scan(ScanOp {
        table: schema.name.clone(),
        index: stmt.using_index.clone(),
        filter: stmt.filter.as_ref().map(expr_compiler::compile_condition),
        projection: None,
        paging: Paging {
            limit: stmt.limit,
            starting_token: None,
            consistent: stmt.consistent_read,
        },
        select_count: false,
        segments: stmt.threads,
    })))
}

fn plan_insert(stmt: &Insert, schema: &TableSchema) -> ExecutionPlan {
    let items: Vec<HashMap<String, Value>> = stmt
        .rows
        .iter()
        .map(|row| stmt.columns.iter().cloned().zip(row.iter().cloned()).collect())
        .collect();

    if items.len() == 1 {
        return ExecutionPlan::single(Operation::PutItem(PutItemOp {
            table: schema.name.clone(),
            item: items.into_iter().next().unwrap(),
            condition: None,
        }));
    }

    let operations = items
        .chunks(25)
        .map(|chunk| {
            Operation::BatchWriteItem(BatchWriteItemOp {
                table: schema.name.clone(),
                source: BatchSource::Literal(chunk.iter().cloned().map(WriteRequest::Put).collect()),
            })
        })
        .collect();
    ExecutionPlan { operations }
}

fn key_projection_attrs(schema: &TableSchema) -> Vec<String> {
    let mut attrs = vec![schema.hash.name.clone()];
    if let Some(range) = &schema.range {
        attrs.push(range.name.clone());
    }
    attrs
}

fn point_key(schema: &TableSchema, path: &ResolvedAccessPath) -> HashMap<String, Value> {
    let mut key = HashMap::new();
    key.insert(schema.hash.name.clone(), key_value(&path.key_condition, 0));
    if schema.range.is_some() {
        if let Some(v) = key_value_opt(&path.key_condition, 1) {
            key.insert(schema.range.as_ref().unwrap().name.clone(), v);
        }
    }
    key
}

/// Pulls the Nth `:vK` placeholder's literal back out of a compiled
/// key condition triple, for statements (point lookups) that need the
/// plain key map alongside the condition string.
fn key_value(triple: &crate::plan::ExpressionTriple, n: usize) -> Value {
    key_value_opt(triple, n).expect("key condition missing expected value placeholder")
}

fn key_value_opt(triple: &crate::plan::ExpressionTriple, n: usize) -> Option<Value> {
    triple.values.get(&format!(":v{}", n)).cloned()
}

fn plan_update(stmt: &Update, schema: &TableSchema) -> Result<ExecutionPlan, DqlError> {
    let access = choose_access_path(schema, stmt.filter.as_ref(), None);
    let update = expr_compiler::compile_update(&stmt.clauses);

    match access {
        Some(path) if path.is_point => {
            let key = point_key(schema, &path);
            let condition = path.filter.as_ref().map(expr_compiler::compile_condition);
            Ok(ExecutionPlan::single(Operation::UpdateItem(UpdateItemOp {
                table: schema.name.clone(),
                target: KeySource::Literal(key),
                update,
                condition,
                return_values: stmt.returns,
            })))
        }
        Some(path) => {
            let read = read_keys_op(schema, Some(path));
            let write = Operation::UpdateItem(UpdateItemOp {
                table: schema.name.clone(),
                target: KeySource::FromPriorRead,
                update,
                condition: None,
                return_values: stmt.returns,
            });
            Ok(ExecutionPlan {
                operations: vec![read, write],
            })
        }
        None => {
            let read = read_keys_op(schema, None);
            let write = Operation::UpdateItem(UpdateItemOp {
                table: schema.name.clone(),
                target: KeySource::FromPriorRead,
                update,
                condition: None,
                return_values: stmt.returns,
            });
            Ok(ExecutionPlan {
                operations: vec![read, write],
            })
        }
    }
}

fn plan_delete(stmt: &Delete, schema: &TableSchema) -> Result<ExecutionPlan, DqlError> {
    let access = choose_access_path(schema, stmt.filter.as_ref(), None);

    match access {
        Some(path) if path.is_point => {
            let key = point_key(schema, &path);
            let condition = path.filter.as_ref().map(expr_compiler::compile_condition);
            Ok(ExecutionPlan::single(Operation::DeleteItem(DeleteItemOp {
                table: schema.name.clone(),
                target: KeySource::Literal(key),
                condition,
                return_values: stmt.returns,
            })))
        }
        Some(path) => {
            let read = read_keys_op(schema, Some(path));
            let write = Operation::BatchWriteItem(BatchWriteItemOp {
                table: schema.name.clone(),
                source: BatchSource::DeleteFromPriorRead,
            });
            Ok(ExecutionPlan {
                operations: vec![read, write],
            })
        }
        None => {
            let read = read_keys_op(schema, None);
            let write = Operation::BatchWriteItem(BatchWriteItemOp {
                table: schema.name.clone(),
                source: BatchSource::DeleteFromPriorRead,
            });
            Ok(ExecutionPlan {
                operations: vec![read, write],
            })
        }
    }
}

/// Builds the keys-only read phase of a mutation expansion: a `Query`
/// on `path`'s access path when one was found, else a full `Scan`,
/// both projecting only the base table's key attributes.
fn read_keys_op(schema: &TableSchema, path: Option<ResolvedAccessPath>) -> Operation {
    let projection = Some(expr_compiler::compile_projection(&key_projection_attrs(schema)));
    match path {
        Some(path) => Operation::Query(QueryOp {
            table: schema.name.clone(),
            index: path.index,
            key_condition: path.key_condition,
            filter: path.filter.map(|f| expr_compiler::compile_condition(&f)),
            projection,
            paging: Paging::default(),
            select_count: false,
            scan_forward: true,
        }),
        None => Operation::Scan(ScanOp {
            table: schema.name.clone(),
            index: None,
            filter: None,
            projection,
            paging: Paging::default(),
            select_count: false,
            segments: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IndexKind, KeyAttr};
    use crate::value::ScalarType;
    use std::collections::HashMap as Map;

    fn fixture_schema() -> TableSchema {
        TableSchema {
            name: "t".to_string(),
            hash: KeyAttr {
                name: "id".to_string(),
                scalar_type: ScalarType::S,
            },
            range: Some(KeyAttr {
                name: "ts".to_string(),
                scalar_type: ScalarType::N,
            }),
            attributes: Map::new(),
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
            throughput: Throughput::PayPerRequest,
            stream_enabled: false,
        }
    }

    fn select(src: &str) -> Select {
        match crate::parser::parse(src).unwrap() {
            Statement::Select(s) => s,
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn point_lookup_on_full_primary_key_emits_get_item() {
        let schema = fixture_schema();
        let stmt = select("SELECT * FROM t WHERE id = 'a' AND ts = 1");
        let plan = plan_select(&stmt, &schema).unwrap();
        assert_eq!(plan.operations.len(), 1);
        match &plan.operations[0] {
            Operation::GetItem(op) => {
                assert_eq!(op.key.get("id"), Some(&Value::S("a".to_string())));
                assert_eq!(op.key.get("ts"), Some(&Value::N("1".to_string())));
            }
            other => panic!("expected GetItem, got {:?}", other),
        }
    }

    #[test]
    fn range_between_on_primary_emits_query() {
        let schema = fixture_schema();
        let stmt = select("SELECT * FROM t WHERE id = 'a' AND ts > 10 AND ts < 20");
        let plan = plan_select(&stmt, &schema).unwrap();
        match &plan.operations[0] {
            Operation::Query(op) => {
                assert!(op.key_condition.expression.contains("BETWEEN"));
                assert!(op.filter.is_some(), "strict bounds must be re-checked in FilterExpression");
            }
            other => panic!("expected Query, got {:?}", other),
        }
    }

    #[test]
    fn inclusive_range_bounds_need_no_extra_filter() {
        let schema = fixture_schema();
        let stmt = select("SELECT * FROM t WHERE id = 'a' AND ts >= 10 AND ts <= 20");
        let plan = plan_select(&stmt, &schema).unwrap();
        match &plan.operations[0] {
            Operation::Query(op) => assert!(op.filter.is_none()),
            other => panic!("expected Query, got {:?}", other),
        }
    }

    #[test]
    fn hash_equality_on_gsi_emits_query_on_index() {
        let schema = fixture_schema();
        let stmt = select("SELECT * FROM t WHERE user = 'x'");
        let plan = plan_select(&stmt, &schema).unwrap();
        match &plan.operations[0] {
            Operation::Query(op) => assert_eq!(op.index.as_deref(), Some("by_user")),
            other => panic!("expected Query, got {:?}", other),
        }
    }

    #[test]
    fn hash_in_list_emits_batch_get_item() {
        let schema = fixture_schema();
        let stmt = select("SELECT * FROM t WHERE id IN ('a', 'b') AND ts = 1");
        let plan = plan_select(&stmt, &schema).unwrap();
        assert_eq!(plan.operations.len(), 1);
        match &plan.operations[0] {
            Operation::BatchGetItem(op) => {
                assert_eq!(op.keys.len(), 2);
                assert!(op.keys.iter().all(|k| k.get("ts") == Some(&Value::N("1".to_string()))));
            }
            other => panic!("expected BatchGetItem, got {:?}", other),
        }
    }

    #[test]
    fn hash_in_list_without_full_range_key_falls_back_to_query() {
        let schema = fixture_schema();
        let stmt = select("SELECT * FROM t WHERE id IN ('a', 'b')");
        let plan = plan_select(&stmt, &schema).unwrap();
        assert!(matches!(plan.operations[0], Operation::Scan(_) | Operation::Query(_)));
    }

    #[test]
    fn no_key_match_falls_back_to_scan() {
        let schema = fixture_schema();
        let stmt = select("SELECT * FROM t WHERE views > 5");
        let plan = plan_select(&stmt, &schema).unwrap();
        assert!(matches!(plan.operations[0], Operation::Scan(_)));
    }

    #[test]
    fn count_star_sets_select_count_flag() {
        let schema = fixture_schema();
        let stmt = select("SELECT count(*) FROM t WHERE id = 'a'");
        let plan = plan_select(&stmt, &schema).unwrap();
        match &plan.operations[0] {
            Operation::Query(op) => assert!(op.select_count),
            other => panic!("expected Query, got {:?}", other),
        }
    }

    #[test]
    fn mutation_expansion_on_gsi_produces_query_then_batch_delete() {
        let schema = fixture_schema();
        let stmt = match crate::parser::parse("DELETE FROM t WHERE user = 'x'").unwrap() {
            Statement::Delete(d) => d,
            other => panic!("expected delete, got {:?}", other),
        };
        let plan = plan_delete(&stmt, &schema).unwrap();
        assert_eq!(plan.operations.len(), 2);
        match &plan.operations[0] {
            Operation::Query(op) => assert_eq!(op.index.as_deref(), Some("by_user")),
            other => panic!("expected Query, got {:?}", other),
        }
        match &plan.operations[1] {
            Operation::BatchWriteItem(op) => assert_eq!(op.source, BatchSource::DeleteFromPriorRead),
            other => panic!("expected BatchWriteItem, got {:?}", other),
        }
    }

    #[test]
    fn point_update_emits_single_update_item_with_add_clause() {
        let schema = fixture_schema();
        let stmt = match crate::parser::parse("UPDATE t ADD views 1 WHERE id = 'a' AND ts = 1").unwrap() {
            Statement::Update(u) => u,
            other => panic!("expected update, got {:?}", other),
        };
        let plan = plan_update(&stmt, &schema).unwrap();
        assert_eq!(plan.operations.len(), 1);
        match &plan.operations[0] {
            Operation::UpdateItem(op) => {
                assert!(matches!(op.target, KeySource::Literal(_)));
                assert_eq!(op.update.expression, "ADD views :v0");
            }
            other => panic!("expected UpdateItem, got {:?}", other),
        }
    }

    #[test]
    fn multi_row_insert_chunks_into_batches_of_25() {
        let schema = fixture_schema();
        let rows: Vec<Vec<Value>> = (0..30).map(|i| vec![Value::S(format!("id{}", i)), Value::N("1".to_string())]).collect();
        let stmt = Insert {
            table: "t".to_string(),
            columns: vec!["id".to_string(), "ts".to_string()],
            rows,
        };
        let plan = plan_insert(&stmt, &schema);
        assert_eq!(plan.operations.len(), 2);
        match &plan.operations[0] {
            Operation::BatchWriteItem(op) => match &op.source {
                BatchSource::Literal(items) => assert_eq!(items.len(), 25),
                _ => panic!("expected literal batch"),
            },
            other => panic!("expected BatchWriteItem, got {:?}", other),
        }
    }

    #[test]
    fn single_row_insert_emits_put_item() {
        let schema = fixture_schema();
        let stmt = Insert {
            table: "t".to_string(),
            columns: vec!["id".to_string(), "ts".to_string()],
            rows: vec![vec![Value::S("a".to_string()), Value::N("1".to_string())]],
        };
        let plan = plan_insert(&stmt, &schema);
        assert_eq!(plan.operations.len(), 1);
        assert!(matches!(plan.operations[0], Operation::PutItem(_)));
    }

    #[test]
    fn order_by_mismatched_with_access_path_is_rejected() {
        let schema = fixture_schema();
        let stmt = select("SELECT * FROM t WHERE user = 'x' ORDER BY ts DESC");
        let err = plan_select(&stmt, &schema).unwrap_err();
        let _ = err; // PlanError wraps a SemanticError via `?`; constructing it at all proves rejection.
    }
}
