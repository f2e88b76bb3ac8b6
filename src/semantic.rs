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

//! Semantic analysis, per §4.3: resolves table references against a
//! [`SchemaProvider`], validates key usage and literal types, and
//! rejects mutations that would otherwise require an unconfirmed
//! full-table scan.

use log::debug;

use crate::ast::*;
use crate::error::{DqlError, SemanticError, SemanticErrorKind};
use crate::schema::{SchemaError, SchemaProvider, TableSchema};
use crate::value::ScalarType;

/// A statement with its table reference(s) resolved to a concrete
/// [`TableSchema`], ready for the planner.
#[derive(Debug, Clone)]
pub enum ResolvedStatement {
    Select { stmt: Select, schema: TableSchema },
    Scan { stmt: Scan, schema: TableSchema },
    Insert { stmt: Insert, schema: TableSchema },
    Update { stmt: Update, schema: TableSchema },
    Delete { stmt: Delete, schema: TableSchema },
    CreateTable(CreateTable),
    AlterTable { stmt: AlterTable, schema: TableSchema },
    DropTable(DropTable),
    Explain(Box<ResolvedStatement>),
    Analyze(Box<ResolvedStatement>),
    DumpSchema(Vec<TableSchema>),
    Help,
}

async fn resolve_table(schema: &dyn SchemaProvider, name: &str) -> Result<TableSchema, DqlError> {
    schema.describe(name).await.map_err(|e| match e {
        SchemaError::NotFound(table) => {
            SemanticError::new(SemanticErrorKind::UnknownTable, format!("no such table '{}'", table)).into()
        }
        SchemaError::Backend(msg) => {
            SemanticError::new(SemanticErrorKind::UnknownTable, format!("failed to resolve table '{}': {}", name, msg))
                .into()
        }
    })
}

/// Resolves `stmt` against `schema`, satisfying the Scan-mutation
/// confirmation requirement with either the statement's own
/// `confirmed_scan` flag or the caller-supplied `confirmed` token.
pub async fn analyze(
    stmt: &Statement,
    schema: &dyn SchemaProvider,
    confirmed: bool,
) -> Result<ResolvedStatement, DqlError> {
    let resolved = match stmt {
        Statement::Select(sel) => {
            let table = resolve_table(schema, &sel.table).await?;
            validate_using_index(&table, sel.using_index.as_deref())?;
            if let Some(filter) = &sel.filter {
                validate_filter_key_usage(&table, filter)?;
            }
            ResolvedStatement::Select {
                stmt: sel.clone(),
                schema: table,
            }
        }
        Statement::Scan(scan) => {
            let table = resolve_table(schema, &scan.table).await?;
            validate_using_index(&table, scan.using_index.as_deref())?;
            if let Some(filter) = &scan.filter {
                validate_filter_key_usage(&table, filter)?;
            }
            ResolvedStatement::Scan {
                stmt: scan.clone(),
                schema: table,
            }
        }
        Statement::Insert(insert) => {
            let table = resolve_table(schema, &insert.table).await?;
            validate_insert(&table, insert)?;
            ResolvedStatement::Insert {
                stmt: insert.clone(),
                schema: table,
            }
        }
        Statement::Update(update) => {
            let table = resolve_table(schema, &update.table).await?;
            if let Some(filter) = &update.filter {
                validate_filter_key_usage(&table, filter)?;
            }
            validate_mutation_confirmed(&table, update.filter.as_ref(), update.confirmed_scan || confirmed)?;
            ResolvedStatement::Update {
                stmt: update.clone(),
                schema: table,
            }
        }
        Statement::Delete(delete) => {
            let table = resolve_table(schema, &delete.table).await?;
            if let Some(filter) = &delete.filter {
                validate_filter_key_usage(&table, filter)?;
            }
            validate_mutation_confirmed(&table, delete.filter.as_ref(), delete.confirmed_scan || confirmed)?;
            ResolvedStatement::Delete {
                stmt: delete.clone(),
                schema: table,
            }
        }
        Statement::CreateTable(create) => {
            validate_create_table(create)?;
            ResolvedStatement::CreateTable(create.clone())
        }
        Statement::AlterTable(alter) => {
            let table = resolve_table(schema, &alter.table).await?;
            ResolvedStatement::AlterTable {
                stmt: alter.clone(),
                schema: table,
            }
        }
        Statement::DropTable(drop) => ResolvedStatement::DropTable(drop.clone()),
        Statement::Explain(inner) => {
            ResolvedStatement::Explain(Box::new(Box::pin(analyze(inner, schema, confirmed)).await?))
        }
        Statement::Analyze(inner) => {
            ResolvedStatement::Analyze(Box::new(Box::pin(analyze(inner, schema, confirmed)).await?))
        }
        Statement::DumpSchema(tables) => {
            let names = if tables.is_empty() {
                schema.list().await.map_err(|e| {
                    SemanticError::new(SemanticErrorKind::UnknownTable, format!("failed to list tables: {}", e))
                })?
            } else {
                tables.clone()
            };
            let mut schemas = Vec::with_capacity(names.len());
            for name in names {
                schemas.push(resolve_table(schema, &name).await?);
            }
            ResolvedStatement::DumpSchema(schemas)
        }
        Statement::Help => ResolvedStatement::Help,
    };
    debug!("semantic analysis resolved statement for table {:?}", stmt.table_name());
    Ok(resolved)
}

fn validate_using_index(table: &TableSchema, using_index: Option<&str>) -> Result<(), SemanticError> {
    if let Some(name) = using_index {
        if table.find_index(name).is_none() {
            return Err(SemanticError::new(
                SemanticErrorKind::AmbiguousIndex,
                format!("table '{}' has no index named '{}'", table.name, name),
            ));
        }
    }
    Ok(())
}

/// Checks every conjunct that touches a key attribute (of the base
/// table or any secondary index) uses an operator that attribute's
/// role supports, and that any compared literal matches the
/// attribute's declared scalar type.
fn validate_filter_key_usage(table: &TableSchema, filter: &Expr) -> Result<(), SemanticError> {
    for conjunct in flatten_conjuncts(filter) {
        walk_key_usage(table, conjunct)?;
    }
    Ok(())
}

fn walk_key_usage(table: &TableSchema, expr: &Expr) -> Result<(), SemanticError> {
    match expr {
        Expr::Compare(op, lhs, rhs) => {
            check_compare(table, *op, lhs)?;
            check_compare(table, *op, rhs)?;
            check_type_match(table, lhs, rhs)?;
        }
        Expr::Between(path, _, _) => check_range_capable(table, path)?,
        Expr::BeginsWith(path, _) => check_range_capable(table, path)?,
        Expr::Not(inner) => walk_key_usage(table, inner)?,
        Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
            walk_key_usage(table, lhs)?;
            walk_key_usage(table, rhs)?;
        }
        _ => {}
    }
    Ok(())
}

fn key_role_of(table: &TableSchema, name: &str) -> Option<crate::schema::KeyRole> {
    use crate::schema::KeyRole;
    if table.hash.name == name {
        return Some(KeyRole::Hash);
    }
    if table.range.as_ref().is_some_and(|r| r.name == name) {
        return Some(KeyRole::Range);
    }
    for idx in table.gsi.iter().chain(table.lsi.iter()) {
        if idx.hash.name == name {
            return Some(KeyRole::Hash);
        }
        if idx.range.as_ref().is_some_and(|r| r.name == name) {
            return Some(KeyRole::Range);
        }
    }
    None
}

fn check_compare(table: &TableSchema, op: CompareOp, operand: &Expr) -> Result<(), SemanticError> {
    let Expr::AttrRef(path) = operand else { return Ok(()) };
    let Some(name) = path.as_simple_name() else { return Ok(()) };
    if let Some(crate::schema::KeyRole::Hash) = key_role_of(table, name) {
        if op != CompareOp::Eq {
            return Err(SemanticError::new(
                SemanticErrorKind::InvalidKeyUsage,
                format!("hash key '{}' only supports equality, found '{}'", name, op.as_ddb_str()),
            ));
        }
    }
    Ok(())
}

fn check_range_capable(table: &TableSchema, path: &Expr) -> Result<(), SemanticError> {
    let Expr::AttrRef(path) = path else { return Ok(()) };
    let Some(name) = path.as_simple_name() else { return Ok(()) };
    if let Some(crate::schema::KeyRole::Hash) = key_role_of(table, name) {
        return Err(SemanticError::new(
            SemanticErrorKind::InvalidKeyUsage,
            format!("hash key '{}' does not support BETWEEN/BEGINS_WITH", name),
        ));
    }
    Ok(())
}

fn check_type_match(table: &TableSchema, lhs: &Expr, rhs: &Expr) -> Result<(), SemanticError> {
    let (path, literal) = match (lhs, rhs) {
        (Expr::AttrRef(p), Expr::Literal(v)) => (p, v),
        (Expr::Literal(v), Expr::AttrRef(p)) => (p, v),
        _ => return Ok(()),
    };
    let Some(name) = path.as_simple_name() else { return Ok(()) };
    let Some(declared) = declared_type(table, name) else { return Ok(()) };
    if literal.scalar_type() != declared {
        return Err(SemanticError::new(
            SemanticErrorKind::TypeMismatch,
            format!(
                "attribute '{}' is declared {} but compared against a {} literal",
                name,
                declared,
                literal.scalar_type()
            ),
        ));
    }
    Ok(())
}

fn declared_type(table: &TableSchema, name: &str) -> Option<ScalarType> {
    if table.hash.name == name {
        return Some(table.hash.scalar_type);
    }
    if let Some(range) = &table.range {
        if range.name == name {
            return Some(range.scalar_type);
        }
    }
    for idx in table.gsi.iter().chain(table.lsi.iter()) {
        if idx.hash.name == name {
            return Some(idx.hash.scalar_type);
        }
        if let Some(range) = &idx.range {
            if range.name == name {
                return Some(range.scalar_type);
            }
        }
    }
    table.declared_type(name)
}

/// A conjunct is "hash-equal on the base table" when it's
/// `Compare(Eq, attr, literal)` (or reversed) and `attr` is the
/// table's own HASH key — a GSI/LSI hash key doesn't count, since an
/// equality on an index still scans/batches across however many items
/// share that index key on the base table. Mutations need confirmation
/// unless they narrow down to (at most) one base-table item directly.
fn has_hash_equality(table: &TableSchema, filter: &Expr) -> bool {
    flatten_conjuncts(filter).into_iter().any(|expr| {
        if let Expr::Compare(CompareOp::Eq, lhs, rhs) = expr {
            let path = match (lhs.as_ref(), rhs.as_ref()) {
                (Expr::AttrRef(p), Expr::Literal(_)) => Some(p),
                (Expr::Literal(_), Expr::AttrRef(p)) => Some(p),
                _ => None,
            };
            if let Some(name) = path.and_then(|p| p.as_simple_name()) {
                return table.hash.name == name;
            }
        }
        false
    })
}

fn validate_mutation_confirmed(table: &TableSchema, filter: Option<&Expr>, confirmed: bool) -> Result<(), SemanticError> {
    let has_key = filter.is_some_and(|f| has_hash_equality(table, f));
    if !has_key && !confirmed {
        return Err(SemanticError::new(
            SemanticErrorKind::MutationWithoutKey,
            "mutation has no hash-key equality in its WHERE clause; add one or confirm a full-table SCAN",
        ));
    }
    Ok(())
}

fn validate_insert(table: &TableSchema, insert: &Insert) -> Result<(), SemanticError> {
    let hash_idx = insert.columns.iter().position(|c| c == &table.hash.name);
    if hash_idx.is_none() {
        return Err(SemanticError::new(
            SemanticErrorKind::InvalidKeyUsage,
            format!("INSERT into '{}' must supply its hash key '{}'", table.name, table.hash.name),
        ));
    }
    let range_idx = table
        .range
        .as_ref()
        .map(|r| (r.name.clone(), insert.columns.iter().position(|c| c == &r.name)));
    if let Some((name, None)) = &range_idx {
        return Err(SemanticError::new(
            SemanticErrorKind::InvalidKeyUsage,
            format!("INSERT into '{}' must supply its range key '{}'", table.name, name),
        ));
    }
    for row in &insert.rows {
        if row.len() != insert.columns.len() {
            return Err(SemanticError::new(
                SemanticErrorKind::TypeMismatch,
                format!("expected {} value(s) per row, found {}", insert.columns.len(), row.len()),
            ));
        }
        if let Some(idx) = hash_idx {
            if row[idx].scalar_type() != table.hash.scalar_type {
                return Err(SemanticError::new(
                    SemanticErrorKind::TypeMismatch,
                    format!("hash key '{}' is declared {} but got {}", table.hash.name, table.hash.scalar_type, row[idx].scalar_type()),
                ));
            }
        }
        if let Some((_, Some(idx))) = &range_idx {
            let range = table.range.as_ref().unwrap();
            if row[*idx].scalar_type() != range.scalar_type {
                return Err(SemanticError::new(
                    SemanticErrorKind::TypeMismatch,
                    format!("range key '{}' is declared {} but got {}", range.name, range.scalar_type, row[*idx].scalar_type()),
                ));
            }
        }
    }
    Ok(())
}

fn validate_create_table(create: &CreateTable) -> Result<(), SemanticError> {
    let hash_count = create.keys.keys.iter().filter(|k| k.role == KeyRole::Hash).count();
    let range_count = create.keys.keys.iter().filter(|k| k.role == KeyRole::Range).count();
    if hash_count != 1 {
        return Err(SemanticError::new(
            SemanticErrorKind::InvalidKeyUsage,
            format!("table '{}' must declare exactly one HASH key, found {}", create.table, hash_count),
        ));
    }
    if range_count > 1 {
        return Err(SemanticError::new(
            SemanticErrorKind::InvalidKeyUsage,
            format!("table '{}' must declare at most one RANGE key, found {}", create.table, range_count),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IndexKind, IndexSchema, KeyAttr, SchemaProvider};
    use crate::value::Value;
    use std::future::Future;
    use std::pin::Pin;

    struct FixedProvider {
        table: TableSchema,
    }

    type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

    impl SchemaProvider for FixedProvider {
        fn describe<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<TableSchema, SchemaError>> {
            let result = if table == self.table.name {
                Ok(self.table.clone())
            } else {
                Err(SchemaError::NotFound(table.to_string()))
            };
            Box::pin(async move { result })
        }
        fn invalidate(&self, _table: &str) {}
        fn list<'a>(&'a self) -> BoxFuture<'a, Result<Vec<String>, SchemaError>> {
            let name = self.table.name.clone();
            Box::pin(async move { Ok(vec![name]) })
        }
    }

    fn fixture() -> FixedProvider {
        FixedProvider {
            table: TableSchema {
                name: "t".to_string(),
                hash: KeyAttr {
                    name: "id".to_string(),
                    scalar_type: ScalarType::S,
                },
                range: Some(KeyAttr {
                    name: "ts".to_string(),
                    scalar_type: ScalarType::N,
                }),
                attributes: Default::default(),
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
            },
        }
    }

    #[tokio::test]
    async fn unknown_table_is_rejected() {
        let provider = fixture();
        let stmt = crate::parser::parse("SELECT * FROM nope WHERE id = 'a'").unwrap();
        let err = analyze(&stmt, &provider, false).await.unwrap_err();
        assert!(matches!(err, DqlError::Semantic(e) if e.kind == SemanticErrorKind::UnknownTable));
    }

    #[tokio::test]
    async fn point_lookup_resolves_cleanly() {
        let provider = fixture();
        let stmt = crate::parser::parse("SELECT * FROM t WHERE id = 'a' AND ts = 1").unwrap();
        let resolved = analyze(&stmt, &provider, false).await.unwrap();
        assert!(matches!(resolved, ResolvedStatement::Select { .. }));
    }

    #[tokio::test]
    async fn hash_key_with_between_is_invalid_key_usage() {
        let provider = fixture();
        let stmt = crate::parser::parse("SELECT * FROM t WHERE id BETWEEN 'a' AND 'b'").unwrap();
        let err = analyze(&stmt, &provider, false).await.unwrap_err();
        assert!(matches!(err, DqlError::Semantic(e) if e.kind == SemanticErrorKind::InvalidKeyUsage));
    }

    #[tokio::test]
    async fn type_mismatch_on_hash_key_literal() {
        let provider = fixture();
        let stmt = crate::parser::parse("SELECT * FROM t WHERE id = 5").unwrap();
        let err = analyze(&stmt, &provider, false).await.unwrap_err();
        assert!(matches!(err, DqlError::Semantic(e) if e.kind == SemanticErrorKind::TypeMismatch));
    }

    #[tokio::test]
    async fn unconfirmed_keyless_delete_is_rejected() {
        let provider = fixture();
        let stmt = crate::parser::parse("DELETE FROM t WHERE user = 'x'").unwrap();
        let err = analyze(&stmt, &provider, false).await.unwrap_err();
        assert!(matches!(err, DqlError::Semantic(e) if e.kind == SemanticErrorKind::MutationWithoutKey));
    }

    #[tokio::test]
    async fn gsi_hash_equality_satisfies_mutation_confirmation() {
        let provider = fixture();
        let stmt = crate::parser::parse("DELETE FROM t WHERE user = 'x'").unwrap();
        let resolved = analyze(&stmt, &provider, true).await.unwrap();
        assert!(matches!(resolved, ResolvedStatement::Delete { .. }));
    }

    #[tokio::test]
    async fn unknown_using_index_is_ambiguous() {
        let provider = fixture();
        let stmt = crate::parser::parse("SELECT * FROM t USING nope WHERE id = 'a'").unwrap();
        let err = analyze(&stmt, &provider, false).await.unwrap_err();
        assert!(matches!(err, DqlError::Semantic(e) if e.kind == SemanticErrorKind::AmbiguousIndex));
    }

    #[test]
    fn insert_requires_hash_and_range_keys() {
        let create_ok = Insert {
            table: "t".to_string(),
            columns: vec!["id".to_string(), "ts".to_string()],
            rows: vec![vec![Value::S("a".to_string()), Value::N("1".to_string())]],
        };
        let table = fixture().table;
        assert!(validate_insert(&table, &create_ok).is_ok());

        let missing_range = Insert {
            table: "t".to_string(),
            columns: vec!["id".to_string()],
            rows: vec![vec![Value::S("a".to_string())]],
        };
        assert!(validate_insert(&table, &missing_range).is_err());
    }
}
