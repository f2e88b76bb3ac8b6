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

//! The AST, per §3. Statement variants are a sum type (`Statement`)
//! rather than a class hierarchy — the planner and analyzer match on
//! it exhaustively instead of dispatching through virtual methods.

use crate::value::{ScalarType, Value};

/// A dotted attribute path with optional `[index]` list addressing,
/// e.g. `a.b[0].c`. Reserved-word/`.`/`[`-bearing segments are escaped
/// into `#nK` placeholders by the expression compiler, never here.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Attr(String),
    Index(u32),
}

impl AttributePath {
    pub fn simple(name: impl Into<String>) -> Self {
        AttributePath {
            segments: vec![PathSegment::Attr(name.into())],
        }
    }

    /// The leading attribute name, e.g. `a` in `a.b[0]`. Every path
    /// starts with an attribute segment, never an index.
    pub fn root(&self) -> &str {
        match self.segments.first() {
            Some(PathSegment::Attr(name)) => name.as_str(),
            _ => "",
        }
    }

    /// True when this path is exactly a single bare attribute name,
    /// which is what the planner needs to match against a key schema.
    pub fn as_simple_name(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [PathSegment::Attr(name)] => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn needs_escaping(&self) -> bool {
        self.segments.len() > 1 || is_reserved_word(self.root())
    }
}

/// DynamoDB reserves several hundred words in expressions; this is the
/// subset that shows up in realistic schemas and statement text, which
/// is what actually governs whether a name must be lowered to `#nK`.
pub fn is_reserved_word(word: &str) -> bool {
    const RESERVED: &[&str] = &[
        "name", "status", "type", "size", "date", "year", "month", "day", "time", "data", "value",
        "values", "count", "index", "key", "keys", "order", "group", "table", "timestamp",
        "region", "token", "role", "level", "view", "source", "target", "comment", "language",
        "number", "string", "list", "map", "set", "bucket", "location", "owner", "user", "users",
    ];
    RESERVED.contains(&word.to_ascii_lowercase().as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_ddb_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A comparison operator usable on a sort key in a `KeyConditionExpression`,
/// per the planner's access-path rules in §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKeyOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl SortKeyOp {
    pub fn from_compare(op: CompareOp) -> Option<SortKeyOp> {
        match op {
            CompareOp::Eq => Some(SortKeyOp::Eq),
            CompareOp::Lt => Some(SortKeyOp::Lt),
            CompareOp::Le => Some(SortKeyOp::Le),
            CompareOp::Gt => Some(SortKeyOp::Gt),
            CompareOp::Ge => Some(SortKeyOp::Ge),
            CompareOp::Ne => None,
        }
    }
}

/// Recursive WHERE/FILTER expression tree, per §3.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    AttrRef(AttributePath),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Between(Box<Expr>, Box<Expr>, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
    Contains(Box<Expr>, Box<Expr>),
    BeginsWith(Box<Expr>, Box<Expr>),
    AttributeExists(AttributePath),
    AttributeNotExists(AttributePath),
    IsNull(AttributePath),
    IsNotNull(AttributePath),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    FunctionCall(String, Vec<Expr>),
}

impl Expr {
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }
}

/// Flattens a conjunction (`a AND b AND c`) into its leaf conjuncts, so
/// the planner can test "is there an equality on the HASH key" without
/// itself recursing through `And` nodes everywhere.
pub fn flatten_conjuncts(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::And(lhs, rhs) => {
            let mut out = flatten_conjuncts(lhs);
            out.extend(flatten_conjuncts(rhs));
            out
        }
        other => vec![other],
    }
}

/// One `SET path = rhs` clause inside an `UPDATE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    pub path: AttributePath,
    pub rhs: UpdateRhs,
}

/// The right-hand side of a `SET` assignment: a literal/path operand,
/// or an arithmetic/function expression per §3's `ArithUpdate`.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateRhs {
    Operand(UpdateOperand),
    Plus(UpdateOperand, UpdateOperand),
    Minus(UpdateOperand, UpdateOperand),
    ListAppend(UpdateOperand, UpdateOperand),
    IfNotExists(AttributePath, Box<UpdateRhs>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOperand {
    Literal(Value),
    Path(AttributePath),
}

/// One `ADD path amount` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct AddClause {
    pub path: AttributePath,
    pub value: Value,
}

/// One `REMOVE path` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveClause {
    pub path: AttributePath,
}

/// One `DELETE path value` clause (removing elements from a set).
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteClause {
    pub path: AttributePath,
    pub value: Value,
}

/// The combined update clauses carried by an `UPDATE` statement; at
/// least one list is non-empty, enforced by the parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateClauses {
    pub set: Vec<SetClause>,
    pub add: Vec<AddClause>,
    pub remove: Vec<RemoveClause>,
    pub delete: Vec<DeleteClause>,
}

impl UpdateClauses {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.add.is_empty() && self.remove.is_empty() && self.delete.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnValues {
    None,
    AllNew,
    AllOld,
    UpdatedNew,
    UpdatedOld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectList {
    Star,
    CountStar,
    Attrs,
}

/// `SELECT ... FROM table [USING idx] [WHERE ...] [ORDER BY ...] [LIMIT n] [CONSISTENT READ]`
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub select: SelectList,
    pub attributes: Vec<AttributePath>,
    pub table: String,
    pub using_index: Option<String>,
    pub filter: Option<Expr>,
    pub order_by: Option<(String, SortDirection)>,
    pub limit: Option<u32>,
    pub consistent_read: bool,
}

/// `SCAN * FROM table [FILTER ...] [LIMIT n] [THREADS n]`
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    pub attributes: Vec<AttributePath>,
    pub table: String,
    pub using_index: Option<String>,
    pub filter: Option<Expr>,
    pub limit: Option<u32>,
    pub threads: Option<u32>,
    pub consistent_read: bool,
}

/// `INSERT INTO table (cols) VALUES (tuple), (tuple), ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// `UPDATE table (SET ... | ADD ... | REMOVE ... | DELETE ...)+ [WHERE ...] [RETURNS ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub clauses: UpdateClauses,
    pub filter: Option<Expr>,
    pub returns: ReturnValues,
    /// Set when the statement text contained the `SCAN` keyword before
    /// the filter, satisfying the confirmation requirement of §4.4/§7
    /// for mutations that would otherwise require a full table scan.
    pub confirmed_scan: bool,
}

/// `DELETE FROM table [WHERE ...] [RETURNS ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    pub filter: Option<Expr>,
    pub returns: ReturnValues,
    pub confirmed_scan: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Hash,
    Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyAttrDecl {
    pub name: String,
    pub role: KeyRole,
    pub scalar_type: ScalarType,
}

/// Ordered pairs of `(attr, HASH|RANGE, scalar-type)`, per §3.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeySchemaDecl {
    pub keys: Vec<KeyAttrDecl>,
}

impl KeySchemaDecl {
    pub fn hash(&self) -> Option<&KeyAttrDecl> {
        self.keys.iter().find(|k| k.role == KeyRole::Hash)
    }

    pub fn range(&self) -> Option<&KeyAttrDecl> {
        self.keys.iter().find(|k| k.role == KeyRole::Range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throughput {
    Provisioned { read: u32, write: u32 },
    PayPerRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Local,
    Global,
}

/// `{name, kind ∈ {LOCAL, GLOBAL}, hash_attr, range_attr?, projection, throughput?}`, per §3.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDecl {
    pub name: String,
    pub kind: IndexKind,
    pub hash_attr: String,
    pub range_attr: Option<String>,
    pub projection: Projection,
    pub throughput: Option<Throughput>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    KeysOnly,
    Include(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDecl {
    pub name: String,
    pub scalar_type: ScalarType,
}

/// `CREATE TABLE [IF NOT EXISTS] name (attr_decl, ..., [THROUGHPUT (r,w)], [index_decl]*)`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: String,
    pub if_not_exists: bool,
    pub attributes: Vec<AttributeDecl>,
    pub keys: KeySchemaDecl,
    pub throughput: Option<Throughput>,
    pub gsi: Vec<IndexDecl>,
    pub lsi: Vec<IndexDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterAction {
    SetThroughput(Throughput),
    SetIndexThroughput { index: String, throughput: Throughput },
    DropIndex { index: String },
    CreateIndex(IndexDecl),
}

/// `ALTER TABLE name (SET THROUGHPUT (r,w) | SET INDEX idx THROUGHPUT (r,w) | DROP INDEX idx | CREATE INDEX ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    pub table: String,
    pub action: AlterAction,
}

/// `DROP TABLE [IF EXISTS] name`
#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    pub table: String,
    pub if_exists: bool,
}

/// The AST root: one statement variant per §3's sum type.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Scan(Scan),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    CreateTable(CreateTable),
    AlterTable(AlterTable),
    DropTable(DropTable),
    Explain(Box<Statement>),
    Analyze(Box<Statement>),
    DumpSchema(Vec<String>),
    Help,
}

impl Statement {
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Statement::Select(s) => Some(&s.table),
            Statement::Scan(s) => Some(&s.table),
            Statement::Insert(s) => Some(&s.table),
            Statement::Update(s) => Some(&s.table),
            Statement::Delete(s) => Some(&s.table),
            Statement::CreateTable(s) => Some(&s.table),
            Statement::AlterTable(s) => Some(&s.table),
            Statement::DropTable(s) => Some(&s.table),
            Statement::Explain(inner) | Statement::Analyze(inner) => inner.table_name(),
            Statement::DumpSchema(_) | Statement::Help => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_path_round_trips_root_name() {
        let path = AttributePath::simple("id");
        assert_eq!(path.root(), "id");
        assert_eq!(path.as_simple_name(), Some("id"));
        assert!(!path.needs_escaping());
    }

    #[test]
    fn dotted_path_is_not_simple_and_needs_escaping() {
        let path = AttributePath {
            segments: vec![
                PathSegment::Attr("a".to_string()),
                PathSegment::Index(0),
                PathSegment::Attr("b".to_string()),
            ],
        };
        assert_eq!(path.as_simple_name(), None);
        assert!(path.needs_escaping());
    }

    #[test]
    fn reserved_word_root_needs_escaping_even_if_simple() {
        let path = AttributePath::simple("Status");
        assert!(path.needs_escaping());
    }

    #[test]
    fn flatten_conjuncts_walks_nested_and() {
        let expr = Expr::Literal(Value::Bool(true))
            .and(Expr::Literal(Value::Bool(false)))
            .and(Expr::Literal(Value::Null));
        assert_eq!(flatten_conjuncts(&expr).len(), 3);
    }

    #[test]
    fn sort_key_op_rejects_not_equal() {
        assert_eq!(SortKeyOp::from_compare(CompareOp::Ne), None);
        assert_eq!(SortKeyOp::from_compare(CompareOp::Gt), Some(SortKeyOp::Gt));
    }
}
