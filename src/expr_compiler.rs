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

//! Lowers [`Expr`] trees and update clauses into DynamoDB wire
//! expression strings plus `#nK`/`:vK` placeholder maps, per §4.4.
//! One [`Compiler`] is used per operation so placeholders stay unique
//! and monotonic within that operation, as the placeholder map
//! invariant requires.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::ast::*;
use crate::plan::ExpressionTriple;
use crate::value::Value;

pub struct Compiler {
    names: HashMap<String, String>,
    values: HashMap<String, Value>,
    next_name: usize,
    next_value: usize,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            names: HashMap::new(),
            values: HashMap::new(),
            next_name: 0,
            next_value: 0,
        }
    }

    fn into_triple(self, expression: String) -> ExpressionTriple {
        ExpressionTriple {
            expression,
            names: self.names,
            values: self.values,
        }
    }

    fn value_placeholder(&mut self, value: Value) -> String {
        let key = format!(":v{}", self.next_value);
        self.next_value += 1;
        self.values.insert(key.clone(), value);
        key
    }

    /// Renders `path`, escaping every segment that's a reserved word
    /// or that the path needs escaped for at all (dotted/indexed),
    /// into a single `#nK` per distinct bare attribute name it touches.
    fn path_expr(&mut self, path: &AttributePath) -> String {
        let mut out = String::new();
        for (i, segment) in path.segments.iter().enumerate() {
            match segment {
                PathSegment::Attr(name) => {
                    if i > 0 {
                        out.push('.');
                    }
                    out.push_str(&self.name_placeholder(name));
                }
                PathSegment::Index(idx) => {
                    let _ = write!(out, "[{}]", idx);
                }
            }
        }
        out
    }

    fn name_placeholder(&mut self, name: &str) -> String {
        if !is_reserved_word(name) {
            return name.to_string();
        }
        if let Some(existing) = self.names.iter().find(|(_, v)| v.as_str() == name) {
            return existing.0.clone();
        }
        let key = format!("#n{}", self.next_name);
        self.next_name += 1;
        self.names.insert(key.clone(), name.to_string());
        key
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(v) => self.value_placeholder(v.clone()),
            Expr::AttrRef(path) => self.path_expr(path),
            Expr::Compare(op, lhs, rhs) => {
                format!("{} {} {}", self.expr(lhs), op.as_ddb_str(), self.expr(rhs))
            }
            Expr::Between(operand, lo, hi) => {
                format!("{} BETWEEN {} AND {}", self.expr(operand), self.expr(lo), self.expr(hi))
            }
            Expr::In(operand, options) => {
                let operand = self.expr(operand);
                let rendered: Vec<String> = options.iter().map(|opt| self.expr(opt)).collect();
                format!("{} IN ({})", operand, rendered.join(", "))
            }
            Expr::Contains(haystack, needle) => {
                format!("contains({}, {})", self.expr(haystack), self.expr(needle))
            }
            Expr::BeginsWith(path, prefix) => {
                format!("begins_with({}, {})", self.expr(path), self.expr(prefix))
            }
            Expr::AttributeExists(path) => format!("attribute_exists({})", self.path_expr(path)),
            Expr::AttributeNotExists(path) => format!("attribute_not_exists({})", self.path_expr(path)),
            Expr::IsNull(path) => format!("attribute_not_exists({})", self.path_expr(path)),
            Expr::IsNotNull(path) => format!("attribute_exists({})", self.path_expr(path)),
            Expr::And(lhs, rhs) => format!("({} AND {})", self.expr(lhs), self.expr(rhs)),
            Expr::Or(lhs, rhs) => format!("({} OR {})", self.expr(lhs), self.expr(rhs)),
            Expr::Not(inner) => format!("(NOT {})", self.expr(inner)),
            Expr::FunctionCall(name, args) => {
                let rendered: Vec<String> = args.iter().map(|arg| self.expr(arg)).collect();
                format!("{}({})", name, rendered.join(", "))
            }
        }
    }

    fn update_operand(&mut self, operand: &UpdateOperand) -> String {
        match operand {
            UpdateOperand::Literal(v) => self.value_placeholder(v.clone()),
            UpdateOperand::Path(path) => self.path_expr(path),
        }
    }

    fn update_rhs(&mut self, rhs: &UpdateRhs) -> String {
        match rhs {
            UpdateRhs::Operand(op) => self.update_operand(op),
            UpdateRhs::Plus(a, b) => format!("{} + {}", self.update_operand(a), self.update_operand(b)),
            UpdateRhs::Minus(a, b) => format!("{} - {}", self.update_operand(a), self.update_operand(b)),
            UpdateRhs::ListAppend(a, b) => {
                format!("list_append({}, {})", self.update_operand(a), self.update_operand(b))
            }
            UpdateRhs::IfNotExists(path, fallback) => {
                format!("if_not_exists({}, {})", self.path_expr(path), self.update_rhs(fallback))
            }
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiles a single filter/condition `Expr` into a standalone
/// expression triple.
pub fn compile_condition(expr: &Expr) -> ExpressionTriple {
    let mut compiler = Compiler::new();
    let rendered = compiler.expr(expr);
    compiler.into_triple(rendered)
}

/// Compiles `path op value` into a `KeyConditionExpression` fragment
/// using a fresh [`Compiler`] (so a `Query`'s key condition and its
/// separate residual filter each get their own placeholder numbering,
/// matching how the planner treats them as independent expressions).
pub fn compile_key_condition(hash: (&AttributePath, &Value), range: Option<(&AttributePath, SortKeyOp, &RangeBound)>) -> ExpressionTriple {
    let mut compiler = Compiler::new();
    let mut expr = format!(
        "{} = {}",
        compiler.path_expr(hash.0),
        compiler.value_placeholder(hash.1.clone())
    );
    if let Some((path, op, bound)) = range {
        let rendered = match (op, bound) {
            (SortKeyOp::Eq, RangeBound::Single(v)) => format!("{} = {}", compiler.path_expr(path), compiler.value_placeholder(v.clone())),
            (SortKeyOp::Lt, RangeBound::Single(v)) => format!("{} < {}", compiler.path_expr(path), compiler.value_placeholder(v.clone())),
            (SortKeyOp::Le, RangeBound::Single(v)) => format!("{} <= {}", compiler.path_expr(path), compiler.value_placeholder(v.clone())),
            (SortKeyOp::Gt, RangeBound::Single(v)) => format!("{} > {}", compiler.path_expr(path), compiler.value_placeholder(v.clone())),
            (SortKeyOp::Ge, RangeBound::Single(v)) => format!("{} >= {}", compiler.path_expr(path), compiler.value_placeholder(v.clone())),
            (_, RangeBound::Between(lo, hi)) => format!(
                "{} BETWEEN {} AND {}",
                compiler.path_expr(path),
                compiler.value_placeholder(lo.clone()),
                compiler.value_placeholder(hi.clone())
            ),
            (_, RangeBound::BeginsWith(prefix)) => {
                format!("begins_with({}, {})", compiler.path_expr(path), compiler.value_placeholder(prefix.clone()))
            }
        };
        let _ = write!(expr, " AND {}", rendered);
    }
    compiler.into_triple(expr)
}

/// The literal bound(s) of a sort-key predicate the planner matched
/// against an access path, ready for [`compile_key_condition`].
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    Single(Value),
    Between(Value, Value),
    BeginsWith(Value),
}

/// Compiles a `ProjectionExpression` listing exactly `attrs`, used for
/// mutation expansion's keys-only read phase.
pub fn compile_projection(attrs: &[String]) -> ExpressionTriple {
    let mut compiler = Compiler::new();
    let rendered: Vec<String> = attrs.iter().map(|a| compiler.name_placeholder(a)).collect();
    compiler.into_triple(rendered.join(", "))
}

/// Compiles `UPDATE` clauses into a single `UpdateExpression`, split
/// into `SET`/`ADD`/`REMOVE`/`DELETE` sub-clauses per §4.4.
pub fn compile_update(clauses: &UpdateClauses) -> ExpressionTriple {
    let mut compiler = Compiler::new();
    let mut parts = Vec::new();

    if !clauses.set.is_empty() {
        let items: Vec<String> = clauses
            .set
            .iter()
            .map(|c| format!("{} = {}", compiler.path_expr(&c.path), compiler.update_rhs(&c.rhs)))
            .collect();
        parts.push(format!("SET {}", items.join(", ")));
    }
    if !clauses.add.is_empty() {
        let items: Vec<String> = clauses
            .add
            .iter()
            .map(|c| format!("{} {}", compiler.path_expr(&c.path), compiler.value_placeholder(c.value.clone())))
            .collect();
        parts.push(format!("ADD {}", items.join(", ")));
    }
    if !clauses.remove.is_empty() {
        let items: Vec<String> = clauses.remove.iter().map(|c| compiler.path_expr(&c.path)).collect();
        parts.push(format!("REMOVE {}", items.join(", ")));
    }
    if !clauses.delete.is_empty() {
        let items: Vec<String> = clauses
            .delete
            .iter()
            .map(|c| format!("{} {}", compiler.path_expr(&c.path), compiler.value_placeholder(c.value.clone())))
            .collect();
        parts.push(format!("DELETE {}", items.join(", ")));
    }

    compiler.into_triple(parts.join(" "))
}
