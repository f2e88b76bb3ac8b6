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

//! Recursive-descent parser, per §4.2. Consumes the token stream
//! produced by [`crate::token::Lexer`] and yields a [`Statement`].
//!
//! List/map/set literal syntax is deliberately narrow: `[a, b, c]` is
//! the only bracketed literal the grammar accepts, because the lexer
//! has no tokens for `{`, `}`, or the `<<...>>` set delimiters.
//! `Value::M`/`Value::Ss`/`Value::Ns`/`Value::Bs` remain constructible
//! from decoded `AttributeValue`s coming back from DynamoDB; they are
//! simply not literal syntax a statement can write directly.

use base64::{engine::general_purpose, Engine as _};
use log::debug;

use crate::ast::*;
use crate::error::{describe_kind, DqlError, ParseError};
use crate::token::{Lexer, Token, TokenKind};
use crate::value::{ScalarType, Value};

/// Tokenizes and parses a single statement, failing if anything but an
/// optional trailing `;` and end-of-input follows it.
pub fn parse(src: &str) -> Result<Statement, DqlError> {
    let tokens = Lexer::tokenize(src)?;
    let mut parser = Parser::new(&tokens);
    let stmt = parser.statement()?;
    parser.finish_single()?;
    Ok(stmt)
}

/// Tokenizes and parses `;`-separated statements for batch mode.
pub fn parse_many(src: &str) -> Result<Vec<Statement>, DqlError> {
    let tokens = Lexer::tokenize(src)?;
    let mut parser = Parser::new(&tokens);
    let mut statements = Vec::new();
    while !parser.is_eof() {
        statements.push(parser.statement()?);
        if parser.check_punct(";") {
            parser.advance();
        } else if !parser.is_eof() {
            return Err(parser
                .error("';' or end of input", parser.peek().clone())
                .into());
        }
    }
    Ok(statements)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn is_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check_keyword(&self, kw: &str) -> bool {
        self.peek().kind == TokenKind::Keyword && self.peek().lexeme.eq_ignore_ascii_case(kw)
    }

    fn check_punct(&self, p: &str) -> bool {
        self.peek().kind == TokenKind::Punctuation && self.peek().lexeme == p
    }

    fn check_operator(&self, op: &str) -> bool {
        self.peek().kind == TokenKind::Operator && self.peek().lexeme == op
    }

    fn check_identifier_word(&self, word: &str) -> bool {
        self.peek().kind == TokenKind::Identifier && self.peek().lexeme.eq_ignore_ascii_case(word)
    }

    fn error(&self, expected: &str, found: Token) -> ParseError {
        ParseError {
            offset: found.offset,
            expected: expected.to_string(),
            found: if found.kind == TokenKind::Eof {
                describe_kind(found.kind).to_string()
            } else {
                format!("{} '{}'", describe_kind(found.kind), found.lexeme)
            },
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> Result<Token, ParseError> {
        if self.check_keyword(kw) {
            Ok(self.advance())
        } else {
            Err(self.error(&format!("'{}'", kw.to_ascii_uppercase()), self.peek().clone()))
        }
    }

    fn eat_punct(&mut self, p: &str) -> Result<Token, ParseError> {
        if self.check_punct(p) {
            Ok(self.advance())
        } else {
            Err(self.error(&format!("'{}'", p), self.peek().clone()))
        }
    }

    fn eat_operator(&mut self, op: &str) -> Result<Token, ParseError> {
        if self.check_operator(op) {
            Ok(self.advance())
        } else {
            Err(self.error(&format!("'{}'", op), self.peek().clone()))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if self.peek().kind == TokenKind::Identifier {
            Ok(self.advance().lexeme)
        } else {
            Err(self.error("identifier", self.peek().clone()))
        }
    }

    fn expect_u32(&mut self) -> Result<u32, ParseError> {
        if self.peek().kind != TokenKind::Number {
            return Err(self.error("integer literal", self.peek().clone()));
        }
        let tok = self.advance();
        tok.lexeme.parse::<u32>().map_err(|_| ParseError {
            offset: tok.offset,
            expected: "non-negative integer literal".to_string(),
            found: tok.lexeme.clone(),
        })
    }

    fn finish_single(&mut self) -> Result<(), ParseError> {
        if self.check_punct(";") {
            self.advance();
        }
        if self.is_eof() {
            Ok(())
        } else {
            Err(self.error("end of input", self.peek().clone()))
        }
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let stmt = match self.peek().lexeme.to_ascii_lowercase().as_str() {
            "select" => Statement::Select(self.select_stmt()?),
            "scan" => Statement::Scan(self.scan_stmt()?),
            "insert" => Statement::Insert(self.insert_stmt()?),
            "update" => Statement::Update(self.update_stmt()?),
            "delete" => Statement::Delete(self.delete_stmt()?),
            "create" => Statement::CreateTable(self.create_table_stmt()?),
            "alter" => Statement::AlterTable(self.alter_table_stmt()?),
            "drop" => Statement::DropTable(self.drop_table_stmt()?),
            "explain" => {
                self.advance();
                Statement::Explain(Box::new(self.statement()?))
            }
            "analyze" => {
                self.advance();
                Statement::Analyze(Box::new(self.statement()?))
            }
            "dump" => {
                self.advance();
                self.eat_keyword("schema")?;
                let mut tables = Vec::new();
                if self.peek().kind == TokenKind::Identifier {
                    tables.push(self.expect_identifier()?);
                    while self.check_punct(",") {
                        self.advance();
                        tables.push(self.expect_identifier()?);
                    }
                }
                Statement::DumpSchema(tables)
            }
            "help" => {
                self.advance();
                Statement::Help
            }
            _ => {
                return Err(self.error(
                    "SELECT, SCAN, INSERT, UPDATE, DELETE, CREATE, ALTER, DROP, EXPLAIN, ANALYZE, DUMP, or HELP",
                    self.peek().clone(),
                ))
            }
        };
        debug!("parsed statement for table {:?}", stmt.table_name());
        Ok(stmt)
    }

    // ---- SELECT / SCAN -----------------------------------------------

    fn select_stmt(&mut self) -> Result<Select, ParseError> {
        self.eat_keyword("select")?;
        let (select, attributes) = self.select_list()?;
        self.eat_keyword("from")?;
        let table = self.expect_identifier()?;
        let using_index = self.using_clause()?;
        let filter = self.where_clause()?;
        let order_by = self.order_by_clause()?;
        let limit = self.limit_clause()?;
        let consistent_read = self.consistent_read_clause()?;
        Ok(Select {
            select,
            attributes,
            table,
            using_index,
            filter,
            order_by,
            limit,
            consistent_read,
        })
    }

    fn select_list(&mut self) -> Result<(SelectList, Vec<AttributePath>), ParseError> {
        if self.check_punct("*") {
            self.advance();
            return Ok((SelectList::Star, vec![]));
        }
        if self.check_keyword("count") {
            self.advance();
            self.eat_punct("(")?;
            self.eat_punct("*")?;
            self.eat_punct(")")?;
            return Ok((SelectList::CountStar, vec![]));
        }
        Ok((SelectList::Attrs, self.attribute_path_list()?))
    }

    fn attribute_path_list(&mut self) -> Result<Vec<AttributePath>, ParseError> {
        let mut attrs = vec![self.attribute_path()?];
        while self.check_punct(",") {
            self.advance();
            attrs.push(self.attribute_path()?);
        }
        Ok(attrs)
    }

    fn scan_stmt(&mut self) -> Result<Scan, ParseError> {
        self.eat_keyword("scan")?;
        let attributes = if self.check_punct("*") {
            self.advance();
            vec![]
        } else {
            self.attribute_path_list()?
        };
        self.eat_keyword("from")?;
        let table = self.expect_identifier()?;
        let using_index = self.using_clause()?;
        let filter = if self.check_keyword("filter") {
            self.advance();
            Some(self.expr()?)
        } else {
            None
        };
        let limit = self.limit_clause()?;
        let threads = if self.check_keyword("threads") {
            self.advance();
            Some(self.expect_u32()?)
        } else {
            None
        };
        let consistent_read = self.consistent_read_clause()?;
        Ok(Scan {
            attributes,
            table,
            using_index,
            filter,
            limit,
            threads,
            consistent_read,
        })
    }

    fn using_clause(&mut self) -> Result<Option<String>, ParseError> {
        if self.check_keyword("using") {
            self.advance();
            Ok(Some(self.expect_identifier()?))
        } else {
            Ok(None)
        }
    }

    fn where_clause(&mut self) -> Result<Option<Expr>, ParseError> {
        if self.check_keyword("where") {
            self.advance();
            Ok(Some(self.expr()?))
        } else {
            Ok(None)
        }
    }

    fn order_by_clause(&mut self) -> Result<Option<(String, SortDirection)>, ParseError> {
        if !self.check_keyword("order") {
            return Ok(None);
        }
        self.advance();
        self.eat_keyword("by")?;
        let attr = self.expect_identifier()?;
        let direction = if self.check_keyword("desc") {
            self.advance();
            SortDirection::Desc
        } else if self.check_keyword("asc") {
            self.advance();
            SortDirection::Asc
        } else {
            SortDirection::Asc
        };
        Ok(Some((attr, direction)))
    }

    fn limit_clause(&mut self) -> Result<Option<u32>, ParseError> {
        if self.check_keyword("limit") {
            self.advance();
            Ok(Some(self.expect_u32()?))
        } else {
            Ok(None)
        }
    }

    fn consistent_read_clause(&mut self) -> Result<bool, ParseError> {
        if self.check_keyword("consistent") {
            self.advance();
            self.eat_keyword("read")?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // ---- INSERT --------------------------------------------------------

    fn insert_stmt(&mut self) -> Result<Insert, ParseError> {
        self.eat_keyword("insert")?;
        self.eat_keyword("into")?;
        let table = self.expect_identifier()?;
        self.eat_punct("(")?;
        let mut columns = vec![self.expect_identifier()?];
        while self.check_punct(",") {
            self.advance();
            columns.push(self.expect_identifier()?);
        }
        self.eat_punct(")")?;
        self.eat_keyword("values")?;
        let mut rows = vec![self.value_tuple()?];
        while self.check_punct(",") {
            self.advance();
            rows.push(self.value_tuple()?);
        }
        Ok(Insert { table, columns, rows })
    }

    fn value_tuple(&mut self) -> Result<Vec<Value>, ParseError> {
        self.eat_punct("(")?;
        let mut values = vec![self.value_literal()?];
        while self.check_punct(",") {
            self.advance();
            values.push(self.value_literal()?);
        }
        self.eat_punct(")")?;
        Ok(values)
    }

    fn value_literal(&mut self) -> Result<Value, ParseError> {
        if self.check_operator("-") && self.peek_at(1).kind == TokenKind::Number {
            self.advance();
            let num = self.advance();
            return Ok(Value::N(format!("-{}", num.lexeme)));
        }
        match self.peek().kind {
            TokenKind::String => Ok(Value::S(self.advance().lexeme)),
            TokenKind::Number => Ok(Value::N(self.advance().lexeme)),
            TokenKind::Bool => Ok(Value::Bool(self.advance().lexeme.eq_ignore_ascii_case("true"))),
            TokenKind::Binary => {
                let tok = self.advance();
                let bytes = general_purpose::STANDARD.decode(&tok.lexeme).map_err(|e| ParseError {
                    offset: tok.offset,
                    expected: "valid base64 text".to_string(),
                    found: e.to_string(),
                })?;
                Ok(Value::B(bytes))
            }
            TokenKind::Keyword if self.check_keyword("null") => {
                self.advance();
                Ok(Value::Null)
            }
            TokenKind::Punctuation if self.check_punct("[") => {
                self.advance();
                let mut items = Vec::new();
                if !self.check_punct("]") {
                    items.push(self.value_literal()?);
                    while self.check_punct(",") {
                        self.advance();
                        items.push(self.value_literal()?);
                    }
                }
                self.eat_punct("]")?;
                Ok(Value::L(items))
            }
            _ => Err(self.error("a value literal", self.peek().clone())),
        }
    }

    // ---- attribute paths -------------------------------------------------

    fn attribute_path(&mut self) -> Result<AttributePath, ParseError> {
        let name = self.expect_identifier()?;
        let mut segments = vec![PathSegment::Attr(name)];
        loop {
            if self.check_punct(".") {
                self.advance();
                segments.push(PathSegment::Attr(self.expect_identifier()?));
            } else if self.check_punct("[") {
                self.advance();
                let idx = self.expect_u32()?;
                self.eat_punct("]")?;
                segments.push(PathSegment::Index(idx));
            } else {
                break;
            }
        }
        Ok(AttributePath { segments })
    }

    fn expr_to_path(&self, expr: Expr, offset: usize) -> Result<AttributePath, ParseError> {
        match expr {
            Expr::AttrRef(path) => Ok(path),
            _ => Err(ParseError {
                offset,
                expected: "an attribute path".to_string(),
                found: "a literal or compound expression".to_string(),
            }),
        }
    }

    // ---- WHERE/FILTER expressions -----------------------------------------

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.check_keyword("or") {
            self.advance();
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.not_expr()?;
        while self.check_keyword("and") {
            self.advance();
            let rhs = self.not_expr()?;
            lhs = lhs.and(rhs);
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.check_keyword("not") {
            self.advance();
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.predicate()
    }

    fn predicate(&mut self) -> Result<Expr, ParseError> {
        if self.check_punct("(") {
            self.advance();
            let inner = self.expr()?;
            self.eat_punct(")")?;
            return Ok(inner);
        }
        if self.check_keyword("contains") {
            self.advance();
            self.eat_punct("(")?;
            let haystack = self.expr_operand()?;
            self.eat_punct(",")?;
            let needle = self.expr_operand()?;
            self.eat_punct(")")?;
            return Ok(Expr::Contains(Box::new(haystack), Box::new(needle)));
        }
        if self.check_keyword("begins_with") {
            self.advance();
            self.eat_punct("(")?;
            let path = self.expr_operand()?;
            self.eat_punct(",")?;
            let prefix = self.expr_operand()?;
            self.eat_punct(")")?;
            return Ok(Expr::BeginsWith(Box::new(path), Box::new(prefix)));
        }
        if self.check_keyword("attribute_exists") {
            self.advance();
            self.eat_punct("(")?;
            let path = self.attribute_path()?;
            self.eat_punct(")")?;
            return Ok(Expr::AttributeExists(path));
        }
        if self.check_keyword("attribute_not_exists") {
            self.advance();
            self.eat_punct("(")?;
            let path = self.attribute_path()?;
            self.eat_punct(")")?;
            return Ok(Expr::AttributeNotExists(path));
        }

        let offset = self.peek().offset;
        let lhs = self.expr_operand()?;

        if self.check_keyword("between") {
            self.advance();
            let lo = self.expr_operand()?;
            self.eat_keyword("and")?;
            let hi = self.expr_operand()?;
            return Ok(Expr::Between(Box::new(lhs), Box::new(lo), Box::new(hi)));
        }
        if self.check_keyword("in") {
            self.advance();
            self.eat_punct("(")?;
            let mut items = vec![self.expr_operand()?];
            while self.check_punct(",") {
                self.advance();
                items.push(self.expr_operand()?);
            }
            self.eat_punct(")")?;
            return Ok(Expr::In(Box::new(lhs), items));
        }
        if self.check_keyword("is") {
            self.advance();
            let negated = if self.check_keyword("not") {
                self.advance();
                true
            } else {
                false
            };
            self.eat_keyword("null")?;
            let path = self.expr_to_path(lhs, offset)?;
            return Ok(if negated {
                Expr::IsNotNull(path)
            } else {
                Expr::IsNull(path)
            });
        }
        if let Some(op) = self.compare_op() {
            self.advance();
            let rhs = self.expr_operand()?;
            return Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)));
        }

        Err(self.error(
            "a comparison operator, BETWEEN, IN, or IS [NOT] NULL",
            self.peek().clone(),
        ))
    }

    fn compare_op(&self) -> Option<CompareOp> {
        if self.peek().kind != TokenKind::Operator {
            return None;
        }
        match self.peek().lexeme.as_str() {
            "=" => Some(CompareOp::Eq),
            "<>" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    /// An operand inside a WHERE/FILTER predicate: an attribute path, a
    /// literal value, or a function call (`size(path)`, `contains` and
    /// `begins_with` have dedicated `Expr` variants and are handled in
    /// [`Self::predicate`] before this is reached for the outer form,
    /// but can still appear nested as an argument here).
    fn expr_operand(&mut self) -> Result<Expr, ParseError> {
        if self.peek().kind == TokenKind::Identifier && self.peek_at(1).kind == TokenKind::Punctuation && self.peek_at(1).lexeme == "(" {
            let name = self.advance().lexeme;
            self.eat_punct("(")?;
            let mut args = Vec::new();
            if !self.check_punct(")") {
                args.push(self.expr_operand()?);
                while self.check_punct(",") {
                    self.advance();
                    args.push(self.expr_operand()?);
                }
            }
            self.eat_punct(")")?;
            return Ok(Expr::FunctionCall(name, args));
        }
        if self.peek().kind == TokenKind::Identifier {
            return Ok(Expr::AttrRef(self.attribute_path()?));
        }
        Ok(Expr::Literal(self.value_literal()?))
    }

    // ---- UPDATE / DELETE -----------------------------------------------

    fn update_stmt(&mut self) -> Result<Update, ParseError> {
        self.eat_keyword("update")?;
        let table = self.expect_identifier()?;
        let confirmed_scan = if self.check_keyword("scan") {
            self.advance();
            true
        } else {
            false
        };
        let mut clauses = UpdateClauses::default();
        loop {
            if self.check_keyword("set") {
                self.advance();
                clauses.set.extend(self.set_items()?);
            } else if self.check_keyword("add") {
                self.advance();
                clauses.add.extend(self.add_items()?);
            } else if self.check_keyword("remove") {
                self.advance();
                clauses.remove.extend(self.remove_items()?);
            } else if self.check_keyword("delete") {
                self.advance();
                clauses.delete.extend(self.delete_items()?);
            } else {
                break;
            }
        }
        if clauses.is_empty() {
            return Err(self.error("SET, ADD, REMOVE, or DELETE", self.peek().clone()));
        }
        let filter = self.where_clause()?;
        let returns = self.returns_clause()?;
        Ok(Update {
            table,
            clauses,
            filter,
            returns,
            confirmed_scan,
        })
    }

    fn delete_stmt(&mut self) -> Result<Delete, ParseError> {
        self.eat_keyword("delete")?;
        self.eat_keyword("from")?;
        let table = self.expect_identifier()?;
        let confirmed_scan = if self.check_keyword("scan") {
            self.advance();
            true
        } else {
            false
        };
        let filter = self.where_clause()?;
        let returns = self.returns_clause()?;
        Ok(Delete {
            table,
            filter,
            returns,
            confirmed_scan,
        })
    }

    fn returns_clause(&mut self) -> Result<ReturnValues, ParseError> {
        if !self.check_keyword("returns") {
            return Ok(ReturnValues::None);
        }
        self.advance();
        let tok = self.peek().clone();
        let rv = match tok.lexeme.to_ascii_lowercase().as_str() {
            "none" => ReturnValues::None,
            "all_new" => ReturnValues::AllNew,
            "all_old" => ReturnValues::AllOld,
            "updated_new" => ReturnValues::UpdatedNew,
            "updated_old" => ReturnValues::UpdatedOld,
            _ => {
                return Err(self.error(
                    "NONE, ALL_NEW, ALL_OLD, UPDATED_NEW, or UPDATED_OLD",
                    tok,
                ))
            }
        };
        self.advance();
        Ok(rv)
    }

    fn set_items(&mut self) -> Result<Vec<SetClause>, ParseError> {
        let mut items = vec![self.set_item()?];
        while self.check_punct(",") {
            self.advance();
            items.push(self.set_item()?);
        }
        Ok(items)
    }

    fn set_item(&mut self) -> Result<SetClause, ParseError> {
        let path = self.attribute_path()?;
        self.eat_operator("=")?;
        let rhs = self.update_rhs()?;
        Ok(SetClause { path, rhs })
    }

    fn update_rhs(&mut self) -> Result<UpdateRhs, ParseError> {
        if self.check_identifier_word("if_not_exists") && self.peek_at(1).lexeme == "(" {
            self.advance();
            self.eat_punct("(")?;
            let path = self.attribute_path()?;
            self.eat_punct(",")?;
            let fallback = self.update_rhs()?;
            self.eat_punct(")")?;
            return Ok(UpdateRhs::IfNotExists(path, Box::new(fallback)));
        }
        if self.check_identifier_word("list_append") && self.peek_at(1).lexeme == "(" {
            self.advance();
            self.eat_punct("(")?;
            let a = self.update_operand()?;
            self.eat_punct(",")?;
            let b = self.update_operand()?;
            self.eat_punct(")")?;
            return Ok(UpdateRhs::ListAppend(a, b));
        }
        let lhs = self.update_operand()?;
        if self.check_operator("+") {
            self.advance();
            let rhs = self.update_operand()?;
            return Ok(UpdateRhs::Plus(lhs, rhs));
        }
        if self.check_operator("-") {
            self.advance();
            let rhs = self.update_operand()?;
            return Ok(UpdateRhs::Minus(lhs, rhs));
        }
        Ok(UpdateRhs::Operand(lhs))
    }

    fn update_operand(&mut self) -> Result<UpdateOperand, ParseError> {
        if self.peek().kind == TokenKind::Identifier {
            Ok(UpdateOperand::Path(self.attribute_path()?))
        } else {
            Ok(UpdateOperand::Literal(self.value_literal()?))
        }
    }

    fn add_items(&mut self) -> Result<Vec<AddClause>, ParseError> {
        let mut items = vec![self.add_item()?];
        while self.check_punct(",") {
            self.advance();
            items.push(self.add_item()?);
        }
        Ok(items)
    }

    fn add_item(&mut self) -> Result<AddClause, ParseError> {
        let path = self.attribute_path()?;
        let value = self.value_literal()?;
        Ok(AddClause { path, value })
    }

    fn remove_items(&mut self) -> Result<Vec<RemoveClause>, ParseError> {
        let mut items = vec![RemoveClause {
            path: self.attribute_path()?,
        }];
        while self.check_punct(",") {
            self.advance();
            items.push(RemoveClause {
                path: self.attribute_path()?,
            });
        }
        Ok(items)
    }

    fn delete_items(&mut self) -> Result<Vec<DeleteClause>, ParseError> {
        let mut items = vec![self.delete_item()?];
        while self.check_punct(",") {
            self.advance();
            items.push(self.delete_item()?);
        }
        Ok(items)
    }

    fn delete_item(&mut self) -> Result<DeleteClause, ParseError> {
        let path = self.attribute_path()?;
        let value = self.value_literal()?;
        Ok(DeleteClause { path, value })
    }

    // ---- DDL -------------------------------------------------------------

    fn scalar_type(&mut self) -> Result<ScalarType, ParseError> {
        let tok = self.peek().clone();
        let t = match tok.lexeme.to_ascii_lowercase().as_str() {
            "string" => {
                self.advance();
                if self.check_keyword("set") {
                    self.advance();
                    ScalarType::Ss
                } else {
                    ScalarType::S
                }
            }
            "number" => {
                self.advance();
                if self.check_keyword("set") {
                    self.advance();
                    ScalarType::Ns
                } else {
                    ScalarType::N
                }
            }
            "binary" => {
                self.advance();
                if self.check_keyword("set") {
                    self.advance();
                    ScalarType::Bs
                } else {
                    ScalarType::B
                }
            }
            "bool" => {
                self.advance();
                ScalarType::Bool
            }
            "null" => {
                self.advance();
                ScalarType::Null
            }
            "list" => {
                self.advance();
                ScalarType::L
            }
            "map" => {
                self.advance();
                ScalarType::M
            }
            _ => return Err(self.error("an attribute type", tok)),
        };
        Ok(t)
    }

    fn throughput(&mut self) -> Result<Throughput, ParseError> {
        if self.check_keyword("pay_per_request") {
            self.advance();
            return Ok(Throughput::PayPerRequest);
        }
        self.eat_punct("(")?;
        let read = self.expect_u32()?;
        self.eat_punct(",")?;
        let write = self.expect_u32()?;
        self.eat_punct(")")?;
        Ok(Throughput::Provisioned { read, write })
    }

    fn projection(&mut self) -> Result<Projection, ParseError> {
        if self.check_keyword("all") {
            self.advance();
            return Ok(Projection::All);
        }
        if self.check_keyword("keys_only") {
            self.advance();
            return Ok(Projection::KeysOnly);
        }
        if self.check_keyword("include") {
            self.advance();
            self.eat_punct("(")?;
            let mut names = vec![self.expect_identifier()?];
            while self.check_punct(",") {
                self.advance();
                names.push(self.expect_identifier()?);
            }
            self.eat_punct(")")?;
            return Ok(Projection::Include(names));
        }
        Err(self.error("ALL, KEYS_ONLY, or INCLUDE(...)", self.peek().clone()))
    }

    fn index_decl(&mut self, kind: IndexKind) -> Result<IndexDecl, ParseError> {
        let name = self.expect_identifier()?;
        self.eat_punct("(")?;
        let hash_attr = self.expect_identifier()?;
        let range_attr = if self.check_punct(",") {
            self.advance();
            Some(self.expect_identifier()?)
        } else {
            None
        };
        self.eat_punct(")")?;
        let projection = if self.check_keyword("projection") {
            self.advance();
            self.projection()?
        } else {
            Projection::All
        };
        let throughput = if self.check_keyword("throughput") {
            self.advance();
            Some(self.throughput()?)
        } else {
            None
        };
        Ok(IndexDecl {
            name,
            kind,
            hash_attr,
            range_attr,
            projection,
            throughput,
        })
    }

    fn create_table_stmt(&mut self) -> Result<CreateTable, ParseError> {
        self.eat_keyword("create")?;
        self.eat_keyword("table")?;
        let if_not_exists = if self.check_keyword("if") {
            self.advance();
            self.eat_keyword("not")?;
            self.eat_keyword("exists")?;
            true
        } else {
            false
        };
        let table = self.expect_identifier()?;
        self.eat_punct("(")?;
        let mut attributes = Vec::new();
        let mut keys = KeySchemaDecl::default();
        let mut throughput = None;
        let mut gsi = Vec::new();
        let mut lsi = Vec::new();
        loop {
            if self.check_keyword("throughput") {
                self.advance();
                throughput = Some(self.throughput()?);
            } else if self.check_keyword("local") || self.check_keyword("global") {
                let kind = if self.check_keyword("local") {
                    IndexKind::Local
                } else {
                    IndexKind::Global
                };
                self.advance();
                self.eat_keyword("index")?;
                let decl = self.index_decl(kind)?;
                match kind {
                    IndexKind::Local => lsi.push(decl),
                    IndexKind::Global => gsi.push(decl),
                }
            } else {
                let name = self.expect_identifier()?;
                let scalar_type = self.scalar_type()?;
                if self.check_keyword("hash") {
                    self.advance();
                    self.eat_keyword("key")?;
                    keys.keys.push(KeyAttrDecl {
                        name: name.clone(),
                        role: KeyRole::Hash,
                        scalar_type,
                    });
                } else if self.check_keyword("range") {
                    self.advance();
                    self.eat_keyword("key")?;
                    keys.keys.push(KeyAttrDecl {
                        name: name.clone(),
                        role: KeyRole::Range,
                        scalar_type,
                    });
                } else if self.check_keyword("index") {
                    self.advance();
                    self.eat_punct("(")?;
                    let index_name = if self.peek().kind == TokenKind::String {
                        self.advance().lexeme
                    } else {
                        return Err(self.error("a quoted index name", self.peek().clone()));
                    };
                    self.eat_punct(")")?;
                    gsi.push(IndexDecl {
                        name: index_name,
                        kind: IndexKind::Global,
                        hash_attr: name.clone(),
                        range_attr: None,
                        projection: Projection::All,
                        throughput: None,
                    });
                }
                attributes.push(AttributeDecl { name, scalar_type });
            }
            if self.check_punct(",") {
                self.advance();
            } else {
                break;
            }
        }
        self.eat_punct(")")?;
        Ok(CreateTable {
            table,
            if_not_exists,
            attributes,
            keys,
            throughput,
            gsi,
            lsi,
        })
    }

    fn alter_table_stmt(&mut self) -> Result<AlterTable, ParseError> {
        self.eat_keyword("alter")?;
        self.eat_keyword("table")?;
        let table = self.expect_identifier()?;
        let action = if self.check_keyword("set") {
            self.advance();
            if self.check_keyword("index") {
                self.advance();
                let index = self.expect_identifier()?;
                self.eat_keyword("throughput")?;
                AlterAction::SetIndexThroughput {
                    index,
                    throughput: self.throughput()?,
                }
            } else {
                self.eat_keyword("throughput")?;
                AlterAction::SetThroughput(self.throughput()?)
            }
        } else if self.check_keyword("drop") {
            self.advance();
            self.eat_keyword("index")?;
            AlterAction::DropIndex {
                index: self.expect_identifier()?,
            }
        } else if self.check_keyword("create") {
            self.advance();
            let kind = if self.check_keyword("local") {
                self.advance();
                IndexKind::Local
            } else if self.check_keyword("global") {
                self.advance();
                IndexKind::Global
            } else {
                IndexKind::Global
            };
            self.eat_keyword("index")?;
            AlterAction::CreateIndex(self.index_decl(kind)?)
        } else {
            return Err(self.error("SET, DROP, or CREATE", self.peek().clone()));
        };
        Ok(AlterTable { table, action })
    }

    fn drop_table_stmt(&mut self) -> Result<DropTable, ParseError> {
        self.eat_keyword("drop")?;
        self.eat_keyword("table")?;
        let if_exists = if self.check_keyword("if") {
            self.advance();
            self.eat_keyword("exists")?;
            true
        } else {
            false
        };
        Ok(DropTable {
            table: self.expect_identifier()?,
            if_exists,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Statement {
        parse(src).unwrap_or_else(|e| panic!("unexpected parse failure for {:?}: {}", src, e))
    }

    #[test]
    fn parses_point_select_with_conjunction() {
        let stmt = parse_ok("SELECT * FROM t WHERE id = 'a' AND ts = 1");
        let Statement::Select(sel) = stmt else { panic!("expected Select") };
        assert_eq!(sel.table, "t");
        assert_eq!(sel.select, SelectList::Star);
        assert!(matches!(sel.filter, Some(Expr::And(_, _))));
    }

    #[test]
    fn parses_count_star() {
        let stmt = parse_ok("SELECT count(*) FROM t WHERE id = 'a'");
        let Statement::Select(sel) = stmt else { panic!("expected Select") };
        assert_eq!(sel.select, SelectList::CountStar);
    }

    #[test]
    fn parses_between_range_query() {
        let stmt = parse_ok("SELECT * FROM t WHERE id = 'a' AND ts BETWEEN 10 AND 20");
        let Statement::Select(sel) = stmt else { panic!("expected Select") };
        let Some(Expr::And(_, rhs)) = sel.filter else { panic!("expected And") };
        assert!(matches!(*rhs, Expr::Between(_, _, _)));
    }

    #[test]
    fn parses_scan_with_filter_and_threads() {
        let stmt = parse_ok("SCAN * FROM t FILTER attribute_exists(tag) LIMIT 50 THREADS 4");
        let Statement::Scan(scan) = stmt else { panic!("expected Scan") };
        assert_eq!(scan.limit, Some(50));
        assert_eq!(scan.threads, Some(4));
        assert!(matches!(scan.filter, Some(Expr::AttributeExists(_))));
    }

    #[test]
    fn parses_update_add_with_confirmation() {
        let stmt = parse_ok("UPDATE t ADD views 1 WHERE id = 'a' AND ts = 1");
        let Statement::Update(update) = stmt else { panic!("expected Update") };
        assert_eq!(update.clauses.add.len(), 1);
        assert!(!update.confirmed_scan);
    }

    #[test]
    fn parses_update_set_arithmetic() {
        let stmt = parse_ok("UPDATE t SET views = views + 1 WHERE id = 'a'");
        let Statement::Update(update) = stmt else { panic!("expected Update") };
        assert_eq!(update.clauses.set.len(), 1);
        assert!(matches!(update.clauses.set[0].rhs, UpdateRhs::Plus(_, _)));
    }

    #[test]
    fn parses_delete_scan_confirmation() {
        let stmt = parse_ok("DELETE FROM t SCAN WHERE user = 'x'");
        let Statement::Delete(delete) = stmt else { panic!("expected Delete") };
        assert!(delete.confirmed_scan);
    }

    #[test]
    fn parses_negative_number_literal() {
        let stmt = parse_ok("UPDATE t ADD balance -5 WHERE id = 'a'");
        let Statement::Update(update) = stmt else { panic!("expected Update") };
        assert_eq!(update.clauses.add[0].value, Value::N("-5".to_string()));
    }

    #[test]
    fn parses_create_table_with_hash_range_and_gsi() {
        let stmt = parse_ok(
            "CREATE TABLE t (id STRING HASH KEY, ts NUMBER RANGE KEY, user STRING, \
             GLOBAL INDEX by_user (user))",
        );
        let Statement::CreateTable(ct) = stmt else { panic!("expected CreateTable") };
        assert_eq!(ct.keys.hash().unwrap().name, "id");
        assert_eq!(ct.keys.range().unwrap().name, "ts");
        assert_eq!(ct.gsi.len(), 1);
        assert_eq!(ct.gsi[0].name, "by_user");
    }

    #[test]
    fn parses_explain_wraps_inner_statement() {
        let stmt = parse_ok("EXPLAIN SELECT * FROM t WHERE id = 'a'");
        assert!(matches!(stmt, Statement::Explain(_)));
    }

    #[test]
    fn parse_many_splits_on_semicolons() {
        let stmts = parse_many("SELECT * FROM t; DELETE FROM t WHERE id = 'a'").unwrap();
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn parse_error_reports_offset_and_expectation() {
        let err = parse("SELECT * t").unwrap_err();
        let DqlError::Parse(parse_err) = err else { panic!("expected Parse error") };
        assert_eq!(parse_err.expected, "'FROM'");
        assert_eq!(parse_err.offset, 9);
    }
}
