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

//! Error taxonomy for every stage of the pipeline, per §7.
//!
//! Each stage owns its own error type so callers can match on the
//! specific variant (the planner's tests, for instance, care whether a
//! statement failed with `MutationWithoutKey` or `InvalidKeyUsage`).
//! [`DqlError`] unifies them for code that just wants one `?`-friendly
//! type, the way `dynein`'s `DyneinConfigError` wraps multiple causes.

use std::fmt;
use thiserror::Error;

use crate::token::TokenKind;

/// A lexical error: unterminated string/binary/comment or an invalid byte.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("lex error at {offset}: {message}")]
pub struct LexError {
    pub offset: usize,
    pub message: String,
}

/// A grammar error produced by the recursive-descent parser.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("parse error at {offset}: expected {expected}, found {found}")]
pub struct ParseError {
    pub offset: usize,
    pub expected: String,
    pub found: String,
}

/// The kind of failure a [`SemanticError`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticErrorKind {
    UnknownTable,
    UnknownAttribute,
    TypeMismatch,
    InvalidKeyUsage,
    AmbiguousIndex,
    MutationWithoutKey,
    UnsupportedAggregate,
}

impl fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SemanticErrorKind::UnknownTable => "UnknownTable",
            SemanticErrorKind::UnknownAttribute => "UnknownAttribute",
            SemanticErrorKind::TypeMismatch => "TypeMismatch",
            SemanticErrorKind::InvalidKeyUsage => "InvalidKeyUsage",
            SemanticErrorKind::AmbiguousIndex => "AmbiguousIndex",
            SemanticErrorKind::MutationWithoutKey => "MutationWithoutKey",
            SemanticErrorKind::UnsupportedAggregate => "UnsupportedAggregate",
        };
        f.write_str(s)
    }
}

/// Raised by the semantic analyzer when a statement doesn't resolve
/// cleanly against a [`crate::schema::TableSchema`].
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub message: String,
    pub offset: Option<usize>,
}

impl SemanticError {
    pub fn new(kind: SemanticErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            offset: None,
        }
    }

    pub fn at(kind: SemanticErrorKind, message: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            offset: Some(offset),
        }
    }
}

/// Raised by the planner when no viable access path exists without
/// explicit confirmation, or a construct isn't supported (e.g. `ORDER
/// BY` on a key that doesn't match the chosen access path).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("plan error: {message}")]
pub struct PlanError {
    pub message: String,
}

impl PlanError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The stable classification of a failure coming back from a
/// [`crate::executor::DynamoClient`] call, per §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamoErrorKind {
    Throttled,
    ServerError,
    ValidationError,
    ConditionalCheckFailed,
    ResourceNotFound,
    Other,
}

/// An error surfaced by the `DynamoClient` collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind:?}: {message}")]
pub struct DynamoError {
    pub kind: DynamoErrorKind,
    pub retryable: bool,
    pub message: String,
}

impl DynamoError {
    pub fn new(kind: DynamoErrorKind, retryable: bool, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable,
            message: message.into(),
        }
    }
}

/// Reports how much of a multi-step mutation plan completed before an
/// unrecoverable error, per §7 ("the system does not attempt rollback").
#[derive(Debug, Clone, PartialEq)]
pub struct PartialMutation {
    pub applied: usize,
    pub remaining: usize,
}

/// Wraps a [`DynamoError`] with how far a mutation plan had progressed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("execution error after {progress:?}: {source}")]
pub struct ExecutionError {
    #[source]
    pub source: DynamoError,
    pub progress: Option<PartialMutation>,
}

impl ExecutionError {
    pub fn new(source: DynamoError) -> Self {
        Self {
            source,
            progress: None,
        }
    }

    pub fn with_progress(source: DynamoError, applied: usize, remaining: usize) -> Self {
        Self {
            source,
            progress: Some(PartialMutation { applied, remaining }),
        }
    }
}

/// Statement execution was cancelled via a [`crate::cancel::CancelToken`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cancelled")]
pub struct Cancelled;

/// Unifying error for anything the crate's public API can return.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DqlError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl DqlError {
    /// The source offset, when the failure can be traced back to a
    /// position in the original statement text.
    pub fn offset(&self) -> Option<usize> {
        match self {
            DqlError::Lex(e) => Some(e.offset),
            DqlError::Parse(e) => Some(e.offset),
            DqlError::Semantic(e) => e.offset,
            DqlError::Plan(_) => None,
            DqlError::Execution(_) => None,
            DqlError::Cancelled(_) => None,
        }
    }

    /// Maps to the CLI exit codes described in §6.3.
    pub fn exit_code(&self) -> i32 {
        match self {
            DqlError::Lex(_) | DqlError::Parse(_) | DqlError::Semantic(_) | DqlError::Plan(_) => 1,
            DqlError::Execution(_) => 2,
            DqlError::Cancelled(_) => 130,
        }
    }
}

/// Helper used by the lexer/parser to render `TokenKind` in error
/// messages without every call site re-deriving a label.
pub fn describe_kind(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Keyword => "keyword",
        TokenKind::Identifier => "identifier",
        TokenKind::String => "string literal",
        TokenKind::Number => "number literal",
        TokenKind::Binary => "binary literal",
        TokenKind::Bool => "boolean literal",
        TokenKind::Null => "null literal",
        TokenKind::Operator => "operator",
        TokenKind::Punctuation => "punctuation",
        TokenKind::Eof => "end of input",
    }
}
