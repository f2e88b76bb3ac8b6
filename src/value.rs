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

//! Dynamic value typing per §9: DynamoDB values are heterogeneous
//! (S/N/B/BOOL/NULL/L/M/SS/NS/BS). [`Value`] models that as a tagged
//! union instead of subclassing, with `Value::N` preserving its numeric
//! literal as an arbitrary-precision decimal string.

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use base64::{engine::general_purpose, Engine as _};
use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// The scalar/document type tag of a [`Value`], used by the semantic
/// analyzer to typecheck literals against declared attribute types and
/// by `CREATE TABLE`'s attribute declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    S,
    N,
    B,
    Bool,
    Null,
    L,
    M,
    Ss,
    Ns,
    Bs,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScalarType::S => "STRING",
            ScalarType::N => "NUMBER",
            ScalarType::B => "BINARY",
            ScalarType::Bool => "BOOL",
            ScalarType::Null => "NULL",
            ScalarType::L => "LIST",
            ScalarType::M => "MAP",
            ScalarType::Ss => "STRING SET",
            ScalarType::Ns => "NUMBER SET",
            ScalarType::Bs => "BINARY SET",
        };
        f.write_str(s)
    }
}

/// A DynamoDB-shaped dynamic value. Lists/maps/sets nest recursively,
/// mirroring the wire representation rather than a host-language type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    S(String),
    /// Kept as the literal decimal text the user wrote, never parsed
    /// into f64/i64, so precision is never lost on the way to
    /// DynamoDB's Number type.
    N(String),
    B(Vec<u8>),
    Bool(bool),
    Null,
    L(Vec<Value>),
    M(BTreeMap<String, Value>),
    Ss(Vec<String>),
    Ns(Vec<String>),
    Bs(Vec<Vec<u8>>),
}

impl Value {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Value::S(_) => ScalarType::S,
            Value::N(_) => ScalarType::N,
            Value::B(_) => ScalarType::B,
            Value::Bool(_) => ScalarType::Bool,
            Value::Null => ScalarType::Null,
            Value::L(_) => ScalarType::L,
            Value::M(_) => ScalarType::M,
            Value::Ss(_) => ScalarType::Ss,
            Value::Ns(_) => ScalarType::Ns,
            Value::Bs(_) => ScalarType::Bs,
        }
    }

    pub fn is_type(&self, t: ScalarType) -> bool {
        self.scalar_type() == t
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::S(s) => AttributeValue::S(s),
            Value::N(n) => AttributeValue::N(n),
            Value::B(bytes) => AttributeValue::B(Blob::new(bytes)),
            Value::Bool(b) => AttributeValue::Bool(b),
            Value::Null => AttributeValue::Null(true),
            Value::L(items) => AttributeValue::L(items.into_iter().map(Into::into).collect()),
            Value::M(map) => {
                AttributeValue::M(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            Value::Ss(items) => AttributeValue::Ss(items),
            Value::Ns(items) => AttributeValue::Ns(items),
            Value::Bs(items) => AttributeValue::Bs(items.into_iter().map(Blob::new).collect()),
        }
    }
}

/// Best-effort inverse of the `From<Value> for AttributeValue` impl,
/// used when the executor decodes items coming back from `GetItem`,
/// `Query`, or `Scan` responses.
impl From<&AttributeValue> for Value {
    fn from(av: &AttributeValue) -> Self {
        match av {
            AttributeValue::S(s) => Value::S(s.clone()),
            AttributeValue::N(n) => Value::N(n.clone()),
            AttributeValue::B(b) => Value::B(b.clone().into_inner()),
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Null(_) => Value::Null,
            AttributeValue::L(items) => Value::L(items.iter().map(Value::from).collect()),
            AttributeValue::M(map) => {
                Value::M(map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect())
            }
            AttributeValue::Ss(items) => Value::Ss(items.clone()),
            AttributeValue::Ns(items) => Value::Ns(items.clone()),
            AttributeValue::Bs(items) => {
                Value::Bs(items.iter().map(|b| b.clone().into_inner()).collect())
            }
            // AttributeValue is #[non_exhaustive]; fall back to Null for
            // any wire variant this crate doesn't model.
            _ => Value::Null,
        }
    }
}

fn write_escaped_string(f: &mut impl Write, s: &str) -> fmt::Result {
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::S(s) => {
                f.write_char('"')?;
                write_escaped_string(f, s)?;
                f.write_char('"')
            }
            Value::N(n) => f.write_str(n),
            Value::B(bytes) => write!(f, "b\"{}\"", general_purpose::STANDARD.encode(bytes)),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => f.write_str("null"),
            Value::L(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_char(']')
            }
            Value::M(map) => {
                f.write_char('{')?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    f.write_char('"')?;
                    write_escaped_string(f, k)?;
                    write!(f, "\":{}", v)?;
                }
                f.write_char('}')
            }
            Value::Ss(items) => write_set(f, items.iter().map(|s| format!("\"{}\"", s))),
            Value::Ns(items) => write_set(f, items.iter().cloned()),
            Value::Bs(items) => {
                write_set(f, items.iter().map(|b| format!("b\"{}\"", general_purpose::STANDARD.encode(b))))
            }
        }
    }
}

fn write_set(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = String>) -> fmt::Result {
    f.write_str("<<")?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_char(',')?;
        }
        f.write_str(&item)?;
    }
    f.write_str(">>")
}
