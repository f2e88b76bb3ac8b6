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

//! `dql` compiles an SQL-like surface over DynamoDB's item-level API
//! down to a sequence of concrete DynamoDB operations.
//!
//! The pipeline: [`token`] lexes source text, [`parser`] builds an
//! [`ast::Statement`], [`semantic`] resolves it against a
//! [`schema::SchemaProvider`], [`planner`] picks an access path and
//! produces a [`plan::ExecutionPlan`] (via [`expr_compiler`] for the
//! wire expression strings), and [`executor`] drives the plan against
//! a [`executor::DynamoClient`].
//!
//! This crate does not initialize a logger, read configuration files,
//! or own a transport client — those are the embedding application's
//! job. See `src/bin/dqlc.rs` for a minimal example of wiring all of
//! it together against the real AWS SDK.

pub mod ast;
pub mod cancel;
pub mod error;
pub mod executor;
pub mod expr_compiler;
pub mod plan;
pub mod planner;
pub mod parser;
pub mod schema;
pub mod semantic;
pub mod token;
pub mod value;

pub use ast::Statement;
pub use error::DqlError;
pub use plan::ExecutionPlan;

/// Configuration for an embedding application, per the ambient
/// configuration stack: region/endpoint are consumed by whatever
/// constructs the [`executor::DynamoClient`], `cache_ttl` configures
/// [`schema::CachingSchemaProvider`], and `retry` configures
/// [`executor::RetryPolicy`]. The core never reads this from disk —
/// the embedder deserializes it (e.g. via `serde_yaml`) and passes it
/// in.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub schema_cache_ttl_secs: u64,
    pub retry: executor::RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            region: None,
            endpoint_url: None,
            schema_cache_ttl_secs: 300,
            retry: executor::RetryPolicy::default(),
        }
    }
}

/// Compiles `src` against `schema` into a ready-to-execute plan,
/// running the lexer, parser, semantic analyzer, and planner in
/// sequence. `confirmed` satisfies the Scan-mutation confirmation
/// requirement for statements that don't spell `SCAN` explicitly.
pub async fn compile(
    src: &str,
    schema: &dyn schema::SchemaProvider,
    confirmed: bool,
) -> Result<plan::ExecutionPlan, DqlError> {
    let stmt = parser::parse(src)?;
    let resolved = semantic::analyze(&stmt, schema, confirmed).await?;
    Ok(planner::plan(&resolved)?)
}
