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

//! A thin CLI wiring `dql`'s core against a real AWS SDK client, per
//! §4.9. Contains no retry, pagination, or expression-compilation logic
//! of its own; it only parses flags, builds the collaborators, feeds
//! statement text to [`dql::compile`], and renders whatever comes back.

use std::io::{self, Write as _};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::debug;

use aws_sdk_dynamodb::error::ProvideErrorMetadata;
use aws_sdk_dynamodb::Client as SdkClient;
use dql::ast::Statement;
use dql::cancel::CancelToken;
use dql::error::DqlError;
use dql::executor::{self, AwsDynamoClient, ExecutionOutcome, Executor, RetryPolicy};
use dql::schema::{CachingSchemaProvider, SchemaError, SchemaProvider, TableSchema};
use dql::value::Value;

#[derive(Parser, Debug)]
#[command(name = "dqlc", about = "Compile and run DQL statements against DynamoDB")]
struct Args {
    /// AWS region, e.g. us-west-2. Falls back to the SDK's default chain.
    #[arg(long)]
    region: Option<String>,

    /// Override the DynamoDB endpoint (DynamoDB Local, typically).
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Named AWS credentials profile.
    #[arg(long)]
    profile: Option<String>,

    /// Run a single statement and exit, instead of reading a script file.
    #[arg(long)]
    command: Option<String>,

    /// Allow SCAN-backed mutations without an explicit SCAN keyword.
    #[arg(long)]
    confirm_scan: bool,

    /// Path to a file of `;`-terminated statements, run in order.
    script: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let sdk_config = match build_sdk_config(&args).await {
        Ok(config) => config,
        Err(message) => {
            eprintln!("config error: {}", message);
            return ExitCode::from(3);
        }
    };
    let sdk_client = SdkClient::new(&sdk_config);
    let client = AwsDynamoClient::new(sdk_client.clone(), RetryPolicy::default());
    let schema = CachingSchemaProvider::new(AwsSchemaProvider::new(sdk_client), Duration::from_secs(300));
    let executor = Executor::new(client);
    let cancel = CancelToken::new();

    let statements = match gather_statements(&args) {
        Ok(statements) => statements,
        Err(message) => {
            eprintln!("config error: {}", message);
            return ExitCode::from(3);
        }
    };

    let mut exit_code = 0;
    for stmt_src in statements {
        exit_code = run_one(&stmt_src, &schema, &executor, &cancel, args.confirm_scan).await;
        if exit_code != 0 {
            break;
        }
    }
    ExitCode::from(exit_code as u8)
}

async fn build_sdk_config(args: &Args) -> Result<aws_config::SdkConfig, String> {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::v2024_03_28());
    if let Some(region) = &args.region {
        let provider = aws_config::meta::region::RegionProviderChain::first_try(aws_types::region::Region::new(region.clone()));
        loader = loader.region(provider);
    }
    if let Some(profile) = &args.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(endpoint) = &args.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    Ok(loader.load().await)
}

fn gather_statements(args: &Args) -> Result<Vec<String>, String> {
    if let Some(command) = &args.command {
        return Ok(vec![command.clone()]);
    }
    if let Some(path) = &args.script {
        let contents = std::fs::read_to_string(path).map_err(|e| format!("cannot read '{}': {}", path, e))?;
        return Ok(contents.split(';').map(str::trim).filter(|s| !s.is_empty()).map(|s| format!("{};", s)).collect());
    }
    Err("one of --command or a script file argument is required".to_string())
}

/// Statements are re-parsed once here (the pipeline already parses them
/// again inside `compile`) so the CLI can dispatch `EXPLAIN`/`ANALYZE`/
/// `HELP` to display-only behavior: `dql::planner::plan` resolves those
/// wrapper statements into the same executable plan as the statement
/// they wrap, which is exactly what `ANALYZE` needs but not what
/// `EXPLAIN` (no execution at all) or `HELP` (no plan at all) need.
async fn run_one(src: &str, schema: &dyn SchemaProvider, executor: &Executor<AwsDynamoClient>, cancel: &CancelToken, confirm_scan: bool) -> i32 {
    let parsed = match dql::parser::parse(src) {
        Ok(stmt) => stmt,
        Err(e) => return report_error(&e),
    };
    let invalidate_table = ddl_table(&parsed).map(str::to_string);

    match parsed {
        Statement::Help => {
            print_help();
            0
        }
        Statement::DumpSchema(tables) => dump_schema(schema, &tables).await,
        Statement::Explain(_) => match dql::compile(src, schema, confirm_scan).await {
            Ok(plan) => {
                print!("{}", plan.describe());
                0
            }
            Err(e) => report_error(&e),
        },
        Statement::Analyze(_) => execute_and_render(src, schema, executor, cancel, confirm_scan, true, invalidate_table.as_deref()).await,
        _ => execute_and_render(src, schema, executor, cancel, confirm_scan, false, invalidate_table.as_deref()).await,
    }
}

/// The table a successful execution of `stmt` must invalidate in the
/// schema cache, per §4.6 — `CREATE`/`ALTER`/`DROP` change the shape a
/// cached `describe` would otherwise keep serving stale. `ANALYZE` is
/// unwrapped since it executes the statement it wraps.
fn ddl_table(stmt: &Statement) -> Option<&str> {
    match stmt {
        Statement::CreateTable(c) => Some(&c.table),
        Statement::AlterTable(a) => Some(&a.table),
        Statement::DropTable(d) => Some(&d.table),
        Statement::Analyze(inner) => ddl_table(inner),
        _ => None,
    }
}

async fn execute_and_render(
    src: &str,
    schema: &dyn SchemaProvider,
    executor: &Executor<AwsDynamoClient>,
    cancel: &CancelToken,
    confirm_scan: bool,
    explain_too: bool,
    invalidate_table: Option<&str>,
) -> i32 {
    let plan = match dql::compile(src, schema, confirm_scan).await {
        Ok(plan) => plan,
        Err(e) => return report_error(&e),
    };
    if explain_too {
        println!("{}", plan.describe());
    }
    match executor.execute(&plan, cancel).await {
        Ok(outcome) => {
            if let Some(table) = invalidate_table {
                schema.invalidate(table);
            }
            render(&outcome);
            0
        }
        Err(e) => report_error(&e),
    }
}

fn report_error(err: &DqlError) -> i32 {
    eprintln!("{}", err);
    err.exit_code()
}

fn render(outcome: &ExecutionOutcome) {
    let stdout = io::stdout();
    let mut out = tabwriter::TabWriter::new(stdout.lock());
    match outcome {
        ExecutionOutcome::Items(items) => {
            for item in items {
                let _ = writeln!(out, "{}", render_item(item));
            }
        }
        ExecutionOutcome::Item(Some(item)) => {
            let _ = writeln!(out, "{}", render_item(item));
        }
        ExecutionOutcome::Item(None) => println!("(no item)"),
        ExecutionOutcome::Count(n) => println!("{}", n),
        ExecutionOutcome::Mutated { applied } => println!("applied: {}", applied),
        ExecutionOutcome::Schemas(schemas) => {
            for schema in schemas {
                let _ = writeln!(out, "{:?}", schema);
            }
        }
        ExecutionOutcome::Acknowledged => println!("OK"),
    }
    let _ = out.flush();
}

fn render_item(item: &std::collections::HashMap<String, Value>) -> String {
    let as_json: serde_json::Map<String, serde_json::Value> = item.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect();
    serde_json::Value::Object(as_json).to_string()
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::S(s) => serde_json::Value::String(s.clone()),
        Value::N(n) => serde_json::Value::String(n.clone()),
        Value::B(_) => serde_json::Value::String("<binary>".to_string()),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Null => serde_json::Value::Null,
        Value::L(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::M(map) => serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect()),
        Value::Ss(items) => serde_json::Value::Array(items.iter().cloned().map(serde_json::Value::String).collect()),
        Value::Ns(items) => serde_json::Value::Array(items.iter().cloned().map(serde_json::Value::String).collect()),
        Value::Bs(_) => serde_json::Value::String("<binary set>".to_string()),
    }
}

async fn dump_schema(schema: &dyn SchemaProvider, tables: &[String]) -> i32 {
    let names = if tables.is_empty() {
        match schema.list().await {
            Ok(names) => names,
            Err(e) => {
                eprintln!("{}", e);
                return 2;
            }
        }
    } else {
        tables.to_vec()
    };

    for name in names {
        match schema.describe(&name).await {
            Ok(desc) => println!("{}", serde_yaml::to_string(&describe_as_yaml(&desc)).unwrap_or_default()),
            Err(e) => {
                eprintln!("{}", e);
                return 2;
            }
        }
    }
    0
}

/// `TableSchema` isn't `Serialize` (it's the compiler's internal view,
/// not a wire format); render the fields a `DUMP SCHEMA` reader cares
/// about as a small ad hoc YAML mapping instead of adding a derive that
/// nothing else needs.
fn describe_as_yaml(schema: &TableSchema) -> serde_yaml::Value {
    use serde_yaml::Value as Y;
    let mut map = serde_yaml::Mapping::new();
    map.insert(Y::from("table"), Y::from(schema.name.clone()));
    map.insert(Y::from("hash_key"), Y::from(schema.hash.name.clone()));
    if let Some(range) = &schema.range {
        map.insert(Y::from("range_key"), Y::from(range.name.clone()));
    }
    map.insert(Y::from("gsi"), Y::from(schema.gsi.iter().map(|i| i.name.clone()).collect::<Vec<_>>()));
    map.insert(Y::from("lsi"), Y::from(schema.lsi.iter().map(|i| i.name.clone()).collect::<Vec<_>>()));
    Y::Mapping(map)
}

fn print_help() {
    println!(
        "dqlc - an SQL-like query language for DynamoDB\n\n\
         SELECT * FROM table [USING idx] [WHERE expr] [LIMIT n];\n\
         SCAN * FROM table [FILTER expr] [LIMIT n] [THREADS n];\n\
         INSERT INTO table (cols) VALUES (vals);\n\
         UPDATE table SET ... [WHERE expr];\n\
         DELETE FROM table [WHERE expr];\n\
         CREATE TABLE ...; ALTER TABLE ...; DROP TABLE ...;\n\
         EXPLAIN <stmt>; ANALYZE <stmt>; DUMP SCHEMA [table,...];"
    );
}

/// Wraps `DescribeTable`/`ListTables` for [`CachingSchemaProvider`],
/// the way `executor::AwsDynamoClient` wraps the data-plane operations.
/// Kept separate from `AwsDynamoClient` because a `SchemaProvider`'s
/// contract (`describe`/`invalidate`/`list`) has nothing to do with
/// `DynamoClient`'s, even though both ultimately call the same SDK
/// client.
struct AwsSchemaProvider {
    client: SdkClient,
}

impl AwsSchemaProvider {
    fn new(client: SdkClient) -> Self {
        AwsSchemaProvider { client }
    }
}

impl SchemaProvider for AwsSchemaProvider {
    fn describe<'a>(&'a self, table: &'a str) -> dql_box_future::BoxFuture<'a, Result<TableSchema, SchemaError>> {
        Box::pin(async move {
            let res = self
                .client
                .describe_table()
                .table_name(table)
                .send()
                .await
                .map_err(|e| schema_error_from(table, &e))?;
            let desc = res.table().ok_or_else(|| SchemaError::NotFound(table.to_string()))?;
            executor::describe_to_schema(desc).map_err(|e| SchemaError::Backend(e.message))
        })
    }

    fn invalidate(&self, _table: &str) {
        debug!("schema cache invalidated; next describe refetches from DescribeTable");
    }

    fn list<'a>(&'a self) -> dql_box_future::BoxFuture<'a, Result<Vec<String>, SchemaError>> {
        Box::pin(async move {
            let res = self.client.list_tables().send().await.map_err(|e| SchemaError::Backend(e.to_string()))?;
            Ok(res.table_names().to_vec())
        })
    }
}

fn schema_error_from<E: std::error::Error + aws_sdk_dynamodb::error::ProvideErrorMetadata>(table: &str, err: &aws_sdk_dynamodb::error::SdkError<E>) -> SchemaError {
    if err.code() == Some("ResourceNotFoundException") {
        SchemaError::NotFound(table.to_string())
    } else {
        SchemaError::Backend(err.to_string())
    }
}

/// `SchemaProvider`'s `BoxFuture` alias is private to `dql::schema`; a
/// same-shaped local alias lets this binary implement the trait without
/// the library needing to export an internal type.
mod dql_box_future {
    use std::future::Future;
    use std::pin::Pin;
    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}
