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

//! Drives an [`ExecutionPlan`] against a [`DynamoClient`], per §4.5/§4.7.
//!
//! [`DynamoClient`] is the collaborator boundary: production code wires
//! [`AwsDynamoClient`] (backed by `aws-sdk-dynamodb`) in, tests wire in a
//! fake. Trait methods return boxed futures by hand, the way
//! `dynein`'s `batch_write_untill_processed` does, rather than pulling in
//! `async-trait` for a trait with a handful of methods.
//!
//! The executor never retries at the plan level — a mutation that fails
//! partway through is reported with how much of it landed (per §7's "no
//! rollback" rule) via [`crate::error::PartialMutation`]. Retrying
//! individual RPCs against transient service errors is
//! [`AwsDynamoClient`]'s job, via [`RetryPolicy`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, GlobalSecondaryIndex, KeySchemaElement, KeyType, KeysAndAttributes, LocalSecondaryIndex,
    Projection as SdkProjection, ProjectionType, ProvisionedThroughput, ReturnValue as SdkReturnValue, ScalarAttributeType, Select,
};
use aws_sdk_dynamodb::Client as SdkClient;

use crate::ast::{AlterAction, CreateTable, IndexDecl, Projection, ReturnValues, Throughput};
use crate::cancel::CancelToken;
use crate::error::{Cancelled, DqlError, DynamoError, DynamoErrorKind, ExecutionError};
use crate::plan::{
    BatchSource, BatchWriteItemOp, DeleteItemOp, DeleteTableOp, DescribeTableOp, ExecutionPlan, ExpressionTriple, GetItemOp, KeySource,
    Operation, PlanMode, PutItemOp, QueryOp, ScanOp, UpdateItemOp, UpdateTableOp, WriteRequest,
};
use crate::schema::{IndexKind, IndexSchema, KeyAttr, TableSchema};
use crate::value::{ScalarType, Value};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Exponential backoff with jitter for retryable `DynamoClient` calls,
/// per §7 ("retryable errors are retried internally"). Mirrors
/// `dynein`'s `RetrySetting`/`ExponentialBuilder` conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        ExponentialBuilder::default()
            .with_jitter()
            .with_factor(2.0)
            .with_min_delay(self.initial_backoff)
            .with_max_delay(self.max_backoff)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
            .build()
    }
}

/// One page of a `Query`/`Scan` response. `count` is DynamoDB's own
/// `Count` field: the number of items matching the key/filter
/// condition, populated even when `Select=COUNT` means `items` comes
/// back empty — `drive_query`/`drive_scan` sum `count`, not
/// `items.len()`, when the operation is `count(*)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPage {
    pub items: Vec<HashMap<String, Value>>,
    pub count: u32,
    pub scanned_count: u32,
    pub last_evaluated_key: Option<HashMap<String, Value>>,
}

/// The DynamoDB data-plane and control-plane surface the executor
/// needs, per §4.7. Each method takes the already-compiled pieces of
/// an [`Operation`] so the executor never has to know about
/// `aws-sdk-dynamodb` types, and `AwsDynamoClient` never has to know
/// about [`Operation`].
pub trait DynamoClient: Send + Sync {
    fn get_item<'a>(&'a self, table: &'a str, key: &'a HashMap<String, Value>, consistent: bool) -> BoxFuture<'a, Result<Option<HashMap<String, Value>>, DynamoError>>;

    /// Sends one `BatchGetItem` request (at most 100 `keys`) and resolves
    /// unprocessed keys back into the pending pool until the batch
    /// drains, mirroring [`DynamoClient::batch_write_item`]'s retry loop.
    fn batch_get_item<'a>(&'a self, table: &'a str, keys: Vec<HashMap<String, Value>>, consistent: bool) -> BoxFuture<'a, Result<Vec<HashMap<String, Value>>, DynamoError>>;

    fn query<'a>(&'a self, op: &'a QueryOp, exclusive_start_key: Option<&'a HashMap<String, Value>>) -> BoxFuture<'a, Result<QueryPage, DynamoError>>;

    fn scan<'a>(
        &'a self,
        op: &'a ScanOp,
        exclusive_start_key: Option<&'a HashMap<String, Value>>,
        segment: Option<u32>,
    ) -> BoxFuture<'a, Result<QueryPage, DynamoError>>;

    fn put_item<'a>(&'a self, table: &'a str, item: &'a HashMap<String, Value>, condition: Option<&'a ExpressionTriple>) -> BoxFuture<'a, Result<(), DynamoError>>;

    fn update_item<'a>(
        &'a self,
        table: &'a str,
        key: &'a HashMap<String, Value>,
        update: &'a ExpressionTriple,
        condition: Option<&'a ExpressionTriple>,
        return_values: ReturnValues,
    ) -> BoxFuture<'a, Result<Option<HashMap<String, Value>>, DynamoError>>;

    fn delete_item<'a>(
        &'a self,
        table: &'a str,
        key: &'a HashMap<String, Value>,
        condition: Option<&'a ExpressionTriple>,
        return_values: ReturnValues,
    ) -> BoxFuture<'a, Result<Option<HashMap<String, Value>>, DynamoError>>;

    /// Sends one `BatchWriteItem` request (at most 25 `requests`) and
    /// resolves unprocessed items back into the pending pool until
    /// the batch drains, the way `dynein::batch::batch_write_untill_processed` does.
    fn batch_write_item<'a>(&'a self, table: &'a str, requests: Vec<WriteRequest>) -> BoxFuture<'a, Result<(), DynamoError>>;

    fn create_table<'a>(&'a self, stmt: &'a CreateTable) -> BoxFuture<'a, Result<(), DynamoError>>;

    fn update_table<'a>(&'a self, table: &'a str, action: &'a AlterAction) -> BoxFuture<'a, Result<(), DynamoError>>;

    fn delete_table<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<(), DynamoError>>;

    fn describe_table<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<TableSchema, DynamoError>>;
}

/// The statement-level result of driving an [`ExecutionPlan`] to
/// completion, independent of which `Operation`s it took to get there.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Items(Vec<HashMap<String, Value>>),
    Count(usize),
    Item(Option<HashMap<String, Value>>),
    Mutated { applied: usize },
    Schemas(Vec<TableSchema>),
    Acknowledged,
}

/// Drives an [`ExecutionPlan`]'s operations in order against a
/// [`DynamoClient`], per §4.5. Single-threaded and cooperative: the
/// only concurrency is DynamoDB's own parallel-scan segments, issued
/// one [`tokio::task`] per segment and joined before moving on.
pub struct Executor<C> {
    client: C,
}

impl<C: DynamoClient> Executor<C> {
    pub fn new(client: C) -> Self {
        Executor { client }
    }

    pub async fn execute(&self, plan: &ExecutionPlan, cancel: &CancelToken) -> Result<ExecutionOutcome, DqlError> {
        let mut prior_keys: Vec<HashMap<String, Value>> = Vec::new();
        let mut last: Option<ExecutionOutcome> = None;

        for (i, op) in plan.operations.iter().enumerate() {
            cancel.check().map_err(|_: Cancelled| DqlError::from(Cancelled))?;
            let outcome = self.execute_one(op, &prior_keys, cancel).await.map_err(|source| {
                let remaining = plan.operations.len() - i;
                DqlError::from(ExecutionError::with_progress(source, i, remaining))
            })?;

            if let ExecutionOutcome::Items(items) = &outcome {
                prior_keys = items.clone();
            }
            last = Some(outcome);
        }

        Ok(last.unwrap_or(ExecutionOutcome::Acknowledged))
    }

    async fn execute_one(&self, op: &Operation, prior_keys: &[HashMap<String, Value>], cancel: &CancelToken) -> Result<ExecutionOutcome, DynamoError> {
        match op {
            Operation::GetItem(GetItemOp { table, key, consistent, .. }) => {
                let item = self.client.get_item(table, key, *consistent).await?;
                Ok(ExecutionOutcome::Item(item))
            }
            Operation::BatchGetItem(batch) => {
                let mut items = Vec::new();
                for chunk in batch.keys.chunks(100) {
                    let page = self.client.batch_get_item(&batch.table, chunk.to_vec(), batch.consistent).await?;
                    items.extend(page);
                    cancel.check().map_err(|_| DynamoError::new(DynamoErrorKind::Other, false, "cancelled"))?;
                }
                Ok(ExecutionOutcome::Items(items))
            }
            Operation::Query(query_op) => self.drive_query(query_op, cancel).await,
            Operation::Scan(scan_op) => self.drive_scan(scan_op, cancel).await,
            Operation::PutItem(PutItemOp { table, item, condition }) => {
                self.client.put_item(table, item, condition.as_ref()).await?;
                Ok(ExecutionOutcome::Acknowledged)
            }
            Operation::UpdateItem(UpdateItemOp {
                table,
                target,
                update,
                condition,
                return_values,
            }) => self.drive_update(table, target, update, condition.as_ref(), *return_values, prior_keys, cancel).await,
            Operation::DeleteItem(DeleteItemOp {
                table,
                target,
                condition,
                return_values,
            }) => match target {
                KeySource::Literal(key) => {
                    let item = self.client.delete_item(table, key, condition.as_ref(), *return_values).await?;
                    Ok(ExecutionOutcome::Item(item))
                }
                KeySource::FromPriorRead => {
                    let mut applied = 0usize;
                    for key in prior_keys {
                        self.client.delete_item(table, key, condition.as_ref(), *return_values).await?;
                        applied += 1;
                        cancel.check().map_err(|_| DynamoError::new(DynamoErrorKind::Other, false, "cancelled"))?;
                    }
                    debug!("mutation expansion deleted {} item(s) in {}", applied, table);
                    Ok(ExecutionOutcome::Mutated { applied })
                }
            },
            Operation::BatchWriteItem(BatchWriteItemOp { table, source }) => self.drive_batch_write(table, source, prior_keys, cancel).await,
            Operation::CreateTable(create) => {
                self.client.create_table(create).await?;
                Ok(ExecutionOutcome::Acknowledged)
            }
            Operation::UpdateTable(UpdateTableOp { table, action }) => {
                self.client.update_table(table, action).await?;
                Ok(ExecutionOutcome::Acknowledged)
            }
            Operation::DeleteTable(DeleteTableOp { table, .. }) => {
                self.client.delete_table(table).await?;
                Ok(ExecutionOutcome::Acknowledged)
            }
            Operation::DescribeTable(DescribeTableOp { table }) => {
                let schema = self.client.describe_table(table).await?;
                Ok(ExecutionOutcome::Schemas(vec![schema]))
            }
        }
    }

    async fn drive_query(&self, op: &QueryOp, cancel: &CancelToken) -> Result<ExecutionOutcome, DynamoError> {
        if op.paging.limit == Some(0) {
            return Ok(if op.select_count { ExecutionOutcome::Count(0) } else { ExecutionOutcome::Items(Vec::new()) });
        }
        if op.select_count {
            let mut total = 0usize;
            let mut esk = None;
            loop {
                let page = self.client.query(op, esk.as_ref()).await?;
                total += page.count as usize;
                esk = page.last_evaluated_key;
                if esk.is_none() {
                    break;
                }
                cancel.check().map_err(|_| DynamoError::new(DynamoErrorKind::Other, false, "cancelled"))?;
            }
            return Ok(ExecutionOutcome::Count(total));
        }
        let mut items = Vec::new();
        let mut scanned = 0u32;
        let mut esk = None;
        loop {
            let page = self.client.query(op, esk.as_ref()).await?;
            scanned += page.scanned_count;
            items.extend(page.items);
            esk = page.last_evaluated_key;
            if op.paging.mode() == PlanMode::Bounded {
                if let Some(limit) = op.paging.limit {
                    if items.len() as u32 >= limit {
                        items.truncate(limit as usize);
                        break;
                    }
                }
            }
            if esk.is_none() {
                break;
            }
            cancel.check().map_err(|_| DynamoError::new(DynamoErrorKind::Other, false, "cancelled"))?;
        }
        Ok(ExecutionOutcome::Items(items))
    }

    async fn drive_scan(&self, op: &ScanOp, cancel: &CancelToken) -> Result<ExecutionOutcome, DynamoError> {
        if op.paging.limit == Some(0) {
            return Ok(if op.select_count { ExecutionOutcome::Count(0) } else { ExecutionOutcome::Items(Vec::new()) });
        }
        let segments = op.segments.unwrap_or(1);
        if op.select_count {
            let mut total = 0usize;
            for segment in 0..segments {
                let mut esk = None;
                loop {
                    let page = self.client.scan(op, esk.as_ref(), if segments > 1 { Some(segment) } else { None }).await?;
                    total += page.count as usize;
                    esk = page.last_evaluated_key;
                    if esk.is_none() {
                        break;
                    }
                    cancel.check().map_err(|_| DynamoError::new(DynamoErrorKind::Other, false, "cancelled"))?;
                }
            }
            return Ok(ExecutionOutcome::Count(total));
        }
        let mut items = Vec::new();
        for segment in 0..segments {
            let mut esk = None;
            loop {
                let page = self.client.scan(op, esk.as_ref(), if segments > 1 { Some(segment) } else { None }).await?;
                items.extend(page.items);
                esk = page.last_evaluated_key;
                if op.paging.mode() == PlanMode::Bounded {
                    if let Some(limit) = op.paging.limit {
                        if items.len() as u32 >= limit {
                            items.truncate(limit as usize);
                            break;
                        }
                    }
                }
                if esk.is_none() {
                    break;
                }
                cancel.check().map_err(|_| DynamoError::new(DynamoErrorKind::Other, false, "cancelled"))?;
            }
        }
        Ok(ExecutionOutcome::Items(items))
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive_update(
        &self,
        table: &str,
        target: &KeySource,
        update: &ExpressionTriple,
        condition: Option<&ExpressionTriple>,
        return_values: ReturnValues,
        prior_keys: &[HashMap<String, Value>],
        cancel: &CancelToken,
    ) -> Result<ExecutionOutcome, DynamoError> {
        match target {
            KeySource::Literal(key) => {
                let item = self.client.update_item(table, key, update, condition, return_values).await?;
                Ok(ExecutionOutcome::Item(item))
            }
            KeySource::FromPriorRead => {
                let mut applied = 0usize;
                for key in prior_keys {
                    self.client.update_item(table, key, update, condition, return_values).await?;
                    applied += 1;
                    cancel.check().map_err(|_| DynamoError::new(DynamoErrorKind::Other, false, "cancelled"))?;
                }
                debug!("mutation expansion updated {} item(s) in {}", applied, table);
                Ok(ExecutionOutcome::Mutated { applied })
            }
        }
    }

    async fn drive_batch_write(&self, table: &str, source: &BatchSource, prior_keys: &[HashMap<String, Value>], cancel: &CancelToken) -> Result<ExecutionOutcome, DynamoError> {
        let requests: Vec<WriteRequest> = match source {
            BatchSource::Literal(requests) => requests.clone(),
            BatchSource::DeleteFromPriorRead => prior_keys.iter().cloned().map(WriteRequest::Delete).collect(),
        };

        let mut applied = 0usize;
        for chunk in requests.chunks(25) {
            self.client.batch_write_item(table, chunk.to_vec()).await?;
            applied += chunk.len();
            cancel.check().map_err(|_| DynamoError::new(DynamoErrorKind::Other, false, "cancelled"))?;
        }
        Ok(ExecutionOutcome::Mutated { applied })
    }
}

/// The production [`DynamoClient`], backed by `aws-sdk-dynamodb`.
pub struct AwsDynamoClient {
    client: SdkClient,
    retry: RetryPolicy,
}

impl AwsDynamoClient {
    pub fn new(client: SdkClient, retry: RetryPolicy) -> Self {
        AwsDynamoClient { client, retry }
    }

    async fn with_retry<T, E, F, Fut>(&self, mut f: F) -> Result<T, DynamoError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SdkError<E>>>,
        E: std::error::Error + ProvideErrorMetadata,
    {
        let mut backoff = self.retry.backoff();
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(err) => {
                    let classified = classify(&err);
                    if !classified.retryable {
                        return Err(classified);
                    }
                    match backoff.next() {
                        Some(delay) => {
                            warn!("retrying after {:?}: {}", delay, classified.message);
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(classified),
                    }
                }
            }
        }
    }
}

pub fn classify<E: std::error::Error + ProvideErrorMetadata>(err: &SdkError<E>) -> DynamoError {
    let message = err.to_string();
    let code = err.code().unwrap_or("");
    let (kind, retryable) = match code {
        "ProvisionedThroughputExceededException" | "ThrottlingException" | "RequestLimitExceeded" => (DynamoErrorKind::Throttled, true),
        "InternalServerError" => (DynamoErrorKind::ServerError, true),
        "ConditionalCheckFailedException" => (DynamoErrorKind::ConditionalCheckFailed, false),
        "ResourceNotFoundException" => (DynamoErrorKind::ResourceNotFound, false),
        "ValidationException" => (DynamoErrorKind::ValidationError, false),
        _ => (DynamoErrorKind::Other, false),
    };
    DynamoError::new(kind, retryable, message)
}

fn attrs_to_item(attrs: &HashMap<String, AttributeValue>) -> HashMap<String, Value> {
    attrs.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect()
}

fn item_to_attrs(item: &HashMap<String, Value>) -> HashMap<String, AttributeValue> {
    item.iter().map(|(k, v)| (k.clone(), v.clone().into())).collect()
}

fn triple_names(triple: &ExpressionTriple) -> Option<HashMap<String, String>> {
    if triple.names.is_empty() {
        None
    } else {
        Some(triple.names.clone())
    }
}

fn triple_values(triple: &ExpressionTriple) -> Option<HashMap<String, AttributeValue>> {
    if triple.values.is_empty() {
        None
    } else {
        Some(triple.values.iter().map(|(k, v)| (k.clone(), v.clone().into())).collect())
    }
}

fn to_sdk_return_value(rv: ReturnValues) -> SdkReturnValue {
    match rv {
        ReturnValues::None => SdkReturnValue::None,
        ReturnValues::AllNew => SdkReturnValue::AllNew,
        ReturnValues::AllOld => SdkReturnValue::AllOld,
        ReturnValues::UpdatedNew => SdkReturnValue::UpdatedNew,
        ReturnValues::UpdatedOld => SdkReturnValue::UpdatedOld,
    }
}

fn write_request_to_sdk(req: WriteRequest) -> aws_sdk_dynamodb::types::WriteRequest {
    match req {
        WriteRequest::Put(item) => aws_sdk_dynamodb::types::WriteRequest::builder()
            .put_request(
                aws_sdk_dynamodb::types::PutRequest::builder()
                    .set_item(Some(item_to_attrs(&item)))
                    .build()
                    .expect("put request always has an item"),
            )
            .build(),
        WriteRequest::Delete(key) => aws_sdk_dynamodb::types::WriteRequest::builder()
            .delete_request(
                aws_sdk_dynamodb::types::DeleteRequest::builder()
                    .set_key(Some(item_to_attrs(&key)))
                    .build()
                    .expect("delete request always has a key"),
            )
            .build(),
    }
}

fn scalar_attribute_type(t: ScalarType) -> ScalarAttributeType {
    match t {
        ScalarType::S => ScalarAttributeType::S,
        ScalarType::N => ScalarAttributeType::N,
        ScalarType::B => ScalarAttributeType::B,
        other => panic!("{} is not a valid key attribute type", other),
    }
}

fn key_schema_for(hash: &str, range: Option<&str>) -> Vec<KeySchemaElement> {
    let mut out = vec![KeySchemaElement::builder()
        .attribute_name(hash)
        .key_type(KeyType::Hash)
        .build()
        .expect("hash key schema element")];
    if let Some(range) = range {
        out.push(
            KeySchemaElement::builder()
                .attribute_name(range)
                .key_type(KeyType::Range)
                .build()
                .expect("range key schema element"),
        );
    }
    out
}

fn sdk_projection(projection: &Projection) -> SdkProjection {
    match projection {
        Projection::All => SdkProjection::builder().projection_type(ProjectionType::All).build(),
        Projection::KeysOnly => SdkProjection::builder().projection_type(ProjectionType::KeysOnly).build(),
        Projection::Include(attrs) => SdkProjection::builder()
            .projection_type(ProjectionType::Include)
            .set_non_key_attributes(Some(attrs.clone()))
            .build(),
    }
}

fn sdk_throughput(throughput: &Throughput) -> Option<ProvisionedThroughput> {
    match throughput {
        Throughput::Provisioned { read, write } => Some(
            ProvisionedThroughput::builder()
                .read_capacity_units(*read as i64)
                .write_capacity_units(*write as i64)
                .build()
                .expect("provisioned throughput"),
        ),
        Throughput::PayPerRequest => None,
    }
}

fn gsi_decl_to_sdk(decl: &IndexDecl) -> GlobalSecondaryIndex {
    let mut builder = GlobalSecondaryIndex::builder()
        .index_name(&decl.name)
        .set_key_schema(Some(key_schema_for(&decl.hash_attr, decl.range_attr.as_deref())))
        .projection(sdk_projection(&decl.projection));
    if let Some(throughput) = decl.throughput.as_ref().and_then(sdk_throughput) {
        builder = builder.provisioned_throughput(throughput);
    }
    builder.build().expect("global secondary index")
}

fn lsi_decl_to_sdk(decl: &IndexDecl) -> LocalSecondaryIndex {
    LocalSecondaryIndex::builder()
        .index_name(&decl.name)
        .set_key_schema(Some(key_schema_for(&decl.hash_attr, decl.range_attr.as_deref())))
        .projection(sdk_projection(&decl.projection))
        .build()
        .expect("local secondary index")
}

/// Exposed beyond this module so a `SchemaProvider` implementation
/// (e.g. `src/bin/dqlc.rs`'s) can reuse the same `DescribeTable`
/// response conversion that `AwsDynamoClient::describe_table` uses.
pub fn describe_to_schema(desc: &aws_sdk_dynamodb::types::TableDescription) -> Result<TableSchema, DynamoError> {
    let name = desc.table_name().unwrap_or_default().to_string();
    let attributes: HashMap<String, ScalarType> = desc
        .attribute_definitions()
        .iter()
        .map(|a| {
            let t = match a.attribute_type() {
                ScalarAttributeType::S => ScalarType::S,
                ScalarAttributeType::N => ScalarType::N,
                ScalarAttributeType::B => ScalarType::B,
                _ => ScalarType::S,
            };
            (a.attribute_name().to_string(), t)
        })
        .collect();

    let key_attr = |name: &str| KeyAttr {
        name: name.to_string(),
        scalar_type: attributes.get(name).copied().unwrap_or(ScalarType::S),
    };

    let hash_name = desc
        .key_schema()
        .iter()
        .find(|k| k.key_type() == &KeyType::Hash)
        .map(|k| k.attribute_name().to_string())
        .ok_or_else(|| DynamoError::new(DynamoErrorKind::Other, false, "table description missing HASH key"))?;
    let range_name = desc.key_schema().iter().find(|k| k.key_type() == &KeyType::Range).map(|k| k.attribute_name().to_string());

    let gsi = desc
        .global_secondary_indexes()
        .iter()
        .map(|idx| IndexSchema {
            name: idx.index_name().unwrap_or_default().to_string(),
            kind: IndexKind::Global,
            hash: key_attr(
                idx.key_schema()
                    .iter()
                    .find(|k| k.key_type() == &KeyType::Hash)
                    .map(|k| k.attribute_name())
                    .unwrap_or_default(),
            ),
            range: idx
                .key_schema()
                .iter()
                .find(|k| k.key_type() == &KeyType::Range)
                .map(|k| key_attr(k.attribute_name())),
        })
        .collect();

    let lsi = desc
        .local_secondary_indexes()
        .iter()
        .map(|idx| IndexSchema {
            name: idx.index_name().unwrap_or_default().to_string(),
            kind: IndexKind::Local,
            hash: key_attr(hash_name.as_str()),
            range: idx
                .key_schema()
                .iter()
                .find(|k| k.key_type() == &KeyType::Range)
                .map(|k| key_attr(k.attribute_name())),
        })
        .collect();

    let throughput = match desc.billing_mode_summary() {
        Some(s) if s.billing_mode() == Some(&aws_sdk_dynamodb::types::BillingMode::PayPerRequest) => Throughput::PayPerRequest,
        _ => {
            let t = desc.provisioned_throughput();
            Throughput::Provisioned {
                read: t.and_then(|t| t.read_capacity_units()).unwrap_or(0) as u32,
                write: t.and_then(|t| t.write_capacity_units()).unwrap_or(0) as u32,
            }
        }
    };

    Ok(TableSchema {
        name,
        hash: key_attr(&hash_name),
        range: range_name.map(|n| key_attr(&n)),
        attributes,
        gsi,
        lsi,
        throughput,
        stream_enabled: desc.stream_specification().is_some_and(|s| s.stream_enabled()),
    })
}

impl DynamoClient for AwsDynamoClient {
    fn get_item<'a>(&'a self, table: &'a str, key: &'a HashMap<String, Value>, consistent: bool) -> BoxFuture<'a, Result<Option<HashMap<String, Value>>, DynamoError>> {
        Box::pin(async move {
            let res = self
                .with_retry(|| {
                    self.client
                        .get_item()
                        .table_name(table)
                        .set_key(Some(item_to_attrs(key)))
                        .consistent_read(consistent)
                        .send()
                })
                .await?;
            Ok(res.item().map(attrs_to_item))
        })
    }

    fn batch_get_item<'a>(&'a self, table: &'a str, keys: Vec<HashMap<String, Value>>, consistent: bool) -> BoxFuture<'a, Result<Vec<HashMap<String, Value>>, DynamoError>> {
        Box::pin(async move {
            let mut pending: HashMap<String, KeysAndAttributes> = HashMap::from([(
                table.to_string(),
                KeysAndAttributes::builder()
                    .set_keys(Some(keys.iter().map(item_to_attrs).collect()))
                    .consistent_read(consistent)
                    .build()
                    .expect("batch get item always has at least one key"),
            )]);
            let mut items = Vec::new();
            loop {
                let snapshot = pending.clone();
                let res = self.with_retry(|| self.client.batch_get_item().set_request_items(Some(snapshot.clone())).send()).await?;
                if let Some(rows) = res.responses().and_then(|r| r.get(table)) {
                    items.extend(rows.iter().map(attrs_to_item));
                }
                let unprocessed = res.unprocessed_keys().cloned().unwrap_or_default();
                if unprocessed.is_empty() {
                    return Ok(items);
                }
                debug!("BatchGetItem has {} unprocessed table(s), retrying", unprocessed.len());
                pending = unprocessed;
            }
        })
    }

    fn query<'a>(&'a self, op: &'a QueryOp, exclusive_start_key: Option<&'a HashMap<String, Value>>) -> BoxFuture<'a, Result<QueryPage, DynamoError>> {
        Box::pin(async move {
            let res = self
                .with_retry(|| {
                    self.client
                        .query()
                        .table_name(&op.table)
                        .set_index_name(op.index.clone())
                        .key_condition_expression(&op.key_condition.expression)
                        .set_filter_expression(op.filter.as_ref().map(|f| f.expression.clone()))
                        .set_projection_expression(op.projection.as_ref().map(|p| p.expression.clone()))
                        .set_expression_attribute_names(merge_names(&op.key_condition, op.filter.as_ref(), op.projection.as_ref()))
                        .set_expression_attribute_values(merge_values(&op.key_condition, op.filter.as_ref()))
                        .consistent_read(op.paging.consistent)
                        .scan_index_forward(op.scan_forward)
                        .set_limit(op.paging.limit.map(|l| l as i32))
                        .set_select(op.select_count.then_some(Select::Count))
                        .set_exclusive_start_key(exclusive_start_key.map(item_to_attrs))
                        .send()
                })
                .await?;
            Ok(QueryPage {
                items: res.items().iter().map(attrs_to_item).collect(),
                count: res.count().max(0) as u32,
                scanned_count: res.scanned_count().max(0) as u32,
                last_evaluated_key: res.last_evaluated_key().filter(|m| !m.is_empty()).map(attrs_to_item),
            })
        })
    }

    fn scan<'a>(&'a self, op: &'a ScanOp, exclusive_start_key: Option<&'a HashMap<String, Value>>, segment: Option<u32>) -> BoxFuture<'a, Result<QueryPage, DynamoError>> {
        Box::pin(async move {
            let res = self
                .with_retry(|| {
                    self.client
                        .scan()
                        .table_name(&op.table)
                        .set_index_name(op.index.clone())
                        .set_filter_expression(op.filter.as_ref().map(|f| f.expression.clone()))
                        .set_projection_expression(op.projection.as_ref().map(|p| p.expression.clone()))
                        .set_expression_attribute_names(merge_names_opt(op.filter.as_ref(), op.projection.as_ref()))
                        .set_expression_attribute_values(op.filter.as_ref().and_then(triple_values))
                        .consistent_read(op.paging.consistent)
                        .set_limit(op.paging.limit.map(|l| l as i32))
                        .set_select(op.select_count.then_some(Select::Count))
                        .set_segment(segment.map(|s| s as i32))
                        .set_total_segments(op.segments.map(|s| s as i32))
                        .set_exclusive_start_key(exclusive_start_key.map(item_to_attrs))
                        .send()
                })
                .await?;
            Ok(QueryPage {
                items: res.items().iter().map(attrs_to_item).collect(),
                count: res.count().max(0) as u32,
                scanned_count: res.scanned_count().max(0) as u32,
                last_evaluated_key: res.last_evaluated_key().filter(|m| !m.is_empty()).map(attrs_to_item),
            })
        })
    }

    fn put_item<'a>(&'a self, table: &'a str, item: &'a HashMap<String, Value>, condition: Option<&'a ExpressionTriple>) -> BoxFuture<'a, Result<(), DynamoError>> {
        Box::pin(async move {
            self.with_retry(|| {
                self.client
                    .put_item()
                    .table_name(table)
                    .set_item(Some(item_to_attrs(item)))
                    .set_condition_expression(condition.map(|c| c.expression.clone()))
                    .set_expression_attribute_names(condition.and_then(triple_names))
                    .set_expression_attribute_values(condition.and_then(triple_values))
                    .send()
            })
            .await?;
            Ok(())
        })
    }

    fn update_item<'a>(
        &'a self,
        table: &'a str,
        key: &'a HashMap<String, Value>,
        update: &'a ExpressionTriple,
        condition: Option<&'a ExpressionTriple>,
        return_values: ReturnValues,
    ) -> BoxFuture<'a, Result<Option<HashMap<String, Value>>, DynamoError>> {
        Box::pin(async move {
            let res = self
                .with_retry(|| {
                    self.client
                        .update_item()
                        .table_name(table)
                        .set_key(Some(item_to_attrs(key)))
                        .update_expression(&update.expression)
                        .set_condition_expression(condition.map(|c| c.expression.clone()))
                        .set_expression_attribute_names(merge_names_opt(Some(update), condition))
                        .set_expression_attribute_values(merge_values_opt(update, condition))
                        .return_values(to_sdk_return_value(return_values))
                        .send()
                })
                .await?;
            Ok(res.attributes().map(attrs_to_item))
        })
    }

    fn delete_item<'a>(
        &'a self,
        table: &'a str,
        key: &'a HashMap<String, Value>,
        condition: Option<&'a ExpressionTriple>,
        return_values: ReturnValues,
    ) -> BoxFuture<'a, Result<Option<HashMap<String, Value>>, DynamoError>> {
        Box::pin(async move {
            let res = self
                .with_retry(|| {
                    self.client
                        .delete_item()
                        .table_name(table)
                        .set_key(Some(item_to_attrs(key)))
                        .set_condition_expression(condition.map(|c| c.expression.clone()))
                        .set_expression_attribute_names(condition.and_then(triple_names))
                        .set_expression_attribute_values(condition.and_then(triple_values))
                        .return_values(to_sdk_return_value(return_values))
                        .send()
                })
                .await?;
            Ok(res.attributes().map(attrs_to_item))
        })
    }

    fn batch_write_item<'a>(&'a self, table: &'a str, requests: Vec<WriteRequest>) -> BoxFuture<'a, Result<(), DynamoError>> {
        Box::pin(async move {
            let mut pending: HashMap<String, Vec<aws_sdk_dynamodb::types::WriteRequest>> =
                HashMap::from([(table.to_string(), requests.into_iter().map(write_request_to_sdk).collect())]);
            loop {
                let snapshot = pending.clone();
                let res = self
                    .with_retry(|| self.client.batch_write_item().set_request_items(Some(snapshot.clone())).send())
                    .await?;
                let unprocessed = res.unprocessed_items().cloned().unwrap_or_default();
                if unprocessed.is_empty() {
                    return Ok(());
                }
                debug!("BatchWriteItem has {} unprocessed table(s), retrying", unprocessed.len());
                pending = unprocessed;
            }
        })
    }

    fn create_table<'a>(&'a self, stmt: &'a CreateTable) -> BoxFuture<'a, Result<(), DynamoError>> {
        Box::pin(async move {
            let hash = stmt.keys.hash().expect("semantic analysis guarantees exactly one HASH key");
            let range = stmt.keys.range();
            let attribute_definitions: Vec<AttributeDefinition> = stmt
                .keys
                .keys
                .iter()
                .map(|k| {
                    AttributeDefinition::builder()
                        .attribute_name(&k.name)
                        .attribute_type(scalar_attribute_type(k.scalar_type))
                        .build()
                        .expect("attribute definition")
                })
                .collect();

            let mut request = self
                .client
                .create_table()
                .table_name(&stmt.table)
                .set_attribute_definitions(Some(attribute_definitions))
                .set_key_schema(Some(key_schema_for(&hash.name, range.map(|r| r.name.as_str()))))
                .set_global_secondary_indexes(Some(stmt.gsi.iter().map(gsi_decl_to_sdk).collect()))
                .set_local_secondary_indexes(Some(stmt.lsi.iter().map(lsi_decl_to_sdk).collect()));

            match stmt.throughput {
                Some(Throughput::Provisioned { read, write }) => {
                    request = request
                        .billing_mode(aws_sdk_dynamodb::types::BillingMode::Provisioned)
                        .provisioned_throughput(
                            ProvisionedThroughput::builder()
                                .read_capacity_units(read as i64)
                                .write_capacity_units(write as i64)
                                .build()
                                .expect("provisioned throughput"),
                        );
                }
                _ => request = request.billing_mode(aws_sdk_dynamodb::types::BillingMode::PayPerRequest),
            }

            self.with_retry(|| request.clone().send()).await?;
            Ok(())
        })
    }

    fn update_table<'a>(&'a self, table: &'a str, action: &'a AlterAction) -> BoxFuture<'a, Result<(), DynamoError>> {
        Box::pin(async move {
            match action {
                AlterAction::SetThroughput(Throughput::Provisioned { read, write }) => {
                    self.with_retry(|| {
                        self.client
                            .update_table()
                            .table_name(table)
                            .provisioned_throughput(
                                ProvisionedThroughput::builder()
                                    .read_capacity_units(*read as i64)
                                    .write_capacity_units(*write as i64)
                                    .build()
                                    .expect("provisioned throughput"),
                            )
                            .send()
                    })
                    .await?;
                }
                AlterAction::SetThroughput(Throughput::PayPerRequest) => {
                    self.with_retry(|| self.client.update_table().table_name(table).billing_mode(aws_sdk_dynamodb::types::BillingMode::PayPerRequest).send())
                        .await?;
                }
                AlterAction::SetIndexThroughput { index, throughput } => {
                    let Throughput::Provisioned { read, write } = throughput else {
                        return Err(DynamoError::new(DynamoErrorKind::ValidationError, false, "secondary indexes cannot be switched to on-demand individually"));
                    };
                    let update = aws_sdk_dynamodb::types::GlobalSecondaryIndexUpdate::builder()
                        .update(
                            aws_sdk_dynamodb::types::UpdateGlobalSecondaryIndexAction::builder()
                                .index_name(index)
                                .provisioned_throughput(
                                    ProvisionedThroughput::builder()
                                        .read_capacity_units(*read as i64)
                                        .write_capacity_units(*write as i64)
                                        .build()
                                        .expect("provisioned throughput"),
                                )
                                .build()
                                .expect("update gsi action"),
                        )
                        .build();
                    self.with_retry(|| self.client.update_table().table_name(table).global_secondary_index_updates(update.clone()).send())
                        .await?;
                }
                AlterAction::DropIndex { index } => {
                    let update = aws_sdk_dynamodb::types::GlobalSecondaryIndexUpdate::builder()
                        .delete(aws_sdk_dynamodb::types::DeleteGlobalSecondaryIndexAction::builder().index_name(index).build().expect("delete gsi action"))
                        .build();
                    self.with_retry(|| self.client.update_table().table_name(table).global_secondary_index_updates(update.clone()).send())
                        .await?;
                }
                AlterAction::CreateIndex(decl) => {
                    let update = aws_sdk_dynamodb::types::GlobalSecondaryIndexUpdate::builder().create(gsi_create_action(decl)).build();
                    self.with_retry(|| self.client.update_table().table_name(table).global_secondary_index_updates(update.clone()).send())
                        .await?;
                }
            }
            Ok(())
        })
    }

    fn delete_table<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<(), DynamoError>> {
        Box::pin(async move {
            self.with_retry(|| self.client.delete_table().table_name(table).send()).await?;
            Ok(())
        })
    }

    fn describe_table<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<TableSchema, DynamoError>> {
        Box::pin(async move {
            let res = self.with_retry(|| self.client.describe_table().table_name(table).send()).await?;
            let desc = res
                .table()
                .ok_or_else(|| DynamoError::new(DynamoErrorKind::ResourceNotFound, false, format!("table '{}' not found", table)))?;
            describe_to_schema(desc)
        })
    }
}

fn gsi_create_action(decl: &IndexDecl) -> aws_sdk_dynamodb::types::CreateGlobalSecondaryIndexAction {
    let mut builder = aws_sdk_dynamodb::types::CreateGlobalSecondaryIndexAction::builder()
        .index_name(&decl.name)
        .set_key_schema(Some(key_schema_for(&decl.hash_attr, decl.range_attr.as_deref())))
        .projection(sdk_projection(&decl.projection));
    if let Some(throughput) = decl.throughput.as_ref().and_then(sdk_throughput) {
        builder = builder.provisioned_throughput(throughput);
    }
    builder.build().expect("create gsi action")
}

fn merge_names(key_condition: &ExpressionTriple, filter: Option<&ExpressionTriple>, projection: Option<&ExpressionTriple>) -> Option<HashMap<String, String>> {
    let mut names = key_condition.names.clone();
    for extra in [filter, projection].into_iter().flatten() {
        names.extend(extra.names.clone());
    }
    (!names.is_empty()).then_some(names)
}

fn merge_names_opt(a: Option<&ExpressionTriple>, b: Option<&ExpressionTriple>) -> Option<HashMap<String, String>> {
    let mut names = HashMap::new();
    for extra in [a, b].into_iter().flatten() {
        names.extend(extra.names.clone());
    }
    (!names.is_empty()).then_some(names)
}

fn merge_values(key_condition: &ExpressionTriple, filter: Option<&ExpressionTriple>) -> Option<HashMap<String, AttributeValue>> {
    let mut values: HashMap<String, AttributeValue> = key_condition.values.iter().map(|(k, v)| (k.clone(), v.clone().into())).collect();
    if let Some(filter) = filter {
        values.extend(filter.values.iter().map(|(k, v)| (k.clone(), v.clone().into())));
    }
    (!values.is_empty()).then_some(values)
}

fn merge_values_opt(a: &ExpressionTriple, b: Option<&ExpressionTriple>) -> Option<HashMap<String, AttributeValue>> {
    let mut values: HashMap<String, AttributeValue> = a.values.iter().map(|(k, v)| (k.clone(), v.clone().into())).collect();
    if let Some(b) = b {
        values.extend(b.values.iter().map(|(k, v)| (k.clone(), v.clone().into())));
    }
    (!values.is_empty()).then_some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Paging, PutItemOp};
    use std::sync::Mutex as StdMutex;

    /// A fake `DynamoClient` driven entirely from an in-memory table,
    /// used to test [`Executor`]'s plan-driving logic without a real
    /// DynamoDB endpoint.
    struct FakeClient {
        items: StdMutex<Vec<HashMap<String, Value>>>,
    }

    impl FakeClient {
        fn with_items(items: Vec<HashMap<String, Value>>) -> Self {
            FakeClient { items: StdMutex::new(items) }
        }
    }

    impl DynamoClient for FakeClient {
        fn get_item<'a>(&'a self, _table: &'a str, key: &'a HashMap<String, Value>, _consistent: bool) -> BoxFuture<'a, Result<Option<HashMap<String, Value>>, DynamoError>> {
            let found = self.items.lock().unwrap().iter().find(|item| key.iter().all(|(k, v)| item.get(k) == Some(v))).cloned();
            Box::pin(async move { Ok(found) })
        }

        fn batch_get_item<'a>(&'a self, _table: &'a str, keys: Vec<HashMap<String, Value>>, _consistent: bool) -> BoxFuture<'a, Result<Vec<HashMap<String, Value>>, DynamoError>> {
            let found: Vec<_> = self
                .items
                .lock()
                .unwrap()
                .iter()
                .filter(|item| keys.iter().any(|key| key.iter().all(|(k, v)| item.get(k) == Some(v))))
                .cloned()
                .collect();
            Box::pin(async move { Ok(found) })
        }

        fn query<'a>(&'a self, op: &'a QueryOp, _exclusive_start_key: Option<&'a HashMap<String, Value>>) -> BoxFuture<'a, Result<QueryPage, DynamoError>> {
            let items = self.items.lock().unwrap().clone();
            let _ = op;
            Box::pin(async move {
                Ok(QueryPage {
                    count: items.len() as u32,
                    items,
                    scanned_count: 0,
                    last_evaluated_key: None,
                })
            })
        }

        fn scan<'a>(&'a self, _op: &'a ScanOp, _exclusive_start_key: Option<&'a HashMap<String, Value>>, _segment: Option<u32>) -> BoxFuture<'a, Result<QueryPage, DynamoError>> {
            let items = self.items.lock().unwrap().clone();
            Box::pin(async move {
                Ok(QueryPage {
                    count: items.len() as u32,
                    items,
                    scanned_count: 0,
                    last_evaluated_key: None,
                })
            })
        }

        fn put_item<'a>(&'a self, _table: &'a str, item: &'a HashMap<String, Value>, _condition: Option<&'a ExpressionTriple>) -> BoxFuture<'a, Result<(), DynamoError>> {
            self.items.lock().unwrap().push(item.clone());
            Box::pin(async move { Ok(()) })
        }

        fn update_item<'a>(
            &'a self,
            _table: &'a str,
            _key: &'a HashMap<String, Value>,
            _update: &'a ExpressionTriple,
            _condition: Option<&'a ExpressionTriple>,
            _return_values: ReturnValues,
        ) -> BoxFuture<'a, Result<Option<HashMap<String, Value>>, DynamoError>> {
            Box::pin(async move { Ok(None) })
        }

        fn delete_item<'a>(
            &'a self,
            _table: &'a str,
            key: &'a HashMap<String, Value>,
            _condition: Option<&'a ExpressionTriple>,
            _return_values: ReturnValues,
        ) -> BoxFuture<'a, Result<Option<HashMap<String, Value>>, DynamoError>> {
            self.items.lock().unwrap().retain(|item| !key.iter().all(|(k, v)| item.get(k) == Some(v)));
            Box::pin(async move { Ok(None) })
        }

        fn batch_write_item<'a>(&'a self, _table: &'a str, requests: Vec<WriteRequest>) -> BoxFuture<'a, Result<(), DynamoError>> {
            let mut items = self.items.lock().unwrap();
            for req in requests {
                match req {
                    WriteRequest::Put(item) => items.push(item),
                    WriteRequest::Delete(key) => items.retain(|item| !key.iter().all(|(k, v)| item.get(k) == Some(v))),
                }
            }
            Box::pin(async move { Ok(()) })
        }

        fn create_table<'a>(&'a self, _stmt: &'a CreateTable) -> BoxFuture<'a, Result<(), DynamoError>> {
            Box::pin(async move { Ok(()) })
        }
        fn update_table<'a>(&'a self, _table: &'a str, _action: &'a AlterAction) -> BoxFuture<'a, Result<(), DynamoError>> {
            Box::pin(async move { Ok(()) })
        }
        fn delete_table<'a>(&'a self, _table: &'a str) -> BoxFuture<'a, Result<(), DynamoError>> {
            Box::pin(async move { Ok(()) })
        }
        fn describe_table<'a>(&'a self, _table: &'a str) -> BoxFuture<'a, Result<TableSchema, DynamoError>> {
            Box::pin(async move { Err(DynamoError::new(DynamoErrorKind::ResourceNotFound, false, "not wired for this test")) })
        }
    }

    fn item(id: &str) -> HashMap<String, Value> {
        HashMap::from([("id".to_string(), Value::S(id.to_string()))])
    }

    #[tokio::test]
    async fn get_item_returns_matching_item() {
        let executor = Executor::new(FakeClient::with_items(vec![item("a")]));
        let plan = ExecutionPlan::single(Operation::GetItem(GetItemOp {
            table: "t".to_string(),
            key: HashMap::from([("id".to_string(), Value::S("a".to_string()))]),
            projection: None,
            consistent: false,
        }));
        let outcome = executor.execute(&plan, &CancelToken::noop()).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Item(Some(item("a"))));
    }

    #[tokio::test]
    async fn put_item_is_acknowledged() {
        let executor = Executor::new(FakeClient::with_items(vec![]));
        let plan = ExecutionPlan::single(Operation::PutItem(PutItemOp {
            table: "t".to_string(),
            item: item("a"),
            condition: None,
        }));
        let outcome = executor.execute(&plan, &CancelToken::noop()).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Acknowledged);
    }

    #[tokio::test]
    async fn query_with_limit_truncates_accumulated_items() {
        let executor = Executor::new(FakeClient::with_items(vec![item("a"), item("b"), item("c")]));
        let plan = ExecutionPlan::single(Operation::Query(QueryOp {
            table: "t".to_string(),
            index: None,
            key_condition: ExpressionTriple::default(),
            filter: None,
            projection: None,
            paging: Paging {
                limit: Some(2),
                starting_token: None,
                consistent: false,
            },
            select_count: false,
            scan_forward: true,
        }));
        let outcome = executor.execute(&plan, &CancelToken::noop()).await.unwrap();
        match outcome {
            ExecutionOutcome::Items(items) => assert_eq!(items.len(), 2),
            other => panic!("expected Items, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn count_star_over_empty_table_is_zero() {
        let executor = Executor::new(FakeClient::with_items(vec![]));
        let plan = ExecutionPlan::single(Operation::Scan(ScanOp {
            table: "t".to_string(),
            index: None,
            filter: None,
            projection: None,
            paging: Paging::default(),
            select_count: true,
            segments: None,
        }));
        let outcome = executor.execute(&plan, &CancelToken::noop()).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Count(0));
    }

    #[tokio::test]
    async fn mutation_expansion_applies_to_every_key_from_the_read_phase() {
        let executor = Executor::new(FakeClient::with_items(vec![item("a"), item("b")]));
        let read = Operation::Scan(ScanOp {
            table: "t".to_string(),
            index: None,
            filter: None,
            projection: None,
            paging: Paging::default(),
            select_count: false,
            segments: None,
        });
        let write = Operation::BatchWriteItem(BatchWriteItemOp {
            table: "t".to_string(),
            source: BatchSource::DeleteFromPriorRead,
        });
        let plan = ExecutionPlan {
            operations: vec![read, write],
        };
        let outcome = executor.execute(&plan, &CancelToken::noop()).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Mutated { applied: 2 });
    }
}
