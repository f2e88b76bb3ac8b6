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

//! The six seed scenarios from §8, compiled end to end (lex → parse →
//! semantic → plan) against the fixture table `t`.

mod support;

use dql::error::DqlError;
use dql::plan::{BatchSource, KeySource, Operation};
use dql::value::Value;
use support::FixedSchemaProvider;

async fn compile(src: &str, confirmed: bool) -> Result<dql::ExecutionPlan, DqlError> {
    let schema = FixedSchemaProvider::seeded();
    dql::compile(src, &schema, confirmed).await
}

#[tokio::test]
async fn scenario_1_point_lookup_is_a_single_get_item() {
    let plan = compile("SELECT * FROM t WHERE id = 'a' AND ts = 1", false).await.unwrap();
    assert_eq!(plan.operations.len(), 1);
    match &plan.operations[0] {
        Operation::GetItem(op) => {
            assert_eq!(op.table, "t");
            assert_eq!(op.key.get("id"), Some(&Value::S("a".to_string())));
            assert_eq!(op.key.get("ts"), Some(&Value::N("1".to_string())));
        }
        other => panic!("expected GetItem, got {:?}", other),
    }
}

#[tokio::test]
async fn scenario_2_strict_range_query_rewrites_to_between_plus_filter() {
    let plan = compile("SELECT * FROM t WHERE id = 'a' AND ts > 10 AND ts < 20", false).await.unwrap();
    assert_eq!(plan.operations.len(), 1);
    match &plan.operations[0] {
        Operation::Query(op) => {
            assert_eq!(op.index, None);
            assert!(op.key_condition.expression.contains("BETWEEN"));
            // Strict bounds must be re-asserted in the filter since BETWEEN is inclusive.
            let filter = op.filter.as_ref().expect("strict bounds require a filter");
            assert!(filter.expression.contains('>') || filter.expression.contains('<'));
        }
        other => panic!("expected Query, got {:?}", other),
    }
}

#[tokio::test]
async fn scenario_3_gsi_equality_query_uses_by_user() {
    let plan = compile("SELECT * FROM t WHERE user = 'x'", false).await.unwrap();
    assert_eq!(plan.operations.len(), 1);
    match &plan.operations[0] {
        Operation::Query(op) => assert_eq!(op.index.as_deref(), Some("by_user")),
        other => panic!("expected Query, got {:?}", other),
    }
}

#[tokio::test]
async fn scenario_4_point_update_add_emits_single_update_item() {
    let plan = compile("UPDATE t ADD views 1 WHERE id = 'a' AND ts = 1", false).await.unwrap();
    assert_eq!(plan.operations.len(), 1);
    match &plan.operations[0] {
        Operation::UpdateItem(op) => {
            assert!(matches!(op.target, KeySource::Literal(_)));
            assert!(op.update.expression.starts_with("ADD"));
        }
        other => panic!("expected UpdateItem, got {:?}", other),
    }
}

#[tokio::test]
async fn scenario_5_gsi_delete_requires_confirmation_and_expands_to_two_phases() {
    let unconfirmed = compile("DELETE FROM t WHERE user = 'x'", false).await;
    assert!(matches!(unconfirmed, Err(DqlError::Semantic(_))), "expected a confirmation error, got {:?}", unconfirmed);

    let plan = compile("DELETE FROM t WHERE user = 'x'", true).await.unwrap();
    assert_eq!(plan.operations.len(), 2);
    match &plan.operations[0] {
        Operation::Query(op) => assert_eq!(op.index.as_deref(), Some("by_user")),
        other => panic!("expected Query read phase, got {:?}", other),
    }
    match &plan.operations[1] {
        Operation::BatchWriteItem(op) => assert!(matches!(op.source, BatchSource::DeleteFromPriorRead)),
        other => panic!("expected BatchWriteItem write phase, got {:?}", other),
    }
}

#[tokio::test]
async fn scenario_6_count_star_query_is_marked_select_count() {
    let plan = compile("SELECT count(*) FROM t WHERE id = 'a'", false).await.unwrap();
    assert_eq!(plan.operations.len(), 1);
    match &plan.operations[0] {
        Operation::Query(op) => assert!(op.select_count),
        other => panic!("expected Query, got {:?}", other),
    }
}
