//! Built-in custom predicates
//!
//! Each predicate reads from the record store through the executor, so every
//! read is subject to the executor's query timeout. Records are looked up in
//! `collection` when set, otherwise in the collection named after the entity
//! type.

use serde_json::Value;

use super::{DefaultRuleExecutor, FaultResult, RuleFault};
use crate::contracts::{codes, CustomPredicate, RuleEvaluation, ValidationIssue};
use crate::path::{as_key, entity_id, lookup_present, values_equal};
use crate::store::{record_is_active, RecordQuery};

pub fn check(predicate: &CustomPredicate) -> FaultResult<()> {
    match predicate {
        CustomPredicate::Uniqueness { field, .. } => require_field("field", field),
        CustomPredicate::Acyclicity {
            parent_field,
            max_depth,
            ..
        } => {
            require_field("parent_field", parent_field)?;
            if *max_depth == Some(0) {
                return Err(RuleFault::configuration("max_depth must be at least 1"));
            }
            Ok(())
        }
        CustomPredicate::HierarchyConsistency {
            parent_field,
            fields,
            ..
        } => {
            require_field("parent_field", parent_field)?;
            if fields.is_empty() {
                return Err(RuleFault::configuration("hierarchy_consistency needs at least one field"));
            }
            fields.iter().try_for_each(|f| require_field("fields", f))
        }
    }
}

fn require_field(param: &str, value: &str) -> FaultResult<()> {
    if value.trim().is_empty() {
        Err(RuleFault::configuration(format!("parameter '{}' must not be empty", param)))
    } else {
        Ok(())
    }
}

pub async fn evaluate(
    executor: &DefaultRuleExecutor,
    predicate: &CustomPredicate,
    payload: &Value,
    entity_type: &str,
) -> FaultResult<RuleEvaluation> {
    check(predicate)?;

    match predicate {
        CustomPredicate::Uniqueness {
            field,
            collection,
            case_insensitive,
        } => {
            let collection = collection.as_deref().unwrap_or(entity_type);
            uniqueness(executor, collection, field, *case_insensitive, payload).await
        }
        CustomPredicate::Acyclicity {
            parent_field,
            max_depth,
            collection,
        } => {
            let collection = collection.as_deref().unwrap_or(entity_type);
            let depth = max_depth.unwrap_or(executor.config().max_hierarchy_depth);
            acyclicity(executor, collection, parent_field, depth, payload).await
        }
        CustomPredicate::HierarchyConsistency {
            parent_field,
            fields,
            collection,
        } => {
            let collection = collection.as_deref().unwrap_or(entity_type);
            hierarchy_consistency(executor, collection, parent_field, fields, payload).await
        }
    }
}

/// Fails when another active record shares the value of `field`
async fn uniqueness(
    executor: &DefaultRuleExecutor,
    collection: &str,
    field: &str,
    case_insensitive: bool,
    payload: &Value,
) -> FaultResult<RuleEvaluation> {
    let Some(value) = lookup_present(payload, field) else {
        return Ok(RuleEvaluation::passed());
    };

    let query = RecordQuery::new(collection)
        .with_filter(field, value.clone())
        .case_insensitive(case_insensitive);
    let self_id = entity_id(payload);

    let duplicate = executor
        .find_records(&query)
        .await?
        .iter()
        .filter(|record| record_is_active(record))
        .any(|record| self_id.is_none() || entity_id(record) != self_id);

    if duplicate {
        return Ok(RuleEvaluation::failed(
            ValidationIssue::new(
                field,
                codes::NOT_UNIQUE,
                format!("Another active {} already uses this {}", collection, field),
            )
            .with_value(value.clone()),
        ));
    }

    Ok(RuleEvaluation::passed())
}

/// Fails when following parent pointers from the proposed parent reaches the
/// entity itself within `max_depth` hops
async fn acyclicity(
    executor: &DefaultRuleExecutor,
    collection: &str,
    parent_field: &str,
    max_depth: usize,
    payload: &Value,
) -> FaultResult<RuleEvaluation> {
    let (Some(self_id), Some(parent_id)) = (
        entity_id(payload),
        lookup_present(payload, parent_field).and_then(as_key),
    ) else {
        return Ok(RuleEvaluation::passed());
    };

    let mut current = parent_id.clone();
    for _ in 0..max_depth {
        if current == self_id {
            return Ok(RuleEvaluation::failed(
                ValidationIssue::new(
                    parent_field,
                    codes::CIRCULAR_DEPENDENCY,
                    format!("Setting parent '{}' would create a circular hierarchy", parent_id),
                )
                .with_value(Value::String(parent_id)),
            ));
        }

        let Some(record) = executor.get_record(collection, &current).await? else {
            return Ok(RuleEvaluation::passed());
        };
        match lookup_present(&record, parent_field).and_then(as_key) {
            Some(next) => current = next,
            None => return Ok(RuleEvaluation::passed()),
        }
    }

    tracing::debug!(
        collection = collection,
        entity_id = %self_id,
        max_depth = max_depth,
        "Hierarchy traversal hit depth limit"
    );

    let mut evaluation = RuleEvaluation::passed();
    evaluation.push_warning(ValidationIssue::new(
        parent_field,
        codes::HIERARCHY_DEPTH_EXCEEDED,
        format!("Hierarchy deeper than {} levels was not fully checked", max_depth),
    ));
    Ok(evaluation)
}

/// Warns for every listed attribute that differs from the parent's
async fn hierarchy_consistency(
    executor: &DefaultRuleExecutor,
    collection: &str,
    parent_field: &str,
    fields: &[String],
    payload: &Value,
) -> FaultResult<RuleEvaluation> {
    let Some(parent_id) = lookup_present(payload, parent_field).and_then(as_key) else {
        return Ok(RuleEvaluation::passed());
    };
    let Some(parent) = executor.get_record(collection, &parent_id).await? else {
        return Ok(RuleEvaluation::passed());
    };

    let mut evaluation = RuleEvaluation::passed();
    for field in fields {
        let consistent = match (lookup_present(payload, field), lookup_present(&parent, field)) {
            (Some(child), Some(parent)) => values_equal(child, parent, false),
            (None, None) => true,
            _ => false,
        };
        if !consistent {
            let mut issue = ValidationIssue::new(
                field.as_str(),
                codes::HIERARCHY_INCONSISTENT,
                format!("'{}' differs from parent '{}'", field, parent_id),
            );
            if let Some(value) = lookup_present(payload, field) {
                issue = issue.with_value(value.clone());
            }
            evaluation.push_warning(issue);
        }
    }
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;
    use crate::store::InMemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn executor_with(records: &[(&str, Value)]) -> DefaultRuleExecutor {
        let store = InMemoryStore::new();
        for (collection, record) in records {
            store.insert_record(*collection, record.clone()).unwrap();
        }
        DefaultRuleExecutor::new(Arc::new(store), ExecutorConfig::default())
    }

    fn acyclic() -> CustomPredicate {
        CustomPredicate::Acyclicity {
            parent_field: "parent_id".to_string(),
            max_depth: None,
            collection: None,
        }
    }

    #[tokio::test]
    async fn test_uniqueness_ignores_self_and_inactive() {
        let executor = executor_with(&[
            ("contact", json!({"id": "c-1", "email": "a@x.io"})),
            ("contact", json!({"id": "c-9", "email": "old@x.io", "is_active": false})),
        ]);
        let predicate = CustomPredicate::Uniqueness {
            field: "email".to_string(),
            collection: None,
            case_insensitive: true,
        };

        let same = evaluate(&executor, &predicate, &json!({"id": "c-1", "email": "a@x.io"}), "contact")
            .await
            .unwrap();
        assert!(same.is_valid());

        let other = evaluate(&executor, &predicate, &json!({"id": "c-2", "email": "A@X.io"}), "contact")
            .await
            .unwrap();
        assert_eq!(other.errors.len(), 1);
        assert_eq!(other.errors[0].code, codes::NOT_UNIQUE);

        let inactive = evaluate(&executor, &predicate, &json!({"email": "old@x.io"}), "contact")
            .await
            .unwrap();
        assert!(inactive.is_valid());
    }

    #[tokio::test]
    async fn test_acyclicity_detects_cycle() {
        let executor = executor_with(&[
            ("workflow", json!({"id": "A"})),
            ("workflow", json!({"id": "B", "parent_id": "A"})),
            ("workflow", json!({"id": "C", "parent_id": "B"})),
        ]);

        let cycle = evaluate(&executor, &acyclic(), &json!({"id": "A", "parent_id": "C"}), "workflow")
            .await
            .unwrap();
        assert_eq!(cycle.errors.len(), 1);
        assert_eq!(cycle.errors[0].code, codes::CIRCULAR_DEPENDENCY);

        let fine = evaluate(&executor, &acyclic(), &json!({"id": "D", "parent_id": "C"}), "workflow")
            .await
            .unwrap();
        assert!(fine.is_valid());

        let self_parent = evaluate(&executor, &acyclic(), &json!({"id": "A", "parent_id": "A"}), "workflow")
            .await
            .unwrap();
        assert!(!self_parent.is_valid());
    }

    #[tokio::test]
    async fn test_acyclicity_depth_limit_warns() {
        let records: Vec<(&str, Value)> = (0..6)
            .map(|i| ("workflow", json!({"id": format!("n{}", i), "parent_id": format!("n{}", i + 1)})))
            .collect();
        let executor = executor_with(&records);
        let predicate = CustomPredicate::Acyclicity {
            parent_field: "parent_id".to_string(),
            max_depth: Some(3),
            collection: None,
        };

        let evaluation = evaluate(&executor, &predicate, &json!({"id": "x", "parent_id": "n0"}), "workflow")
            .await
            .unwrap();
        assert!(evaluation.is_valid());
        assert_eq!(evaluation.warnings[0].code, codes::HIERARCHY_DEPTH_EXCEEDED);
    }

    #[tokio::test]
    async fn test_hierarchy_consistency_only_warns() {
        let executor = executor_with(&[("team", json!({"id": "t-1", "region": "EU", "currency": "EUR"}))]);
        let predicate = CustomPredicate::HierarchyConsistency {
            parent_field: "parent_id".to_string(),
            fields: vec!["region".to_string(), "currency".to_string()],
            collection: None,
        };

        let evaluation = evaluate(
            &executor,
            &predicate,
            &json!({"id": "t-2", "parent_id": "t-1", "region": "US", "currency": "EUR"}),
            "team",
        )
        .await
        .unwrap();
        assert!(evaluation.is_valid());
        assert_eq!(evaluation.warnings.len(), 1);
        assert_eq!(evaluation.warnings[0].field, "region");
    }

    #[tokio::test]
    async fn test_zero_depth_is_configuration_fault() {
        let executor = executor_with(&[]);
        let predicate = CustomPredicate::Acyclicity {
            parent_field: "parent_id".to_string(),
            max_depth: Some(0),
            collection: None,
        };
        let err = evaluate(&executor, &predicate, &json!({"id": "a"}), "workflow")
            .await
            .unwrap_err();
        assert!(matches!(err, RuleFault::Configuration(_)));
    }
}
