//! Data-source rules: run a parameterized read, compare against the expectation

use serde_json::Value;

use super::{DefaultRuleExecutor, FaultResult, RuleFault};
use crate::contracts::{codes, DataSourceCheck, Expectation, ParamValue, RuleEvaluation, ValidationIssue};
use crate::path;
use crate::store::RecordQuery;

pub fn check(check: &DataSourceCheck) -> FaultResult<()> {
    if check.collection.trim().is_empty() {
        return Err(RuleFault::configuration("data-source collection must not be empty"));
    }
    if let Expectation::FieldExists { field } = &check.expect {
        if field.trim().is_empty() {
            return Err(RuleFault::configuration("field_exists expectation needs a field"));
        }
    }
    for (key, param) in &check.filter {
        if key.trim().is_empty() {
            return Err(RuleFault::configuration("filter keys must not be empty"));
        }
        if let ParamValue::Payload { from_payload } = param {
            if from_payload.trim().is_empty() {
                return Err(RuleFault::configuration(format!(
                    "filter '{}' references an empty payload path",
                    key
                )));
            }
        }
    }
    Ok(())
}

/// Bind filter parameters against the payload
fn build_query(check: &DataSourceCheck, payload: &Value) -> FaultResult<RecordQuery> {
    let mut query = RecordQuery::new(check.collection.as_str());
    for (key, param) in &check.filter {
        let value = match param {
            ParamValue::Literal(value) => value.clone(),
            ParamValue::Payload { from_payload } => path::lookup_present(payload, from_payload)
                .cloned()
                .ok_or_else(|| {
                    RuleFault::configuration(format!(
                        "payload has no value at '{}' for filter '{}'",
                        from_payload, key
                    ))
                })?,
        };
        query = query.with_filter(key.as_str(), value);
    }
    Ok(query)
}

fn satisfied(expect: &Expectation, rows: &[Value]) -> bool {
    match expect {
        Expectation::Count { equals } => rows.len() == *equals,
        Expectation::Empty => rows.is_empty(),
        Expectation::NonEmpty => !rows.is_empty(),
        Expectation::FieldExists { field } => {
            !rows.is_empty() && rows.iter().all(|row| path::lookup_present(row, field).is_some())
        }
    }
}

pub async fn evaluate(
    executor: &DefaultRuleExecutor,
    check_spec: &DataSourceCheck,
    payload: &Value,
) -> FaultResult<RuleEvaluation> {
    check(check_spec)?;
    let query = build_query(check_spec, payload)?;
    let rows = executor.find_records(&query).await?;

    if satisfied(&check_spec.expect, &rows) {
        return Ok(RuleEvaluation::passed());
    }

    let code = check_spec
        .code
        .clone()
        .unwrap_or_else(|| codes::DATABASE_VALIDATION_FAILED.to_string());
    let message = check_spec.message.clone().unwrap_or_else(|| {
        format!(
            "Expected {} in '{}', found {}",
            check_spec.expect.describe(),
            check_spec.collection,
            rows.len()
        )
    });
    let field = check_spec.field.clone().unwrap_or_default();

    Ok(RuleEvaluation::failed(ValidationIssue::new(field, code, message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;
    use crate::store::InMemoryStore;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn executor() -> DefaultRuleExecutor {
        let store = InMemoryStore::new();
        store
            .insert_record("account", json!({"id": "acc-1", "owner": "c-1", "status": "open"}))
            .unwrap();
        store
            .insert_record("account", json!({"id": "acc-2", "owner": "c-1"}))
            .unwrap();
        DefaultRuleExecutor::new(Arc::new(store), ExecutorConfig::default())
    }

    fn owned_by_payload(expect: Expectation) -> DataSourceCheck {
        let mut filter = BTreeMap::new();
        filter.insert(
            "owner".to_string(),
            ParamValue::Payload {
                from_payload: "id".to_string(),
            },
        );
        DataSourceCheck {
            collection: "account".to_string(),
            filter,
            expect,
            field: Some("id".to_string()),
            code: None,
            message: None,
        }
    }

    #[tokio::test]
    async fn test_expectations() {
        let executor = executor();
        let payload = json!({"id": "c-1"});

        for (expect, valid) in [
            (Expectation::Count { equals: 2 }, true),
            (Expectation::Count { equals: 1 }, false),
            (Expectation::NonEmpty, true),
            (Expectation::Empty, false),
            (Expectation::FieldExists { field: "status".to_string() }, false),
            (Expectation::FieldExists { field: "id".to_string() }, true),
        ] {
            let evaluation = evaluate(&executor, &owned_by_payload(expect.clone()), &payload)
                .await
                .unwrap();
            assert_eq!(evaluation.is_valid(), valid, "{:?}", expect);
        }
    }

    #[tokio::test]
    async fn test_default_and_declared_codes() {
        let executor = executor();
        let payload = json!({"id": "c-404"});

        let evaluation = evaluate(&executor, &owned_by_payload(Expectation::NonEmpty), &payload)
            .await
            .unwrap();
        assert_eq!(evaluation.errors[0].code, codes::DATABASE_VALIDATION_FAILED);
        assert_eq!(evaluation.errors[0].field, "id");

        let mut declared = owned_by_payload(Expectation::NonEmpty);
        declared.code = Some("NO_ACCOUNT".to_string());
        declared.message = Some("Contact has no account".to_string());
        let evaluation = evaluate(&executor, &declared, &payload).await.unwrap();
        assert_eq!(evaluation.errors[0].code, "NO_ACCOUNT");
        assert_eq!(evaluation.errors[0].message, "Contact has no account");
    }

    #[tokio::test]
    async fn test_missing_payload_parameter_is_configuration_fault() {
        let err = evaluate(&executor(), &owned_by_payload(Expectation::Empty), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RuleFault::Configuration(_)));
    }
}
