//! Schema rule evaluation
//!
//! Every violated constraint yields one issue whose `code` names the
//! constraint. Nothing short-circuits except a type mismatch, after which the
//! remaining checks on that field would be meaningless. Fields are visited in
//! path order, so the issue list is deterministic.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use super::{FaultResult, RuleFault};
use crate::contracts::{codes, FieldFormat, FieldSpec, RuleEvaluation, SchemaSpec, ValidationIssue};
use crate::path;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ().-]{5,19}$").expect("valid regex"));
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid regex"));

/// Reject field specs that can never be evaluated
pub fn check(spec: &SchemaSpec) -> FaultResult<()> {
    for (field, constraints) in &spec.fields {
        if field.trim().is_empty() {
            return Err(RuleFault::configuration("schema field path must not be empty"));
        }
        compile_pattern(field, constraints)?;
        if let (Some(min), Some(max)) = (constraints.min, constraints.max) {
            if min > max {
                return Err(RuleFault::configuration(format!(
                    "field '{}' has min {} greater than max {}",
                    field, min, max
                )));
            }
        }
        if let (Some(min), Some(max)) = (constraints.min_length, constraints.max_length) {
            if min > max {
                return Err(RuleFault::configuration(format!(
                    "field '{}' has min_length {} greater than max_length {}",
                    field, min, max
                )));
            }
        }
    }
    Ok(())
}

fn compile_pattern(field: &str, spec: &FieldSpec) -> FaultResult<Option<Regex>> {
    spec.pattern
        .as_deref()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| {
                RuleFault::configuration(format!("invalid pattern for field '{}': {}", field, e))
            })
        })
        .transpose()
}

/// Validate `payload` against `spec`
pub fn evaluate(spec: &SchemaSpec, payload: &Value) -> FaultResult<RuleEvaluation> {
    let mut evaluation = RuleEvaluation::passed();

    for (field, constraints) in &spec.fields {
        let pattern = compile_pattern(field, constraints)?;
        check_field(field, constraints, pattern.as_ref(), payload, &mut evaluation);
    }

    if spec.strict {
        if let Value::Object(map) = payload {
            for key in map.keys() {
                let declared = spec
                    .fields
                    .keys()
                    .any(|f| f.split('.').next() == Some(key.as_str()));
                if !declared {
                    evaluation.push_error(ValidationIssue::new(
                        key.as_str(),
                        codes::UNKNOWN_FIELD,
                        format!("Field '{}' is not allowed", key),
                    ));
                }
            }
        }
    }

    Ok(evaluation)
}

fn check_field(
    field: &str,
    spec: &FieldSpec,
    pattern: Option<&Regex>,
    payload: &Value,
    evaluation: &mut RuleEvaluation,
) {
    let Some(value) = path::lookup_present(payload, field) else {
        if spec.required {
            evaluation.push_error(ValidationIssue::new(
                field,
                codes::REQUIRED,
                format!("Field '{}' is required", field),
            ));
        }
        return;
    };

    if !spec.field_type.matches(value) {
        evaluation.push_error(
            ValidationIssue::new(
                field,
                codes::TYPE,
                format!("Field '{}' must be of type {}", field, spec.field_type.as_str()),
            )
            .with_value(value.clone()),
        );
        return;
    }

    if let Some(text) = value.as_str() {
        if let Some(format) = spec.format {
            if !matches_format(format, text) {
                evaluation.push_error(
                    ValidationIssue::new(
                        field,
                        codes::FORMAT,
                        format!("Field '{}' must be a valid {}", field, format.as_str()),
                    )
                    .with_value(value.clone()),
                );
            }
        }

        if let Some(re) = pattern {
            if !re.is_match(text) {
                evaluation.push_error(
                    ValidationIssue::new(
                        field,
                        codes::PATTERN,
                        format!("Field '{}' does not match pattern {}", field, re.as_str()),
                    )
                    .with_value(value.clone()),
                );
            }
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = spec.min {
            if number < min {
                evaluation.push_error(
                    ValidationIssue::new(field, codes::MIN, format!("Field '{}' must be >= {}", field, min))
                        .with_value(value.clone()),
                );
            }
        }
        if let Some(max) = spec.max {
            if number > max {
                evaluation.push_error(
                    ValidationIssue::new(field, codes::MAX, format!("Field '{}' must be <= {}", field, max))
                        .with_value(value.clone()),
                );
            }
        }
    }

    let length = match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    };
    if let Some(length) = length {
        if let Some(min) = spec.min_length {
            if length < min {
                evaluation.push_error(ValidationIssue::new(
                    field,
                    codes::MIN_LENGTH,
                    format!("Field '{}' must have at least {} element(s)", field, min),
                ));
            }
        }
        if let Some(max) = spec.max_length {
            if length > max {
                evaluation.push_error(ValidationIssue::new(
                    field,
                    codes::MAX_LENGTH,
                    format!("Field '{}' must have at most {} element(s)", field, max),
                ));
            }
        }
    }

    if !spec.allowed_values.is_empty()
        && !spec.allowed_values.iter().any(|allowed| path::values_equal(value, allowed, false))
    {
        evaluation.push_error(
            ValidationIssue::new(field, codes::ENUM, format!("Field '{}' has a value outside the allowed set", field))
                .with_value(value.clone()),
        );
    }
}

fn matches_format(format: FieldFormat, text: &str) -> bool {
    match format {
        FieldFormat::Email => EMAIL_RE.is_match(text),
        FieldFormat::Phone => PHONE_RE.is_match(text),
        FieldFormat::Url => URL_RE.is_match(text),
        FieldFormat::Uuid => uuid::Uuid::parse_str(text).is_ok(),
        FieldFormat::Date => chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok(),
        FieldFormat::DateTime => chrono::DateTime::parse_from_rfc3339(text).is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::FieldType;
    use proptest::prelude::*;
    use serde_json::json;

    fn contact_schema() -> SchemaSpec {
        SchemaSpec::new()
            .with_field("email", FieldSpec::required(FieldType::String).with_format(FieldFormat::Email))
            .with_field("name", FieldSpec::required(FieldType::String).with_length(Some(1), Some(50)))
            .with_field("age", FieldSpec::new(FieldType::Integer).with_range(Some(0.0), Some(150.0)))
            .with_field(
                "status",
                FieldSpec::new(FieldType::String).with_allowed_values(vec![json!("active"), json!("archived")]),
            )
            .with_field("address.zip", FieldSpec::new(FieldType::String).with_pattern(r"^\d{5}$"))
    }

    fn codes_of(evaluation: &RuleEvaluation) -> Vec<(String, String)> {
        evaluation
            .errors
            .iter()
            .map(|i| (i.field.clone(), i.code.clone()))
            .collect()
    }

    #[test]
    fn test_valid_payload() {
        let payload = json!({
            "email": "ada@example.com",
            "name": "Ada",
            "age": 36,
            "status": "active",
            "address": { "zip": "12345" }
        });
        let evaluation = evaluate(&contact_schema(), &payload).unwrap();
        assert!(evaluation.is_valid());
    }

    #[test]
    fn test_collects_every_violation() {
        let payload = json!({
            "email": "not-an-email",
            "age": 200,
            "status": "deleted",
            "address": { "zip": "abc" }
        });
        let evaluation = evaluate(&contact_schema(), &payload).unwrap();
        let found = codes_of(&evaluation);

        assert!(found.contains(&("email".to_string(), codes::FORMAT.to_string())));
        assert!(found.contains(&("name".to_string(), codes::REQUIRED.to_string())));
        assert!(found.contains(&("age".to_string(), codes::MAX.to_string())));
        assert!(found.contains(&("status".to_string(), codes::ENUM.to_string())));
        assert!(found.contains(&("address.zip".to_string(), codes::PATTERN.to_string())));
        assert_eq!(found.len(), 5);
    }

    #[test]
    fn test_type_mismatch_stops_field_checks() {
        let spec = SchemaSpec::new().with_field(
            "name",
            FieldSpec::required(FieldType::String).with_length(Some(3), None),
        );
        let evaluation = evaluate(&spec, &json!({"name": 12})).unwrap();
        assert_eq!(codes_of(&evaluation), vec![("name".to_string(), codes::TYPE.to_string())]);
    }

    #[test]
    fn test_null_counts_as_missing() {
        let spec = SchemaSpec::new().with_field("name", FieldSpec::required(FieldType::String));
        let evaluation = evaluate(&spec, &json!({"name": null})).unwrap();
        assert_eq!(evaluation.errors[0].code, codes::REQUIRED);
    }

    #[test]
    fn test_strict_rejects_unknown_fields() {
        let spec = SchemaSpec::new()
            .with_field("address.city", FieldSpec::new(FieldType::String))
            .strict();
        let evaluation = evaluate(&spec, &json!({"address": {"city": "Oslo"}, "extra": 1})).unwrap();
        assert_eq!(codes_of(&evaluation), vec![("extra".to_string(), codes::UNKNOWN_FIELD.to_string())]);
    }

    #[test]
    fn test_formats() {
        assert!(matches_format(FieldFormat::Uuid, "67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(matches_format(FieldFormat::Date, "2024-02-29"));
        assert!(!matches_format(FieldFormat::Date, "2023-02-29"));
        assert!(matches_format(FieldFormat::DateTime, "2024-01-01T10:00:00Z"));
        assert!(matches_format(FieldFormat::Url, "https://example.com/a"));
        assert!(!matches_format(FieldFormat::Url, "ftp//nope"));
        assert!(matches_format(FieldFormat::Phone, "+47 555 12 345"));
        assert!(!matches_format(FieldFormat::Phone, "call me"));
    }

    #[test]
    fn test_check_rejects_inverted_range() {
        let spec = SchemaSpec::new().with_field("age", FieldSpec::new(FieldType::Number).with_range(Some(5.0), Some(1.0)));
        assert!(check(&spec).is_err());
        assert!(check(&contact_schema()).is_ok());
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z@.]{0,12}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop::collection::btree_map("(email|name|age|status|address|zip|x)", inner, 0..5)
                .prop_map(|m| Value::Object(m.into_iter().collect()))
        })
    }

    proptest! {
        #[test]
        fn prop_schema_checks_are_deterministic(payload in arb_json()) {
            let spec = contact_schema();
            let mut first = codes_of(&evaluate(&spec, &payload).unwrap());
            let mut second = codes_of(&evaluate(&spec, &payload).unwrap());
            first.sort();
            second.sort();
            prop_assert_eq!(first, second);
        }
    }
}
