//! Rule definitions for entity validation
//!
//! A [`RuleDefinition`] is immutable per version. Changing a rule means
//! inserting a new version and deactivating the previous one, so historical
//! outcomes keep a valid reference to the exact rule that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{Domain, ExecutionKind};

/// One versioned validation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Stable identifier of this version
    pub id: Uuid,

    /// Rule name, unique among the active rules of a domain
    pub name: String,

    /// Domain the rule applies to
    pub domain: Domain,

    /// Validation path the rule runs on
    pub execution_kind: ExecutionKind,

    /// Monotonic version number, starting at 1
    pub version: u32,

    /// Whether this version is the active one
    pub is_active: bool,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// What the rule checks
    pub definition: RuleKind,

    /// When this version was created
    pub created_at: DateTime<Utc>,
}

impl RuleDefinition {
    /// Materialize a new rule at version 1
    pub fn from_new(rule: NewRule) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: rule.name,
            domain: rule.domain,
            execution_kind: rule.execution_kind,
            version: 1,
            is_active: true,
            description: rule.description,
            definition: rule.definition,
            created_at: Utc::now(),
        }
    }

    /// Build the version that supersedes `self`
    pub fn next_version(&self, rule: NewRule) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: self.name.clone(),
            domain: self.domain.clone(),
            execution_kind: rule.execution_kind,
            version: self.version + 1,
            is_active: true,
            description: rule.description,
            definition: rule.definition,
            created_at: Utc::now(),
        }
    }
}

/// Administrative request to create (or supersede) a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    pub name: String,
    pub domain: Domain,
    pub execution_kind: ExecutionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub definition: RuleKind,
}

impl NewRule {
    /// Create a new rule request
    pub fn new(
        name: impl Into<String>,
        domain: Domain,
        execution_kind: ExecutionKind,
        definition: RuleKind,
    ) -> Self {
        Self {
            name: name.into(),
            domain,
            execution_kind,
            description: None,
            definition,
        }
    }

    /// Add a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The closed set of rule kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// Structural, type and range checks over named fields
    Schema(SchemaSpec),
    /// A named built-in predicate
    Custom(CustomPredicate),
    /// A read against the record store compared to an expectation
    DataSource(DataSourceCheck),
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Schema(_) => "schema",
            RuleKind::Custom(_) => "custom",
            RuleKind::DataSource(_) => "data_source",
        }
    }
}

/// Field specification of a schema rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSpec {
    /// Field specs keyed by dotted path (e.g. `address.city`)
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,

    /// Reject top-level fields that are not listed in `fields`
    #[serde(default)]
    pub strict: bool,
}

impl SchemaSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field specification
    pub fn with_field(mut self, path: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(path.into(), spec);
        self
    }

    /// Reject unknown top-level fields
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// Constraints on a single field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FieldFormat>,

    /// Regular expression the (string) value must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Inclusive numeric lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Inclusive numeric upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Minimum length for strings and arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Maximum length for strings and arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<serde_json::Value>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Default::default()
        }
    }

    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_length(mut self, min_length: Option<usize>, max_length: Option<usize>) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;
        self
    }

    pub fn with_allowed_values(mut self, values: Vec<serde_json::Value>) -> Self {
        self.allowed_values = values;
        self
    }
}

/// JSON type expected for a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    #[default]
    Any,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Any => "any",
        }
    }

    /// Whether `value` has this type
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => !matches!(value, Value::Null),
        }
    }
}

/// Well-known string formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFormat {
    Email,
    Phone,
    Url,
    Uuid,
    Date,
    DateTime,
}

impl FieldFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldFormat::Email => "email",
            FieldFormat::Phone => "phone",
            FieldFormat::Url => "url",
            FieldFormat::Uuid => "uuid",
            FieldFormat::Date => "date",
            FieldFormat::DateTime => "date_time",
        }
    }
}

/// Built-in predicates available to custom rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "predicate", rename_all = "snake_case")]
pub enum CustomPredicate {
    /// No other active record may share the value of `field`
    Uniqueness {
        field: String,
        /// Record collection to search, defaults to the entity type
        #[serde(default, skip_serializing_if = "Option::is_none")]
        collection: Option<String>,
        #[serde(default)]
        case_insensitive: bool,
    },

    /// Following `parent_field` from the proposed parent must never reach
    /// the entity itself
    Acyclicity {
        parent_field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_depth: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        collection: Option<String>,
    },

    /// Child attributes listed in `fields` should match the parent's.
    /// Divergence only produces warnings.
    HierarchyConsistency {
        parent_field: String,
        fields: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        collection: Option<String>,
    },
}

impl CustomPredicate {
    pub fn name(&self) -> &'static str {
        match self {
            CustomPredicate::Uniqueness { .. } => "uniqueness",
            CustomPredicate::Acyclicity { .. } => "acyclicity",
            CustomPredicate::HierarchyConsistency { .. } => "hierarchy_consistency",
        }
    }
}

/// Parameterized read plus the expected result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceCheck {
    /// Record collection to read
    pub collection: String,

    /// Exact-match filter; values may be literals or payload references
    #[serde(default)]
    pub filter: BTreeMap<String, ParamValue>,

    /// What the read must return
    pub expect: Expectation,

    /// Field reported on the issue when the expectation fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A query parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Taken from the payload at the given dotted path
    Payload { from_payload: String },
    /// Used as-is
    Literal(serde_json::Value),
}

/// Expected result of a data-source read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expectation {
    /// Exactly `equals` rows
    Count { equals: usize },
    /// No rows
    Empty,
    /// At least one row
    NonEmpty,
    /// At least one row, and every row has a non-null `field`
    FieldExists { field: String },
}

impl Expectation {
    pub fn describe(&self) -> String {
        match self {
            Expectation::Count { equals } => format!("exactly {} row(s)", equals),
            Expectation::Empty => "no rows".to_string(),
            Expectation::NonEmpty => "at least one row".to_string(),
            Expectation::FieldExists { field } => format!("rows with field '{}'", field),
        }
    }
}
