//! Validation result types.

use serde::{Deserialize, Serialize};

/// Rule identifiers reported in [`FieldViolation::rule_type`].
pub const RULE_REQUIRED: &str = "required";
pub const RULE_TYPE_CHECK: &str = "type_check";
pub const RULE_MIN_LENGTH: &str = "min_length";
pub const RULE_MAX_LENGTH: &str = "max_length";
pub const RULE_MAX_ITEMS: &str = "max_items";
pub const RULE_URL_FORMAT: &str = "url_format";
pub const RULE_UNKNOWN_FIELD: &str = "unknown_field";

/// Aggregated result of validating one snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<FieldViolation>,
    pub warnings: Vec<FieldViolation>,
}

/// A single field-level rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Dotted/indexed path of the offending field, e.g. `home.hero.title`.
    pub field: String,
    pub rule_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}
