use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LimitsConfig;

/// Request validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestValidatorConfig {
    /// Maximum medications in a history
    pub max_history_entries: usize,
    /// Maximum length of a single drug name
    pub max_drug_name_length: usize,
    /// Maximum string length in any other field
    pub max_text_length: usize,
    /// Maximum overrides per page
    pub max_page_size: usize,
    /// Maximum object nesting depth
    pub max_nesting_depth: usize,
}

impl Default for RequestValidatorConfig {
    fn default() -> Self {
        Self {
            max_history_entries: 100,
            max_drug_name_length: 200,
            max_text_length: 5000,
            max_page_size: 100,
            max_nesting_depth: 4,
        }
    }
}

impl From<&LimitsConfig> for RequestValidatorConfig {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            max_history_entries: limits.max_history_entries,
            max_drug_name_length: limits.max_drug_name_length,
            max_text_length: limits.max_text_length,
            max_page_size: limits.max_page_size,
            ..Self::default()
        }
    }
}

/// Validation result
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    fn ok() -> Self {
        Self { valid: true, issues: Vec::new() }
    }

    fn reject(&mut self, field: &str, issue_type: ValidationIssueType, message: String) {
        self.valid = false;
        self.issues.push(ValidationIssue {
            field: Some(field.to_string()),
            issue_type,
            message,
            severity: ValidationSeverity::Error,
        });
    }

    /// Error issues joined into one message
    pub fn error_message(&self) -> String {
        self.issues
            .iter()
            .filter(|i| i.severity >= ValidationSeverity::Error)
            .map(|i| match &i.field {
                Some(field) => format!("{}: {}", field, i.message),
                None => i.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: Option<String>,
    pub issue_type: ValidationIssueType,
    pub message: String,
    pub severity: ValidationSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssueType {
    SizeLimit,
    CountLimit,
    DepthLimit,
    FormatError,
    SuspiciousContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationSeverity {
    Warning,
    Error,
}

/// Validates tool arguments before they reach the engine
pub struct RequestValidator {
    config: RequestValidatorConfig,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new(RequestValidatorConfig::default())
    }
}

impl RequestValidator {
    pub fn new(config: RequestValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate JSON value recursively
    pub fn validate_json_value(&self, value: &Value, field_path: &str, depth: usize) -> ValidationResult {
        let mut result = ValidationResult::ok();

        if depth > self.config.max_nesting_depth {
            result.reject(
                field_path,
                ValidationIssueType::DepthLimit,
                format!(
                    "Nesting depth ({}) exceeds maximum allowed ({})",
                    depth, self.config.max_nesting_depth
                ),
            );
            return result;
        }

        match value {
            Value::String(s) => {
                if s.len() > self.config.max_text_length {
                    result.reject(
                        field_path,
                        ValidationIssueType::SizeLimit,
                        format!(
                            "String length ({}) exceeds maximum allowed ({})",
                            s.len(),
                            self.config.max_text_length
                        ),
                    );
                }

                if self.contains_suspicious_content(s) {
                    warn!("Suspicious content in field '{}'", field_path);
                    result.issues.push(ValidationIssue {
                        field: Some(field_path.to_string()),
                        issue_type: ValidationIssueType::SuspiciousContent,
                        message: "String contains potentially malicious content".to_string(),
                        severity: ValidationSeverity::Warning,
                    });
                }
            }

            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}[{}]", field_path, i);
                    merge(&mut result, self.validate_json_value(item, &item_path, depth + 1));
                }
            }

            Value::Object(obj) => {
                for (key, val) in obj {
                    let prop_path = if field_path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", field_path, key)
                    };
                    merge(&mut result, self.validate_json_value(val, &prop_path, depth + 1));
                }
            }

            _ => {}
        }

        result
    }

    /// Validate specific tool parameters
    pub fn validate_tool_parameters(&self, tool_name: &str, parameters: &Value) -> ValidationResult {
        let mut result = self.validate_json_value(parameters, "", 0);

        match tool_name {
            "validate_prescription" => self.validate_prescription_params(parameters, &mut result),
            "list_overrides" => self.validate_pagination_params(parameters, &mut result),
            "patient_lookup" => self.validate_drug_name_field(parameters, "abha_id", &mut result),
            "log_override" => self.validate_drug_name_field(parameters, "drug", &mut result),
            _ => {
                debug!("No specific validation for tool: {}", tool_name);
            }
        }

        result
    }

    fn validate_prescription_params(&self, params: &Value, result: &mut ValidationResult) {
        self.validate_drug_name_field(params, "new_medicine", result);

        let Some(history) = params.get("history") else {
            return;
        };
        let Some(entries) = history.as_array() else {
            result.reject(
                "history",
                ValidationIssueType::FormatError,
                "history must be an array of medication names".to_string(),
            );
            return;
        };

        if entries.len() > self.config.max_history_entries {
            result.reject(
                "history",
                ValidationIssueType::CountLimit,
                format!(
                    "History size ({}) exceeds maximum allowed ({})",
                    entries.len(),
                    self.config.max_history_entries
                ),
            );
        }

        for (i, entry) in entries.iter().enumerate() {
            match entry.as_str() {
                Some(name) if name.len() > self.config.max_drug_name_length => result.reject(
                    &format!("history[{}]", i),
                    ValidationIssueType::SizeLimit,
                    format!(
                        "Drug name length ({}) exceeds maximum allowed ({})",
                        name.len(),
                        self.config.max_drug_name_length
                    ),
                ),
                Some(_) => {}
                None => result.reject(
                    &format!("history[{}]", i),
                    ValidationIssueType::FormatError,
                    "medication names must be strings".to_string(),
                ),
            }
        }
    }

    fn validate_drug_name_field(&self, params: &Value, field: &str, result: &mut ValidationResult) {
        if let Some(name) = params.get(field).and_then(|v| v.as_str()) {
            if name.len() > self.config.max_drug_name_length {
                result.reject(
                    field,
                    ValidationIssueType::SizeLimit,
                    format!(
                        "{} length ({}) exceeds maximum allowed ({})",
                        field,
                        name.len(),
                        self.config.max_drug_name_length
                    ),
                );
            }
        }
    }

    fn validate_pagination_params(&self, params: &Value, result: &mut ValidationResult) {
        if let Some(per_page) = params.get("per_page").and_then(|v| v.as_u64()) {
            if per_page as usize > self.config.max_page_size {
                result.reject(
                    "per_page",
                    ValidationIssueType::CountLimit,
                    format!(
                        "per_page ({}) exceeds maximum allowed ({})",
                        per_page, self.config.max_page_size
                    ),
                );
            }
        }
    }

    fn contains_suspicious_content(&self, content: &str) -> bool {
        let suspicious_patterns = [
            "<script",
            "javascript:",
            "onerror=",
            "${",
            "../",
            "\x00",
        ];

        let content_lower = content.to_lowercase();
        suspicious_patterns.iter().any(|pattern| content_lower.contains(pattern))
    }

    /// Remove control characters from free text before it is stored
    pub fn sanitize_string(&self, content: &str) -> String {
        content
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect()
    }
}

fn merge(into: &mut ValidationResult, other: ValidationResult) {
    if !other.valid {
        into.valid = false;
    }
    into.issues.extend(other.issues);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prescription_params_accepted() {
        let validator = RequestValidator::default();
        let params = json!({
            "history": ["Warfarin", "Metformin"],
            "new_medicine": "Aspirin"
        });

        let result = validator.validate_tool_parameters("validate_prescription", &params);
        assert!(result.valid);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_history_size_limit() {
        let validator = RequestValidator::new(RequestValidatorConfig {
            max_history_entries: 2,
            ..Default::default()
        });
        let params = json!({
            "history": ["A", "B", "C"],
            "new_medicine": "Aspirin"
        });

        let result = validator.validate_tool_parameters("validate_prescription", &params);
        assert!(!result.valid);
        assert!(result.issues.iter().any(|i| i.issue_type == ValidationIssueType::CountLimit));
    }

    #[test]
    fn test_history_must_hold_strings() {
        let validator = RequestValidator::default();
        let params = json!({ "history": ["Warfarin", 42], "new_medicine": "Aspirin" });

        let result = validator.validate_tool_parameters("validate_prescription", &params);
        assert!(!result.valid);
        assert!(result.error_message().contains("history[1]"));
    }

    #[test]
    fn test_long_drug_name_rejected() {
        let validator = RequestValidator::default();
        let params = json!({ "history": [], "new_medicine": "A".repeat(500) });

        let result = validator.validate_tool_parameters("validate_prescription", &params);
        assert!(!result.valid);
        assert!(result.error_message().starts_with("new_medicine"));
    }

    #[test]
    fn test_nesting_depth_limit() {
        let validator = RequestValidator::new(RequestValidatorConfig {
            max_nesting_depth: 1,
            ..Default::default()
        });
        let params = json!({ "a": { "b": { "c": "deep" } } });

        let result = validator.validate_json_value(&params, "", 0);
        assert!(!result.valid);
        assert!(result.issues.iter().any(|i| i.issue_type == ValidationIssueType::DepthLimit));
    }

    #[test]
    fn test_suspicious_content_is_a_warning_only() {
        let validator = RequestValidator::default();
        let params = json!({
            "doctor_id": "DOC001",
            "patient_id": "ABHA001",
            "drug": "Aspirin",
            "reason": "<script>alert(1)</script>"
        });

        let result = validator.validate_tool_parameters("log_override", &params);
        assert!(result.valid);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, ValidationSeverity::Warning);
    }

    #[test]
    fn test_page_size_limit() {
        let validator = RequestValidator::default();
        let result = validator.validate_tool_parameters("list_overrides", &json!({ "per_page": 1000 }));
        assert!(!result.valid);
    }

    #[test]
    fn test_sanitize_string() {
        let validator = RequestValidator::default();
        assert_eq!(validator.sanitize_string("line\u{0}one\nline two"), "lineone\nline two");
    }
}
