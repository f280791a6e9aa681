use anyhow::Error;
use thiserror::Error as ThisError;

/// Errors raised by the interaction engine and the services around it
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum EngineError {
    #[error("{field} is required")]
    EmptyInput { field: &'static str },

    #[error("rule '{id}' already exists")]
    DuplicateRule { id: String },

    #[error("rule '{id}' is malformed: {reason}")]
    InvalidRule { id: String, reason: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("analysis failed while {context}: {message}")]
    InternalAnalysis { context: String, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("patient not found: {0}")]
    PatientNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Short machine-readable category, used in error responses
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::EmptyInput { .. } | EngineError::InvalidRequest(_) => "validation",
            EngineError::DuplicateRule { .. } | EngineError::InvalidRule { .. } => "rule",
            EngineError::Embedding(_) | EngineError::InternalAnalysis { .. } => "analysis",
            EngineError::Storage(_) => "storage",
            EngineError::PatientNotFound(_) => "not_found",
        }
    }
}

/// Convert internal errors to user-friendly messages
pub fn format_user_error(error: &Error) -> String {
    if let Some(engine_error) = error.downcast_ref::<EngineError>() {
        return match engine_error {
            EngineError::EmptyInput { field } => format!(
                "Missing input: {} is required.\n\
                 Provide a non-blank value and try again.",
                field
            ),
            EngineError::DuplicateRule { id } => format!(
                "A rule with id '{}' is already loaded.\n\
                 Rule ids must be unique; choose a different id.",
                id
            ),
            EngineError::InvalidRule { id, reason } => format!(
                "Rule '{}' was rejected: {}\n\
                 Interactions must be written as 'DrugA + DrugB'.",
                id, reason
            ),
            EngineError::PatientNotFound(id) => format!(
                "Patient not found: {}\n\
                 Check the ABHA ID and try again.",
                id
            ),
            EngineError::InvalidRequest(msg) => format!("Invalid request: {}", msg),
            EngineError::Storage(msg) => format!(
                "Could not read or write stored data: {}\n\
                 Check that the storage paths are writable.",
                msg
            ),
            EngineError::Embedding(_) | EngineError::InternalAnalysis { .. } => format!(
                "Analysis failed: {}\n\
                 This is an internal error; retrying will not change the outcome.",
                engine_error
            ),
        };
    }

    let error_string = error.to_string();

    if error_string.contains("config") || error_string.contains("environment") {
        return format!(
            "Invalid configuration: {}\n\
             Check your environment variables or config file.",
            error_string
        );
    }

    if error_string.contains("No such file") {
        return format!(
            "File not found: {}\n\
             Please check the file path and ensure it exists.",
            error_string
        );
    }

    format!("An error occurred: {}", error)
}

/// Create a user-friendly error body for tool responses
pub fn create_error_response(error: &Error) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "message": format_user_error(error),
            "type": classify_error(error),
            "recoverable": false
        }
    })
}

fn classify_error(error: &Error) -> &'static str {
    if let Some(engine_error) = error.downcast_ref::<EngineError>() {
        return engine_error.kind();
    }

    let error_string = error.to_string();
    if error_string.contains("config") {
        "configuration"
    } else if error_string.contains("file") || error_string.contains("path") {
        "filesystem"
    } else {
        "unknown"
    }
}
