pub mod request_validator;

// Re-export key types for convenience
pub use request_validator::{RequestValidator, RequestValidatorConfig, ValidationResult};
