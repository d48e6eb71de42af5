//! Validation failures that abort a generation cycle.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("required field {field} is missing")]
    MissingField { field: &'static str },

    #[error("auth provider {provider_id} is declared more than once")]
    DuplicateProvider { provider_id: String },

    #[error("rule {selector} references unknown auth provider {provider_id}")]
    UnknownProvider { selector: String, provider_id: String },

    #[error("rule {selector} requires audience {audience} which provider {provider_id} does not declare")]
    AudienceNotDeclared {
        selector: String,
        provider_id: String,
        audience: String,
    },

    #[error("selector {selector} is not a fully-qualified method name")]
    InvalidSelector { selector: String },

    #[error("no key material resolved for auth provider {provider_id}")]
    MissingKeys { provider_id: String },

    #[error("interface descriptor {file_path} is not valid base64: {reason}")]
    InvalidDescriptor { file_path: String, reason: String },

    #[error("usage reporting is enabled but no token endpoint was resolved")]
    MissingTokenUri,
}
