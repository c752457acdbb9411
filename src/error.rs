use serde::Serialize;

const INTERNAL_ERROR: &str = "internal error";

/// Category of a pipeline failure.
///
/// The surrounding request layer maps each category onto a transport status,
/// see [ErrorCategory::status_code].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// The request itself is malformed (query shape, scope syntax, missing input).
    MalformedInput,
    /// A bearer token could not be verified.
    AuthenticationFailure,
    /// The requester asked for more than it was granted.
    AuthorizationFailure,
    /// The participant context does not exist.
    NotFound,
    /// The request uses a shape that is not implemented, e.g. a presentation definition.
    Unsupported,
    /// A collaborator (credential store, signing service, lookup) failed.
    UpstreamFailure,
    /// An unexpected fault.
    Internal,
}

impl ErrorCategory {
    /// The conventional HTTP status for this category.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCategory::MalformedInput => 400,
            ErrorCategory::AuthenticationFailure => 401,
            ErrorCategory::AuthorizationFailure => 403,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Unsupported => 501,
            ErrorCategory::UpstreamFailure => 502,
            ErrorCategory::Internal => 500,
        }
    }
}

/// Structured, externally visible error returned by
/// [PresentationQueryHandler](crate::pipeline::PresentationQueryHandler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
    pub category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ServiceError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category,
            path: None,
        }
    }

    /// Point the error at the offending input property.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn malformed_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::MalformedInput, message)
    }

    pub fn authentication_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::AuthenticationFailure, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NotFound, message)
    }

    pub fn upstream_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::UpstreamFailure, message)
    }

    /// An unexpected fault. The detail is logged where it is caught and never
    /// returned to the caller.
    pub fn internal() -> Self {
        Self::new(ErrorCategory::Internal, INTERNAL_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_without_empty_path() {
        let error = ServiceError::not_found("participant context 'p1' not found");
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({
                "message": "participant context 'p1' not found",
                "category": "NOT_FOUND"
            })
        );

        let error = ServiceError::malformed_input("bad scope").with_path("scope");
        assert_eq!(error.path.as_deref(), Some("scope"));
        assert_eq!(error.category.status_code(), 400);

        let error = ServiceError::internal();
        assert_eq!(error.message, "internal error");
        assert_eq!(error.category.status_code(), 500);
    }
}
