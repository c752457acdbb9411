use std::fmt::Debug;

use tracing::warn;

use super::query::{Criterion, Operator};

/// Namespace literal of the reference scope vocabulary.
pub const DEFAULT_SCOPE_ALIAS: &str = "org.eclipse.edc.vc.type";
/// Separator between the parts of a scope string.
pub const SCOPE_SEPARATOR: char = ':';
/// Operations a scope may grant.
pub const ALLOWED_OPERATIONS: [&str; 3] = ["read", "all", "*"];
/// Operand the reference mapping queries.
pub const CREDENTIAL_TYPE_OPERAND: &str = "credential.type";

/// Converts a scope string into a storage [Criterion].
///
/// The scope vocabulary, and what a scope means in terms of stored
/// credentials, is specific to each dataspace. Deployments are expected to
/// provide their own implementation; [DefaultScopeTransformer] is a reference.
pub trait ScopeToCriterionTransformer: Debug + Send + Sync {
    fn transform(&self, scope: &str) -> Result<Criterion, ScopeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("Scope string '{scope}' has invalid format: expected 3 parts separated by ':', found {found}")]
    InvalidFormat { scope: String, found: usize },
    #[error("Scope string '{scope}' has invalid alias: expected '{expected}'")]
    InvalidAlias { scope: String, expected: String },
    #[error("Scope string '{scope}' does not name a credential type")]
    MissingCredentialType { scope: String },
    #[error("Scope string '{scope}' has invalid operation '{operation}': allowed operations are read, all, *")]
    InvalidOperation { scope: String, operation: String },
}

/// Reference mapping from `<alias>:<credentialType>:<operation>` to
/// `credential.type contains <credentialType>`.
///
/// The alias is compared case-insensitively. The operation is checked but
/// does not influence the criterion.
#[derive(Debug, Clone)]
pub struct DefaultScopeTransformer {
    alias: String,
}

impl DefaultScopeTransformer {
    pub fn new(alias: impl Into<String>) -> Self {
        warn!(
            "Using the default scope transformer. This is not intended for production use and \
             should be replaced with a specialized implementation for your dataspace"
        );
        Self {
            alias: alias.into(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl Default for DefaultScopeTransformer {
    fn default() -> Self {
        Self::new(DEFAULT_SCOPE_ALIAS)
    }
}

impl ScopeToCriterionTransformer for DefaultScopeTransformer {
    fn transform(&self, scope: &str) -> Result<Criterion, ScopeError> {
        let parts: Vec<&str> = scope.split(SCOPE_SEPARATOR).collect();
        let &[alias, credential_type, operation] = parts.as_slice() else {
            return Err(ScopeError::InvalidFormat {
                scope: scope.to_owned(),
                found: parts.len(),
            });
        };

        if !alias.eq_ignore_ascii_case(&self.alias) {
            return Err(ScopeError::InvalidAlias {
                scope: scope.to_owned(),
                expected: self.alias.clone(),
            });
        }

        if credential_type.is_empty() {
            return Err(ScopeError::MissingCredentialType {
                scope: scope.to_owned(),
            });
        }

        if !ALLOWED_OPERATIONS.contains(&operation) {
            return Err(ScopeError::InvalidOperation {
                scope: scope.to_owned(),
                operation: operation.to_owned(),
            });
        }

        Ok(Criterion::new(
            CREDENTIAL_TYPE_OPERAND,
            Operator::Contains,
            credential_type,
        ))
    }
}
