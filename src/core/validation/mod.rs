//! Composable token validation rules.
//!
//! A [ValidationRule] is a small value checking one property of a
//! [ClaimToken]. Rules are registered in a [ValidationRulesRegistry] under a
//! named context and applied in registration order with [evaluate].

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use serde_json::{Map, Value as Json};

use super::jws::ClaimToken;

pub mod rules;

pub use rules::{
    IssuerEquals, KeyIdEquals, NotBefore, NotExpired, ParticipantAudience, SubjectEquals,
};

/// Rules applied to the self-issued ID token.
pub const SELF_ISSUED_TOKEN_CONTEXT: &str = "dcp-si";
/// Rules applied to the access token embedded in the self-issued ID token.
pub const ACCESS_TOKEN_CONTEXT: &str = "dcp-access-token";

/// [ValidationContext] entry holding the DID of the participant the tokens
/// were presented to.
pub const PARTICIPANT_DID: &str = "participantDid";

/// Evaluation-time inputs shared by all rules of one evaluation.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    now: u64,
    additional: Map<String, Json>,
}

impl ValidationContext {
    pub fn new(now: u64) -> Self {
        Self {
            now,
            additional: Map::new(),
        }
    }

    pub fn with_additional(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.additional.insert(key.into(), value.into());
        self
    }

    /// Current time, in seconds since the UNIX epoch.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn additional(&self, key: &str) -> Option<&Json> {
        self.additional.get(key)
    }
}

/// A single claim predicate. Implementations must not have side effects.
pub trait ValidationRule: Debug + Send + Sync {
    fn check(&self, token: &ClaimToken, context: &ValidationContext) -> Result<(), RuleViolation>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    #[error("mandatory claim '{0}' is missing")]
    MissingClaim(&'static str),
    #[error("validation context has no '{0}' entry")]
    MissingContext(&'static str),
    #[error("token has expired (exp: {expiration}, now: {now})")]
    Expired { expiration: u64, now: u64 },
    #[error("token is not yet valid (nbf: {not_before}, now: {now})")]
    NotYetValid { not_before: u64, now: u64 },
    #[error("'iat' ({issued_at}) is after 'exp' ({expiration})")]
    IssuedAfterExpiration { issued_at: u64, expiration: u64 },
    #[error("'iss' claim {found:?} does not match expected issuer '{expected}'")]
    IssuerMismatch {
        expected: String,
        found: Option<String>,
    },
    #[error("'aud' claim {found:?} does not contain '{expected}'")]
    AudienceMismatch { expected: String, found: Vec<String> },
    #[error("'kid' header {found:?} does not match expected key id '{expected}'")]
    KeyIdMismatch {
        expected: String,
        found: Option<String>,
    },
    #[error("'sub' claim {found:?} does not match expected subject '{expected}'")]
    SubjectMismatch {
        expected: String,
        found: Option<String>,
    },
}

/// Registry of validation rules, keyed by context.
///
/// Built once at configuration time and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ValidationRulesRegistry {
    rules: HashMap<String, Vec<Arc<dyn ValidationRule>>>,
}

impl ValidationRulesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `nbf` and `exp` checks in both token contexts.
    pub fn with_default_rules(leeway_secs: u64) -> Self {
        let mut registry = Self::new();
        for context in [SELF_ISSUED_TOKEN_CONTEXT, ACCESS_TOKEN_CONTEXT] {
            registry.add_rule(context, NotBefore::new(leeway_secs));
            registry.add_rule(context, NotExpired::new(leeway_secs));
        }
        registry
    }

    /// Append a rule to a context.
    pub fn add_rule(&mut self, context: impl Into<String>, rule: impl ValidationRule + 'static) {
        self.rules
            .entry(context.into())
            .or_default()
            .push(Arc::new(rule));
    }

    /// The rules of a context, in registration order.
    pub fn rules(&self, context: &str) -> Vec<Arc<dyn ValidationRule>> {
        self.rules.get(context).cloned().unwrap_or_default()
    }
}

/// Applies `rules` in order and returns the first violation.
pub fn evaluate(
    token: &ClaimToken,
    rules: &[Arc<dyn ValidationRule>],
    context: &ValidationContext,
) -> Result<(), RuleViolation> {
    rules.iter().try_for_each(|rule| rule.check(token, context))
}
