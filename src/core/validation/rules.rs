use serde_json::Value as Json;

use super::{RuleViolation, ValidationContext, ValidationRule, PARTICIPANT_DID};
use crate::core::jws::{ClaimToken, AUDIENCE, EXPIRATION_TIME};

/// The token must carry `exp`, must not have expired (give or take `leeway`)
/// and must not have been issued after it expires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotExpired {
    leeway: u64,
}

impl NotExpired {
    pub fn new(leeway_secs: u64) -> Self {
        Self {
            leeway: leeway_secs,
        }
    }
}

impl ValidationRule for NotExpired {
    fn check(&self, token: &ClaimToken, context: &ValidationContext) -> Result<(), RuleViolation> {
        let expiration = token
            .expiration()
            .ok_or(RuleViolation::MissingClaim(EXPIRATION_TIME))?;

        let now = context.now();
        if now > expiration.saturating_add(self.leeway) {
            return Err(RuleViolation::Expired { expiration, now });
        }

        match token.issued_at() {
            Some(issued_at) if issued_at > expiration => {
                Err(RuleViolation::IssuedAfterExpiration {
                    issued_at,
                    expiration,
                })
            }
            _ => Ok(()),
        }
    }
}

/// If the token carries `nbf`, it must have been reached (give or take `leeway`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NotBefore {
    leeway: u64,
}

impl NotBefore {
    pub fn new(leeway_secs: u64) -> Self {
        Self {
            leeway: leeway_secs,
        }
    }
}

impl ValidationRule for NotBefore {
    fn check(&self, token: &ClaimToken, context: &ValidationContext) -> Result<(), RuleViolation> {
        let Some(not_before) = token.not_before() else {
            return Ok(());
        };

        let now = context.now();
        if now.saturating_add(self.leeway) < not_before {
            return Err(RuleViolation::NotYetValid { not_before, now });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IssuerEquals(String);

impl IssuerEquals {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self(issuer.into())
    }
}

impl ValidationRule for IssuerEquals {
    fn check(&self, token: &ClaimToken, _: &ValidationContext) -> Result<(), RuleViolation> {
        match token.issuer() {
            Some(issuer) if issuer == self.0 => Ok(()),
            found => Err(RuleViolation::IssuerMismatch {
                expected: self.0.clone(),
                found: found.map(ToOwned::to_owned),
            }),
        }
    }
}

/// `aud` must be present and contain the DID of the participant the token was
/// presented to, read from the [PARTICIPANT_DID] context entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParticipantAudience;

impl ValidationRule for ParticipantAudience {
    fn check(&self, token: &ClaimToken, context: &ValidationContext) -> Result<(), RuleViolation> {
        let Some(expected) = context.additional(PARTICIPANT_DID).and_then(Json::as_str) else {
            return Err(RuleViolation::MissingContext(PARTICIPANT_DID));
        };

        let audience = token.audience();
        if audience.is_empty() {
            return Err(RuleViolation::MissingClaim(AUDIENCE));
        }
        if !audience.contains(expected) {
            return Err(RuleViolation::AudienceMismatch {
                expected: expected.to_owned(),
                found: audience.into_iter().map(ToOwned::to_owned).collect(),
            });
        }
        Ok(())
    }
}

/// Binds the key the signature was verified with to an expected key id.
#[derive(Debug, Clone)]
pub struct KeyIdEquals(String);

impl KeyIdEquals {
    pub fn new(key_id: impl Into<String>) -> Self {
        Self(key_id.into())
    }
}

impl ValidationRule for KeyIdEquals {
    fn check(&self, token: &ClaimToken, _: &ValidationContext) -> Result<(), RuleViolation> {
        match token.key_id() {
            Some(kid) if kid == self.0 => Ok(()),
            found => Err(RuleViolation::KeyIdMismatch {
                expected: self.0.clone(),
                found: found.map(ToOwned::to_owned),
            }),
        }
    }
}

/// Correlates `sub` with a subject taken from another token.
#[derive(Debug, Clone)]
pub struct SubjectEquals(String);

impl SubjectEquals {
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }
}

impl ValidationRule for SubjectEquals {
    fn check(&self, token: &ClaimToken, _: &ValidationContext) -> Result<(), RuleViolation> {
        match token.subject() {
            Some(subject) if subject == self.0 => Ok(()),
            found => Err(RuleViolation::SubjectMismatch {
                expected: self.0.clone(),
                found: found.map(ToOwned::to_owned),
            }),
        }
    }
}
