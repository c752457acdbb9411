//! Verification of self-issued ID tokens.
//!
//! A requester authenticates with a self-issued ID token signed with a key of
//! its own key space. The ID token embeds an access token, issued to the
//! requester by a token-issuing authority, whose `scope` claim lists the
//! scopes the requester was granted. Both tokens must verify against their
//! own trust anchor before any scope is trusted.

use std::{fmt::Debug, ops::Deref, sync::Arc};

use anyhow::{bail, Result};
use tracing::{debug, error};

use crate::{
    core::{
        jws::{ClaimToken, CompactJws, JwsError, ISSUER, SUBJECT},
        validation::{
            evaluate, KeyIdEquals, ParticipantAudience, RuleViolation, SubjectEquals,
            ValidationContext, ValidationRule, ValidationRulesRegistry, ACCESS_TOKEN_CONTEXT,
            PARTICIPANT_DID, SELF_ISSUED_TOKEN_CONTEXT,
        },
    },
    error::ServiceError,
    utils::{Clock, SystemClock},
};

use keys::PublicKeyResolver;
use participant::ParticipantLookup;

pub mod keys;
pub mod participant;

/// Claim of the ID token carrying the embedded access token.
pub const TOKEN_CLAIM: &str = "token";
/// Legacy name of [TOKEN_CLAIM].
pub const ACCESS_TOKEN_CLAIM: &str = "access_token";
/// Claim of the access token carrying the space-delimited granted scopes.
pub const SCOPE_CLAIM: &str = "scope";

const VERIFICATION_FAILED: &str = "ID token verification failed";

/// The scopes the token-issuing authority granted to a verified requester, in
/// the order they appear in the access token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantedScopes {
    requester: String,
    scopes: Vec<String>,
}

impl GrantedScopes {
    #[cfg(test)]
    pub(crate) fn from_scopes<S: Into<String>>(scopes: impl IntoIterator<Item = S>) -> Self {
        Self {
            requester: "did:web:requester".into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    /// The `iss` of the verified ID token.
    pub fn requester(&self) -> &str {
        &self.requester
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.scopes.iter().any(|granted| granted == scope)
    }

    pub fn into_inner(self) -> Vec<String> {
        self.scopes
    }
}

impl Deref for GrantedScopes {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.scopes
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// A token could not be decoded, or lacks a `kid` header.
    #[error("malformed token: {0}")]
    MalformedToken(JwsError),
    #[error("participant context '{0}' not found")]
    ParticipantNotFound(String),
    /// The key referenced by a token could not be resolved in its key space.
    #[error("public key '{key_id}' could not be resolved: {source}")]
    KeyNotFound {
        key_id: String,
        source: anyhow::Error,
    },
    #[error("signature verification failed: {0}")]
    SignatureInvalid(JwsError),
    #[error("token validation failed: {0}")]
    RuleViolation(RuleViolation),
    #[error("required claim '{0}' is missing")]
    ClaimMissing(&'static str),
    /// The access token was not issued for the subject of the ID token.
    #[error("token claims do not correlate: {0}")]
    ClaimMismatch(RuleViolation),
    /// A collaborator failed.
    #[error(transparent)]
    Upstream(anyhow::Error),
    /// An unexpected fault unrelated to the presented tokens.
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl From<VerificationError> for ServiceError {
    fn from(value: VerificationError) -> Self {
        match value {
            VerificationError::ParticipantNotFound(_) => ServiceError::not_found(value.to_string()),
            VerificationError::Upstream(e) => {
                ServiceError::upstream_failure(format!("token verification failed: {e:#}"))
            }
            VerificationError::Internal(e) => {
                error!("token verification failed unexpectedly: {e:#}");
                ServiceError::internal()
            }
            reason => {
                debug!("{VERIFICATION_FAILED}: {reason}");
                ServiceError::authentication_failure(VERIFICATION_FAILED)
            }
        }
    }
}

/// Verifies a self-issued ID token and the access token embedded in it.
#[derive(Debug, Clone)]
pub struct SelfIssuedTokenVerifier {
    participants: Arc<dyn ParticipantLookup + Send + Sync>,
    participant_keys: Arc<dyn PublicKeyResolver + Send + Sync>,
    authority_keys: Arc<dyn PublicKeyResolver + Send + Sync>,
    rules: Arc<ValidationRulesRegistry>,
    clock: Arc<dyn Clock>,
}

impl SelfIssuedTokenVerifier {
    pub fn builder() -> SelfIssuedTokenVerifierBuilder {
        SelfIssuedTokenVerifierBuilder::default()
    }

    /// Verify `token`, presented to the participant `participant_context_id`,
    /// and return the scopes granted by its embedded access token.
    ///
    /// Nothing is returned unless both tokens verified: the ID token with a
    /// key of the requester's key space, the access token with a key of the
    /// token-issuing authority. Both must be addressed to the participant's
    /// DID, and the access token's `sub` must equal the ID token's `sub`. The
    /// ID token must name its issuer in `iss`.
    pub async fn verify(
        &self,
        token: &str,
        participant_context_id: &str,
    ) -> Result<GrantedScopes, VerificationError> {
        let id_token = CompactJws::decode(token).map_err(VerificationError::MalformedToken)?;
        let kid = required_key_id(&id_token)?;

        let participant = self
            .participants
            .participant(participant_context_id)
            .await
            .map_err(VerificationError::Upstream)?
            .ok_or_else(|| VerificationError::ParticipantNotFound(participant_context_id.into()))?;
        let did = participant.did();

        let mut id_token_rules = self.rules.rules(SELF_ISSUED_TOKEN_CONTEXT);
        id_token_rules.push(Arc::new(KeyIdEquals::new(&kid)));
        id_token_rules.push(Arc::new(ParticipantAudience));

        let jwk = self
            .participant_keys
            .resolve(&kid, Some(participant_context_id))
            .await
            .map_err(|source| VerificationError::KeyNotFound {
                key_id: kid.clone(),
                source,
            })?;
        let id_token = id_token.verify(&jwk).map_err(signature_error)?;

        let context = ValidationContext::new(self.clock.now()).with_additional(PARTICIPANT_DID, did);
        evaluate(&id_token, &id_token_rules, &context).map_err(VerificationError::RuleViolation)?;

        let access_token = embedded_access_token(&id_token)?;
        let requester = id_token
            .issuer()
            .ok_or(VerificationError::ClaimMissing(ISSUER))?;
        let subject = id_token
            .subject()
            .ok_or(VerificationError::ClaimMissing(SUBJECT))?;

        let access_token =
            CompactJws::decode(access_token).map_err(VerificationError::MalformedToken)?;
        let access_token_kid = required_key_id(&access_token)?;

        let mut access_token_rules: Vec<Arc<dyn ValidationRule>> =
            self.rules.rules(ACCESS_TOKEN_CONTEXT);
        access_token_rules.push(Arc::new(SubjectEquals::new(subject)));
        access_token_rules.push(Arc::new(ParticipantAudience));

        // The access token is only ever trusted under the authority's keys.
        let jwk = self
            .authority_keys
            .resolve(&access_token_kid, None)
            .await
            .map_err(|source| VerificationError::KeyNotFound {
                key_id: access_token_kid.clone(),
                source,
            })?;
        let access_token = access_token.verify(&jwk).map_err(signature_error)?;

        evaluate(&access_token, &access_token_rules, &context).map_err(|violation| {
            match violation {
                RuleViolation::SubjectMismatch { .. } => VerificationError::ClaimMismatch(violation),
                _ => VerificationError::RuleViolation(violation),
            }
        })?;

        let scopes: Vec<String> = access_token
            .string_claim(SCOPE_CLAIM)
            .map(|scope| scope.split_whitespace().map(ToOwned::to_owned).collect())
            .unwrap_or_default();
        if scopes.is_empty() {
            return Err(VerificationError::ClaimMissing(SCOPE_CLAIM));
        }

        debug!(
            "verified ID token of '{subject}' for participant '{participant_context_id}', granted scopes: {scopes:?}"
        );

        Ok(GrantedScopes {
            requester: requester.to_owned(),
            scopes,
        })
    }
}

fn signature_error(error: JwsError) -> VerificationError {
    match error {
        JwsError::Internal(e) => VerificationError::Internal(e),
        error => VerificationError::SignatureInvalid(error),
    }
}

fn required_key_id(jws: &CompactJws<'_>) -> Result<String, VerificationError> {
    jws.key_id().map(ToOwned::to_owned).ok_or_else(|| {
        VerificationError::MalformedToken(JwsError::Malformed("missing 'kid' header".into()))
    })
}

fn embedded_access_token(id_token: &ClaimToken) -> Result<&str, VerificationError> {
    id_token
        .string_claim(TOKEN_CLAIM)
        .or_else(|| id_token.string_claim(ACCESS_TOKEN_CLAIM))
        .ok_or(VerificationError::ClaimMissing(TOKEN_CLAIM))
}

/// Builder struct for [SelfIssuedTokenVerifier].
#[derive(Debug, Clone, Default)]
pub struct SelfIssuedTokenVerifierBuilder {
    participants: Option<Arc<dyn ParticipantLookup + Send + Sync>>,
    participant_keys: Option<Arc<dyn PublicKeyResolver + Send + Sync>>,
    authority_keys: Option<Arc<dyn PublicKeyResolver + Send + Sync>>,
    rules: Option<Arc<ValidationRulesRegistry>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SelfIssuedTokenVerifierBuilder {
    /// Build the verifier.
    ///
    /// Without [with_rules](Self::with_rules), the default `nbf`/`exp` rules
    /// without leeway are used. Without [with_clock](Self::with_clock), the
    /// system clock is used.
    pub fn build(self) -> Result<SelfIssuedTokenVerifier> {
        let Self {
            participants,
            participant_keys,
            authority_keys,
            rules,
            clock,
        } = self;

        let Some(participants) = participants else {
            bail!("participant lookup is required, see `with_participants`")
        };

        let Some(participant_keys) = participant_keys else {
            bail!("participant key resolver is required, see `with_participant_keys`")
        };

        let Some(authority_keys) = authority_keys else {
            bail!("authority key resolver is required, see `with_authority_keys`")
        };

        Ok(SelfIssuedTokenVerifier {
            participants,
            participant_keys,
            authority_keys,
            rules: rules.unwrap_or_else(|| Arc::new(ValidationRulesRegistry::with_default_rules(0))),
            clock: clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }

    pub fn with_participants(
        mut self,
        participants: Arc<dyn ParticipantLookup + Send + Sync>,
    ) -> Self {
        self.participants = Some(participants);
        self
    }

    /// Set the resolver for keys of the requester's key space, used for the
    /// self-issued ID token.
    pub fn with_participant_keys(
        mut self,
        resolver: Arc<dyn PublicKeyResolver + Send + Sync>,
    ) -> Self {
        self.participant_keys = Some(resolver);
        self
    }

    /// Set the resolver for keys of the token-issuing authority, used for the
    /// embedded access token.
    pub fn with_authority_keys(mut self, resolver: Arc<dyn PublicKeyResolver + Send + Sync>) -> Self {
        self.authority_keys = Some(resolver);
        self
    }

    pub fn with_rules(mut self, rules: Arc<ValidationRulesRegistry>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }
}
