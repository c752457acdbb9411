use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value as Json};
use uuid::Uuid;

use super::{
    check_formats, compose_key_id, signer::SigningService, AdditionalData, PresentationError,
    PresentationFormat, PresentationGenerator, DCP_CONTEXT_URL, PRESENTATION_EXCHANGE_URL,
    VERIFIABLE_PRESENTATION_TYPE, W3C_CREDENTIALS_V1_URL,
};
use crate::{
    core::{
        credential::{CredentialFormat, VerifiableCredentialContainer},
        jws::{AUDIENCE, EXPIRATION_TIME, ISSUED_AT, ISSUER, JWT_ID, NOT_BEFORE},
    },
    utils::Clock,
    verifier::participant::SigningKeyRef,
};

/// Claim carrying the presentation.
pub const VERIFIABLE_PRESENTATION_CLAIM: &str = "vp";

/// Generates VC Data Model 1.1 presentations secured as a JWT.
///
/// The presentation is carried in the `vp` claim and lists the raw JWT
/// credentials unchanged. The token is valid from now for the configured
/// time to live.
#[derive(Debug, Clone)]
pub struct JwtPresentationGenerator {
    signing: Arc<dyn SigningService + Send + Sync>,
    clock: Arc<dyn Clock>,
    ttl_secs: u64,
}

impl JwtPresentationGenerator {
    pub fn new(
        signing: Arc<dyn SigningService + Send + Sync>,
        clock: Arc<dyn Clock>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            signing,
            clock,
            ttl_secs,
        }
    }
}

#[async_trait]
impl PresentationGenerator for JwtPresentationGenerator {
    fn format(&self) -> PresentationFormat {
        PresentationFormat::JwtVp
    }

    async fn generate(
        &self,
        credentials: &[Arc<VerifiableCredentialContainer>],
        signing_key: &SigningKeyRef,
        issuer_id: &str,
        additional_data: &AdditionalData,
    ) -> Result<String, PresentationError> {
        check_formats("JwtPresentationGenerator", CredentialFormat::Jwt, credentials)?;

        let Some(audience) = &additional_data.aud else {
            return Err(PresentationError::InsufficientInput(AUDIENCE));
        };

        let raw_credentials: Vec<&str> = credentials.iter().map(|vc| vc.raw()).collect();
        let now = self.clock.now();

        let mut claims = Map::new();
        claims.insert(ISSUER.into(), issuer_id.into());
        claims.insert(AUDIENCE.into(), audience.as_str().into());
        claims.insert(ISSUED_AT.into(), now.into());
        claims.insert(NOT_BEFORE.into(), now.into());
        claims.insert(JWT_ID.into(), Uuid::new_v4().to_string().into());
        claims.insert(EXPIRATION_TIME.into(), now.saturating_add(self.ttl_secs).into());
        claims.insert(
            VERIFIABLE_PRESENTATION_CLAIM.into(),
            json!({
                "@context": [DCP_CONTEXT_URL, W3C_CREDENTIALS_V1_URL, PRESENTATION_EXCHANGE_URL],
                "type": VERIFIABLE_PRESENTATION_TYPE,
                "verifiableCredential": raw_credentials,
            }),
        );

        let mut header = Map::new();
        header.insert(
            "kid".into(),
            Json::String(compose_key_id(
                additional_data.controller.as_deref(),
                &signing_key.key_id,
            )),
        );
        header.insert("typ".into(), "JWT".into());

        self.signing
            .sign(&signing_key.private_key_alias, &claims, &header)
            .await
            .map_err(PresentationError::signing)
    }
}
