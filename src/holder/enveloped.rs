use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value as Json};

use super::{
    check_formats, compose_key_id, signer::SigningService, AdditionalData, PresentationError,
    PresentationFormat, PresentationGenerator, VERIFIABLE_PRESENTATION_TYPE,
    W3C_CREDENTIALS_V2_URL,
};
use crate::{
    core::credential::{CredentialFormat, VerifiableCredentialContainer},
    verifier::participant::SigningKeyRef,
};

pub const ENVELOPED_PRESENTATION_TYPE: &str = "EnvelopedVerifiablePresentation";
pub const ENVELOPED_CREDENTIAL_TYPE: &str = "EnvelopedVerifiableCredential";
/// Data URL prefix of an enveloped credential.
pub const CREDENTIAL_DATA_URL_PREFIX: &str = "data:application/vc+jwt,";
/// Data URL prefix of an enveloped presentation.
pub const PRESENTATION_DATA_URL_PREFIX: &str = "data:application/vp+jwt,";

const CONTROLLER: &str = "controller";

/// Generates VC Data Model 2.0 enveloped presentations secured with JOSE.
///
/// Each credential is enveloped in a data URL, the resulting presentation is
/// signed, and the signed presentation is enveloped and signed again with the
/// same key.
#[derive(Debug, Clone)]
pub struct JwtEnvelopedPresentationGenerator {
    signing: Arc<dyn SigningService + Send + Sync>,
}

impl JwtEnvelopedPresentationGenerator {
    pub fn new(signing: Arc<dyn SigningService + Send + Sync>) -> Self {
        Self { signing }
    }
}

#[async_trait]
impl PresentationGenerator for JwtEnvelopedPresentationGenerator {
    fn format(&self) -> PresentationFormat {
        PresentationFormat::EnvelopedJoseVp
    }

    async fn generate(
        &self,
        credentials: &[Arc<VerifiableCredentialContainer>],
        signing_key: &SigningKeyRef,
        issuer_id: &str,
        additional_data: &AdditionalData,
    ) -> Result<String, PresentationError> {
        check_formats(
            "JwtEnvelopedPresentationGenerator",
            CredentialFormat::Jose,
            credentials,
        )?;

        let Some(controller) = additional_data.controller.as_deref() else {
            return Err(PresentationError::InsufficientInput(CONTROLLER));
        };

        let mut header = Map::new();
        header.insert(
            "kid".into(),
            Json::String(compose_key_id(Some(controller), &signing_key.key_id)),
        );

        let enveloped_credentials: Vec<Json> = credentials
            .iter()
            .map(|vc| {
                json!({
                    "@context": [W3C_CREDENTIALS_V2_URL],
                    "id": format!("{CREDENTIAL_DATA_URL_PREFIX}{}", vc.raw()),
                    "type": ENVELOPED_CREDENTIAL_TYPE,
                })
            })
            .collect();

        let presentation = object(json!({
            "@context": [W3C_CREDENTIALS_V2_URL],
            "type": VERIFIABLE_PRESENTATION_TYPE,
            "holder": issuer_id,
            "verifiableCredential": enveloped_credentials,
        }));
        let presentation_token = self
            .signing
            .sign(&signing_key.private_key_alias, &presentation, &header)
            .await
            .map_err(PresentationError::signing)?;

        let envelope = object(json!({
            "@context": [W3C_CREDENTIALS_V2_URL],
            "id": format!("{PRESENTATION_DATA_URL_PREFIX}{presentation_token}"),
            "type": ENVELOPED_PRESENTATION_TYPE,
        }));
        self.signing
            .sign(&signing_key.private_key_alias, &envelope, &header)
            .await
            .map_err(PresentationError::signing)
    }
}

fn object(value: Json) -> Map<String, Json> {
    match value {
        Json::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::jws::CompactJws,
        holder::signer::{LocalSigningService, P256Signer, TokenSigner},
    };
    use p256::ecdsa::SigningKey;

    fn generator() -> (JwtEnvelopedPresentationGenerator, ssi::JWK) {
        let signer = P256Signer::new(SigningKey::random(&mut rand::thread_rng())).unwrap();
        let jwk = signer.jwk().clone();
        let signing = LocalSigningService::new().with_signer("vp-alias", Arc::new(signer));
        (JwtEnvelopedPresentationGenerator::new(Arc::new(signing)), jwk)
    }

    fn signing_key() -> SigningKeyRef {
        SigningKeyRef {
            private_key_alias: "vp-alias".into(),
            key_id: "key-1".into(),
        }
    }

    fn additional_data() -> AdditionalData {
        AdditionalData {
            aud: None,
            controller: Some("did:web:test".into()),
        }
    }

    fn vc(raw: &str, format: CredentialFormat, id: &str) -> Arc<VerifiableCredentialContainer> {
        let Json::Object(claims) = json!({ "id": id }) else {
            unreachable!()
        };
        Arc::new(VerifiableCredentialContainer::new(raw, format, claims))
    }

    #[tokio::test]
    async fn envelopes_credentials_and_presentation() {
        let (generator, jwk) = generator();

        let token = generator
            .generate(
                &[vc("vc.one.sig", CredentialFormat::Jose, "urn:uuid:c1")],
                &signing_key(),
                "did:web:test",
                &additional_data(),
            )
            .await
            .unwrap();

        let outer = CompactJws::decode(&token).unwrap();
        assert_eq!(outer.key_id(), Some("did:web:test#key-1"));
        let outer = outer.verify(&jwk).unwrap();
        assert_eq!(outer.claims().len(), 3);
        assert_eq!(outer.string_claim("type"), Some("EnvelopedVerifiablePresentation"));
        assert_eq!(
            outer.claim("@context"),
            Some(&json!(["https://www.w3.org/ns/credentials/v2"]))
        );

        let inner = outer
            .string_claim("id")
            .and_then(|id| id.strip_prefix("data:application/vp+jwt,"))
            .unwrap();
        let inner = CompactJws::decode(inner).unwrap();
        assert_eq!(inner.key_id(), Some("did:web:test#key-1"));
        let inner = inner.verify(&jwk).unwrap();
        assert_eq!(
            inner.claims(),
            &object(json!({
                "@context": ["https://www.w3.org/ns/credentials/v2"],
                "type": "VerifiablePresentation",
                "holder": "did:web:test",
                "verifiableCredential": [{
                    "@context": ["https://www.w3.org/ns/credentials/v2"],
                    "id": "data:application/vc+jwt,vc.one.sig",
                    "type": "EnvelopedVerifiableCredential"
                }]
            }))
        );
    }

    #[tokio::test]
    async fn rejects_credentials_of_other_formats() {
        let (generator, _) = generator();

        let result = generator
            .generate(
                &[
                    vc("vc.one.sig", CredentialFormat::Jose, "urn:uuid:c1"),
                    vc("vc.two.sig", CredentialFormat::Jwt, "urn:uuid:c2"),
                ],
                &signing_key(),
                "did:web:test",
                &additional_data(),
            )
            .await;

        let Err(error) = result else {
            panic!("expected a format mismatch")
        };
        assert!(error
            .to_string()
            .contains("can only handle credentials that are in VC2_0_JOSE format"));
        assert!(error.to_string().ends_with("[urn:uuid:c2 -> JWT]"));
    }

    #[tokio::test]
    async fn requires_controller() {
        let (generator, _) = generator();

        let result = generator
            .generate(&[], &signing_key(), "did:web:test", &AdditionalData::default())
            .await;
        let Err(error) = result else {
            panic!("expected insufficient input")
        };
        assert_eq!(error.to_string(), "Must provide additional data: 'controller'");
    }
}
