use std::sync::Arc;

use super::{
    AdditionalData, PresentationError, PresentationFormat, PresentationGeneratorRegistry,
    PresentationResponse,
};
use crate::{
    core::credential::VerifiableCredentialContainer, verifier::participant::ParticipantContext,
};

/// Creates presentations on behalf of a participant, in the configured
/// default format.
///
/// The participant's DID is used as issuer and as controller of the signing
/// key, the participant's signing key reference selects the private key.
#[derive(Debug, Clone)]
pub struct PresentationService {
    registry: Arc<PresentationGeneratorRegistry>,
    default_format: PresentationFormat,
}

impl PresentationService {
    pub fn new(registry: Arc<PresentationGeneratorRegistry>, default_format: PresentationFormat) -> Self {
        Self {
            registry,
            default_format,
        }
    }

    pub fn default_format(&self) -> PresentationFormat {
        self.default_format
    }

    pub async fn create_presentation(
        &self,
        participant: &ParticipantContext,
        credentials: &[Arc<VerifiableCredentialContainer>],
        audience: Option<&str>,
    ) -> Result<PresentationResponse, PresentationError> {
        let additional_data = AdditionalData {
            aud: audience.map(ToOwned::to_owned),
            controller: Some(participant.did().to_owned()),
        };

        self.registry
            .create_presentation(
                self.default_format,
                credentials,
                participant.signing_key(),
                participant.did(),
                &additional_data,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::PipelineConfig,
        core::{credential::CredentialFormat, jws::CompactJws},
        holder::signer::{LocalSigningService, P256Signer},
        utils::FixedClock,
        verifier::participant::SigningKeyRef,
    };
    use p256::ecdsa::SigningKey;
    use serde_json::Map;

    fn service(format: PresentationFormat) -> PresentationService {
        let signer = P256Signer::new(SigningKey::random(&mut rand::thread_rng())).unwrap();
        let signing = LocalSigningService::new().with_signer("alice-alias", Arc::new(signer));
        let registry = PresentationGeneratorRegistry::with_defaults(
            Arc::new(signing),
            Arc::new(FixedClock(1_700_000_000)),
            &PipelineConfig::default(),
        );
        PresentationService::new(Arc::new(registry), format)
    }

    fn alice() -> ParticipantContext {
        ParticipantContext::new(
            "alice",
            "did:web:alice",
            SigningKeyRef {
                private_key_alias: "alice-alias".into(),
                key_id: "key-1".into(),
            },
        )
    }

    #[tokio::test]
    async fn signs_as_participant_in_default_format() {
        let service = service(PresentationFormat::JwtVp);
        let credentials = [Arc::new(VerifiableCredentialContainer::new(
            "vc.one.sig",
            CredentialFormat::Jwt,
            Map::new(),
        ))];

        let response = service
            .create_presentation(&alice(), &credentials, Some("did:web:bob"))
            .await
            .unwrap();

        assert_eq!(response.format, PresentationFormat::JwtVp);
        assert_eq!(response.holder_id, "did:web:alice");
        assert_eq!(response.audience.as_deref(), Some("did:web:bob"));

        let jws = CompactJws::decode(&response.serialized_presentation).unwrap();
        assert_eq!(jws.key_id(), Some("did:web:alice#key-1"));
        assert_eq!(jws.unverified_claims()["iss"], "did:web:alice");
    }

    #[tokio::test]
    async fn enveloped_format_does_not_need_audience() {
        let service = service(PresentationFormat::EnvelopedJoseVp);

        let response = service
            .create_presentation(&alice(), &[], None)
            .await
            .unwrap();
        assert_eq!(response.format, PresentationFormat::EnvelopedJoseVp);
        assert_eq!(response.audience, None);
    }
}
