//! Packaging of credentials into signed Verifiable Presentations.
//!
//! A [PresentationGenerator] turns a set of credentials into one serialized
//! presentation of a single [PresentationFormat]. The
//! [PresentationGeneratorRegistry] holds one generator per format and is
//! fixed once built.

use std::{collections::HashMap, fmt, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{
    config::PipelineConfig,
    core::credential::{CredentialFormat, VerifiableCredentialContainer},
    error::{ErrorCategory, ServiceError},
    utils::Clock,
    verifier::participant::SigningKeyRef,
};

use enveloped::JwtEnvelopedPresentationGenerator;
use jwt_vp::JwtPresentationGenerator;
use signer::SigningService;

pub mod enveloped;
pub mod jwt_vp;
pub mod service;
pub mod signer;

/// JSON-LD context of the Decentralized Claims Protocol.
pub const DCP_CONTEXT_URL: &str = "https://w3id.org/dspace-dcp/v1.0/dcp.jsonld";
/// JSON-LD context of the VC Data Model 1.1.
pub const W3C_CREDENTIALS_V1_URL: &str = "https://www.w3.org/2018/credentials/v1";
/// JSON-LD context of the VC Data Model 2.0.
pub const W3C_CREDENTIALS_V2_URL: &str = "https://www.w3.org/ns/credentials/v2";
/// JSON-LD context of the DIF Presentation Exchange submission.
pub const PRESENTATION_EXCHANGE_URL: &str =
    "https://identity.foundation/presentation-exchange/submission/v1";
pub const VERIFIABLE_PRESENTATION_TYPE: &str = "VerifiablePresentation";

/// Serialization format of a generated presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationFormat {
    /// VC Data Model 1.1 presentation secured as a JWT, with a `vp` claim.
    JwtVp,
    /// VC Data Model 2.0 enveloped presentation secured with JOSE.
    EnvelopedJoseVp,
}

impl fmt::Display for PresentationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentationFormat::JwtVp => write!(f, "JWT_VP"),
            PresentationFormat::EnvelopedJoseVp => write!(f, "ENVELOPED_JOSE_VP"),
        }
    }
}

/// Generator specific inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalData {
    /// Intended recipient of the presentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// DID of the controller of the signing key, used to compose the `kid`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationResponse {
    pub format: PresentationFormat,
    pub serialized_presentation: String,
    pub holder_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PresentationError {
    /// A required [AdditionalData] field is absent.
    #[error("Must provide additional data: '{0}'")]
    InsufficientInput(&'static str),
    /// Some credentials cannot be carried by the generator's format.
    #[error(
        "The {generator} can only handle credentials that are in {expected} format, but the following credentials are in a different format: [{}]",
        .violations.join(", ")
    )]
    FormatMismatch {
        generator: &'static str,
        expected: CredentialFormat,
        violations: Vec<String>,
    },
    #[error("no presentation generator is registered for format {0}")]
    NoGenerator(PresentationFormat),
    #[error("failed to sign presentation: {0:#}")]
    Signing(anyhow::Error),
    /// An unexpected fault, e.g. a presentation that could not be serialized.
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl PresentationError {
    /// Classify a failure of the [SigningService].
    pub fn signing(error: anyhow::Error) -> Self {
        if error.downcast_ref::<serde_json::Error>().is_some() {
            PresentationError::Internal(error)
        } else {
            PresentationError::Signing(error)
        }
    }
}

impl From<PresentationError> for ServiceError {
    fn from(value: PresentationError) -> Self {
        let category = match &value {
            PresentationError::InsufficientInput(_) => ErrorCategory::MalformedInput,
            PresentationError::FormatMismatch { .. } | PresentationError::NoGenerator(_) => {
                ErrorCategory::Unsupported
            }
            PresentationError::Signing(_) => ErrorCategory::UpstreamFailure,
            PresentationError::Internal(e) => {
                error!("presentation generation failed unexpectedly: {e:#}");
                return ServiceError::internal();
            }
        };
        ServiceError::new(category, value.to_string())
    }
}

/// Creates a serialized presentation of one format.
#[async_trait]
pub trait PresentationGenerator: Debug {
    fn format(&self) -> PresentationFormat;

    /// Package `credentials`, signing with `signing_key` on behalf of `issuer_id`.
    async fn generate(
        &self,
        credentials: &[Arc<VerifiableCredentialContainer>],
        signing_key: &SigningKeyRef,
        issuer_id: &str,
        additional_data: &AdditionalData,
    ) -> Result<String, PresentationError>;
}

/// The `kid` to sign with: `<controller>#<key_id>`, unless `key_id` is
/// already prefixed with the controller or there is no controller.
pub fn compose_key_id(controller: Option<&str>, key_id: &str) -> String {
    match controller {
        Some(controller) if !key_id.starts_with(controller) => format!("{controller}#{key_id}"),
        _ => key_id.to_owned(),
    }
}

/// Lists every credential whose format is not `expected`, as `<id> -> <format>`.
pub(crate) fn check_formats(
    generator: &'static str,
    expected: CredentialFormat,
    credentials: &[Arc<VerifiableCredentialContainer>],
) -> Result<(), PresentationError> {
    let violations: Vec<String> = credentials
        .iter()
        .filter(|credential| credential.format() != expected)
        .map(|credential| {
            format!(
                "{} -> {}",
                credential.id().unwrap_or("<unidentified>"),
                credential.format()
            )
        })
        .collect();

    if violations.is_empty() {
        return Ok(());
    }
    Err(PresentationError::FormatMismatch {
        generator,
        expected,
        violations,
    })
}

/// Fixed mapping from [PresentationFormat] to its generator.
#[derive(Debug, Clone, Default)]
pub struct PresentationGeneratorRegistry {
    generators: HashMap<PresentationFormat, Arc<dyn PresentationGenerator + Send + Sync>>,
}

impl PresentationGeneratorRegistry {
    pub fn new(generators: Vec<Arc<dyn PresentationGenerator + Send + Sync>>) -> Self {
        Self {
            generators: generators
                .into_iter()
                .map(|generator| (generator.format(), generator))
                .collect(),
        }
    }

    /// A registry holding the JWT-VP and the enveloped JOSE generators.
    pub fn with_defaults(
        signing: Arc<dyn SigningService + Send + Sync>,
        clock: Arc<dyn Clock>,
        config: &PipelineConfig,
    ) -> Self {
        let generators: Vec<Arc<dyn PresentationGenerator + Send + Sync>> = vec![
            Arc::new(JwtPresentationGenerator::new(
                signing.clone(),
                clock,
                config.presentation_ttl_secs,
            )),
            Arc::new(JwtEnvelopedPresentationGenerator::new(signing)),
        ];
        Self::new(generators)
    }

    pub async fn create_presentation(
        &self,
        format: PresentationFormat,
        credentials: &[Arc<VerifiableCredentialContainer>],
        signing_key: &SigningKeyRef,
        issuer_id: &str,
        additional_data: &AdditionalData,
    ) -> Result<PresentationResponse, PresentationError> {
        let Some(generator) = self.generators.get(&format) else {
            return Err(PresentationError::NoGenerator(format));
        };

        debug!(
            "creating {format} presentation with {} credential(s) for '{issuer_id}'",
            credentials.len()
        );

        let serialized_presentation = generator
            .generate(credentials, signing_key, issuer_id, additional_data)
            .await?;

        Ok(PresentationResponse {
            format,
            serialized_presentation,
            holder_id: issuer_id.to_owned(),
            audience: additional_data.aud.clone(),
        })
    }
}
