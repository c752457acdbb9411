//! Request-level handling of presentation queries.

use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::{
    config::PipelineConfig,
    core::{
        query::{PresentationQuery, PresentationQueryMessage},
        scope::{DefaultScopeTransformer, ScopeToCriterionTransformer},
        validation::ValidationRulesRegistry,
    },
    error::{ErrorCategory, ServiceError},
    holder::{
        service::PresentationService, signer::SigningService, PresentationGeneratorRegistry,
        PresentationResponse,
    },
    resolver::{store::CredentialStore, CredentialQueryResolver},
    utils::{Clock, SystemClock},
    verifier::{keys::PublicKeyResolver, participant::ParticipantLookup, SelfIssuedTokenVerifier},
};

const BEARER: &str = "Bearer";

/// Answers presentation queries of other participants.
///
/// For each query the bearer token is verified, the credentials granted by
/// its access token are resolved, and they are returned in a presentation
/// signed by the queried participant.
#[derive(Debug, Clone)]
pub struct PresentationQueryHandler {
    participants: Arc<dyn ParticipantLookup + Send + Sync>,
    verifier: SelfIssuedTokenVerifier,
    resolver: CredentialQueryResolver,
    presentations: PresentationService,
}

impl PresentationQueryHandler {
    pub fn builder() -> PresentationQueryHandlerBuilder {
        PresentationQueryHandlerBuilder::default()
    }

    /// Handle a query addressed to `participant_context_id`.
    ///
    /// `query` is the JSON body of the request and `authorization` the value
    /// of its `Authorization` header.
    pub async fn query_presentation(
        &self,
        participant_context_id: &str,
        query: &Json,
        authorization: Option<&str>,
    ) -> Result<PresentationResponse, ServiceError> {
        let Some(authorization) = authorization else {
            return Err(ServiceError::authentication_failure(
                "Authorization header missing",
            ));
        };
        let Some(token) = authorization.strip_prefix(BEARER) else {
            return Err(ServiceError::authentication_failure(
                "Authorization header must start with 'Bearer'",
            ));
        };
        let token = token.trim();

        let message: PresentationQueryMessage = serde_json::from_value(query.clone())
            .map_err(|e| ServiceError::malformed_input(format!("invalid presentation query: {e}")))?;
        let query = PresentationQuery::try_from(message)
            .map_err(|e| ServiceError::malformed_input(e.to_string()))?;

        if query.presentation_definition().is_some() {
            warn!("DIF Presentation Queries are not supported yet");
            return Err(ServiceError::new(ErrorCategory::Unsupported, "Not implemented."));
        }

        let participant = self
            .participants
            .participant(participant_context_id)
            .await
            .map_err(|e| ServiceError::upstream_failure(format!("participant lookup failed: {e:#}")))?
            .ok_or_else(|| {
                ServiceError::not_found(format!(
                    "participant context '{participant_context_id}' not found"
                ))
            })?;

        let granted = self.verifier.verify(token, participant_context_id).await?;

        let credentials: Vec<_> = self
            .resolver
            .resolve(participant_context_id, &query, &granted)
            .await?
            .collect();

        let audience = granted.requester();
        debug!(
            "presenting {} credential(s) of '{participant_context_id}' to '{audience}'",
            credentials.len()
        );

        Ok(self
            .presentations
            .create_presentation(&participant, &credentials, Some(audience))
            .await?)
    }
}

/// Builder struct for [PresentationQueryHandler].
///
/// Assembles the verifier, the resolver and the presentation service from
/// the given collaborators and [PipelineConfig].
#[derive(Debug, Clone, Default)]
pub struct PresentationQueryHandlerBuilder {
    config: PipelineConfig,
    participants: Option<Arc<dyn ParticipantLookup + Send + Sync>>,
    participant_keys: Option<Arc<dyn PublicKeyResolver + Send + Sync>>,
    authority_keys: Option<Arc<dyn PublicKeyResolver + Send + Sync>>,
    store: Option<Arc<dyn CredentialStore + Send + Sync>>,
    signing: Option<Arc<dyn SigningService + Send + Sync>>,
    transformer: Option<Arc<dyn ScopeToCriterionTransformer>>,
    rules: Option<ValidationRulesRegistry>,
    clock: Option<Arc<dyn Clock>>,
}

impl PresentationQueryHandlerBuilder {
    /// Build the handler.
    pub fn build(self) -> Result<PresentationQueryHandler> {
        let Self {
            config,
            participants,
            participant_keys,
            authority_keys,
            store,
            signing,
            transformer,
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

        let Some(store) = store else {
            bail!("credential store is required, see `with_store`")
        };

        let Some(signing) = signing else {
            bail!("signing service is required, see `with_signing_service`")
        };

        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock));
        let transformer = transformer
            .unwrap_or_else(|| Arc::new(DefaultScopeTransformer::new(&config.scope_alias)));
        let rules = rules.unwrap_or_else(|| {
            ValidationRulesRegistry::with_default_rules(config.clock_skew_leeway_secs)
        });

        let verifier = SelfIssuedTokenVerifier::builder()
            .with_participants(participants.clone())
            .with_participant_keys(participant_keys)
            .with_authority_keys(authority_keys)
            .with_rules(Arc::new(rules))
            .with_clock(clock.clone())
            .build()?;

        let resolver = CredentialQueryResolver::builder()
            .with_store(store)
            .with_transformer(transformer)
            .with_clock(clock.clone())
            .build()?;

        let registry = PresentationGeneratorRegistry::with_defaults(signing, clock, &config);
        let presentations =
            PresentationService::new(Arc::new(registry), config.default_presentation_format);

        Ok(PresentationQueryHandler {
            participants,
            verifier,
            resolver,
            presentations,
        })
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_participants(
        mut self,
        participants: Arc<dyn ParticipantLookup + Send + Sync>,
    ) -> Self {
        self.participants = Some(participants);
        self
    }

    /// Set the resolver for keys of requesters, see
    /// [SelfIssuedTokenVerifierBuilder::with_participant_keys](crate::verifier::SelfIssuedTokenVerifierBuilder::with_participant_keys).
    pub fn with_participant_keys(
        mut self,
        resolver: Arc<dyn PublicKeyResolver + Send + Sync>,
    ) -> Self {
        self.participant_keys = Some(resolver);
        self
    }

    /// Set the resolver for keys of the token-issuing authority.
    pub fn with_authority_keys(mut self, resolver: Arc<dyn PublicKeyResolver + Send + Sync>) -> Self {
        self.authority_keys = Some(resolver);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn CredentialStore + Send + Sync>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_signing_service(mut self, signing: Arc<dyn SigningService + Send + Sync>) -> Self {
        self.signing = Some(signing);
        self
    }

    /// Replace the [DefaultScopeTransformer] built from the configured alias.
    pub fn with_transformer(mut self, transformer: Arc<dyn ScopeToCriterionTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Replace the default `nbf`/`exp` rules built from the configured leeway.
    pub fn with_rules(mut self, rules: ValidationRulesRegistry) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }
}
