//! Authorization and execution of credential queries.

use std::{fmt::Debug, sync::Arc};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    core::{
        credential::VerifiableCredentialContainer,
        query::{CredentialQuery, Criterion, Operator, PresentationQuery, SCOPE_PROPERTY},
        scope::{ScopeError, ScopeToCriterionTransformer},
    },
    error::{ErrorCategory, ServiceError},
    utils::{Clock, SystemClock},
    verifier::GrantedScopes,
};

use store::{CredentialState, CredentialStore, PARTICIPANT_CONTEXT_ID_OPERAND, STATE_OPERAND};

pub mod store;

/// Lazily filtered credentials returned by [CredentialQueryResolver::resolve].
pub type Credentials = Box<dyn Iterator<Item = Arc<VerifiableCredentialContainer>> + Send>;

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    /// Presentation definitions are not evaluated.
    #[error("Querying with a DIF Presentation Exchange definition is not yet supported.")]
    Unsupported,
    #[error("Permission was not granted on any credentials for scope '{0}'.")]
    UnauthorizedScope(String),
    #[error(transparent)]
    InvalidScope(ScopeError),
    #[error("credential store query failed: {0:#}")]
    StorageFailure(anyhow::Error),
}

impl From<ResolutionError> for ServiceError {
    fn from(value: ResolutionError) -> Self {
        let category = match &value {
            ResolutionError::Unsupported => ErrorCategory::Unsupported,
            ResolutionError::UnauthorizedScope(_) => ErrorCategory::AuthorizationFailure,
            ResolutionError::InvalidScope(_) => {
                return ServiceError::malformed_input(value.to_string()).with_path(SCOPE_PROPERTY)
            }
            ResolutionError::StorageFailure(_) => ErrorCategory::UpstreamFailure,
        };
        ServiceError::new(category, value.to_string())
    }
}

/// Resolves a [PresentationQuery] against the credential store, limited to
/// the scopes the requester was granted.
#[derive(Debug, Clone)]
pub struct CredentialQueryResolver {
    store: Arc<dyn CredentialStore + Send + Sync>,
    transformer: Arc<dyn ScopeToCriterionTransformer>,
    clock: Arc<dyn Clock>,
}

impl CredentialQueryResolver {
    pub fn builder() -> CredentialQueryResolverBuilder {
        CredentialQueryResolverBuilder::default()
    }

    /// Resolve `query` for the credentials owned by `participant_context_id`.
    ///
    /// Every requested scope must be one of `granted` and must be a valid
    /// scope string; both are checked before the store is queried. The
    /// returned credentials are owned by the participant, neither revoked nor
    /// expired, match at least one requested scope, and are within their
    /// validity period.
    pub async fn resolve(
        &self,
        participant_context_id: &str,
        query: &PresentationQuery,
        granted: &GrantedScopes,
    ) -> Result<Credentials, ResolutionError> {
        let PresentationQuery::Scopes(requested) = query else {
            return Err(ResolutionError::Unsupported);
        };

        let criteria = requested
            .iter()
            .map(|scope| {
                if !granted.contains(scope) {
                    return Err(ResolutionError::UnauthorizedScope(scope.clone()));
                }
                self.transformer
                    .transform(scope)
                    .map_err(ResolutionError::InvalidScope)
            })
            .collect::<Result<Vec<Criterion>, _>>()?;

        let query = CredentialQuery::new()
            .filter(Criterion::new(
                PARTICIPANT_CONTEXT_ID_OPERAND,
                Operator::Equals,
                participant_context_id,
            ))
            .filter(Criterion::new(
                STATE_OPERAND,
                Operator::NotEquals,
                CredentialState::Revoked,
            ))
            .filter(Criterion::new(
                STATE_OPERAND,
                Operator::NotEquals,
                CredentialState::Expired,
            ))
            .any_of(criteria);

        let credentials = self
            .store
            .query(&query)
            .await
            .map_err(ResolutionError::StorageFailure)?;

        debug!(
            "credential store returned {} credential(s) for participant '{participant_context_id}'",
            credentials.len()
        );

        let now = DateTime::<Utc>::from_timestamp(self.clock.now() as i64, 0).unwrap_or_default();
        Ok(Box::new(
            credentials
                .into_iter()
                .filter(move |credential| within_validity_period(credential, now)),
        ))
    }
}

fn within_validity_period(credential: &VerifiableCredentialContainer, now: DateTime<Utc>) -> bool {
    let id = credential.id().unwrap_or("<unidentified>");
    if let Some(valid_from) = credential.valid_from() {
        if valid_from > now {
            warn!("credential '{id}' is not yet valid (valid from {valid_from}), it is not presented");
            return false;
        }
    }
    if let Some(valid_until) = credential.valid_until() {
        if valid_until < now {
            warn!("credential '{id}' has expired (valid until {valid_until}), it is not presented");
            return false;
        }
    }
    true
}

/// Builder struct for [CredentialQueryResolver].
#[derive(Debug, Clone, Default)]
pub struct CredentialQueryResolverBuilder {
    store: Option<Arc<dyn CredentialStore + Send + Sync>>,
    transformer: Option<Arc<dyn ScopeToCriterionTransformer>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CredentialQueryResolverBuilder {
    pub fn build(self) -> Result<CredentialQueryResolver> {
        let Self {
            store,
            transformer,
            clock,
        } = self;

        let Some(store) = store else {
            bail!("credential store is required, see `with_store`")
        };

        let Some(transformer) = transformer else {
            bail!("scope transformer is required, see `with_transformer`")
        };

        Ok(CredentialQueryResolver {
            store,
            transformer,
            clock: clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }

    pub fn with_store(mut self, store: Arc<dyn CredentialStore + Send + Sync>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn ScopeToCriterionTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }
}
