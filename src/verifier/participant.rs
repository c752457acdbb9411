use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Reference to the key a participant signs presentations with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKeyRef {
    /// Alias under which the signing service holds the private key.
    pub private_key_alias: String,
    /// Identifier the counterparty uses to resolve the public key.
    pub key_id: String,
}

/// The tenant record of one dataspace participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantContext {
    participant_context_id: String,
    did: String,
    signing_key: SigningKeyRef,
}

impl ParticipantContext {
    pub fn new(
        participant_context_id: impl Into<String>,
        did: impl Into<String>,
        signing_key: SigningKeyRef,
    ) -> Self {
        Self {
            participant_context_id: participant_context_id.into(),
            did: did.into(),
            signing_key,
        }
    }

    pub fn participant_context_id(&self) -> &str {
        &self.participant_context_id
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn signing_key(&self) -> &SigningKeyRef {
        &self.signing_key
    }
}

/// Lookup of participant contexts by id.
#[async_trait]
pub trait ParticipantLookup: Debug {
    /// Returns `Ok(None)` when no participant context with that id exists.
    async fn participant(&self, participant_context_id: &str) -> Result<Option<ParticipantContext>>;
}

/// A local in-memory participant store. Not for production use!
#[derive(Debug, Clone, Default)]
pub struct MemoryParticipantStore {
    participants: Arc<RwLock<BTreeMap<String, ParticipantContext>>>,
}

impl MemoryParticipantStore {
    pub async fn insert(&self, participant: ParticipantContext) {
        self.participants
            .write()
            .await
            .insert(participant.participant_context_id.clone(), participant);
    }
}

#[async_trait]
impl ParticipantLookup for MemoryParticipantStore {
    async fn participant(&self, participant_context_id: &str) -> Result<Option<ParticipantContext>> {
        Ok(self
            .participants
            .read()
            .await
            .get(participant_context_id)
            .cloned())
    }
}
