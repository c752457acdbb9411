use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tokio::sync::RwLock;

use crate::core::{credential::VerifiableCredentialContainer, query::CredentialQuery};

/// Operand naming the participant context that owns a credential.
pub const PARTICIPANT_CONTEXT_ID_OPERAND: &str = "participantContextId";
/// Operand naming the lifecycle state of a credential.
pub const STATE_OPERAND: &str = "state";
/// Operand naming the record id.
pub const ID_OPERAND: &str = "id";
/// Prefix of operands addressing the parsed credential document.
pub const CREDENTIAL_OPERAND_PREFIX: &str = "credential.";

/// Lifecycle state of a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialState {
    Initial,
    Issued,
    NotYetValid,
    Suspended,
    Revoked,
    Expired,
}

impl From<CredentialState> for Json {
    fn from(state: CredentialState) -> Self {
        // Unit variants always serialize to a string.
        serde_json::to_value(state).unwrap_or(Json::Null)
    }
}

/// Storage interface for credentials.
#[async_trait]
pub trait CredentialStore: Debug {
    /// Return every credential matching `query`.
    async fn query(
        &self,
        query: &CredentialQuery,
    ) -> Result<Vec<Arc<VerifiableCredentialContainer>>>;
}

/// A stored credential with its bookkeeping fields.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    fields: Map<String, Json>,
    container: Arc<VerifiableCredentialContainer>,
}

impl CredentialRecord {
    pub fn new(
        id: impl Into<String>,
        participant_context_id: impl Into<String>,
        state: CredentialState,
        container: VerifiableCredentialContainer,
    ) -> Self {
        let mut fields = Map::new();
        fields.insert(ID_OPERAND.into(), Json::String(id.into()));
        fields.insert(
            PARTICIPANT_CONTEXT_ID_OPERAND.into(),
            Json::String(participant_context_id.into()),
        );
        fields.insert(STATE_OPERAND.into(), state.into());
        Self {
            fields,
            container: Arc::new(container),
        }
    }

    pub fn id(&self) -> &str {
        self.fields
            .get(ID_OPERAND)
            .and_then(Json::as_str)
            .unwrap_or_default()
    }

    pub fn container(&self) -> &Arc<VerifiableCredentialContainer> {
        &self.container
    }

    /// Value of `operand` for this record.
    ///
    /// `credential.<path>` is looked up in the parsed credential, falling back
    /// to the `vc` object of a JWT-VC payload.
    pub fn operand(&self, operand: &str) -> Option<&Json> {
        match operand.strip_prefix(CREDENTIAL_OPERAND_PREFIX) {
            Some(path) => self
                .container
                .claim_at(path)
                .or_else(|| self.container.claim_at(&format!("vc.{path}"))),
            None => self.fields.get(operand),
        }
    }
}

/// A local in-memory credential store. Not for production use!
///
/// # Warning
/// This in-memory store should only be used for test purposes, it will not work for a distributed
/// deployment.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    store: Arc<RwLock<BTreeMap<String, CredentialRecord>>>,
}

impl MemoryCredentialStore {
    /// Insert or replace a record.
    pub async fn insert(&self, record: CredentialRecord) {
        self.store
            .write()
            .await
            .insert(record.id().to_owned(), record);
    }

    pub async fn delete(&self, id: &str) -> Result<CredentialRecord> {
        self.store
            .write()
            .await
            .remove(id)
            .context("credential record not found")
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn query(
        &self,
        query: &CredentialQuery,
    ) -> Result<Vec<Arc<VerifiableCredentialContainer>>> {
        Ok(self
            .store
            .read()
            .await
            .values()
            .filter(|record| query.matches(|operand| record.operand(operand)))
            .map(|record| record.container.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        credential::CredentialFormat,
        query::{Criterion, Operator},
    };
    use serde_json::json;

    fn record(id: &str, owner: &str, state: CredentialState, claims: Json) -> CredentialRecord {
        let Json::Object(claims) = claims else {
            panic!("claims must be an object")
        };
        CredentialRecord::new(
            id,
            owner,
            state,
            VerifiableCredentialContainer::new(id, CredentialFormat::Jwt, claims),
        )
    }

    #[tokio::test]
    async fn filters_by_bookkeeping_fields_and_credential_claims() {
        let store = MemoryCredentialStore::default();
        store
            .insert(record(
                "c1",
                "p1",
                CredentialState::Issued,
                json!({ "type": ["VerifiableCredential", "MembershipCredential"] }),
            ))
            .await;
        store
            .insert(record(
                "c2",
                "p1",
                CredentialState::Revoked,
                json!({ "type": ["VerifiableCredential", "MembershipCredential"] }),
            ))
            .await;
        store
            .insert(record(
                "c3",
                "p2",
                CredentialState::Issued,
                json!({ "vc": { "type": ["VerifiableCredential", "MembershipCredential"] } }),
            ))
            .await;

        let query = CredentialQuery::new()
            .filter(Criterion::new(
                STATE_OPERAND,
                Operator::NotEquals,
                CredentialState::Revoked,
            ))
            .any_of([Criterion::new(
                "credential.type",
                Operator::Contains,
                "MembershipCredential",
            )]);
        let found: Vec<_> = store
            .query(&query)
            .await
            .unwrap()
            .iter()
            .map(|vc| vc.raw().to_owned())
            .collect();
        assert_eq!(found, ["c1", "c3"]);

        let query = query.filter(Criterion::new(
            PARTICIPANT_CONTEXT_ID_OPERAND,
            Operator::Equals,
            "p2",
        ));
        assert_eq!(store.query(&query).await.unwrap().len(), 1);

        let query = CredentialQuery::new().filter(Criterion::new(
            ID_OPERAND,
            Operator::In,
            json!(["c2", "c3"]),
        ));
        assert_eq!(store.query(&query).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = MemoryCredentialStore::default();
        store
            .insert(record("c1", "p1", CredentialState::Issued, json!({})))
            .await;

        assert_eq!(store.delete("c1").await.unwrap().id(), "c1");
        assert!(store.delete("c1").await.is_err());
        assert!(store.query(&CredentialQuery::new()).await.unwrap().is_empty());
    }
}
