use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::utils::NonEmptyVec;

/// Property of the wire message carrying the requested scopes.
pub const SCOPE_PROPERTY: &str = "scope";
/// Property of the wire message carrying a DIF presentation definition.
pub const PRESENTATION_DEFINITION_PROPERTY: &str = "presentationDefinition";

/// A request for credentials, in exactly one of two shapes.
///
/// Decoding from JSON rejects messages that carry neither or both shapes:
///
/// ```
/// # use dcp_presentation::core::query::PresentationQuery;
/// # use serde_json::json;
/// let query: PresentationQuery = serde_json::from_value(json!({
///     "scope": ["org.eclipse.edc.vc.type:MembershipCredential:read"]
/// })).unwrap();
/// assert!(query.scopes().is_some());
///
/// assert!(serde_json::from_value::<PresentationQuery>(json!({ "scope": [] })).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PresentationQueryMessage", into = "PresentationQueryMessage")]
pub enum PresentationQuery {
    /// Scope strings naming the requested credential types.
    Scopes(NonEmptyVec<String>),
    /// A presentation definition. Decoded so it can be rejected explicitly,
    /// it is never evaluated.
    PresentationDefinition(Map<String, Json>),
}

impl PresentationQuery {
    pub fn scopes(&self) -> Option<&[String]> {
        match self {
            PresentationQuery::Scopes(scopes) => Some(scopes),
            PresentationQuery::PresentationDefinition(_) => None,
        }
    }

    pub fn presentation_definition(&self) -> Option<&Map<String, Json>> {
        match self {
            PresentationQuery::Scopes(_) => None,
            PresentationQuery::PresentationDefinition(definition) => Some(definition),
        }
    }
}

/// Wire form of a [PresentationQuery].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresentationQueryMessage {
    #[serde(
        rename = "scope",
        alias = "scopes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub scopes: Option<Vec<String>>,
    #[serde(
        rename = "presentationDefinition",
        alias = "presentation_definition",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub presentation_definition: Option<Map<String, Json>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryValidationError {
    #[error("Must contain either a non-null, non-empty 'scopes' property or a non-empty 'presentationDefinition' property.")]
    Missing,
    #[error("Must contain either a non-null, non-empty 'scopes' property or a non-empty 'presentationDefinition' property, not both.")]
    Ambiguous,
}

impl TryFrom<PresentationQueryMessage> for PresentationQuery {
    type Error = QueryValidationError;

    fn try_from(message: PresentationQueryMessage) -> Result<Self, Self::Error> {
        let scopes = message.scopes.and_then(NonEmptyVec::maybe_new);
        let definition = message
            .presentation_definition
            .filter(|definition| !definition.is_empty());

        match (scopes, definition) {
            (Some(_), Some(_)) => Err(QueryValidationError::Ambiguous),
            (Some(scopes), None) => Ok(PresentationQuery::Scopes(scopes)),
            (None, Some(definition)) => Ok(PresentationQuery::PresentationDefinition(definition)),
            (None, None) => Err(QueryValidationError::Missing),
        }
    }
}

impl From<PresentationQuery> for PresentationQueryMessage {
    fn from(query: PresentationQuery) -> Self {
        match query {
            PresentationQuery::Scopes(scopes) => Self {
                scopes: Some(scopes.into_inner()),
                presentation_definition: None,
            },
            PresentationQuery::PresentationDefinition(definition) => Self {
                scopes: None,
                presentation_definition: Some(definition),
            },
        }
    }
}

/// Comparison applied by a [Criterion].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    /// The operand is a list containing the value, or a single value equal to it.
    #[serde(rename = "contains")]
    Contains,
    /// The value is a list containing the operand.
    #[serde(rename = "in")]
    In,
}

/// A single filter expression understood by a
/// [CredentialStore](crate::resolver::store::CredentialStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub operand: String,
    pub operator: Operator,
    pub value: Json,
}

impl Criterion {
    pub fn new(operand: impl Into<String>, operator: Operator, value: impl Into<Json>) -> Self {
        Self {
            operand: operand.into(),
            operator,
            value: value.into(),
        }
    }

    /// Evaluates the criterion against the operand's value, if present.
    pub fn matches(&self, operand: Option<&Json>) -> bool {
        match self.operator {
            Operator::Equals => operand == Some(&self.value),
            Operator::NotEquals => operand != Some(&self.value),
            Operator::Contains => match operand {
                Some(Json::Array(values)) => values.contains(&self.value),
                Some(value) => value == &self.value,
                None => false,
            },
            Operator::In => match (&self.value, operand) {
                (Json::Array(values), Some(operand)) => values.contains(operand),
                _ => false,
            },
        }
    }
}

/// A composed credential query.
///
/// A credential matches when it satisfies every criterion in `filters` and at
/// least one criterion in `any_of` (an empty `any_of` matches everything).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialQuery {
    pub any_of: Vec<Criterion>,
    pub filters: Vec<Criterion>,
}

impl CredentialQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add alternatives to the disjunction.
    pub fn any_of(mut self, criteria: impl IntoIterator<Item = Criterion>) -> Self {
        self.any_of.extend(criteria);
        self
    }

    /// Add a mandatory filter.
    pub fn filter(mut self, criterion: Criterion) -> Self {
        self.filters.push(criterion);
        self
    }

    /// Evaluates the query, given a way to look up operand values.
    pub fn matches<'a>(&self, lookup: impl Fn(&str) -> Option<&'a Json>) -> bool {
        self.filters
            .iter()
            .all(|criterion| criterion.matches(lookup(&criterion.operand)))
            && (self.any_of.is_empty()
                || self
                    .any_of
                    .iter()
                    .any(|criterion| criterion.matches(lookup(&criterion.operand))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_scope_query() {
        let query: PresentationQuery = serde_json::from_value(json!({
            "@context": ["https://w3id.org/dspace-dcp/v1.0/dcp.jsonld"],
            "type": "PresentationQueryMessage",
            "scope": ["org.eclipse.edc.vc.type:MembershipCredential:read"]
        }))
        .unwrap();

        assert_eq!(
            query.scopes().unwrap(),
            ["org.eclipse.edc.vc.type:MembershipCredential:read".to_string()]
        );
        assert!(query.presentation_definition().is_none());
    }

    #[test]
    fn decodes_presentation_definition_query() {
        let query: PresentationQuery = serde_json::from_value(json!({
            "presentationDefinition": { "id": "pd-1", "input_descriptors": [] }
        }))
        .unwrap();

        assert!(query.scopes().is_none());
        assert_eq!(query.presentation_definition().unwrap()["id"], json!("pd-1"));
    }

    #[test]
    fn rejects_missing_and_ambiguous_queries() {
        let missing = PresentationQuery::try_from(PresentationQueryMessage {
            scopes: Some(vec![]),
            presentation_definition: Some(Map::new()),
        });
        assert_eq!(missing, Err(QueryValidationError::Missing));

        let both: PresentationQueryMessage = serde_json::from_value(json!({
            "scopes": ["org.eclipse.edc.vc.type:MembershipCredential:read"],
            "presentation_definition": { "id": "pd-1" }
        }))
        .unwrap();
        assert_eq!(
            PresentationQuery::try_from(both),
            Err(QueryValidationError::Ambiguous)
        );

        let error = serde_json::from_value::<PresentationQuery>(json!({})).unwrap_err();
        assert!(error.to_string().contains("non-empty 'scopes' property"));
    }

    #[test]
    fn evaluates_operators() {
        let types = json!(["VerifiableCredential", "MembershipCredential"]);
        let contains = Criterion::new("credential.type", Operator::Contains, "MembershipCredential");
        assert!(contains.matches(Some(&types)));
        assert!(!contains.matches(Some(&json!(["VerifiableCredential"]))));
        assert!(!contains.matches(None));

        let state = json!("stored");
        assert!(Criterion::new("state", Operator::NotEquals, "revoked").matches(Some(&state)));
        assert!(Criterion::new("state", Operator::Equals, "stored").matches(Some(&state)));
        assert!(Criterion::new("state", Operator::In, json!(["issued", "stored"])).matches(Some(&state)));
    }

    #[test]
    fn query_combines_filters_and_alternatives() {
        let record = json!({ "owner": "p1", "type": ["FooCredential"] });
        let lookup = |operand: &str| record.get(operand);

        let query = CredentialQuery::new()
            .any_of([
                Criterion::new("type", Operator::Contains, "FooCredential"),
                Criterion::new("type", Operator::Contains, "BarCredential"),
            ])
            .filter(Criterion::new("owner", Operator::Equals, "p1"));
        assert!(query.matches(lookup));

        let other_owner = query
            .clone()
            .filter(Criterion::new("owner", Operator::Equals, "p2"));
        assert!(!other_owner.matches(lookup));
    }
}
