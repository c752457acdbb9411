use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Serialization format of a stored Verifiable Credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialFormat {
    /// VC Data Model 1.1 secured as a JWT (`jwt_vc`).
    #[serde(rename = "jwt")]
    Jwt,
    /// VC Data Model secured with a Linked Data Proof.
    #[serde(rename = "json_ld")]
    JsonLd,
    /// VC Data Model 2.0 secured with JOSE (`vc+jwt`).
    #[serde(rename = "vc2_0_jose")]
    Jose,
}

impl fmt::Display for CredentialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialFormat::Jwt => write!(f, "JWT"),
            CredentialFormat::JsonLd => write!(f, "JSON_LD"),
            CredentialFormat::Jose => write!(f, "VC2_0_JOSE"),
        }
    }
}

/// A credential as it is held in the credential store.
///
/// `raw` is the credential exactly as it was issued (a compact JWS for
/// [CredentialFormat::Jwt] and [CredentialFormat::Jose]), `claims` is the
/// parsed credential document. Containers are shared by reference between the
/// store, the query resolver and the presentation generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiableCredentialContainer {
    raw: String,
    format: CredentialFormat,
    claims: Map<String, Json>,
}

impl VerifiableCredentialContainer {
    pub fn new(raw: impl Into<String>, format: CredentialFormat, claims: Map<String, Json>) -> Self {
        Self {
            raw: raw.into(),
            format,
            claims,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn format(&self) -> CredentialFormat {
        self.format
    }

    pub fn claims(&self) -> &Map<String, Json> {
        &self.claims
    }

    /// The credential identifier, if the parsed document carries one.
    ///
    /// Looks at `id`, then `jti`, then the `vc.id` of a JWT-VC payload.
    pub fn id(&self) -> Option<&str> {
        self.claims
            .get("id")
            .or_else(|| self.claims.get("jti"))
            .or_else(|| self.claims.get("vc").and_then(|vc| vc.get("id")))
            .and_then(Json::as_str)
    }

    /// Start of the validity period (`validFrom`, or the 1.1 `issuanceDate`).
    pub fn valid_from(&self) -> Option<DateTime<Utc>> {
        self.date_claim("validFrom")
            .or_else(|| self.date_claim("issuanceDate"))
    }

    /// End of the validity period (`validUntil`, or the 1.1 `expirationDate`).
    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.date_claim("validUntil")
            .or_else(|| self.date_claim("expirationDate"))
    }

    /// Looks up a claim by dotted path, e.g. `credentialSubject.id`.
    pub fn claim_at(&self, path: &str) -> Option<&Json> {
        let mut segments = path.split('.');
        let first = self.claims.get(segments.next()?)?;
        segments.try_fold(first, |value, segment| value.get(segment))
    }

    fn date_claim(&self, name: &str) -> Option<DateTime<Utc>> {
        let value = self.claims.get(name)?.as_str()?;
        DateTime::parse_from_rfc3339(value)
            .map(|date| date.with_timezone(&Utc))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn container(claims: Json) -> VerifiableCredentialContainer {
        let Json::Object(claims) = claims else {
            panic!("claims must be an object")
        };
        VerifiableCredentialContainer::new("raw", CredentialFormat::Jwt, claims)
    }

    #[test]
    fn reads_identifier_and_claims() {
        let vc = container(json!({
            "id": "urn:uuid:1234",
            "type": ["VerifiableCredential", "MembershipCredential"],
            "credentialSubject": { "id": "did:web:holder", "level": "gold" }
        }));

        assert_eq!(vc.id(), Some("urn:uuid:1234"));
        assert_eq!(
            vc.claim_at("credentialSubject.level"),
            Some(&json!("gold"))
        );
        assert_eq!(vc.claim_at("credentialSubject.missing"), None);

        let jwt_vc = container(json!({ "vc": { "id": "urn:uuid:5678" } }));
        assert_eq!(jwt_vc.id(), Some("urn:uuid:5678"));
    }

    #[test]
    fn parses_validity_period() {
        let vc = container(json!({
            "issuanceDate": "2024-01-01T00:00:00Z",
            "validUntil": "2030-01-01T00:00:00+01:00"
        }));

        assert_eq!(vc.valid_from().unwrap().timestamp(), 1_704_067_200);
        assert_eq!(vc.valid_until().unwrap().timestamp(), 1_893_452_400);
    }
}
