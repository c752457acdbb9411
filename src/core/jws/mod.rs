//! Compact JWS decoding and signature verification.
//!
//! Only the compact serialization is supported, and only `ES256` signatures
//! are verified (see [verifier::P256Verifier]).

use std::collections::BTreeSet;

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use ssi::JWK;

use verifier::{P256Verifier, Verifier};

pub mod verifier;

pub const ISSUER: &str = "iss";
pub const SUBJECT: &str = "sub";
pub const AUDIENCE: &str = "aud";
pub const ISSUED_AT: &str = "iat";
pub const NOT_BEFORE: &str = "nbf";
pub const EXPIRATION_TIME: &str = "exp";
pub const JWT_ID: &str = "jti";

#[derive(Debug, thiserror::Error)]
pub enum JwsError {
    #[error("token is malformed: {0}")]
    Malformed(String),
    #[error("unsupported signature algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("invalid public key: {0}")]
    InvalidKey(String),
    #[error("signature verification failed")]
    InvalidSignature,
    /// A fault unrelated to the token or the key, e.g. a failing serializer.
    #[error("internal error during signature verification: {0:#}")]
    Internal(anyhow::Error),
}

/// The protected header of a compact JWS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// A decoded but not yet verified compact JWS.
#[derive(Debug, Clone)]
pub struct CompactJws<'a> {
    signing_input: &'a str,
    header: JwsHeader,
    claims: Map<String, Json>,
    signature: Vec<u8>,
}

impl<'a> CompactJws<'a> {
    /// Splits and decodes a compact JWS. No signature check is performed.
    pub fn decode(token: &'a str) -> Result<Self, JwsError> {
        let (header_b64, payload_b64, signature_b64) = ssi::claims::jws::split_jws(token)
            .map_err(|e| JwsError::Malformed(e.to_string()))?;

        let header = decode_segment(header_b64, "header")?;
        let header: JwsHeader = serde_json::from_slice(&header)
            .map_err(|e| JwsError::Malformed(format!("header is not a valid JWS header: {e}")))?;

        let claims = decode_segment(payload_b64, "payload")?;
        let claims: Map<String, Json> = serde_json::from_slice(&claims)
            .map_err(|e| JwsError::Malformed(format!("payload is not a JSON object: {e}")))?;

        let signature = decode_segment(signature_b64, "signature")?;

        Ok(Self {
            signing_input: &token[..header_b64.len() + 1 + payload_b64.len()],
            header,
            claims,
            signature,
        })
    }

    pub fn header(&self) -> &JwsHeader {
        &self.header
    }

    /// The `kid` header, if any.
    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Claims of the token. These are not trustworthy until [CompactJws::verify]
    /// succeeded.
    pub fn unverified_claims(&self) -> &Map<String, Json> {
        &self.claims
    }

    /// Verifies the signature against `jwk` and returns the trusted claims.
    pub fn verify(self, jwk: &JWK) -> Result<ClaimToken, JwsError> {
        if self.header.alg != "ES256" {
            return Err(JwsError::UnsupportedAlgorithm(self.header.alg));
        }

        let verifier = P256Verifier::from_jwk(jwk, &self.header.alg).map_err(key_error)?;

        verifier
            .verify(self.signing_input.as_bytes(), &self.signature)
            .map_err(|_| JwsError::InvalidSignature)?;

        Ok(ClaimToken {
            header: self.header,
            claims: self.claims,
        })
    }
}

fn key_error(error: anyhow::Error) -> JwsError {
    if error.downcast_ref::<serde_json::Error>().is_some() {
        JwsError::Internal(error)
    } else {
        JwsError::InvalidKey(error.to_string())
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, JwsError> {
    BASE64_URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| JwsError::Malformed(format!("{name} is not valid base64url")))
}

/// The claims of a token whose signature has been verified.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimToken {
    header: JwsHeader,
    claims: Map<String, Json>,
}

impl ClaimToken {
    #[cfg(test)]
    pub(crate) fn from_parts(header: JwsHeader, claims: Map<String, Json>) -> Self {
        Self { header, claims }
    }

    pub fn header(&self) -> &JwsHeader {
        &self.header
    }

    /// The `kid` of the key the signature was verified with.
    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    pub fn claims(&self) -> &Map<String, Json> {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Json> {
        self.claims.get(name)
    }

    pub fn string_claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Json::as_str)
    }

    /// A numeric date claim, in seconds since the UNIX epoch.
    pub fn date_claim(&self, name: &str) -> Option<u64> {
        self.claims.get(name).and_then(Json::as_u64)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.string_claim(ISSUER)
    }

    pub fn subject(&self) -> Option<&str> {
        self.string_claim(SUBJECT)
    }

    /// The `aud` claim, which may be a single string or an array of strings.
    pub fn audience(&self) -> BTreeSet<&str> {
        match self.claims.get(AUDIENCE) {
            Some(Json::String(aud)) => BTreeSet::from([aud.as_str()]),
            Some(Json::Array(aud)) => aud.iter().filter_map(Json::as_str).collect(),
            _ => BTreeSet::new(),
        }
    }

    pub fn issued_at(&self) -> Option<u64> {
        self.date_claim(ISSUED_AT)
    }

    pub fn not_before(&self) -> Option<u64> {
        self.date_claim(NOT_BEFORE)
    }

    pub fn expiration(&self) -> Option<u64> {
        self.date_claim(EXPIRATION_TIME)
    }
}
