use std::{collections::HashMap, fmt::Debug, sync::Arc};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::prelude::*;
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use serde_json::{Map, Value as Json};
use ssi::jwk::JWK;

/// A private key able to produce JWS signatures.
#[async_trait]
pub trait TokenSigner: Debug {
    /// The algorithm that will be used to sign.
    fn alg(&self) -> &str;
    /// The public JWK of the signer.
    fn jwk(&self) -> &JWK;
    async fn sign(&self, payload: &[u8]) -> Vec<u8>;
}

#[derive(Debug)]
pub struct P256Signer {
    key: SigningKey,
    jwk: JWK,
}

impl P256Signer {
    pub fn new(key: SigningKey) -> Result<Self> {
        let pk: p256::PublicKey = key.verifying_key().into();
        let jwk = serde_json::from_str(&pk.to_jwk_string())?;
        Ok(Self { key, jwk })
    }
}

#[async_trait]
impl TokenSigner for P256Signer {
    fn alg(&self) -> &str {
        "ES256"
    }

    fn jwk(&self) -> &JWK {
        &self.jwk
    }

    async fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let sig: Signature = self.key.sign(payload);
        sig.to_vec()
    }
}

/// Produces compact JWS tokens with keys referenced by alias.
///
/// Private key material never leaves the signing service.
#[async_trait]
pub trait SigningService: Debug {
    /// Sign `claims` with the private key known as `private_key_alias`.
    ///
    /// `header` holds additional protected header parameters, such as `kid`
    /// and `typ`. The `alg` parameter is always set by the service.
    async fn sign(
        &self,
        private_key_alias: &str,
        claims: &Map<String, Json>,
        header: &Map<String, Json>,
    ) -> Result<String>;
}

/// A [SigningService] holding its signers in memory. Not for production use!
#[derive(Debug, Clone, Default)]
pub struct LocalSigningService {
    signers: HashMap<String, Arc<dyn TokenSigner + Send + Sync>>,
}

impl LocalSigningService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signer(
        mut self,
        private_key_alias: impl Into<String>,
        signer: Arc<dyn TokenSigner + Send + Sync>,
    ) -> Self {
        self.signers.insert(private_key_alias.into(), signer);
        self
    }
}

#[async_trait]
impl SigningService for LocalSigningService {
    async fn sign(
        &self,
        private_key_alias: &str,
        claims: &Map<String, Json>,
        header: &Map<String, Json>,
    ) -> Result<String> {
        let Some(signer) = self.signers.get(private_key_alias) else {
            bail!("no private key with alias '{private_key_alias}'")
        };

        let mut header = header.clone();
        header.insert("alg".into(), Json::String(signer.alg().to_owned()));

        make_jwt(&Json::Object(header), claims, signer.as_ref())
            .await
            .with_context(|| format!("failed to sign with key '{private_key_alias}'"))
    }
}

async fn make_jwt<S: TokenSigner + ?Sized>(
    header: &Json,
    body: &Map<String, Json>,
    signer: &S,
) -> Result<String> {
    let header_b64: String =
        serde_json::to_vec(header).map(|b| BASE64_URL_SAFE_NO_PAD.encode(b))?;
    let body_b64 = serde_json::to_vec(body).map(|b| BASE64_URL_SAFE_NO_PAD.encode(b))?;
    let payload = [header_b64.as_bytes(), b".", body_b64.as_bytes()].concat();
    let signature = signer.sign(&payload).await;
    let signature_b64 = BASE64_URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{header_b64}.{body_b64}.{signature_b64}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::jws::CompactJws;
    use serde_json::json;

    #[tokio::test]
    async fn signs_verifiable_tokens() {
        let signer = P256Signer::new(SigningKey::random(&mut rand::thread_rng())).unwrap();
        let jwk = signer.jwk().clone();
        let service = LocalSigningService::new().with_signer("alias-1", Arc::new(signer));

        let Json::Object(header) = json!({ "kid": "did:web:alice#key-1", "typ": "JWT" }) else {
            unreachable!()
        };
        let Json::Object(claims) = json!({ "iss": "did:web:alice" }) else {
            unreachable!()
        };

        let token = service.sign("alias-1", &claims, &header).await.unwrap();
        let jws = CompactJws::decode(&token).unwrap();
        assert_eq!(jws.header().alg, "ES256");
        assert_eq!(jws.header().typ.as_deref(), Some("JWT"));
        assert_eq!(jws.verify(&jwk).unwrap().issuer(), Some("did:web:alice"));

        assert!(service.sign("alias-2", &claims, &header).await.is_err());
    }
}
