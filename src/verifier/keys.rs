use std::{collections::HashMap, fmt::Debug};

use anyhow::{bail, Result};
use async_trait::async_trait;
use ssi::JWK;

/// Resolves the public key referenced by a token's `kid`.
///
/// The token verifier holds two independent resolvers: one for keys of the
/// participant key space and one for keys of the token-issuing authority.
#[async_trait]
pub trait PublicKeyResolver: Debug {
    /// Resolve `key_id`, optionally restricted to the key space of `scope`
    /// (a participant context id).
    async fn resolve(&self, key_id: &str, scope: Option<&str>) -> Result<JWK>;
}

/// A local in-memory key resolver. Not for production use!
///
/// Keys registered without a scope are visible to every lookup; scoped keys
/// are only returned for lookups with the same scope.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyResolver {
    keys: HashMap<(Option<String>, String), JWK>,
}

impl StaticKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key_id: impl Into<String>, jwk: JWK) -> Self {
        self.keys.insert((None, key_id.into()), jwk);
        self
    }

    pub fn with_scoped_key(
        mut self,
        scope: impl Into<String>,
        key_id: impl Into<String>,
        jwk: JWK,
    ) -> Self {
        self.keys.insert((Some(scope.into()), key_id.into()), jwk);
        self
    }
}

#[async_trait]
impl PublicKeyResolver for StaticKeyResolver {
    async fn resolve(&self, key_id: &str, scope: Option<&str>) -> Result<JWK> {
        let scoped = scope.and_then(|scope| {
            self.keys
                .get(&(Some(scope.to_owned()), key_id.to_owned()))
        });

        if let Some(jwk) = scoped.or_else(|| self.keys.get(&(None, key_id.to_owned()))) {
            return Ok(jwk.clone());
        }

        bail!("no public key found for key id '{key_id}'")
    }
}
