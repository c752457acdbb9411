use anyhow::{bail, Context, Error, Result};
use p256::ecdsa::signature::Verifier as _;
use ssi::JWK;

/// Checks a JWS signature over the signing input.
pub trait Verifier: Sized {
    /// Construct a [Verifier] from a public [JWK].
    ///
    /// ## Params
    /// * `jwk` - the public key resolved for the token's `kid`.
    /// * `algorithm` - the value taken from the `alg` header of the token, to select the curve.
    fn from_jwk(jwk: &JWK, algorithm: &str) -> Result<Self>;
    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct P256Verifier(p256::ecdsa::VerifyingKey);

impl Verifier for P256Verifier {
    fn from_jwk(jwk: &JWK, algorithm: &str) -> Result<Self> {
        if algorithm != "ES256" {
            bail!("P256Verifier cannot verify tokens signed with '{algorithm}'")
        }
        let jwk = serde_json::to_string(jwk).context("public key could not be serialized")?;
        let public_key = p256::PublicKey::from_jwk_str(&jwk)
            .map_err(|_| Error::msg("public key is not a P-256 key"))?;
        Ok(Self(public_key.into()))
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()> {
        let signature = p256::ecdsa::Signature::from_slice(signature)?;
        self.0.verify(payload, &signature).map_err(Error::from)
    }
}
