use anyhow::{bail, Result};
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, DecodingKey};
use serde_json::{Map, Value};

use super::{Claims, IdentityError, IdentityProvider, TokenRules};

/// Identity provider backed by a single, locally configured RSA public key.
///
/// Verification never leaves the process, so this provider cannot become
/// unavailable.
pub struct PemIdentityProvider {
    key: DecodingKey,
    rules: TokenRules,
}

impl PemIdentityProvider {
    /// Creates a provider that verifies tokens with an RSA public key.
    ///
    /// # Arguments
    /// * `public_key` - RSA public key in PEM format
    /// * `rules` - Issuer, audience and username claim settings
    pub fn new(public_key: &[u8], rules: TokenRules) -> Result<Self> {
        let key = match DecodingKey::from_rsa_pem(public_key) {
            Ok(key) => key,
            Err(e) => bail!("parse RSA public key for jwt token validation failed: {e}"),
        };
        Ok(Self { key, rules })
    }
}

#[async_trait]
impl IdentityProvider for PemIdentityProvider {
    async fn authenticate(&self, bearer_token: &str) -> Result<Claims, IdentityError> {
        let header = decode_header(bearer_token)
            .map_err(|e| IdentityError::CredentialInvalid(format!("decode jwt header: {e}")))?;
        let validation = self.rules.validation(header.alg)?;

        let raw = match decode::<Map<String, Value>>(bearer_token, &self.key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                return Err(IdentityError::CredentialInvalid(format!(
                    "validate jwt token failed: {e}"
                )))
            }
        };

        self.rules.into_claims(raw)
    }
}
