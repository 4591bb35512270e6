mod cache;
mod jwks;
mod pem;
mod union;

pub mod config;
pub mod factory;

pub use cache::CachedIdentityProvider;
pub use jwks::JwksIdentityProvider;
pub use pem::PemIdentityProvider;
pub use union::UnionIdentityProvider;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, Validation};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Verifies bearer credentials against an identity provider.
///
/// Implementations are long-lived and shared by every request, so they must be
/// safe to call concurrently.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validates the token and returns its verified claims.
    ///
    /// # Returns
    ///
    /// * `Ok(claims)` - The token is genuine and currently valid
    /// * `Err(IdentityError::CredentialInvalid)` - Malformed, expired or forged token
    /// * `Err(IdentityError::Unavailable)` - The provider could not be consulted
    async fn authenticate(&self, bearer_token: &str) -> Result<Claims, IdentityError>;
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("credential invalid: {0}")]
    CredentialInvalid(String),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Verified token claims.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Claims {
    /// The identifier used for authorization, usually `preferred_username`.
    pub username: String,
    /// The `sub` claim, empty when the provider does not set one.
    pub subject: String,
    /// Token expiry as a unix timestamp in seconds.
    pub expires_at: u64,
    /// Every other claim, untouched.
    pub extra: Map<String, Value>,
}

/// Settings shared by every JWT based provider.
#[derive(Debug, Clone)]
pub struct TokenRules {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub username_claim: String,
    pub leeway_secs: u64,
}

impl TokenRules {
    const ALLOWED_ALGORITHMS: [Algorithm; 6] = [
        Algorithm::RS256,
        Algorithm::RS384,
        Algorithm::RS512,
        Algorithm::PS256,
        Algorithm::PS384,
        Algorithm::PS512,
    ];

    fn validation(&self, alg: Algorithm) -> Result<Validation, IdentityError> {
        if !Self::ALLOWED_ALGORITHMS.contains(&alg) {
            return Err(IdentityError::CredentialInvalid(format!(
                "signing algorithm {alg:?} is not accepted"
            )));
        }

        let mut validation = Validation::new(alg);
        validation.leeway = self.leeway_secs;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp"]);
        match self.issuer {
            Some(ref issuer) => validation.set_issuer(&[issuer]),
            None => validation.iss = None,
        }
        match self.audience {
            Some(ref audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        Ok(validation)
    }

    fn into_claims(&self, mut raw: Map<String, Value>) -> Result<Claims, IdentityError> {
        let expires_at = match raw
            .get("exp")
            .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
        {
            Some(exp) => exp,
            None => {
                return Err(IdentityError::CredentialInvalid(String::from(
                    "missing exp claim",
                )))
            }
        };

        let subject = match raw.remove("sub") {
            Some(Value::String(sub)) => sub,
            _ => String::new(),
        };

        let username = match raw.get(&self.username_claim) {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            _ if !subject.is_empty() => subject.clone(),
            _ => {
                return Err(IdentityError::CredentialInvalid(format!(
                    "token has neither '{}' nor 'sub' claim",
                    self.username_claim
                )))
            }
        };

        Ok(Claims {
            username,
            subject,
            expires_at,
            extra: raw,
        })
    }
}
