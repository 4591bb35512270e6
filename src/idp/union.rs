use async_trait::async_trait;

use super::jwks::JwksIdentityProvider;
use super::pem::PemIdentityProvider;
use super::{Claims, IdentityError, IdentityProvider};

pub enum UnionIdentityProvider {
    Jwks(JwksIdentityProvider),
    Pem(PemIdentityProvider),
}

#[async_trait]
impl IdentityProvider for UnionIdentityProvider {
    async fn authenticate(&self, bearer_token: &str) -> Result<Claims, IdentityError> {
        match self {
            UnionIdentityProvider::Jwks(idp) => idp.authenticate(bearer_token).await,
            UnionIdentityProvider::Pem(idp) => idp.authenticate(bearer_token).await,
        }
    }
}
