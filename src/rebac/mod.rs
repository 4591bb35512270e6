mod openfga;

pub mod config;
pub mod factory;

pub use openfga::OpenFgaClient;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::identity::{self, USER_PREFIX};

/// Asks a relationship-based authorization backend whether a subject holds a
/// relation on an object.
///
/// A reachable backend answers with a boolean. Every failure to obtain that
/// answer is returned as an error and must never be turned into a boolean by
/// the client; deciding what an outage means is the caller's job.
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    async fn check(&self, query: &AuthorizationQuery) -> Result<bool, BackendError>;
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be consulted: connection refused, timeout, 5xx or
    /// throttling.
    #[error("authorization backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but refused the query.
    #[error("authorization backend rejected the query with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The backend answered success with a body that is not a check result.
    #[error("authorization backend returned a malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid subject '{0}': {1}")]
    Subject(String, &'static str),

    #[error("invalid relation '{0}': {1}")]
    Relation(String, &'static str),

    #[error("invalid object '{0}': {1}")]
    Object(String, &'static str),
}

const MAX_RELATION_LEN: usize = 64;
const MAX_TYPE_LEN: usize = 64;

/// "Does `subject` have `relation` on `object`", with every element already
/// checked against the tuple grammar. Fields are private so a query cannot
/// change after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationQuery {
    subject: String,
    relation: String,
    object: String,
}

impl AuthorizationQuery {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let subject = subject.into();
        let relation = relation.into();
        let object = object.into();

        match subject.strip_prefix(USER_PREFIX) {
            Some(id) => {
                if let Err(reason) = identity::validate_id(id) {
                    return Err(QueryError::Subject(subject, reason));
                }
            }
            None => return Err(QueryError::Subject(subject, "subject must start with 'user:'")),
        }
        if let Err(reason) = validate_relation(&relation) {
            return Err(QueryError::Relation(relation, reason));
        }
        if let Err(reason) = validate_object(&object) {
            return Err(QueryError::Object(object, reason));
        }

        Ok(Self {
            subject,
            relation,
            object,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn object(&self) -> &str {
        &self.object
    }
}

/// Relation names follow `[a-z][a-z0-9_]*`, at most 64 bytes.
pub fn validate_relation(relation: &str) -> Result<(), &'static str> {
    if relation.is_empty() {
        return Err("empty relation");
    }
    if relation.len() > MAX_RELATION_LEN {
        return Err("relation too long");
    }
    if !relation.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err("relation must start with a lowercase letter");
    }
    if !relation
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err("relation may only contain lowercase letters, digits and '_'");
    }
    Ok(())
}

/// Objects are `<type>:<id>`, type following `[a-z][a-z0-9_-]*`.
pub fn validate_object(object: &str) -> Result<(), &'static str> {
    let (kind, id) = match object.split_once(':') {
        Some(parts) => parts,
        None => return Err("object must be '<type>:<id>'"),
    };
    if kind.is_empty() {
        return Err("empty object type");
    }
    if kind.len() > MAX_TYPE_LEN {
        return Err("object type too long");
    }
    if !kind.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err("object type must start with a lowercase letter");
    }
    if !kind
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err("object type may only contain lowercase letters, digits, '_' and '-'");
    }
    identity::validate_id(id)
}
