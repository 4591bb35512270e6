use serde::Serialize;
use thiserror::Error;

use crate::idp::Claims;

/// Prefix every principal identifier carries in the backend tuple schema.
pub const USER_PREFIX: &str = "user:";

const MAX_ID_LEN: usize = 256;

/// The raw identifier cannot be expressed in the backend tuple grammar.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid identifier '{identifier}': {reason}")]
pub struct InvalidIdentifierError {
    pub identifier: String,
    pub reason: &'static str,
}

/// Converts a raw claim identifier into the canonical `user:<id>` form.
///
/// Identifiers that already carry the `user:` prefix are returned unchanged, so
/// applying this more than once is harmless. The id part must be 1 to 256 bytes
/// and must not contain whitespace, control characters, `:` or `#`.
pub fn normalize(raw_identifier: &str) -> Result<String, InvalidIdentifierError> {
    let id = raw_identifier
        .strip_prefix(USER_PREFIX)
        .unwrap_or(raw_identifier);

    if let Err(reason) = validate_id(id) {
        return Err(InvalidIdentifierError {
            identifier: raw_identifier.to_string(),
            reason,
        });
    }

    Ok(format!("{USER_PREFIX}{id}"))
}

/// Checks the id part of a tuple element (the text after `<type>:`).
pub fn validate_id(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("empty identifier");
    }
    if id.len() > MAX_ID_LEN {
        return Err("identifier too long");
    }
    for c in id.chars() {
        if c.is_whitespace() {
            return Err("whitespace is not allowed");
        }
        if c.is_control() {
            return Err("control characters are not allowed");
        }
        if c == ':' {
            return Err("':' is reserved as the type separator");
        }
        if c == '#' {
            return Err("'#' is reserved as the relation separator");
        }
    }
    Ok(())
}

/// The authenticated actor of a single request.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub raw_identifier: String,
    pub canonical_id: String,
    pub claims: Claims,
}

impl Principal {
    pub fn from_claims(claims: Claims) -> Result<Self, InvalidIdentifierError> {
        let canonical_id = normalize(&claims.username)?;
        Ok(Self {
            raw_identifier: claims.username.clone(),
            canonical_id,
            claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("alice").unwrap(), "user:alice");
        assert_eq!(normalize("user:alice").unwrap(), "user:alice");
        assert_eq!(
            normalize("3f2a9c4e-1b7d-4c1a-9f0e-5d2b8a7c6e41").unwrap(),
            "user:3f2a9c4e-1b7d-4c1a-9f0e-5d2b8a7c6e41"
        );
        assert_eq!(normalize("bob@example.com").unwrap(), "user:bob@example.com");
    }

    #[test]
    fn test_normalize_invalid() {
        let cases = [
            "",
            "user:",
            "user:user:alice",
            "alice smith",
            "alice\n",
            "team:dev",
            "doc#viewer",
            "\u{7}bell",
        ];
        for case in cases {
            let err = normalize(case).unwrap_err();
            assert_eq!(err.identifier, case);
        }

        let long = "a".repeat(MAX_ID_LEN + 1);
        assert!(normalize(&long).is_err());
        let max = "a".repeat(MAX_ID_LEN);
        assert!(normalize(&max).is_ok());
    }

    #[test]
    fn test_principal_from_claims() {
        let claims = Claims {
            username: String::from("alice"),
            subject: String::from("4b1c"),
            expires_at: 0,
            extra: Default::default(),
        };
        let principal = Principal::from_claims(claims).unwrap();
        assert_eq!(principal.raw_identifier, "alice");
        assert_eq!(principal.canonical_id, "user:alice");

        let claims = Claims {
            username: String::from("alice smith"),
            subject: String::from("4b1c"),
            expires_at: 0,
            extra: Default::default(),
        };
        assert!(Principal::from_claims(claims).is_err());
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in "(user:)?[a-zA-Z0-9._@+|-]{1,64}") {
            let once = normalize(&raw).unwrap();
            let twice = normalize(&once).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn canonical_id_has_single_prefix(raw in "(user:)?[^\\s:#\\p{Cc}]{1,64}") {
            let canonical = normalize(&raw).unwrap();
            prop_assert!(canonical.starts_with(USER_PREFIX));
            let rest = &canonical[USER_PREFIX.len()..];
            prop_assert!(!rest.is_empty());
            prop_assert!(!rest.starts_with(USER_PREFIX));
            prop_assert!(!rest.contains(':'));
        }

        #[test]
        fn normalize_never_panics(raw in "\\PC*") {
            let _ = normalize(&raw);
        }
    }
}
