use actix_web::http::header::{HeaderMap, AUTHORIZATION};

use crate::decision::Credential;

/// Reads the bearer credential from request headers.
///
/// This only looks at its argument, so every request is extracted the same
/// way and there is nothing to override separately from the middleware.
pub fn extract_credential(headers: &HeaderMap) -> Credential {
    let mut values = headers.get_all(AUTHORIZATION);
    let value = match values.next() {
        Some(value) => value,
        None => return Credential::Missing,
    };
    if values.next().is_some() {
        return Credential::Malformed;
    }

    let auth = match value.to_str() {
        Ok(auth) => auth.trim(),
        Err(_) => return Credential::Malformed,
    };
    if auth.is_empty() {
        return Credential::Missing;
    }

    let mut iter = auth.split_whitespace();
    let scheme = match iter.next() {
        Some(scheme) => scheme,
        None => return Credential::Malformed,
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Credential::Malformed;
    }

    let token = match iter.next() {
        Some(token) => token,
        None => return Credential::Malformed,
    };
    if iter.next().is_some() {
        return Credential::Malformed;
    }

    Credential::Bearer(token.to_string())
}
