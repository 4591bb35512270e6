use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{AuthorizationClient, AuthorizationQuery, BackendError};

/// Client for the check API of an OpenFGA compatible server.
pub struct OpenFgaClient {
    client: reqwest::Client,
    check_url: String,
    authorization_model_id: Option<String>,
    api_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    tuple_key: TupleKey<'a>,

    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct TupleKey<'a> {
    user: &'a str,
    relation: &'a str,
    object: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allowed: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl OpenFgaClient {
    const MAX_ERROR_MESSAGE_LEN: usize = 256;

    pub fn new(
        url: &str,
        store_id: &str,
        authorization_model_id: Option<String>,
        api_token: Option<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .context("build authorization backend http client")?;
        let check_url = format!("{}/stores/{store_id}/check", url.trim_end_matches('/'));
        Ok(Self {
            client,
            check_url,
            authorization_model_id,
            api_token,
        })
    }

    fn error_message(body: &str) -> String {
        let message = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(resp) if !resp.message.is_empty() => {
                if resp.code.is_empty() {
                    resp.message
                } else {
                    format!("{}: {}", resp.code, resp.message)
                }
            }
            _ => body.trim().to_string(),
        };
        message.chars().take(Self::MAX_ERROR_MESSAGE_LEN).collect()
    }
}

#[async_trait]
impl AuthorizationClient for OpenFgaClient {
    async fn check(&self, query: &AuthorizationQuery) -> Result<bool, BackendError> {
        let body = CheckRequest {
            tuple_key: TupleKey {
                user: query.subject(),
                relation: query.relation(),
                object: query.object(),
            },
            authorization_model_id: self.authorization_model_id.as_deref(),
        };

        let mut req = self.client.post(&self.check_url).json(&body);
        if let Some(ref token) = self.api_token {
            req = req.bearer_auth(token);
        }

        debug!(
            "Check {} {} {} against {}",
            query.subject(),
            query.relation(),
            query.object(),
            self.check_url
        );
        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => return Err(BackendError::Unavailable(format!("send check request: {e}"))),
        };

        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => return Err(BackendError::Unavailable(format!("read check response: {e}"))),
        };

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::Unavailable(format!(
                "status {status}: {}",
                Self::error_message(&text)
            )));
        }
        if !status.is_success() {
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message: Self::error_message(&text),
            });
        }

        match serde_json::from_str::<CheckResponse>(&text) {
            Ok(resp) => Ok(resp.allowed),
            Err(e) => Err(BackendError::Malformed(format!("parse check response: {e}"))),
        }
    }
}
