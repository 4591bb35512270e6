use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::{Deserialize, Serialize};

/// The only message a denied caller ever sees.
pub const ACCESS_DENIED: &str = "Access denied";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CommonResponse {
    pub code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceResponse<T> {
    pub code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// A wrapper struct for HTTP responses that provides convenient methods
/// for creating common response types
pub struct Response {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: serde_json::Value,
}

impl Response {
    pub fn not_found() -> Self {
        Self::err_response(StatusCode::NOT_FOUND, "Resource not found".to_string())
    }

    /// Uniform denial. Never carries the reason.
    pub fn access_denied() -> Self {
        Self::err_response(StatusCode::FORBIDDEN, ACCESS_DENIED.to_string())
    }

    pub fn ok() -> Self {
        let resp = CommonResponse {
            code: StatusCode::OK.into(),
            message: None,
        };
        Self::new(StatusCode::OK, &resp)
    }

    pub fn json<T: Serialize>(data: T) -> Self {
        let resp = ResourceResponse::<T> {
            code: StatusCode::OK.into(),
            message: None,
            data: Some(data),
        };
        Self::new(StatusCode::OK, &resp)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    fn err_response(status: StatusCode, message: String) -> Self {
        let resp = CommonResponse {
            code: status.into(),
            message: Some(message),
        };
        Self::new(status, &resp)
    }

    fn new<T: Serialize>(status: StatusCode, resp: &T) -> Self {
        match serde_json::to_value(resp) {
            Ok(body) => Self {
                status,
                headers: Vec::new(),
                body,
            },
            Err(e) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                headers: Vec::new(),
                body: serde_json::json!({
                    "code": 500,
                    "message": format!("Server error: encode response: {e}"),
                }),
            },
        }
    }
}

impl From<Response> for HttpResponse {
    fn from(val: Response) -> Self {
        let mut builder = HttpResponseBuilder::new(val.status);
        for header in val.headers {
            builder.insert_header(header);
        }
        builder.json(val.body)
    }
}

#[cfg(test)]
mod tests {
    use actix_web::body::to_bytes;

    use super::*;

    async fn body_of(resp: Response) -> (StatusCode, serde_json::Value) {
        let resp: HttpResponse = resp.into();
        let status = resp.status();
        let body = to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[actix_web::test]
    async fn test_access_denied() {
        let (status, body) = body_of(Response::access_denied()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, serde_json::json!({"code": 403, "message": "Access denied"}));
    }

    #[actix_web::test]
    async fn test_json() {
        let (status, body) = body_of(Response::json(vec!["a", "b"])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"code": 200, "data": ["a", "b"]}));

        let (_, body) = body_of(Response::ok()).await;
        assert_eq!(body, serde_json::json!({"code": 200}));
    }
}
