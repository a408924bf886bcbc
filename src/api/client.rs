// src/api/client.rs
//
// Single chokepoint for calls to the NyamiX REST backend.
// Every request is time-bounded, carries the session token when there is one,
// and fails with one normalized `ApiError`.

use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::AppConfig;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Request timeout - please try again")]
    Timeout { millis: u64 },

    #[error("{0}")]
    Network(String),

    /// Non-success status; `message` is already normalized for display.
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// The text shown to the user.
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout { .. })
    }
}

/// How the token is written into the `Authorization` header.
/// The NyamiX backend expects the raw token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    #[default]
    Raw,
    Token,
    Bearer,
}

impl AuthScheme {
    pub fn header_value(self, token: &str) -> String {
        match self {
            AuthScheme::Raw => token.to_string(),
            AuthScheme::Token => format!("Token {token}"),
            AuthScheme::Bearer => format!("Bearer {token}"),
        }
    }
}

impl FromStr for AuthScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "" => Ok(AuthScheme::Raw),
            "token" => Ok(AuthScheme::Token),
            "bearer" => Ok(AuthScheme::Bearer),
            other => Err(format!("unknown auth scheme {other:?}")),
        }
    }
}

/// A response body decoded according to its content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Json(Value),
    Text(String),
    Empty,
}

impl Parsed {
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let value = match self {
            Parsed::Json(value) => value,
            Parsed::Empty => Value::Null,
            Parsed::Text(text) => {
                return Err(ApiError::Decode(format!("expected JSON body, got text: {text}")));
            }
        };
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    timeout: Duration,
    auth_scheme: AuthScheme,
    session: Session,
}

impl ApiClient {
    pub fn new(config: &AppConfig, session: Session) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Network(format!("http client init: {e}")))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            timeout: config.timeout,
            auth_scheme: config.auth_scheme,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Appends the `version` query parameter the auth endpoints require.
    pub fn versioned(&self, endpoint: &str) -> String {
        format!("{endpoint}?version={}", self.api_version)
    }

    pub async fn get(&self, endpoint: &str) -> Result<Parsed, ApiError> {
        self.send::<()>(Method::GET, endpoint, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Parsed, ApiError> {
        self.send(Method::POST, endpoint, body).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Parsed, ApiError> {
        self.send(Method::PUT, endpoint, body).await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Parsed, ApiError> {
        self.send(Method::PATCH, endpoint, body).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Parsed, ApiError> {
        self.send::<()>(Method::DELETE, endpoint, None).await
    }

    pub async fn patch_multipart(
        &self,
        endpoint: &str,
        form: reqwest::multipart::Form,
    ) -> Result<Parsed, ApiError> {
        let req = self.http.request(Method::PATCH, self.url(endpoint)).multipart(form);
        self.execute(Method::PATCH, endpoint, req).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.get(endpoint).await?.into_typed()
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.post(endpoint, Some(body)).await?.into_typed()
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Parsed, ApiError> {
        let mut req = self.http.request(method.clone(), self.url(endpoint));
        if let Some(body) = body {
            req = req.json(body);
        }
        self.execute(method, endpoint, req).await
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        req: RequestBuilder,
    ) -> Result<Parsed, ApiError> {
        let req = match self.session.current_token() {
            Some(token) => req.header(AUTHORIZATION, self.auth_scheme.header_value(&token)),
            None => req,
        };

        let call = async {
            let resp = req.send().await?;
            let status = resp.status();
            let content_type = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_ascii_lowercase();
            let body = resp.text().await?;
            Ok::<_, reqwest::Error>((status, content_type, body))
        };

        let millis = self.timeout.as_millis() as u64;
        let (status, content_type, body) = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                log::warn!(
                    "api timeout method={} endpoint={} after_ms={}",
                    method,
                    endpoint,
                    millis
                );
                return Err(ApiError::Timeout { millis });
            }
            Ok(Err(e)) if e.is_timeout() => {
                log::warn!("api timeout method={} endpoint={} err={}", method, endpoint, e);
                return Err(ApiError::Timeout { millis });
            }
            Ok(Err(e)) => {
                log::error!(
                    "api transport error method={} endpoint={} err={}",
                    method,
                    endpoint,
                    e
                );
                return Err(ApiError::Network(e.to_string()));
            }
            Ok(Ok(parts)) => parts,
        };

        if !status.is_success() {
            let message = error_message(status, &body);
            log::error!(
                "api error method={} endpoint={} status={} message={}",
                method,
                endpoint,
                status.as_u16(),
                message
            );
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        log::debug!("api ok method={} endpoint={} status={}", method, endpoint, status.as_u16());
        decode_body(&content_type, body)
    }
}

/// Turns an error response into display text: `message`, then `detail`,
/// then field errors joined by newlines; raw text or `HTTP <status>` when the
/// body is not JSON.
pub fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "detail"] {
            if let Some(msg) = value.get(key).and_then(Value::as_str) {
                return msg.to_string();
            }
        }
        let fields = field_errors(&value);
        if !fields.is_empty() {
            return fields.join("\n");
        }
        if let Value::String(msg) = value {
            return msg;
        }
        return "An error occurred".to_string();
    }

    let text = body.trim();
    if text.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        text.to_string()
    }
}

// {"phone": ["Invalid number."], "non_field_errors": ["Sold out"]}
fn field_errors(value: &Value) -> Vec<String> {
    let Value::Object(map) = value else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for v in map.values() {
        match v {
            Value::String(s) => out.push(s.clone()),
            Value::Array(items) => {
                out.extend(items.iter().filter_map(Value::as_str).map(str::to_string))
            }
            _ => {}
        }
    }
    out
}

fn decode_body(content_type: &str, body: String) -> Result<Parsed, ApiError> {
    if body.trim().is_empty() {
        return Ok(Parsed::Empty);
    }

    if content_type.contains("json") {
        return serde_json::from_str(&body)
            .map(Parsed::Json)
            .map_err(|e| ApiError::Decode(format!("{e}; body={body}")));
    }

    if content_type.starts_with("text/") {
        return Ok(Parsed::Text(body));
    }

    // No content type at all: sniff.
    if content_type.is_empty() {
        return Ok(match serde_json::from_str(&body) {
            Ok(value) => Parsed::Json(value),
            Err(_) => Parsed::Text(body),
        });
    }

    Ok(Parsed::Empty)
}
