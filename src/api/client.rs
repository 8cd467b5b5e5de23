use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{AppError, AppResult};

/// One request against the API, relative to the configured base path.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Per-request `Authorization` value; overrides the default header when set.
    pub authorization: Option<String>,
}

impl ApiRequest {
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None, authorization: None }
    }

    pub fn get<P: Into<String>>(path: P) -> Self { Self::new(Method::GET, path) }

    pub fn post<P: Into<String>>(path: P, body: Value) -> Self { Self::new(Method::POST, path).with_body(body) }

    pub fn patch<P: Into<String>>(path: P, body: Value) -> Self { Self::new(Method::PATCH, path).with_body(body) }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query<K: AsRef<str>, V: AsRef<str>>(mut self, params: &[(K, V)]) -> Self {
        self.query.extend(params.iter().map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string())));
        self
    }

    pub fn with_authorization(mut self, value: Option<String>) -> Self {
        self.authorization = value;
        self
    }
}

/// Status and decoded body. Empty bodies decode to `Null`, non-JSON bodies to a string.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }

    pub fn is_unauthorized(&self) -> bool { self.status == 401 }

    /// Body on 2xx, otherwise an `AppError::Http` with the server's message or `fallback`.
    pub fn into_result(self, fallback: &str) -> AppResult<Value> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(AppError::from_response(self.status, &self.body, fallback))
        }
    }
}

/// HTTP transport to the backend. Clones share the default bearer slot, mirroring a
/// single process-wide default request configuration.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
    bearer: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(base: Url) -> AppResult<Self> {
        // No timeout: the client library defaults apply.
        let http = reqwest::Client::builder().build()?;
        Ok(Self { base, http, bearer: Arc::new(RwLock::new(None)) })
    }

    pub fn from_config(cfg: &ClientConfig) -> AppResult<Self> { Self::new(cfg.api_url()?) }

    pub fn base(&self) -> &Url { &self.base }

    pub fn set_bearer(&self, access: &str) { *self.bearer.write() = Some(format!("Bearer {}", access)); }

    pub fn clear_bearer(&self) { *self.bearer.write() = None; }

    /// Current default `Authorization` value.
    pub fn bearer(&self) -> Option<String> { self.bearer.read().clone() }

    pub fn url_for(&self, path: &str, query: &[(String, String)]) -> AppResult<Url> {
        let mut s = String::from(self.base.as_str().trim_end_matches('/'));
        if !path.starts_with('/') { s.push('/'); }
        s.push_str(path);
        if !query.is_empty() {
            let qs = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            s.push(if s.contains('?') { '&' } else { '?' });
            s.push_str(&qs);
        }
        Url::parse(&s).map_err(|e| AppError::config("request_url".to_string(), format!("{}: {}", s, e)))
    }

    pub async fn send(&self, req: &ApiRequest) -> AppResult<ApiResponse> {
        let url = self.url_for(&req.path, &req.query)?;
        let mut builder = self.http.request(req.method.clone(), url);
        let auth = req.authorization.clone().or_else(|| self.bearer());
        if let Some(a) = auth {
            let v = HeaderValue::from_str(&a)
                .map_err(|_| AppError::decode("authorization_header", "access token is not a valid header value"))?;
            builder = builder.header(AUTHORIZATION, v);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }
        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        debug!("api {} {} -> {}", req.method, req.path, status);
        Ok(ApiResponse { status, body })
    }

    pub async fn get(&self, path: &str) -> AppResult<ApiResponse> { self.send(&ApiRequest::get(path)).await }

    pub async fn post(&self, path: &str, body: Value) -> AppResult<ApiResponse> { self.send(&ApiRequest::post(path, body)).await }

    pub async fn patch(&self, path: &str, body: Value) -> AppResult<ApiResponse> { self.send(&ApiRequest::patch(path, body)).await }
}
