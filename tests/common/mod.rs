//! In-process mock of the gym REST backend, bound to an ephemeral localhost port.
//! Records every call so tests can assert on the exact request sequence.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use gymsession::api::ApiClient;
use gymsession::session::{Clock, NoticeLevel, Notifier, SessionManager};
use gymsession::storage::SharedStore;

pub fn jwt_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"token_type":"access","exp":{},"user_id":1,"jti":"{}"}}"#, exp, exp));
    format!("{}.{}.sig", header, payload)
}

pub fn now() -> i64 { chrono::Utc::now().timestamp() }

/// Client for a localhost port nothing listens on.
pub async fn unreachable_api() -> ApiClient {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    ApiClient::new(reqwest::Url::parse(&format!("http://127.0.0.1:{}/api", port)).unwrap()).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: String,
    pub path: String,
    pub body: Value,
    pub auth: Option<String>,
}

pub struct MockState {
    pub calls: Vec<Call>,
    pub user: Value,
    pub password: String,
    pub valid_access: HashSet<String>,
    pub valid_refresh: HashSet<String>,
    /// Status returned by `/token/refresh/` for a known refresh token.
    pub refresh_status: u16,
    pub logout_status: u16,
    pub login_failure: (u16, Value),
    /// Refresh token handed out by the next successful login; it replaces all others.
    pub login_refresh: String,
    /// Server-side latency of `/auth/login/`.
    pub login_delay_ms: u64,
    pub register_failure: Option<(u16, Value)>,
    pub courses: Value,
    /// Forces `/courses/` to answer with this status regardless of the token.
    pub courses_status: Option<u16>,
    issued: i64,
}

impl MockState {
    fn new() -> Self {
        Self {
            calls: Vec::new(),
            user: json!({"id": 1, "username": "alice", "email": "alice@example.com", "role": "member"}),
            password: "pw123".into(),
            valid_access: HashSet::new(),
            valid_refresh: ["r1".to_string()].into_iter().collect(),
            refresh_status: 200,
            logout_status: 200,
            login_failure: (400, json!({"detail": "Invalid credentials"})),
            login_refresh: "r1".into(),
            login_delay_ms: 0,
            register_failure: None,
            courses: json!([{"id": 1, "name": "Yoga"}, {"id": 2, "name": "Spin"}]),
            courses_status: None,
            issued: 0,
        }
    }

    /// Issue a fresh access token valid for an hour and accept it.
    pub fn issue_access(&mut self) -> String {
        self.issued += 1;
        let tok = jwt_with_exp(now() + 3600 + self.issued);
        self.valid_access.insert(tok.clone());
        tok
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| self.valid_access.contains(t))
            .unwrap_or(false)
    }
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockBackend {
    pub state: Shared,
    pub base: String,
    handle: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) { self.handle.abort(); }
}

impl MockBackend {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState::new()));
        let app = Router::new()
            .route("/api/auth/login/", post(login))
            .route("/api/auth/register/", post(register))
            .route("/api/auth/logout/", post(logout))
            .route("/api/token/refresh/", post(refresh))
            .route("/api/users/me/", get(me))
            .route("/api/users/{id}/", patch(update_user))
            .route("/api/courses/", get(courses))
            .route("/api/orders/{id}/cancel/", post(cancel_order))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
        let port = listener.local_addr().expect("local addr").port();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("mock backend error: {e:?}");
            }
        });
        Self { state, base: format!("http://127.0.0.1:{}/api", port), handle }
    }

    pub fn api(&self) -> ApiClient { ApiClient::new(reqwest::Url::parse(&self.base).unwrap()).unwrap() }

    pub fn session(&self, store: SharedStore) -> SessionManager {
        SessionManager::builder(self.api()).store(store).build()
    }

    pub fn session_with(&self, store: SharedStore, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> SessionManager {
        SessionManager::builder(self.api()).store(store).clock(clock).notifier(notifier).build()
    }

    pub fn calls(&self) -> Vec<Call> { self.state.lock().calls.clone() }

    pub fn paths(&self) -> Vec<String> { self.calls().into_iter().map(|c| format!("{} {}", c.method, c.path)).collect() }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.calls().iter().filter(|c| c.method == method && c.path == path).count()
    }

    pub fn clear_calls(&self) { self.state.lock().calls.clear(); }
}

fn record(state: &Shared, method: &Method, uri: &Uri, headers: &HeaderMap, body: &Value) {
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let path = uri.path().trim_start_matches("/api").to_string();
    gymsession::tprintln!("mock {} {} auth={}", method, path, auth.is_some());
    state.lock().calls.push(Call { method: method.to_string(), path, body: body.clone(), auth });
}

fn reply(status: u16, body: Value) -> axum::response::Response {
    (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(body)).into_response()
}

fn body_or_null(body: Bytes) -> Value { serde_json::from_slice(&body).unwrap_or(Value::Null) }

async fn login(State(state): State<Shared>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> axum::response::Response {
    let body = body_or_null(body);
    record(&state, &method, &uri, &headers, &body);
    let delay = state.lock().login_delay_ms;
    if delay > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
    }
    let mut s = state.lock();
    let ok = body.get("username") == s.user.get("username") && body.get("password").and_then(Value::as_str) == Some(s.password.as_str());
    if !ok {
        let (status, b) = s.login_failure.clone();
        return reply(status, b);
    }
    let access = s.issue_access();
    let refresh = s.login_refresh.clone();
    s.valid_refresh = [refresh.clone()].into_iter().collect();
    reply(200, json!({"user": s.user.clone(), "access": access, "refresh": refresh}))
}

async fn register(State(state): State<Shared>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> axum::response::Response {
    let body = body_or_null(body);
    record(&state, &method, &uri, &headers, &body);
    let mut s = state.lock();
    if let Some((status, b)) = s.register_failure.clone() {
        return reply(status, b);
    }
    let access = s.issue_access();
    let user = json!({"id": 2, "username": body.get("username").cloned().unwrap_or(Value::Null), "role": "user"});
    reply(201, json!({"user": user, "access": access, "refresh": "r-new"}))
}

async fn logout(State(state): State<Shared>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> axum::response::Response {
    let body = body_or_null(body);
    record(&state, &method, &uri, &headers, &body);
    let status = state.lock().logout_status;
    reply(status, json!({"message": "Successfully logged out"}))
}

async fn refresh(State(state): State<Shared>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> axum::response::Response {
    let body = body_or_null(body);
    record(&state, &method, &uri, &headers, &body);
    let mut s = state.lock();
    let known = body.get("refresh").and_then(Value::as_str).map(|r| s.valid_refresh.contains(r)).unwrap_or(false);
    if !known || s.refresh_status != 200 {
        let status = if known { s.refresh_status } else { 401 };
        return reply(status, json!({"detail": "Token is invalid or expired", "code": "token_not_valid"}));
    }
    let access = s.issue_access();
    reply(200, json!({"access": access}))
}

async fn me(State(state): State<Shared>, method: Method, uri: Uri, headers: HeaderMap) -> axum::response::Response {
    record(&state, &method, &uri, &headers, &Value::Null);
    let s = state.lock();
    if !s.authorized(&headers) {
        return reply(401, json!({"detail": "Given token not valid for any token type"}));
    }
    reply(200, s.user.clone())
}

async fn update_user(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let body = body_or_null(body);
    record(&state, &method, &uri, &headers, &body);
    let mut s = state.lock();
    if !s.authorized(&headers) {
        return reply(401, json!({"detail": "Authentication credentials were not provided."}));
    }
    if s.user.get("id").and_then(Value::as_i64) != Some(id) {
        return reply(403, json!({"detail": "You do not have permission to perform this action."}));
    }
    if let (Some(user), Value::Object(patch)) = (s.user.as_object_mut(), body) {
        for (k, v) in patch {
            user.insert(k, v);
        }
    }
    reply(200, s.user.clone())
}

async fn courses(State(state): State<Shared>, method: Method, uri: Uri, headers: HeaderMap) -> axum::response::Response {
    record(&state, &method, &uri, &headers, &Value::Null);
    let s = state.lock();
    if let Some(status) = s.courses_status {
        return reply(status, json!({"detail": "Given token not valid for any token type"}));
    }
    if !s.authorized(&headers) {
        return reply(401, json!({"detail": "Given token not valid for any token type"}));
    }
    reply(200, s.courses.clone())
}

async fn cancel_order(State(state): State<Shared>, Path(id): Path<i64>, method: Method, uri: Uri, headers: HeaderMap) -> axum::response::Response {
    record(&state, &method, &uri, &headers, &Value::Null);
    let s = state.lock();
    if !s.authorized(&headers) {
        return reply(401, json!({"detail": "Given token not valid for any token type"}));
    }
    reply(200, json!({"id": id, "status": "cancelled"}))
}

/// Notifier that keeps every notice for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> { self.notices.lock().iter().map(|(_, m)| m.clone()).collect() }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) { self.notices.lock().push((level, message.to_string())); }
}
