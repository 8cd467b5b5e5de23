use serde_json::Value;
use tracing::{debug, info};

use super::client::{ApiRequest, ApiResponse};
use crate::error::AppResult;
use crate::session::SessionManager;

/// Sends requests with the stored access token and recovers from one 401.
///
/// On a 401 the stored refresh token is exchanged through
/// [`SessionManager::refresh_if_current`] and the request is replayed once with the new
/// access token. If a login or refresh replaced the tokens while the request was in
/// flight, the replay uses them without another refresh. A failed refresh has
/// already torn the session down; the caller then receives the original 401. The
/// replay itself is never retried.
#[derive(Clone)]
pub struct AuthorizedClient {
    session: SessionManager,
}

impl AuthorizedClient {
    pub fn new(session: SessionManager) -> Self { Self { session } }

    pub fn session(&self) -> &SessionManager { &self.session }

    pub async fn execute(&self, req: ApiRequest) -> AppResult<ApiResponse> {
        let api = self.session.api();
        let sent = self.session.stored_tokens();
        let first = req.clone().with_authorization(sent.as_ref().map(|t| t.bearer()));
        let resp = api.send(&first).await?;
        if !resp.is_unauthorized() {
            return Ok(resp);
        }
        let Some(sent) = sent else {
            debug!("authorized {} {} -> 401 with no stored session", req.method, req.path);
            return Ok(resp);
        };
        info!("authorized {} {} -> 401, refreshing access token", req.method, req.path);
        if !self.session.refresh_if_current(&sent.access).await {
            return Ok(resp);
        }
        let Some(fresh) = self.session.stored_tokens() else {
            return Ok(resp);
        };
        let replay = req.with_authorization(Some(fresh.bearer()));
        api.send(&replay).await
    }

    /// JSON body on 2xx, otherwise an error carrying the final status.
    pub async fn request(&self, req: ApiRequest, fallback: &str) -> AppResult<Value> {
        self.execute(req).await?.into_result(fallback)
    }
}
