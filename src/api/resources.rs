use reqwest::Method;
use serde_json::{json, Value};

use super::authorized::AuthorizedClient;
use super::client::ApiRequest;
use crate::error::AppResult;

const REQUEST_FAILED: &str = "Request failed.";

/// Gym backend endpoints, all sent through the refreshing [`AuthorizedClient`].
#[derive(Clone)]
pub struct GymApi {
    client: AuthorizedClient,
}

impl GymApi {
    pub fn new(client: AuthorizedClient) -> Self { Self { client } }

    pub fn client(&self) -> &AuthorizedClient { &self.client }

    async fn get(&self, path: String, params: &[(&str, &str)]) -> AppResult<Value> {
        self.client.request(ApiRequest::get(path).with_query(params), REQUEST_FAILED).await
    }

    async fn post(&self, path: String, body: Value) -> AppResult<Value> {
        self.client.request(ApiRequest::post(path, body), REQUEST_FAILED).await
    }

    async fn patch(&self, path: String, body: Value) -> AppResult<Value> {
        self.client.request(ApiRequest::patch(path, body), REQUEST_FAILED).await
    }

    // users

    pub async fn current_user(&self) -> AppResult<Value> { self.get("/users/me/".into(), &[]).await }

    pub async fn update_user(&self, user_id: i64, data: Value) -> AppResult<Value> {
        self.patch(format!("/users/{}/", user_id), data).await
    }

    pub async fn update_profile(&self, user_id: i64, data: Value) -> AppResult<Value> {
        self.patch(format!("/users/profile/{}/", user_id), data).await
    }

    pub async fn change_password(&self, data: Value) -> AppResult<Value> {
        self.post("/users/change-password/".into(), data).await
    }

    // courses

    pub async fn courses(&self, params: &[(&str, &str)]) -> AppResult<Value> { self.get("/courses/".into(), params).await }

    pub async fn course(&self, id: i64) -> AppResult<Value> { self.get(format!("/courses/{}/", id), &[]).await }

    pub async fn course_categories(&self) -> AppResult<Value> { self.get("/courses/categories/".into(), &[]).await }

    pub async fn course_schedules(&self, params: &[(&str, &str)]) -> AppResult<Value> {
        self.get("/courses/schedules/".into(), params).await
    }

    pub async fn enroll(&self, data: Value) -> AppResult<Value> { self.post("/courses/enrollments/".into(), data).await }

    pub async fn enrollments(&self) -> AppResult<Value> { self.get("/courses/enrollments/".into(), &[]).await }

    pub async fn cancel_enrollment(&self, id: i64) -> AppResult<Value> {
        self.patch(format!("/courses/enrollments/{}/", id), json!({"status": "cancelled"})).await
    }

    // memberships

    pub async fn membership_plans(&self) -> AppResult<Value> { self.get("/orders/membership-plans/".into(), &[]).await }

    pub async fn membership_plan(&self, id: i64) -> AppResult<Value> {
        self.get(format!("/orders/membership-plans/{}/", id), &[]).await
    }

    // orders

    pub async fn create_order(&self, data: Value) -> AppResult<Value> { self.post("/orders/".into(), data).await }

    pub async fn orders(&self, params: &[(&str, &str)]) -> AppResult<Value> { self.get("/orders/".into(), params).await }

    pub async fn order(&self, id: i64) -> AppResult<Value> { self.get(format!("/orders/{}/", id), &[]).await }

    pub async fn update_order(&self, id: i64, data: Value) -> AppResult<Value> {
        self.patch(format!("/orders/{}/", id), data).await
    }

    pub async fn cancel_order(&self, id: i64) -> AppResult<Value> {
        let req = ApiRequest::new(Method::POST, format!("/orders/{}/cancel/", id));
        self.client.request(req, REQUEST_FAILED).await
    }
}
