//! HTTP access to the gym REST backend.
//!
//! - `client`: raw transport with the process-wide default `Authorization` header.
//! - `authorized`: decorator that refreshes once on 401 and replays the request.
//! - `resources`: typed endpoint wrappers for users, courses, memberships and orders.

mod authorized;
mod client;
mod resources;

pub use authorized::AuthorizedClient;
pub use client::{ApiClient, ApiRequest, ApiResponse};
pub use resources::GymApi;
