pub mod forecast;
pub mod health;

use crate::AppState;
use axum::Router;
use serde::Serialize;

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub meta: ApiMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMeta {
    /// Unix milliseconds of the refresh cycle the data comes from.
    pub updated_at: i64,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T, updated_at: i64) -> Self {
        Self {
            data,
            meta: ApiMeta { updated_at },
        }
    }
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api", forecast::router())
}
