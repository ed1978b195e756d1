//! `GET /assets/{*path}`: serves stored images back by download URL.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use super::error::ApiError;
use super::AppState;
use crate::error::StoreError;

pub async fn get_asset(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    match state.assets.get(&path).await {
        Ok(Some(bytes)) => {
            ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()
        }
        Ok(None) => ApiError::from(StoreError::not_found(path)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
