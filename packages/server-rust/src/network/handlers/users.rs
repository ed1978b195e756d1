//! Record routes under `/users`.

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use usersync_core::{User, UserPatch};

use super::error::ApiError;
use super::AppState;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParams {
    #[serde(default)]
    pub with_image: bool,
}

/// `GET /users`
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.adapter.list().await?))
}

/// `POST /users`: the store assigns an id when the body has none.
pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<User>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(user) = body?;
    let created = state.adapter.create(user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `DELETE /users`
pub async fn delete_all_users(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.adapter.delete_all().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /users/{id}`
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.adapter.get(&id).await?))
}

/// `PUT /users/{id}`: writes the whole record under `id`, replacing any
/// existing entry. An `id` in the body is ignored.
pub async fn put_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<User>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(user) = body?;
    Ok(Json(state.adapter.create(User { id, ..user }).await?))
}

/// `PATCH /users/{id}`
pub async fn patch_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UserPatch>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(patch) = body?;
    if patch.is_empty() {
        return Err(ApiError::BadRequest("patch sets no fields".to_string()));
    }
    Ok(Json(state.adapter.update(&id, &patch).await?))
}

/// `DELETE /users/{id}`, with `?withImage=true` to drop the image too.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> ApiResult<StatusCode> {
    let Query(params) = params?;
    if params.with_image {
        state.adapter.delete_with_image(&id).await?;
    } else {
        state.adapter.delete(&id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /users/{id}/image`: raw image bytes as the body.
pub async fn put_user_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    image: Bytes,
) -> ApiResult<Json<User>> {
    if image.is_empty() {
        return Err(ApiError::BadRequest("image body is empty".to_string()));
    }
    let user = state
        .adapter
        .update_with_image(&id, &UserPatch::default(), image)
        .await?;
    Ok(Json(user))
}
