use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{extractors::CurrentUser, guards::restrict_to, repo_types::Role},
    error::AppResult,
    extract::ValidJson,
    response::{DataResponse, ListResponse},
    state::AppState,
    users::{
        dto::{AdminUpdateUserRequest, UpdateMeRequest, UserList, UserOne},
        services::{self, USER_SCOPE},
    },
};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me))
        .route("/users/updateMe", patch(update_me))
        .route("/users/deleteMe", delete(delete_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).patch(update_user).delete(delete_user))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<DataResponse<UserOne>> {
    Json(DataResponse::success(UserOne { user }))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<UpdateMeRequest>,
) -> AppResult<Json<DataResponse<UserOne>>> {
    let user = services::update_me(state.users.as_ref(), &user, payload).await?;
    info!(user_id = %user.id, "profile updated");
    Ok(Json(DataResponse::success(UserOne { user })))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_me(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> AppResult<StatusCode> {
    services::deactivate(state.users.as_ref(), &user).await?;
    info!(user_id = %user.id, "account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user, params), fields(user_id = %user.id))]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<ListResponse<UserList>>> {
    restrict_to(&user, &[Role::Admin])?;
    let descriptor = USER_SCOPE.build(&params)?;
    let (users, total) = state.users.list(&descriptor).await?;
    descriptor.ensure_page_exists(total)?;

    let users = users
        .iter()
        .map(|u| serde_json::to_value(u).map(|v| descriptor.project(v)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(anyhow::Error::from)?;
    Ok(Json(ListResponse::success(users.len(), total, UserList { users })))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<UserOne>>> {
    restrict_to(&user, &[Role::Admin])?;
    let found = services::find_active(state.users.as_ref(), id).await?;
    Ok(Json(DataResponse::success(UserOne { user: found })))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<AdminUpdateUserRequest>,
) -> AppResult<Json<DataResponse<UserOne>>> {
    restrict_to(&user, &[Role::Admin])?;
    let updated = services::admin_update(state.users.as_ref(), id, payload).await?;
    info!(target_id = %id, role = %updated.role, "user updated by admin");
    Ok(Json(DataResponse::success(UserOne { user: updated })))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    restrict_to(&user, &[Role::Admin])?;
    services::delete_user(state.users.as_ref(), id).await?;
    info!(target_id = %id, "user deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}
