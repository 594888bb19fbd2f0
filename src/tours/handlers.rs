use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::CurrentUser,
        guards::{evaluate, Guard},
        repo_types::Role,
    },
    error::{AppError, AppResult},
    extract::ValidJson,
    query::QueryDescriptor,
    response::{DataResponse, ListResponse},
    state::AppState,
    tours::{
        dto::{TourDraft, TourList, TourOne},
        services::{self, TOUR_SCOPE},
    },
};

const STAFF: &[Role] = &[Role::Admin, Role::LeadGuide];
const WRITE_GUARDS: &[Guard] = &[Guard::Active, Guard::RoleIn(STAFF)];

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/tours", get(list_tours))
        .route("/tours/top-5-cheap", get(top_five_cheap))
        .route("/tours/:id", get(get_tour))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/tours", post(create_tour))
        .route("/tours/:id", patch(update_tour).delete(delete_tour))
}

fn not_found() -> AppError {
    AppError::NotFound("No tour found with that ID".into())
}

async fn run_list(state: &AppState, descriptor: QueryDescriptor) -> AppResult<Json<ListResponse<TourList>>> {
    let (tours, total) = state.tours.list(&descriptor).await?;
    descriptor.ensure_page_exists(total)?;
    let tours = tours
        .iter()
        .map(|t| serde_json::to_value(t).map(|v| descriptor.project(v)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(anyhow::Error::from)?;
    Ok(Json(ListResponse::success(tours.len(), total, TourList { tours })))
}

#[instrument(skip(state))]
pub async fn list_tours(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<ListResponse<TourList>>> {
    run_list(&state, TOUR_SCOPE.build(&params)?).await
}

#[instrument(skip(state))]
pub async fn top_five_cheap(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<ListResponse<TourList>>> {
    run_list(&state, TOUR_SCOPE.build(&services::top_five_cheap(params))?).await
}

#[instrument(skip(state))]
pub async fn get_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<TourOne>>> {
    let tour = state
        .tours
        .find_by_id(id)
        .await?
        .filter(|t| !t.secret_tour)
        .ok_or_else(not_found)?;
    Ok(Json(DataResponse::success(TourOne { tour })))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_tour(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(payload): ValidJson<TourDraft>,
) -> AppResult<(StatusCode, Json<DataResponse<TourOne>>)> {
    evaluate(WRITE_GUARDS, &user)?;
    let tour = state
        .tours
        .insert(services::validate(payload)?, state.clock.now())
        .await?;
    info!(tour_id = %tour.id, slug = %tour.slug, "tour created");
    Ok((StatusCode::CREATED, Json(DataResponse::success(TourOne { tour }))))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_tour(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<TourDraft>,
) -> AppResult<Json<DataResponse<TourOne>>> {
    evaluate(WRITE_GUARDS, &user)?;
    let existing = state.tours.find_by_id(id).await?.ok_or_else(not_found)?;
    let changes = services::validate(services::merge(&existing, payload)?)?;
    let tour = state.tours.update(id, changes).await?.ok_or_else(not_found)?;
    info!(tour_id = %tour.id, "tour updated");
    Ok(Json(DataResponse::success(TourOne { tour })))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_tour(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    evaluate(WRITE_GUARDS, &user)?;
    if !state.tours.delete(id).await? {
        return Err(not_found());
    }
    info!(tour_id = %id, "tour deleted");
    Ok(StatusCode::NO_CONTENT)
}
