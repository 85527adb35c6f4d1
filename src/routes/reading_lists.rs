use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::db::models::ReadingListDetail;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, JsonBody, PathParam};
use crate::reading::repository;
use crate::reading::{EntryUpdate, NewEntry, NewlyAdded, ReadingStats};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reading-lists", get(index).post(create))
        .route("/reading-lists/stats", get(stats))
        .route(
            "/reading-lists/{id}",
            get(show).put(update).delete(destroy),
        )
}

async fn index(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<ReadingListDetail>>> {
    let conn = state.db.get()?;
    Ok(Json(repository::list_for_user(&conn, user.id)?))
}

async fn show(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParam(id): PathParam<i64>,
) -> AppResult<Json<ReadingListDetail>> {
    let conn = state.db.get()?;
    Ok(Json(repository::get_for_user(&conn, user.id, id)?))
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    JsonBody(payload): JsonBody<NewEntry>,
) -> AppResult<(StatusCode, Json<NewlyAdded>)> {
    let mut conn = state.db.get()?;
    let added = repository::create_entry(
        &mut conn,
        user.id,
        &payload,
        &state.config.catalog,
        Utc::now().date_naive(),
    )?;
    Ok((StatusCode::CREATED, Json(added)))
}

async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParam(id): PathParam<i64>,
    JsonBody(payload): JsonBody<EntryUpdate>,
) -> AppResult<Json<ReadingListDetail>> {
    let mut conn = state.db.get()?;
    let entry =
        repository::update_entry(&mut conn, user.id, id, &payload, Utc::now().date_naive())?;
    Ok(Json(entry))
}

async fn destroy(
    State(state): State<AppState>,
    user: CurrentUser,
    PathParam(id): PathParam<i64>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    repository::delete_entry(&conn, user.id, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stats(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<ReadingStats>> {
    let conn = state.db.get()?;
    Ok(Json(repository::stats_for_user(
        &conn,
        user.id,
        Utc::now().date_naive(),
    )?))
}
