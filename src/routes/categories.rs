use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::catalog::{categories, CategoryUpdate, NewCategory};
use crate::db::models::{Category, CategoryWithBooks, CategoryWithCount};
use crate::error::AppResult;
use crate::extractors::{JsonBody, PathParam};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(index).post(create))
        .route("/categories/{id}", get(show).put(update).delete(destroy))
}

async fn index(State(state): State<AppState>) -> AppResult<Json<Vec<CategoryWithCount>>> {
    let conn = state.db.get()?;
    Ok(Json(categories::list_with_counts(&conn)?))
}

async fn show(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> AppResult<Json<CategoryWithBooks>> {
    let conn = state.db.get()?;
    Ok(Json(categories::get_with_books(&conn, id)?))
}

async fn create(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NewCategory>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let conn = state.db.get()?;
    let category = categories::create(&conn, &payload)?;
    tracing::info!("Created category {} ({:?})", category.id, category.name);
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    JsonBody(payload): JsonBody<CategoryUpdate>,
) -> AppResult<Json<Category>> {
    let conn = state.db.get()?;
    Ok(Json(categories::update(&conn, id, &payload)?))
}

async fn destroy(State(state): State<AppState>, PathParam(id): PathParam<i64>) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    categories::delete(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}
