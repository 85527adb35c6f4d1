use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::catalog::{books, categories, NewBook};
use crate::db::models::{BookWithCategory, Category, CategoryWithBooks};
use crate::error::AppResult;
use crate::extractors::{JsonBody, PathParam, QueryParams};
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookIndex {
    pub books: Vec<BookWithCategory>,
    pub categories: Vec<Category>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetail {
    pub book: BookWithCategory,
    pub related_books: Vec<BookWithCategory>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/books", get(index).post(create))
        .route("/books/search", get(search))
        .route("/books/{id}", get(show))
        .route("/categories/{id}/books", get(by_category))
}

async fn index(State(state): State<AppState>) -> AppResult<Json<BookIndex>> {
    let conn = state.db.get()?;
    Ok(Json(BookIndex {
        books: books::list_with_categories(&conn)?,
        categories: categories::list(&conn)?,
    }))
}

async fn show(State(state): State<AppState>, PathParam(id): PathParam<i64>) -> AppResult<Json<BookDetail>> {
    let conn = state.db.get()?;
    let book = books::get_with_category(&conn, id)?;
    let related_books = books::related(&conn, &book.book)?;
    Ok(Json(BookDetail {
        book,
        related_books,
    }))
}

async fn create(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<NewBook>,
) -> AppResult<(StatusCode, Json<BookWithCategory>)> {
    let conn = state.db.get()?;
    let book = books::create(&conn, &payload)?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn search(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> AppResult<Json<Vec<BookWithCategory>>> {
    if query.q.trim().is_empty() {
        return Ok(Json(Vec::new()));
    }
    let limit = state.config.search_limit(query.limit);
    let conn = state.db.get()?;
    Ok(Json(books::search(&conn, &query.q, limit)?))
}

async fn by_category(
    State(state): State<AppState>,
    PathParam(category_id): PathParam<i64>,
) -> AppResult<Json<CategoryWithBooks>> {
    let conn = state.db.get()?;
    Ok(Json(categories::get_with_books(&conn, category_id)?))
}
