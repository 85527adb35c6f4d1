use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;

use crate::db::models::ReadingListDetail;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::reading::{repository, ReadingStats, ReadingStatus, Shelves};
use crate::routes::home::Html;
use crate::state::AppState;

// --- View structs ---

pub struct ShelfItem {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub cover: String,
    pub category: String,
    pub progress: i64,
    pub current_page: i64,
    pub page_count: String,
    pub rating: String,
    pub started_at: String,
    pub completed_at: String,
}

impl From<ReadingListDetail> for ShelfItem {
    fn from(detail: ReadingListDetail) -> Self {
        let ReadingListDetail { entry, book } = detail;
        Self {
            id: entry.id,
            title: book.book.title,
            author: book.book.author,
            cover: book.book.cover.unwrap_or_default(),
            category: book.category.map(|c| c.name).unwrap_or_default(),
            progress: entry.progress,
            current_page: entry.current_page,
            page_count: book.book.page_count.map(|n| n.to_string()).unwrap_or_default(),
            rating: entry
                .user_rating
                .map(|stars| "★".repeat(stars.clamp(0, 5) as usize))
                .unwrap_or_default(),
            started_at: entry.started_at.map(|d| d.to_string()).unwrap_or_default(),
            completed_at: entry.completed_at.map(|d| d.to_string()).unwrap_or_default(),
        }
    }
}

pub struct Shelf {
    pub label: &'static str,
    pub status: &'static str,
    pub items: Vec<ShelfItem>,
}

fn shelf(status: ReadingStatus, entries: Vec<ReadingListDetail>) -> Shelf {
    Shelf {
        label: status.label(),
        status: status.as_str(),
        items: entries.into_iter().map(ShelfItem::from).collect(),
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/my_reading.html")]
pub struct MyReadingTemplate {
    pub full_name: String,
    pub stats: ReadingStats,
    pub shelves: Vec<Shelf>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/my-reading", get(my_reading))
}

async fn my_reading(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/auth/login").into_response());
    };

    let conn = state.db.get()?;
    let today = Utc::now().date_naive();
    let entries = repository::list_for_user(&conn, user.id)?;
    let stats = ReadingStats::from_entries(entries.iter().map(|detail| &detail.entry), today);
    let Shelves {
        want_to_read,
        currently_reading,
        completed,
    } = Shelves::from_entries(entries);

    let shelves = vec![
        shelf(ReadingStatus::CurrentlyReading, currently_reading),
        shelf(ReadingStatus::WantToRead, want_to_read),
        shelf(ReadingStatus::Completed, completed),
    ];

    Ok(Html(MyReadingTemplate {
        full_name: user.full_name,
        stats,
        shelves,
    })
    .into_response())
}
