use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use validator::Validate;

use crate::catalog::{categories, required};
use crate::db::models::{join_key_ideas, Book, BookStatus, BookWithCategory};
use crate::error::{AppError, AppResult};

/// Upper bound on the related-books list of a book detail view.
pub const RELATED_LIMIT: u32 = 4;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub author: String,
    #[validate(length(max = 2048))]
    pub cover: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(default)]
    pub keyideas: Vec<String>,
    #[serde(default)]
    pub status: BookStatus,
    #[serde(default)]
    #[validate(range(min = 0, max = 100))]
    pub progress: i64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: f64,
    pub category_id: Option<i64>,
    #[validate(length(max = 50))]
    pub language: Option<String>,
    pub published_date: Option<NaiveDate>,
    #[validate(range(min = 1))]
    pub page_count: Option<i64>,
}

pub fn list_with_categories(conn: &Connection) -> AppResult<Vec<BookWithCategory>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY b.id", BookWithCategory::select_sql()))?;
    let books = stmt
        .query_map([], BookWithCategory::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(books)
}

pub fn find(conn: &Connection, id: i64) -> AppResult<Option<Book>> {
    let book = conn
        .query_row(
            &format!("SELECT {} FROM books b WHERE b.id = ?1", Book::COLUMNS),
            params![id],
            Book::from_row,
        )
        .optional()?;
    Ok(book)
}

pub fn get_with_category(conn: &Connection, id: i64) -> AppResult<BookWithCategory> {
    conn.query_row(
        &format!("{} WHERE b.id = ?1", BookWithCategory::select_sql()),
        params![id],
        BookWithCategory::from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

/// Other books filed under the same category. Uncategorized books have
/// no related books.
pub fn related(conn: &Connection, book: &Book) -> AppResult<Vec<BookWithCategory>> {
    let Some(category_id) = book.category_id else {
        return Ok(Vec::new());
    };

    let mut stmt = conn.prepare(&format!(
        "{} WHERE b.category_id = ?1 AND b.id != ?2 ORDER BY b.id LIMIT ?3",
        BookWithCategory::select_sql()
    ))?;
    let books = stmt
        .query_map(
            params![category_id, book.id, RELATED_LIMIT],
            BookWithCategory::from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(books)
}

/// Escape `LIKE` wildcards so the query matches as a literal substring.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Books whose title or author contains `query`, ignoring ASCII case.
/// A blank query matches nothing and never reaches the database.
pub fn search(conn: &Connection, query: &str, limit: u32) -> AppResult<Vec<BookWithCategory>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(&format!(
        "{} WHERE (b.title LIKE ?1 ESCAPE '\\' OR b.author LIKE ?1 ESCAPE '\\') \
         ORDER BY b.id LIMIT ?2",
        BookWithCategory::select_sql()
    ))?;
    let books = stmt
        .query_map(params![like_pattern(query), limit], BookWithCategory::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(books)
}

pub fn create(conn: &Connection, new: &NewBook) -> AppResult<BookWithCategory> {
    new.validate()?;
    let title = required("title", &new.title)?;
    required("author", &new.author)?;

    if let Some(category_id) = new.category_id {
        if categories::find(conn, category_id)?.is_none() {
            return Err(AppError::Validation(format!(
                "category {category_id} does not exist"
            )));
        }
    }

    let id = insert(conn, new)?;
    tracing::info!("Created book {} ({:?})", id, title);
    get_with_category(conn, id)
}

/// Insert a book row as given, without validation. Returns the new id.
pub(crate) fn insert(conn: &Connection, new: &NewBook) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO books (title, author, cover, description, keyideas, status, progress, \
         rating, category_id, language, published_date, page_count) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            new.title.trim(),
            new.author.trim(),
            new.cover,
            new.description,
            join_key_ideas(&new.keyideas),
            new.status,
            new.progress,
            new.rating,
            new.category_id,
            new.language,
            new.published_date,
            new.page_count,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}
