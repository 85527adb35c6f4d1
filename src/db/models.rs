use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::reading::ReadingStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub const COLUMNS: &'static str =
        "id, full_name, email, password_hash, created_at, updated_at";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            full_name: row.get("full_name")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Category {
    pub const COLUMNS: &'static str = "c.id, c.name, c.description, c.created_at, c.updated_at";

    /// Columns for a category joined onto a book row, aliased to stay
    /// distinct from the book's own columns.
    pub const JOINED_COLUMNS: &'static str = "c.id AS category_ref_id, c.name AS category_name, \
         c.description AS category_description, c.created_at AS category_created_at, \
         c.updated_at AS category_updated_at";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn from_joined_row(row: &Row) -> rusqlite::Result<Option<Self>> {
        let Some(id) = row.get::<_, Option<i64>>("category_ref_id")? else {
            return Ok(None);
        };
        Ok(Some(Self {
            id,
            name: row.get("category_name")?,
            description: row.get("category_description")?,
            created_at: row.get("category_created_at")?,
            updated_at: row.get("category_updated_at")?,
        }))
    }
}

/// Catalog-level status of a book, unrelated to any user's reading status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Planned,
    Reading,
    Completed,
    Dropped,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Planned => "planned",
            BookStatus::Reading => "reading",
            BookStatus::Completed => "completed",
            BookStatus::Dropped => "dropped",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(BookStatus::Planned),
            "reading" => Ok(BookStatus::Reading),
            "completed" => Ok(BookStatus::Completed),
            "dropped" => Ok(BookStatus::Dropped),
            other => Err(format!("unknown book status: {other}")),
        }
    }
}

impl ToSql for BookStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for BookStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub cover: Option<String>,
    pub description: Option<String>,
    pub keyideas: Vec<String>,
    pub status: BookStatus,
    pub progress: i64,
    pub rating: f64,
    pub category_id: Option<i64>,
    pub language: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub page_count: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Book {
    pub const COLUMNS: &'static str = "b.id, b.title, b.author, b.cover, b.description, \
         b.keyideas, b.status, b.progress, b.rating, b.category_id, b.language, \
         b.published_date, b.page_count, b.created_at, b.updated_at";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            author: row.get("author")?,
            cover: row.get("cover")?,
            description: row.get("description")?,
            keyideas: parse_key_ideas(row.get::<_, Option<String>>("keyideas")?.as_deref()),
            status: row.get("status")?,
            progress: row.get("progress")?,
            rating: row.get("rating")?,
            category_id: row.get("category_id")?,
            language: row.get("language")?,
            published_date: row.get("published_date")?,
            page_count: row.get("page_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Split a stored pipe-delimited key-ideas string into its entries.
pub fn parse_key_ideas(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split('|')
        .map(str::trim)
        .filter(|idea| !idea.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join key ideas back into their stored form; `None` when there are none.
pub fn join_key_ideas(ideas: &[String]) -> Option<String> {
    let kept: Vec<&str> = ideas
        .iter()
        .map(|idea| idea.trim())
        .filter(|idea| !idea.is_empty())
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join("|"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookWithCategory {
    #[serde(flatten)]
    pub book: Book,
    pub category: Option<Category>,
}

impl BookWithCategory {
    /// `SELECT` prefix joining each book to its category.
    pub fn select_sql() -> String {
        format!(
            "SELECT {}, {} FROM books b LEFT JOIN categories c ON c.id = b.category_id",
            Book::COLUMNS,
            Category::JOINED_COLUMNS
        )
    }

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            book: Book::from_row(row)?,
            category: Category::from_joined_row(row)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithBooks {
    #[serde(flatten)]
    pub category: Category,
    pub books: Vec<Book>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub books_count: i64,
}

/// A user's personal tracking entry for one book.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingList {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub status: ReadingStatus,
    pub progress: i64,
    pub current_page: i64,
    pub notes: Option<String>,
    pub user_rating: Option<i64>,
    pub started_at: Option<NaiveDate>,
    pub completed_at: Option<NaiveDate>,
    pub created_at: String,
    pub updated_at: String,
}

impl ReadingList {
    pub const COLUMNS: &'static str = "r.id AS entry_id, r.user_id, r.book_id, \
         r.status AS entry_status, r.progress AS entry_progress, r.current_page, r.notes, \
         r.user_rating, r.started_at, r.completed_at, r.created_at AS entry_created_at, \
         r.updated_at AS entry_updated_at";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("entry_id")?,
            user_id: row.get("user_id")?,
            book_id: row.get("book_id")?,
            status: row.get("entry_status")?,
            progress: row.get("entry_progress")?,
            current_page: row.get("current_page")?,
            notes: row.get("notes")?,
            user_rating: row.get("user_rating")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            created_at: row.get("entry_created_at")?,
            updated_at: row.get("entry_updated_at")?,
        })
    }
}

/// A reading-list entry with its book and the book's category loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingListDetail {
    #[serde(flatten)]
    pub entry: ReadingList,
    pub book: BookWithCategory,
}

impl ReadingListDetail {
    pub fn select_sql() -> String {
        format!(
            "SELECT {}, {}, {} FROM reading_lists r \
             JOIN books b ON b.id = r.book_id \
             LEFT JOIN categories c ON c.id = b.category_id",
            ReadingList::COLUMNS,
            Book::COLUMNS,
            Category::JOINED_COLUMNS
        )
    }

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            entry: ReadingList::from_row(row)?,
            book: BookWithCategory::from_row(row)?,
        })
    }
}

/// Deserialize a field that distinguishes "absent" from an explicit `null`.
/// Pair with `#[serde(default)]`: absent gives `None`, `null` gives
/// `Some(None)`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
