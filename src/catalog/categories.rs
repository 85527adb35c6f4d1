use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use validator::Validate;

use crate::catalog::required;
use crate::db::models::{nullable, Book, Category, CategoryWithBooks, CategoryWithCount};
use crate::error::{is_unique_violation, AppError, AppResult};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CategoryUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    /// Absent leaves the description alone; `null` clears it.
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 1000))]
    pub description: Option<Option<String>>,
}

fn duplicate_name(name: &str) -> AppError {
    AppError::Conflict(format!("A category named \"{name}\" already exists"))
}

pub fn list(conn: &Connection) -> AppResult<Vec<Category>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM categories c ORDER BY c.id",
        Category::COLUMNS
    ))?;
    let categories = stmt
        .query_map([], Category::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

/// Every category with the number of books filed under it.
pub fn list_with_counts(conn: &Connection) -> AppResult<Vec<CategoryWithCount>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, COUNT(b.id) AS books_count FROM categories c \
         LEFT JOIN books b ON b.category_id = c.id \
         GROUP BY c.id ORDER BY c.id",
        Category::COLUMNS
    ))?;
    let categories = stmt
        .query_map([], |row| {
            Ok(CategoryWithCount {
                category: Category::from_row(row)?,
                books_count: row.get("books_count")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub fn find(conn: &Connection, id: i64) -> AppResult<Option<Category>> {
    let category = conn
        .query_row(
            &format!("SELECT {} FROM categories c WHERE c.id = ?1", Category::COLUMNS),
            params![id],
            Category::from_row,
        )
        .optional()?;
    Ok(category)
}

pub fn find_by_name(conn: &Connection, name: &str) -> AppResult<Option<Category>> {
    let category = conn
        .query_row(
            &format!("SELECT {} FROM categories c WHERE c.name = ?1", Category::COLUMNS),
            params![name],
            Category::from_row,
        )
        .optional()?;
    Ok(category)
}

/// A category with all of its books, in insertion order.
pub fn get_with_books(conn: &Connection, id: i64) -> AppResult<CategoryWithBooks> {
    let category = find(conn, id)?.ok_or(AppError::NotFound)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM books b WHERE b.category_id = ?1 ORDER BY b.id",
        Book::COLUMNS
    ))?;
    let books = stmt
        .query_map(params![id], Book::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CategoryWithBooks { category, books })
}

pub fn create(conn: &Connection, new: &NewCategory) -> AppResult<Category> {
    new.validate()?;
    let name = required("name", &new.name)?;

    let inserted = conn.execute(
        "INSERT INTO categories (name, description) VALUES (?1, ?2)",
        params![name, new.description],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => return Err(duplicate_name(name)),
        Err(e) => return Err(e.into()),
    }

    find(conn, conn.last_insert_rowid())?.ok_or(AppError::NotFound)
}

pub fn update(conn: &Connection, id: i64, changes: &CategoryUpdate) -> AppResult<Category> {
    changes.validate()?;
    let current = find(conn, id)?.ok_or(AppError::NotFound)?;

    let name = match changes.name.as_deref() {
        Some(name) => required("name", name)?.to_string(),
        None => current.name,
    };
    let description = match &changes.description {
        Some(description) => description.clone(),
        None => current.description,
    };

    let updated = conn.execute(
        "UPDATE categories SET name = ?1, description = ?2, updated_at = datetime('now') \
         WHERE id = ?3",
        params![name, description, id],
    );
    match updated {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => return Err(duplicate_name(&name)),
        Err(e) => return Err(e.into()),
    }

    find(conn, id)?.ok_or(AppError::NotFound)
}

/// Delete a category. Its books stay in the catalog, uncategorized.
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let rows = conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Fetch the category with this exact name, creating it if absent.
/// The insert is a single statement that yields to a concurrent creator,
/// so two racing callers both end up with the same row.
pub fn upsert_by_name(conn: &Connection, name: &str) -> AppResult<Category> {
    let name = required("category name", name)?;

    let created = conn.execute(
        "INSERT INTO categories (name, description) VALUES (?1, '') \
         ON CONFLICT(name) DO NOTHING",
        params![name],
    )?;
    if created > 0 {
        tracing::info!("Created category {:?}", name);
    }

    find_by_name(conn, name)?.ok_or(AppError::NotFound)
}
