// Reading-list persistence. Every function takes the acting user's id
// explicitly; entries belonging to other users are reported as not found.
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use validator::Validate;

use crate::catalog::books::{self, NewBook};
use crate::catalog::categories;
use crate::config::CatalogConfig;
use crate::db::models::{Book, BookStatus, ReadingListDetail};
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::reading::domain::*;

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn already_on_list() -> AppError {
    AppError::Conflict(ALREADY_ON_LIST.to_string())
}

/// Add a book to `user_id`'s reading list.
///
/// With a `book_id` the book must already exist. Without one, a book is
/// created from the inline fields, filed under the named category (created
/// on demand). Runs in one immediate transaction, so a rejected duplicate
/// leaves no stray book or category behind.
pub fn create_entry(
    conn: &mut Connection,
    user_id: i64,
    new: &NewEntry,
    defaults: &CatalogConfig,
    today: NaiveDate,
) -> AppResult<NewlyAdded> {
    new.validate()?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let book = match new.book_id {
        Some(book_id) => books::find(&tx, book_id)?.ok_or(AppError::NotFound)?,
        None => create_inline_book(&tx, new, defaults, today)?,
    };

    if find_entry_id(&tx, user_id, book.id)?.is_some() {
        return Err(already_on_list());
    }

    let dates = new.status.initial_dates(today);
    let inserted = tx.execute(
        "INSERT INTO reading_lists (user_id, book_id, status, progress, current_page, notes, \
         user_rating, started_at, completed_at) \
         VALUES (?1, ?2, ?3, 0, 0, ?4, ?5, ?6, ?7)",
        params![
            user_id,
            book.id,
            new.status,
            non_blank(new.notes.as_deref()),
            new.rating,
            dates.started_at,
            dates.completed_at,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => return Err(already_on_list()),
        Err(e) => return Err(e.into()),
    }

    let entry_id = tx.last_insert_rowid();
    let entry = get_for_user(&tx, user_id, entry_id)?;
    tx.commit()?;

    tracing::info!(
        "User {} added book {} to their reading list as {}",
        user_id,
        book.id,
        new.status
    );

    Ok(NewlyAdded {
        message: added_message(new.status, &book.title),
        entry,
    })
}

fn create_inline_book(
    conn: &Connection,
    new: &NewEntry,
    defaults: &CatalogConfig,
    today: NaiveDate,
) -> AppResult<Book> {
    let title = non_blank(new.title.as_deref())
        .ok_or_else(|| AppError::Validation("title is required without a bookId".into()))?;
    let author = non_blank(new.author.as_deref())
        .ok_or_else(|| AppError::Validation("author is required without a bookId".into()))?;

    let category_id = match non_blank(new.category.as_deref()) {
        Some(name) => Some(categories::upsert_by_name(conn, name)?.id),
        None => None,
    };

    let draft = NewBook {
        title: title.to_string(),
        author: author.to_string(),
        cover: Some(
            non_blank(new.cover.as_deref())
                .unwrap_or(&defaults.default_cover)
                .to_string(),
        ),
        description: Some(new.description.clone().unwrap_or_default()),
        keyideas: Vec::new(),
        status: BookStatus::Planned,
        progress: 0,
        rating: 0.0,
        category_id,
        language: Some(defaults.default_language.clone()),
        published_date: Some(today),
        page_count: Some(new.pages.unwrap_or(defaults.default_page_count)),
    };

    let id = books::insert(conn, &draft)?;
    tracing::info!("Created book {} ({:?}) from a reading-list submission", id, title);
    books::find(conn, id)?.ok_or(AppError::NotFound)
}

fn find_entry_id(conn: &Connection, user_id: i64, book_id: i64) -> AppResult<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM reading_lists WHERE user_id = ?1 AND book_id = ?2",
            params![user_id, book_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn list_for_user(conn: &Connection, user_id: i64) -> AppResult<Vec<ReadingListDetail>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE r.user_id = ?1 ORDER BY r.id",
        ReadingListDetail::select_sql()
    ))?;
    let entries = stmt
        .query_map(params![user_id], ReadingListDetail::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn get_for_user(conn: &Connection, user_id: i64, id: i64) -> AppResult<ReadingListDetail> {
    conn.query_row(
        &format!(
            "{} WHERE r.id = ?1 AND r.user_id = ?2",
            ReadingListDetail::select_sql()
        ),
        params![id, user_id],
        ReadingListDetail::from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

/// Apply a partial update. A status change recomputes the start and
/// completion dates through [`ReadingStatus::transition`].
pub fn update_entry(
    conn: &mut Connection,
    user_id: i64,
    id: i64,
    changes: &EntryUpdate,
    today: NaiveDate,
) -> AppResult<ReadingListDetail> {
    changes.validate()?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = get_for_user(&tx, user_id, id)?.entry;

    let status = changes.status.unwrap_or(current.status);
    let dates = current.status.transition(
        status,
        ReadingDates {
            started_at: current.started_at,
            completed_at: current.completed_at,
        },
        today,
    );

    let notes = match &changes.notes {
        Some(notes) => non_blank(notes.as_deref()).map(str::to_string),
        None => current.notes,
    };

    tx.execute(
        "UPDATE reading_lists SET status = ?1, progress = ?2, current_page = ?3, notes = ?4, \
         user_rating = ?5, started_at = ?6, completed_at = ?7, updated_at = datetime('now') \
         WHERE id = ?8 AND user_id = ?9",
        params![
            status,
            changes.progress.unwrap_or(current.progress),
            changes.current_page.unwrap_or(current.current_page),
            notes,
            changes.user_rating.unwrap_or(current.user_rating),
            dates.started_at,
            dates.completed_at,
            id,
            user_id,
        ],
    )?;

    if status != current.status {
        tracing::info!(
            "Reading-list entry {} moved from {} to {}",
            id,
            current.status,
            status
        );
    }

    let updated = get_for_user(&tx, user_id, id)?;
    tx.commit()?;
    Ok(updated)
}

pub fn delete_entry(conn: &Connection, user_id: i64, id: i64) -> AppResult<()> {
    let rows = conn.execute(
        "DELETE FROM reading_lists WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub fn stats_for_user(conn: &Connection, user_id: i64, today: NaiveDate) -> AppResult<ReadingStats> {
    let entries = list_for_user(conn, user_id)?;
    Ok(ReadingStats::from_entries(
        entries.iter().map(|detail| &detail.entry),
        today,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::state::DbPool;

    fn test_pool() -> DbPool {
        let pool = db::create_memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        pool
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn user(conn: &Connection, email: &str) -> i64 {
        conn.execute(
            "INSERT INTO users (full_name, email, password_hash) VALUES ('Reader', ?1, 'x')",
            params![email],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn book(conn: &Connection, title: &str) -> i64 {
        conn.execute(
            "INSERT INTO books (title, author) VALUES (?1, 'Author')",
            params![title],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn existing(book_id: i64, status: ReadingStatus) -> NewEntry {
        NewEntry {
            book_id: Some(book_id),
            status,
            ..Default::default()
        }
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn adding_existing_book_derives_dates_from_status() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let reader = user(&conn, "a@example.com");
        let wanted = book(&conn, "Wanted");
        let reading = book(&conn, "Reading");
        let done = book(&conn, "Done");
        let defaults = CatalogConfig::default();

        let added = create_entry(
            &mut conn,
            reader,
            &existing(wanted, ReadingStatus::WantToRead),
            &defaults,
            today(),
        )
        .unwrap();
        assert_eq!(added.entry.entry.started_at, None);
        assert_eq!(added.entry.entry.completed_at, None);
        assert_eq!(added.message, "\"Wanted\" has been added to your Want to Read list!");

        let added = create_entry(
            &mut conn,
            reader,
            &existing(reading, ReadingStatus::CurrentlyReading),
            &defaults,
            today(),
        )
        .unwrap();
        assert_eq!(added.entry.entry.started_at, Some(today()));
        assert_eq!(added.entry.entry.completed_at, None);

        let added = create_entry(
            &mut conn,
            reader,
            &existing(done, ReadingStatus::Completed),
            &defaults,
            today(),
        )
        .unwrap();
        assert_eq!(added.entry.entry.completed_at, Some(today()));
        assert_eq!(added.entry.entry.progress, 0);
        assert_eq!(added.entry.book.book.title, "Done");
    }

    #[test]
    fn unknown_book_id_is_not_found() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let reader = user(&conn, "a@example.com");
        let err = create_entry(
            &mut conn,
            reader,
            &existing(404, ReadingStatus::WantToRead),
            &CatalogConfig::default(),
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn second_add_of_same_book_is_a_conflict() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let reader = user(&conn, "a@example.com");
        let dune = book(&conn, "Dune");
        let defaults = CatalogConfig::default();

        create_entry(&mut conn, reader, &existing(dune, ReadingStatus::WantToRead), &defaults, today())
            .unwrap();
        let err = create_entry(
            &mut conn,
            reader,
            &existing(dune, ReadingStatus::Completed),
            &defaults,
            today(),
        )
        .unwrap_err();
        match err {
            AppError::Conflict(msg) => assert_eq!(msg, ALREADY_ON_LIST),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(count(&conn, "reading_lists"), 1);
    }

    #[test]
    fn different_users_may_track_the_same_book() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let first = user(&conn, "a@example.com");
        let second = user(&conn, "b@example.com");
        let dune = book(&conn, "Dune");
        let defaults = CatalogConfig::default();

        create_entry(&mut conn, first, &existing(dune, ReadingStatus::WantToRead), &defaults, today())
            .unwrap();
        create_entry(&mut conn, second, &existing(dune, ReadingStatus::WantToRead), &defaults, today())
            .unwrap();
        assert_eq!(count(&conn, "reading_lists"), 2);
    }

    #[test]
    fn inline_submission_creates_book_with_defaults() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let reader = user(&conn, "a@example.com");
        let defaults = CatalogConfig::default();

        let added = create_entry(
            &mut conn,
            reader,
            &NewEntry {
                title: Some("Deep Work".into()),
                author: Some("Cal Newport".into()),
                category: Some("Productivity".into()),
                status: ReadingStatus::CurrentlyReading,
                rating: Some(4),
                notes: Some("Chapter 2 is great".into()),
                ..Default::default()
            },
            &defaults,
            today(),
        )
        .unwrap();

        let book = &added.entry.book;
        assert_eq!(book.book.title, "Deep Work");
        assert_eq!(book.book.cover.as_deref(), Some(defaults.default_cover.as_str()));
        assert_eq!(book.book.language.as_deref(), Some("English"));
        assert_eq!(book.book.page_count, Some(100));
        assert_eq!(book.book.published_date, Some(today()));
        assert_eq!(book.book.status, BookStatus::Planned);
        assert_eq!(book.category.as_ref().map(|c| c.name.as_str()), Some("Productivity"));
        assert_eq!(added.entry.entry.user_rating, Some(4));
        assert_eq!(added.entry.entry.notes.as_deref(), Some("Chapter 2 is great"));
        assert_eq!(added.message, "Started reading \"Deep Work\"! Happy reading!");
    }

    #[test]
    fn inline_submission_reuses_category_by_name() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let reader = user(&conn, "a@example.com");
        let defaults = CatalogConfig::default();
        let existing_category = categories::upsert_by_name(&conn, "Fiction").unwrap();

        let added = create_entry(
            &mut conn,
            reader,
            &NewEntry {
                title: Some("Emma".into()),
                author: Some("Jane Austen".into()),
                category: Some("Fiction".into()),
                pages: Some(474),
                ..Default::default()
            },
            &defaults,
            today(),
        )
        .unwrap();

        assert_eq!(added.entry.book.book.category_id, Some(existing_category.id));
        assert_eq!(added.entry.book.book.page_count, Some(474));
        assert_eq!(count(&conn, "categories"), 1);
    }

    #[test]
    fn inline_submission_requires_title_and_author() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let reader = user(&conn, "a@example.com");
        let err = create_entry(
            &mut conn,
            reader,
            &NewEntry {
                author: Some("Anonymous".into()),
                category: Some("Mystery".into()),
                ..Default::default()
            },
            &CatalogConfig::default(),
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(count(&conn, "books"), 0);
    }

    #[test]
    fn rejected_duplicate_rolls_back_the_transaction() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let reader = user(&conn, "a@example.com");
        let dune = book(&conn, "Dune");
        let defaults = CatalogConfig::default();
        create_entry(&mut conn, reader, &existing(dune, ReadingStatus::WantToRead), &defaults, today())
            .unwrap();

        let _ = create_entry(
            &mut conn,
            reader,
            &existing(dune, ReadingStatus::WantToRead),
            &defaults,
            today(),
        );

        // The connection is usable again, so the failed transaction was closed.
        assert!(conn.is_autocommit());
        assert_eq!(count(&conn, "reading_lists"), 1);
    }

    #[test]
    fn entries_are_scoped_to_their_owner() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let owner = user(&conn, "a@example.com");
        let stranger = user(&conn, "b@example.com");
        let dune = book(&conn, "Dune");
        let added = create_entry(
            &mut conn,
            owner,
            &existing(dune, ReadingStatus::WantToRead),
            &CatalogConfig::default(),
            today(),
        )
        .unwrap();
        let id = added.entry.entry.id;

        assert!(matches!(get_for_user(&conn, stranger, id), Err(AppError::NotFound)));
        assert!(matches!(
            update_entry(&mut conn, stranger, id, &EntryUpdate::default(), today()),
            Err(AppError::NotFound)
        ));
        assert!(matches!(delete_entry(&conn, stranger, id), Err(AppError::NotFound)));
        assert!(list_for_user(&conn, stranger).unwrap().is_empty());
        assert_eq!(list_for_user(&conn, owner).unwrap().len(), 1);
    }

    #[test]
    fn update_recomputes_dates_on_status_change() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let reader = user(&conn, "a@example.com");
        let dune = book(&conn, "Dune");
        let added = create_entry(
            &mut conn,
            reader,
            &existing(dune, ReadingStatus::WantToRead),
            &CatalogConfig::default(),
            today(),
        )
        .unwrap();
        let id = added.entry.entry.id;
        let later = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

        let started = update_entry(
            &mut conn,
            reader,
            id,
            &EntryUpdate {
                status: Some(ReadingStatus::CurrentlyReading),
                current_page: Some(42),
                progress: Some(10),
                ..Default::default()
            },
            today(),
        )
        .unwrap();
        assert_eq!(started.entry.started_at, Some(today()));
        assert_eq!(started.entry.current_page, 42);
        assert_eq!(started.entry.progress, 10);

        let finished = update_entry(
            &mut conn,
            reader,
            id,
            &EntryUpdate {
                status: Some(ReadingStatus::Completed),
                user_rating: Some(Some(5)),
                ..Default::default()
            },
            later,
        )
        .unwrap();
        assert_eq!(finished.entry.started_at, Some(today()));
        assert_eq!(finished.entry.completed_at, Some(later));
        assert_eq!(finished.entry.user_rating, Some(5));
        assert_eq!(finished.entry.current_page, 42);

        let reset = update_entry(
            &mut conn,
            reader,
            id,
            &EntryUpdate {
                status: Some(ReadingStatus::WantToRead),
                ..Default::default()
            },
            later,
        )
        .unwrap();
        assert_eq!(reset.entry.started_at, None);
        assert_eq!(reset.entry.completed_at, None);
        assert_eq!(reset.entry.user_rating, Some(5));
    }

    #[test]
    fn update_validates_payload() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let reader = user(&conn, "a@example.com");
        let dune = book(&conn, "Dune");
        let added = create_entry(
            &mut conn,
            reader,
            &existing(dune, ReadingStatus::WantToRead),
            &CatalogConfig::default(),
            today(),
        )
        .unwrap();
        let err = update_entry(
            &mut conn,
            reader,
            added.entry.entry.id,
            &EntryUpdate {
                user_rating: Some(Some(0)),
                ..Default::default()
            },
            today(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn update_clears_nullable_fields_and_drops_blank_notes() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let reader = user(&conn, "a@example.com");
        let dune = book(&conn, "Dune");
        let added = create_entry(
            &mut conn,
            reader,
            &NewEntry {
                book_id: Some(dune),
                rating: Some(3),
                notes: Some("Slow start".into()),
                ..Default::default()
            },
            &CatalogConfig::default(),
            today(),
        )
        .unwrap();
        let id = added.entry.entry.id;

        let untouched = update_entry(
            &mut conn,
            reader,
            id,
            &EntryUpdate {
                progress: Some(20),
                ..Default::default()
            },
            today(),
        )
        .unwrap();
        assert_eq!(untouched.entry.notes.as_deref(), Some("Slow start"));
        assert_eq!(untouched.entry.user_rating, Some(3));

        let blanked = update_entry(
            &mut conn,
            reader,
            id,
            &EntryUpdate {
                notes: Some(Some("   ".into())),
                ..Default::default()
            },
            today(),
        )
        .unwrap();
        assert_eq!(blanked.entry.notes, None);

        let cleared = update_entry(
            &mut conn,
            reader,
            id,
            &EntryUpdate {
                user_rating: Some(None),
                ..Default::default()
            },
            today(),
        )
        .unwrap();
        assert_eq!(cleared.entry.user_rating, None);
        assert_eq!(cleared.entry.progress, 20);
    }

    #[test]
    fn deleting_a_book_removes_its_entries() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let reader = user(&conn, "a@example.com");
        let dune = book(&conn, "Dune");
        create_entry(
            &mut conn,
            reader,
            &existing(dune, ReadingStatus::WantToRead),
            &CatalogConfig::default(),
            today(),
        )
        .unwrap();

        conn.execute("DELETE FROM books WHERE id = ?1", params![dune]).unwrap();
        assert!(list_for_user(&conn, reader).unwrap().is_empty());
    }

    #[test]
    fn shelves_and_stats_group_by_status() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let reader = user(&conn, "a@example.com");
        let defaults = CatalogConfig::default();
        for (title, status) in [
            ("One", ReadingStatus::WantToRead),
            ("Two", ReadingStatus::WantToRead),
            ("Three", ReadingStatus::CurrentlyReading),
            ("Four", ReadingStatus::Completed),
        ] {
            let id = book(&conn, title);
            create_entry(&mut conn, reader, &existing(id, status), &defaults, today()).unwrap();
        }

        let shelves = Shelves::from_entries(list_for_user(&conn, reader).unwrap());
        assert_eq!(shelves.want_to_read.len(), 2);
        assert_eq!(shelves.currently_reading.len(), 1);
        assert_eq!(shelves.completed.len(), 1);

        let stats = stats_for_user(&conn, reader, today()).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed_this_month, 1);
    }
}
