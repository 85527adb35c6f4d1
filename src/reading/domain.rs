// Reading-list domain - pure values and rules, no database access
use chrono::{Datelike, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::db::models::{nullable, ReadingList, ReadingListDetail};

/// A user's personal status for a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingStatus {
    #[default]
    WantToRead,
    CurrentlyReading,
    Completed,
}

/// Dates derived from the status history of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadingDates {
    pub started_at: Option<NaiveDate>,
    pub completed_at: Option<NaiveDate>,
}

impl ReadingStatus {
    pub const ALL: [ReadingStatus; 3] = [
        ReadingStatus::WantToRead,
        ReadingStatus::CurrentlyReading,
        ReadingStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::WantToRead => "want-to-read",
            ReadingStatus::CurrentlyReading => "currently-reading",
            ReadingStatus::Completed => "completed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReadingStatus::WantToRead => "Want to Read",
            ReadingStatus::CurrentlyReading => "Currently Reading",
            ReadingStatus::Completed => "Completed",
        }
    }

    /// Dates stamped on an entry created directly in this status.
    pub fn initial_dates(self, today: NaiveDate) -> ReadingDates {
        match self {
            ReadingStatus::WantToRead => ReadingDates::default(),
            ReadingStatus::CurrentlyReading => ReadingDates {
                started_at: Some(today),
                completed_at: None,
            },
            ReadingStatus::Completed => ReadingDates {
                started_at: None,
                completed_at: Some(today),
            },
        }
    }

    /// Transition table. Every move between the three states is allowed;
    /// the derived dates follow the target state.
    pub fn transition(self, to: ReadingStatus, dates: ReadingDates, today: NaiveDate) -> ReadingDates {
        if self == to {
            return dates;
        }
        match to {
            ReadingStatus::WantToRead => ReadingDates::default(),
            ReadingStatus::CurrentlyReading => ReadingDates {
                started_at: dates.started_at.or(Some(today)),
                completed_at: None,
            },
            ReadingStatus::Completed => ReadingDates {
                started_at: dates.started_at,
                completed_at: Some(today),
            },
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "want-to-read" => Ok(ReadingStatus::WantToRead),
            "currently-reading" => Ok(ReadingStatus::CurrentlyReading),
            "completed" => Ok(ReadingStatus::Completed),
            other => Err(format!("unknown reading status: {other}")),
        }
    }
}

impl ToSql for ReadingStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ReadingStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// Confirmation shown after a book lands on a reading list.
pub fn added_message(status: ReadingStatus, title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        return "Book successfully added to your reading list!".to_string();
    }
    match status {
        ReadingStatus::WantToRead => {
            format!("\"{title}\" has been added to your Want to Read list!")
        }
        ReadingStatus::CurrentlyReading => format!("Started reading \"{title}\"! Happy reading!"),
        ReadingStatus::Completed => {
            format!("Congratulations! \"{title}\" has been marked as completed!")
        }
    }
}

pub const ALREADY_ON_LIST: &str = "This book is already in your reading list";

/// Payload for adding a book to a reading list: either an existing
/// `book_id`, or inline fields describing a new book.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub book_id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub author: Option<String>,
    #[validate(length(max = 2048))]
    pub cover: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ReadingStatus,
    #[validate(range(min = 1))]
    pub pages: Option<i64>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i64>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

/// Partial update of an entry. Absent fields are left unchanged; an
/// explicit `null` clears `notes` or `userRating`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EntryUpdate {
    pub status: Option<ReadingStatus>,
    #[validate(range(min = 0, max = 100))]
    pub progress: Option<i64>,
    #[validate(range(min = 0))]
    pub current_page: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(length(max = 5000))]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(range(min = 1, max = 5))]
    pub user_rating: Option<Option<i64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewlyAdded {
    pub message: String,
    pub entry: ReadingListDetail,
}

/// A user's entries grouped by status.
#[derive(Debug, Clone, Default)]
pub struct Shelves {
    pub want_to_read: Vec<ReadingListDetail>,
    pub currently_reading: Vec<ReadingListDetail>,
    pub completed: Vec<ReadingListDetail>,
}

impl Shelves {
    pub fn from_entries(entries: Vec<ReadingListDetail>) -> Self {
        let mut shelves = Shelves::default();
        for detail in entries {
            match detail.entry.status {
                ReadingStatus::WantToRead => shelves.want_to_read.push(detail),
                ReadingStatus::CurrentlyReading => shelves.currently_reading.push(detail),
                ReadingStatus::Completed => shelves.completed.push(detail),
            }
        }
        shelves
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingStats {
    pub want_to_read: usize,
    pub currently_reading: usize,
    pub completed: usize,
    pub completed_this_month: usize,
    pub total: usize,
}

impl ReadingStats {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a ReadingList>, today: NaiveDate) -> Self {
        let mut stats = ReadingStats::default();
        for entry in entries {
            stats.total += 1;
            match entry.status {
                ReadingStatus::WantToRead => stats.want_to_read += 1,
                ReadingStatus::CurrentlyReading => stats.currently_reading += 1,
                ReadingStatus::Completed => {
                    stats.completed += 1;
                    let this_month = entry.completed_at.is_some_and(|date| {
                        date.year() == today.year() && date.month() == today.month()
                    });
                    if this_month {
                        stats.completed_this_month += 1;
                    }
                }
            }
        }
        stats
    }
}
