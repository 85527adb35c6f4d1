pub mod books;
pub mod categories;

pub use books::NewBook;
pub use categories::{CategoryUpdate, NewCategory};

use crate::error::{AppError, AppResult};

/// `value` with surrounding whitespace removed. Blank input is a
/// validation error naming `field`.
pub(crate) fn required<'a>(field: &str, value: &'a str) -> AppResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be blank")));
    }
    Ok(trimmed)
}
