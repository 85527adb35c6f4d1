pub mod domain;
pub mod repository;

pub use domain::{
    added_message, EntryUpdate, NewEntry, NewlyAdded, ReadingDates, ReadingStats, ReadingStatus,
    Shelves, ALREADY_ON_LIST,
};
