// Library exports for Shelfwise
// This allows integration tests and the binary to share the app modules

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod reading;
pub mod routes;
pub mod state;
