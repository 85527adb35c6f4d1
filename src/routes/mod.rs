pub mod auth;
pub mod books;
pub mod categories;
pub mod home;
pub mod my_reading;
pub mod reading_lists;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .merge(auth::router())
        .merge(books::router())
        .merge(categories::router())
        .merge(reading_lists::router())
        .merge(my_reading::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
