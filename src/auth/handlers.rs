use askama::Template;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};

use crate::auth::{session, users};
use crate::error::AppResult;
use crate::extractors::{cookie_value, FormBody, MaybeUser};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate;

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate;

// -- Cookie helpers --

/// Session cookie. `max_age_hours` makes it persistent; without it the
/// browser drops the cookie when it closes.
fn session_cookie(name: &str, token: &str, max_age_hours: Option<u64>) -> String {
    match max_age_hours {
        Some(hours) => format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            name,
            token,
            hours * 3600
        ),
        None => format!("{}={}; HttpOnly; SameSite=Lax; Path=/", name, token),
    }
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

fn redirect_with_cookie(location: &str, cookie: String) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, location.to_string()),
            (header::SET_COOKIE, cookie),
        ],
        "",
    )
        .into_response()
}

// -- Pages --

/// GET /auth/login
pub async fn login_page(MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(LoginTemplate).into_response()
}

/// GET /auth/register
pub async fn register_page(MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(RegisterTemplate).into_response()
}

// -- Actions --

/// POST /register: create the account and sign it in
pub async fn register(
    State(state): State<AppState>,
    FormBody(form): FormBody<users::Registration>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let user = users::register(&conn, &form)?;

    let hours = state.config.auth.session_hours;
    let token = session::create_session(&conn, user.id, hours)?;

    Ok(redirect_with_cookie(
        "/",
        session_cookie(&state.config.auth.cookie_name, &token, None),
    ))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    FormBody(credentials): FormBody<users::Credentials>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let user = users::authenticate(&conn, &credentials)?;

    let remember = credentials.remember();
    let hours = if remember {
        state.config.auth.remember_hours
    } else {
        state.config.auth.session_hours
    };
    let token = session::create_session(&conn, user.id, hours)?;
    tracing::info!("User {} signed in", user.id);

    Ok(redirect_with_cookie(
        "/",
        session_cookie(
            &state.config.auth.cookie_name,
            &token,
            remember.then_some(hours),
        ),
    ))
}

/// POST /logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;

    if let Some(token) = cookie_value(&headers, cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok(redirect_with_cookie("/", clear_session_cookie(cookie_name)))
}
