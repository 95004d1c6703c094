use axum::response::{IntoResponse, Redirect, Response};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{db::{self, User}, res, AppResult};

pub const USER_ID: &str = "user_id";
pub const RETURN_URL: &str = "return_url";
pub const FLASH: &str = "flash";

/// The logged-in user, if the session names one that still exists.
pub async fn current_user(session: &Session, db_pool: &SqlitePool) -> AppResult<Option<User>> {
    let Some(user_id) = session.get::<i64>(USER_ID).await? else {
        return Ok(None);
    };

    db::user_by_id(db_pool, user_id).await
}

pub async fn log_in(session: &Session, user_id: i64) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(USER_ID, user_id).await?;
    Ok(())
}

pub fn login_redirect(return_url: &str) -> Response {
    Redirect::to(&format!("/login?return_url={}", res::url_encode(return_url))).into_response()
}

pub async fn flash(session: &Session, message: impl Into<String>) -> AppResult<()> {
    let mut messages: Vec<String> = session.get(FLASH).await?.unwrap_or_default();
    messages.push(message.into());
    session.insert(FLASH, messages).await?;
    Ok(())
}

pub async fn take_flashes(session: &Session) -> AppResult<Vec<String>> {
    Ok(session.remove::<Vec<String>>(FLASH).await?.unwrap_or_default())
}

/// Only same-site absolute paths are followed after login.
pub fn local_path(url: Option<String>) -> String {
    match url {
        Some(url) if url.starts_with('/') && !url.starts_with("//") && !url.contains('\\') => url,
        _ => "/".to_owned(),
    }
}
