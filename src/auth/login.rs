use axum::{debug_handler, extract::{Query, State}, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;

use crate::{forms::LoginForm, include_res, res::{self, escape}, session::{self, RETURN_URL}, AppResult, AppState};

use super::verify_password;

const INCORRECT: &str = "Username or password is incorrect.";

#[derive(Deserialize)]
pub struct LoginQuery {
    pub return_url: Option<String>,
}

async fn render(session: &Session, username: &str) -> AppResult<Response> {
    let content = include_res!(str, "/pages/auth/login.html")
        .replace("{username}", &escape(username));
    res::page(session, None, "Login", &content).await
}

#[debug_handler(state = AppState)]
pub async fn login_page(
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    if session::current_user(&session, &db_pool).await?.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    if let Some(return_url) = return_url {
        session.insert(RETURN_URL, return_url).await?;
    }

    render(&session, "").await
}

#[debug_handler(state = AppState)]
pub async fn login(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(LoginForm { username, password }): Form<LoginForm>,
) -> AppResult<Response> {
    if session::current_user(&session, &db_pool).await?.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let identifier = username.trim().to_lowercase();
    // an email match is tried before a username that happens to look like one
    let accounts: Vec<(i64, String)> =
        sqlx::query_as("SELECT id,password_hash FROM users WHERE username=?1 OR email=?1 ORDER BY email=?1 DESC, id")
            .bind(&identifier)
            .fetch_all(&db_pool)
            .await?;

    let mut authenticated = None;
    for (user_id, password_hash) in accounts {
        if verify_password(password.clone(), password_hash).await? {
            authenticated = Some(user_id);
            break;
        }
    }

    let Some(user_id) = authenticated else {
        session::flash(&session, INCORRECT).await?;
        return render(&session, &username).await;
    };

    let return_url = session.remove::<String>(RETURN_URL).await?;
    session::log_in(&session, user_id).await?;
    info!("welcome u/{user_id}");

    Ok(Redirect::to(&session::local_path(return_url)).into_response())
}
