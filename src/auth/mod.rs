use axum::{routing::get, Router};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;

use crate::{forms::NewUser, AppResult, AppState};

mod login;
mod logout;
mod register;

pub use login::{login, login_page};
pub use logout::logout;
pub use register::{register, register_page};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::login_page).post(login::login))
        .route("/logout", get(logout::logout))
        .route("/register", get(register::register_page).post(register::register))
}

pub(crate) async fn hash_password(password: String, cost: u32) -> AppResult<String> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

pub(crate) async fn verify_password(password: String, password_hash: String) -> AppResult<bool> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &password_hash)).await??)
}

/// Whether another account already uses `username` or `email` as either its username or its email.
pub(crate) async fn identity_taken(db_pool: &SqlitePool, username: &str, email: &str, except: Option<i64>) -> AppResult<bool> {
    let taken: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM users WHERE (username IN (?1,?2) OR email IN (?1,?2)) AND id IS NOT ?3 LIMIT 1"
    )
        .bind(username)
        .bind(email)
        .bind(except)
        .fetch_optional(db_pool)
        .await?;
    Ok(taken.is_some())
}

/// Inserts a new account. Returns `None` when the username or email is already taken.
pub(crate) async fn create_user(db_pool: &SqlitePool, user: &NewUser, cost: u32) -> AppResult<Option<i64>> {
    if identity_taken(db_pool, &user.username, &user.email, None).await? {
        return Ok(None);
    }

    let password_hash = hash_password(user.password.clone(), cost).await?;

    let result = sqlx::query("INSERT INTO users (username,email,name,password_hash,date_joined) VALUES (?,?,?,?,?)")
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.name)
        .bind(password_hash)
        .bind(OffsetDateTime::now_utc())
        .execute(db_pool)
        .await;

    match result {
        Ok(done) => {
            let id = done.last_insert_rowid();
            info!("adding @{}#{id}", user.username);
            Ok(Some(id))
        }
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
        Err(e) => Err(e.into()),
    }
}
