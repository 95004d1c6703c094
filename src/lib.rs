pub mod auth;
pub mod config;
pub mod db;
pub mod feed;
pub mod forms;
pub mod index;
pub mod profiles;
pub mod res;
pub mod rooms;
pub mod session;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}, routing::get, Router};
use sqlx::SqlitePool;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub use config::Config;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Arc<Config>,
}

/// Builds the whole application: routes, uploaded media, sessions and request tracing.
pub fn app(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(state.config.session_minutes)));

    let media = ServeDir::new(&state.config.media_dir);

    Router::new()
        .route("/", get(index::index))
        .route("/static/style.css", get(res::stylesheet))
        .route("/static/avatar.svg", get(res::default_avatar))

        .merge(auth::router())
        .merge(profiles::router())
        .merge(feed::router())
        .nest("/room", rooms::router())
        .nest("/message", rooms::messages_router())
        .nest_service("/media", media)

        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(sqlx::Error::RowNotFound) = self.0.downcast_ref::<sqlx::Error>() {
            return (StatusCode::NOT_FOUND, "Not found").into_response();
        }

        tracing::error!("{:?}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong",
        )
            .into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(anyhow::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(sqlx::migrate::MigrateError);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(axum::extract::multipart::MultipartError);
apperr_impl!(bcrypt::BcryptError);
apperr_impl!(tokio::task::JoinError);
apperr_impl!(std::io::Error);
