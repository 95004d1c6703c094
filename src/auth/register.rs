use std::sync::Arc;

use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}, Form};
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::debug;

use crate::{forms::RegisterForm, include_res, res::{self, escape}, session, AppResult, AppState, Config};

use super::create_user;

const REGISTRATION_FAILED: &str = "An error occurred during registration.";

async fn render(session: &Session, form: &RegisterForm) -> AppResult<Response> {
    let content = include_res!(str, "/pages/auth/register.html")
        .replace("{name}", &escape(&form.name))
        .replace("{username}", &escape(&form.username))
        .replace("{email}", &escape(&form.email));
    res::page(session, None, "Register", &content).await
}

#[debug_handler]
pub async fn register_page(session: Session) -> AppResult<Response> {
    render(&session, &RegisterForm::default()).await
}

#[debug_handler(state = AppState)]
pub async fn register(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let new_user = match form.clean() {
        Ok(new_user) => new_user,
        Err(e) => {
            debug!("registration rejected: {e}");
            session::flash(&session, REGISTRATION_FAILED).await?;
            return render(&session, &form).await;
        }
    };

    let Some(user_id) = create_user(&db_pool, &new_user, config.bcrypt_cost).await? else {
        debug!("registration rejected: @{} or its email is taken", new_user.username);
        session::flash(&session, REGISTRATION_FAILED).await?;
        return render(&session, &form).await;
    };

    session::log_in(&session, user_id).await?;
    Ok(Redirect::to("/").into_response())
}
