use axum::{debug_handler, extract::{Path, State}, response::Response};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{db, feed, include_res, res::{self, escape}, session, AppResult, AppState};

#[debug_handler(state = AppState)]
pub(crate) async fn profile(
    Path(user_id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let viewer = session::current_user(&session, &db_pool).await?;
    let user = db::user_by_id(&db_pool, user_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

    let rooms = db::rooms_hosted_by(&db_pool, user_id).await?;
    let messages = db::messages_by(&db_pool, user_id).await?;
    let topics = db::topics(&db_pool, "").await?;

    let edit = match &viewer {
        Some(viewer) if viewer.id == user.id => r#"<a class="button" href="/update-user">Edit Profile</a>"#,
        _ => "",
    };

    let content = include_res!(str, "/pages/profiles/profile.html")
        .replace("{edit}", edit)
        .replace("{avatar}", &escape(&user.avatar_url()))
        .replace("{room_count}", &rooms.len().to_string())
        .replace("{rooms}", &feed::room_items(&rooms))
        .replace("{activity}", &feed::activity_items(&messages, viewer.as_ref()))
        .replace("{topics}", &feed::topic_items(&topics))
        .replace("{name}", &escape(user.display_name()))
        .replace("{username}", &escape(&user.username))
        .replace("{bio}", &escape(&user.bio));

    res::page(&session, viewer.as_ref(), user.display_name(), &content).await
}
