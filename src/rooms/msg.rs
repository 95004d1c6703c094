use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::info;

use crate::{db::{avatar_url, MessageEntry, User}, include_res, res::{self, escape}, session, AppResult, AppState};

/// Stores a message and records its author as a participant of the room.
pub(crate) async fn send_msg(
    db_pool: &SqlitePool,

    user_id: i64,
    room_id: i64,

    body: &str,
) -> AppResult<i64> {
    let now = OffsetDateTime::now_utc();
    let id = sqlx::query("INSERT INTO messages (user_id,room_id,body,created,updated) values (?,?,?,?,?)")
        .bind(user_id)
        .bind(room_id)
        .bind(body)
        .bind(now)
        .bind(now)
        .execute(db_pool)
        .await?
        .last_insert_rowid();

    sqlx::query("INSERT OR IGNORE INTO room_participants (room_id,user_id) values (?,?)")
        .bind(room_id)
        .bind(user_id)
        .execute(db_pool)
        .await?;

    Ok(id)
}

pub(crate) fn msg_to_html(message: &MessageEntry, viewer: Option<&User>) -> String {
    let delete = match viewer {
        Some(user) if user.id == message.user_id => {
            format!(r#"<a class="delete" href="/message/{}/delete">Delete</a>"#, message.id)
        }
        _ => String::new(),
    };

    include_res!(str, "/pages/rooms/message.html")
        .replace("{user_id}", &message.user_id.to_string())
        .replace("{username}", &escape(&message.username))
        .replace("{avatar}", &escape(&avatar_url(message.avatar.as_deref())))
        .replace("{created}", &res::ago(message.created))
        .replace("{delete}", &delete)
        .replace("{body}", &res::markdown(&message.body))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_message_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(message_id): Path<i64>,
) -> AppResult<Response> {
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&format!("/message/{message_id}/delete")));
    };

    let (author_id, room_id, body): (i64, i64, String) =
        sqlx::query_as("SELECT user_id,room_id,body FROM messages WHERE id=?")
            .bind(message_id)
            .fetch_one(&db_pool)
            .await?;

    if author_id != user.id {
        return Ok(res::forbidden());
    }

    let content = include_res!(str, "/pages/delete.html")
        .replace("{action}", &format!("/message/{message_id}/delete"))
        .replace("{cancel}", &format!("/room/{room_id}"))
        .replace("{obj}", &escape(&body));
    res::page(&session, Some(&user), "Delete Message", &content).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_message(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(message_id): Path<i64>,
) -> AppResult<Response> {
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&format!("/message/{message_id}/delete")));
    };

    let (author_id, room_id): (i64, i64) = sqlx::query_as("SELECT user_id,room_id FROM messages WHERE id=?")
        .bind(message_id)
        .fetch_one(&db_pool)
        .await?;

    if author_id != user.id {
        return Ok(res::forbidden());
    }

    sqlx::query("DELETE FROM messages WHERE id=?")
        .bind(message_id)
        .execute(&db_pool)
        .await?;

    info!("@{} deleted message {message_id}", user.username);
    Ok(Redirect::to(&format!("/room/{room_id}")).into_response())
}
