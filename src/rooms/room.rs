use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}, Form};
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;

use crate::{db::{self, User}, forms::MessageForm, include_res, res::{self, escape}, session, AppResult, AppState};

use super::msg;

async fn render_room(
    session: &Session,
    db_pool: &SqlitePool,
    viewer: Option<&User>,
    room_id: i64,
    draft: &str,
) -> AppResult<Response> {
    let room = db::room(db_pool, room_id).await?;
    let messages: String = db::room_messages(db_pool, room_id)
        .await?
        .iter()
        .map(|message| msg::msg_to_html(message, viewer))
        .collect();
    let participants = db::participants(db_pool, room_id).await?;

    let host_actions = match viewer {
        Some(user) if user.id == room.host_id => include_res!(str, "/pages/rooms/host_actions.html")
            .replace("{room_id}", &room_id.to_string()),
        _ => String::new(),
    };

    let composer = match viewer {
        Some(_) => include_res!(str, "/pages/rooms/composer.html")
            .replace("{room_id}", &room_id.to_string())
            .replace("{body}", &escape(draft)),
        None => format!(r#"<p class="join"><a href="/login?return_url=/room/{room_id}">Log in</a> to join the conversation.</p>"#),
    };

    let participant_items: String = participants
        .iter()
        .map(|user| {
            include_res!(str, "/pages/rooms/participant.html")
                .replace("{id}", &user.id.to_string())
                .replace("{avatar}", &escape(&user.avatar_url()))
                .replace("{name}", &escape(user.display_name()))
                .replace("{username}", &escape(&user.username))
        })
        .collect();

    let content = include_res!(str, "/pages/rooms/room.html")
        .replace("{room_id}", &room_id.to_string())
        .replace("{host_actions}", &host_actions)
        .replace("{host_id}", &room.host_id.to_string())
        .replace("{host_username}", &escape(&room.host_username))
        .replace("{host_avatar}", &escape(&db::avatar_url(room.host_avatar.as_deref())))
        .replace("{topic}", &escape(&room.topic_name))
        .replace("{created}", &res::ago(room.created))
        .replace("{participant_count}", &participants.len().to_string())
        .replace("{participants}", &participant_items)
        .replace("{composer}", &composer)
        .replace("{messages}", &messages)
        .replace("{room_name}", &escape(&room.name))
        .replace("{description}", &escape(&room.description));

    res::page(session, viewer, &room.name, &content).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn room(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<i64>,
) -> AppResult<Response> {
    let viewer = session::current_user(&session, &db_pool).await?;
    render_room(&session, &db_pool, viewer.as_ref(), room_id, "").await
}

#[debug_handler(state = AppState)]
pub(crate) async fn post_message(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<i64>,

    Form(form): Form<MessageForm>,
) -> AppResult<Response> {
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&format!("/room/{room_id}")));
    };

    // 404 before anything is written
    db::room(&db_pool, room_id).await?;

    let body = match form.clean() {
        Ok(body) => body,
        Err(e) => {
            session::flash(&session, e.to_string()).await?;
            return render_room(&session, &db_pool, Some(&user), room_id, &form.body).await;
        }
    };

    let message_id = msg::send_msg(&db_pool, user.id, room_id, &body).await?;
    info!("@{} posted message {message_id} in room {room_id}", user.username);

    Ok(Redirect::to(&format!("/room/{room_id}")).into_response())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::testing::{self, count, form, TestApp};

    #[tokio::test]
    async fn room_page_shows_messages_and_participants() {
        let app = TestApp::new().await;
        let (mut ada, ada_id) = app.signed_in("ada").await;
        let (mut grace, _) = app.signed_in("grace").await;
        let room = testing::insert_room(&app.db_pool, ada_id, "Rust", "Lobby", "Talk *here*").await;

        let res = grace.post(&format!("/room/{room}"), &form(&[("body", "Hello **world**")])).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location, Some(format!("/room/{room}")));

        let res = ada.get(&format!("/room/{room}")).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("<strong>world</strong>"));
        assert!(res.body.contains("@grace"));
        assert!(res.body.contains(r#"<span id="participant-count">1</span>"#));
    }

    #[tokio::test]
    async fn posting_twice_keeps_one_participant_row() {
        let app = TestApp::new().await;
        let (mut ada, ada_id) = app.signed_in("ada").await;
        let room = testing::insert_room(&app.db_pool, ada_id, "Rust", "Lobby", "").await;

        ada.post(&format!("/room/{room}"), &form(&[("body", "one")])).await;
        ada.post(&format!("/room/{room}"), &form(&[("body", "two")])).await;

        assert_eq!(count(&app.db_pool, "SELECT COUNT(*) FROM room_participants").await, 1);
        assert_eq!(count(&app.db_pool, "SELECT COUNT(*) FROM messages").await, 2);
    }

    #[tokio::test]
    async fn anonymous_posts_go_to_login() {
        let app = TestApp::new().await;
        let host = testing::insert_user(&app.db_pool, "host").await;
        let room = testing::insert_room(&app.db_pool, host, "Rust", "Lobby", "").await;

        let res = app.client().post(&format!("/room/{room}"), &form(&[("body", "hi")])).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location, Some(format!("/login?return_url=/room/{room}")));
        assert_eq!(count(&app.db_pool, "SELECT COUNT(*) FROM messages").await, 0);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let app = TestApp::new().await;
        let (mut ada, ada_id) = app.signed_in("ada").await;
        let room = testing::insert_room(&app.db_pool, ada_id, "Rust", "Lobby", "").await;

        let res = ada.post(&format!("/room/{room}"), &form(&[("body", "   ")])).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("Message is required."));
        assert_eq!(count(&app.db_pool, "SELECT COUNT(*) FROM messages").await, 0);
    }

    #[tokio::test]
    async fn missing_room_is_not_found() {
        let app = TestApp::new().await;
        let (mut ada, _) = app.signed_in("ada").await;

        assert_eq!(app.client().get("/room/42").await.status, StatusCode::NOT_FOUND);
        assert_eq!(ada.post("/room/42", &form(&[("body", "hi")])).await.status, StatusCode::NOT_FOUND);
    }
}
