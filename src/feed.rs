use axum::{debug_handler, extract::{Query, State}, response::Response, routing::get, Router};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{db::{self, avatar_url, MessageEntry, RoomSummary, TopicSummary, User}, include_res, res::{self, escape}, session, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/topics", get(topics_page))
        .route("/activity", get(activity_page))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub fn room_items(rooms: &[RoomSummary]) -> String {
    if rooms.is_empty() {
        return r#"<p class="empty">No rooms yet.</p>"#.to_owned();
    }

    rooms
        .iter()
        .map(|room| {
            include_res!(str, "/pages/room_item.html")
                .replace("{id}", &room.id.to_string())
                .replace("{name}", &escape(&room.name))
                .replace("{host_id}", &room.host_id.to_string())
                .replace("{host_username}", &escape(&room.host_username))
                .replace("{host_avatar}", &escape(&avatar_url(room.host_avatar.as_deref())))
                .replace("{topic}", &escape(&room.topic_name))
                .replace("{participant_count}", &room.participant_count.to_string())
                .replace("{created}", &res::ago(room.created))
        })
        .collect()
}

pub fn topic_items(topics: &[TopicSummary]) -> String {
    topics
        .iter()
        .map(|topic| {
            include_res!(str, "/pages/topic_item.html")
                .replace("{q}", &res::url_encode(&topic.name))
                .replace("{name}", &escape(&topic.name))
                .replace("{room_count}", &topic.room_count.to_string())
        })
        .collect()
}

/// Recent-activity cards; the viewer gets a delete link on their own messages.
pub fn activity_items(messages: &[MessageEntry], viewer: Option<&User>) -> String {
    if messages.is_empty() {
        return r#"<p class="empty">Nothing here yet.</p>"#.to_owned();
    }

    messages
        .iter()
        .map(|message| {
            let delete = match viewer {
                Some(user) if user.id == message.user_id => {
                    format!(r#"<a class="delete" href="/message/{}/delete">Delete</a>"#, message.id)
                }
                _ => String::new(),
            };

            include_res!(str, "/pages/activity_item.html")
                .replace("{user_id}", &message.user_id.to_string())
                .replace("{username}", &escape(&message.username))
                .replace("{avatar}", &escape(&avatar_url(message.avatar.as_deref())))
                .replace("{room_id}", &message.room_id.to_string())
                .replace("{room_name}", &escape(&message.room_name))
                .replace("{created}", &res::ago(message.created))
                .replace("{delete}", &delete)
                .replace("{body}", &res::markdown(&message.body))
        })
        .collect()
}

#[debug_handler(state = AppState)]
pub async fn topics_page(
    Query(SearchQuery { q }): Query<SearchQuery>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let q = q.unwrap_or_default();
    let viewer = session::current_user(&session, &db_pool).await?;
    let topics = db::topics(&db_pool, &q).await?;

    let content = include_res!(str, "/pages/topics.html")
        .replace("{q}", &escape(&q))
        .replace("{topics}", &topic_items(&topics));
    res::page(&session, viewer.as_ref(), "Browse Topics", &content).await
}

#[debug_handler(state = AppState)]
pub async fn activity_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let viewer = session::current_user(&session, &db_pool).await?;
    let messages = db::recent_messages(&db_pool, "").await?;

    let content = include_res!(str, "/pages/activity.html")
        .replace("{activity}", &activity_items(&messages, viewer.as_ref()));
    res::page(&session, viewer.as_ref(), "Recent Activity", &content).await
}
