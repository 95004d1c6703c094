use axum::{debug_handler, extract::{Query, State}, response::Response};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{db, feed::{self, SearchQuery}, include_res, res::{self, escape}, session, AppResult, AppState};

#[debug_handler(state = AppState)]
pub async fn index(
    Query(SearchQuery { q }): Query<SearchQuery>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let q = q.unwrap_or_default();
    let viewer = session::current_user(&session, &db_pool).await?;

    let rooms = db::search_rooms(&db_pool, &q).await?;
    let topics = db::topics(&db_pool, "").await?;
    let activity = db::recent_messages(&db_pool, &q).await?;

    let content = include_res!(str, "/pages/index.html")
        .replace("{q}", &escape(&q))
        .replace("{room_count}", &rooms.len().to_string())
        .replace("{topic_count}", &topics.len().to_string())
        .replace("{topics}", &feed::topic_items(&topics))
        .replace("{rooms}", &feed::room_items(&rooms))
        .replace("{activity}", &feed::activity_items(&activity, viewer.as_ref()));

    res::page(&session, viewer.as_ref(), "Home", &content).await
}
