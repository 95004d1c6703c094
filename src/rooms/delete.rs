use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;

use crate::{db, include_res, res::{self, escape}, session, AppResult, AppState};

#[debug_handler(state = AppState)]
pub(crate) async fn delete_room_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<i64>,
) -> AppResult<Response> {
    let action = format!("/room/{room_id}/delete");
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&action));
    };

    let room = db::room(&db_pool, room_id).await?;
    if room.host_id != user.id {
        return Ok(res::forbidden());
    }

    let content = include_res!(str, "/pages/delete.html")
        .replace("{action}", &action)
        .replace("{cancel}", &format!("/room/{room_id}"))
        .replace("{obj}", &escape(&room.name));
    res::page(&session, Some(&user), "Delete Room", &content).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_room(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<i64>,
) -> AppResult<Response> {
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&format!("/room/{room_id}/delete")));
    };

    let (host_id,): (i64,) = sqlx::query_as("SELECT host_id FROM rooms WHERE id=?")
        .bind(room_id)
        .fetch_one(&db_pool)
        .await?;
    if host_id != user.id {
        return Ok(res::forbidden());
    }

    // messages and participants go with it (ON DELETE CASCADE)
    sqlx::query("DELETE FROM rooms WHERE id=?")
        .bind(room_id)
        .execute(&db_pool)
        .await?;

    info!("@{} deleted room {room_id}", user.username);
    Ok(Redirect::to("/").into_response())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::{rooms::msg::send_msg, testing::{self, count, TestApp}};

    #[tokio::test]
    async fn non_host_is_forbidden() {
        let app = TestApp::new().await;
        let (_, ada_id) = app.signed_in("ada").await;
        let (mut grace, _) = app.signed_in("grace").await;
        let room = testing::insert_room(&app.db_pool, ada_id, "Rust", "Lobby", "").await;
        let path = format!("/room/{room}/delete");

        assert_eq!(grace.get(&path).await.status, StatusCode::FORBIDDEN);
        assert_eq!(grace.post(&path, "").await.status, StatusCode::FORBIDDEN);
        assert_eq!(count(&app.db_pool, "SELECT COUNT(*) FROM rooms").await, 1);
    }

    #[tokio::test]
    async fn host_confirms_then_deletes() {
        let app = TestApp::new().await;
        let (mut ada, ada_id) = app.signed_in("ada").await;
        let room = testing::insert_room(&app.db_pool, ada_id, "Rust", "Lobby", "").await;
        send_msg(&app.db_pool, ada_id, room, "bye").await.unwrap();
        let path = format!("/room/{room}/delete");

        let res = ada.get(&path).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body.contains("Lobby"));
        assert_eq!(count(&app.db_pool, "SELECT COUNT(*) FROM rooms").await, 1);

        let res = ada.post(&path, "").await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.location.as_deref(), Some("/"));
        assert_eq!(count(&app.db_pool, "SELECT COUNT(*) FROM rooms").await, 0);
        assert_eq!(count(&app.db_pool, "SELECT COUNT(*) FROM messages").await, 0);
        assert_eq!(count(&app.db_pool, "SELECT COUNT(*) FROM room_participants").await, 0);
    }
}
