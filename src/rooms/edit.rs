use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}, Form};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::info;

use crate::{db, forms::RoomForm, res, session, AppResult, AppState};

use super::new::render_form;

#[debug_handler(state = AppState)]
pub(crate) async fn edit_room_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<i64>,
) -> AppResult<Response> {
    let action = format!("/room/{room_id}/update");
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&action));
    };

    let room = db::room(&db_pool, room_id).await?;
    if room.host_id != user.id {
        return Ok(res::forbidden());
    }

    let form = RoomForm {
        topic: room.topic_name,
        name: room.name,
        description: room.description,
    };
    render_form(&session, &db_pool, &user, "Update Room", &action, &form).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn edit_room(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<i64>,

    Form(form): Form<RoomForm>,
) -> AppResult<Response> {
    let action = format!("/room/{room_id}/update");
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&action));
    };

    let room = db::room(&db_pool, room_id).await?;
    if room.host_id != user.id {
        return Ok(res::forbidden());
    }

    let changes = match form.clean() {
        Ok(changes) => changes,
        Err(e) => {
            session::flash(&session, e.to_string()).await?;
            return render_form(&session, &db_pool, &user, "Update Room", &action, &form).await;
        }
    };

    let topic_id = db::get_or_create_topic(&db_pool, &changes.topic).await?;
    sqlx::query("UPDATE rooms SET topic_id=?, name=?, description=?, updated=? WHERE id=?")
        .bind(topic_id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(OffsetDateTime::now_utc())
        .bind(room_id)
        .execute(&db_pool)
        .await?;

    info!("@{} updated room {room_id}", user.username);
    Ok(Redirect::to("/").into_response())
}
