use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}, Form};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::info;

use crate::{db::{self, User}, forms::RoomForm, include_res, res::{self, escape}, session, AppResult, AppState};

/// The create/update form. `form` carries whatever the user typed last.
pub(super) async fn render_form(
    session: &Session,
    db_pool: &SqlitePool,
    viewer: &User,
    heading: &str,
    action: &str,
    form: &RoomForm,
) -> AppResult<Response> {
    let topic_options: String = db::topic_names(db_pool)
        .await?
        .iter()
        .map(|name| format!(r#"<option value="{}"></option>"#, escape(name)))
        .collect();

    let content = include_res!(str, "/pages/rooms/room_form.html")
        .replace("{heading}", &escape(heading))
        .replace("{action}", action)
        .replace("{topic_options}", &topic_options)
        .replace("{topic}", &escape(&form.topic))
        .replace("{name}", &escape(&form.name))
        .replace("{description}", &escape(&form.description));

    res::page(session, Some(viewer), heading, &content).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_room_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect("/room/create"));
    };

    render_form(&session, &db_pool, &user, "Create Room", "/room/create", &RoomForm::default()).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_room(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Form(form): Form<RoomForm>,
) -> AppResult<Response> {
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect("/room/create"));
    };

    let room = match form.clean() {
        Ok(room) => room,
        Err(e) => {
            session::flash(&session, e.to_string()).await?;
            return render_form(&session, &db_pool, &user, "Create Room", "/room/create", &form).await;
        }
    };

    let topic_id = db::get_or_create_topic(&db_pool, &room.topic).await?;
    let now = OffsetDateTime::now_utc();
    let room_id = sqlx::query("INSERT INTO rooms (host_id,topic_id,name,description,created,updated) values (?,?,?,?,?,?)")
        .bind(user.id)
        .bind(topic_id)
        .bind(&room.name)
        .bind(&room.description)
        .bind(now)
        .bind(now)
        .execute(&db_pool)
        .await?
        .last_insert_rowid();

    info!("@{} opened room {room_id}", user.username);
    Ok(Redirect::to("/").into_response())
}
