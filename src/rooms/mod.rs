mod delete;
mod edit;
pub(crate) mod msg;
mod new;
mod room;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", get(new::new_room_page).post(new::new_room))
        .route("/{room_id}", get(room::room).post(room::post_message))
        .route("/{room_id}/update", get(edit::edit_room_page).post(edit::edit_room))
        .route("/{room_id}/delete", get(delete::delete_room_page).post(delete::delete_room))
}

pub fn messages_router() -> Router<AppState> {
    Router::new()
        .route("/{message_id}/delete", get(msg::delete_message_page).post(msg::delete_message))
}
