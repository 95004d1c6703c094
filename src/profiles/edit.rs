use std::{path::Path, sync::Arc};

use axum::{body::Bytes, debug_handler, extract::{Multipart, State}, response::{IntoResponse, Redirect, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{auth, db::User, forms::{self, UserForm}, include_res, res::{self, escape}, session, AppResult, AppState, Config};

const TAKEN: &str = "That username or email is already in use.";

struct AvatarUpload {
    content_type: String,
    data: Bytes,
}

async fn read_form(multipart: &mut Multipart) -> AppResult<(UserForm, Option<AvatarUpload>)> {
    let mut form = UserForm::default();
    let mut avatar = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        match name.as_str() {
            "avatar" => {
                let content_type = field.content_type().unwrap_or_default().to_owned();
                let data = field.bytes().await?;
                // browsers send an empty part when no file was picked
                if !data.is_empty() {
                    avatar = Some(AvatarUpload { content_type, data });
                }
            }
            "name" => form.name = field.text().await?,
            "username" => form.username = field.text().await?,
            "email" => form.email = field.text().await?,
            "bio" => form.bio = field.text().await?,
            _ => {}
        }
    }

    Ok((form, avatar))
}

async fn save_avatar(media_dir: &Path, extension: &str, data: &[u8]) -> AppResult<String> {
    let relative = format!("avatars/{}.{extension}", Uuid::now_v7().simple());
    let path = media_dir.join(&relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, data).await?;
    Ok(relative)
}

async fn remove_avatar(media_dir: &Path, relative: &str) {
    if let Err(e) = tokio::fs::remove_file(media_dir.join(relative)).await {
        warn!("could not remove avatar {relative}: {e}");
    }
}

async fn render(session: &Session, user: &User, form: &UserForm) -> AppResult<Response> {
    let content = include_res!(str, "/pages/profiles/user_form.html")
        .replace("{avatar}", &escape(&user.avatar_url()))
        .replace("{name}", &escape(&form.name))
        .replace("{username}", &escape(&form.username))
        .replace("{email}", &escape(&form.email))
        .replace("{bio}", &escape(&form.bio));
    res::page(session, Some(user), "Edit Profile", &content).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_user_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect("/update-user"));
    };

    let form = UserForm {
        name: user.name.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        bio: user.bio.clone(),
    };
    render(&session, &user, &form).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_user(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let Some(user) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect("/update-user"));
    };

    let (form, upload) = read_form(&mut multipart).await?;

    let changes = match form.clean() {
        Ok(changes) => changes,
        Err(e) => {
            session::flash(&session, e.to_string()).await?;
            return render(&session, &user, &form).await;
        }
    };

    let upload = match upload {
        Some(upload) => match forms::avatar_extension(&upload.content_type) {
            Ok(extension) => Some((extension, upload.data)),
            Err(e) => {
                session::flash(&session, e.to_string()).await?;
                return render(&session, &user, &form).await;
            }
        },
        None => None,
    };

    if auth::identity_taken(&db_pool, &changes.username, &changes.email, Some(user.id)).await? {
        session::flash(&session, TAKEN).await?;
        return render(&session, &user, &form).await;
    }

    let avatar = match upload {
        Some((extension, data)) => Some(save_avatar(&config.media_dir, extension, &data).await?),
        None => None,
    };

    let result = sqlx::query("UPDATE users SET name=?, username=?, email=?, bio=?, avatar=COALESCE(?, avatar) WHERE id=?")
        .bind(&changes.name)
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.bio)
        .bind(&avatar)
        .bind(user.id)
        .execute(&db_pool)
        .await;

    if let Err(e) = result {
        if let Some(saved) = &avatar {
            remove_avatar(&config.media_dir, saved).await;
        }
        return match e {
            sqlx::Error::Database(e) if e.is_unique_violation() => {
                session::flash(&session, TAKEN).await?;
                render(&session, &user, &form).await
            }
            e => Err(e.into()),
        };
    }

    if let (Some(_), Some(old)) = (&avatar, &user.avatar) {
        remove_avatar(&config.media_dir, old).await;
    }

    info!("@{} updated their profile", changes.username);
    Ok(Redirect::to(&format!("/profile/{}", user.id)).into_response())
}
