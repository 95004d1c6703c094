use std::{path::PathBuf, sync::Arc};

use axum::{body::Body, http::{header, Request, StatusCode}, Router};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{db, res, AppState, Config};

pub(crate) const PASSWORD: &str = "correct-horse-42";

pub(crate) async fn test_pool() -> SqlitePool {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::migrate(&db_pool).await.unwrap();
    db_pool
}

/// A file-backed database with a pool of several connections, for exercising concurrent writers.
pub(crate) async fn file_pool() -> (SqlitePool, PathBuf) {
    let path = std::env::temp_dir().join(format!("discuss-test-{}.db", Uuid::now_v7().simple()));
    let db_pool = db::connect(&format!("sqlite://{}", path.display())).await.unwrap();
    (db_pool, path)
}

pub(crate) async fn insert_user(db_pool: &SqlitePool, username: &str) -> i64 {
    sqlx::query("INSERT INTO users (username,email,password_hash,date_joined) VALUES (?,?,?,?)")
        .bind(username)
        .bind(format!("{username}@example.com"))
        .bind("!")
        .bind(OffsetDateTime::now_utc())
        .execute(db_pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub(crate) async fn insert_room(db_pool: &SqlitePool, host_id: i64, topic: &str, name: &str, description: &str) -> i64 {
    let topic_id = db::get_or_create_topic(db_pool, topic).await.unwrap();
    let now = OffsetDateTime::now_utc();
    sqlx::query("INSERT INTO rooms (host_id,topic_id,name,description,created,updated) VALUES (?,?,?,?,?,?)")
        .bind(host_id)
        .bind(topic_id)
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(now)
        .execute(db_pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub(crate) async fn count(db_pool: &SqlitePool, sql: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(sql).fetch_one(db_pool).await.unwrap();
    count
}

/// Percent-encodes pairs as an `application/x-www-form-urlencoded` body.
pub(crate) fn form(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", res::url_encode(k), res::url_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) struct TestApp {
    pub db_pool: SqlitePool,
    pub media_dir: PathBuf,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_pool = test_pool().await;
        let media_dir = std::env::temp_dir().join(format!("discuss-test-{}", Uuid::now_v7().simple()));
        let config = Config {
            port: 0,
            database_url: "sqlite::memory:".to_owned(),
            media_dir: media_dir.clone(),
            session_minutes: 60,
            bcrypt_cost: 4,
        };
        let router = crate::app(AppState { db_pool: db_pool.clone(), config: Arc::new(config) });

        Self { db_pool, media_dir, router }
    }

    pub fn client(&self) -> Client {
        Client { router: self.router.clone(), cookie: None }
    }

    /// Registers `username` through the real form and returns a logged-in client with the new id.
    pub async fn signed_in(&self, username: &str) -> (Client, i64) {
        let mut client = self.client();
        let email = format!("{username}@example.com");
        let res = client
            .post("/register", &form(&[
                ("name", username),
                ("username", username),
                ("email", &email),
                ("password1", PASSWORD),
                ("password2", PASSWORD),
            ]))
            .await;
        assert_eq!(res.status, StatusCode::SEE_OTHER, "registration failed: {}", res.body);

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM users WHERE username=?")
            .bind(username.to_lowercase())
            .fetch_one(&self.db_pool)
            .await
            .unwrap();
        (client, id)
    }
}

#[derive(Debug)]
pub(crate) struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

/// A browser stand-in that carries the session cookie between requests.
pub(crate) struct Client {
    router: Router,
    cookie: Option<String>,
}

impl Client {
    pub async fn get(&mut self, path: &str) -> TestResponse {
        let request = Request::get(path);
        self.send(request, Body::empty()).await
    }

    pub async fn post(&mut self, path: &str, form: &str) -> TestResponse {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(request, Body::from(form.to_owned())).await
    }

    pub async fn post_multipart(&mut self, path: &str, boundary: &str, body: Vec<u8>) -> TestResponse {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"));
        self.send(request, Body::from(body)).await
    }

    async fn send(&mut self, mut request: axum::http::request::Builder, body: Body) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let response = self.router.clone().oneshot(request.body(body).unwrap()).await.unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let value = value.to_str().unwrap();
            if let Some(pair) = value.split(';').next() {
                self.cookie = Some(pair.to_owned());
            }
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_owned());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();

        TestResponse {
            status,
            location,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}
