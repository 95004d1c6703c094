use std::str::FromStr;

use sqlx::{migrate::MigrateError, sqlite::{SqliteConnectOptions, SqlitePoolOptions}, FromRow, SqlitePool};
use time::OffsetDateTime;

use crate::AppResult;

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await?;

    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), MigrateError> {
    sqlx::migrate!().run(db_pool).await
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub name: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub password_hash: String,
    pub date_joined: OffsetDateTime,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.username } else { &self.name }
    }

    pub fn avatar_url(&self) -> String {
        avatar_url(self.avatar.as_deref())
    }
}

pub fn avatar_url(avatar: Option<&str>) -> String {
    match avatar {
        Some(path) => format!("/media/{path}"),
        None => "/static/avatar.svg".to_owned(),
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TopicSummary {
    pub id: i64,
    pub name: String,
    pub room_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct RoomSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created: OffsetDateTime,
    pub updated: OffsetDateTime,
    pub host_id: i64,
    pub host_username: String,
    pub host_avatar: Option<String>,
    pub topic_name: String,
    pub participant_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageEntry {
    pub id: i64,
    pub body: String,
    pub created: OffsetDateTime,
    pub user_id: i64,
    pub username: String,
    pub avatar: Option<String>,
    pub room_id: i64,
    pub room_name: String,
}

const ROOM_SELECT: &str = r#"
SELECT r.id, r.name, r.description, r.created, r.updated,
       r.host_id, u.username AS host_username, u.avatar AS host_avatar,
       t.name AS topic_name,
       (SELECT COUNT(*) FROM room_participants p WHERE p.room_id = r.id) AS participant_count
FROM rooms r
JOIN users u ON u.id = r.host_id
JOIN topics t ON t.id = r.topic_id
"#;

const MESSAGE_SELECT: &str = r#"
SELECT m.id, m.body, m.created, m.user_id, u.username, u.avatar, m.room_id, r.name AS room_name
FROM messages m
JOIN users u ON u.id = m.user_id
JOIN rooms r ON r.id = m.room_id
"#;

/// Turns free text into a `LIKE` pattern matching it anywhere, with `%` and `_` taken literally.
pub fn like_pattern(q: &str) -> String {
    let mut pattern = String::with_capacity(q.len() + 2);
    pattern.push('%');
    for c in q.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub async fn user_by_id(db_pool: &SqlitePool, user_id: i64) -> AppResult<Option<User>> {
    Ok(
        sqlx::query_as("SELECT * FROM users WHERE id=?")
            .bind(user_id)
            .fetch_optional(db_pool)
            .await?
    )
}

/// Rooms whose topic, name or description contains `q`, ignoring case.
pub async fn search_rooms(db_pool: &SqlitePool, q: &str) -> AppResult<Vec<RoomSummary>> {
    let sql = format!(
        r#"{ROOM_SELECT}
        WHERE t.name LIKE ?1 ESCAPE '\' OR r.name LIKE ?1 ESCAPE '\' OR r.description LIKE ?1 ESCAPE '\'
        ORDER BY julianday(r.updated) DESC, r.id DESC"#
    );
    Ok(
        sqlx::query_as(&sql)
            .bind(like_pattern(q))
            .fetch_all(db_pool)
            .await?
    )
}

pub async fn room(db_pool: &SqlitePool, room_id: i64) -> AppResult<RoomSummary> {
    let sql = format!("{ROOM_SELECT} WHERE r.id=?");
    Ok(
        sqlx::query_as(&sql)
            .bind(room_id)
            .fetch_one(db_pool)
            .await?
    )
}

pub async fn rooms_hosted_by(db_pool: &SqlitePool, user_id: i64) -> AppResult<Vec<RoomSummary>> {
    let sql = format!("{ROOM_SELECT} WHERE r.host_id=? ORDER BY julianday(r.updated) DESC, r.id DESC");
    Ok(
        sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(db_pool)
            .await?
    )
}

pub async fn participants(db_pool: &SqlitePool, room_id: i64) -> AppResult<Vec<User>> {
    Ok(
        sqlx::query_as(
            "SELECT u.* FROM users u JOIN room_participants p ON p.user_id = u.id WHERE p.room_id=? ORDER BY u.username"
        )
            .bind(room_id)
            .fetch_all(db_pool)
            .await?
    )
}

/// Topics whose name contains `q`, alphabetically, with how many rooms use each.
pub async fn topics(db_pool: &SqlitePool, q: &str) -> AppResult<Vec<TopicSummary>> {
    Ok(
        sqlx::query_as(
            r#"SELECT t.id, t.name, COUNT(r.id) AS room_count
            FROM topics t
            LEFT JOIN rooms r ON r.topic_id = t.id
            WHERE t.name LIKE ? ESCAPE '\'
            GROUP BY t.id, t.name
            ORDER BY t.name"#
        )
            .bind(like_pattern(q))
            .fetch_all(db_pool)
            .await?
    )
}

pub async fn topic_names(db_pool: &SqlitePool) -> AppResult<Vec<String>> {
    let names: Vec<(String,)> = sqlx::query_as("SELECT name FROM topics ORDER BY name")
        .fetch_all(db_pool)
        .await?;
    Ok(names.into_iter().map(|(name,)| name).collect())
}

/// Returns the id of the topic called `name`, creating it first if needed.
///
/// The insert is a no-op when the name already exists, so concurrent callers
/// converge on the same row through the unique constraint.
pub async fn get_or_create_topic(db_pool: &SqlitePool, name: &str) -> AppResult<i64> {
    sqlx::query("INSERT INTO topics (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .execute(db_pool)
        .await?;

    let (id,): (i64,) = sqlx::query_as("SELECT id FROM topics WHERE name=?")
        .bind(name)
        .fetch_one(db_pool)
        .await?;
    Ok(id)
}

/// Newest messages in rooms whose topic contains `q`.
pub async fn recent_messages(db_pool: &SqlitePool, q: &str) -> AppResult<Vec<MessageEntry>> {
    let sql = format!(
        r#"{MESSAGE_SELECT}
        JOIN topics t ON t.id = r.topic_id
        WHERE t.name LIKE ? ESCAPE '\'
        ORDER BY m.id DESC"#
    );
    Ok(
        sqlx::query_as(&sql)
            .bind(like_pattern(q))
            .fetch_all(db_pool)
            .await?
    )
}

pub async fn room_messages(db_pool: &SqlitePool, room_id: i64) -> AppResult<Vec<MessageEntry>> {
    let sql = format!("{MESSAGE_SELECT} WHERE m.room_id=? ORDER BY m.id DESC");
    Ok(
        sqlx::query_as(&sql)
            .bind(room_id)
            .fetch_all(db_pool)
            .await?
    )
}

pub async fn messages_by(db_pool: &SqlitePool, user_id: i64) -> AppResult<Vec<MessageEntry>> {
    let sql = format!("{MESSAGE_SELECT} WHERE m.user_id=? ORDER BY m.id DESC");
    Ok(
        sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(db_pool)
            .await?
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(""), "%%");
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%_\\"), "%100\\%\\_\\\\%");
    }

    #[tokio::test]
    async fn same_topic_name_yields_one_row() {
        let db_pool = testing::test_pool().await;

        let first = get_or_create_topic(&db_pool, "Python").await.unwrap();
        let second = get_or_create_topic(&db_pool, "Python").await.unwrap();
        assert_eq!(first, second);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM topics")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creators_share_one_topic() {
        let (db_pool, path) = testing::file_pool().await;

        let (a, b, c, d) = tokio::join!(
            get_or_create_topic(&db_pool, "Elixir"),
            get_or_create_topic(&db_pool, "Elixir"),
            get_or_create_topic(&db_pool, "Elixir"),
            get_or_create_topic(&db_pool, "Elixir"),
        );
        let ids = [a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap()];
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(testing::count(&db_pool, "SELECT COUNT(*) FROM topics").await, 1);

        db_pool.close().await;
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn empty_query_returns_every_room() {
        let db_pool = testing::test_pool().await;
        let host = testing::insert_user(&db_pool, "host").await;
        testing::insert_room(&db_pool, host, "Python", "Beginners", "").await;
        testing::insert_room(&db_pool, host, "Rust", "Lifetimes", "borrowck questions").await;
        testing::insert_room(&db_pool, host, "Go", "Gophers", "").await;

        let rooms = search_rooms(&db_pool, "").await.unwrap();
        assert_eq!(rooms.len(), 3);
    }

    #[tokio::test]
    async fn topic_query_returns_rooms_under_that_topic() {
        let db_pool = testing::test_pool().await;
        let host = testing::insert_user(&db_pool, "host").await;
        testing::insert_room(&db_pool, host, "Python", "Beginners", "").await;
        testing::insert_room(&db_pool, host, "Python", "Django help", "").await;
        testing::insert_room(&db_pool, host, "Rust", "Lifetimes", "").await;

        let rooms = search_rooms(&db_pool, "python").await.unwrap();
        assert_eq!(rooms.len(), 2);
        assert!(rooms.iter().all(|room| room.topic_name == "Python"));
    }

    #[tokio::test]
    async fn search_matches_name_or_description() {
        let db_pool = testing::test_pool().await;
        let host = testing::insert_user(&db_pool, "host").await;
        testing::insert_room(&db_pool, host, "Rust", "Lifetimes", "").await;
        testing::insert_room(&db_pool, host, "Go", "Gophers", "talk about LIFETIMES of goroutines").await;
        testing::insert_room(&db_pool, host, "Python", "Beginners", "").await;

        let rooms = search_rooms(&db_pool, "lifetimes").await.unwrap();
        assert_eq!(rooms.len(), 2);
    }

    #[tokio::test]
    async fn percent_in_query_is_literal() {
        let db_pool = testing::test_pool().await;
        let host = testing::insert_user(&db_pool, "host").await;
        testing::insert_room(&db_pool, host, "Stats", "100% coverage", "").await;
        testing::insert_room(&db_pool, host, "Stats", "Other", "").await;

        let rooms = search_rooms(&db_pool, "%").await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, "100% coverage");
    }

    #[tokio::test]
    async fn topics_carry_room_counts() {
        let db_pool = testing::test_pool().await;
        let host = testing::insert_user(&db_pool, "host").await;
        testing::insert_room(&db_pool, host, "Python", "One", "").await;
        testing::insert_room(&db_pool, host, "Python", "Two", "").await;
        get_or_create_topic(&db_pool, "Empty").await.unwrap();

        let topics = topics(&db_pool, "").await.unwrap();
        let counts: Vec<(&str, i64)> = topics.iter().map(|t| (t.name.as_str(), t.room_count)).collect();
        assert_eq!(counts, vec![("Empty", 0), ("Python", 2)]);
    }
}
