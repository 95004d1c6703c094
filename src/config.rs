use std::{fmt::Display, path::PathBuf, str::FromStr};

use anyhow::anyhow;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Directory uploaded avatars are written to and served from under `/media`.
    pub media_dir: PathBuf,
    pub session_minutes: i64,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            port: try_load("PORT", "8080")?,
            database_url: try_load("DATABASE_URL", "sqlite://discuss.db")?,
            media_dir: try_load("MEDIA_DIR", "media")?,
            session_minutes: try_load("SESSION_MINUTES", "60")?,
            bcrypt_cost: try_load("BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let value = dotenv::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse(key, &value)
}

fn parse<T: FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value {value:?}: {e}"))
}
