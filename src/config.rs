use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

pub struct Config {
    pub channel_access_token: String,
    pub channel_secret: String,
    pub port: u16,
    pub content_dir: PathBuf,
    pub session_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub line_api_base: String,
    pub keep_alive_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let channel_access_token = required("LINE_CHANNEL_ACCESS_TOKEN")?;
        let channel_secret = required("LINE_CHANNEL_SECRET")?;

        let port = parsed("PORT", 5000)?;
        let content_dir = env::var("CONTENT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("content"));
        let session_ttl_secs = parsed("SESSION_TTL_SECS", 1800)?;
        let sweep_interval_secs = parsed("SWEEP_INTERVAL_SECS", 60)?;
        let line_api_base =
            env::var("LINE_API_BASE").unwrap_or_else(|_| "https://api.line.me".to_string());

        let keep_alive_url = keep_alive_target(
            env::var("RENDER_EXTERNAL_URL").ok(),
            env::var("REPL_SLUG").ok(),
        );

        Ok(Self {
            channel_access_token,
            channel_secret,
            port,
            content_dir,
            session_ttl_secs,
            sweep_interval_secs,
            line_api_base,
            keep_alive_url,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parsed<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Bare slugs are hosted on onrender.com.
fn keep_alive_target(external_url: Option<String>, slug: Option<String>) -> Option<String> {
    let url = external_url
        .or(slug)
        .filter(|u| !u.trim().is_empty())?;
    if url.starts_with("http") {
        Some(url.trim_end_matches('/').to_string())
    } else {
        Some(format!("https://{}.onrender.com", url))
    }
}
