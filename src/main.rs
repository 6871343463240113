mod bot;
mod config;
mod content;
mod dispatch;
mod error;
mod line;
mod models;
mod quiz;
mod render;
mod sampler;
mod security;
mod user_state;
mod webhook;

use crate::bot::ChatBot;
use crate::config::Config;
use crate::content::ContentStore;
use crate::line::LineClient;
use crate::sampler::{Sampler, UsageCursors};
use crate::webhook::AppState;
use dotenv::dotenv;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(840);

#[tokio::main]
async fn main() -> Result<(), Box<dyn StdError>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sahra_bot=info")),
        )
        .init();

    // Missing credentials stop the process before anything is served.
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    let content = Arc::new(ContentStore::load(&config.content_dir));
    let sampler = Sampler::new(Arc::new(UsageCursors::default()));
    let bot = Arc::new(ChatBot::new(content, sampler, config.session_ttl_secs));

    let state = AppState {
        bot: Arc::clone(&bot),
        line: Arc::new(LineClient::new(
            &config.channel_access_token,
            &config.line_api_base,
        )),
        channel_secret: Arc::from(config.channel_secret.as_str()),
    };

    tokio::spawn(sweep_expired(
        bot,
        Duration::from_secs(config.sweep_interval_secs.max(1)),
    ));
    if let Some(url) = config.keep_alive_url.clone() {
        tokio::spawn(keep_alive(url));
    }

    let app = webhook::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Sahra bot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn sweep_expired(bot: Arc<ChatBot>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        bot.purge_expired();
    }
}

/// Keeps free-tier hosts from idling the process out.
async fn keep_alive(base_url: String) {
    let client = reqwest::Client::new();
    let url = format!("{}/health", base_url);
    info!("Keep-alive pinging {} every {:?}", url, KEEP_ALIVE_INTERVAL);
    loop {
        if let Err(e) = client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            warn!("Keep-alive ping failed: {}", e);
        }
        tokio::time::sleep(KEEP_ALIVE_INTERVAL).await;
    }
}
