use crate::config::DatabaseConfig;
use anyhow::{Context, Result};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPoolOptions};
use sqlx::{Connection, MySqlPool};
use std::time::Duration;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub fn connect_options(cfg: &DatabaseConfig) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.username)
        .password(&cfg.password)
        .database(&cfg.database)
}

pub async fn make_pool(cfg: &DatabaseConfig) -> Result<MySqlPool> {
    make_pool_with_size(cfg, None).await
}

pub async fn make_pool_with_size(cfg: &DatabaseConfig, max: Option<u32>) -> Result<MySqlPool> {
    cfg.validate()?;
    // lookups run one row at a time, a couple of connections is plenty
    let max_conn: u32 = max
        .or_else(|| std::env::var("EXCHANGE_UNSEN_POOL_SIZE").ok().and_then(|s| s.parse().ok()))
        .filter(|&n| n > 0)
        .unwrap_or(2);
    let acquire_ms: u64 = std::env::var("EXCHANGE_UNSEN_ACQUIRE_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(10_000);

    let pool = MySqlPoolOptions::new()
        .max_connections(max_conn)
        .acquire_timeout(Duration::from_millis(acquire_ms))
        .idle_timeout(Some(Duration::from_secs(300)))
        .connect_with(connect_options(cfg))
        .await
        .with_context(|| format!("Failed to connect to MySQL at {}", cfg.display_target()))?;
    log::info!("[DB] Connected to {} (pool size {})", cfg.display_target(), max_conn);
    Ok(pool)
}

/// Opens a single connection and returns the server version.
pub async fn test_connection(cfg: &DatabaseConfig) -> Result<String> {
    cfg.validate()?;
    let opts = connect_options(cfg);
    let mut conn = tokio::time::timeout(TEST_TIMEOUT, MySqlConnection::connect_with(&opts))
        .await
        .with_context(|| format!("Timed out after {:?} connecting to {}", TEST_TIMEOUT, cfg.display_target()))?
        .with_context(|| format!("Failed to connect to {}", cfg.display_target()))?;
    let version: String = sqlx::query_scalar("SELECT CAST(VERSION() AS CHAR)")
        .fetch_one(&mut conn)
        .await
        .context("SELECT VERSION() failed")?;
    conn.close().await.ok();
    Ok(version)
}

/// Connection state shared by the GUI and CLI. Holds at most one pool.
#[derive(Debug, Default)]
pub struct MySqlSession {
    pool: Option<MySqlPool>,
    target: Option<String>,
}

impl MySqlSession {
    pub fn new() -> Self { Self::default() }

    /// Reuses the open pool when already connected.
    pub async fn connect(&mut self, cfg: &DatabaseConfig) -> Result<&MySqlPool> {
        let target = cfg.display_target();
        let reuse = self.pool.as_ref().map(|p| !p.is_closed()).unwrap_or(false) && self.target.as_deref() == Some(target.as_str());
        if !reuse {
            self.disconnect().await;
            let pool = make_pool(cfg).await?;
            self.pool = Some(pool);
            self.target = Some(target);
        }
        self.pool.as_ref().context("pool missing after connect")
    }

    pub async fn disconnect(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            log::info!("[DB] Disconnected from {}", self.target.as_deref().unwrap_or("?"));
        }
        self.target = None;
    }

    pub fn is_connected(&self) -> bool {
        self.pool.as_ref().map(|p| !p.is_closed()).unwrap_or(false)
    }

    pub fn pool(&self) -> Option<&MySqlPool> { self.pool.as_ref() }

    pub fn target(&self) -> Option<&str> { self.target.as_deref() }
}
