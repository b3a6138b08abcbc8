use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::str::FromStr;
use std::time::Duration;

use crate::config::VectorConfig;

pub async fn connect(config: &VectorConfig) -> Result<PgPool> {
    let sslmode = PgSslMode::from_str(&config.sslmode).unwrap_or(PgSslMode::Disable);

    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.db)
        .username(&config.user)
        .password(&config.password)
        .ssl_mode(sslmode);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    Ok(pool)
}
