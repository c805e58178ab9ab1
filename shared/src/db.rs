//! Database connection management.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::secrets::{get_database_credentials, DatabaseCredentials};
use crate::{Config, Error, Result};

/// Create a database connection pool.
pub async fn create_pool(config: &Config, credentials: &DatabaseCredentials) -> Result<PgPool> {
    let host = credentials.host.as_deref().unwrap_or(&config.db_host);
    let port = credentials.port.unwrap_or(5432);
    let db_name = credentials.dbname.as_deref().unwrap_or(&config.db_name);

    let database_url = format!(
        "postgres://{}:{}@{}:{}/{}",
        credentials.username, credentials.password, host, port, db_name
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&database_url)
        .await
        .map_err(Error::Database)?;

    Ok(pool)
}

/// Resolve credentials from Secrets Manager and open a pool.
///
/// This is what every Lambda calls once during cold start.
pub async fn connect(config: &Config) -> Result<PgPool> {
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws_region.clone()))
        .load()
        .await;
    let secrets_client = aws_sdk_secretsmanager::Client::new(&aws_config);

    let credentials = get_database_credentials(&secrets_client, &config.db_secret_arn).await?;
    let pool = create_pool(config, &credentials).await?;

    info!(db_host = %config.db_host, db_name = %config.db_name, "Database pool ready");
    Ok(pool)
}
