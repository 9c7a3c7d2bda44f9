use anyhow::Result;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

use crate::util::env::env_flag;

/// One connection streams the source cursor while writes need another.
pub const MIN_CONNECTIONS: u32 = 2;

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let use_prepared = env_flag("USE_PREPARED", false);
        let mut connect_options = PgConnectOptions::from_str(database_url)?;

        if database_url.contains("sslmode=require") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }
        if !use_prepared {
            // PgBouncer txn mode safe
            connect_options = connect_options.statement_cache_capacity(0);
        }

        let max_connections = max_connections.max(MIN_CONNECTIONS);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!(max_connections, "connected to db");
        Ok(Self { pool })
    }

    /// Row count of an arbitrary SELECT, used to seed progress totals.
    pub async fn count_query_rows(&self, query: &str) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(&count_sql(query))
            .persistent(false)
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}

fn count_sql(query: &str) -> String {
    format!(
        "SELECT COUNT(*)::BIGINT FROM ({}) AS q",
        query.trim().trim_end_matches(';').trim_end()
    )
}
