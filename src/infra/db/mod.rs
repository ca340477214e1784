//! Postgres-backed repository implementations.

mod posts;
mod ranking;
mod util;

pub use ranking::PostgresRanking;
pub use util::map_sqlx_error;

use std::sync::Arc;
use std::time::Duration;

use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::config::DatabaseSettings;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Visit ranking stored in the same database as the posts.
    pub fn ranking(&self) -> PostgresRanking {
        PostgresRanking::new(PgPool::clone(&self.pool))
    }

    pub async fn connect(
        url: &str,
        max_connections: u32,
        max_lifetime: Duration,
    ) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .max_lifetime(max_lifetime)
            .connect(url)
            .await
    }

    pub async fn connect_with(settings: &DatabaseSettings, url: &str) -> Result<PgPool, sqlx::Error> {
        Self::connect(
            url,
            settings.max_connections.get(),
            settings.connection_max_lifetime,
        )
        .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }
}
