use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

pub mod models;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct DBService {
    pub pool: PgPool,
}

impl DBService {
    /// Build a pool that opens connections on first use. Only the URL is validated here.
    pub fn connect_lazy(database_url: &str) -> Result<DBService, sqlx::Error> {
        let pool = Self::pool_options().connect_lazy(database_url)?;
        Ok(DBService { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    fn pool_options() -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(ACQUIRE_TIMEOUT)
    }
}
