pub mod articles;
pub mod comments;
pub mod listing;
pub mod profiles;
pub mod tags;
pub mod users;

use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use tracing::debug;

use crate::config::Config;
use crate::error::Result;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<PgConnection>>;

/// Caps every statement run on a pooled connection, so a slow backend fails
/// the operation instead of holding the worker.
#[derive(Debug, Clone, Copy)]
struct StatementTimeout(Duration);

impl CustomizeConnection<PgConnection, r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!("SET statement_timeout = {}", self.0.as_millis()))
            .map_err(r2d2::Error::QueryError)
    }
}

/// Builds the bounded connection pool. Acquisition waits at most
/// `config.timeout`, and so does any single statement.
pub fn pool(config: &Config) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(config.timeout)
        .connection_customizer(Box::new(StatementTimeout(config.timeout)))
        .build(manager)?;
    debug!(
        max_size = config.pool_size,
        timeout_ms = config.timeout.as_millis() as u64,
        "database pool ready"
    );
    Ok(pool)
}

pub fn connection(pool: &DbPool) -> Result<DbConn> {
    Ok(pool.get()?)
}
