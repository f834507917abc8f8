//! Persistence core of a RealWorld ("Conduit") backend on PostgreSQL.
//!
//! Operations live in [`database`], one module per aggregate, as free
//! functions over a `&mut PgConnection` taken from [`database::pool`]. None of
//! them lock in-process: every read-modify-write is a single conditional
//! statement, so the pool is the only point of contention.
//!
//! ```no_run
//! use conduit_store::{cache::UserCache, config::Config, database, models::user::Viewer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let pool = database::pool(&config)?;
//! let cache = UserCache::new(config.user_cache_ttl, config.user_cache_sweep_interval);
//!
//! let mut conn = database::connection(&pool)?;
//! let viewer = Viewer::from(database::users::find_by_id(&mut conn, &cache, 1)?);
//! let (articles, total) = database::articles::find(&mut conn, &Default::default(), &viewer)?;
//! # let _ = (articles, total);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate diesel;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod schema;

pub use error::{Error, Result, StorageError, UniqueField};
