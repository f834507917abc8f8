//! Shared setup for the database-backed tests.
//!
//! These tests need a scratch PostgreSQL database in `DATABASE_URL` (a `.env`
//! file works too) and are `#[ignore]`d by default:
//!
//! ```sh
//! DATABASE_URL=postgres://localhost/conduit_test cargo test -- --ignored
//! ```
//!
//! Every test works on freshly named users and tags, so they can share one
//! database and run in parallel.

#![allow(dead_code)]

use conduit_store::config::Config;
use conduit_store::database::users::{self, NewUser};
use conduit_store::database::{self, articles, DbConn, DbPool};
use conduit_store::models::article::{ArticleJson, NewArticleData};
use conduit_store::models::user::User;
use diesel::connection::SimpleConnection;
use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

const SCHEMA: &str = include_str!("../../migrations/00000000000000_conduit_schema/up.sql");

static POOL: Lazy<DbPool> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let mut config = Config::from_env().expect("DATABASE_URL must point at a scratch database");
    config.pool_size = config.pool_size.max(32);
    let pool = database::pool(&config).expect("cannot build pool");
    pool.get()
        .expect("cannot connect")
        .batch_execute(SCHEMA)
        .expect("cannot apply schema");
    pool
});

pub fn pool() -> &'static DbPool {
    &POOL
}

pub fn conn() -> DbConn {
    database::connection(pool()).expect("cannot get connection")
}

/// `prefix` plus a random lowercase suffix, unique enough to isolate tests.
pub fn unique(prefix: &str) -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("{}_{}", prefix, suffix.to_lowercase())
}

pub fn create_user(conn: &mut DbConn, prefix: &str) -> User {
    let username = unique(prefix);
    let email = format!("{}@example.com", username);
    users::create(
        conn,
        &NewUser {
            username: &username,
            email: &email,
            password_hash: "not-a-real-hash",
        },
    )
    .expect("cannot create user")
}

pub fn create_article(conn: &mut DbConn, author: &User, title: &str, tags: &[&str]) -> ArticleJson {
    articles::create(
        conn,
        author,
        &NewArticleData {
            title: title.to_owned(),
            description: format!("about {}", title),
            body: format!("all about {}", title),
            tag_list: tags.iter().map(|tag| tag.to_string()).collect(),
        },
    )
    .expect("cannot create article")
}
