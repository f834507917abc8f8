use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Deserialize;
use tracing::debug;

use crate::cache::UserCache;
use crate::error::Result;
use crate::models::user::User;
use crate::schema::users;

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    /// Already hashed by the caller.
    pub password_hash: &'a str,
}

/// Fails with `DuplicateUnique` naming the email or username on a clash.
pub fn create(conn: &mut PgConnection, new_user: &NewUser) -> Result<User> {
    let user = diesel::insert_into(users::table)
        .values(new_user)
        .returning(User::as_returning())
        .get_result::<User>(conn)?;
    debug!(user_id = user.id, "created user");
    Ok(user)
}

pub fn find_by_email(conn: &mut PgConnection, email: &str) -> Result<User> {
    let user = users::table
        .filter(users::email.eq(email))
        .select(User::as_select())
        .first(conn)?;
    Ok(user)
}

pub fn find_by_username(conn: &mut PgConnection, username: &str) -> Result<User> {
    let user = users::table
        .filter(users::username.eq(username))
        .select(User::as_select())
        .first(conn)?;
    Ok(user)
}

/// The identity-resolution path: served from the cache when possible,
/// otherwise loaded and cached. A row loaded while [`update`] ran is returned
/// but not cached.
pub fn find_by_id(conn: &mut PgConnection, cache: &UserCache, id: i64) -> Result<User> {
    if let Some(user) = cache.get(id) {
        return Ok(user);
    }

    let generation = cache.generation(id);
    let user = users::table
        .find(id)
        .select(User::as_select())
        .first(conn)?;
    cache.set_if_unchanged(id, generation, &user);
    Ok(user)
}

#[derive(Deserialize, AsChangeset, Default, Clone, Debug)]
#[diesel(table_name = users)]
pub struct UpdateUserData {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

/// Applies the given fields, bumps the version and drops the cached copy so
/// the next lookup reads the new row.
pub fn update(
    conn: &mut PgConnection,
    cache: &UserCache,
    id: i64,
    data: &UpdateUserData,
) -> Result<User> {
    let user = diesel::update(users::table.find(id))
        .set((data, users::version.eq(users::version + 1)))
        .returning(User::as_returning())
        .get_result::<User>(conn)?;
    cache.delete(id);
    debug!(user_id = id, version = user.version, "updated user");
    Ok(user)
}
