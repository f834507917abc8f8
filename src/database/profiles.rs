use std::collections::HashSet;

use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::select;
use tracing::debug;

use crate::database::users;
use crate::error::{Error, Result};
use crate::models::user::{Profile, Viewer};
use crate::schema::follows;

/// Records that `follower_id` follows `followed_id`. Following twice is a no-op.
pub fn follow_user(conn: &mut PgConnection, follower_id: i64, followed_id: i64) -> Result<()> {
    if follower_id == followed_id {
        return Err(Error::SelfFollowNotAllowed);
    }

    let inserted = diesel::insert_into(follows::table)
        .values((
            follows::follower_id.eq(follower_id),
            follows::followed_id.eq(followed_id),
        ))
        .on_conflict_do_nothing()
        .execute(conn)?;
    debug!(follower_id, followed_id, changed = inserted > 0, "follow");
    Ok(())
}

/// Removes the edge if present; a missing edge (self included) is not an error.
pub fn unfollow_user(conn: &mut PgConnection, follower_id: i64, followed_id: i64) -> Result<()> {
    let deleted = diesel::delete(follows::table.find((follower_id, followed_id))).execute(conn)?;
    debug!(follower_id, followed_id, changed = deleted > 0, "unfollow");
    Ok(())
}

pub fn is_following(conn: &mut PgConnection, follower_id: i64, followed_id: i64) -> Result<bool> {
    let following = select(exists(follows::table.find((follower_id, followed_id)))).get_result(conn)?;
    Ok(following)
}

/// Which of `candidates` the follower follows, resolved with one query.
pub fn following_among(
    conn: &mut PgConnection,
    follower_id: i64,
    candidates: &[i64],
) -> Result<HashSet<i64>> {
    if candidates.is_empty() {
        return Ok(HashSet::new());
    }

    let followed = follows::table
        .select(follows::followed_id)
        .filter(follows::follower_id.eq(follower_id))
        .filter(follows::followed_id.eq_any(candidates))
        .load::<i64>(conn)?;
    Ok(followed.into_iter().collect())
}

/// The viewer's view of `username`. Nobody follows themselves and the
/// anonymous viewer follows nobody.
pub fn find(conn: &mut PgConnection, username: &str, viewer: &Viewer) -> Result<Profile> {
    let user = users::find_by_username(conn, username)?;
    let following = match viewer.id() {
        Some(viewer_id) if !viewer.is(user.id) => is_following(conn, viewer_id, user.id)?,
        _ => false,
    };
    Ok(user.to_profile(following))
}

pub fn follow(conn: &mut PgConnection, username: &str, follower_id: i64) -> Result<Profile> {
    let followed = users::find_by_username(conn, username)?;
    follow_user(conn, follower_id, followed.id)?;
    Ok(followed.to_profile(true))
}

pub fn unfollow(conn: &mut PgConnection, username: &str, follower_id: i64) -> Result<Profile> {
    let followed = users::find_by_username(conn, username)?;
    unfollow_user(conn, follower_id, followed.id)?;
    Ok(followed.to_profile(false))
}
