use std::collections::BTreeSet;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::database::{articles, profiles};
use crate::error::{Error, Result};
use crate::models::comment::{Comment, CommentJson};
use crate::models::user::{Author, User};
use crate::schema::{comments, users};

#[derive(Insertable)]
#[diesel(table_name = comments)]
struct NewComment<'a> {
    body: &'a str,
    article_id: i64,
    author_id: i64,
}

/// Comments on the article behind `slug`; `NotFound` if there is none, also
/// when it is deleted between the lookup and the insert. The author
/// projection comes from `author` as given, with `following` false.
pub fn create(conn: &mut PgConnection, author: &User, slug: &str, body: &str) -> Result<CommentJson> {
    let article_id = articles::id_by_slug(conn, slug)?;
    let new_comment = &NewComment {
        body,
        article_id,
        author_id: author.id,
    };

    let comment = diesel::insert_into(comments::table)
        .values(new_comment)
        .returning(Comment::as_returning())
        .get_result::<Comment>(conn)
        .map_err(parent_gone)?;
    debug!(comment_id = comment.id, article_id, author_id = author.id, "created comment");
    Ok(comment.attach(author.to_profile(false)))
}

fn parent_gone(err: DieselError) -> Error {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => Error::NotFound,
        err => Error::from(err),
    }
}

/// Comments on an article, newest first. Every `following` is false; see
/// [`set_following_status`] to fill it in for a viewer.
pub fn find_by_article(conn: &mut PgConnection, article_id: i64) -> Result<Vec<CommentJson>> {
    let comments = comments::table
        .inner_join(users::table)
        .filter(comments::article_id.eq(article_id))
        .order((comments::created_at.desc(), comments::id.desc()))
        .select((Comment::as_select(), Author::as_select()))
        .load::<(Comment, Author)>(conn)?
        .into_iter()
        .map(|(comment, author)| comment.attach(author.into_profile(false)))
        .collect();
    Ok(comments)
}

/// Sets `author.following` on every comment with a single membership query
/// over the distinct authors. The viewer's own comments stay false.
pub fn set_following_status(
    conn: &mut PgConnection,
    comments: &mut [CommentJson],
    viewer_id: i64,
) -> Result<()> {
    let authors: Vec<i64> = comments
        .iter()
        .map(|comment| comment.author_id)
        .filter(|&author_id| author_id != viewer_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let followed = profiles::following_among(conn, viewer_id, &authors)?;
    for comment in comments.iter_mut() {
        comment.author.following = followed.contains(&comment.author_id);
    }
    Ok(())
}
