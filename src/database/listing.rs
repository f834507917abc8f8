//! Filtered, paginated article listings and the follow feed.
//!
//! Filters are first turned into an ordered list of [`Predicate`]s, each one
//! carrying its own bound parameter; the query is then composed from that list.
//! The anonymous feed short-circuits before any SQL is issued.

use diesel::dsl::sql;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Bool, Text};
use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::models::article::{ArticleJson, ArticleSummary};
use crate::models::user::{Author, Viewer};
use crate::schema::{articles, favorites, follows, users};

const DEFAULT_LIMIT: i64 = 20;

/// Never matches a real user id, so viewer-scoped joins stay empty for anonymous readers.
const NO_VIEWER: i64 = -1;

#[derive(Deserialize, Default, Clone, Debug)]
pub struct FindArticles {
    pub tag: Option<String>,
    pub author: Option<String>,
    /// favorited by user
    pub favorited: Option<String>,
    /// only authors the viewer follows
    #[serde(default)]
    pub feed: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Predicate {
    FollowedBy(i64),
    Tagged(String),
    AuthoredBy(String),
    FavoritedBy(String),
}

/// Translates the filters into predicates, or `None` when the answer is known
/// to be empty without asking the database.
pub(crate) fn predicates(params: &FindArticles, viewer: &Viewer) -> Option<Vec<Predicate>> {
    let mut predicates = Vec::new();
    if params.feed {
        predicates.push(Predicate::FollowedBy(viewer.id()?));
    }
    if let Some(ref tag) = params.tag {
        predicates.push(Predicate::Tagged(tag.clone()));
    }
    if let Some(ref author) = params.author {
        predicates.push(Predicate::AuthoredBy(author.clone()));
    }
    if let Some(ref favorited) = params.favorited {
        predicates.push(Predicate::FavoritedBy(favorited.clone()));
    }
    Some(predicates)
}

type ListRow = (ArticleSummary, Author, bool, bool, i64);

/// Lists articles newest first (ties broken by id, newest first) and returns
/// the page together with the size of the whole filtered set. Rows carry no
/// body. Each row's `favorited`/`following` are the viewer's; `following` is
/// always false on the viewer's own articles.
pub fn find(
    conn: &mut PgConnection,
    params: &FindArticles,
    viewer: &Viewer,
) -> Result<(Vec<ArticleJson>, i64)> {
    let Some(predicates) = predicates(params, viewer) else {
        debug!("anonymous feed requested, nothing to list");
        return Ok((Vec::new(), 0));
    };

    let viewer_id = viewer.id().unwrap_or(NO_VIEWER);
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let rows = load_page(conn, &predicates, viewer_id, limit, offset)?;
    let total = match rows.first() {
        Some(row) => row.4,
        // Past the last page the window count has no row to ride on.
        None if offset > 0 => load_page(conn, &predicates, viewer_id, 1, 0)?
            .first()
            .map(|row| row.4)
            .unwrap_or(0),
        None => 0,
    };

    let articles = rows
        .into_iter()
        .map(|(article, author, favorited, following, _total)| {
            let following = following && !viewer.is(article.author_id);
            article.attach(author.into_profile(following), favorited)
        })
        .collect();
    Ok((articles, total))
}

fn load_page(
    conn: &mut PgConnection,
    predicates: &[Predicate],
    viewer_id: i64,
    limit: i64,
    offset: i64,
) -> QueryResult<Vec<ListRow>> {
    let mut query = articles::table
        .inner_join(users::table)
        .left_join(
            favorites::table.on(favorites::article_id
                .eq(articles::id)
                .and(favorites::user_id.eq(viewer_id))),
        )
        .left_join(
            follows::table.on(follows::followed_id
                .eq(articles::author_id)
                .and(follows::follower_id.eq(viewer_id))),
        )
        .select((
            ArticleSummary::as_select(),
            Author::as_select(),
            favorites::user_id.nullable().is_not_null(),
            follows::follower_id.nullable().is_not_null(),
            sql::<BigInt>("COUNT(*) OVER ()"),
        ))
        .into_boxed();

    for predicate in predicates {
        query = match predicate {
            Predicate::FollowedBy(follower_id) => query.filter(
                sql::<Bool>(
                    "EXISTS (SELECT 1 FROM follows feed \
                     WHERE feed.followed_id = articles.author_id AND feed.follower_id = ",
                )
                .bind::<BigInt, _>(*follower_id)
                .sql(")"),
            ),
            Predicate::Tagged(tag) => query.filter(articles::tag_list.contains(vec![tag.clone()])),
            Predicate::AuthoredBy(username) => query.filter(users::username.eq(username.clone())),
            Predicate::FavoritedBy(username) => query.filter(
                sql::<Bool>(
                    "EXISTS (SELECT 1 FROM favorites fav \
                     JOIN users fav_user ON fav_user.id = fav.user_id \
                     WHERE fav.article_id = articles.id AND fav_user.username = ",
                )
                .bind::<Text, _>(username.clone())
                .sql(")"),
            ),
        };
    }

    query
        .order((articles::created_at.desc(), articles::id.desc()))
        .limit(limit)
        .offset(offset)
        .load::<ListRow>(conn)
}
