use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::serialize_date;
use crate::models::user::Profile;
use crate::schema::articles;

const SUFFIX_LEN: usize = 7;
const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Queryable, QueryableByName, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = articles)]
pub struct Article {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub favorites_count: i32,
    pub author_id: i64,
    pub version: i32,
}

impl Article {
    pub fn attach(self, author: Profile, favorited: bool) -> ArticleJson {
        ArticleJson {
            id: self.id,
            slug: self.slug,
            title: self.title,
            description: self.description,
            body: Some(self.body),
            tag_list: self.tag_list,
            created_at: self.created_at,
            updated_at: self.updated_at,
            favorites_count: self.favorites_count,
            favorited,
            author,
            author_id: self.author_id,
            version: self.version,
        }
    }
}

/// An article row as listed: everything but the body.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = articles)]
pub struct ArticleSummary {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub tag_list: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub favorites_count: i32,
    pub author_id: i64,
    pub version: i32,
}

impl ArticleSummary {
    pub fn attach(self, author: Profile, favorited: bool) -> ArticleJson {
        ArticleJson {
            id: self.id,
            slug: self.slug,
            title: self.title,
            description: self.description,
            body: None,
            tag_list: self.tag_list,
            created_at: self.created_at,
            updated_at: self.updated_at,
            favorites_count: self.favorites_count,
            favorited,
            author,
            author_id: self.author_id,
            version: self.version,
        }
    }
}

/// An article annotated with the signals of the viewer it was loaded for.
///
/// `body` is `None` on list rows; only single-article reads carry it.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ArticleJson {
    #[serde(skip)]
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub tag_list: Vec<String>,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: DateTime<Utc>,
    pub favorites_count: i32,
    pub favorited: bool,
    pub author: Profile,
    #[serde(skip)]
    pub author_id: i64,
    #[serde(skip)]
    pub version: i32,
}

/// Fields an author may change on an existing article.
#[derive(Deserialize, Default, Clone, Debug)]
pub struct UpdateArticleData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

impl ArticleJson {
    /// Applies an edit in memory. A new title re-derives the slug; the old one
    /// is never reused. `version` is left alone so the write can detect races.
    pub fn apply(&mut self, data: UpdateArticleData) {
        if let Some(title) = data.title {
            self.slug = slugify(&title);
            self.title = title;
        }
        if let Some(description) = data.description {
            self.description = description;
        }
        if let Some(body) = data.body {
            self.body = Some(body);
        }
    }
}

/// Data needed to publish a new article.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewArticleData {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

pub(crate) fn slugify(title: &str) -> String {
    format!("{}-{}", slug::slugify(title), generate_suffix(SUFFIX_LEN))
}

fn generate_suffix(len: usize) -> String {
    // ThreadRng is a CSPRNG reseeded from the OS.
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect()
}

/// Sorted, deduplicated copy of a tag list.
pub(crate) fn canonical_tags(tags: &[String]) -> Vec<String> {
    let mut tags = tags.to_vec();
    tags.sort();
    tags.dedup();
    tags
}
