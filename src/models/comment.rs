use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::serialize_date;
use crate::models::user::Profile;
use crate::schema::comments;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub article_id: i64,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn attach(self, author: Profile) -> CommentJson {
        CommentJson {
            id: self.id,
            body: self.body,
            created_at: self.created_at,
            updated_at: self.updated_at,
            author,
            article_id: self.article_id,
            author_id: self.author_id,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommentJson {
    pub id: i64,
    pub body: String,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: DateTime<Utc>,
    pub author: Profile,
    #[serde(skip)]
    pub article_id: i64,
    #[serde(skip)]
    pub author_id: i64,
}
