use serde::Serialize;

use crate::schema::users;

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = users)]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub bio: String,
    pub image: String,
    #[serde(skip)]
    pub version: i32,
}

/// Public projection of a user as seen by some viewer.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub username: String,
    pub bio: String,
    pub image: String,
    pub following: bool,
}

impl User {
    pub fn to_profile(&self, following: bool) -> Profile {
        Profile {
            username: self.username.clone(),
            bio: self.bio.clone(),
            image: self.image.clone(),
            following,
        }
    }
}

/// Author columns joined onto article rows.
#[derive(Queryable, QueryableByName, Selectable, Debug, Clone)]
#[diesel(table_name = users)]
pub struct Author {
    pub username: String,
    pub bio: String,
    pub image: String,
}

impl Author {
    pub fn into_profile(self, following: bool) -> Profile {
        Profile {
            username: self.username,
            bio: self.bio,
            image: self.image,
            following,
        }
    }
}

/// The already-authenticated identity an operation runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    User(User),
}

impl Viewer {
    pub fn id(&self) -> Option<i64> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(user) => Some(user.id),
        }
    }

    /// True when the viewer is the given user.
    pub fn is(&self, user_id: i64) -> bool {
        self.id() == Some(user_id)
    }
}

impl From<User> for Viewer {
    fn from(user: User) -> Viewer {
        Viewer::User(user)
    }
}
