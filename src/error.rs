use diesel::r2d2::PoolError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything the store can fail with.
///
/// Callers are expected to match on the kind: `NotFound`, `EditConflict` and
/// `DuplicateUnique` are user-facing outcomes, `Storage` is a generic failure.
#[derive(Debug, Error)]
pub enum Error {
    /// No matching row. Also returned on an ownership mismatch when deleting,
    /// so a non-owner cannot tell "not yours" from "does not exist".
    #[error("record not found")]
    NotFound,
    /// The optimistic version check failed; re-fetch and retry.
    #[error("edit conflict")]
    EditConflict,
    #[error("duplicate {field}")]
    DuplicateUnique { field: UniqueField },
    #[error("cannot follow yourself")]
    SelfFollowNotAllowed,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Query(#[source] DieselError),
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Which unique constraint a write tripped over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
    Slug,
    Tag,
    Other(String),
}

impl UniqueField {
    fn from_constraint(name: Option<&str>) -> Self {
        match name {
            Some("users_email_key") => UniqueField::Email,
            Some("users_username_key") => UniqueField::Username,
            Some("articles_slug_key") => UniqueField::Slug,
            Some("tags_tag_key") => UniqueField::Tag,
            Some(other) => UniqueField::Other(other.to_owned()),
            None => UniqueField::Other(String::from("unknown")),
        }
    }
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UniqueField::Email => f.write_str("email"),
            UniqueField::Username => f.write_str("username"),
            UniqueField::Slug => f.write_str("slug"),
            UniqueField::Tag => f.write_str("tag"),
            UniqueField::Other(name) => write!(f, "value for constraint `{name}`"),
        }
    }
}

impl From<DieselError> for Error {
    fn from(err: DieselError) -> Error {
        match err {
            DieselError::NotFound => Error::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Error::DuplicateUnique {
                    field: UniqueField::from_constraint(info.constraint_name()),
                }
            }
            err => Error::Storage(StorageError::Query(err)),
        }
    }
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Error {
        Error::Storage(StorageError::Pool(err))
    }
}
