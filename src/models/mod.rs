pub mod article;
pub mod comment;
pub mod user;

use chrono::{DateTime, Utc};
use serde::Serializer;

use crate::config::DATE_FORMAT;

pub(crate) fn serialize_date<S: Serializer>(
    date: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format(DATE_FORMAT))
}
