use diesel::pg::PgConnection;
use diesel::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::schema::tags;

/// Adds every tag not yet known. Existing tags are left alone, never an error.
pub fn register_all(conn: &mut PgConnection, tag_list: &[String]) -> Result<()> {
    if tag_list.is_empty() {
        return Ok(());
    }

    let rows: Vec<_> = tag_list.iter().map(|tag| tags::tag.eq(tag)).collect();
    let inserted = diesel::insert_into(tags::table)
        .values(&rows)
        .on_conflict(tags::tag)
        .do_nothing()
        .execute(conn)?;
    debug!(requested = tag_list.len(), inserted, "registered tags");
    Ok(())
}

/// Every registered tag in lexicographic order.
pub fn all(conn: &mut PgConnection) -> Result<Vec<String>> {
    let tags = tags::table
        .select(tags::tag)
        .order(tags::tag.asc())
        .load::<String>(conn)?;
    Ok(tags)
}
