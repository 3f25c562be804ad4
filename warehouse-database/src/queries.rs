use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::error::DatabaseError;
use crate::models::{NewJournalEntry, Project};
use crate::schema::{journals, packages};

pub async fn find_project(
    connection: &mut AsyncPgConnection,
    name: &str,
) -> Result<Option<Project>, DatabaseError> {
    Ok(packages::table
        .filter(packages::name.eq(name))
        .select(Project::as_select())
        .first::<Project>(connection)
        .await
        .optional()?)
}

/// Appends a journal entry and returns its serial.
pub async fn record_journal_entry(
    connection: &mut AsyncPgConnection,
    entry: &NewJournalEntry<'_>,
) -> Result<i32, DatabaseError> {
    Ok(diesel::insert_into(journals::table)
        .values(entry)
        .returning(journals::id)
        .get_result::<i32>(connection)
        .await?)
}

pub async fn rename_journal_entry(
    connection: &mut AsyncPgConnection,
    id: i32,
    name: &str,
) -> Result<usize, DatabaseError> {
    Ok(diesel::update(journals::table.find(id))
        .set(journals::name.eq(name))
        .execute(connection)
        .await?)
}

pub async fn delete_journal_entry(
    connection: &mut AsyncPgConnection,
    id: i32,
) -> Result<usize, DatabaseError> {
    Ok(diesel::delete(journals::table.find(id))
        .execute(connection)
        .await?)
}

/// The highest serial in `journals` for `name`, computed from the history
/// itself rather than the denormalized column.
pub async fn latest_journal_serial(
    connection: &mut AsyncPgConnection,
    name: &str,
) -> Result<Option<i32>, DatabaseError> {
    Ok(journals::table
        .filter(journals::name.eq(name))
        .select(diesel::dsl::max(journals::id))
        .first::<Option<i32>>(connection)
        .await?)
}
