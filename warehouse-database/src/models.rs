use diesel::prelude::*;

use crate::schema::{journals, packages};

/// A row of `packages` once `last_serial` has been denormalized onto it.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = packages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Project {
    pub name: String,
    pub last_serial: i32,
}

#[derive(Insertable)]
#[diesel(table_name = journals)]
pub struct NewJournalEntry<'a> {
    pub name: &'a str,
    pub version: Option<&'a str>,
    pub action: &'a str,
}
