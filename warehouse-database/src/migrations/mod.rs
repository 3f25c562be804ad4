//! Revision-tracked schema migrations.
//!
//! Every migration is a fixed list of SQL steps. The [`Migrator`] applies
//! pending revisions one transaction at a time and records the applied
//! revision in `alembic_version`, the same marker table the previous
//! migration tool used, so both agree on which revision the schema is at.

pub mod denormalize_serial_onto_project;

use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl, SimpleAsyncConnection};
use scoped_futures::ScopedFutureExt;
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::alembic_version;
pub use denormalize_serial_onto_project::DenormalizeSerialOntoProject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub name: &'static str,
    pub sql: &'static str,
}

pub trait Migration: Send + Sync {
    fn revision(&self) -> &'static str;

    /// The revision that must already be applied before this one.
    fn down_revision(&self) -> Option<&'static str>;

    fn upgrade(&self) -> &'static [Step];

    /// Irreversible migrations return [`MigrationError::Irreversible`].
    fn downgrade(&self) -> Result<&'static [Step], MigrationError>;
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("revision {revision} is irreversible, no downgrade path exists")]
    Irreversible { revision: &'static str },
    #[error("database is at revision {0} which no known migration builds on")]
    UnknownRevision(String),
    #[error("revision {revision} requires revision {required} to be applied first")]
    MissingPredecessor {
        revision: &'static str,
        required: &'static str,
    },
    #[error("no revision has been applied, nothing to downgrade")]
    NothingToDowngrade,
    #[error("migration query failed {0}")]
    Database(#[from] diesel::result::Error),
}

const CREATE_VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS alembic_version (
    version_num VARCHAR(32) NOT NULL,
    CONSTRAINT alembic_version_pkc PRIMARY KEY (version_num)
)";

/// Orders the migrations still to be applied on top of `current`.
pub fn plan<'m>(
    current: Option<&str>,
    migrations: &'m [Box<dyn Migration>],
) -> Result<Vec<&'m dyn Migration>, MigrationError> {
    if let Some(current) = current {
        let known = migrations
            .iter()
            .any(|m| m.revision() == current || m.down_revision() == Some(current));
        if !known {
            return Err(MigrationError::UnknownRevision(current.to_owned()));
        }
    }

    let mut pending: Vec<&'m dyn Migration> = Vec::new();
    let mut head = current;
    for _ in 0..migrations.len() {
        let Some(next) = migrations.iter().find(|m| m.down_revision() == head) else {
            break;
        };
        pending.push(next.as_ref());
        head = Some(next.revision());
    }

    if current.is_none() && pending.is_empty() {
        if let Some(first) = migrations.first() {
            if let Some(required) = first.down_revision() {
                return Err(MigrationError::MissingPredecessor {
                    revision: first.revision(),
                    required,
                });
            }
        }
    }

    Ok(pending)
}

pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new(vec![Box::new(DenormalizeSerialOntoProject)])
    }
}

impl Migrator {
    #[must_use]
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> Self {
        Self { migrations }
    }

    /// The migration no other migration builds on.
    fn head(&self) -> Option<&dyn Migration> {
        self.migrations
            .iter()
            .find(|m| {
                !self
                    .migrations
                    .iter()
                    .any(|other| other.down_revision() == Some(m.revision()))
            })
            .map(AsRef::as_ref)
    }

    /// Reads the recorded revision. A database without the marker table has
    /// none; the table is only created by [`Migrator::upgrade`].
    pub async fn current(
        &self,
        connection: &mut AsyncPgConnection,
    ) -> Result<Option<String>, MigrationError> {
        let marked = diesel::select(sql::<Bool>(
            "to_regclass('alembic_version') IS NOT NULL",
        ))
        .get_result::<bool>(connection)
        .await?;
        if !marked {
            return Ok(None);
        }
        Ok(alembic_version::table
            .select(alembic_version::version_num)
            .first::<String>(connection)
            .await
            .optional()?)
    }

    /// Applies every pending revision and returns the ones that were applied.
    pub async fn upgrade(
        &self,
        connection: &mut AsyncPgConnection,
    ) -> Result<Vec<&'static str>, MigrationError> {
        connection.batch_execute(CREATE_VERSION_TABLE).await?;
        let current = self.current(connection).await?;
        let pending = plan(current.as_deref(), &self.migrations)?;
        if pending.is_empty() {
            info!(revision = current.as_deref(), "database is up to date");
        }

        let mut applied = Vec::with_capacity(pending.len());
        for migration in pending {
            let revision = migration.revision();
            let steps = migration.upgrade();
            info!(revision, "upgrading");
            connection
                .transaction::<_, MigrationError, _>(|connection| {
                    async move {
                        run_steps(connection, steps).await?;
                        set_version(connection, Some(revision)).await
                    }
                    .scope_boxed()
                })
                .await?;
            applied.push(revision);
        }
        Ok(applied)
    }

    /// Reverts the current revision and returns the revision the database is
    /// left at.
    ///
    /// An irreversible head refuses before any statement is sent, whatever
    /// revision the database is at.
    pub async fn downgrade(
        &self,
        connection: &mut AsyncPgConnection,
    ) -> Result<Option<&'static str>, MigrationError> {
        if let Some(head) = self.head() {
            head.downgrade()?;
        }

        let current = self
            .current(connection)
            .await?
            .ok_or(MigrationError::NothingToDowngrade)?;
        let migration = self
            .migrations
            .iter()
            .find(|m| m.revision() == current)
            .ok_or(MigrationError::UnknownRevision(current))?;

        let steps = migration.downgrade()?;
        let down_revision = migration.down_revision();
        info!(revision = migration.revision(), down_revision, "downgrading");
        connection
            .transaction::<_, MigrationError, _>(|connection| {
                async move {
                    run_steps(connection, steps).await?;
                    set_version(connection, down_revision).await
                }
                .scope_boxed()
            })
            .await?;
        Ok(down_revision)
    }
}

async fn run_steps(
    connection: &mut AsyncPgConnection,
    steps: &[Step],
) -> Result<(), MigrationError> {
    for step in steps {
        debug!(step = step.name, "running migration step");
        connection.batch_execute(step.sql).await?;
    }
    Ok(())
}

async fn set_version(
    connection: &mut AsyncPgConnection,
    revision: Option<&'static str>,
) -> Result<(), MigrationError> {
    diesel::delete(alembic_version::table)
        .execute(connection)
        .await?;
    if let Some(revision) = revision {
        diesel::insert_into(alembic_version::table)
            .values(alembic_version::version_num.eq(revision))
            .execute(connection)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        revision: &'static str,
        down_revision: Option<&'static str>,
    }

    impl Migration for Fixed {
        fn revision(&self) -> &'static str {
            self.revision
        }

        fn down_revision(&self) -> Option<&'static str> {
            self.down_revision
        }

        fn upgrade(&self) -> &'static [Step] {
            &[]
        }

        fn downgrade(&self) -> Result<&'static [Step], MigrationError> {
            Ok(&[])
        }
    }

    fn chain() -> Vec<Box<dyn Migration>> {
        vec![
            Box::new(Fixed {
                revision: "b",
                down_revision: Some("a"),
            }),
            Box::new(Fixed {
                revision: "c",
                down_revision: Some("b"),
            }),
        ]
    }

    fn revisions(pending: &[&dyn Migration]) -> Vec<&'static str> {
        pending.iter().map(|m| m.revision()).collect()
    }

    #[test]
    fn plans_whole_chain_from_predecessor() {
        let migrations = chain();
        let pending = plan(Some("a"), &migrations).unwrap();
        assert_eq!(revisions(&pending), ["b", "c"]);
    }

    #[test]
    fn plans_remaining_chain() {
        let migrations = chain();
        let pending = plan(Some("b"), &migrations).unwrap();
        assert_eq!(revisions(&pending), ["c"]);
    }

    #[test]
    fn nothing_pending_at_head() {
        let migrations = chain();
        assert!(plan(Some("c"), &migrations).unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_revision() {
        let migrations = chain();
        assert!(matches!(
            plan(Some("zzz"), &migrations),
            Err(MigrationError::UnknownRevision(revision)) if revision == "zzz"
        ));
    }

    #[test]
    fn rejects_missing_predecessor() {
        let migrations = chain();
        assert!(matches!(
            plan(None, &migrations),
            Err(MigrationError::MissingPredecessor {
                revision: "b",
                required: "a"
            })
        ));
    }

    #[test]
    fn plans_from_empty_database_when_chain_has_a_root() {
        let migrations: Vec<Box<dyn Migration>> = vec![Box::new(Fixed {
            revision: "root",
            down_revision: None,
        })];
        let pending = plan(None, &migrations).unwrap();
        assert_eq!(revisions(&pending), ["root"]);
    }

    #[test]
    fn head_is_the_last_revision_of_the_chain() {
        let migrator = Migrator::new(chain());
        assert_eq!(migrator.head().map(Migration::revision), Some("c"));
        assert!(Migrator::new(Vec::new()).head().is_none());
    }

    #[test]
    fn default_migrator_head_is_irreversible() {
        let migrator = Migrator::default();
        let head = migrator.head().unwrap();
        assert_eq!(head.revision(), "104b4c56862b");
        assert!(matches!(
            head.downgrade(),
            Err(MigrationError::Irreversible {
                revision: "104b4c56862b"
            })
        ));
    }

    #[test]
    fn default_migrator_knows_the_serial_denormalization() {
        let migrator = Migrator::default();
        let pending = plan(Some("fb3278418206"), &migrator.migrations).unwrap();
        assert_eq!(revisions(&pending), ["104b4c56862b"]);
    }
}
