//! Denormalize serial onto project (revision `104b4c56862b`).
//!
//! Copies the highest journal id of every project onto `packages.last_serial`
//! and installs a row trigger on `journals` that keeps the column equal to
//! `coalesce(max(journals.id), 0)` for the project's name from then on.
//! Application code never writes `last_serial` itself.

use diesel_async::{AsyncPgConnection, SimpleAsyncConnection};

use super::{Migration, MigrationError, Step};

pub const REVISION: &str = "104b4c56862b";
pub const DOWN_REVISION: &str = "fb3278418206";

const LOCK_PACKAGES: &str = "LOCK TABLE packages IN EXCLUSIVE MODE";

const LOCK_JOURNALS: &str = "LOCK TABLE journals IN EXCLUSIVE MODE";

const ADD_LAST_SERIAL: &str = "ALTER TABLE packages ADD COLUMN last_serial INTEGER DEFAULT 0";

// Journal names without a matching package are skipped, packages without
// journal entries keep the column default.
const BACKFILL_LAST_SERIAL: &str = "UPDATE packages
SET last_serial = j.last_serial
FROM (
    SELECT name,
           max(id) AS last_serial
    FROM journals
    GROUP BY name
) AS j
WHERE j.name = packages.name";

const LAST_SERIAL_NOT_NULL: &str = "ALTER TABLE packages ALTER COLUMN last_serial SET NOT NULL";

// A name left without journal entries falls back to 0. A renaming UPDATE
// refreshes the old name as well so it does not keep a stale serial.
const CREATE_TRIGGER_FUNCTION: &str = "CREATE OR REPLACE FUNCTION maintain_project_last_serial()
RETURNS TRIGGER AS $$
DECLARE
    targeted_name text;
BEGIN
    IF TG_OP = 'INSERT' THEN
        targeted_name := NEW.name;
    ELSIF TG_OP = 'UPDATE' THEN
        targeted_name := NEW.name;
        IF OLD.name IS DISTINCT FROM NEW.name THEN
            UPDATE packages
            SET last_serial = coalesce(
                (SELECT max(id) FROM journals WHERE journals.name = OLD.name),
                0
            )
            WHERE packages.name = OLD.name;
        END IF;
    ELSIF TG_OP = 'DELETE' THEN
        targeted_name := OLD.name;
    END IF;

    UPDATE packages
    SET last_serial = coalesce(
        (SELECT max(id) FROM journals WHERE journals.name = targeted_name),
        0
    )
    WHERE packages.name = targeted_name;

    RETURN NULL;
END;
$$ LANGUAGE plpgsql";

const CREATE_TRIGGER: &str = "CREATE TRIGGER update_project_last_serial
AFTER INSERT OR UPDATE OR DELETE ON journals
FOR EACH ROW EXECUTE PROCEDURE maintain_project_last_serial()";

static UPGRADE: [Step; 7] = [
    Step {
        name: "lock packages",
        sql: LOCK_PACKAGES,
    },
    Step {
        name: "lock journals",
        sql: LOCK_JOURNALS,
    },
    Step {
        name: "add last_serial",
        sql: ADD_LAST_SERIAL,
    },
    Step {
        name: "backfill last_serial",
        sql: BACKFILL_LAST_SERIAL,
    },
    Step {
        name: "last_serial not null",
        sql: LAST_SERIAL_NOT_NULL,
    },
    Step {
        name: "create maintain_project_last_serial",
        sql: CREATE_TRIGGER_FUNCTION,
    },
    Step {
        name: "create update_project_last_serial",
        sql: CREATE_TRIGGER,
    },
];

pub struct DenormalizeSerialOntoProject;

impl Migration for DenormalizeSerialOntoProject {
    fn revision(&self) -> &'static str {
        REVISION
    }

    fn down_revision(&self) -> Option<&'static str> {
        Some(DOWN_REVISION)
    }

    fn upgrade(&self) -> &'static [Step] {
        &UPGRADE
    }

    fn downgrade(&self) -> Result<&'static [Step], MigrationError> {
        Err(MigrationError::Irreversible { revision: REVISION })
    }
}

/// Recomputes `last_serial` for every package from `journals`.
///
/// Running this on a table the trigger already keeps consistent changes
/// nothing.
pub async fn backfill_last_serial(connection: &mut AsyncPgConnection) -> Result<(), MigrationError> {
    connection.batch_execute(BACKFILL_LAST_SERIAL).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(name: &str) -> usize {
        UPGRADE
            .iter()
            .position(|step| step.name == name)
            .unwrap()
    }

    #[test]
    fn tables_are_locked_before_anything_else() {
        let steps = DenormalizeSerialOntoProject.upgrade();
        assert!(steps[0].sql.starts_with("LOCK TABLE packages"));
        assert!(steps[1].sql.starts_with("LOCK TABLE journals"));
    }

    #[test]
    fn column_is_filled_before_it_becomes_not_null() {
        assert!(position("add last_serial") < position("backfill last_serial"));
        assert!(position("backfill last_serial") < position("last_serial not null"));
    }

    #[test]
    fn trigger_is_installed_last() {
        let steps = DenormalizeSerialOntoProject.upgrade();
        assert!(
            position("create maintain_project_last_serial")
                < position("create update_project_last_serial")
        );
        assert_eq!(
            steps.last().map(|step| step.name),
            Some("create update_project_last_serial")
        );
    }

    #[test]
    fn trigger_fires_per_row_on_every_change() {
        assert!(CREATE_TRIGGER.contains("AFTER INSERT OR UPDATE OR DELETE ON journals"));
        assert!(CREATE_TRIGGER.contains("FOR EACH ROW"));
    }

    #[test]
    fn downgrade_is_refused() {
        let migration = DenormalizeSerialOntoProject;
        for _ in 0..2 {
            assert!(matches!(
                migration.downgrade(),
                Err(MigrationError::Irreversible {
                    revision: "104b4c56862b"
                })
            ));
        }
    }

    #[test]
    fn builds_on_previous_revision() {
        let migration = DenormalizeSerialOntoProject;
        assert_eq!(migration.revision(), "104b4c56862b");
        assert_eq!(migration.down_revision(), Some("fb3278418206"));
    }
}
