//! `PRAGMA user_version` migrations for the document store.

use super::schema;
use rusqlite::{Connection, types::Type};

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 3;

const MIGRATIONS: &[(u32, &str)] = &[
    (1, schema::MIGRATION_V1_SQL),
    (2, schema::MIGRATION_V2_SQL),
    (3, schema::MIGRATION_V3_SQL),
];

/// # Errors
///
/// Returns an error if the pragma query fails or the value does not fit `u32`.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply every migration newer than `user_version`, one transaction each.
///
/// # Errors
///
/// Returns an error if any migration fails; earlier ones stay applied.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.commit()?;
        current = *version;
    }

    Ok(current)
}
