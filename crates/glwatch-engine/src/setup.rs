use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::migrations::{SCHEMA_VERSION, run_pending};
use crate::state::{
    ensure_home_directory, map_sqlite_error, open_connection, resolve_home, snapshot_db_path,
};
use crate::{EngineError, EngineResult};

#[derive(Debug)]
pub struct StoreContext {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub schema_version: String,
    pub connection: Connection,
}

/// Opens the snapshot store under the resolved home, creating the directory
/// and applying migrations when needed.
pub fn open_store(home_override: Option<&Path>) -> EngineResult<StoreContext> {
    let home = resolve_home(home_override)?;
    ensure_home_directory(&home)?;

    let db_path = snapshot_db_path(&home);
    let mut connection = open_connection(&db_path)?;
    run_pending(&mut connection).map_err(|error| map_migration_error(&db_path, &error))?;

    let schema_version = read_schema_version(&connection, &db_path)?;
    if schema_version != SCHEMA_VERSION {
        return Err(EngineError::store_corrupt(&db_path));
    }

    Ok(StoreContext {
        home,
        db_path,
        schema_version,
        connection,
    })
}

fn map_migration_error(db_path: &Path, error: &rusqlite_migration::Error) -> EngineError {
    match error {
        rusqlite_migration::Error::RusqliteError { query: _, err } => {
            map_sqlite_error(db_path, err)
        }
        _ => EngineError::store_failed(db_path, &error.to_string()),
    }
}

fn read_schema_version(connection: &Connection, db_path: &Path) -> EngineResult<String> {
    connection
        .query_row(
            "SELECT value FROM internal_meta WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .map_err(|error| map_sqlite_error(db_path, &error))
}
