//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory inventory databases.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a writable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Writable connections have migrations fully applied.
//! - Read-only connections never change the file, including its schema.

use super::migrations::{apply_migrations, latest_version};
use super::{schema_version, DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens an inventory database file and applies all pending migrations.
///
/// # Side effects
/// - Creates the file when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with("file", || Connection::open(path), bootstrap_connection)
}

/// Opens an existing inventory database file and applies pending migrations.
///
/// # Errors
/// - Returns [`DbError::DatabaseNotFound`] when `path` is not a file; no
///   file is created.
pub fn open_existing_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = require_file(path.as_ref())?;
    open_with(
        "existing",
        || Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE),
        bootstrap_connection,
    )
}

/// Opens an existing inventory database file for reading only.
///
/// Migrations are not applied, so an outdated file stays outdated and is
/// rejected later by repositories.
///
/// # Errors
/// - Returns [`DbError::DatabaseNotFound`] when `path` is not a file.
/// - Returns [`DbError::UnsupportedSchemaVersion`] for a newer schema.
pub fn open_db_read_only(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = require_file(path.as_ref())?;
    open_with(
        "read_only",
        || Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY),
        configure_read_only,
    )
}

/// Opens an in-memory inventory database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with("memory", Connection::open_in_memory, bootstrap_connection)
}

fn require_file(path: &Path) -> DbResult<&Path> {
    if !path.is_file() {
        return Err(DbError::DatabaseNotFound(path.to_path_buf()));
    }
    Ok(path)
}

fn open_with(
    mode: &'static str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
    bootstrap: fn(&mut Connection) -> DbResult<()>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = open()
        .map_err(DbError::from)
        .and_then(|mut conn| bootstrap(&mut conn).map(|()| conn));

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={} duration_ms={}",
            mode,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={} duration_ms={} error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)?;
    Ok(())
}

fn configure_read_only(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    let db_version = schema_version(conn)?;
    let latest_supported = latest_version();
    if db_version > latest_supported {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        });
    }
    Ok(())
}
