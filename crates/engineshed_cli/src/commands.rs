//! Collection maintenance commands over an open inventory connection.
//!
//! # Responsibility
//! - Report parents whose child indexes are not contiguous.
//! - Renumber every collection through the core indexer.
//!
//! # Invariants
//! - `check` only reads; it never writes to the connection.
//! - Output lines are `key=value` pairs, one collection per line.

use engineshed_core::{
    is_contiguous, CollectionKind, OrderedCollectionIndexer, RecordId,
    SqliteCollectionRepository, SqliteInventoryRepository,
};
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::io::Write;

pub type CommandResult<T> = Result<T, Box<dyn Error>>;

/// Process exit status when `check` finds broken collections.
pub const EXIT_BROKEN: u8 = 2;

/// Prints every non-contiguous collection and returns how many there are.
pub fn check(conn: &Connection, out: &mut impl Write) -> CommandResult<usize> {
    let mut broken = 0usize;
    for kind in CollectionKind::ALL {
        for (parent, indexes) in scan(conn, kind)? {
            if !is_contiguous(indexes.iter().copied()) {
                writeln!(out, "{} parent={} indexes={:?}", kind.label(), parent, indexes)?;
                broken += 1;
            }
        }
    }
    writeln!(out, "broken={broken}")?;
    Ok(broken)
}

/// Exit status for a `check` that found `broken` collections.
pub fn check_exit_status(broken: usize) -> u8 {
    if broken == 0 {
        0
    } else {
        EXIT_BROKEN
    }
}

/// Normalizes every collection and returns the number of children rewritten.
pub fn repair(conn: &Connection, out: &mut impl Write) -> CommandResult<usize> {
    let mut total = 0usize;
    for kind in CollectionKind::ALL {
        let parents = SqliteInventoryRepository::try_new(conn)?.list_parent_ids(kind)?;
        let mut indexer =
            OrderedCollectionIndexer::new(SqliteCollectionRepository::try_new(conn, kind)?);
        for parent in parents {
            let rewrites = indexer.normalize(parent)?;
            if rewrites > 0 {
                writeln!(out, "{} parent={} rewrites={}", kind.label(), parent, rewrites)?;
            }
            total += rewrites;
        }
    }
    info!("event=cli_repair module=cli status=ok rewrites={total}");
    writeln!(out, "rewrites={total}")?;
    Ok(total)
}

fn scan(conn: &Connection, kind: CollectionKind) -> CommandResult<Vec<(RecordId, Vec<i16>)>> {
    let parents = SqliteInventoryRepository::try_new(conn)?.list_parent_ids(kind)?;
    let indexer = OrderedCollectionIndexer::new(SqliteCollectionRepository::try_new(conn, kind)?);
    let mut report = Vec::with_capacity(parents.len());
    for parent in parents {
        let indexes = indexer
            .list_children(parent)?
            .into_iter()
            .map(|slot| slot.index)
            .collect();
        report.push((parent, indexes));
    }
    Ok(report)
}
