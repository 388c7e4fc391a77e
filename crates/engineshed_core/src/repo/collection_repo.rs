//! SQLite-backed ordered-collection store.
//!
//! # Responsibility
//! - Expose one inventory relation (purchase models or train members) to
//!   the ordered-collection indexer.
//! - Apply each change batch inside one immediate transaction.
//!
//! # Invariants
//! - Only live (`is_deleted=0`) children are visible.
//! - Every row written by a batch gets `needs_sync=1`; rows not in the
//!   batch are never touched.
//! - A batch that fails midway is rolled back in full.

use crate::collection::plan::Slot;
use crate::collection::store::{ChangeBatch, ChildState, CollectionStore};
use crate::model::inventory::{CollectionKind, RecordId};
use crate::repo::inventory_repo::{
    ensure_inventory_connection_ready, parse_index, parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

/// Ordered-collection store over one inventory relation.
pub struct SqliteCollectionRepository<'conn> {
    conn: &'conn Connection,
    kind: CollectionKind,
}

impl<'conn> SqliteCollectionRepository<'conn> {
    /// Creates repository for `kind` from migrated connection.
    pub fn try_new(conn: &'conn Connection, kind: CollectionKind) -> RepoResult<Self> {
        ensure_inventory_connection_ready(conn)?;
        Ok(Self { conn, kind })
    }

    fn write_index(
        &self,
        tx: &Transaction<'_>,
        parent: RecordId,
        child: RecordId,
        index: i16,
    ) -> RepoResult<()> {
        let (table, parent_column) = (self.kind.child_table(), self.kind.parent_column());
        let changed = tx.execute(
            &format!(
                "UPDATE {table}
                 SET sort_index = ?2,
                     needs_sync = 1,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1
                   AND {parent_column} = ?3
                   AND is_deleted = 0;"
            ),
            params![child.to_string(), index, parent.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(child));
        }
        Ok(())
    }

    fn attach(
        &self,
        tx: &Transaction<'_>,
        parent: RecordId,
        slot: Slot<RecordId>,
    ) -> RepoResult<()> {
        let (table, parent_column) = (self.kind.child_table(), self.kind.parent_column());
        let changed = tx.execute(
            &format!(
                "UPDATE {table}
                 SET {parent_column} = ?2,
                     sort_index = ?3,
                     needs_sync = 1,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1
                   AND {parent_column} IS NULL
                   AND is_deleted = 0;"
            ),
            params![slot.id.to_string(), parent.to_string(), slot.index],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(slot.id));
        }
        Ok(())
    }

    fn detach_and_delete(
        &self,
        tx: &Transaction<'_>,
        parent: RecordId,
        child: RecordId,
    ) -> RepoResult<()> {
        let (table, parent_column) = (self.kind.child_table(), self.kind.parent_column());
        let changed = tx.execute(
            &format!(
                "UPDATE {table}
                 SET {parent_column} = NULL,
                     is_deleted = 1,
                     needs_sync = 1,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1
                   AND {parent_column} = ?2
                   AND is_deleted = 0;"
            ),
            params![child.to_string(), parent.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(child));
        }
        Ok(())
    }
}

impl CollectionStore for SqliteCollectionRepository<'_> {
    type ParentId = RecordId;
    type ChildId = RecordId;
    type Error = RepoError;

    fn contains_parent(&self, parent: RecordId) -> RepoResult<bool> {
        let table = self.kind.parent_table();
        let exists: i64 = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE uuid = ?1);"),
            [parent.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn children(&self, parent: RecordId) -> RepoResult<Vec<Slot<RecordId>>> {
        let (table, parent_column) = (self.kind.child_table(), self.kind.parent_column());
        let mut stmt = self.conn.prepare(&format!(
            "SELECT uuid, sort_index
             FROM {table}
             WHERE {parent_column} = ?1
               AND is_deleted = 0
             ORDER BY sort_index ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([parent.to_string()])?;
        let mut slots = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get(0)?;
            slots.push(Slot::new(
                parse_uuid(&uuid_text, "child.uuid")?,
                parse_index(row.get(1)?, "child.sort_index")?,
            ));
        }
        Ok(slots)
    }

    fn find_child(&self, child: RecordId) -> RepoResult<Option<ChildState<RecordId>>> {
        let (table, parent_column) = (self.kind.child_table(), self.kind.parent_column());
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {parent_column}, sort_index
             FROM {table}
             WHERE uuid = ?1
               AND is_deleted = 0;"
        ))?;
        let mut rows = stmt.query([child.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let parent = row
            .get::<_, Option<String>>(0)?
            .map(|value| parse_uuid(&value, "child.parent_uuid"))
            .transpose()?;
        Ok(Some(ChildState {
            parent,
            index: parse_index(row.get(1)?, "child.sort_index")?,
        }))
    }

    fn apply(&mut self, parent: RecordId, batch: &ChangeBatch<RecordId>) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for write in &batch.writes {
            self.write_index(&tx, parent, write.id, write.to)?;
        }
        if let Some(slot) = batch.attach {
            self.attach(&tx, parent, slot)?;
        }
        if let Some(child) = batch.delete {
            self.detach_and_delete(&tx, parent, child)?;
        }
        tx.commit()?;
        Ok(())
    }
}
