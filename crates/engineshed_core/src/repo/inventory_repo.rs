//! Inventory record repository (purchases, models, trains, members).
//!
//! # Responsibility
//! - Create and read inventory rows outside of ordering concerns.
//! - Provide the raw import path used when rows arrive from sync.
//! - Own the sync dirty flag (`needs_sync`) lifecycle.
//!
//! # Invariants
//! - Rows created here start detached unless imported with an owner.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Child listing is deterministic: `sort_index ASC, uuid ASC`.

use crate::db::migrations::latest_version;
use crate::db::{schema_version, table_exists, table_has_column, DbError};
use crate::model::inventory::{CollectionKind, Model, Purchase, RecordId, Train, TrainMember};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Result type used by inventory repositories.
pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from inventory persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target record does not exist or is deleted.
    NotFound(RecordId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "inventory record not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "inventory repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "inventory repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "inventory repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid inventory data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

const MODEL_SELECT_SQL: &str = "SELECT
    uuid,
    purchase_uuid,
    sort_index,
    model_class,
    number,
    needs_sync,
    is_deleted
FROM models";

const MEMBER_SELECT_SQL: &str = "SELECT
    uuid,
    train_uuid,
    sort_index,
    title,
    needs_sync,
    is_deleted
FROM train_members";

/// SQLite-backed inventory repository.
pub struct SqliteInventoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteInventoryRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_inventory_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Creates one purchase with no models.
    pub fn create_purchase(
        &self,
        manufacturer: &str,
        catalog_number: &str,
    ) -> RepoResult<Purchase> {
        let uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO purchases (uuid, manufacturer, catalog_number) VALUES (?1, ?2, ?3);",
            params![uuid.to_string(), manufacturer, catalog_number],
        )?;
        self.get_purchase(uuid)?.ok_or(RepoError::NotFound(uuid))
    }

    /// Loads one purchase.
    pub fn get_purchase(&self, uuid: RecordId) -> RepoResult<Option<Purchase>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, manufacturer, catalog_number, created_at, updated_at
             FROM purchases
             WHERE uuid = ?1;",
        )?;
        let mut rows = stmt.query([uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_purchase_row(row)?));
        }
        Ok(None)
    }

    /// Creates one detached model.
    pub fn create_model(&self, model_class: &str, number: &str) -> RepoResult<Model> {
        let uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO models (uuid, purchase_uuid, sort_index, model_class, number)
             VALUES (?1, NULL, 0, ?2, ?3);",
            params![uuid.to_string(), model_class, number],
        )?;
        self.require_model(uuid)
    }

    /// Inserts one model already attached at `index`, as received from sync.
    ///
    /// The index is stored as-is; gaps and duplicates are left for the
    /// indexer to repair.
    pub fn import_model(
        &self,
        uuid: RecordId,
        purchase_uuid: RecordId,
        index: i16,
        model_class: &str,
        number: &str,
    ) -> RepoResult<Model> {
        self.conn.execute(
            "INSERT INTO models (uuid, purchase_uuid, sort_index, model_class, number, needs_sync)
             VALUES (?1, ?2, ?3, ?4, ?5, 0);",
            params![
                uuid.to_string(),
                purchase_uuid.to_string(),
                index,
                model_class,
                number
            ],
        )?;
        self.require_model(uuid)
    }

    /// Loads one model with optional deleted-row visibility.
    pub fn get_model(&self, uuid: RecordId, include_deleted: bool) -> RepoResult<Option<Model>> {
        let sql = if include_deleted {
            format!("{MODEL_SELECT_SQL} WHERE uuid = ?1;")
        } else {
            format!("{MODEL_SELECT_SQL} WHERE uuid = ?1 AND is_deleted = 0;")
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_model_row(row)?));
        }
        Ok(None)
    }

    /// Lists live models of one purchase in index order.
    pub fn list_models(&self, purchase_uuid: RecordId) -> RepoResult<Vec<Model>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MODEL_SELECT_SQL}
             WHERE purchase_uuid = ?1
               AND is_deleted = 0
             ORDER BY sort_index ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([purchase_uuid.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_model_row(row)?);
        }
        Ok(items)
    }

    /// Creates one train with no members.
    pub fn create_train(&self, name: &str) -> RepoResult<Train> {
        let uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO trains (uuid, name) VALUES (?1, ?2);",
            params![uuid.to_string(), name],
        )?;
        self.get_train(uuid)?.ok_or(RepoError::NotFound(uuid))
    }

    /// Loads one train.
    pub fn get_train(&self, uuid: RecordId) -> RepoResult<Option<Train>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, name, created_at, updated_at
             FROM trains
             WHERE uuid = ?1;",
        )?;
        let mut rows = stmt.query([uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_train_row(row)?));
        }
        Ok(None)
    }

    /// Creates one detached train member.
    pub fn create_train_member(&self, title: &str) -> RepoResult<TrainMember> {
        let uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO train_members (uuid, train_uuid, sort_index, title)
             VALUES (?1, NULL, 0, ?2);",
            params![uuid.to_string(), title],
        )?;
        self.get_train_member(uuid, false)?
            .ok_or(RepoError::NotFound(uuid))
    }

    /// Inserts one member already attached at `index`, as received from sync.
    pub fn import_train_member(
        &self,
        uuid: RecordId,
        train_uuid: RecordId,
        index: i16,
        title: &str,
    ) -> RepoResult<TrainMember> {
        self.conn.execute(
            "INSERT INTO train_members (uuid, train_uuid, sort_index, title, needs_sync)
             VALUES (?1, ?2, ?3, ?4, 0);",
            params![uuid.to_string(), train_uuid.to_string(), index, title],
        )?;
        self.get_train_member(uuid, false)?
            .ok_or(RepoError::NotFound(uuid))
    }

    /// Loads one train member with optional deleted-row visibility.
    pub fn get_train_member(
        &self,
        uuid: RecordId,
        include_deleted: bool,
    ) -> RepoResult<Option<TrainMember>> {
        let sql = if include_deleted {
            format!("{MEMBER_SELECT_SQL} WHERE uuid = ?1;")
        } else {
            format!("{MEMBER_SELECT_SQL} WHERE uuid = ?1 AND is_deleted = 0;")
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([uuid.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_member_row(row)?));
        }
        Ok(None)
    }

    /// Lists live members of one train in index order.
    pub fn list_train_members(&self, train_uuid: RecordId) -> RepoResult<Vec<TrainMember>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL}
             WHERE train_uuid = ?1
               AND is_deleted = 0
             ORDER BY sort_index ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([train_uuid.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_member_row(row)?);
        }
        Ok(items)
    }

    /// Lists every parent id of one relation, oldest first.
    pub fn list_parent_ids(&self, kind: CollectionKind) -> RepoResult<Vec<RecordId>> {
        let table = kind.parent_table();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT uuid FROM {table} ORDER BY created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "parent.uuid")?);
        }
        Ok(ids)
    }

    /// Clears `needs_sync` on every child row of one relation.
    ///
    /// Returns the number of rows cleared.
    pub fn mark_all_synced(&self, kind: CollectionKind) -> RepoResult<usize> {
        let table = kind.child_table();
        let changed = self.conn.execute(
            &format!("UPDATE {table} SET needs_sync = 0 WHERE needs_sync = 1;"),
            [],
        )?;
        Ok(changed)
    }

    fn require_model(&self, uuid: RecordId) -> RepoResult<Model> {
        self.get_model(uuid, false)?.ok_or(RepoError::NotFound(uuid))
    }
}

/// Verifies that `conn` carries the migrated inventory schema.
pub(crate) fn ensure_inventory_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for kind in CollectionKind::ALL {
        let parent_table = kind.parent_table();
        if !table_exists(conn, parent_table)? {
            return Err(RepoError::MissingRequiredTable(parent_table));
        }

        let child_table = kind.child_table();
        if !table_exists(conn, child_table)? {
            return Err(RepoError::MissingRequiredTable(child_table));
        }
        for column in [
            "uuid",
            kind.parent_column(),
            "sort_index",
            "needs_sync",
            "is_deleted",
        ] {
            if !table_has_column(conn, child_table, column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table: child_table,
                    column,
                });
            }
        }
    }

    Ok(())
}

fn parse_purchase_row(row: &Row<'_>) -> RepoResult<Purchase> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Purchase {
        uuid: parse_uuid(&uuid_text, "purchases.uuid")?,
        manufacturer: row.get("manufacturer")?,
        catalog_number: row.get("catalog_number")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_train_row(row: &Row<'_>) -> RepoResult<Train> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Train {
        uuid: parse_uuid(&uuid_text, "trains.uuid")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_model_row(row: &Row<'_>) -> RepoResult<Model> {
    let uuid_text: String = row.get("uuid")?;
    let purchase_uuid = row
        .get::<_, Option<String>>("purchase_uuid")?
        .map(|value| parse_uuid(&value, "models.purchase_uuid"))
        .transpose()?;

    Ok(Model {
        uuid: parse_uuid(&uuid_text, "models.uuid")?,
        purchase_uuid,
        index: parse_index(row.get("sort_index")?, "models.sort_index")?,
        model_class: row.get("model_class")?,
        number: row.get("number")?,
        needs_sync: parse_flag(row.get("needs_sync")?, "models.needs_sync")?,
        is_deleted: parse_flag(row.get("is_deleted")?, "models.is_deleted")?,
    })
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<TrainMember> {
    let uuid_text: String = row.get("uuid")?;
    let train_uuid = row
        .get::<_, Option<String>>("train_uuid")?
        .map(|value| parse_uuid(&value, "train_members.train_uuid"))
        .transpose()?;

    Ok(TrainMember {
        uuid: parse_uuid(&uuid_text, "train_members.uuid")?,
        train_uuid,
        index: parse_index(row.get("sort_index")?, "train_members.sort_index")?,
        title: row.get("title")?,
        needs_sync: parse_flag(row.get("needs_sync")?, "train_members.needs_sync")?,
        is_deleted: parse_flag(row.get("is_deleted")?, "train_members.is_deleted")?,
    })
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_index(value: i64, column: &'static str) -> RepoResult<i16> {
    i16::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid index `{value}` in {column}")))
}

fn parse_flag(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}
