//! SQLite-backed record store.
//!
//! # Responsibility
//! - Persist one named collection of records in the shared `records` table.
//! - Keep SQL details inside the store boundary.
//!
//! # Invariants
//! - Every query is scoped to this store's `collection`.
//! - `AUTOINCREMENT` ids are never reused; `id ASC` is insertion order.
//! - Merge-on-save is a single read-modify-write transaction.
//! - Read paths reject undecodable rows instead of skipping them.

use crate::db::{open_db, open_db_in_memory, table_exists, table_has_column};
use crate::model::record::{Fields, Record, RecordId, ID_FIELD};
use crate::store::{Store, StoreError, StoreResult};
use log::debug;
use rusqlite::types::Value as SqlValue;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior,
};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const RECORD_SELECT_SQL: &str = "SELECT id, data FROM records";

/// Durable `Store` backend bound to one collection.
pub struct SqliteStore {
    collection: String,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wraps a migrated connection, rejecting databases without the
    /// `records` schema.
    pub fn try_new(conn: Connection, collection: impl Into<String>) -> StoreResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self {
            collection: collection.into(),
            conn: Mutex::new(conn),
        })
    }

    /// Opens (and migrates) a database file for one collection.
    pub fn open(path: impl AsRef<Path>, collection: impl Into<String>) -> StoreResult<Self> {
        Self::try_new(open_db(path)?, collection)
    }

    /// Opens a private in-memory database for one collection.
    pub fn open_in_memory(collection: impl Into<String>) -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?, collection)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::LockPoisoned(self.collection.clone()))
    }

    fn load_all(&self, conn: &Connection) -> StoreResult<Vec<Record>> {
        let mut stmt = conn.prepare(&format!(
            "{RECORD_SELECT_SQL} WHERE collection = ?1 ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([self.collection.as_str()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }
}

impl Store for SqliteStore {
    fn find(&self, predicate: &Fields) -> StoreResult<Vec<Record>> {
        let conn = self.lock()?;
        let mut sql = format!("{RECORD_SELECT_SQL} WHERE collection = ?");
        let mut bind_values = vec![SqlValue::Text(self.collection.clone())];
        push_predicate_filters(predicate, &mut sql, &mut bind_values);
        sql.push_str(" ORDER BY id ASC;");

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let record = parse_record_row(row)?;
            // SQL narrows by scalar value; JSON equality is checked here.
            if record.matches(predicate) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn find_by_id(&self, id: RecordId) -> StoreResult<Option<Record>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{RECORD_SELECT_SQL} WHERE collection = ?1 AND id = ?2;"
        ))?;
        let mut rows = stmt.query(params![self.collection.as_str(), id.get()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(row)?));
        }
        Ok(None)
    }

    fn find_all(&self) -> StoreResult<Vec<Record>> {
        let conn = self.lock()?;
        self.load_all(&conn)
    }

    fn save(&self, data: Fields, id: Option<RecordId>) -> StoreResult<Vec<Record>> {
        let mut conn = self.lock()?;
        match id {
            None => {
                let mut data = data;
                data.remove(ID_FIELD);
                conn.execute(
                    "INSERT INTO records (collection, data) VALUES (?1, ?2);",
                    params![self.collection.as_str(), encode_fields(&data)?],
                )?;
                let record = Record::new(RecordId::new(conn.last_insert_rowid()), data);
                debug!(
                    "event=store_insert module=store status=ok collection={} record_id={}",
                    self.collection, record.id
                );
                Ok(vec![record])
            }
            Some(id) => {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let existing: Option<String> = tx
                    .query_row(
                        "SELECT data FROM records WHERE collection = ?1 AND id = ?2;",
                        params![self.collection.as_str(), id.get()],
                        |row| row.get(0),
                    )
                    .optional()?;

                if let Some(existing) = existing {
                    let mut record = Record::new(id, decode_fields(&existing, id)?);
                    record.merge(data);
                    tx.execute(
                        "UPDATE records
                         SET
                            data = ?3,
                            updated_at = (strftime('%s', 'now') * 1000)
                         WHERE collection = ?1 AND id = ?2;",
                        params![
                            self.collection.as_str(),
                            id.get(),
                            encode_fields(&record.fields)?
                        ],
                    )?;
                }
                tx.commit()?;
                self.load_all(&conn)
            }
        }
    }

    fn remove(&self, id: RecordId) -> StoreResult<Vec<Record>> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2;",
            params![self.collection.as_str(), id.get()],
        )?;
        self.load_all(&conn)
    }

    fn drop_all(&self) -> StoreResult<Vec<Record>> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM records WHERE collection = ?1;",
            [self.collection.as_str()],
        )?;
        debug!(
            "event=store_drop module=store status=ok collection={} removed={}",
            self.collection, removed
        );
        Ok(Vec::new())
    }
}

/// Appends SQL conditions for predicate entries SQLite can compare directly.
///
/// Entries without a condition (nulls, arrays, objects, unusual keys) are
/// left to `Record::matches`, so the SQL result is always a superset.
fn push_predicate_filters(
    predicate: &Fields,
    sql: &mut String,
    bind_values: &mut Vec<SqlValue>,
) {
    for (key, expected) in predicate {
        if key == ID_FIELD {
            let id = match expected {
                Value::Number(number) => number.as_i64(),
                Value::String(text) => text.parse::<RecordId>().ok().map(RecordId::get),
                _ => None,
            };
            if let Some(id) = id {
                sql.push_str(" AND id = ?");
                bind_values.push(SqlValue::Integer(id));
            }
            continue;
        }

        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            continue;
        }
        let bound = match expected {
            Value::String(text) => SqlValue::Text(text.clone()),
            Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
            Value::Number(number) => match number.as_i64() {
                Some(value) => SqlValue::Integer(value),
                None => continue,
            },
            _ => continue,
        };
        sql.push_str(" AND json_extract(data, ?) = ?");
        bind_values.push(SqlValue::Text(format!("$.{key}")));
        bind_values.push(bound);
    }
}

fn parse_record_row(row: &Row<'_>) -> StoreResult<Record> {
    let id = RecordId::new(row.get("id")?);
    let data: String = row.get("data")?;
    Ok(Record::new(id, decode_fields(&data, id)?))
}

fn decode_fields(data: &str, id: RecordId) -> StoreResult<Fields> {
    serde_json::from_str::<Fields>(data).map_err(|err| {
        StoreError::InvalidData(format!("record {id} is not a JSON object: {err}"))
    })
}

fn encode_fields(fields: &Fields) -> StoreResult<String> {
    serde_json::to_string(fields)
        .map_err(|err| StoreError::InvalidData(format!("record fields not encodable: {err}")))
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    if !table_exists(conn, "records")? {
        return Err(StoreError::MissingSchema("table `records`".to_string()));
    }

    for column in ["id", "collection", "data"] {
        if !table_has_column(conn, "records", column)? {
            return Err(StoreError::MissingSchema(format!(
                "column `records.{column}`"
            )));
        }
    }

    Ok(())
}
