use rusqlite::Connection;
use serde_json::{Map, Value};

use super::{
    merge_fields, resolve_server_timestamps, Document, DocumentStore, MarkerStore, Query,
    SetOptions, StoreError, WriteOp,
};
use crate::db::{self, DocumentRow};

/// Document store over the local SQLite cache. Each document is one JSON row
/// keyed by `(collection, id)`.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Ok(Self {
            conn: db::open_connection(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: db::open_in_memory()?,
        })
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn with_write_lock<T>(
        &self,
        body: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        // Nested calls join the outer transaction.
        if !self.conn.is_autocommit() {
            return body();
        }

        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        let outcome = body().and_then(|value| {
            self.conn.execute_batch("COMMIT")?;
            Ok(value)
        });
        if outcome.is_err() && !self.conn.is_autocommit() {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
        outcome
    }

    fn write_set(
        &self,
        collection: &str,
        id: &str,
        data: &Value,
        options: SetOptions,
        written_at: &str,
    ) -> Result<(), StoreError> {
        let Value::Object(fields) = data else {
            return Err(StoreError::InvalidDocument(format!(
                "set on '{}/{}' requires a JSON object",
                collection, id
            )));
        };

        let mut next = match (options.merge, db::get_document(&self.conn, collection, id)?) {
            (true, Some(existing)) => {
                let mut current = parse_row(&existing)?;
                merge_fields(&mut current, fields);
                current
            }
            _ => data.clone(),
        };
        resolve_server_timestamps(&mut next, written_at);
        let encoded = serde_json::to_string(&next)?;
        db::upsert_document(&self.conn, collection, id, &encoded, written_at)?;
        Ok(())
    }

    fn write_update(
        &self,
        collection: &str,
        id: &str,
        patch: &Map<String, Value>,
        written_at: &str,
    ) -> Result<(), StoreError> {
        let existing =
            db::get_document(&self.conn, collection, id)?.ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let mut current = parse_row(&existing)?;
        merge_fields(&mut current, patch);
        resolve_server_timestamps(&mut current, written_at);
        let encoded = serde_json::to_string(&current)?;
        db::upsert_document(&self.conn, collection, id, &encoded, written_at)?;
        Ok(())
    }

    fn apply_op(&self, op: &WriteOp, written_at: &str) -> Result<(), StoreError> {
        match op {
            WriteOp::Set {
                collection,
                id,
                data,
                options,
            } => self.write_set(collection, id, data, *options, written_at),
            WriteOp::Update {
                collection,
                id,
                patch,
            } => self.write_update(collection, id, patch, written_at),
            WriteOp::Delete { collection, id } => {
                db::delete_document(&self.conn, collection, id)?;
                Ok(())
            }
        }
    }
}

fn parse_row(row: &DocumentRow) -> Result<Value, StoreError> {
    serde_json::from_str(&row.data_json).map_err(|source| StoreError::Decode {
        collection: row.collection.clone(),
        id: row.id.clone(),
        source,
    })
}

impl DocumentStore for SqliteStore {
    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let documents = db::list_documents(&self.conn, collection)?
            .iter()
            .map(|row| {
                Ok(Document {
                    id: row.id.clone(),
                    data: parse_row(row)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(query.apply(documents))
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        db::get_document(&self.conn, collection, id)?
            .map(|row| {
                Ok(Document {
                    id: row.id.clone(),
                    data: parse_row(&row)?,
                })
            })
            .transpose()
    }

    fn set(
        &self,
        collection: &str,
        id: &str,
        data: &Value,
        options: SetOptions,
    ) -> Result<(), StoreError> {
        self.write_set(collection, id, data, options, &db::now_utc_rfc3339())
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.write_update(collection, id, patch, &db::now_utc_rfc3339())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        db::delete_document(&self.conn, collection, id)?;
        Ok(())
    }

    fn commit_batch(&self, ops: &[WriteOp]) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }
        let written_at = db::now_utc_rfc3339();
        self.with_write_lock(|| {
            for op in ops {
                self.apply_op(op, &written_at)?;
            }
            Ok(())
        })
    }

    fn run_atomic(
        &self,
        body: &mut dyn FnMut(&dyn DocumentStore) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        self.with_write_lock(|| body(self))
    }
}

impl MarkerStore for SqliteStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(db::get_meta(&self.conn, key)?)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        db::set_meta(&self.conn, key, value)?;
        Ok(())
    }
}
