//! SQLite attribute store
//!
//! Keeps per-row dictionary attributes in an `attrs` table and answers
//! include/exclude filtered lookups for the spotting automaton.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    AttributeFilter, AttributeMap, AttributeStore, ConfigError, GazetteError, InternalId, Result,
    RowId, StoreConfig, StoreMode,
};

const SCHEMA: &str = "create table if not exists attrs (
    n integer not null,
    iid integer not null,
    attr_name text not null,
    attr_value text not null
);";

const INDEX: &str =
    "create index if not exists ix_attrs_n_attr_name_attr_value on attrs (n, attr_name, attr_value);";

#[derive(Debug)]
enum Location {
    Memory,
    File(PathBuf),
    Temporary(PathBuf),
}

/// rusqlite-backed attribute store
pub struct SqliteAttributeStore {
    conn: Mutex<Connection>,
    location: Location,
}

impl SqliteAttributeStore {
    /// Store held entirely in memory
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| GazetteError::Store(format!("Failed to open in-memory database: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: Location::Memory,
        })
    }

    /// Store persisted at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|e| {
            GazetteError::Store(format!("Failed to open {}: {e}", path.display()))
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: Location::File(path),
        })
    }

    /// Uniquely named store inside `directory`, deleted on drop
    pub fn temporary(directory: impl AsRef<Path>) -> Result<Self> {
        let path = directory
            .as_ref()
            .join(format!(".gazette-{}.attributes", Uuid::new_v4().simple()));
        let conn = Connection::open(&path).map_err(|e| {
            GazetteError::Store(format!("Failed to create {}: {e}", path.display()))
        })?;
        debug!("Created temporary attribute store {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            location: Location::Temporary(path),
        })
    }

    /// Open the store described by `config`
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        match config.mode {
            StoreMode::Memory => Self::in_memory(),
            StoreMode::File => match &config.path {
                Some(path) => Self::open(path),
                None => Err(ConfigError::MissingRequired("store.path".to_string()).into()),
            },
            StoreMode::Temporary => Self::temporary(&config.directory),
        }
    }

    /// Database file, if the store is file backed
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::Memory => None,
            Location::File(path) | Location::Temporary(path) => Some(path),
        }
    }

    /// Number of stored attribute values
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("select count(*) from attrs", [], |row| row.get(0))
            .map_err(|e| GazetteError::Store(format!("Failed to count attributes: {e}")))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GazetteError::Store("attribute store lock poisoned".to_string()))
    }
}

impl Drop for SqliteAttributeStore {
    fn drop(&mut self) {
        if let Location::Temporary(path) = &self.location {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

/// Bound parameters per statement, the lowest limit SQLite builds ship with
const MAX_VARIABLES: usize = 999;

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Row ids in slices that leave room for `reserved` other parameters
fn row_chunks(rows: &[RowId], reserved: usize) -> std::slice::Chunks<'_, RowId> {
    rows.chunks(MAX_VARIABLES.saturating_sub(reserved).max(1))
}

fn row_values(rows: &[RowId]) -> Vec<Value> {
    rows.iter().map(|&r| Value::Integer(r as i64)).collect()
}

/// Rows among `rows` having any of the `name == value` pairs
fn matching_rows(
    conn: &Connection,
    rows: &[RowId],
    constraints: &BTreeMap<String, BTreeSet<String>>,
) -> Result<BTreeSet<RowId>> {
    let mut pairs = Vec::new();
    let mut clauses = Vec::new();
    for (name, accepted) in constraints {
        for value in accepted {
            clauses.push("(attr_name = ? and attr_value = ?)");
            pairs.push(Value::Text(name.clone()));
            pairs.push(Value::Text(value.clone()));
        }
    }
    if clauses.is_empty() {
        return Ok(BTreeSet::new());
    }

    let mut found = BTreeSet::new();
    for chunk in row_chunks(rows, pairs.len()) {
        let sql = format!(
            "select distinct n from attrs where n in ({}) and ({})",
            placeholders(chunk.len()),
            clauses.join(" or ")
        );
        let mut values = row_values(chunk);
        values.extend(pairs.iter().cloned());

        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| GazetteError::Store(format!("Failed to prepare filter query: {e}")))?;
        let matched = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get::<_, i64>(0))
            .map_err(|e| GazetteError::Store(format!("Failed to run filter query: {e}")))?
            .collect::<std::result::Result<Vec<i64>, _>>()
            .map_err(|e| GazetteError::Store(format!("Failed to read filter results: {e}")))?;
        found.extend(matched.into_iter().map(|n| n as RowId));
    }

    Ok(found)
}

/// Attributes of `rows`, restricted to `attrs_out` names when given
fn row_attributes(
    conn: &Connection,
    rows: &[RowId],
    attrs_out: &[String],
    result: &mut BTreeMap<RowId, AttributeMap>,
) -> Result<()> {
    for chunk in row_chunks(rows, attrs_out.len()) {
        let mut values = row_values(chunk);
        let mut sql = format!(
            "select n, attr_name, attr_value from attrs where n in ({})",
            placeholders(chunk.len())
        );
        if !attrs_out.is_empty() {
            sql.push_str(&format!(
                " and attr_name in ({})",
                placeholders(attrs_out.len())
            ));
            values.extend(attrs_out.iter().map(|a| Value::Text(a.clone())));
        }
        sql.push_str(" order by rowid");

        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| GazetteError::Store(format!("Failed to prepare attribute query: {e}")))?;
        let found = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| GazetteError::Store(format!("Failed to query attributes: {e}")))?;

        for item in found {
            let (n, name, value) =
                item.map_err(|e| GazetteError::Store(format!("Failed to read attribute: {e}")))?;
            result
                .entry(n as RowId)
                .or_default()
                .entry(name)
                .or_default()
                .push(value);
        }
    }
    Ok(())
}

impl AttributeStore for SqliteAttributeStore {
    fn create_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| GazetteError::Store(format!("Failed to create schema: {e}")))
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch("delete from attrs")
            .map_err(|e| GazetteError::Store(format!("Failed to clear attributes: {e}")))
    }

    fn begin(&self) -> Result<()> {
        let conn = self.conn()?;
        if conn.is_autocommit() {
            conn.execute_batch("begin")
                .map_err(|e| GazetteError::Store(format!("Failed to begin transaction: {e}")))?;
        }
        Ok(())
    }

    fn store(
        &self,
        row: RowId,
        entity: InternalId,
        attr_name: &str,
        attr_value: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached(
                "insert into attrs (n, iid, attr_name, attr_value) values (?1, ?2, ?3, ?4)",
            )
            .map_err(|e| GazetteError::Store(format!("Failed to prepare insert: {e}")))?;
        stmt.execute(params![row as i64, entity as i64, attr_name, attr_value])
            .map_err(|e| {
                GazetteError::Store(format!("Failed to store attribute of row {row}: {e}"))
            })?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let conn = self.conn()?;
        if !conn.is_autocommit() {
            conn.execute_batch("commit")
                .map_err(|e| GazetteError::Store(format!("Failed to commit: {e}")))?;
        }
        conn.execute_batch(INDEX)
            .map_err(|e| GazetteError::Store(format!("Failed to create index: {e}")))
    }

    fn rollback(&self) -> Result<()> {
        let conn = self.conn()?;
        if !conn.is_autocommit() {
            conn.execute_batch("rollback")
                .map_err(|e| GazetteError::Store(format!("Failed to roll back: {e}")))?;
        }
        Ok(())
    }

    fn query(
        &self,
        rows: &[RowId],
        filter: &AttributeFilter,
    ) -> Result<BTreeMap<RowId, AttributeMap>> {
        let mut selected: Vec<RowId> = rows.to_vec();
        selected.sort_unstable();
        selected.dedup();
        if selected.is_empty() {
            return Ok(BTreeMap::new());
        }

        let conn = self.conn()?;
        if filter.has_include() {
            let included = matching_rows(&conn, &selected, &filter.include)?;
            selected.retain(|r| included.contains(r));
        }
        if filter.has_exclude() && !selected.is_empty() {
            let excluded = matching_rows(&conn, &selected, &filter.exclude)?;
            selected.retain(|r| !excluded.contains(r));
        }

        let mut result: BTreeMap<RowId, AttributeMap> =
            selected.iter().map(|&r| (r, AttributeMap::new())).collect();
        if selected.is_empty() {
            return Ok(result);
        }

        row_attributes(&conn, &selected, &filter.attrs_out, &mut result)?;
        Ok(result)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
