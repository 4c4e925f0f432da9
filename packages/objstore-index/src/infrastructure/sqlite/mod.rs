//! SQLite Index Provider
//!
//! Relational reference implementation of `IndexProvider`: one table per
//! object type, named by the object full name, with an `"ID" INTEGER PRIMARY
//! KEY` identity column, one typed column per declared index and a lookup
//! index on every declared column.

mod rows;
mod statements;
mod values;

use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use self::rows::PagedRows;
use self::values::{ColumnSpec, TableColumns};
use crate::config::{ProviderLimits, ProviderSettings};
use crate::domain::{
    IndexProvider, IndexValue, IterateOptions, ObjectIndex, ObjectIndexMetadata, ObjectMetadata,
    OrderOptions, RowStream, ID_COLUMN,
};
use crate::error::{IndexError, Result};
use crate::query::{self, Predicate};

/// SQLite-based IndexProvider implementation
#[derive(Clone)]
pub struct SqliteIndexProvider {
    conn: Arc<Mutex<Option<Connection>>>,
    limits: ProviderLimits,
}

impl SqliteIndexProvider {
    /// Open a database file
    pub fn new(db_path: impl AsRef<Path>, limits: ProviderLimits) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Ok(Self::from_connection(conn, limits))
    }

    /// In-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn, ProviderLimits::default()))
    }

    /// `":memory:"` or an empty connection string opens an in-memory database
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let connection = settings.connection.trim();
        if connection.is_empty() || connection == ":memory:" {
            let conn = Connection::open_in_memory()?;
            Ok(Self::from_connection(conn, settings.limits.clone()))
        } else {
            Self::new(connection, settings.limits.clone())
        }
    }

    pub fn from_connection(conn: Connection, limits: ProviderLimits) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            limits,
        }
    }

    pub fn limits(&self) -> &ProviderLimits {
        &self.limits
    }

    /// Run `f` against the open connection
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| IndexError::backing_store("Index provider is closed"))?;
        f(conn)
    }
}

/// `(name, declared type)` of each column; empty when the table does not exist
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare_cached("SELECT name, type FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Columns of a provisioned table, or `NotProvisioned`
fn provisioned_columns(conn: &Connection, table: &str) -> Result<TableColumns> {
    let columns = TableColumns::new(table_columns(conn, table)?);
    if columns.is_empty() {
        return Err(IndexError::not_provisioned(table));
    }
    Ok(columns)
}

fn check_field(columns: &TableColumns, table: &str, field: &str) -> Result<()> {
    if columns.contains(field) {
        Ok(())
    } else {
        Err(IndexError::validation(format!(
            "Unknown index field '{}' for {}",
            field, table
        )))
    }
}

fn check_query_fields(
    columns: &TableColumns,
    table: &str,
    predicate: Option<&Predicate>,
    order: Option<&OrderOptions>,
) -> Result<()> {
    if let Some(predicate) = predicate {
        for clause in predicate.clauses() {
            check_field(columns, table, &clause.field)?;
        }
    }
    if let Some(order) = order {
        for field in &order.fields {
            check_field(columns, table, field)?;
        }
    }
    Ok(())
}

fn to_object_id(id: i64) -> Result<i32> {
    i32::try_from(id).map_err(|_| IndexError::backing_store(format!("Object id {} out of range", id)))
}

impl IndexProvider for SqliteIndexProvider {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Schema
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn object_exists(&self, object_full_name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [object_full_name],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    fn provision_index(&self, metadata: &ObjectMetadata) -> Result<()> {
        metadata.validate()?;
        let table = metadata.full_name();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(&statements::create_table(&table, &metadata.indexes), [])?;
            for index in &metadata.indexes {
                tx.execute(&statements::create_index(&table, &index.name), [])?;
            }
            tx.commit()?;
            info!(object = %table, columns = metadata.indexes.len(), "index provisioned");
            Ok(())
        })
    }

    fn unprovision_index(&self, object_full_name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("DROP TABLE IF EXISTS {}", statements::quote_ident(object_full_name)),
                [],
            )?;
            info!(object = object_full_name, "index unprovisioned");
            Ok(())
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Mutation
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn upsert_index_values(&self, object_full_name: &str, object_id: i32, indexes: &[ObjectIndex]) -> Result<()> {
        self.with_conn(|conn| {
            let columns = provisioned_columns(conn, object_full_name)?;
            for index in indexes {
                check_field(&columns, object_full_name, &index.name)?;
            }

            let names: Vec<&str> = indexes.iter().map(|i| i.name.as_str()).collect();
            let sql = statements::upsert(object_full_name, &names);
            let params: Vec<IndexValue> = std::iter::once(IndexValue::Integer(i64::from(object_id)))
                .chain(indexes.iter().map(|i| columns.stored(&i.name, &i.value)))
                .collect();
            conn.execute(&sql, params_from_iter(params.iter()))?;
            debug!(object = object_full_name, object_id, "index values upserted");
            Ok(())
        })
    }

    fn bulk_upsert_index_values(
        &self,
        object_full_name: &str,
        metadata: &[ObjectIndexMetadata],
        rows: &[Vec<IndexValue>],
    ) -> Result<()> {
        self.with_conn(|conn| {
            let columns = provisioned_columns(conn, object_full_name)?;
            for index in metadata {
                check_field(&columns, object_full_name, &index.name)?;
            }
            let expected = metadata.len() + 1;
            for (i, row) in rows.iter().enumerate() {
                if row.len() != expected {
                    return Err(IndexError::validation(format!(
                        "Row {} has {} values, expected id + {} index values",
                        i,
                        row.len(),
                        metadata.len()
                    )));
                }
                if !matches!(row[0], IndexValue::Integer(_)) {
                    return Err(IndexError::validation(format!(
                        "Row {} does not start with an integer object id",
                        i
                    )));
                }
            }

            let names: Vec<&str> = metadata.iter().map(|m| m.name.as_str()).collect();
            let sql = statements::upsert(object_full_name, &names);
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&sql)?;
                for row in rows {
                    let params = std::iter::once(row[0].clone()).chain(
                        names
                            .iter()
                            .zip(&row[1..])
                            .map(|(name, value)| columns.stored(name, value)),
                    );
                    stmt.execute(params_from_iter(params))?;
                }
            }
            tx.commit()?;
            debug!(object = object_full_name, rows = rows.len(), "index values bulk upserted");
            Ok(())
        })
    }

    fn remove_index_values(&self, object_full_name: &str, object_ids: &[i32]) -> Result<()> {
        let chunk_size = self.limits.max_id_constraint.max(1);
        self.with_conn(|conn| {
            provisioned_columns(conn, object_full_name)?;
            if object_ids.is_empty() {
                return Ok(());
            }

            let tx = conn.transaction()?;
            for chunk in object_ids.chunks(chunk_size) {
                let sql = statements::delete_ids(object_full_name, chunk.len());
                tx.execute(&sql, params_from_iter(chunk.iter()))?;
            }
            tx.commit()?;
            debug!(
                object = object_full_name,
                ids = object_ids.len(),
                statements = object_ids.len().div_ceil(chunk_size),
                "index values removed"
            );
            Ok(())
        })
    }

    fn truncate(&self, object_full_name: &str) -> Result<()> {
        self.with_conn(|conn| {
            provisioned_columns(conn, object_full_name)?;
            conn.execute(
                &format!("DELETE FROM {}", statements::quote_ident(object_full_name)),
                [],
            )?;
            info!(object = object_full_name, "index truncated");
            Ok(())
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Predicate Execution
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn select_ids(
        &self,
        object_full_name: &str,
        predicate: Option<&Predicate>,
        limit: usize,
        order: Option<&OrderOptions>,
    ) -> Result<Vec<i32>> {
        self.with_conn(|conn| {
            let columns = provisioned_columns(conn, object_full_name)?;
            check_query_fields(&columns, object_full_name, predicate, order)?;

            let mut params = Vec::new();
            let mut sql = statements::select(
                object_full_name,
                &columns,
                &[ID_COLUMN.to_string()],
                predicate,
                order,
                &mut params,
            );
            if limit > 0 {
                sql.push_str(&format!(" LIMIT {}", limit));
            }
            debug!(sql = %sql, params = params.len(), "selecting ids");

            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map(params_from_iter(params.iter()), |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids.into_iter().map(to_object_id).collect()
        })
    }

    fn count_matching(&self, object_full_name: &str, predicate: Option<&Predicate>) -> Result<usize> {
        self.with_conn(|conn| {
            let columns = provisioned_columns(conn, object_full_name)?;
            check_query_fields(&columns, object_full_name, predicate, None)?;

            let mut params = Vec::new();
            let sql = statements::count(object_full_name, &columns, predicate, &mut params);
            debug!(sql = %sql, params = params.len(), "counting rows");
            let count: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
            Ok(count.max(0) as usize)
        })
    }

    fn iterate(
        &self,
        object_full_name: &str,
        options: &IterateOptions,
        metadata: &[ObjectIndexMetadata],
    ) -> Result<RowStream> {
        let predicate = options
            .constraint
            .as_deref()
            .map(|json| query::compile_json(json, metadata))
            .transpose()?;
        query::check_order(options.order.as_ref(), metadata)?;

        let fields: Vec<String> = match &options.selected_fields {
            Some(fields) => fields.clone(),
            None => std::iter::once(ID_COLUMN.to_string())
                .chain(metadata.iter().map(|m| m.name.clone()))
                .collect(),
        };
        let specs = fields
            .iter()
            .map(|field| {
                let data_type = query::field_type(field, metadata)?;
                let scale = metadata
                    .iter()
                    .find(|m| &m.name == field)
                    .map_or(0, |m| m.scale);
                Ok(ColumnSpec {
                    name: field.clone(),
                    data_type,
                    scale,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut params = Vec::new();
        let sql = self.with_conn(|conn| {
            let columns = provisioned_columns(conn, object_full_name)?;
            check_query_fields(&columns, object_full_name, predicate.as_ref(), options.order.as_ref())?;
            for field in &fields {
                check_field(&columns, object_full_name, field)?;
            }
            Ok(statements::select(
                object_full_name,
                &columns,
                &fields,
                predicate.as_ref(),
                options.order.as_ref(),
                &mut params,
            ))
        })?;

        Ok(Box::new(PagedRows::new(
            Arc::clone(&self.conn),
            sql,
            params,
            specs,
            options.limit,
            self.limits.iterate_page_size,
        )))
    }

    fn count_objects(&self, object_full_name: &str) -> Result<usize> {
        self.count_matching(object_full_name, None)
    }

    fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().take() {
            conn.close().map_err(|(_, err)| IndexError::from(err))?;
            debug!("sqlite index provider closed");
        }
        Ok(())
    }
}
