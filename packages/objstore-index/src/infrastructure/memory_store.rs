//! In-Memory Index Provider (for testing)
//!
//! HashMap-of-tables implementation evaluating predicates row by row with
//! SQL NULL semantics. Ordering follows SQLite: NULLs sort first ascending.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::domain::{
    fit_decimal, IndexProvider, IndexRow, IndexValue, IterateOptions, ObjectIndex, ObjectIndexMetadata,
    ObjectIndexType, ObjectMetadata, OrderOptions, RowStream, ID_COLUMN,
};
use crate::error::{IndexError, Result};
use crate::query::{self, Predicate, RowFilter};

type Row = HashMap<String, IndexValue>;

struct MemTable {
    columns: Vec<ObjectIndexMetadata>,
    rows: BTreeMap<i32, Row>,
}

impl MemTable {
    fn column(&self, name: &str) -> Option<&ObjectIndexMetadata> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn has_field(&self, name: &str) -> bool {
        name == ID_COLUMN || self.column(name).is_some()
    }

    fn check_field(&self, table: &str, name: &str) -> Result<()> {
        if self.has_field(name) {
            Ok(())
        } else {
            Err(IndexError::validation(format!(
                "Unknown index field '{}' for {}",
                name, table
            )))
        }
    }

    fn check_query(&self, table: &str, predicate: Option<&Predicate>, order: Option<&OrderOptions>) -> Result<()> {
        for clause in predicate.into_iter().flat_map(|p| p.clauses()) {
            self.check_field(table, &clause.field)?;
        }
        for field in order.into_iter().flat_map(|o| o.fields.iter()) {
            self.check_field(table, field)?;
        }
        Ok(())
    }

    /// Stored form of a value: numbers in a decimal column carry its scale
    fn normalize(&self, name: &str, value: &IndexValue) -> IndexValue {
        match (value, self.column(name)) {
            (IndexValue::Decimal(d), Some(column)) if column.data_type == ObjectIndexType::Decimal => {
                IndexValue::Decimal(fit_decimal(*d, column.scale))
            }
            (IndexValue::Integer(i), Some(column)) if column.data_type == ObjectIndexType::Decimal => {
                IndexValue::Decimal(fit_decimal(Decimal::from(*i), column.scale))
            }
            _ => value.clone(),
        }
    }

    fn merge(&mut self, table: &str, id: i32, values: &[(&str, &IndexValue)]) -> Result<()> {
        for (name, _) in values {
            if *name == ID_COLUMN || self.column(name).is_none() {
                return Err(IndexError::validation(format!(
                    "Unknown index field '{}' for {}",
                    name, table
                )));
            }
        }

        let mut row = self.rows.get(&id).cloned().unwrap_or_else(|| {
            let mut row: Row = self
                .columns
                .iter()
                .map(|c| (c.name.clone(), IndexValue::Null))
                .collect();
            row.insert(ID_COLUMN.to_string(), IndexValue::Integer(i64::from(id)));
            row
        });
        for (name, value) in values {
            row.insert((*name).to_string(), self.normalize(name, value));
        }

        if let Some(column) = self
            .columns
            .iter()
            .find(|c| !c.nullable && row.get(&c.name).map_or(true, IndexValue::is_null))
        {
            return Err(IndexError::backing_store(format!(
                "NOT NULL constraint failed: {}.{}",
                table, column.name
            )));
        }
        self.rows.insert(id, row);
        Ok(())
    }

    /// Matching rows in result order, truncated to `limit` (0 = all)
    fn select(&self, predicate: Option<&Predicate>, order: Option<&OrderOptions>, limit: usize) -> Result<Vec<&Row>> {
        let filter = predicate.map(RowFilter::new).transpose()?;
        let mut rows: Vec<&Row> = self
            .rows
            .values()
            .filter(|row| filter.as_ref().map_or(true, |f| f.matches(|c| row.get(c))))
            .collect();

        if let Some(order) = order.filter(|o| !o.fields.is_empty()) {
            // Stable sort keeps identity order among ties
            rows.sort_by(|a, b| {
                let ordering = order
                    .fields
                    .iter()
                    .map(|field| compare_nulls_first(a.get(field), b.get(field)))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal);
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        if limit > 0 {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}

fn compare_nulls_first(a: Option<&IndexValue>, b: Option<&IndexValue>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

fn row_id(row: &Row) -> Result<i32> {
    match row.get(ID_COLUMN) {
        Some(IndexValue::Integer(id)) => i32::try_from(*id)
            .map_err(|_| IndexError::backing_store(format!("Object id {} out of range", id))),
        _ => Err(IndexError::backing_store("Row without identity value")),
    }
}

/// In-memory IndexProvider
#[derive(Clone, Default)]
pub struct InMemoryIndexProvider {
    tables: Arc<RwLock<HashMap<String, MemTable>>>,
}

impl InMemoryIndexProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection settings are ignored
    pub fn from_settings(_settings: &ProviderSettings) -> Result<Self> {
        Ok(Self::new())
    }

    fn read<T>(&self, table: &str, f: impl FnOnce(&MemTable) -> Result<T>) -> Result<T> {
        let tables = self.tables.read();
        let mem = tables
            .get(table)
            .ok_or_else(|| IndexError::not_provisioned(table))?;
        f(mem)
    }

    fn write<T>(&self, table: &str, f: impl FnOnce(&mut MemTable) -> Result<T>) -> Result<T> {
        let mut tables = self.tables.write();
        let mem = tables
            .get_mut(table)
            .ok_or_else(|| IndexError::not_provisioned(table))?;
        f(mem)
    }
}

impl IndexProvider for InMemoryIndexProvider {
    fn object_exists(&self, object_full_name: &str) -> Result<bool> {
        Ok(self.tables.read().contains_key(object_full_name))
    }

    fn provision_index(&self, metadata: &ObjectMetadata) -> Result<()> {
        metadata.validate()?;
        let name = metadata.full_name();
        let mut tables = self.tables.write();
        if !tables.contains_key(&name) {
            tables.insert(
                name.clone(),
                MemTable {
                    columns: metadata.indexes.clone(),
                    rows: BTreeMap::new(),
                },
            );
            debug!(object = %name, "in-memory index provisioned");
        }
        Ok(())
    }

    fn unprovision_index(&self, object_full_name: &str) -> Result<()> {
        self.tables.write().remove(object_full_name);
        Ok(())
    }

    fn upsert_index_values(&self, object_full_name: &str, object_id: i32, indexes: &[ObjectIndex]) -> Result<()> {
        let values: Vec<(&str, &IndexValue)> = indexes.iter().map(|i| (i.name.as_str(), &i.value)).collect();
        self.write(object_full_name, |table| table.merge(object_full_name, object_id, &values))
    }

    fn bulk_upsert_index_values(
        &self,
        object_full_name: &str,
        metadata: &[ObjectIndexMetadata],
        rows: &[Vec<IndexValue>],
    ) -> Result<()> {
        self.write(object_full_name, |table| {
            let mut ids = Vec::with_capacity(rows.len());
            for (i, row) in rows.iter().enumerate() {
                if row.len() != metadata.len() + 1 {
                    return Err(IndexError::validation(format!(
                        "Row {} has {} values, expected id + {} index values",
                        i,
                        row.len(),
                        metadata.len()
                    )));
                }
                match row[0] {
                    IndexValue::Integer(id) => ids.push(i32::try_from(id).map_err(|_| {
                        IndexError::validation(format!("Object id {} out of range", id))
                    })?),
                    _ => {
                        return Err(IndexError::validation(format!(
                            "Row {} does not start with an integer object id",
                            i
                        )))
                    }
                }
            }

            // All-or-nothing, like the transactional providers
            let snapshot = table.rows.clone();
            for (id, row) in ids.into_iter().zip(rows) {
                let values: Vec<(&str, &IndexValue)> = metadata
                    .iter()
                    .map(|m| m.name.as_str())
                    .zip(row.iter().skip(1))
                    .collect();
                if let Err(err) = table.merge(object_full_name, id, &values) {
                    table.rows = snapshot;
                    return Err(err);
                }
            }
            Ok(())
        })
    }

    fn remove_index_values(&self, object_full_name: &str, object_ids: &[i32]) -> Result<()> {
        self.write(object_full_name, |table| {
            for id in object_ids {
                table.rows.remove(id);
            }
            Ok(())
        })
    }

    fn truncate(&self, object_full_name: &str) -> Result<()> {
        self.write(object_full_name, |table| {
            table.rows.clear();
            Ok(())
        })
    }

    fn select_ids(
        &self,
        object_full_name: &str,
        predicate: Option<&Predicate>,
        limit: usize,
        order: Option<&OrderOptions>,
    ) -> Result<Vec<i32>> {
        self.read(object_full_name, |table| {
            table.check_query(object_full_name, predicate, order)?;
            table
                .select(predicate, order, limit)?
                .into_iter()
                .map(row_id)
                .collect()
        })
    }

    fn count_matching(&self, object_full_name: &str, predicate: Option<&Predicate>) -> Result<usize> {
        self.read(object_full_name, |table| {
            table.check_query(object_full_name, predicate, None)?;
            Ok(table.select(predicate, None, 0)?.len())
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

        let rows = self.read(object_full_name, |table| {
            table.check_query(object_full_name, predicate.as_ref(), options.order.as_ref())?;
            let fields: Vec<String> = match &options.selected_fields {
                Some(fields) => fields.clone(),
                None => std::iter::once(ID_COLUMN.to_string())
                    .chain(table.columns.iter().map(|c| c.name.clone()))
                    .collect(),
            };
            for field in &fields {
                table.check_field(object_full_name, field)?;
            }

            let selected = table.select(predicate.as_ref(), options.order.as_ref(), options.limit)?;
            Ok(selected
                .into_iter()
                .map(|row| {
                    IndexRow::new(
                        fields
                            .iter()
                            .map(|f| (f.clone(), row.get(f).cloned().unwrap_or(IndexValue::Null)))
                            .collect(),
                    )
                })
                .collect::<Vec<_>>())
        })?;

        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
