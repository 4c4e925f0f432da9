//! Index Provider Port (Trait Interface)
//!
//! Port/Adapter pattern for backing-store flexibility:
//! - Reference: SQLite (relational, parameterized statements)
//! - Testing: InMemory (predicate evaluated row by row)
//!
//! Providers implement the predicate-level primitives; the flat and JSON
//! query overloads are provided on top of them.

use super::models::{FindOptions, IndexRow, ObjectIndex, ObjectIndexMetadata, ObjectMetadata, OrderOptions};
use super::value::IndexValue;
use crate::error::Result;
use crate::query::{self, Predicate};

/// Lazy sequence of index rows produced by `iterate`.
///
/// Each call to `iterate` returns an independent stream.
pub type RowStream = Box<dyn Iterator<Item = Result<IndexRow>> + Send>;

/// Options for `iterate`
#[derive(Debug, Clone, Default)]
pub struct IterateOptions {
    /// JSON constraint; `None` iterates every row
    pub constraint: Option<String>,
    /// 0 = unlimited
    pub limit: usize,
    pub order: Option<OrderOptions>,
    /// Columns to yield; `None` = identity column + every declared column
    pub selected_fields: Option<Vec<String>>,
}

impl IterateOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_order(mut self, order: OrderOptions) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.selected_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// Index Provider Port (Primary Interface)
///
/// All backing stores must implement this trait. Every operation except
/// `object_exists`, `unprovision_index` and `close` fails with
/// `NotProvisioned` when the object type has no index structures.
pub trait IndexProvider: Send + Sync {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Schema
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Whether index structures exist for the object type
    fn object_exists(&self, object_full_name: &str) -> Result<bool>;

    /// Create-if-absent one column per declared index plus the identity
    /// column, with a lookup index on every declared column.
    ///
    /// Calling twice with the same metadata is a no-op.
    fn provision_index(&self, metadata: &ObjectMetadata) -> Result<()>;

    /// Drop every index structure of the object type (idempotent)
    fn unprovision_index(&self, object_full_name: &str) -> Result<()>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Mutation
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Update-or-insert one row keyed by `object_id` (atomic merge)
    fn upsert_index_values(
        &self,
        object_full_name: &str,
        object_id: i32,
        indexes: &[ObjectIndex],
    ) -> Result<()>;

    /// Batched upsert. Each row is `[id, v1, .., vn]` with values in
    /// `metadata` order.
    fn bulk_upsert_index_values(
        &self,
        object_full_name: &str,
        metadata: &[ObjectIndexMetadata],
        rows: &[Vec<IndexValue>],
    ) -> Result<()>;

    /// Delete rows; large id lists are chunked transparently
    fn remove_index_values(&self, object_full_name: &str, object_ids: &[i32]) -> Result<()>;

    fn remove_index_value(&self, object_full_name: &str, object_id: i32) -> Result<()> {
        self.remove_index_values(object_full_name, &[object_id])
    }

    /// Delete all rows, keep schema
    fn truncate(&self, object_full_name: &str) -> Result<()>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Predicate Execution
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Ids of rows matching `predicate` (`None` = every row).
    ///
    /// Ordered by `order`, or by the identity column when absent.
    /// `limit == 0` returns every match.
    fn select_ids(
        &self,
        object_full_name: &str,
        predicate: Option<&Predicate>,
        limit: usize,
        order: Option<&OrderOptions>,
    ) -> Result<Vec<i32>>;

    /// Number of rows matching `predicate`
    fn count_matching(&self, object_full_name: &str, predicate: Option<&Predicate>) -> Result<usize>;

    /// Rows matching the options, fetched lazily
    fn iterate(
        &self,
        object_full_name: &str,
        options: &IterateOptions,
        metadata: &[ObjectIndexMetadata],
    ) -> Result<RowStream>;

    /// Total rows stored for the object type
    fn count_objects(&self, object_full_name: &str) -> Result<usize> {
        self.count_matching(object_full_name, None)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Flat Queries (uniform operator)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn exists(&self, object_full_name: &str, options: &FindOptions, indexes: &[ObjectIndex]) -> Result<bool> {
        let predicate = Predicate::from_indexes(options, indexes)?;
        let ids = self.select_ids(object_full_name, predicate.as_ref(), 1, None)?;
        Ok(!ids.is_empty())
    }

    fn count(&self, object_full_name: &str, options: &FindOptions, indexes: &[ObjectIndex]) -> Result<usize> {
        let predicate = Predicate::from_indexes(options, indexes)?;
        self.count_matching(object_full_name, predicate.as_ref())
    }

    fn find(&self, object_full_name: &str, options: &FindOptions, indexes: &[ObjectIndex]) -> Result<Vec<i32>> {
        let predicate = Predicate::from_indexes(options, indexes)?;
        self.select_ids(
            object_full_name,
            predicate.as_ref(),
            options.limit,
            options.order.as_ref(),
        )
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // JSON Constraint Queries
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn exists_where(
        &self,
        object_full_name: &str,
        constraint: &str,
        metadata: &[ObjectIndexMetadata],
    ) -> Result<bool> {
        let predicate = query::compile_json(constraint, metadata)?;
        let ids = self.select_ids(object_full_name, Some(&predicate), 1, None)?;
        Ok(!ids.is_empty())
    }

    fn count_where(
        &self,
        object_full_name: &str,
        constraint: &str,
        metadata: &[ObjectIndexMetadata],
    ) -> Result<usize> {
        let predicate = query::compile_json(constraint, metadata)?;
        self.count_matching(object_full_name, Some(&predicate))
    }

    fn find_where(
        &self,
        object_full_name: &str,
        constraint: &str,
        limit: usize,
        order: Option<&OrderOptions>,
        metadata: &[ObjectIndexMetadata],
    ) -> Result<Vec<i32>> {
        let predicate = query::compile_json(constraint, metadata)?;
        query::check_order(order, metadata)?;
        self.select_ids(object_full_name, Some(&predicate), limit, order)
    }

    /// Release backing-store resources (idempotent)
    fn close(&self) -> Result<()>;
}
