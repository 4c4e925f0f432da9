//! Lazy paged row stream for `iterate`

use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use super::values::{read_value, ColumnSpec};
use crate::domain::{IndexRow, IndexValue};
use crate::error::{IndexError, Result};

/// Fetches `LIMIT/OFFSET` pages on demand, locking the connection per page
pub(super) struct PagedRows {
    conn: Arc<Mutex<Option<Connection>>>,
    sql: String,
    params: Vec<IndexValue>,
    columns: Vec<ColumnSpec>,
    limit: usize,
    page_size: usize,
    offset: usize,
    buffer: VecDeque<IndexRow>,
    done: bool,
}

impl PagedRows {
    pub(super) fn new(
        conn: Arc<Mutex<Option<Connection>>>,
        sql: String,
        params: Vec<IndexValue>,
        columns: Vec<ColumnSpec>,
        limit: usize,
        page_size: usize,
    ) -> Self {
        Self {
            conn,
            sql,
            params,
            columns,
            limit,
            page_size: page_size.max(1),
            offset: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn fetch_page(&mut self) -> Result<()> {
        let take = if self.limit > 0 {
            self.page_size.min(self.limit - self.offset)
        } else {
            self.page_size
        };
        if take == 0 {
            self.done = true;
            return Ok(());
        }

        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| IndexError::backing_store("Index provider is closed"))?;

        let sql = format!("{} LIMIT {} OFFSET {}", self.sql, take, self.offset);
        debug!(sql = %sql, "fetching index rows");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(self.params.iter()))?;

        let mut fetched = 0;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(self.columns.len());
            for (i, column) in self.columns.iter().enumerate() {
                values.push((column.name.clone(), read_value(column, row.get_ref(i)?)?));
            }
            self.buffer.push_back(IndexRow::new(values));
            fetched += 1;
        }

        self.offset += fetched;
        if fetched < take {
            self.done = true;
        }
        Ok(())
    }
}

impl Iterator for PagedRows {
    type Item = Result<IndexRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            if let Err(err) = self.fetch_page() {
                self.done = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
