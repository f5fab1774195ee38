//! In-memory doubles shared by unit tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::Result;
use crate::source::{Row, RowSource};

/// Vec-backed source that records the size of every chunk it returns
pub(crate) struct CountingSource {
    rows: Vec<Row>,
    cursor: usize,
    fetches: Arc<Mutex<Vec<usize>>>,
}

impl CountingSource {
    pub(crate) fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            cursor: 0,
            fetches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn fetches(&self) -> Arc<Mutex<Vec<usize>>> {
        Arc::clone(&self.fetches)
    }
}

#[async_trait]
impl RowSource for CountingSource {
    async fn fetch_many(&mut self, n: usize) -> Result<Vec<Row>> {
        let end = (self.cursor + n).min(self.rows.len());
        let chunk: Vec<Row> = self.rows[self.cursor..end].to_vec();
        self.cursor = end;
        self.fetches.lock().unwrap().push(chunk.len());
        Ok(chunk)
    }
}
