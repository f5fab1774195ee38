//! Row extraction
//!
//! [`RowExtractor`] turns a chunked [`RowSource`] into a one-row-at-a-time
//! pull. It keeps at most one fetch chunk buffered, which is what bounds
//! pipeline memory independently of the delivery batch size.

use std::collections::VecDeque;

use tracing::debug;

use crate::error::Result;
use crate::source::{Row, RowSource};

pub struct RowExtractor {
    source: Box<dyn RowSource>,
    buffer: VecDeque<Row>,
    fetch_size: usize,
    exhausted: bool,
    rows_yielded: u64,
}

impl RowExtractor {
    pub fn new(source: Box<dyn RowSource>, fetch_size: usize) -> Self {
        Self {
            source,
            buffer: VecDeque::new(),
            fetch_size: fetch_size.max(1),
            exhausted: false,
            rows_yielded: 0,
        }
    }

    /// Rows handed out so far
    pub fn rows_yielded(&self) -> u64 {
        self.rows_yielded
    }

    /// Next row, or `None` once the source is drained
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.buffer.is_empty() && !self.exhausted {
            let chunk = self.source.fetch_many(self.fetch_size).await?;
            // The source contract: a short chunk only happens at the end.
            if chunk.len() < self.fetch_size {
                self.exhausted = true;
            }
            if !chunk.is_empty() {
                debug!(rows = chunk.len(), "fetched chunk from source");
            }
            self.buffer.extend(chunk);
        }

        let row = self.buffer.pop_front();
        if row.is_some() {
            self.rows_yielded += 1;
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::CountingSource;

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| {
                let mut row = Row::new();
                row.insert("TJ".to_string(), serde_json::json!(format!("TJ{i}")));
                row
            })
            .collect()
    }

    #[tokio::test]
    async fn test_yields_all_rows_in_order() {
        let source = CountingSource::new(rows(7));
        let mut extractor = RowExtractor::new(Box::new(source), 3);

        let mut seen = Vec::new();
        while let Some(row) = extractor.next_row().await.unwrap() {
            seen.push(row["TJ"].as_str().unwrap().to_string());
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(seen[0], "TJ0");
        assert_eq!(seen[6], "TJ6");
        assert_eq!(extractor.rows_yielded(), 7);
    }

    #[tokio::test]
    async fn test_fetches_in_chunks() {
        let source = CountingSource::new(rows(10));
        let fetches = source.fetches();
        let mut extractor = RowExtractor::new(Box::new(source), 4);

        while extractor.next_row().await.unwrap().is_some() {}
        // 4 + 4 + 2; the short final chunk marks exhaustion.
        assert_eq!(*fetches.lock().unwrap(), vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_trailing_empty_fetch() {
        let source = CountingSource::new(rows(8));
        let fetches = source.fetches();
        let mut extractor = RowExtractor::new(Box::new(source), 4);

        while extractor.next_row().await.unwrap().is_some() {}
        // The last full chunk forces one extra fetch that comes back empty.
        assert_eq!(*fetches.lock().unwrap(), vec![4, 4, 0]);
        assert_eq!(extractor.rows_yielded(), 8);
    }

    #[tokio::test]
    async fn test_empty_source() {
        let source = CountingSource::new(Vec::new());
        let mut extractor = RowExtractor::new(Box::new(source), 4);
        assert!(extractor.next_row().await.unwrap().is_none());
        assert_eq!(extractor.rows_yielded(), 0);
    }
}
