//! Delivery batching
//!
//! Groups extracted rows into fixed-size batches for the delivery
//! channel. Batch size is independent of the source fetch size; only
//! the final batch of a run may be short.

use crate::error::Result;
use crate::extract::RowExtractor;
use crate::source::Row;

pub struct Batcher {
    extractor: RowExtractor,
    batch_size: usize,
}

impl Batcher {
    pub fn new(extractor: RowExtractor, batch_size: usize) -> Self {
        Self {
            extractor,
            batch_size: batch_size.max(1),
        }
    }

    /// Total rows pulled through the batcher so far
    pub fn rows_seen(&self) -> u64 {
        self.extractor.rows_yielded()
    }

    /// Next batch of up to `batch_size` rows, `None` when the run is done
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.extractor.next_row().await? {
                Some(row) => batch.push(row),
                None => break,
            }
        }

        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
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

    fn batcher(total: usize, fetch_size: usize, batch_size: usize) -> Batcher {
        let source = CountingSource::new(rows(total));
        Batcher::new(RowExtractor::new(Box::new(source), fetch_size), batch_size)
    }

    async fn batch_sizes(mut b: Batcher) -> Vec<usize> {
        let mut sizes = Vec::new();
        while let Some(batch) = b.next_batch().await.unwrap() {
            sizes.push(batch.len());
        }
        sizes
    }

    #[tokio::test]
    async fn test_550_rows_in_batches_of_200() {
        let sizes = batch_sizes(batcher(550, 1000, 200)).await;
        assert_eq!(sizes, vec![200, 200, 150]);
    }

    #[tokio::test]
    async fn test_batch_count_is_ceiling() {
        assert_eq!(batch_sizes(batcher(400, 1000, 200)).await.len(), 2);
        assert_eq!(batch_sizes(batcher(401, 1000, 200)).await.len(), 3);
        assert_eq!(batch_sizes(batcher(1, 1000, 200)).await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_yields_no_batches() {
        let mut b = batcher(0, 1000, 200);
        assert!(b.next_batch().await.unwrap().is_none());
        assert_eq!(b.rows_seen(), 0);
    }

    #[tokio::test]
    async fn test_fetch_size_does_not_affect_batch_shape() {
        // Fetch chunks smaller than the batch still fill whole batches.
        let sizes = batch_sizes(batcher(550, 30, 200)).await;
        assert_eq!(sizes, vec![200, 200, 150]);
    }

    #[tokio::test]
    async fn test_order_preserved_across_batches() {
        let mut b = batcher(5, 2, 2);
        let mut seen = Vec::new();
        while let Some(batch) = b.next_batch().await.unwrap() {
            for row in &batch {
                seen.push(row["TJ"].as_str().unwrap().to_string());
            }
        }
        assert_eq!(seen, vec!["TJ0", "TJ1", "TJ2", "TJ3", "TJ4"]);
        assert_eq!(b.rows_seen(), 5);
    }
}
