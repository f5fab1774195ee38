//! Shared doubles for integration tests

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use bookings_sync::{
    ApiConfig, Delivery, DeliveryReport, ExtractFilter, MySqlConfig, Result, Row, RowSource,
    SourceFactory, SyncConfig, SyncError,
};

pub fn make_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            let mut row = Row::new();
            row.insert("TJ".to_string(), serde_json::json!(format!("TJ{i}")));
            row.insert("Customer".to_string(), serde_json::json!("Acme"));
            row.insert(
                "TJAmount (in Sales Order currency)".to_string(),
                serde_json::json!("100.50"),
            );
            row
        })
        .collect()
}

pub fn make_config(watermark_path: &Path) -> SyncConfig {
    SyncConfig {
        mysql: MySqlConfig {
            host: "unused".to_string(),
            port: 3306,
            user: "unused".to_string(),
            password: "unused".to_string(),
            database: "bi_data".to_string(),
        },
        api: ApiConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
            retry_attempts: 3,
            backoff_base: Duration::from_millis(10),
        },
        batch_size: 200,
        fetch_size: 1000,
        floor_date: "2025-04-01".to_string(),
        watermark_path: watermark_path.to_path_buf(),
    }
}

/// In-memory source; the factory records the SQL of every opened filter
pub struct VecSource {
    rows: Vec<Row>,
    cursor: usize,
}

#[async_trait]
impl RowSource for VecSource {
    async fn fetch_many(&mut self, n: usize) -> Result<Vec<Row>> {
        let end = (self.cursor + n).min(self.rows.len());
        let chunk = self.rows[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(chunk)
    }
}

pub struct VecSourceFactory {
    rows: Vec<Row>,
    pub opened_sql: Arc<Mutex<Vec<String>>>,
}

impl VecSourceFactory {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            opened_sql: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl SourceFactory for VecSourceFactory {
    async fn open(&self, filter: &ExtractFilter) -> Result<Box<dyn RowSource>> {
        self.opened_sql.lock().unwrap().push(filter.to_sql());
        Ok(Box::new(VecSource {
            rows: self.rows.clone(),
            cursor: 0,
        }))
    }
}

/// What a [`RecordingDelivery`] should do on a given call
pub enum FailureKind {
    Auth,
    Exhausted,
}

/// Delivery double that records batch sizes and can fail on one call
pub struct RecordingDelivery {
    pub sizes: Arc<Mutex<Vec<usize>>>,
    fail_at: Option<(usize, FailureKind)>,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self {
            sizes: Arc::new(Mutex::new(Vec::new())),
            fail_at: None,
        }
    }

    pub fn failing_at(call: usize, kind: FailureKind) -> Self {
        Self {
            sizes: Arc::new(Mutex::new(Vec::new())),
            fail_at: Some((call, kind)),
        }
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn send(&self, batch: &[Row]) -> Result<DeliveryReport> {
        let call = {
            let mut sizes = self.sizes.lock().unwrap();
            sizes.push(batch.len());
            sizes.len()
        };

        if let Some((fail_call, kind)) = &self.fail_at {
            if call == *fail_call {
                return Err(match kind {
                    FailureKind::Auth => SyncError::AuthRejected,
                    FailureKind::Exhausted => SyncError::DeliveryExhausted {
                        attempts: 3,
                        last_error: "HTTP 500: boom".to_string(),
                    },
                });
            }
        }

        Ok(DeliveryReport {
            accepted: batch.len(),
            inserted: batch.len() as u64,
            updated: 0,
        })
    }

    async fn check(&self) -> Result<()> {
        Ok(())
    }
}
