//! # bookings-sync
//!
//! Incremental sync of billing/job records from a MySQL reporting
//! database to a webhook ingestion endpoint.
//!
//! Each run extracts the jobs created or completed since the previous
//! run (tracked by a file-persisted watermark), streams them through
//! bounded fetch chunks, and POSTs them in fixed-size JSON batches
//! with retry and exponential backoff. The watermark only advances
//! after the whole run succeeds, so a failed run is re-extracted next
//! time; the endpoint upserts, making redelivery harmless.
//!
//! Pipeline stages, each behind its own seam:
//!
//! - [`watermark::WatermarkStore`]: atomic read/write of the last run start
//! - [`query::ExtractFilter`]: full vs incremental row qualification
//! - [`source::RowSource`]: chunked streaming out of MySQL
//! - [`extract::RowExtractor`] and [`batch::Batcher`]: rows to batches
//! - [`delivery::Delivery`]: retrying webhook POSTs
//! - [`sync::SyncRunner`]: the run state machine tying it together

pub mod batch;
pub mod config;
pub mod delivery;
pub mod error;
pub mod extract;
pub mod query;
pub mod source;
pub mod sync;
pub mod watermark;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{ApiConfig, MySqlConfig, SyncConfig};
pub use delivery::{Delivery, DeliveryReport, NoopDelivery, WebhookDelivery};
pub use error::{Result, SyncError};
pub use query::ExtractFilter;
pub use source::{MySqlSourceFactory, Row, RowSource, SourceFactory};
pub use sync::{SyncMode, SyncOptions, SyncReport, SyncRunner};
pub use watermark::WatermarkStore;
