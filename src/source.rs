//! Row sources
//!
//! A [`RowSource`] hands out rows in bounded chunks so the pipeline
//! never holds more than a couple of fetch chunks in memory, no matter
//! how large the result set is. The MySQL implementation streams the
//! extraction query through an unbuffered cursor on a background task
//! and bridges it into fetch-many calls over a bounded channel.

use async_trait::async_trait;
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::MySqlConfig;
use crate::error::{Result, SyncError};
use crate::query::ExtractFilter;

/// One extracted record, column alias to JSON value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Chunked access to an extraction result set
#[async_trait]
pub trait RowSource: Send {
    /// Fetch up to `n` rows
    ///
    /// Returns fewer than `n` rows only when the result set is
    /// exhausted; an empty vec means there is nothing left.
    async fn fetch_many(&mut self, n: usize) -> Result<Vec<Row>>;
}

/// Opens a [`RowSource`] for a resolved filter
#[async_trait]
pub trait SourceFactory: Send + Sync {
    async fn open(&self, filter: &ExtractFilter) -> Result<Box<dyn RowSource>>;
}

/// MySQL-backed row source
///
/// The connection and its streaming query result live on a spawned
/// task; rows arrive over a channel whose capacity bounds how far the
/// producer can run ahead of delivery.
pub struct MySqlRowSource {
    rx: mpsc::Receiver<Result<Row>>,
    exhausted: bool,
}

impl MySqlRowSource {
    pub async fn connect(
        config: &MySqlConfig,
        filter: &ExtractFilter,
        fetch_size: usize,
    ) -> Result<Self> {
        let opts = Opts::from(
            OptsBuilder::default()
                .ip_or_hostname(config.host.clone())
                .tcp_port(config.port)
                .user(Some(config.user.clone()))
                .pass(Some(config.password.clone()))
                .db_name(Some(config.database.clone())),
        );

        let mut conn = Conn::new(opts).await.map_err(|e| {
            SyncError::source(format!(
                "failed to connect to MySQL at {}:{}: {e}",
                config.host, config.port
            ))
        })?;
        info!(
            host = %config.host,
            database = %config.database,
            "connected to MySQL"
        );

        let sql = filter.to_sql();
        let (tx, rx) = mpsc::channel(fetch_size.max(1));

        tokio::spawn(async move {
            let mut result = match conn.query_iter(sql).await {
                Ok(result) => result,
                Err(e) => {
                    let _ = tx
                        .send(Err(SyncError::source(format!("query rejected: {e}"))))
                        .await;
                    return;
                }
            };

            loop {
                match result.next().await {
                    Ok(Some(row)) => {
                        // A closed receiver means the pipeline gave up; stop streaming.
                        if tx.send(Ok(row_to_json(row))).await.is_err() {
                            warn!("row consumer dropped before result set was drained");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx
                            .send(Err(SyncError::source(format!("row fetch failed: {e}"))))
                            .await;
                        break;
                    }
                }
            }

            drop(result);
            if let Err(e) = conn.disconnect().await {
                debug!("error closing MySQL connection: {e}");
            }
        });

        Ok(Self {
            rx,
            exhausted: false,
        })
    }
}

#[async_trait]
impl RowSource for MySqlRowSource {
    async fn fetch_many(&mut self, n: usize) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(n);
        while rows.len() < n && !self.exhausted {
            match self.rx.recv().await {
                Some(Ok(row)) => rows.push(row),
                Some(Err(e)) => return Err(e),
                None => self.exhausted = true,
            }
        }
        Ok(rows)
    }
}

/// [`SourceFactory`] producing [`MySqlRowSource`] instances
pub struct MySqlSourceFactory {
    config: MySqlConfig,
    fetch_size: usize,
}

impl MySqlSourceFactory {
    pub fn new(config: MySqlConfig, fetch_size: usize) -> Self {
        Self { config, fetch_size }
    }
}

#[async_trait]
impl SourceFactory for MySqlSourceFactory {
    async fn open(&self, filter: &ExtractFilter) -> Result<Box<dyn RowSource>> {
        let source = MySqlRowSource::connect(&self.config, filter, self.fetch_size).await?;
        Ok(Box::new(source))
    }
}

fn row_to_json(row: mysql_async::Row) -> Row {
    let columns = row.columns();
    let mut map = Row::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        let value: mysql_async::Value = row.get(i).unwrap_or(mysql_async::Value::NULL);
        map.insert(
            column.name_str().into_owned(),
            mysql_value_to_json(value, column.column_type()),
        );
    }
    map
}

/// Convert a MySQL text-protocol value into its JSON representation
///
/// DECIMAL arrives as bytes and stays a string so no precision is
/// lost. DATE columns render as `YYYY-MM-DD`; DATETIME and TIMESTAMP
/// render in the same second-precision ISO form as the watermark.
fn mysql_value_to_json(value: mysql_async::Value, column_type: ColumnType) -> serde_json::Value {
    use mysql_async::Value;

    match value {
        Value::NULL => serde_json::Value::Null,
        Value::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => serde_json::Value::String(s),
            Err(e) => {
                serde_json::Value::String(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        },
        Value::Int(n) => serde_json::Value::from(n),
        Value::UInt(n) => serde_json::Value::from(n),
        Value::Float(f) => serde_json::Value::from(f as f64),
        Value::Double(d) => serde_json::Value::from(d),
        Value::Date(year, month, day, hour, min, sec, micro) => {
            let rendered = if column_type == ColumnType::MYSQL_TYPE_DATE {
                format!("{year:04}-{month:02}-{day:02}")
            } else if micro > 0 {
                format!(
                    "{year:04}-{month:02}-{day:02}T{hour:02}:{min:02}:{sec:02}.{micro:06}"
                )
            } else {
                format!("{year:04}-{month:02}-{day:02}T{hour:02}:{min:02}:{sec:02}")
            };
            serde_json::Value::String(rendered)
        }
        Value::Time(neg, days, hours, mins, secs, _micro) => {
            let total_hours = u32::from(days) * 24 + u32::from(hours);
            let sign = if neg { "-" } else { "" };
            serde_json::Value::String(format!("{sign}{total_hours:02}:{mins:02}:{secs:02}"))
        }
    }
}
