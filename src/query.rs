//! Extraction query construction
//!
//! The billing query joins jobs with their client, group and entity
//! lookup tables and aliases every column to the exact field names the
//! ingestion endpoint expects. The [`ExtractFilter`] decides which rows
//! qualify for a run; everything else about the query is fixed.

/// Hard lower bound on `job_created` for every run, `YYYY-MM-DD`
pub const DEFAULT_FLOOR_DATE: &str = "2025-04-01";

const BASE_QUERY: &str = "\
SELECT
    c.client_name                                    AS `Customer`,
    g.group_name                                     AS `Group`,
    sg.straker_group_name                            AS `Entity`,
    CONCAT('TJ', j.job_id)                           AS `TJ`,
    j.job_created                                    AS `Date`,
    j.quote                                          AS `TJAmount (in Sales Order currency)`,
    j.quote_nett                                     AS `TJAmount nett (in Sales Order currency)`,
    j.quote_currency                                 AS `Currency`,
    j.due_date                                       AS `Expected Due Date`,
    j.job_status                                     AS `Status`,
    j.completed_date                                 AS `Completed Date`,
    j.wip_completed_pct                              AS `WIP`,
    j.gross_margin                                   AS `Gross Margin`
FROM bi_data.jobs j
LEFT OUTER JOIN bi_data.clients c
    ON c.client_uuid = j.client_uuid
LEFT OUTER JOIN `groups` g
    ON g.group_uuid = j.group_uuid
LEFT OUTER JOIN straker_groups sg
    ON sg.straker_group_uuid = g.entity_uuid";

/// Row qualification for one sync run
///
/// `Full` takes every job on or after the floor date. `Incremental`
/// additionally requires that the job was created or completed since the
/// watermark, so records whose `completed_date` moved past the watermark
/// are re-extracted even when `job_created` is older.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractFilter {
    Full {
        floor_date: String,
    },
    Incremental {
        floor_date: String,
        since: String,
    },
}

impl ExtractFilter {
    pub fn full(floor_date: &str) -> Self {
        Self::Full {
            floor_date: floor_date.to_string(),
        }
    }

    pub fn incremental(floor_date: &str, since: &str) -> Self {
        Self::Incremental {
            floor_date: floor_date.to_string(),
            since: since.to_string(),
        }
    }

    /// Pick the filter for a run: a missing watermark degrades to a full
    /// extraction over the floor window.
    pub fn resolve(floor_date: &str, watermark: Option<&str>) -> Self {
        match watermark {
            Some(since) => Self::incremental(floor_date, since),
            None => Self::full(floor_date),
        }
    }

    pub fn is_incremental(&self) -> bool {
        matches!(self, Self::Incremental { .. })
    }

    /// WHERE clause for this filter
    ///
    /// The interpolated values are the configured floor date and our own
    /// previously written watermark, never external input.
    pub fn where_clause(&self) -> String {
        match self {
            Self::Full { floor_date } => {
                format!("WHERE j.job_created >= '{floor_date}'")
            }
            Self::Incremental { floor_date, since } => format!(
                "WHERE j.job_created >= '{floor_date}' \
                 AND (j.job_created >= '{since}' OR j.completed_date >= '{since}')"
            ),
        }
    }

    /// Complete extraction statement, newest jobs first
    pub fn to_sql(&self) -> String {
        format!("{BASE_QUERY}\n{}\nORDER BY j.job_created DESC", self.where_clause())
    }
}
