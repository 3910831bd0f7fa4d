//! Availability probing.
//!
//! Analytics data lands with a lag of a few days. Instead of assuming a fixed
//! lag, these functions walk backward through a bounded window issuing
//! one-row queries and report the newest day or month that has data.
//!
//! Probes never fail: any query error is logged and treated as "no data" so
//! the caller can fall back to a date-based default.

use chrono::{Datelike, Days, Months, NaiveDate};
use log::{debug, info, warn};

use crate::analytics::{Dimension, QueryRequest, SearchAnalytics, SearchType};
use crate::config::ProbeWindow;

/// An inclusive date range covering one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    /// First day of the month
    pub start: NaiveDate,
    /// Last day of the month
    pub end: NaiveDate,
}

impl MonthRange {
    /// The full calendar month `months_back` months before the month of `today`.
    pub fn preceding(today: NaiveDate, months_back: u32) -> Option<MonthRange> {
        let first_of_current = today.with_day(1)?;
        let start = first_of_current.checked_sub_months(Months::new(months_back))?;
        let end = start.checked_add_months(Months::new(1))? - Days::new(1);
        Some(MonthRange { start, end })
    }
}

/// Dimension used for existence checks.
const PROBE_DIMENSION: Dimension = Dimension::Query;

async fn has_data<A: SearchAnalytics>(
    analytics: &A,
    site: &str,
    search_type: SearchType,
    start: NaiveDate,
    end: NaiveDate,
) -> bool {
    let request = QueryRequest::new(start, end, vec![PROBE_DIMENSION])
        .with_search_type(search_type)
        .with_row_limit(1);
    match analytics.query(site, &request).await {
        Ok(result) => !result.is_empty(),
        Err(e) => {
            warn!("Probe for {site} ({start}..{end}) failed, treating as empty: {e}");
            false
        }
    }
}

/// Finds the day closest to `today` within the probe window that has data.
///
/// Days are probed from `today - min_day_lag` back to `today - max_day_lag`;
/// returns `None` when none of them has rows.
pub async fn find_latest_available_day<A: SearchAnalytics>(
    analytics: &A,
    site: &str,
    search_type: SearchType,
    today: NaiveDate,
    window: &ProbeWindow,
) -> Option<NaiveDate> {
    for lag in window.min_day_lag..=window.max_day_lag {
        let Some(day) = today.checked_sub_days(Days::new(u64::from(lag))) else {
            break;
        };
        debug!("Probing {site} for data on {day}");
        if has_data(analytics, site, search_type, day, day).await {
            info!("Latest day with data for {site}: {day}");
            return Some(day);
        }
    }
    info!(
        "No data for {site} between {} and {} days ago",
        window.min_day_lag, window.max_day_lag
    );
    None
}

/// Finds the most recent full calendar month before the current one that has data.
///
/// Probes 1, 2, ... `months_back` months back, most recent first.
pub async fn find_latest_complete_month<A: SearchAnalytics>(
    analytics: &A,
    site: &str,
    search_type: SearchType,
    today: NaiveDate,
    window: &ProbeWindow,
) -> Option<MonthRange> {
    for back in 1..=window.months_back {
        let month = MonthRange::preceding(today, back)?;
        debug!("Probing {site} for data in {}..{}", month.start, month.end);
        if has_data(analytics, site, search_type, month.start, month.end).await {
            info!("Latest month with data for {site}: {}", month.start.format("%Y-%m"));
            return Some(month);
        }
    }
    info!(
        "No data for {site} in the last {} full months",
        window.months_back
    );
    None
}
