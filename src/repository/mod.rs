//! Repository layer for database persistence.
//!
//! All database access uses Diesel with diesel-async's
//! SyncConnectionWrapper for async SQLite support. Timestamps are stored
//! as fixed-width RFC 3339 TEXT so lexicographic comparison in SQL matches
//! chronological order.

mod claim;
mod company;
mod context;
mod crawl;
mod event;
mod evidence;
mod lock;
mod pool;
mod records;

pub use claim::ClaimRepository;
pub use company::CompanyRepository;
pub use context::DbContext;
pub use crawl::CrawlRepository;
pub use event::EventRepository;
pub use evidence::EvidenceRepository;
pub use lock::LockRepository;
pub use pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a datetime for storage: UTC RFC 3339 with microseconds.
pub fn fmt_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in storage format.
pub fn now_str() -> String {
    fmt_datetime(Utc::now())
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_round_trip() {
        let now = Utc::now();
        let parsed = parse_datetime(&fmt_datetime(now));
        // Storage precision is microseconds.
        assert!((parsed - now).num_microseconds().unwrap_or(0).abs() < 2);
    }

    #[test]
    fn test_storage_format_orders_lexicographically() {
        let early = fmt_datetime(parse_datetime("2026-01-02T03:04:05.000001Z"));
        let late = fmt_datetime(parse_datetime("2026-01-02T03:04:05.000002Z"));
        assert!(early < late);
    }

    #[test]
    fn test_parse_datetime_bad_input() {
        assert_eq!(parse_datetime("not a date"), DateTime::UNIX_EPOCH);
        assert_eq!(parse_datetime_opt(None), None);
    }
}
