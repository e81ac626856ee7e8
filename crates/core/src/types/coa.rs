//! Certificate of analysis (COA) records.
//!
//! A COA is a lab-test result attached to a product batch. Upstream they are
//! stored as metaobjects; this module holds the normalized output shape plus
//! the inclusion and ordering rules applied to it.

use std::cmp::Reverse;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A normalized COA record, serialized for storefront display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoaRecord {
    /// Upstream metaobject ID (e.g., `gid://shopify/Metaobject/123`).
    pub id: String,
    /// Test date as stored upstream.
    pub date: String,
    /// Display name of the associated product.
    pub product: String,
    /// Lot/batch identifier.
    pub batch_number: Option<String>,
    /// URL of the rendered certificate.
    pub pdf_link: Option<String>,
    /// Best-by date as stored upstream.
    pub best_by_date: Option<String>,
}

/// Offset-less date-time layouts accepted for a COA `date`.
const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Parsed sort key for a COA `date` value.
///
/// Accepts `YYYY-MM-DD` (treated as midnight UTC), RFC 3339 date-times
/// (normalized to UTC) and ISO date-times without an offset (taken as UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoaDate(NaiveDateTime);

impl CoaDate {
    /// Parse a date value, returning `None` if it is not a recognised format.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(Self(date.and_time(NaiveTime::MIN)));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Self(dt.naive_utc()));
        }

        NAIVE_DATE_TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(Self)
    }

    /// Get the underlying UTC date-time.
    #[must_use]
    pub const fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

/// Raw projected fields of one upstream object, before the inclusion check.
///
/// Each field is `None` when its wrapper was absent upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoaFields {
    pub id: String,
    pub date: Option<String>,
    pub product: Option<String>,
    pub batch_number: Option<String>,
    pub pdf_link: Option<String>,
    pub best_by_date: Option<String>,
}

/// A record that passed the inclusion check, paired with its parsed date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedCoa {
    pub date: CoaDate,
    pub record: CoaRecord,
}

impl CoaFields {
    /// Apply the inclusion predicate.
    ///
    /// Returns `None` unless `date` and `product` are both non-empty and
    /// `date` parses as a [`CoaDate`]. Empty optional fields become `None`.
    #[must_use]
    pub fn into_dated_record(self) -> Option<DatedCoa> {
        let date = non_empty(self.date)?;
        let product = non_empty(self.product)?;
        let parsed = CoaDate::parse(&date)?;

        Some(DatedCoa {
            date: parsed,
            record: CoaRecord {
                id: self.id,
                date,
                product,
                batch_number: non_empty(self.batch_number),
                pdf_link: non_empty(self.pdf_link),
                best_by_date: non_empty(self.best_by_date),
            },
        })
    }
}

/// Sort records newest first.
///
/// The sort is stable: records with equal dates keep their input order.
#[must_use]
pub fn sort_newest_first(mut records: Vec<DatedCoa>) -> Vec<CoaRecord> {
    records.sort_by_key(|r| Reverse(r.date));
    records.into_iter().map(|r| r.record).collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
