//! Canonical event records and quarantine records
//!
//! Every decoder converges on [`NormalizedEventRecord`]. Input units that
//! cannot be converted become a [`DecodeFailure`], which the sink stamps
//! into an [`ErrorRecord`] at the moment it is written.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The canonical unit written to the warehouse
///
/// Absent optional fields serialize as `null` so every row carries the full
/// column set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEventRecord {
    pub user_id: String,
    pub event_name: String,
    /// Epoch seconds, UTC
    pub event_datetime: i64,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub os: Option<String>,
    pub app_version: Option<String>,
    pub state: Option<String>,
    /// Flattened source element; only archive-sourced records carry this
    pub event_parameters: Option<BTreeMap<String, Value>>,
    /// Decimal string, kept verbatim from the source
    pub proceeds_usd: Option<String>,
    /// Decimal string, kept verbatim from the source
    pub profile_total_revenue_usd: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl NormalizedEventRecord {
    /// Creates a record with only the required fields set
    pub fn new(
        user_id: impl Into<String>,
        event_name: impl Into<String>,
        event_datetime: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            event_name: event_name.into(),
            event_datetime,
            city: None,
            region: None,
            country: None,
            os: None,
            app_version: None,
            state: None,
            event_parameters: None,
            proceeds_usd: None,
            profile_total_revenue_usd: None,
            cancellation_reason: None,
        }
    }
}

/// A unit of input that could not be turned into a record
///
/// Not yet timestamped; see [`ErrorRecord::stamp`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeFailure {
    /// Original row or element, when one could be read
    pub row: Option<Value>,
    pub error: String,
    pub file_id: String,
    /// Archive entry name; `None` for CSV input and container-level failures
    pub entry: Option<String>,
}

impl DecodeFailure {
    pub fn new(file_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            row: None,
            error: error.into(),
            file_id: file_id.into(),
            entry: None,
        }
    }

    pub fn with_row(mut self, row: Value) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }
}

/// One line of the error log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub row: Option<Value>,
    pub error: String,
    pub file_id: String,
    pub entry: Option<String>,
    /// ISO-8601 UTC with microseconds, e.g. `2024-03-01T12:00:00.000000Z`
    pub timestamp: String,
}

impl ErrorRecord {
    /// Attaches the emission timestamp to a failure
    pub fn stamp(failure: DecodeFailure, at: DateTime<Utc>) -> Self {
        Self {
            row: failure.row,
            error: failure.error,
            file_id: failure.file_id,
            entry: failure.entry,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

/// What a decoder yields for each input unit
pub type DecodeOutcome = std::result::Result<NormalizedEventRecord, DecodeFailure>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_record_serializes_absent_fields_as_null() {
        let record = NormalizedEventRecord::new("U1", "first_event", 1672930800);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["user_id"], "U1");
        assert_eq!(value["event_datetime"], 1672930800);
        assert!(value["city"].is_null());
        assert!(value["event_parameters"].is_null());
        assert_eq!(value.as_object().unwrap().len(), 13);
    }

    #[test]
    fn test_error_record_stamp_format() {
        let failure = DecodeFailure::new("drops/a.zip", "bad json")
            .with_entry("part-1.json")
            .with_row(json!({"x": 1}));
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let record = ErrorRecord::stamp(failure, at);
        assert_eq!(record.timestamp, "2024-03-01T12:00:00.000000Z");
        assert_eq!(record.entry.as_deref(), Some("part-1.json"));
        assert_eq!(record.row, Some(json!({"x": 1})));
    }
}
