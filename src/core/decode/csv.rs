//! Delimited-text decoder
//!
//! Reads header-named rows and maps them onto [`NormalizedEventRecord`].
//! Each row is converted independently; a bad row becomes a
//! [`DecodeFailure`] and decoding carries on with the next one.

use crate::domain::{DecodeFailure, DecodeOutcome, NormalizedEventRecord};
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use serde_json::{Map, Value};
use std::io::Read;

/// Timestamp layout of the `event_datetime` column, e.g. `January 5, 2023, 3:00 PM`
pub const EVENT_DATETIME_FORMAT: &str = "%B %d, %Y, %I:%M %p";

const USER_ID: &str = "user_id";
const EVENT_NAME_COLUMNS: [&str; 2] = ["Event_Name", "event_name"];
const EVENT_DATETIME: &str = "event_datetime";

/// Parse an `event_datetime` cell into epoch seconds
///
/// The wall-clock value carries no zone and is read as UTC.
///
/// # Examples
///
/// ```
/// use sluice::core::decode::csv::parse_event_datetime;
///
/// assert_eq!(parse_event_datetime("January 5, 2023, 3:00 PM").unwrap(), 1672930800);
/// assert!(parse_event_datetime("2023-01-05 15:00").is_err());
/// ```
pub fn parse_event_datetime(raw: &str) -> Result<i64, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw.trim(), EVENT_DATETIME_FORMAT)
        .map(|naive| naive.and_utc().timestamp())
}

/// Lazy iterator over the rows of one delimited-text file
///
/// Finite and not restartable; decoding again means building a new one
/// from a fresh read of the blob.
pub struct CsvRecords<R: Read> {
    file_id: String,
    headers: Option<StringRecord>,
    rows: Option<StringRecordsIntoIter<R>>,
    header_failure: Option<DecodeFailure>,
}

/// Decode a delimited-text blob with a header row
pub fn decode_csv<R: Read>(file_id: impl Into<String>, reader: R) -> CsvRecords<R> {
    let file_id = file_id.into();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    match reader.headers().cloned() {
        Ok(headers) => {
            CsvRecords {
                file_id,
                headers: Some(headers),
                rows: Some(reader.into_records()),
                header_failure: None,
            }
        }
        Err(e) => {
            let failure =
                DecodeFailure::new(file_id.clone(), format!("unreadable header row: {e}"));
            CsvRecords {
                file_id,
                headers: None,
                rows: None,
                header_failure: Some(failure),
            }
        }
    }
}

impl<R: Read> Iterator for CsvRecords<R> {
    type Item = DecodeOutcome;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(failure) = self.header_failure.take() {
            return Some(Err(failure));
        }

        let headers = self.headers.as_ref()?;
        let rows = self.rows.as_mut()?;

        match rows.next()? {
            Ok(record) => Some(convert_row(&self.file_id, headers, &record)),
            Err(e) => {
                let line = e.position().map(|p| p.line());
                // An I/O failure leaves the reader in an unknown state.
                if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                    self.rows = None;
                }
                let message = match line {
                    Some(line) => format!("line {line}: unreadable row: {e}"),
                    None => format!("unreadable row: {e}"),
                };
                Some(Err(DecodeFailure::new(self.file_id.clone(), message)))
            }
        }
    }
}

/// Build a record from one row, or explain why not
fn convert_row(file_id: &str, headers: &StringRecord, record: &StringRecord) -> DecodeOutcome {
    let row = row_to_map(headers, record);
    let line = record.position().map(|p| p.line()).unwrap_or_default();

    let fail = |reason: String| {
        Err(DecodeFailure::new(file_id, format!("line {line}: {reason}"))
            .with_row(Value::Object(row.clone())))
    };

    let Some(user_id) = cell(&row, USER_ID) else {
        return fail(format!("missing required field '{USER_ID}'"));
    };

    let Some(event_name) = EVENT_NAME_COLUMNS.iter().find_map(|c| cell(&row, c)) else {
        return fail(format!(
            "missing required field '{}'",
            EVENT_NAME_COLUMNS[0]
        ));
    };

    let Some(raw_datetime) = cell(&row, EVENT_DATETIME) else {
        return fail(format!("missing required field '{EVENT_DATETIME}'"));
    };

    let event_datetime = match parse_event_datetime(raw_datetime) {
        Ok(ts) => ts,
        Err(e) => {
            return fail(format!(
                "invalid {EVENT_DATETIME} '{raw_datetime}' (expected e.g. 'January 5, 2023, 3:00 PM'): {e}"
            ))
        }
    };

    let optional = |name: &str| cell(&row, name).map(str::to_string);

    let mut record = NormalizedEventRecord::new(user_id, event_name, event_datetime);
    record.city = optional("city");
    record.region = optional("region");
    record.country = optional("country");
    record.os = optional("os");
    record.app_version = optional("app_version");
    record.state = optional("state");
    record.proceeds_usd = optional("proceeds_usd");
    record.profile_total_revenue_usd = optional("profile_total_revenue_usd");
    record.cancellation_reason = optional("cancellation_reason");

    Ok(record)
}

fn row_to_map(headers: &StringRecord, record: &StringRecord) -> Map<String, Value> {
    headers
        .iter()
        .zip(record.iter())
        .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
        .collect()
}

/// Non-empty cell value by column name
fn cell<'a>(row: &'a Map<String, Value>, column: &str) -> Option<&'a str> {
    row.get(column)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "user_id,Event_Name,event_datetime,proceeds_usd,cancellation_reason";

    fn decode(text: &str) -> Vec<DecodeOutcome> {
        decode_csv("drops/events.csv", text.as_bytes()).collect()
    }

    #[test]
    fn test_end_to_end_row() {
        let text = format!("{HEADER}\nU1,first_event,\"January 5, 2023, 3:00 PM\",9.99,\n");
        let outcomes = decode(&text);

        assert_eq!(outcomes.len(), 1);
        let record = outcomes[0].as_ref().unwrap();
        assert_eq!(record.user_id, "U1");
        assert_eq!(record.event_name, "first_event");
        assert_eq!(record.event_datetime, 1672930800);
        assert_eq!(record.proceeds_usd.as_deref(), Some("9.99"));
        assert_eq!(record.cancellation_reason, None);
        assert_eq!(record.event_parameters, None);
        assert_eq!(record.city, None);
    }

    #[test]
    fn test_row_isolation_independent_of_position() {
        let good = [
            "U1,first_event,\"January 5, 2023, 3:00 PM\",,",
            "U2,subscription_started,\"February 14, 2023, 11:30 AM\",4.99,",
            "U3,subscription_cancelled,\"March 1, 2023, 12:00 AM\",,too expensive",
        ];
        let bad = "U4,first_event,yesterday,,";

        for position in 0..=good.len() {
            let mut lines: Vec<&str> = good.to_vec();
            lines.insert(position, bad);
            let text = format!("{HEADER}\n{}\n", lines.join("\n"));

            let outcomes = decode(&text);
            let records: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
            let failures: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().err()).collect();

            assert_eq!(records.len(), 3, "bad row at position {position}");
            assert_eq!(failures.len(), 1, "bad row at position {position}");
            let ids: Vec<_> = records.iter().map(|r| r.user_id.as_str()).collect();
            assert_eq!(ids, vec!["U1", "U2", "U3"]);

            // Header is line 1
            let expected_line = format!("line {}:", position + 2);
            assert!(failures[0].error.starts_with(&expected_line));
            assert_eq!(failures[0].row.as_ref().unwrap()["user_id"], "U4");
            assert_eq!(failures[0].entry, None);
        }
    }

    #[test]
    fn test_missing_required_fields() {
        let text = format!(
            "{HEADER}\n,first_event,\"January 5, 2023, 3:00 PM\",,\nU2,,\"January 5, 2023, 3:00 PM\",,\n"
        );
        let outcomes = decode(&text);

        assert_eq!(outcomes.len(), 2);
        let first = outcomes[0].as_ref().unwrap_err();
        assert!(first.error.contains("user_id"));
        let second = outcomes[1].as_ref().unwrap_err();
        assert!(second.error.contains("Event_Name"));
    }

    #[test]
    fn test_lowercase_event_name_column() {
        let text = "user_id,event_name,event_datetime\nU1,first_event,\"December 31, 2022, 11:59 PM\"\n";
        let outcomes = decode(text);

        let record = outcomes[0].as_ref().unwrap();
        assert_eq!(record.event_name, "first_event");
        assert_eq!(record.event_datetime, 1672531140);
    }

    #[test]
    fn test_optional_columns_map_by_name() {
        let text = "user_id,Event_Name,event_datetime,city,os,app_version,profile_total_revenue_usd\n\
                    U1,subscription_renewed,\"June 1, 2023, 9:05 AM\",Berlin,ios,2.1.0,19.98\n";
        let record = decode(text).remove(0).unwrap();

        assert_eq!(record.city.as_deref(), Some("Berlin"));
        assert_eq!(record.os.as_deref(), Some("ios"));
        assert_eq!(record.app_version.as_deref(), Some("2.1.0"));
        assert_eq!(record.profile_total_revenue_usd.as_deref(), Some("19.98"));
        assert_eq!(record.region, None);
    }

    #[test]
    fn test_short_row_is_isolated() {
        let text = format!("{HEADER}\nU1,first_event\nU2,first_event,\"January 5, 2023, 3:00 PM\",,\n");
        let outcomes = decode(&text);

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_err());
        assert!(outcomes[1].is_ok());
    }

    #[test]
    fn test_header_only_yields_nothing() {
        assert!(decode(HEADER).is_empty());
        assert!(decode("").is_empty());
    }

    #[test]
    fn test_invalid_utf8_row_is_isolated() {
        let mut bytes = format!("{HEADER}\n").into_bytes();
        bytes.extend_from_slice(b"U\xff,first_event,\"January 5, 2023, 3:00 PM\",,\n");
        bytes.extend_from_slice(b"U2,first_event,\"January 5, 2023, 3:00 PM\",,\n");

        let outcomes: Vec<_> = decode_csv("drops/x.csv", bytes.as_slice()).collect();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_err());
        assert_eq!(outcomes[1].as_ref().unwrap().user_id, "U2");
    }
}
