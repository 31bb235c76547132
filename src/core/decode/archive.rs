//! Zip archive decoder for JSON event arrays
//!
//! Each archive entry holds a JSON array of event objects (or a single
//! event object). Entries are parsed incrementally: the deserializer pulls
//! bytes from the decompressing reader and hands over one array element at
//! a time, so neither the decompressed entry nor its parsed tree is ever
//! held in memory as a whole.
//!
//! Failure granularity:
//! - unreadable container: one failure for the whole file
//! - malformed JSON or I/O error inside an entry: one failure tagged with the
//!   entry name; elements completed before the error stay emitted
//! - element that is not a usable event: one failure for that element

use crate::core::transform::flatten;
use crate::domain::{DecodeFailure, DecodeOutcome, NormalizedEventRecord};
use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::io::{BufReader, Read, Seek};
use std::ops::ControlFlow;
use zip::ZipArchive;

const USER_ID: &str = "user_id";
const EVENT_NAME: &str = "event_name";
const EVENT_TIMESTAMP: &str = "event_timestamp";

/// Marker error used to unwind the parser when the consumer stops early
const STOPPED: &str = "decoding stopped by consumer";

/// Decode every entry of a zip archive, handing each outcome to `emit`
///
/// `emit` returns [`ControlFlow::Break`] to stop decoding early (for
/// example when the receiving side has gone away). The return value tells
/// whether the archive was fully walked.
pub fn decode_archive<R, F>(file_id: &str, reader: R, mut emit: F) -> ControlFlow<()>
where
    R: Read + Seek,
    F: FnMut(DecodeOutcome) -> ControlFlow<()>,
{
    let mut archive = match ZipArchive::new(reader) {
        Ok(archive) => archive,
        Err(e) => {
            return emit(Err(DecodeFailure::new(
                file_id,
                format!("unreadable archive: {e}"),
            )));
        }
    };

    for index in 0..archive.len() {
        let fallback_name = archive
            .name_for_index(index)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{index}"));

        let entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                emit(Err(DecodeFailure::new(
                    file_id,
                    format!("unreadable archive entry: {e}"),
                )
                .with_entry(fallback_name)))?;
                continue;
            }
        };

        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        tracing::debug!(file_id = %file_id, entry = %name, "Decoding archive entry");

        decode_entry(file_id, &name, BufReader::new(entry), &mut emit)?;
    }

    ControlFlow::Continue(())
}

/// Stream one entry's JSON document through the element visitor
fn decode_entry<R, F>(file_id: &str, entry: &str, reader: R, emit: &mut F) -> ControlFlow<()>
where
    R: Read,
    F: FnMut(DecodeOutcome) -> ControlFlow<()>,
{
    let mut stopped = false;
    let mut de = serde_json::Deserializer::from_reader(reader);

    let seed = EntrySeed {
        file_id,
        entry,
        emit,
        stopped: &mut stopped,
    };
    let result = seed.deserialize(&mut de).and_then(|()| de.end());

    if stopped {
        return ControlFlow::Break(());
    }

    match result {
        Ok(()) => ControlFlow::Continue(()),
        Err(e) => {
            tracing::warn!(file_id = %file_id, entry = %entry, error = %e, "Archive entry failed to parse");
            emit(Err(DecodeFailure::new(file_id, format!("invalid JSON: {e}")).with_entry(entry)))
        }
    }
}

/// Deserialize seed that emits events instead of building a value
struct EntrySeed<'a, F> {
    file_id: &'a str,
    entry: &'a str,
    emit: &'a mut F,
    stopped: &'a mut bool,
}

impl<'a, F> EntrySeed<'a, F>
where
    F: FnMut(DecodeOutcome) -> ControlFlow<()>,
{
    fn send<E: de::Error>(&mut self, element: Value) -> Result<(), E> {
        let outcome = convert_element(self.file_id, self.entry, element);
        if (self.emit)(outcome).is_break() {
            *self.stopped = true;
            return Err(E::custom(STOPPED));
        }
        Ok(())
    }
}

impl<'de, 'a, F> DeserializeSeed<'de> for EntrySeed<'a, F>
where
    F: FnMut(DecodeOutcome) -> ControlFlow<()>,
{
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de, 'a, F> Visitor<'de> for EntrySeed<'a, F>
where
    F: FnMut(DecodeOutcome) -> ControlFlow<()>,
{
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON array of event objects or a single event object")
    }

    fn visit_seq<A>(mut self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        // Only the current element is materialized.
        while let Some(element) = seq.next_element::<Value>()? {
            self.send::<A::Error>(element)?;
        }
        Ok(())
    }

    fn visit_map<A>(mut self, map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let element = Value::deserialize(de::value::MapAccessDeserializer::new(map))?;
        self.send(element)
    }
}

/// Convert one parsed element into a record
///
/// `event_parameters` is the flattened element as a whole, including the
/// fields that were also lifted into columns.
pub fn convert_element(file_id: &str, entry: &str, element: Value) -> DecodeOutcome {
    let fail = |reason: String, element: Value| {
        Err(DecodeFailure::new(file_id, reason)
            .with_entry(entry)
            .with_row(element))
    };

    let Value::Object(fields) = &element else {
        return fail("event element is not an object".to_string(), element);
    };

    let user_id = match fields.get(USER_ID) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return fail(format!("missing required field '{USER_ID}'"), element),
    };

    let event_name = match fields.get(EVENT_NAME) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return fail(format!("missing required field '{EVENT_NAME}'"), element),
    };

    let event_datetime = match fields.get(EVENT_TIMESTAMP).map(cast_epoch) {
        Some(Some(ts)) => ts,
        Some(None) => {
            let reason = format!(
                "'{EVENT_TIMESTAMP}' is not an epoch value: {}",
                fields[EVENT_TIMESTAMP]
            );
            return fail(reason, element);
        }
        None => return fail(format!("missing required field '{EVENT_TIMESTAMP}'"), element),
    };

    let mut record = NormalizedEventRecord::new(user_id, event_name, event_datetime);
    record.event_parameters = Some(flatten(&element));
    Ok(record)
}

/// Direct numeric cast of an epoch value
///
/// Integers pass through, floats truncate toward zero, and strings must
/// hold an integer.
fn cast_epoch(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    fn decode_all(reader: Cursor<Vec<u8>>) -> Vec<DecodeOutcome> {
        let mut outcomes = Vec::new();
        let flow = decode_archive("drops/batch.zip", reader, |o| {
            outcomes.push(o);
            ControlFlow::Continue(())
        });
        assert!(flow.is_continue());
        outcomes
    }

    #[test]
    fn test_entry_isolation() {
        let zip = build_zip(&[
            (
                "a.json",
                r#"[{"user_id":"U1","event_name":"first_event","event_timestamp":1700000000},
                    {"user_id":"U2","event_name":"app_open","event_timestamp":1700000001}]"#,
            ),
            ("broken.json", r#"[{"user_id":"U9","event_name":"#),
            (
                "b.json",
                r#"[{"user_id":"U3","event_name":"subscription_renewed","event_timestamp":1700000002}]"#,
            ),
        ]);

        let outcomes = decode_all(zip);
        let records: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
        let failures: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().err()).collect();

        let ids: Vec<_> = records.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["U1", "U2", "U3"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].entry.as_deref(), Some("broken.json"));
        assert_eq!(failures[0].file_id, "drops/batch.zip");
        assert!(failures[0].error.starts_with("invalid JSON"));
    }

    #[test]
    fn test_element_fields() {
        let zip = build_zip(&[(
            "events.json",
            r#"[{"user_id":"U1","event_name":"first_event","event_timestamp":1700000000,
                 "params":{"level":3,"tags":["a","b"]}}]"#,
        )]);

        let record = decode_all(zip).remove(0).unwrap();
        assert_eq!(record.event_datetime, 1700000000);
        assert_eq!(record.city, None);
        assert_eq!(record.proceeds_usd, None);

        let params = record.event_parameters.unwrap();
        assert_eq!(params["user_id"], "U1");
        assert_eq!(params["event_timestamp"], 1700000000);
        assert_eq!(params["params_level"], 3);
        assert_eq!(params["params_tags_1"], "b");
    }

    #[test]
    fn test_partial_entry_keeps_completed_elements() {
        let zip = build_zip(&[(
            "truncated.json",
            r#"[{"user_id":"U1","event_name":"e","event_timestamp":1},
                {"user_id":"U2","event_name":"e","event_timestamp":2},
                {"user_id":"U3","#,
        )]);

        let outcomes = decode_all(zip);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert!(outcomes[1].is_ok());
        assert_eq!(
            outcomes[2].as_ref().unwrap_err().entry.as_deref(),
            Some("truncated.json")
        );
    }

    #[test]
    fn test_bad_element_does_not_stop_entry() {
        let zip = build_zip(&[(
            "mixed.json",
            r#"[{"user_id":"U1","event_name":"e","event_timestamp":1},
                {"event_name":"e","event_timestamp":2},
                42,
                {"user_id":"U4","event_name":"e","event_timestamp":"soon"},
                {"user_id":"U5","event_name":"e","event_timestamp":5}]"#,
        )]);

        let outcomes = decode_all(zip);
        assert_eq!(outcomes.len(), 5);
        let ok: Vec<_> = outcomes
            .iter()
            .filter_map(|o| o.as_ref().ok())
            .map(|r| r.user_id.clone())
            .collect();
        assert_eq!(ok, vec!["U1", "U5"]);

        let failure = outcomes[1].as_ref().unwrap_err();
        assert!(failure.error.contains("user_id"));
        assert_eq!(failure.row, Some(json!({"event_name":"e","event_timestamp":2})));
    }

    #[test]
    fn test_single_object_entry() {
        let zip = build_zip(&[(
            "one.json",
            r#"{"user_id":"U1","event_name":"first_event","event_timestamp":1700000000}"#,
        )]);

        let outcomes = decode_all(zip);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].as_ref().unwrap().user_id, "U1");
    }

    #[test]
    fn test_scalar_entry_is_entry_failure() {
        let zip = build_zip(&[("scalar.json", "17")]);
        let outcomes = decode_all(zip);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[0].as_ref().unwrap_err().entry.as_deref(),
            Some("scalar.json")
        );
    }

    #[test]
    fn test_not_a_zip() {
        let outcomes = decode_all(Cursor::new(b"plainly not a zip".to_vec()));
        assert_eq!(outcomes.len(), 1);
        let failure = outcomes[0].as_ref().unwrap_err();
        assert!(failure.error.starts_with("unreadable archive"));
        assert_eq!(failure.entry, None);
    }

    #[test]
    fn test_consumer_can_stop_early() {
        let zip = build_zip(&[
            (
                "a.json",
                r#"[{"user_id":"U1","event_name":"e","event_timestamp":1},
                    {"user_id":"U2","event_name":"e","event_timestamp":2}]"#,
            ),
            ("b.json", r#"[{"user_id":"U3","event_name":"e","event_timestamp":3}]"#),
        ]);

        let mut seen = 0;
        let flow = decode_archive("drops/batch.zip", zip, |_| {
            seen += 1;
            ControlFlow::Break(())
        });

        assert!(flow.is_break());
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_cast_epoch() {
        assert_eq!(cast_epoch(&json!(1700000000)), Some(1700000000));
        assert_eq!(cast_epoch(&json!(1700000000.9)), Some(1700000000));
        assert_eq!(cast_epoch(&json!(-1.5)), Some(-1));
        assert_eq!(cast_epoch(&json!("1700000000")), Some(1700000000));
        assert_eq!(cast_epoch(&json!("1.5")), None);
        assert_eq!(cast_epoch(&json!(null)), None);
        assert_eq!(cast_epoch(&json!(u64::MAX)), None);
    }

    #[test]
    fn test_numeric_user_id() {
        let outcome = convert_element(
            "drops/x.zip",
            "e.json",
            json!({"user_id": 123, "event_name": "e", "event_timestamp": 1}),
        );
        assert_eq!(outcome.unwrap().user_id, "123");
    }
}
