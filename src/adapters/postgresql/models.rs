//! PostgreSQL table layouts and statements
//!
//! Relation and channel names come from configuration and are spliced into
//! SQL text, so every builder here validates and quotes them first.

use crate::config::schema::is_valid_relation_name;
use crate::domain::{Result, SluiceError};

/// Column order shared by the DDL and the insert statement
pub const EVENT_COLUMNS: [&str; 13] = [
    "user_id",
    "event_name",
    "event_datetime",
    "city",
    "region",
    "country",
    "os",
    "app_version",
    "state",
    "event_parameters",
    "proceeds_usd",
    "profile_total_revenue_usd",
    "cancellation_reason",
];

/// Quote a possibly schema-qualified relation name
///
/// # Errors
///
/// Returns `SluiceError::Validation` unless the name matches
/// `ident` or `schema.ident`.
///
/// # Examples
///
/// ```
/// use sluice::adapters::postgresql::models::quote_relation;
///
/// assert_eq!(quote_relation("analytics.events").unwrap(), "\"analytics\".\"events\"");
/// assert!(quote_relation("events; DROP TABLE x").is_err());
/// ```
pub fn quote_relation(name: &str) -> Result<String> {
    if !is_valid_relation_name(name) {
        return Err(SluiceError::Validation(format!(
            "'{name}' is not a valid relation name"
        )));
    }
    Ok(name
        .split('.')
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join("."))
}

pub fn create_events_table_sql(relation: &str) -> Result<String> {
    let relation = quote_relation(relation)?;
    Ok(format!(
        r#"
        CREATE TABLE IF NOT EXISTS {relation} (
            user_id                   TEXT NOT NULL,
            event_name                TEXT NOT NULL,
            event_datetime            BIGINT NOT NULL,
            city                      TEXT,
            region                    TEXT,
            country                   TEXT,
            os                        TEXT,
            app_version               TEXT,
            state                     TEXT,
            event_parameters          JSONB,
            proceeds_usd              NUMERIC,
            profile_total_revenue_usd NUMERIC,
            cancellation_reason       TEXT,
            ingested_at               TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#
    ))
}

/// Insert statement for one event row
///
/// Decimal columns travel as text and are cast server side, so a value
/// that is not a number is rejected for that row only.
pub fn insert_event_sql(relation: &str) -> Result<String> {
    let relation = quote_relation(relation)?;
    let placeholders = (1..=EVENT_COLUMNS.len())
        .map(|i| match EVENT_COLUMNS[i - 1] {
            "proceeds_usd" | "profile_total_revenue_usd" => format!("${i}::text::numeric"),
            _ => format!("${i}"),
        })
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "INSERT INTO {relation} ({}) VALUES ({placeholders})",
        EVENT_COLUMNS.join(", ")
    ))
}

pub fn create_queue_table_sql(channel: &str) -> Result<String> {
    let table = quote_relation(channel)?;
    Ok(format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id          BIGSERIAL PRIMARY KEY,
            attributes  JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            payload     BYTEA,
            enqueued_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            lease_until TIMESTAMPTZ,
            deliveries  INTEGER NOT NULL DEFAULT 0
        )
        "#
    ))
}

/// Lease the oldest visible message
///
/// `$1` is the lease length in seconds.
pub fn lease_message_sql(channel: &str) -> Result<String> {
    let table = quote_relation(channel)?;
    Ok(format!(
        r#"
        UPDATE {table}
        SET lease_until = now() + make_interval(secs => $1),
            deliveries = deliveries + 1
        WHERE id = (
            SELECT id FROM {table}
            WHERE lease_until IS NULL OR lease_until < now()
            ORDER BY id
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        RETURNING id, attributes, deliveries
        "#
    ))
}

pub fn delete_message_sql(channel: &str) -> Result<String> {
    let table = quote_relation(channel)?;
    Ok(format!("DELETE FROM {table} WHERE id = $1"))
}

/// Hide a nacked message until its retry is due
///
/// `$2` is the retry delay in seconds.
pub fn release_message_sql(channel: &str) -> Result<String> {
    let table = quote_relation(channel)?;
    Ok(format!(
        "UPDATE {table} SET lease_until = now() + make_interval(secs => $2) WHERE id = $1"
    ))
}

pub fn enqueue_message_sql(channel: &str) -> Result<String> {
    let table = quote_relation(channel)?;
    Ok(format!(
        "INSERT INTO {table} (attributes, payload) VALUES ($1, $2) RETURNING id"
    ))
}
