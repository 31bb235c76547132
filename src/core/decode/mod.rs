//! File decoders
//!
//! Both decoders are synchronous and pull-based. [`spawn_decoder`] runs one
//! on the blocking pool and hands its outcomes to async code over a bounded
//! channel, so a slow sink holds the decoder back instead of letting
//! decoded records pile up.

pub mod archive;
pub mod csv;

pub use self::archive::decode_archive;
pub use self::csv::decode_csv;

use crate::domain::DecodeOutcome;
use std::io::BufReader;
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Fetched file content, in the shape its decoder wants
#[derive(Debug)]
pub enum DecoderInput {
    /// Whole delimited-text blob
    Text(String),
    /// Seekable local handle on a zip archive
    Blob(std::fs::File),
}

/// Run the matching decoder on the blocking pool
///
/// Outcomes arrive on the returned receiver in source order. Dropping the
/// receiver stops the decoder at its next emission.
pub fn spawn_decoder(
    file_id: String,
    input: DecoderInput,
    capacity: usize,
) -> (mpsc::Receiver<DecodeOutcome>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let handle = tokio::task::spawn_blocking(move || {
        let send = |outcome: DecodeOutcome| {
            if tx.blocking_send(outcome).is_err() {
                tracing::debug!(file_id = %file_id, "Decoder receiver dropped, stopping");
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        match input {
            DecoderInput::Text(text) => {
                for outcome in decode_csv(file_id.as_str(), text.as_bytes()) {
                    if send(outcome).is_break() {
                        break;
                    }
                }
            }
            DecoderInput::Blob(file) => {
                let _ = decode_archive(&file_id, BufReader::new(file), send);
            }
        }
    });

    (rx, handle)
}
