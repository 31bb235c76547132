//! Content-type routing
//!
//! Decides which decoder, if any, a dropped file goes to. Unrecognized
//! content types are ordinary background traffic and are skipped quietly.

use crate::domain::ArrivalNotification;
use std::fmt;

/// Content type of delimited-text drops
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Content type of zipped JSON drops
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Which decoder a file goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Archive,
}

impl FileKind {
    /// Exact match on the declared content type
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            CSV_CONTENT_TYPE => Some(Self::Csv),
            ARCHIVE_CONTENT_TYPE => Some(Self::Archive),
            _ => None,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Csv => write!(f, "csv"),
            FileKind::Archive => write!(f, "archive"),
        }
    }
}

/// A notification the pipeline will process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedFile {
    pub kind: FileKind,
    pub file_id: String,
}

/// Stateless router from notifications to decoders
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentRouter;

impl ContentRouter {
    pub fn new() -> Self {
        Self
    }

    /// Route a notification, or `None` to skip it
    pub fn route(&self, notification: &ArrivalNotification) -> Option<RoutedFile> {
        match FileKind::from_content_type(&notification.content_type) {
            Some(kind) => Some(RoutedFile {
                kind,
                file_id: notification.file_id.clone(),
            }),
            None => {
                tracing::debug!(
                    content_type = %notification.content_type,
                    file_id = %notification.file_id,
                    "Skipping notification with unrecognized content type"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("text/csv", FileKind::Csv ; "csv")]
    #[test_case("application/zip", FileKind::Archive ; "zip")]
    fn test_route_recognized(content_type: &str, expected: FileKind) {
        let router = ContentRouter::new();
        let routed = router
            .route(&ArrivalNotification::new(content_type, "drops/f"))
            .unwrap();
        assert_eq!(routed.kind, expected);
        assert_eq!(routed.file_id, "drops/f");
    }

    #[test_case("application/json" ; "json")]
    #[test_case("text/plain" ; "plain text")]
    #[test_case("TEXT/CSV" ; "upper case csv")]
    #[test_case("text/csv; charset=utf-8" ; "csv with parameters")]
    #[test_case("application/x-zip-compressed" ; "legacy zip")]
    #[test_case("" ; "empty")]
    fn test_route_skips_everything_else(content_type: &str) {
        let router = ContentRouter::new();
        assert_eq!(
            router.route(&ArrivalNotification::new(content_type, "drops/f")),
            None
        );
    }
}
