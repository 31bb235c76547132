//! File-arrival notifications

use std::collections::HashMap;

/// Message attribute carrying the declared content type
pub const CONTENT_TYPE_ATTRIBUTE: &str = "body.contentType";

/// Message attribute carrying the `container/path` file identifier
pub const FILE_ID_ATTRIBUTE: &str = "body.id";

/// One file drop, as announced by the upstream notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalNotification {
    /// Declared MIME type of the dropped file
    pub content_type: String,

    /// Raw `container/path` identifier, parsed later by the router
    pub file_id: String,
}

impl ArrivalNotification {
    pub fn new(content_type: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            file_id: file_id.into(),
        }
    }

    /// Builds a notification from inbound message attributes
    ///
    /// Returns `None` when either attribute is missing; such messages are
    /// not file drops.
    pub fn from_attributes(attributes: &HashMap<String, String>) -> Option<Self> {
        let content_type = attributes.get(CONTENT_TYPE_ATTRIBUTE)?;
        let file_id = attributes.get(FILE_ID_ATTRIBUTE)?;
        Some(Self::new(content_type.clone(), file_id.clone()))
    }

    /// Message attributes that announce this notification
    pub fn to_attributes(&self) -> HashMap<String, String> {
        HashMap::from([
            (CONTENT_TYPE_ATTRIBUTE.to_string(), self.content_type.clone()),
            (FILE_ID_ATTRIBUTE.to_string(), self.file_id.clone()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_attributes() {
        let attrs = HashMap::from([
            ("body.contentType".to_string(), "text/csv".to_string()),
            ("body.id".to_string(), "drops/a.csv".to_string()),
            ("unrelated".to_string(), "x".to_string()),
        ]);

        let notification = ArrivalNotification::from_attributes(&attrs).unwrap();
        assert_eq!(notification.content_type, "text/csv");
        assert_eq!(notification.file_id, "drops/a.csv");
        assert_eq!(
            ArrivalNotification::from_attributes(&notification.to_attributes()),
            Some(notification)
        );
    }

    #[test]
    fn test_from_attributes_missing() {
        let attrs = HashMap::from([("body.id".to_string(), "drops/a.csv".to_string())]);
        assert!(ArrivalNotification::from_attributes(&attrs).is_none());
    }
}
