//! Placeholder ("busy") event handling for privacy sync.
//!
//! A placeholder blocks the time slot of a source event in the target
//! calendar without revealing any of its content. Identity is carried in
//! the uid (`prefix + source uid`), so the mapping back to the source is
//! a prefix strip and no separate index has to be persisted.

use uuid::Uuid;

use crate::error::{BridgeError, BridgeResult};
use crate::event::{Event, EventStatus};

pub const DEFAULT_PRIVACY_TITLE: &str = "Busy";
pub const DEFAULT_PRIVACY_PREFIX: &str = "PRIVACY-SYNC-";

#[derive(Debug, Clone)]
pub struct PrivacyMapper {
    prefix: String,
    title: String,
}

impl Default for PrivacyMapper {
    fn default() -> Self {
        PrivacyMapper::new(DEFAULT_PRIVACY_PREFIX, DEFAULT_PRIVACY_TITLE)
    }
}

impl PrivacyMapper {
    pub fn new(prefix: impl Into<String>, title: impl Into<String>) -> Self {
        PrivacyMapper {
            prefix: prefix.into(),
            title: title.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Derive the placeholder event for a source event.
    ///
    /// Only the time slot survives: description, location and recurrence
    /// are never copied. A source event without a uid gets a random one so
    /// the placeholder is still well-formed.
    pub fn to_private(&self, source: &Event) -> Event {
        let uid = if source.uid.is_empty() {
            format!("{}{}", self.prefix, Uuid::new_v4())
        } else {
            format!("{}{}", self.prefix, source.uid)
        };

        Event {
            uid,
            summary: self.title.clone(),
            description: None,
            location: None,
            start: source.start.clone(),
            end: source.end.clone(),
            status: EventStatus::Confirmed,
            recurrence: None,
            recurrence_id: None,
            last_modified: None,
            raw: None,
        }
    }

    /// The uid a placeholder for this source event would carry.
    pub fn placeholder_uid(&self, source_uid: &str) -> String {
        format!("{}{}", self.prefix, source_uid)
    }

    /// Prefix match on the uid.
    pub fn has_placeholder_uid(&self, event: &Event) -> bool {
        event.uid.starts_with(&self.prefix)
    }

    /// Whether an event is a placeholder, by uid prefix or by title.
    ///
    /// The title match covers backends that replace caller-supplied uids
    /// with their own; such placeholders are recognizable only by their
    /// fixed summary.
    pub fn is_placeholder(&self, event: &Event) -> bool {
        self.has_placeholder_uid(event) || event.summary == self.title
    }

    /// Map a placeholder back to its source uid.
    pub fn source_uid_of<'a>(&self, event: &'a Event) -> BridgeResult<&'a str> {
        event.uid.strip_prefix(&self.prefix).ok_or_else(|| {
            BridgeError::Identity(format!(
                "placeholder '{}' carries no source uid (expected prefix '{}')",
                event.uid, self.prefix
            ))
        })
    }
}
