//! Backend adapter capability.
//!
//! The engine talks to every calendar service through [`CalendarBackend`].
//! Adapters normalize all-day vs timed representations and wire formats,
//! so the engine never branches on backend type: it resolves a name to an
//! adapter through the [`BackendRegistry`] once and dispatches.

pub mod protocol;
pub mod provider;

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::BackendConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::event::Event;
use crate::window::SyncWindow;

pub use protocol::CalendarInfo;
pub use provider::ProviderBackend;

/// Capability interface each calendar source/target implements.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Registry name of this backend (the part after `@` in refs).
    fn name(&self) -> &str;

    /// Whether caller-supplied event uids survive a round trip. Backends
    /// that assign their own ids (e.g. Google) return false, which forces
    /// the privacy sweep path.
    fn preserves_uid(&self) -> bool {
        true
    }

    async fn list_calendars(&self) -> BridgeResult<Vec<CalendarInfo>>;

    async fn list_events(
        &self,
        calendar_id: &str,
        window: &SyncWindow,
    ) -> BridgeResult<Vec<Event>>;

    async fn create_event(&self, calendar_id: &str, event: &Event) -> BridgeResult<String>;

    /// Fails with [`BridgeError::NotFound`] if the uid is absent.
    async fn update_event(&self, calendar_id: &str, event: &Event) -> BridgeResult<()>;

    /// Idempotent: deleting an already-absent event is success.
    async fn delete_event(&self, calendar_id: &str, uid: &str) -> BridgeResult<()>;
}

/// Reference to one calendar on one backend: `<calendarId>@<backendName>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarRef {
    pub calendar_id: String,
    pub backend: String,
}

impl FromStr for CalendarRef {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (calendar_id, backend) = s.rsplit_once('@').ok_or_else(|| {
            BridgeError::Config(format!(
                "Invalid calendar reference '{}'. Expected <calendarId>@<backendName>",
                s
            ))
        })?;

        if calendar_id.is_empty() || backend.is_empty() {
            return Err(BridgeError::Config(format!(
                "Invalid calendar reference '{}': empty calendar id or backend name",
                s
            )));
        }

        Ok(CalendarRef {
            calendar_id: calendar_id.to_string(),
            backend: backend.to_string(),
        })
    }
}

impl std::fmt::Display for CalendarRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.calendar_id, self.backend)
    }
}

/// Name → adapter mapping, resolved once at config-load time.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn CalendarBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build subprocess-backed adapters for every configured backend.
    pub fn from_configs(configs: &BTreeMap<String, BackendConfig>) -> Self {
        let mut registry = BackendRegistry::new();
        for (name, config) in configs {
            registry.register(Arc::new(ProviderBackend::from_config(name, config)));
        }
        registry
    }

    pub fn register(&mut self, backend: Arc<dyn CalendarBackend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    pub fn get(&self, name: &str) -> BridgeResult<Arc<dyn CalendarBackend>> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownBackend(name.to_string()))
    }

    pub fn resolve(&self, calendar_ref: &CalendarRef) -> BridgeResult<Arc<dyn CalendarBackend>> {
        self.get(&calendar_ref.backend)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn CalendarBackend>)> {
        self.backends.iter().map(|(name, b)| (name.as_str(), b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_ref_parsing() {
        let r: CalendarRef = "work@nextcloud".parse().unwrap();
        assert_eq!(r.calendar_id, "work");
        assert_eq!(r.backend, "nextcloud");
        assert_eq!(r.to_string(), "work@nextcloud");
    }

    #[test]
    fn test_calendar_ref_with_at_in_calendar_id() {
        // CalDAV ids derived from account emails contain '@'; the last
        // separator wins.
        let r: CalendarRef = "user@example.com/personal@kerio".parse().unwrap();
        assert_eq!(r.calendar_id, "user@example.com/personal");
        assert_eq!(r.backend, "kerio");
    }

    #[test]
    fn test_calendar_ref_rejects_malformed_input() {
        assert!("no-backend".parse::<CalendarRef>().is_err());
        assert!("@nextcloud".parse::<CalendarRef>().is_err());
        assert!("work@".parse::<CalendarRef>().is_err());
    }

    #[test]
    fn test_registry_lookup_fails_for_unknown_backend() {
        let registry = BackendRegistry::new();
        let err = registry.get("nextcloud").err().unwrap();
        assert!(matches!(err, BridgeError::UnknownBackend(_)));
    }
}
