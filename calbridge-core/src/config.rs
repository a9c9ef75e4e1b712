//! Bridge configuration.
//!
//! Backends live in a TOML file (`~/.config/calbridge/config.toml` unless
//! overridden); pair definitions and tuning knobs come from the
//! environment and override anything the file says. Malformed
//! configuration aborts startup with a descriptive error — nothing is
//! silently defaulted.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::str::FromStr;

use config::{Config, File};
use serde::Deserialize;

use crate::backend::CalendarRef;
use crate::error::{BridgeError, BridgeResult};
use crate::privacy::{DEFAULT_PRIVACY_PREFIX, DEFAULT_PRIVACY_TITLE};

pub const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 30;

/// Synchronization mode for a calendar pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    TwoWay,
    OneWay,
}

impl FromStr for SyncMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "two_way" => Ok(SyncMode::TwoWay),
            "one_way" => Ok(SyncMode::OneWay),
            other => Err(BridgeError::Config(format!(
                "Invalid sync mode '{}'. Expected 'two_way' or 'one_way'",
                other
            ))),
        }
    }
}

/// One configured source → target mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarPair {
    pub source: CalendarRef,
    pub target: CalendarRef,
    pub mode: SyncMode,
    pub privacy: bool,
}

impl FromStr for CalendarPair {
    type Err = BridgeError;

    /// Parse `source:target:mode[:privacy]`, where source and target are
    /// `<calendarId>@<backendName>` references.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 3 || parts.len() > 4 {
            return Err(BridgeError::Config(format!(
                "Calendar pair '{}' must be in format: source:target:mode[:privacy]",
                s
            )));
        }

        let source: CalendarRef = parts[0].parse()?;
        let target: CalendarRef = parts[1].parse()?;
        let mode: SyncMode = parts[2].parse()?;

        let privacy = match parts.get(3) {
            None => false,
            Some(p) => match p.to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                other => {
                    return Err(BridgeError::Config(format!(
                        "Invalid privacy flag '{}' in pair '{}'. Expected 'true' or 'false'",
                        other, s
                    )));
                }
            },
        };

        if privacy && mode == SyncMode::TwoWay {
            return Err(BridgeError::Config(format!(
                "Privacy mode is only valid for one-way sync (pair '{}')",
                s
            )));
        }

        Ok(CalendarPair {
            source,
            target,
            mode,
            privacy,
        })
    }
}

impl std::fmt::Display for CalendarPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            SyncMode::TwoWay => "two_way",
            SyncMode::OneWay => "one_way",
        };
        write!(f, "{}:{}:{}:{}", self.source, self.target, mode, self.privacy)
    }
}

/// One backend entry from the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Provider binary suffix: `calbridge-provider-<provider>`.
    pub provider: String,

    /// Whether this backend assigns its own event ids, discarding the
    /// caller's. Forces the delete-and-recreate privacy sweep.
    #[serde(default)]
    pub assigns_ids: bool,

    /// Provider-specific parameters (urls, credentials, accounts),
    /// passed through to the provider binary untouched.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    backends: BTreeMap<String, BackendConfig>,
    #[serde(default)]
    pairs: Vec<String>,
    sync_interval_minutes: Option<u64>,
    privacy_event_title: Option<String>,
    privacy_event_prefix: Option<String>,
    state_file: Option<String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub backends: BTreeMap<String, BackendConfig>,
    pub pairs: Vec<CalendarPair>,
    pub sync_interval_minutes: u64,
    pub privacy_event_title: String,
    pub privacy_event_prefix: String,
    pub state_path: PathBuf,
}

impl BridgeConfig {
    /// Default config file location: `~/.config/calbridge/config.toml`.
    pub fn config_path() -> BridgeResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| BridgeError::Config("Could not determine config directory".into()))?
            .join("calbridge");

        Ok(config_dir.join("config.toml"))
    }

    fn default_state_path() -> BridgeResult<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| BridgeError::Config("Could not determine data directory".into()))?
            .join("calbridge");

        Ok(data_dir.join("sync_state.json"))
    }

    /// Load the config file, then apply environment overrides
    /// (`CALENDAR_PAIRS`, `SYNC_INTERVAL_MINUTES`, `PRIVACY_EVENT_TITLE`,
    /// `PRIVACY_EVENT_PREFIX`, `CALBRIDGE_STATE_FILE`,
    /// `CALBRIDGE_CONFIG` for the file location itself).
    pub fn load() -> BridgeResult<Self> {
        let config_path = match std::env::var("CALBRIDGE_CONFIG") {
            Ok(path) => PathBuf::from(shellexpand::tilde(&path).into_owned()),
            Err(_) => Self::config_path()?,
        };

        let file: ConfigFile = Config::builder()
            .add_source(File::from(config_path).required(false))
            .build()
            .map_err(|e| BridgeError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| BridgeError::Config(e.to_string()))?;

        let pair_strings = match std::env::var("CALENDAR_PAIRS") {
            Ok(json) => parse_pair_array(&json)?,
            Err(_) => file.pairs.clone(),
        };
        let pairs = pair_strings
            .iter()
            .map(|s| s.parse())
            .collect::<BridgeResult<Vec<CalendarPair>>>()?;

        let sync_interval_minutes = match std::env::var("SYNC_INTERVAL_MINUTES") {
            Ok(value) => value.parse().map_err(|_| {
                BridgeError::Config(format!("SYNC_INTERVAL_MINUTES is not a number: '{}'", value))
            })?,
            Err(_) => file
                .sync_interval_minutes
                .unwrap_or(DEFAULT_SYNC_INTERVAL_MINUTES),
        };

        let privacy_event_title = std::env::var("PRIVACY_EVENT_TITLE")
            .ok()
            .or(file.privacy_event_title)
            .unwrap_or_else(|| DEFAULT_PRIVACY_TITLE.to_string());

        let privacy_event_prefix = std::env::var("PRIVACY_EVENT_PREFIX")
            .ok()
            .or(file.privacy_event_prefix)
            .unwrap_or_else(|| DEFAULT_PRIVACY_PREFIX.to_string());

        let state_path = match std::env::var("CALBRIDGE_STATE_FILE").ok().or(file.state_file) {
            Some(path) => PathBuf::from(shellexpand::tilde(&path).into_owned()),
            None => Self::default_state_path()?,
        };

        Ok(BridgeConfig {
            backends: file.backends,
            pairs,
            sync_interval_minutes,
            privacy_event_title,
            privacy_event_prefix,
            state_path,
        })
    }
}

/// Parse the `CALENDAR_PAIRS` value: a JSON array of pair strings.
fn parse_pair_array(json: &str) -> BridgeResult<Vec<String>> {
    serde_json::from_str(json)
        .map_err(|e| BridgeError::Config(format!("CALENDAR_PAIRS must be a valid JSON array: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_parses_with_and_without_privacy() {
        let pair: CalendarPair = "work@nextcloud:mirror@kerio:one_way".parse().unwrap();
        assert_eq!(pair.source.backend, "nextcloud");
        assert_eq!(pair.target.calendar_id, "mirror");
        assert_eq!(pair.mode, SyncMode::OneWay);
        assert!(!pair.privacy);

        let pair: CalendarPair = "work@nextcloud:mirror@kerio:one_way:true".parse().unwrap();
        assert!(pair.privacy);

        let pair: CalendarPair = "a@x:b@y:two_way".parse().unwrap();
        assert_eq!(pair.mode, SyncMode::TwoWay);
    }

    #[test]
    fn test_pair_rejects_privacy_with_two_way() {
        let err = "a@x:b@y:two_way:true".parse::<CalendarPair>().unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
        assert!(err.to_string().contains("only valid for one-way"));
    }

    #[test]
    fn test_pair_rejects_malformed_strings() {
        for bad in [
            "",
            "a@x:b@y",
            "a@x:b@y:sideways",
            "a@x:b@y:one_way:maybe",
            "a@x:b@y:one_way:true:extra",
            "no-backend:b@y:one_way",
        ] {
            assert!(
                bad.parse::<CalendarPair>().is_err(),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_pair_array_parsing() {
        let pairs = parse_pair_array(r#"["a@x:b@y:one_way", "c@x:d@y:two_way"]"#).unwrap();
        assert_eq!(pairs.len(), 2);

        assert!(parse_pair_array("a@x:b@y:one_way").is_err());
        assert!(parse_pair_array("").is_err());
    }

    #[test]
    fn test_sync_mode_parsing_is_case_insensitive() {
        assert_eq!("TWO_WAY".parse::<SyncMode>().unwrap(), SyncMode::TwoWay);
        assert_eq!("one_way".parse::<SyncMode>().unwrap(), SyncMode::OneWay);
        assert!("both_ways".parse::<SyncMode>().is_err());
    }

    #[test]
    fn test_pair_display_roundtrip() {
        let pair: CalendarPair = "work@nextcloud:mirror@kerio:one_way:true".parse().unwrap();
        assert_eq!(
            pair,
            pair.to_string().parse::<CalendarPair>().unwrap()
        );
    }
}
