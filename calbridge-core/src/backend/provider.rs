//! Subprocess-backed calendar backend.
//!
//! Each configured backend maps to a provider binary
//! (`calbridge-provider-<provider>`) spoken to over stdin/stdout JSON.
//! Providers manage their own credentials and wire formats; the engine
//! passes provider-specific parameters through from the backend's config
//! table untouched.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::backend::CalendarBackend;
use crate::backend::protocol::{
    CalendarInfo, Command as ProviderCommand, ErrorKind, Request, Response, WireEvent,
};
use crate::config::BackendConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::event::Event;
use crate::window::SyncWindow;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ProviderBackend {
    name: String,
    provider: String,
    assigns_ids: bool,
    params: HashMap<String, toml::Value>,
}

impl ProviderBackend {
    pub fn from_config(name: &str, config: &BackendConfig) -> Self {
        ProviderBackend {
            name: name.to_string(),
            provider: config.provider.clone(),
            assigns_ids: config.assigns_ids,
            params: config.params.clone(),
        }
    }

    fn binary_path(&self) -> BridgeResult<std::path::PathBuf> {
        let binary_name = format!("calbridge-provider-{}", self.provider);
        which::which(&binary_name)
            .map_err(|_| BridgeError::ProviderNotInstalled(self.provider.clone()))
    }

    /// Base params for every call: the backend's config table as JSON.
    fn base_params(&self) -> serde_json::Value {
        let json_map: serde_json::Map<String, serde_json::Value> = self
            .params
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();
        serde_json::Value::Object(json_map)
    }

    async fn call<R: DeserializeOwned>(
        &self,
        command: ProviderCommand,
        params: serde_json::Value,
    ) -> BridgeResult<R> {
        timeout(PROVIDER_TIMEOUT, self.call_inner(command, params))
            .await
            .map_err(|_| BridgeError::ProviderTimeout(PROVIDER_TIMEOUT.as_secs()))?
    }

    async fn call_inner<R: DeserializeOwned>(
        &self,
        command: ProviderCommand,
        params: serde_json::Value,
    ) -> BridgeResult<R> {
        let request = Request { command, params };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;

        let binary_path = self.binary_path()?;

        let mut child = Command::new(&binary_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .map_err(|e| {
                BridgeError::transient(format!(
                    "Failed to spawn {}: {}",
                    binary_path.display(),
                    e
                ))
            })?;

        // Write request to stdin (unwrap safe: we piped stdin above)
        let mut stdin = child.stdin.take().unwrap();
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await?;
        drop(stdin);

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(BridgeError::transient(format!(
                "Provider '{}' exited with status: {}",
                self.provider,
                output.status.code().unwrap_or(-1)
            )));
        }

        let response_str = String::from_utf8_lossy(&output.stdout);
        if response_str.trim().is_empty() {
            return Err(BridgeError::transient(format!(
                "Provider '{}' returned no response",
                self.provider
            )));
        }

        let response: Response<R> = serde_json::from_str(&response_str).map_err(|e| {
            BridgeError::Serialization(format!("Failed to parse provider response: {}", e))
        })?;

        match response {
            Response::Success { data } => Ok(data),
            Response::Error { error, kind } => Err(match kind {
                ErrorKind::NotFound => BridgeError::NotFound(error),
                ErrorKind::Transient => BridgeError::transient(error),
                ErrorKind::Permanent => BridgeError::permanent(error),
            }),
        }
    }
}

#[async_trait]
impl CalendarBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn preserves_uid(&self) -> bool {
        !self.assigns_ids
    }

    async fn list_calendars(&self) -> BridgeResult<Vec<CalendarInfo>> {
        self.call(ProviderCommand::ListCalendars, self.base_params())
            .await
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        window: &SyncWindow,
    ) -> BridgeResult<Vec<Event>> {
        let mut params = self.base_params();
        params["calendar_id"] = serde_json::Value::String(calendar_id.to_string());
        params["from"] = serde_json::Value::String(window.start.to_rfc3339());
        params["to"] = serde_json::Value::String(window.end.to_rfc3339());

        let wire: Vec<WireEvent> = self.call(ProviderCommand::ListEvents, params).await?;
        Ok(wire.into_iter().filter_map(WireEvent::into_event).collect())
    }

    async fn create_event(&self, calendar_id: &str, event: &Event) -> BridgeResult<String> {
        let mut params = self.base_params();
        params["calendar_id"] = serde_json::Value::String(calendar_id.to_string());
        params["event"] = serde_json::to_value(WireEvent::from(event))
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;
        self.call(ProviderCommand::CreateEvent, params).await
    }

    async fn update_event(&self, calendar_id: &str, event: &Event) -> BridgeResult<()> {
        let mut params = self.base_params();
        params["calendar_id"] = serde_json::Value::String(calendar_id.to_string());
        params["event"] = serde_json::to_value(WireEvent::from(event))
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;
        self.call(ProviderCommand::UpdateEvent, params).await
    }

    async fn delete_event(&self, calendar_id: &str, uid: &str) -> BridgeResult<()> {
        let mut params = self.base_params();
        params["calendar_id"] = serde_json::Value::String(calendar_id.to_string());
        params["event_id"] = serde_json::Value::String(uid.to_string());

        // Backends report deleting an absent event variably (404 and
        // friends); an idempotent delete treats that as done.
        match self.call(ProviderCommand::DeleteEvent, params).await {
            Err(BridgeError::NotFound(_)) => Ok(()),
            other => other,
        }
    }
}
