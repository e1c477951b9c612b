//! Deluge status source — talks to the daemon through the web UI's JSON-RPC
//! endpoint (`/json`).
//!
//! Authentication is a session cookie obtained via `auth.login`; the client
//! re-logs-in once and retries when the daemon reports an expired session.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::DelugeConfig;
use crate::error::SourceError;
use crate::source::{RemoteTorrent, TorrentControl, TorrentSource};

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
    #[allow(dead_code)]
    code: i64,
}

/// Deluge web API client.
pub struct DelugeClient {
    endpoint: String,
    password: secrecy::SecretString,
    client: reqwest::Client,
    next_id: AtomicI64,
}

impl DelugeClient {
    /// Connect to the web UI and authenticate.
    pub async fn connect(config: &DelugeConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| SourceError::RequestFailed {
                endpoint: config.url.clone(),
                reason: e.to_string(),
            })?;

        let deluge = Self {
            endpoint: format!("{}/json", config.url.trim_end_matches('/')),
            password: config.password.clone(),
            client,
            next_id: AtomicI64::new(1),
        };
        deluge.login().await?;
        info!(endpoint = %deluge.endpoint, "Connected to deluge");
        Ok(deluge)
    }

    /// Authenticate and store the session cookie.
    async fn login(&self) -> Result<(), SourceError> {
        let result = self
            .call_raw("auth.login", json!([self.password.expose_secret()]))
            .await?;
        match result.as_bool() {
            Some(true) => Ok(()),
            _ => Err(SourceError::AuthFailed),
        }
    }

    /// One JSON-RPC round trip without session recovery.
    async fn call_raw(&self, method: &str, params: Value) -> Result<Value, SourceError> {
        let body = json!({
            "method": method,
            "params": params,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::RequestFailed {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SourceError::RequestFailed {
                endpoint: self.endpoint.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::RequestFailed {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;
        let envelope: RpcResponse = serde_json::from_slice(&bytes)?;

        if let Some(err) = envelope.error {
            return Err(SourceError::Rpc {
                method: method.to_string(),
                reason: err.message,
            });
        }

        Ok(envelope.result)
    }

    /// JSON-RPC call with one re-login retry on an expired session.
    async fn call(&self, method: &str, params: Value) -> Result<Value, SourceError> {
        match self.call_raw(method, params.clone()).await {
            Err(SourceError::Rpc { reason, .. }) if reason.contains("Not authenticated") => {
                debug!(method, "Session expired, re-authenticating");
                self.login().await?;
                self.call_raw(method, params).await
            }
            other => other,
        }
    }

    /// Create the managed label if it does not exist yet.
    pub async fn ensure_label(&self, label: &str) -> Result<(), SourceError> {
        match self.call("label.add", json!([label])).await {
            Ok(_) => Ok(()),
            Err(SourceError::Rpc { reason, .. }) if reason.contains("Label already exists") => {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TorrentControl for DelugeClient {
    async fn add_magnet(&self, magnet_uri: &str, label: &str) -> Result<String, SourceError> {
        let result = self
            .call("core.add_torrent_magnet", json!([magnet_uri, {}]))
            .await?;
        let torrent_id = result
            .as_str()
            .ok_or_else(|| {
                SourceError::InvalidResponse(format!("add_torrent_magnet returned {result}"))
            })?
            .to_string();

        if let Err(e) = self.call("label.set_torrent", json!([torrent_id, label])).await {
            warn!(torrent_id = %torrent_id, "Failed to set label: {e}");
        }

        Ok(torrent_id)
    }

    async fn remove_torrent(&self, torrent_id: &str) -> Result<(), SourceError> {
        self.call("core.remove_torrent", json!([torrent_id, false]))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TorrentSource for DelugeClient {
    async fn lookup(&self, torrent_id: &str) -> Result<Option<RemoteTorrent>, SourceError> {
        let result = self
            .call(
                "core.get_torrent_status",
                json!([torrent_id, ["name", "state"]]),
            )
            .await?;

        // The daemon answers an unknown id with an empty object.
        match result.as_object() {
            None => Err(SourceError::InvalidResponse(format!(
                "get_torrent_status returned {result}"
            ))),
            Some(fields) if fields.is_empty() => Ok(None),
            Some(fields) => Ok(Some(torrent_from_fields(torrent_id, fields)?)),
        }
    }

    async fn list_labeled(&self, label: &str) -> Result<Vec<RemoteTorrent>, SourceError> {
        let result = self
            .call(
                "core.get_torrents_status",
                json!([{ "label": label }, ["name", "state"]]),
            )
            .await?;

        let map = result.as_object().ok_or_else(|| {
            SourceError::InvalidResponse(format!("get_torrents_status returned {result}"))
        })?;

        let mut torrents = Vec::with_capacity(map.len());
        for (id, fields) in map {
            let fields = fields.as_object().ok_or_else(|| {
                SourceError::InvalidResponse(format!("torrent {id} entry is not an object"))
            })?;
            torrents.push(torrent_from_fields(id, fields)?);
        }
        Ok(torrents)
    }
}

/// Pull `name`/`state` out of a torrent status object.
fn torrent_from_fields(
    id: &str,
    fields: &serde_json::Map<String, Value>,
) -> Result<RemoteTorrent, SourceError> {
    let name = fields
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| SourceError::InvalidResponse(format!("torrent {id} missing name")))?;
    let state = fields
        .get("state")
        .and_then(Value::as_str)
        .ok_or_else(|| SourceError::InvalidResponse(format!("torrent {id} missing state")))?;

    Ok(RemoteTorrent {
        id: id.to_string(),
        name: name.to_string(),
        state: state.to_string(),
    })
}
