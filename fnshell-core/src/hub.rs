// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Discovery of peer emulators through the emulator hub.
//!
//! A running hub advertises itself with a locator file named
//! `hub-<project>.json` in the system temp directory and serves the current
//! emulator registry at `GET /emulators`. Discovery is a single best-effort
//! query: every failure degrades to "no peers known".

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::DiscoveryError;
use crate::types::{EmulatorEndpoint, PeerMap, Port, ProjectId, ServiceKind};

/// One emulator entry as reported by the hub.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HubEmulatorInfo {
    #[serde(default)]
    pub name: Option<String>,
    pub host: String,
    pub port: u16,
}

/// Client side of the hub registry.
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Whether a hub is advertised for `project`.
    fn found_hub(&self, project: &ProjectId) -> bool;

    /// All emulators registered with the hub, keyed by service name.
    async fn get_emulators(
        &self,
        project: &ProjectId,
    ) -> Result<HashMap<String, HubEmulatorInfo>, DiscoveryError>;
}

/// Contents of the hub locator file.
#[derive(Debug, Deserialize)]
struct HubLocator {
    host: String,
    port: u16,
    #[serde(default)]
    pid: Option<u32>,
}

/// Hub client that finds the hub through its locator file and queries it
/// over HTTP.
#[derive(Debug, Clone)]
pub struct LocatorHubClient {
    locator_dir: PathBuf,
    client: reqwest::Client,
}

impl LocatorHubClient {
    /// Look for locator files in the system temp directory.
    pub fn new() -> Self {
        Self::with_locator_dir(std::env::temp_dir())
    }

    /// Look for locator files in `dir`.
    pub fn with_locator_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            locator_dir: dir.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Path of the locator file for `project`.
    pub fn locator_path(&self, project: &ProjectId) -> PathBuf {
        self.locator_dir.join(format!("hub-{}.json", project))
    }

    fn read_locator(&self, project: &ProjectId) -> Result<HubLocator, DiscoveryError> {
        let path = self.locator_path(project);
        let content = std::fs::read_to_string(&path).map_err(|e| DiscoveryError::Locator {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| DiscoveryError::Locator {
            path,
            reason: e.to_string(),
        })
    }
}

impl Default for LocatorHubClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HubClient for LocatorHubClient {
    fn found_hub(&self, project: &ProjectId) -> bool {
        self.read_locator(project).is_ok()
    }

    async fn get_emulators(
        &self,
        project: &ProjectId,
    ) -> Result<HashMap<String, HubEmulatorInfo>, DiscoveryError> {
        let locator = self.read_locator(project)?;
        let url = format!("http://{}:{}/emulators", locator.host, locator.port);

        tracing::debug!(url = %url, hub_pid = ?locator.pid, "Querying emulator hub");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DiscoveryError::Request {
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(DiscoveryError::Status {
                status: resp.status().as_u16(),
            });
        }

        resp.json::<HashMap<String, HubEmulatorInfo>>()
            .await
            .map_err(|e| DiscoveryError::Malformed {
                reason: e.to_string(),
            })
    }
}

/// Finds already-running peer emulators.
pub struct HubDiscovery<C> {
    client: C,
}

impl<C: HubClient> HubDiscovery<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Peers registered for `project`. Never fails: a missing or broken hub
    /// yields an empty map.
    pub async fn locate(&self, project: &ProjectId) -> PeerMap {
        let peers = match self.query(project).await {
            Ok(peers) => peers,
            Err(e) => {
                tracing::debug!(project = %project, error = %e, "Emulator discovery failed");
                PeerMap::new()
            }
        };

        for endpoint in peers.values() {
            tracing::debug!(
                service = %endpoint.kind,
                host = %endpoint.host,
                port = endpoint.port.value(),
                "Discovered running emulator"
            );
        }

        peers
    }

    async fn query(&self, project: &ProjectId) -> Result<PeerMap, DiscoveryError> {
        if !self.client.found_hub(project) {
            tracing::debug!(project = %project, "No emulator hub found");
            return Ok(PeerMap::new());
        }

        let registered = self.client.get_emulators(project).await?;
        tracing::debug!(count = registered.len(), "Running emulators reported by hub");

        let mut peers = PeerMap::new();
        for (name, info) in registered {
            let Some(kind) = ServiceKind::parse(&name) else {
                tracing::debug!(service = %name, "Ignoring unrecognized emulator");
                continue;
            };
            let Ok(port) = Port::new(info.port) else {
                tracing::debug!(service = %name, "Ignoring emulator with port 0");
                continue;
            };
            peers.insert(
                kind,
                EmulatorEndpoint {
                    kind,
                    host: info.host,
                    port,
                },
            );
        }
        Ok(peers)
    }
}

/// Operator-facing notices, one per peer, in canonical kind order.
pub fn connection_notices(peers: &PeerMap) -> Vec<String> {
    peers
        .values()
        .map(|endpoint| {
            format!(
                "Connecting to running {} emulator at {}:{}",
                endpoint.kind, endpoint.host, endpoint.port
            )
        })
        .collect()
}
