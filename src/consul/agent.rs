// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{collections::BTreeMap, time::Duration};

use {
    async_trait::async_trait,
    log::debug,
    reqwest::StatusCode,
    serde::{de::DeserializeOwned, de::IgnoredAny, Deserialize},
};

use crate::{
    consul::{KvEntry, LockStore},
    error::WatchError,
};

/// Reply of `session/info/<id>`. Only the fields we rely on are decoded.
#[derive(Deserialize, Debug)]
struct SessionInfo {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Node")]
    node: String,
}

/// A Consul server or client agent, reached through its HTTP API.
#[derive(Debug)]
pub struct ConsulAgent {
    hostname: String,
    /// Example: "http://10.0.0.1:8500/v1/"
    url_v1: String,
    client: reqwest::Client,
}

impl ConsulAgent {
    pub fn new(
        hostname: &str,
        address: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Self, WatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::lookup(hostname, e))?;

        Ok(ConsulAgent {
            hostname: hostname.to_string(),
            url_v1: format!("http://{address}:{port}/v1/"),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.url_v1, path)
    }

    async fn get_raw(&self, path: &str) -> Result<reqwest::Response, WatchError> {
        let url = self.url(path);
        debug!("GET {url}");
        self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| WatchError::lookup(&self.hostname, e))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, WatchError> {
        let response = self.get_raw(path).await?;
        if response.status() != StatusCode::OK {
            return Err(WatchError::protocol(
                &self.hostname,
                format!("got status [{}] of path [{path}]", response.status()),
            ));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| WatchError::protocol(&self.hostname, format!("path [{path}]: {e}")))
    }

    /// Get a KV path, mapping 404 to `None`.
    async fn get_kv(&self, path: &str) -> Result<Option<reqwest::Response>, WatchError> {
        let response = self.get_raw(path).await?;
        match response.status() {
            StatusCode::OK => Ok(Some(response)),
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(WatchError::protocol(
                &self.hostname,
                format!("got status [{other}] of path [{path}]"),
            )),
        }
    }
}

#[async_trait]
impl LockStore for ConsulAgent {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn check_connectable(&self) -> Result<(), WatchError> {
        self.get_json::<BTreeMap<String, IgnoredAny>>("agent/self")
            .await
            .map(|_| ())
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, WatchError> {
        let Some(response) = self.get_kv(&format!("kv/{key}?raw")).await? else {
            return Ok(None);
        };
        response
            .text()
            .await
            .map(Some)
            .map_err(|e| WatchError::protocol(&self.hostname, format!("key [{key}]: {e}")))
    }

    async fn get_detailed_value(&self, key: &str) -> Result<Option<KvEntry>, WatchError> {
        let Some(response) = self.get_kv(&format!("kv/{key}")).await? else {
            return Ok(None);
        };
        let entries: Vec<KvEntry> = response
            .json()
            .await
            .map_err(|e| WatchError::protocol(&self.hostname, format!("key [{key}]: {e}")))?;

        if entries.len() != 1 {
            return Err(WatchError::protocol(
                &self.hostname,
                format!("unexpected length {} for reply of key [{key}]", entries.len()),
            ));
        }
        Ok(entries.into_iter().next())
    }

    async fn get_session_owner(&self, session: &str) -> Result<Option<String>, WatchError> {
        // Depending on the Consul version, an unknown session is either `null` or `[]`.
        let infos: Option<Vec<SessionInfo>> =
            self.get_json(&format!("session/info/{session}")).await?;
        let mut infos = infos.unwrap_or_default();

        match infos.len() {
            0 => Ok(None),
            1 => {
                let info = infos.remove(0);
                debug!("session [{}] is held by node [{}]", info.id, info.node);
                Ok(Some(info.node))
            }
            nodes => Err(WatchError::AmbiguousSession {
                session: session.to_string(),
                nodes,
            }),
        }
    }

    async fn leader(&self) -> Result<String, WatchError> {
        self.get_json::<String>("status/leader").await
    }
}
