// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::sync::Arc;

use {log::debug, serde::Deserialize};

use crate::{cluster::Member, consul::LockStore, error::WatchError};

/// The run-time YAML config that admins store next to the watch lock of a host or service.
#[derive(Deserialize, Debug, Default)]
struct RuntimeConfig {
    #[serde(default)]
    autostart: bool,
}

/// Answers "who currently watches this member" by reading lock holders through a single
/// lock store agent.
///
/// The holder is reported as-is. It is not compared against the member's candidate list:
/// right after a topology change a host outside the candidate set can legitimately still hold
/// the lock, so callers decide how to present that.
#[derive(Debug, Clone)]
pub struct WatcherResolver {
    store: Arc<dyn LockStore>,
}

impl WatcherResolver {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        WatcherResolver { store }
    }

    /// Hostname of the agent the queries go through.
    pub fn agent_hostname(&self) -> &str {
        self.store.hostname()
    }

    /// Get the hostname currently holding the watch lock of `member`.
    ///
    /// Returns `Ok(None)` if the lock was never taken, or is not held right now.
    pub async fn get_watcher(&self, member: &Member) -> Result<Option<String>, WatchError> {
        let key = member.watch_key();
        let Some(entry) = self.store.get_detailed_value(key.as_str()).await? else {
            debug!("no lock key [{key}] for {member}");
            return Ok(None);
        };
        let Some(session) = entry.session else {
            debug!("lock [{key}] of {member} is not held");
            return Ok(None);
        };

        match self.store.get_session_owner(&session).await? {
            Some(node) => Ok(Some(node)),
            None => Err(WatchError::AmbiguousSession { session, nodes: 0 }),
        }
    }

    /// Whether `hostname` currently holds the watch lock of `member`.
    pub async fn is_watcher(&self, member: &Member, hostname: &str) -> Result<bool, WatchError> {
        Ok(self.get_watcher(member).await?.as_deref() == Some(hostname))
    }

    /// Whether autostart is enabled in the run-time config of `member`. A missing config
    /// means disabled.
    pub async fn autostart_enabled(&self, member: &Member) -> Result<bool, WatchError> {
        let key = member.config_key();
        let Some(value) = self.store.get_value(&key).await? else {
            return Ok(false);
        };
        if value.trim().is_empty() {
            return Ok(false);
        }
        let config: RuntimeConfig = serde_yaml::from_str(&value).map_err(|e| {
            WatchError::protocol(
                self.store.hostname(),
                format!("invalid YAML in key [{key}]: {e}"),
            )
        })?;
        Ok(config.autostart)
    }
}
