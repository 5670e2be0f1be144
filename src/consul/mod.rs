// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! The lock store: a distributed key/value store with session-bound advisory locks.
//!
//! Clownfish uses Consul for this. Agents running on the hosts acquire the watch locks; this
//! module only ever reads who holds them.

use std::fmt;

use {async_trait::async_trait, serde::Deserialize};

use crate::error::WatchError;

pub mod agent;
pub mod cluster;

pub use agent::ConsulAgent;
pub use cluster::ConsulCluster;

/// Metadata of a single key, as returned by the Consul KV API.
///
/// `session` is absent when nobody holds a lock on the key.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct KvEntry {
    pub key: String,
    pub lock_index: u64,
    pub flags: u64,
    /// Base64 encoded value. Use `LockStore::get_value` to read the decoded value.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub session: Option<String>,
    pub create_index: u64,
    pub modify_index: u64,
}

/// One agent of the lock store.
///
/// Every method is a network round trip. "Not found" is never an error: it is reported as
/// `Ok(None)`.
#[async_trait]
pub trait LockStore: Send + Sync + fmt::Debug {
    /// Hostname of the host this agent runs on.
    fn hostname(&self) -> &str;

    /// Cheap liveness probe.
    async fn check_connectable(&self) -> Result<(), WatchError>;

    /// Read the decoded value of `key`.
    async fn get_value(&self, key: &str) -> Result<Option<String>, WatchError>;

    /// Read the metadata of `key`, including the lock session if one is held.
    async fn get_detailed_value(&self, key: &str) -> Result<Option<KvEntry>, WatchError>;

    /// Resolve a session to the node that owns it. Returns `Ok(None)` when the session is
    /// unknown, and `WatchError::AmbiguousSession` when more than one node claims it.
    async fn get_session_owner(&self, session: &str) -> Result<Option<String>, WatchError>;

    /// Address of the current raft leader, e.g. "10.0.0.1:8300". Empty if there is none.
    async fn leader(&self) -> Result<String, WatchError>;
}
