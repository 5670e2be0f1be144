// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    cluster::{ClusterTopology, Member},
    commands::CommandContext,
    config::{Config, Host},
    consul::{ConsulCluster, KvEntry, LockStore},
    error::WatchError,
};

/// Given a relative `path` in the test directory, prepend the
/// full path to the test directory.
pub fn test_path(path: &str) -> String {
    std::env::var("CARGO_MANIFEST_DIR").unwrap() + "/tests/" + path
}

/// Build a config with the given hosts and `(service, instances)` pairs, and the default watcher
/// settings.
pub fn test_config(hostnames: &[&str], services: &[(&str, &[&str])]) -> Config {
    let mut config = Config::new();
    for hostname in hostnames {
        config.add_host(Host::new(hostname));
    }
    for (name, instances) in services {
        config.add_service(name, instances);
    }
    config
}

pub fn test_topology(hostnames: &[&str], services: &[(&str, &[&str])]) -> Arc<ClusterTopology> {
    Arc::new(ClusterTopology::from_config(&test_config(
        hostnames, services,
    )))
}

/// A consul cluster whose agents are the given in-memory stores, in that order.
pub fn memory_cluster(stores: &[Arc<MemoryLockStore>]) -> Arc<ConsulCluster> {
    let agents = stores
        .iter()
        .map(|store| Arc::clone(store) as Arc<dyn LockStore>)
        .collect();
    Arc::new(ConsulCluster::new(None, agents))
}

pub fn test_context(
    topology: Arc<ClusterTopology>,
    stores: &[Arc<MemoryLockStore>],
) -> CommandContext {
    CommandContext::new(topology, memory_cluster(stores))
}

#[derive(Debug, Default)]
struct MemoryState {
    kv: HashMap<String, KvEntry>,
    values: HashMap<String, String>,
    /// Session ID to the nodes claiming it. More than one node is invalid data.
    sessions: HashMap<String, Vec<String>>,
    failing_keys: HashSet<String>,
    delayed_keys: HashMap<String, Duration>,
    leader: String,
}

/// A `LockStore` backed by memory, used in place of a Consul agent in tests.
///
/// Every call is counted so that tests can assert on how much traffic a command made.
#[derive(Debug)]
pub struct MemoryLockStore {
    hostname: String,
    reachable: AtomicBool,
    probes: AtomicUsize,
    requests: AtomicUsize,
    state: Mutex<MemoryState>,
}

impl MemoryLockStore {
    pub fn new(hostname: &str) -> Arc<Self> {
        Arc::new(MemoryLockStore {
            hostname: hostname.to_string(),
            reachable: AtomicBool::new(true),
            probes: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            state: Mutex::new(MemoryState::default()),
        })
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of liveness probes received.
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Number of KV, session, and status requests received.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Make `node` hold the watch lock of `member` through `session`.
    pub fn hold_lock(&self, member: &Member, session: &str, node: &str) {
        self.set_lock_session(member, Some(session));
        self.set_session_nodes(session, &[node]);
    }

    /// Create the watch lock key of `member`, held by `session` or by nobody.
    pub fn set_lock_session(&self, member: &Member, session: Option<&str>) {
        let key = member.watch_key().to_string();
        let entry = KvEntry {
            key: key.clone(),
            lock_index: 1,
            flags: 0,
            value: None,
            session: session.map(String::from),
            create_index: 10,
            modify_index: 11,
        };
        self.state.lock().unwrap().kv.insert(key, entry);
    }

    pub fn set_session_nodes(&self, session: &str, nodes: &[&str]) {
        self.state.lock().unwrap().sessions.insert(
            session.to_string(),
            nodes.iter().map(|node| node.to_string()).collect(),
        );
    }

    pub fn set_value(&self, key: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .values
            .insert(key.to_string(), value.to_string());
    }

    /// Every later read of `key` fails with a transport error.
    pub fn fail_key(&self, key: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_keys
            .insert(key.to_string());
    }

    /// Every later read of `key` takes at least `delay`.
    pub fn delay_key(&self, key: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delayed_keys
            .insert(key.to_string(), delay);
    }

    pub fn set_leader(&self, leader: &str) {
        self.state.lock().unwrap().leader = leader.to_string();
    }

    /// Count the request and apply the failure and delay set up for `key`.
    async fn access(&self, key: &str) -> Result<(), WatchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(WatchError::lookup(&self.hostname, "connection refused"));
        }

        let (failing, delay) = {
            let state = self.state.lock().unwrap();
            (
                state.failing_keys.contains(key),
                state.delayed_keys.get(key).copied(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(WatchError::lookup(&self.hostname, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn check_connectable(&self) -> Result<(), WatchError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(WatchError::lookup(&self.hostname, "connection refused"))
        }
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, WatchError> {
        self.access(key).await?;
        Ok(self.state.lock().unwrap().values.get(key).cloned())
    }

    async fn get_detailed_value(&self, key: &str) -> Result<Option<KvEntry>, WatchError> {
        self.access(key).await?;
        Ok(self.state.lock().unwrap().kv.get(key).cloned())
    }

    async fn get_session_owner(&self, session: &str) -> Result<Option<String>, WatchError> {
        self.access(session).await?;
        let state = self.state.lock().unwrap();
        match state.sessions.get(session).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([node]) => Ok(Some(node.clone())),
            Some(nodes) => Err(WatchError::AmbiguousSession {
                session: session.to_string(),
                nodes: nodes.len(),
            }),
        }
    }

    async fn leader(&self) -> Result<String, WatchError> {
        self.access("status/leader").await?;
        Ok(self.state.lock().unwrap().leader.clone())
    }
}
