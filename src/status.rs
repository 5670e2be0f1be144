// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! status.rs
//!
//! Batch resolution of the cluster-wide watcher state, as needed by the status reports.
//!
//! All lookups of a command go through a single "active node": the first Consul agent that
//! answers the liveness probe. Once found, per-member lookups fan out through the bounded
//! executor in `parallel`, and their results are merged into maps kept by the cache.

use std::{collections::BTreeMap, future::Future, sync::Arc};

use {
    log::{debug, error},
    tokio_util::sync::CancellationToken,
};

use crate::{
    cluster::{ClusterTopology, Member, MemberKind},
    consul::ConsulCluster,
    error::WatchError,
    parallel::{self, BatchOptions},
    watcher::WatcherResolver,
};

/// Outcome of looking up the watcher of one member.
pub type WatcherLookup = Result<Option<String>, WatchError>;

/// Outcome of reading the autostart flag of one member.
pub type AutostartLookup = Result<bool, WatchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    ActiveNodeResolving,
    ActiveNodeResolved,
    /// Terminal: no agent answered, every later lookup fails without touching the network.
    ActiveNodeUnreachable,
    WatchersResolving,
    WatchersResolved,
}

/// Per-kind result maps, keyed by member identity.
#[derive(Debug, Default)]
struct Lookups {
    watchers: BTreeMap<String, WatcherLookup>,
    autostart: BTreeMap<String, AutostartLookup>,
}

#[derive(Debug)]
pub struct ClusterStatusCache {
    topology: Arc<ClusterTopology>,
    consul: Arc<ConsulCluster>,
    options: BatchOptions,
    cancel: CancellationToken,
    state: CacheState,
    active: Option<WatcherResolver>,
    /// Why the active node could not be resolved. Recorded against every member requested
    /// afterwards.
    active_error: Option<WatchError>,
    hosts: Lookups,
    services: Lookups,
    failed: bool,
}

impl ClusterStatusCache {
    pub fn new(
        topology: Arc<ClusterTopology>,
        consul: Arc<ConsulCluster>,
        options: BatchOptions,
        cancel: CancellationToken,
    ) -> Self {
        ClusterStatusCache {
            topology,
            consul,
            options,
            cancel,
            state: CacheState::Uninitialized,
            active: None,
            active_error: None,
            hosts: Lookups::default(),
            services: Lookups::default(),
            failed: false,
        }
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    /// Whether anything resolved through this cache has failed so far.
    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn topology(&self) -> &ClusterTopology {
        &self.topology
    }

    /// Hostname of the agent used for lookups, once resolved.
    pub fn active_hostname(&self) -> Option<&str> {
        self.active.as_ref().map(WatcherResolver::agent_hostname)
    }

    /// Find the agent that all further lookups go through. The result is memoized, including
    /// failure.
    pub async fn resolve_active_node(&mut self) -> Result<String, WatchError> {
        self.active_resolver()
            .await
            .map(|resolver| resolver.agent_hostname().to_string())
    }

    async fn active_resolver(&mut self) -> Result<WatcherResolver, WatchError> {
        if let Some(resolver) = &self.active {
            return Ok(resolver.clone());
        }
        if let Some(e) = &self.active_error {
            return Err(e.clone());
        }

        self.state = CacheState::ActiveNodeResolving;
        let agent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(WatchError::Cancelled("active node".to_string())),
            agent = self.consul.alive_agent() => agent.ok_or(WatchError::Unreachable),
        };

        match agent {
            Ok(agent) => {
                let resolver = WatcherResolver::new(agent);
                self.active = Some(resolver.clone());
                self.state = CacheState::ActiveNodeResolved;
                Ok(resolver)
            }
            Err(e) => {
                error!("{e}");
                self.active_error = Some(e.clone());
                self.state = CacheState::ActiveNodeUnreachable;
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Run one lookup per member of `kind`, or per member of `only` if given.
    async fn batch<T, F, Fut>(
        &mut self,
        kind: MemberKind,
        only: Option<&[String]>,
        lookup: F,
    ) -> Vec<(String, Result<T, WatchError>)>
    where
        F: Fn(WatcherResolver, Member) -> Fut,
        Fut: Future<Output = Result<T, WatchError>>,
    {
        let identities = match only {
            Some(only) => only.to_vec(),
            None => self.topology.identities(kind),
        };

        let resolver = match self.active_resolver().await {
            Ok(resolver) => resolver,
            Err(e) => {
                return identities
                    .into_iter()
                    .map(|identity| (identity, Err(e.clone())))
                    .collect()
            }
        };

        debug!(
            "looking up {} {kind} members through agent [{}]",
            identities.len(),
            resolver.agent_hostname()
        );
        self.state = CacheState::WatchersResolving;
        let options = self.options.clone();
        let cancel = self.cancel.clone();
        let lookup = &lookup;
        let results = parallel::run_batch(identities, &options, &cancel, move |identity| {
            lookup(resolver.clone(), Member::new(kind, &identity))
        })
        .await;
        self.state = CacheState::WatchersResolved;
        results
    }

    fn lookups_mut(&mut self, kind: MemberKind) -> &mut Lookups {
        match kind {
            MemberKind::Host => &mut self.hosts,
            MemberKind::Service => &mut self.services,
        }
    }

    fn lookups(&self, kind: MemberKind) -> &Lookups {
        match kind {
            MemberKind::Host => &self.hosts,
            MemberKind::Service => &self.services,
        }
    }

    /// Look up the watcher of every member of `kind` (or only those in `only`).
    ///
    /// Each requested member gets exactly one entry, overwriting any earlier one. Returns
    /// whether any of the lookups failed.
    pub async fn resolve_watchers(&mut self, kind: MemberKind, only: Option<&[String]>) -> bool {
        let results = self
            .batch(kind, only, |resolver, member| async move {
                resolver.get_watcher(&member).await
            })
            .await;

        let failed = parallel::any_failed(&results);
        let watchers = &mut self.lookups_mut(kind).watchers;
        for (identity, result) in results {
            if let Err(e) = &result {
                debug!("failed to get the watcher of {kind} [{identity}]: {e}");
            }
            watchers.insert(identity, result);
        }
        self.failed |= failed;
        failed
    }

    /// Read the autostart flag of every member of `kind` (or only those in `only`).
    pub async fn resolve_autostart(&mut self, kind: MemberKind, only: Option<&[String]>) -> bool {
        let results = self
            .batch(kind, only, |resolver, member| async move {
                resolver.autostart_enabled(&member).await
            })
            .await;

        let failed = parallel::any_failed(&results);
        let autostart = &mut self.lookups_mut(kind).autostart;
        for (identity, result) in results {
            if let Err(e) = &result {
                debug!("failed to get the autostart config of {kind} [{identity}]: {e}");
            }
            autostart.insert(identity, result);
        }
        self.failed |= failed;
        failed
    }

    /// The recorded watcher lookup of a member, if it was requested.
    pub fn watcher(&self, kind: MemberKind, identity: &str) -> Option<&WatcherLookup> {
        self.lookups(kind).watchers.get(identity)
    }

    /// Every recorded watcher lookup of `kind`, sorted by identity.
    pub fn watchers(&self, kind: MemberKind) -> &BTreeMap<String, WatcherLookup> {
        &self.lookups(kind).watchers
    }

    pub fn autostart(&self, kind: MemberKind, identity: &str) -> Option<&AutostartLookup> {
        self.lookups(kind).autostart.get(identity)
    }

    /// Members of `kind` whose resolved watcher is `hostname`, sorted.
    pub fn watched_by(&self, kind: MemberKind, hostname: &str) -> Vec<&str> {
        self.lookups(kind)
            .watchers
            .iter()
            .filter(|(_, watcher)| matches!(watcher, Ok(Some(h)) if h == hostname))
            .map(|(identity, _)| identity.as_str())
            .collect()
    }
}
