// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{collections::BTreeMap, fmt};

use crate::{config::Config, error::ConfigError, watch};

/// Consul KV directory holding per-host keys.
pub const HOST_PATH: &str = "clownf_host";
/// Consul KV directory holding per-service keys.
pub const SERVICE_PATH: &str = "clownf_service";
/// Name of the key whose lock session identifies the watcher.
pub const LOCK_SUFFIX: &str = "lock";
/// Name of the key holding the YAML run-time config of a host or service.
pub const CONFIG_SUFFIX: &str = "config";

/// Hosts and services live in two separate namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    Host,
    Service,
}

impl MemberKind {
    fn path(&self) -> &'static str {
        match self {
            MemberKind::Host => HOST_PATH,
            MemberKind::Service => SERVICE_PATH,
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                MemberKind::Host => "host",
                MemberKind::Service => "service",
            }
        )
    }
}

/// Something that can be watched: a host by its hostname, or a Lustre service by its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Member {
    kind: MemberKind,
    identity: String,
}

impl Member {
    pub fn new(kind: MemberKind, identity: &str) -> Self {
        Member {
            kind,
            identity: identity.to_string(),
        }
    }

    pub fn host(hostname: &str) -> Self {
        Self::new(MemberKind::Host, hostname)
    }

    pub fn service(name: &str) -> Self {
        Self::new(MemberKind::Service, name)
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn watch_key(&self) -> WatchKey {
        WatchKey::for_member(self)
    }

    pub fn config_key(&self) -> String {
        format!("{}/{}/{}", self.kind.path(), self.identity, CONFIG_SUFFIX)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.kind, self.identity)
    }
}

/// Path of the Consul lock guarding the watch relation of one member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchKey(String);

impl WatchKey {
    pub fn for_member(member: &Member) -> Self {
        WatchKey(format!(
            "{}/{}/{}",
            member.kind.path(),
            member.identity,
            LOCK_SUFFIX
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ClusterTopology is the model used to represent the static shape of the cluster in memory.
///
/// Unlike the config file, which lists hosts and services in whatever order the admin wrote
/// them, the topology keeps hostnames sorted so that every process derives the same watch ring.
/// It is built once per command and never changes afterwards.
#[derive(Debug)]
pub struct ClusterTopology {
    hostnames: Vec<String>,
    /// Service name to the hostnames able to mount it, in declaration order.
    services: BTreeMap<String, Vec<String>>,
    max_watch: usize,
}

impl ClusterTopology {
    pub fn from_config(conf: &Config) -> Self {
        let hostnames = watch::sorted_ring(conf.hosts.iter().map(|host| host.hostname.as_str()));
        let services = conf
            .services
            .iter()
            .map(|service| (service.name.clone(), service.instances.clone()))
            .collect();

        ClusterTopology {
            hostnames,
            services,
            max_watch: conf.watcher.max_watch,
        }
    }

    /// Every configured hostname, sorted.
    pub fn all_hostnames(&self) -> &[String] {
        &self.hostnames
    }

    pub fn max_watch(&self) -> usize {
        self.max_watch
    }

    pub fn contains_host(&self, hostname: &str) -> bool {
        self.hostnames
            .binary_search_by(|name| name.as_str().cmp(hostname))
            .is_ok()
    }

    pub fn contains_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    /// Every configured service name, sorted.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// The hosts that have an instance of `service`, in the order they were configured.
    pub fn instance_hostnames(&self, service: &str) -> Result<&[String], ConfigError> {
        self.services
            .get(service)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigError::UnknownService(service.to_string()))
    }

    /// All identities of the given kind.
    pub fn identities(&self, kind: MemberKind) -> Vec<String> {
        match kind {
            MemberKind::Host => self.hostnames.clone(),
            MemberKind::Service => self.services.keys().cloned().collect(),
        }
    }

    /// Make sure that `member` is part of this cluster.
    pub fn check_member(&self, member: &Member) -> Result<(), ConfigError> {
        match member.kind() {
            MemberKind::Host if !self.contains_host(member.identity()) => {
                Err(ConfigError::UnknownHost(member.identity().to_string()))
            }
            MemberKind::Service if !self.contains_service(member.identity()) => {
                Err(ConfigError::UnknownService(member.identity().to_string()))
            }
            _ => Ok(()),
        }
    }

    /// The hosts that could hold the watch lock of `member`.
    ///
    /// For a host, these are its predecessors on the watch ring. For a service, they are simply
    /// the hosts that can mount it.
    pub fn watcher_candidates(&self, member: &Member) -> Result<Vec<&str>, ConfigError> {
        match member.kind() {
            MemberKind::Host => {
                watch::watcher_candidates(&self.hostnames, member.identity(), self.max_watch)
                    .ok_or_else(|| ConfigError::UnknownHost(member.identity().to_string()))
            }
            MemberKind::Service => Ok(self
                .instance_hostnames(member.identity())?
                .iter()
                .map(String::as_str)
                .collect()),
        }
    }

    /// The hosts that `hostname` could watch.
    pub fn watching_candidate_hosts(&self, hostname: &str) -> Result<Vec<&str>, ConfigError> {
        watch::watching_candidates(&self.hostnames, hostname, self.max_watch)
            .ok_or_else(|| ConfigError::UnknownHost(hostname.to_string()))
    }

    /// The services that `hostname` could watch, which are the ones it has an instance of.
    pub fn watching_candidate_services(&self, hostname: &str) -> Result<Vec<&str>, ConfigError> {
        if !self.contains_host(hostname) {
            return Err(ConfigError::UnknownHost(hostname.to_string()));
        }
        Ok(self
            .services
            .iter()
            .filter(|(_, instances)| instances.iter().any(|h| h == hostname))
            .map(|(name, _)| name.as_str())
            .collect())
    }

    /// Hosts that might currently be watched by any of `hostnames`.
    pub fn possible_watched_hostnames(
        &self,
        hostnames: &[String],
    ) -> Result<Vec<&str>, ConfigError> {
        let lists = hostnames
            .iter()
            .map(|hostname| self.watching_candidate_hosts(hostname))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(watch::merge_candidates(lists))
    }

    /// Services that might currently be watched by any of `hostnames`.
    pub fn possible_watched_service_names(
        &self,
        hostnames: &[String],
    ) -> Result<Vec<&str>, ConfigError> {
        let lists = hostnames
            .iter()
            .map(|hostname| self.watching_candidate_services(hostname))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(watch::merge_candidates(lists))
    }

    /// Print the watch ring and the service candidates, used by the `validate` command.
    pub fn print_summary(&self) {
        println!(
            "{} hosts, {} services, max_watch = {}",
            self.hostnames.len(),
            self.services.len(),
            self.max_watch
        );
        for hostname in &self.hostnames {
            let member = Member::host(hostname);
            let watchers = self.watcher_candidates(&member).unwrap_or_default();
            let watching = self.watching_candidate_hosts(hostname).unwrap_or_default();
            println!(
                "host {hostname}: watched by [{}], watching [{}]",
                watchers.join(", "),
                watching.join(", ")
            );
        }
        for (name, instances) in &self.services {
            println!("service {name}: watched by [{}]", instances.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_keys() {
        assert_eq!(
            Member::host("server0").watch_key().as_str(),
            "clownf_host/server0/lock"
        );
        assert_eq!(
            Member::service("lustre0-OST000a").watch_key().as_str(),
            "clownf_service/lustre0-OST000a/lock"
        );
        assert_eq!(
            Member::host("server0").config_key(),
            "clownf_host/server0/config"
        );
    }

    #[test]
    fn same_identity_different_kind() {
        assert_ne!(
            Member::host("x").watch_key(),
            Member::service("x").watch_key()
        );
    }
}
