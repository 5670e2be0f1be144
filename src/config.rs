// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{collections::HashSet, time::Duration};

use {
    log::warn,
    serde::{Deserialize, Serialize},
};

use crate::error::ConfigError;

/// Config, along with its children Host, Service, ConsulConfig and WatcherConfig, is the model
/// for a Clownfish cluster used in the configuration file. The config file is deserialized into a
/// Config object and validated once, right after loading.
///
/// The model used in the config file is intentionally different from the model used at run time
/// (see `cluster::ClusterTopology`), so that the run time model can change without changing the
/// configuration file format.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub consul: ConsulConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Host {
    pub hostname: String,
    /// Whether this host runs a Consul server or client agent. Hosts without a role cannot be
    /// used to query the lock store.
    #[serde(default)]
    pub consul_role: Option<ConsulRole>,
    /// The address the Consul agent on this host listens on. Defaults to the hostname.
    #[serde(default)]
    pub bind_addr: Option<String>,
}

impl Host {
    pub fn new(hostname: &str) -> Self {
        Host {
            hostname: hostname.to_string(),
            consul_role: None,
            bind_addr: None,
        }
    }

    pub fn consul_address(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(&self.hostname)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConsulRole {
    Server,
    Client,
}

/// A Lustre service (MGS, MDT or OST) and the hosts that are able to mount it, in the order the
/// instances were declared.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Service {
    pub name: String,
    pub instances: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConsulConfig {
    /// HTTP API port of every agent.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Raft port reported by `status/leader`.
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_http_port() -> u16 {
    8500
}

fn default_server_port() -> u16 {
    8300
}

fn default_http_timeout_secs() -> u64 {
    5
}

impl Default for ConsulConfig {
    fn default() -> Self {
        ConsulConfig {
            http_port: default_http_port(),
            server_port: default_server_port(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl ConsulConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WatcherConfig {
    /// How many hosts may watch (and be watched by) a single host.
    #[serde(default = "default_max_watch")]
    pub max_watch: usize,
    /// Upper bound on concurrent lock store lookups in one status batch.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
}

fn default_max_watch() -> usize {
    2
}

fn default_parallelism() -> usize {
    10
}

fn default_lookup_timeout_secs() -> u64 {
    10
}

impl Default for WatcherConfig {
    fn default() -> Self {
        WatcherConfig {
            max_watch: default_max_watch(),
            parallelism: default_parallelism(),
            lookup_timeout_secs: default_lookup_timeout_secs(),
        }
    }
}

impl WatcherConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read, parse and validate the configuration file at `path`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn add_host(&mut self, host: Host) {
        self.hosts.push(host);
    }

    pub fn add_service(&mut self, name: &str, instances: &[&str]) {
        self.services.push(Service {
            name: name.to_string(),
            instances: instances.iter().map(|h| h.to_string()).collect(),
        });
    }

    /// Check the config for consistency. All problems are collected and returned together as a
    /// single `ConfigError::Invalid`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        let mut hostnames = HashSet::new();
        for host in &self.hosts {
            if host.hostname.is_empty() {
                problems.push("empty hostname".to_string());
            } else if !hostnames.insert(host.hostname.as_str()) {
                problems.push(format!("duplicate host [{}]", host.hostname));
            }
        }

        let mut service_names = HashSet::new();
        for service in &self.services {
            if service.name.is_empty() {
                problems.push("empty service name".to_string());
            } else if !service_names.insert(service.name.as_str()) {
                problems.push(format!("duplicate service [{}]", service.name));
            }
            if service.instances.is_empty() {
                problems.push(format!("service [{}] has no instances", service.name));
            }
            let mut instance_hosts = HashSet::new();
            for hostname in &service.instances {
                if !hostnames.contains(hostname.as_str()) {
                    problems.push(format!(
                        "instance of service [{}] on unknown host [{hostname}]",
                        service.name
                    ));
                }
                if !instance_hosts.insert(hostname.as_str()) {
                    problems.push(format!(
                        "service [{}] has more than one instance on host [{hostname}]",
                        service.name
                    ));
                }
            }
        }

        if self.watcher.max_watch == 0 {
            problems.push("watcher.max_watch must be at least 1".to_string());
        }
        if self.watcher.parallelism == 0 {
            problems.push("watcher.parallelism must be at least 1".to_string());
        }
        if self.watcher.lookup_timeout_secs == 0 {
            problems.push("watcher.lookup_timeout_secs must be at least 1".to_string());
        }

        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }

        let num_hosts = self.hosts.len();
        if num_hosts > 1 && num_hosts <= self.watcher.max_watch {
            warn!(
                "cluster has {num_hosts} hosts, so each host has only {} watcher candidates \
                 (max_watch = {})",
                num_hosts - 1,
                self.watcher.max_watch
            );
        }

        Ok(())
    }
}
