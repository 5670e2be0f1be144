// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::sync::Arc;

use log::{debug, info};

use crate::{
    config::{Config, ConsulRole},
    consul::{ConsulAgent, LockStore},
    error::WatchError,
};

/// A Consul server, known by the hostname it runs on and the address it binds to.
#[derive(Debug, Clone)]
struct ConsulServer {
    hostname: String,
    bind_addr: String,
}

/// All Consul agents (servers and clients) of the cluster.
#[derive(Debug)]
pub struct ConsulCluster {
    /// The host this command runs on. Its agent, if any, is tried first.
    local_hostname: Option<String>,
    agents: Vec<Arc<dyn LockStore>>,
    servers: Vec<ConsulServer>,
    server_port: u16,
}

impl ConsulCluster {
    pub fn new(local_hostname: Option<String>, agents: Vec<Arc<dyn LockStore>>) -> Self {
        ConsulCluster {
            local_hostname,
            agents,
            servers: Vec::new(),
            server_port: crate::config::ConsulConfig::default().server_port,
        }
    }

    /// Register a Consul server so that the raft leader address can be mapped back to a
    /// hostname.
    pub fn add_server(&mut self, hostname: &str, bind_addr: &str) {
        self.servers.push(ConsulServer {
            hostname: hostname.to_string(),
            bind_addr: bind_addr.to_string(),
        });
    }

    /// Build one `ConsulAgent` for every host of the config that has a Consul role.
    pub fn from_config(conf: &Config, local_hostname: Option<String>) -> Result<Self, WatchError> {
        let mut cluster = Self::new(local_hostname, Vec::new());
        cluster.server_port = conf.consul.server_port;

        for host in conf.hosts.iter() {
            let Some(role) = host.consul_role else {
                continue;
            };
            let agent = ConsulAgent::new(
                &host.hostname,
                host.consul_address(),
                conf.consul.http_port,
                conf.consul.http_timeout(),
            )?;
            cluster.agents.push(Arc::new(agent));
            if role == ConsulRole::Server {
                cluster.add_server(&host.hostname, host.consul_address());
            }
        }

        Ok(cluster)
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agent(&self, hostname: &str) -> Option<Arc<dyn LockStore>> {
        self.agents
            .iter()
            .find(|agent| agent.hostname() == hostname)
            .map(Arc::clone)
    }

    /// The agents to try, in order of preference: the local agent first, then every other
    /// agent in configuration order.
    pub fn list_reachable_agents(&self) -> Vec<Arc<dyn LockStore>> {
        let local = self
            .local_hostname
            .as_deref()
            .and_then(|hostname| self.agent(hostname));

        let mut agents = Vec::with_capacity(self.agents.len());
        if let Some(local) = &local {
            agents.push(Arc::clone(local));
        }
        for agent in &self.agents {
            if local
                .as_ref()
                .is_some_and(|local| local.hostname() == agent.hostname())
            {
                continue;
            }
            agents.push(Arc::clone(agent));
        }
        agents
    }

    /// Probe the agents one after another and return the first that answers.
    pub async fn alive_agent(&self) -> Option<Arc<dyn LockStore>> {
        for agent in self.list_reachable_agents() {
            match agent.check_connectable().await {
                Ok(()) => {
                    info!("using Consul agent on host [{}]", agent.hostname());
                    return Some(agent);
                }
                Err(e) => debug!("Consul agent on host [{}] is not usable: {e}", agent.hostname()),
            }
        }
        None
    }

    /// Hostname of the Consul server that is currently the raft leader.
    pub async fn leader(&self) -> Result<String, WatchError> {
        let agent = self.alive_agent().await.ok_or(WatchError::Unreachable)?;
        let leader = agent.leader().await?;
        if leader.is_empty() {
            return Err(WatchError::protocol(agent.hostname(), "no Consul leader elected"));
        }

        let Some((address, port)) = leader.rsplit_once(':') else {
            return Err(WatchError::protocol(
                agent.hostname(),
                format!("malformed leader address [{leader}]"),
            ));
        };
        if port != self.server_port.to_string() {
            return Err(WatchError::protocol(
                agent.hostname(),
                format!("unexpected port of Consul leader [{leader}]"),
            ));
        }

        self.servers
            .iter()
            .find(|server| server.bind_addr == address)
            .map(|server| server.hostname.clone())
            .ok_or_else(|| {
                WatchError::protocol(
                    agent.hostname(),
                    format!("IP of Consul leader [{leader}] does not belong to a Consul server"),
                )
            })
    }
}
