// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{io, time::Duration};

use thiserror::Error;

/// Problems with the static cluster configuration. These are fatal for the command that hits
/// them; nothing is retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not open config file \"{path}\": {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Every problem found while validating a parsed config, so that the admin can fix them all
    /// in one pass.
    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("host [{0}] is not configured in the cluster")]
    UnknownHost(String),

    #[error("service [{0}] is not configured in the cluster")]
    UnknownService(String),
}

/// Failures while reading watcher state out of the distributed lock store.
///
/// The error is `Clone` because a single lookup failure is recorded in the per-member result map
/// of a status batch and may be rendered more than once.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WatchError {
    /// No agent of the lock store answered the liveness probe.
    #[error("no quorum member reachable: no Consul agent is up in the system")]
    Unreachable,

    /// A lock is held by a session that does not resolve to exactly one node.
    #[error("ambiguous session data: session [{session}] resolves to {nodes} nodes")]
    AmbiguousSession { session: String, nodes: usize },

    /// The request to the agent failed at the transport level.
    #[error("failed to query Consul agent [{agent}]: {reason}")]
    Lookup { agent: String, reason: String },

    /// The agent answered, but not in a form we understand.
    #[error("unexpected reply from Consul agent [{agent}]: {reason}")]
    Protocol { agent: String, reason: String },

    #[error("lookup of [{0}] timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("lookup of [{0}] was cancelled")]
    Cancelled(String),
}

impl WatchError {
    pub(crate) fn lookup(agent: &str, reason: impl ToString) -> Self {
        WatchError::Lookup {
            agent: agent.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn protocol(agent: &str, reason: impl ToString) -> Self {
        WatchError::Protocol {
            agent: agent.to_string(),
            reason: reason.to_string(),
        }
    }
}
