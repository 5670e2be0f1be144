// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod cluster;
pub mod commands;
pub mod config;
pub mod consul;
pub mod error;
pub mod parallel;
pub mod report;
pub mod status;
pub mod test_env;
pub mod watch;
pub mod watcher;

pub fn default_config_path() -> String {
    match std::env::var("CLOWNF_CONFIG") {
        Ok(conf) => conf,
        Err(_) => "/etc/coral/clownf.toml".to_string(),
    }
}

/// The hostname of the machine this command runs on, used to prefer the local Consul agent.
pub fn local_hostname() -> Option<String> {
    match std::env::var("CLOWNF_HOSTNAME") {
        Ok(hostname) => Some(hostname),
        Err(_) => nix::unistd::gethostname()
            .ok()
            .and_then(|hostname| hostname.into_string().ok()),
    }
}
