// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod consul;
pub mod host;
pub mod service;
pub mod status;
pub mod validate;

use std::sync::Arc;

use {
    clap::{Parser, Subcommand},
    log::debug,
    tokio_util::sync::CancellationToken,
};

use {
    consul::ConsulCommands,
    host::HostCommands,
    service::ServiceCommands,
};

use crate::{
    cluster::ClusterTopology, config::Config, consul::ConsulCluster, parallel::BatchOptions,
    status::ClusterStatusCache,
};

/// A `HandledError` represents an error that has already been handled. When you call a function
/// that returns a `HandledError` or `HandledResult`, you don't need to do anything with that error,
/// other than just be aware that it happened, and return it on to your caller.
///
/// `main()` has a special responsibility: since its "caller" is, in a certain sense, the operating
/// system, `main()` must return a nonzero exit status when it gets a `HandledError`.
///
/// The primary way to construct a `HandledError` is with the `handle_err()` function, which turns a
/// generic error into a `HandledError`, and also runs some caller-provided code to handle the
/// error. That provided code would normally do something like report the error to stderr.
///
/// A `HandledError` intentionally has no data about what the specific error was; the process of
/// handling the error "consumes" that information, and it is no longer needed as the error was
/// already appropriately handled.
#[derive(Debug, PartialEq)]
pub struct HandledError {}

pub type HandledResult<T> = std::result::Result<T, HandledError>;

pub fn handled_error() -> HandledResult<()> {
    HandledResult::Err(HandledError {})
}

pub trait Handle<T, F> {
    fn handle_err(self, handler: F) -> HandledResult<T>;
}

impl<T, E, F: FnOnce(E)> Handle<T, F> for std::result::Result<T, E> {
    /// Handle an error by running the provided `handler` code, giving it the error.
    ///
    /// Then, return a `HandledResult`, so that transitive callers of this function know that they
    /// do not need to do anything further to handle the error.
    fn handle_err(self, handler: F) -> HandledResult<T> {
        self.map_err(|e| {
            handler(e);
            HandledError {}
        })
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watcher state of hosts.
    #[command(subcommand)]
    Host(HostCommands),
    /// Watcher state of Lustre services.
    #[command(subcommand)]
    Service(ServiceCommands),
    #[command(subcommand)]
    Consul(ConsulCommands),
    /// Check the config file and print the watch candidates it implies.
    Validate,
}

impl Cli {
    pub fn config_path(&self) -> String {
        match &self.config {
            Some(path) => path.clone(),
            None => crate::default_config_path(),
        }
    }

    pub fn load_config(&self) -> HandledResult<Config> {
        let path = self.config_path();
        Config::load(&path).handle_err(|e| eprintln!("{e}"))
    }
}

/// Everything a command needs to query the cluster. Built once per invocation.
#[derive(Debug)]
pub struct CommandContext {
    pub topology: Arc<ClusterTopology>,
    pub consul: Arc<ConsulCluster>,
    pub options: BatchOptions,
    /// Cancelled on Ctrl-C.
    pub cancel: CancellationToken,
}

impl CommandContext {
    pub fn new(topology: Arc<ClusterTopology>, consul: Arc<ConsulCluster>) -> Self {
        CommandContext {
            topology,
            consul,
            options: BatchOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(conf: &Config) -> HandledResult<Self> {
        let local_hostname = crate::local_hostname();
        debug!("local hostname: {local_hostname:?}");

        let consul = ConsulCluster::from_config(conf, local_hostname)
            .handle_err(|e| eprintln!("Could not set up Consul clients: {e}"))?;
        if consul.is_empty() {
            eprintln!("No host of the config has a Consul agent (consul_role).");
            return Err(HandledError {});
        }

        Ok(CommandContext {
            topology: Arc::new(ClusterTopology::from_config(conf)),
            consul: Arc::new(consul),
            options: BatchOptions::from_config(&conf.watcher),
            cancel: CancellationToken::new(),
        })
    }

    /// A fresh status cache for one command.
    pub fn status_cache(&self) -> ClusterStatusCache {
        ClusterStatusCache::new(
            Arc::clone(&self.topology),
            Arc::clone(&self.consul),
            self.options.clone(),
            self.cancel.clone(),
        )
    }
}

pub fn main(cli: &Cli) -> HandledResult<()> {
    if let Commands::Validate = cli.command {
        return validate::validate(cli);
    }

    let config = cli.load_config()?;
    let context = CommandContext::from_config(&config)?;

    let rt = tokio::runtime::Runtime::new()
        .handle_err(|e| eprintln!("Error launching tokio runtime: {e}"))?;

    rt.block_on(async {
        let cancel = context.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupted, cancelling lookups.");
                cancel.cancel();
            }
        });

        run(&context, &cli.command).await
    })
}

/// Dispatch a command that talks to the cluster.
pub async fn run(context: &CommandContext, command: &Commands) -> HandledResult<()> {
    match command {
        Commands::Host(command) => host::host(context, command).await,
        Commands::Service(command) => service::service(context, command).await,
        Commands::Consul(command) => consul::consul(context, command).await,
        Commands::Validate => unreachable!(),
    }
}
