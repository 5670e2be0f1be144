// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Subcommand;

use crate::commands::{handled_error, CommandContext, Handle, HandledResult};

#[derive(Subcommand, Debug)]
pub enum ConsulCommands {
    /// Print the hostname of the Consul server that is the raft leader.
    Leader,
}

pub async fn consul(context: &CommandContext, command: &ConsulCommands) -> HandledResult<()> {
    match command {
        ConsulCommands::Leader => {
            let leader = tokio::select! {
                biased;
                _ = context.cancel.cancelled() => {
                    eprintln!("Cancelled.");
                    return handled_error();
                }
                leader = context.consul.leader() => leader,
            };
            let leader = leader.handle_err(|e| eprintln!("Could not get the Consul leader: {e}"))?;
            println!("{leader}");
            Ok(())
        }
    }
}
