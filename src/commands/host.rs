// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::{Args, Subcommand};

use crate::{
    cluster::Member,
    commands::{
        status::{print_report, Layout},
        CommandContext, Handle, HandledResult,
    },
    report::{self, HostField, QueryPlan, Report},
};

#[derive(Subcommand, Debug)]
pub enum HostCommands {
    /// Print which host currently watches a host, and which hosts could.
    Watcher(HostArgs),
    /// Print the hosts and services a host currently watches, and which it could.
    Watching(HostArgs),
    /// Print a status table of some or all hosts.
    Status(HostStatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct HostArgs {
    hostname: String,
}

#[derive(Args, Debug, Clone)]
pub struct HostStatusArgs {
    /// Hosts to report on. Defaults to every configured host.
    hostnames: Vec<String>,

    #[arg(long, value_enum, value_delimiter = ',')]
    fields: Option<Vec<HostField>>,
}

const WATCHER_FIELDS: &[HostField] = &[
    HostField::Host,
    HostField::Watcher,
    HostField::WatcherCandidates,
];

const WATCHING_FIELDS: &[HostField] = &[
    HostField::Host,
    HostField::WatchingHosts,
    HostField::CandidateWatchingHosts,
    HostField::WatchingServices,
    HostField::CandidateWatchingServices,
];

pub async fn host(context: &CommandContext, command: &HostCommands) -> HandledResult<()> {
    match command {
        HostCommands::Watcher(args) => {
            report_hosts(context, &[args.hostname.clone()], WATCHER_FIELDS, Layout::Fields).await
        }
        HostCommands::Watching(args) => {
            report_hosts(context, &[args.hostname.clone()], WATCHING_FIELDS, Layout::Fields).await
        }
        HostCommands::Status(args) => {
            let hostnames = if args.hostnames.is_empty() {
                context.topology.all_hostnames().to_vec()
            } else {
                report::sorted_members(&args.hostnames)
            };
            let fields = args.fields.as_deref().unwrap_or(HostField::DEFAULT);
            report_hosts(context, &hostnames, fields, Layout::Table).await
        }
    }
}

async fn report_hosts(
    context: &CommandContext,
    hostnames: &[String],
    fields: &[HostField],
    layout: Layout,
) -> HandledResult<()> {
    for hostname in hostnames {
        context
            .topology
            .check_member(&Member::host(hostname))
            .handle_err(|e| eprintln!("{e}"))?;
    }

    let plan = QueryPlan::for_hosts(&context.topology, hostnames, fields)
        .handle_err(|e| eprintln!("{e}"))?;

    print_report(context, plan, layout, |cache| {
        Report::host_report(cache, hostnames, fields)
    })
    .await
}
