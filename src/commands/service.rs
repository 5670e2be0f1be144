// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::{Args, Subcommand};

use crate::{
    cluster::Member,
    commands::{
        status::{print_report, Layout},
        CommandContext, Handle, HandledResult,
    },
    report::{self, QueryPlan, Report, ServiceField},
};

#[derive(Subcommand, Debug)]
pub enum ServiceCommands {
    /// Print which host currently watches a service, and which hosts could.
    Watcher(ServiceArgs),
    /// Print a status table of some or all services.
    Status(ServiceStatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    service: String,
}

#[derive(Args, Debug, Clone)]
pub struct ServiceStatusArgs {
    /// Services to report on. Defaults to every configured service.
    services: Vec<String>,

    #[arg(long, value_enum, value_delimiter = ',')]
    fields: Option<Vec<ServiceField>>,
}

pub async fn service(context: &CommandContext, command: &ServiceCommands) -> HandledResult<()> {
    match command {
        ServiceCommands::Watcher(args) => {
            report_services(
                context,
                &[args.service.clone()],
                ServiceField::DEFAULT,
                Layout::Fields,
            )
            .await
        }
        ServiceCommands::Status(args) => {
            let services = if args.services.is_empty() {
                context
                    .topology
                    .service_names()
                    .map(String::from)
                    .collect()
            } else {
                report::sorted_members(&args.services)
            };
            let fields = args.fields.as_deref().unwrap_or(ServiceField::DEFAULT);
            report_services(context, &services, fields, Layout::Table).await
        }
    }
}

async fn report_services(
    context: &CommandContext,
    services: &[String],
    fields: &[ServiceField],
    layout: Layout,
) -> HandledResult<()> {
    for service in services {
        context
            .topology
            .check_member(&Member::service(service))
            .handle_err(|e| eprintln!("{e}"))?;
    }

    let plan = QueryPlan::for_services(services, fields);

    print_report(context, plan, layout, |cache| {
        Report::service_report(cache, services, fields)
    })
    .await
}
