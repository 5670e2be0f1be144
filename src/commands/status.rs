// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use crate::{
    commands::{handled_error, CommandContext, Handle, HandledResult},
    error::ConfigError,
    report::{QueryPlan, Report},
    status::ClusterStatusCache,
};

/// How a report is printed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Layout {
    Table,
    /// "field: value" lines, for commands about a single member.
    Fields,
}

/// Run the lookups of `plan`, then build and print the report.
///
/// Whatever could be resolved is printed before failures are reported, so a single unreachable
/// member does not hide the state of the others.
pub async fn print_report<F>(
    context: &CommandContext,
    plan: QueryPlan,
    layout: Layout,
    build: F,
) -> HandledResult<()>
where
    F: FnOnce(&ClusterStatusCache) -> Result<Report, ConfigError>,
{
    let mut cache = context.status_cache();
    plan.execute(&mut cache).await;

    let report = build(&cache).handle_err(|e| eprintln!("{e}"))?;
    match layout {
        Layout::Table => {
            print!("{report}");
            for failure in report.failures() {
                eprintln!("{failure}");
            }
        }
        Layout::Fields => print!("{}", report.field_list()),
    }

    if report.failed() || cache.failed() {
        return handled_error();
    }
    Ok(())
}
