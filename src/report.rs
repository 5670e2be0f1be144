// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! report.rs
//!
//! Status tables for hosts and services.
//!
//! A report is built in two steps: a `QueryPlan` derived from the requested fields runs only
//! the lookups those fields need, then rows are filled in from the `ClusterStatusCache`.

use std::fmt;

use clap::ValueEnum;

use crate::{
    cluster::{ClusterTopology, Member, MemberKind},
    error::ConfigError,
    status::ClusterStatusCache,
    watch,
};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "snake_case")]
pub enum HostField {
    Host,
    Watcher,
    WatcherCandidates,
    WatchingHosts,
    CandidateWatchingHosts,
    WatchingServices,
    CandidateWatchingServices,
    Autostart,
}

impl HostField {
    pub const DEFAULT: &'static [HostField] =
        &[HostField::Host, HostField::Watcher, HostField::WatcherCandidates];

    pub fn header(&self) -> &'static str {
        match self {
            HostField::Host => "host",
            HostField::Watcher => "watcher",
            HostField::WatcherCandidates => "watcher_candidates",
            HostField::WatchingHosts => "watching_hosts",
            HostField::CandidateWatchingHosts => "candidate_watching_hosts",
            HostField::WatchingServices => "watching_services",
            HostField::CandidateWatchingServices => "candidate_watching_services",
            HostField::Autostart => "autostart",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "snake_case")]
pub enum ServiceField {
    Service,
    Watcher,
    WatcherCandidates,
    Autostart,
}

impl ServiceField {
    pub const DEFAULT: &'static [ServiceField] = &[
        ServiceField::Service,
        ServiceField::Watcher,
        ServiceField::WatcherCandidates,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            ServiceField::Service => "service",
            ServiceField::Watcher => "watcher",
            ServiceField::WatcherCandidates => "watcher_candidates",
            ServiceField::Autostart => "autostart",
        }
    }
}

/// Value of one cell of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldResult {
    NotRequested,
    Value(String),
    /// The lookup behind this cell failed. Holds the error message.
    Failed(String),
}

impl FieldResult {
    fn list(items: &[&str]) -> Self {
        if items.is_empty() {
            FieldResult::Value("none".to_string())
        } else {
            FieldResult::Value(items.join(","))
        }
    }
}

impl fmt::Display for FieldResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldResult::NotRequested => write!(f, "-"),
            FieldResult::Value(value) => write!(f, "{value}"),
            FieldResult::Failed(_) => write!(f, "ERROR"),
        }
    }
}

/// Which batches of the status cache a report needs, and for which members.
///
/// `None` means the batch is not needed at all.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct QueryPlan {
    pub host_watchers: Option<Vec<String>>,
    pub service_watchers: Option<Vec<String>>,
    pub host_autostart: Option<Vec<String>>,
    pub service_autostart: Option<Vec<String>>,
}

fn extend(slot: &mut Option<Vec<String>>, identities: &[&str]) {
    let list = slot.get_or_insert_with(Vec::new);
    for identity in identities {
        if !list.iter().any(|known| known == identity) {
            list.push(identity.to_string());
        }
    }
}

impl QueryPlan {
    pub fn for_hosts(
        topology: &ClusterTopology,
        hostnames: &[String],
        fields: &[HostField],
    ) -> Result<Self, ConfigError> {
        let listed: Vec<&str> = hostnames.iter().map(String::as_str).collect();
        let mut plan = QueryPlan::default();

        for field in fields {
            match field {
                HostField::Watcher => extend(&mut plan.host_watchers, &listed),
                HostField::WatchingHosts => extend(
                    &mut plan.host_watchers,
                    &topology.possible_watched_hostnames(hostnames)?,
                ),
                HostField::WatchingServices => extend(
                    &mut plan.service_watchers,
                    &topology.possible_watched_service_names(hostnames)?,
                ),
                HostField::Autostart => extend(&mut plan.host_autostart, &listed),
                HostField::Host
                | HostField::WatcherCandidates
                | HostField::CandidateWatchingHosts
                | HostField::CandidateWatchingServices => {}
            }
        }
        Ok(plan)
    }

    pub fn for_services(services: &[String], fields: &[ServiceField]) -> Self {
        let listed: Vec<&str> = services.iter().map(String::as_str).collect();
        let mut plan = QueryPlan::default();

        for field in fields {
            match field {
                ServiceField::Watcher => extend(&mut plan.service_watchers, &listed),
                ServiceField::Autostart => extend(&mut plan.service_autostart, &listed),
                ServiceField::Service | ServiceField::WatcherCandidates => {}
            }
        }
        plan
    }

    /// Whether the report can be built from the topology alone.
    pub fn is_empty(&self) -> bool {
        self == &QueryPlan::default()
    }

    /// Run every batch the plan needs. Returns whether any lookup failed.
    pub async fn execute(&self, cache: &mut ClusterStatusCache) -> bool {
        let mut failed = false;
        if let Some(only) = &self.host_watchers {
            failed |= cache.resolve_watchers(MemberKind::Host, Some(only)).await;
        }
        if let Some(only) = &self.service_watchers {
            failed |= cache.resolve_watchers(MemberKind::Service, Some(only)).await;
        }
        if let Some(only) = &self.host_autostart {
            failed |= cache.resolve_autostart(MemberKind::Host, Some(only)).await;
        }
        if let Some(only) = &self.service_autostart {
            failed |= cache.resolve_autostart(MemberKind::Service, Some(only)).await;
        }
        failed
    }
}

#[derive(Debug)]
pub struct ReportRow {
    pub member: Member,
    pub cells: Vec<FieldResult>,
}

/// Rows of one kind of member, all with the same columns.
#[derive(Debug)]
pub struct Report {
    headers: Vec<&'static str>,
    rows: Vec<ReportRow>,
}

impl Report {
    pub fn headers(&self) -> &[&'static str] {
        &self.headers
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn failed(&self) -> bool {
        self.rows
            .iter()
            .flat_map(|row| row.cells.iter())
            .any(|cell| matches!(cell, FieldResult::Failed(_)))
    }

    /// One line per failed cell, naming the member and the column.
    pub fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();
        for row in &self.rows {
            for (header, cell) in self.headers.iter().zip(row.cells.iter()) {
                if let FieldResult::Failed(reason) = cell {
                    failures.push(format!("{}: {header}: {reason}", row.member));
                }
            }
        }
        failures
    }

    /// Render as "field: value" lines, with a blank line between members.
    pub fn field_list(&self) -> FieldList<'_> {
        FieldList(self)
    }

    pub fn host_report(
        cache: &ClusterStatusCache,
        hostnames: &[String],
        fields: &[HostField],
    ) -> Result<Self, ConfigError> {
        let topology = cache.topology();
        let mut rows = Vec::with_capacity(hostnames.len());
        for hostname in hostnames {
            let member = Member::host(hostname);
            let cells = fields
                .iter()
                .map(|field| host_cell(topology, cache, &member, *field))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(ReportRow { member, cells });
        }
        Ok(Report {
            headers: fields.iter().map(HostField::header).collect(),
            rows,
        })
    }

    pub fn service_report(
        cache: &ClusterStatusCache,
        services: &[String],
        fields: &[ServiceField],
    ) -> Result<Self, ConfigError> {
        let topology = cache.topology();
        let mut rows = Vec::with_capacity(services.len());
        for service in services {
            let member = Member::service(service);
            let cells = fields
                .iter()
                .map(|field| service_cell(topology, cache, &member, *field))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(ReportRow { member, cells });
        }
        Ok(Report {
            headers: fields.iter().map(ServiceField::header).collect(),
            rows,
        })
    }
}

/// The current watcher of `member`. A holder that is not one of its candidates is still shown,
/// with a marker: it is legitimate right after a topology change.
fn watcher_cell(
    topology: &ClusterTopology,
    cache: &ClusterStatusCache,
    member: &Member,
) -> Result<FieldResult, ConfigError> {
    let candidates = topology.watcher_candidates(member)?;
    Ok(match cache.watcher(member.kind(), member.identity()) {
        None => FieldResult::NotRequested,
        Some(Err(e)) => FieldResult::Failed(e.to_string()),
        Some(Ok(None)) => FieldResult::Value("none".to_string()),
        Some(Ok(Some(holder))) if candidates.contains(&holder.as_str()) => {
            FieldResult::Value(holder.clone())
        }
        Some(Ok(Some(holder))) => FieldResult::Value(format!("{holder} (not a candidate)")),
    })
}

/// Members of `kind` that `hostname` watches, provided every candidate could be looked up.
fn watching_cell(
    cache: &ClusterStatusCache,
    kind: MemberKind,
    hostname: &str,
    candidates: &[&str],
) -> FieldResult {
    let failures: Vec<String> = candidates
        .iter()
        .filter_map(|identity| match cache.watcher(kind, identity) {
            Some(Err(e)) => Some(format!("{kind} [{identity}]: {e}")),
            _ => None,
        })
        .collect();
    if !failures.is_empty() {
        return FieldResult::Failed(failures.join("; "));
    }
    FieldResult::list(&cache.watched_by(kind, hostname))
}

fn autostart_cell(cache: &ClusterStatusCache, member: &Member) -> FieldResult {
    match cache.autostart(member.kind(), member.identity()) {
        None => FieldResult::NotRequested,
        Some(Err(e)) => FieldResult::Failed(e.to_string()),
        Some(Ok(true)) => FieldResult::Value("enabled".to_string()),
        Some(Ok(false)) => FieldResult::Value("disabled".to_string()),
    }
}

fn host_cell(
    topology: &ClusterTopology,
    cache: &ClusterStatusCache,
    member: &Member,
    field: HostField,
) -> Result<FieldResult, ConfigError> {
    let hostname = member.identity();
    Ok(match field {
        HostField::Host => FieldResult::Value(hostname.to_string()),
        HostField::Watcher => watcher_cell(topology, cache, member)?,
        HostField::WatcherCandidates => FieldResult::list(&topology.watcher_candidates(member)?),
        HostField::WatchingHosts => {
            let candidates = topology.watching_candidate_hosts(hostname)?;
            watching_cell(cache, MemberKind::Host, hostname, &candidates)
        }
        HostField::CandidateWatchingHosts => {
            FieldResult::list(&topology.watching_candidate_hosts(hostname)?)
        }
        HostField::WatchingServices => {
            let candidates = topology.watching_candidate_services(hostname)?;
            watching_cell(cache, MemberKind::Service, hostname, &candidates)
        }
        HostField::CandidateWatchingServices => {
            FieldResult::list(&topology.watching_candidate_services(hostname)?)
        }
        HostField::Autostart => autostart_cell(cache, member),
    })
}

fn service_cell(
    topology: &ClusterTopology,
    cache: &ClusterStatusCache,
    member: &Member,
    field: ServiceField,
) -> Result<FieldResult, ConfigError> {
    Ok(match field {
        ServiceField::Service => FieldResult::Value(member.identity().to_string()),
        ServiceField::Watcher => watcher_cell(topology, cache, member)?,
        ServiceField::WatcherCandidates => {
            FieldResult::list(&topology.watcher_candidates(member)?)
        }
        ServiceField::Autostart => autostart_cell(cache, member),
    })
}

/// Aligned table, one row per member.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.cells.iter().map(ToString::to_string).collect())
            .collect();

        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.len());
            }
        }

        let write_line = |f: &mut fmt::Formatter<'_>, line: &[&str]| -> fmt::Result {
            let padded: Vec<String> = line
                .iter()
                .zip(widths.iter())
                .map(|(cell, &width)| format!("{cell:<width$}"))
                .collect();
            writeln!(f, "{}", padded.join("  ").trim_end())
        };

        write_line(f, &self.headers)?;
        for row in &cells {
            let row: Vec<&str> = row.iter().map(String::as_str).collect();
            write_line(f, &row)?;
        }
        Ok(())
    }
}

pub struct FieldList<'a>(&'a Report);

impl fmt::Display for FieldList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.0.rows.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for (header, cell) in self.0.headers.iter().zip(row.cells.iter()) {
                match cell {
                    FieldResult::Failed(reason) => writeln!(f, "{header}: ERROR ({reason})")?,
                    cell => writeln!(f, "{header}: {cell}")?,
                }
            }
        }
        Ok(())
    }
}

/// Sort and deduplicate the members named on the command line, so that reports are stable.
pub fn sorted_members(identities: &[String]) -> Vec<String> {
    watch::sorted_ring(identities.iter().map(String::as_str))
}
