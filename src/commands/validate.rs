// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use crate::{
    cluster::ClusterTopology,
    commands::{Cli, HandledResult},
};

pub fn validate(args: &Cli) -> HandledResult<()> {
    let config = args.load_config()?;

    let topology = ClusterTopology::from_config(&config);
    topology.print_summary();

    Ok(())
}
