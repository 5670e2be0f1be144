// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;

use clownf_lib::commands::{self, Cli};

/// The clownf binary answers which host watches which host or service in a Clownfish cluster.
fn main() {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("CLOWNF_LOG", default_level))
        .init();

    if commands::main(&args).is_err() {
        std::process::exit(1);
    }
}
