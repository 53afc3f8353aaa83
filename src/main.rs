// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RFServer CLI.
//!
//! # Usage
//!
//! ```bash
//! # Load a mapping config, validate everything, and report a summary
//! rfserver mapping.json
//!
//! # With explicit ISL config, default rules, and schema paths
//! rfserver mapping.json -i islconf.json -d default-rules.json -s config.schema
//! ```

use clap::{Parser, Subcommand};
use rfserver::config::{self, ConfigError};
use rfserver::rule::{self, RuleError};
use rfserver::server::RfServer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// RouteFlow-style virtual-router controller
#[derive(Parser, Debug)]
#[command(name = "rfserver")]
#[command(about = "RouteFlow-style virtual-router controller - state engine and RouteMod translation")]
#[command(version)]
struct Args {
    /// Mapping configuration file (port-groups / virtual-machines)
    configfile: PathBuf,

    /// ISL configuration file
    #[arg(short = 'i', long = "islconfig", default_value = "./islconf.json")]
    islconfig: PathBuf,

    /// Default flow-table rules file
    #[arg(short = 'd', long = "default-rules", default_value = "./default-rules.json")]
    default_rules: PathBuf,

    /// JSON schema used to validate every config file
    #[arg(short = 's', long = "schema", default_value = "./config.schema")]
    schema: PathBuf,

    /// Verbose (debug-level) logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate every config file without starting the engine
    Validate,

    /// Show live engine status (requires a running server with a transport)
    Status,
}

fn main() -> std::process::ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match args.command {
        Some(Commands::Status) => cmd_status(),
        Some(Commands::Validate) | None => cmd_validate(&args),
    }
}

fn cmd_validate(args: &Args) -> std::process::ExitCode {
    let binding_config = match config::load_mapping_config(&args.configfile, &args.schema) {
        Ok(entries) => entries,
        Err(e) => return fatal(&e),
    };

    // §7: a missing ISL config file is a warning, not fatal; any other
    // error loading it (bad JSON, schema violation, bad MAC) still is.
    let isl_config = match config::load_isl_config(&args.islconfig, &args.schema) {
        Ok(entries) => entries,
        Err(ConfigError::Io { path, .. }) => {
            tracing::warn!(%path, "ISL config not found, continuing with no ISL links");
            Vec::new()
        }
        Err(e) => return fatal(&e),
    };

    let rules_doc = match std::fs::read_to_string(&args.default_rules) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(path = %args.default_rules.display(), error = %e, "failed to read default-rules file");
            return std::process::ExitCode::FAILURE;
        }
    };
    let rules_json: serde_json::Value = match serde_json::from_str(&rules_doc) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "default-rules file is not valid JSON");
            return std::process::ExitCode::FAILURE;
        }
    };
    let rules = match rule::compile_rules(&rules_json) {
        Ok(r) => r,
        Err(e) => return fatal_rule(&e),
    };

    println!("Configuration valid.");
    println!();
    println!("  binding-config entries: {}", binding_config.len());
    println!("  isl-config links:       {}", isl_config.len());
    println!("  compiled rules:         {}", rules.len());

    let _server = RfServer::new(binding_config, isl_config, rules);
    std::process::ExitCode::SUCCESS
}

fn fatal(e: &ConfigError) -> std::process::ExitCode {
    tracing::error!(error = %e, "configuration load failed");
    eprintln!("error: {e}");
    std::process::ExitCode::FAILURE
}

fn fatal_rule(e: &RuleError) -> std::process::ExitCode {
    tracing::error!(error = %e, "rule compilation failed");
    eprintln!("error: {e}");
    std::process::ExitCode::FAILURE
}

fn cmd_status() -> std::process::ExitCode {
    eprintln!("rfserver status");
    eprintln!("---------------");
    eprintln!("The `status` command requires a running server wired to a concrete");
    eprintln!("IPC transport (the transport itself is outside this crate's scope).");
    eprintln!();
    eprintln!("This feature is planned for a future release. It will report:");
    eprintln!("  - binding table size and per-status breakdown");
    eprintln!("  - ISL table size and pairing state");
    eprintln!("  - datapaths configured so far");
    std::process::ExitCode::SUCCESS
}
