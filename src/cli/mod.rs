//! Command-line interface definitions for the `groundcrew` binary.
//!
//! This module centralises the clap parser structures so both the main
//! binary and the build script can reuse them when generating the manual
//! page.

use camino::Utf8PathBuf;
use clap::Parser;

/// Top-level CLI for the `groundcrew` binary.
#[derive(Debug, Parser)]
#[command(
    name = "groundcrew",
    about = "Provision, inspect, and tear down EC2 instance fleets",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Provision a batch of instances and wait until it is running.
    #[command(
        name = "provision",
        about = "Provision a batch of instances and wait until it is running"
    )]
    Provision(ProvisionCommand),
    /// Terminate every instance whose name tag matches a pattern.
    #[command(
        name = "terminate",
        about = "Terminate every instance whose name tag matches a pattern"
    )]
    Terminate(TerminateCommand),
    /// List instances by name pattern or tag.
    #[command(name = "list", about = "List instances by name pattern or tag")]
    List(ListCommand),
}

/// Arguments for the `groundcrew provision` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ProvisionCommand {
    /// Batch name used as the prefix of each generated name tag. A random
    /// name is generated when omitted.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: Option<String>,
    /// Number of instances to request.
    #[arg(long, value_name = "COUNT", default_value_t = 1)]
    pub(crate) count: u32,
    /// Minimum acceptable instance count for on-demand capacity. Defaults to
    /// the requested count.
    #[arg(long, value_name = "COUNT")]
    pub(crate) min_count: Option<u32>,
    /// Maximum hourly price. Requests spot capacity instead of on-demand.
    #[arg(long, value_name = "PRICE")]
    pub(crate) spot_price: Option<String>,
    /// File whose contents are passed to each instance as user data.
    #[arg(long, value_name = "PATH")]
    pub(crate) user_data_file: Option<Utf8PathBuf>,
}

/// Arguments for the `groundcrew terminate` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct TerminateCommand {
    /// Name-tag pattern selecting the instances to terminate.
    #[arg(long, value_name = "PATTERN")]
    pub(crate) name: String,
    /// Block until the control plane reports every instance terminated.
    #[arg(long)]
    pub(crate) wait: bool,
}

/// Arguments for the `groundcrew list` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ListCommand {
    /// Restrict the listing to instances whose name tag matches the pattern.
    #[arg(long, value_name = "PATTERN", conflicts_with = "tag")]
    pub(crate) name: Option<String>,
    /// Restrict the listing to instances carrying the given `key=value` tag.
    #[arg(long, value_name = "KEY=VALUE", conflicts_with = "name")]
    pub(crate) tag: Option<String>,
}
