//! Clap derive structures for the `vigil` CLI.

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vigil -- command-line client for the vigil security panel
#[derive(Debug, Parser)]
#[command(
    name = "vigil",
    version,
    about = "Monitor and control a vigil home security panel",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Variable-store base URL (overrides the config file)
    #[arg(long, env = "VIGIL_SERVER", global = true)]
    pub server: Option<String>,

    /// Device label (overrides the config file)
    #[arg(long, env = "VIGIL_DEVICE", global = true)]
    pub device: Option<String>,

    /// API key for token exchange
    #[arg(long, env = "VIGIL_API_KEY", global = true, hide_env = true)]
    pub api_key: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch and print the current panel status
    Status {
        /// Emit the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Arm the panel in away mode
    ArmAway,

    /// Arm the panel in stay mode
    ArmStay,

    /// Disarm the panel
    Disarm,

    /// Poll continuously and print notifications as they happen
    Watch,
}
