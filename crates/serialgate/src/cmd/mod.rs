use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod check;
pub mod decode;
pub mod ports;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gateway and publish records to stdout as JSON lines.
    Run(RunArgs),
    /// List candidate serial ports.
    Ports(PortsArgs),
    /// Decode one payload against the configured schema.
    Decode(DecodeArgs),
    /// Validate a configuration file.
    Check(CheckArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args),
        Command::Ports(args) => ports::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Check(args) => check::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Gateway configuration file (JSON).
    #[arg(long, short = 'c', env = "SERIALGATE_CONFIG")]
    pub config: PathBuf,
    /// Use this port instead of autofinding one.
    #[arg(long)]
    pub port: Option<String>,
    /// Log raw frames and decoded records at info level.
    #[arg(long)]
    pub debug_frames: bool,
}

#[derive(Args, Debug)]
pub struct PortsArgs {
    /// Only list ports whose name contains this substring.
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Gateway configuration file (JSON).
    #[arg(long, short = 'c', env = "SERIALGATE_CONFIG")]
    pub config: PathBuf,
    /// Frame payload, e.g. "id:01A2;temp:23.5".
    pub payload: String,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Gateway configuration file (JSON).
    #[arg(long, short = 'c', env = "SERIALGATE_CONFIG")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
