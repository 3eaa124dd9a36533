use std::path::PathBuf;

use clap::Parser;

use crate::capture::binder::validate_interface_name;

/// Streams raw link-layer frames of one interface as length-prefixed records
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Network interface to capture on (e.g. "tun0")
    #[arg(value_parser = parse_interface_name)]
    pub interface: Option<String>,
    /// Write records to this file instead of standard output
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
    /// Put the interface in promiscuous mode
    #[arg(short, long)]
    pub promiscuous: bool,
    /// Longest a single receive may block before shutdown is checked (milliseconds)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=60_000))]
    pub recv_timeout_ms: Option<u64>,
    /// Path of a TOML file with capture settings
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// List available network interfaces and exit
    #[arg(short, long)]
    pub list_interfaces: bool,
    /// List the records of a previously captured stream and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["interface", "list_interfaces"])]
    pub inspect: Option<PathBuf>,
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_interface_name(name: &str) -> Result<String, String> {
    validate_interface_name(name).map_err(|err| err.to_string())?;
    Ok(name.to_string())
}
