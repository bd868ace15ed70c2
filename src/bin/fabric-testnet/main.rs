use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fabric_testnet::prelude::{LedgerInstanceOptions, LogLevel};
use miette::{IntoDiagnostic, Result};
use serde::Deserialize;

mod common;
mod up;

#[derive(Debug, Subcommand)]
enum Command {
    /// Starts a ledger container and keeps it alive until interrupted
    Up(up::Args),
}

#[derive(Debug, Parser)]
#[clap(name = "fabric-testnet")]
#[clap(bin_name = "fabric-testnet")]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub max_level: LogLevel,

    #[serde(default)]
    pub include_bollard: bool,

    #[serde(default)]
    pub include_http: bool,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub ledger: LedgerInstanceOptions,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn new(explicit_file: &Option<PathBuf>) -> Result<Self, config::ConfigError> {
        let mut s = config::Config::builder();

        // random host ports unless told otherwise
        s = s.set_default("ledger.publish_all_ports", true)?;

        // our base config will always be in /etc/fabric-testnet
        s = s.add_source(
            config::File::with_name("/etc/fabric-testnet/testnet.toml").required(false),
        );

        // but we can override it by having a file in the working dir
        s = s.add_source(config::File::with_name("fabric-testnet.toml").required(false));

        // if an explicit file was passed, then we load it as mandatory
        if let Some(explicit) = explicit_file.as_ref().and_then(|x| x.to_str()) {
            s = s.add_source(config::File::with_name(explicit).required(true));
        }

        // finally, env vars such as FABRIC_TESTNET_LEDGER__IMAGE_VERSION
        s = s.add_source(
            config::Environment::with_prefix("FABRIC_TESTNET")
                .prefix_separator("_")
                .separator("__"),
        );

        s.build()?.try_deserialize()
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = Config::new(&args.config).into_diagnostic()?;

    match args.command {
        Command::Up(x) => up::run(config, &x)?,
    };

    Ok(())
}
