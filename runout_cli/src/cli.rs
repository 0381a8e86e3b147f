//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "runout", version, about = "Filament runout sensor monitor")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/runout.toml")]
    pub config: PathBuf,

    /// Log and report errors as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Log level (error|warn|info|debug|trace); RUST_LOG takes precedence
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliPower {
    Grounded,
    Powered,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliTrigger {
    Open,
    Closed,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliNumbering {
    Board,
    Bcm,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Monitor the sensor, bridging host events over stdin/stdout
    #[command(
        long_about = "Monitor the sensor for one printer connection.\n\nstdin takes one directive per line: `event <name>`, `send <command>`, `recv <line>`, `level <0|1>`, `wait <ms>`, `reload`, `quit`.\nstdout carries one JSON object per line: printer actions (`command`, `cancel`, `pause`), `notice` and `filamentStatus`."
    )]
    Run {
        /// Use a simulated sensor line starting at this level (0 or 1)
        #[arg(long, value_name = "LEVEL", value_parser = clap::value_parser!(u8).range(0..=1))]
        sim_level: Option<u8>,
    },
    /// Take one debounced reading and report whether the sensor is triggered
    TestSensor {
        /// Override sensor.pin
        #[arg(long)]
        pin: Option<u8>,
        /// Override sensor.power
        #[arg(long, value_enum)]
        power: Option<CliPower>,
        /// Override sensor.trigger
        #[arg(long, value_enum)]
        trigger: Option<CliTrigger>,
        /// Override sensor.numbering
        #[arg(long, value_enum)]
        numbering: Option<CliNumbering>,
        /// Read a simulated line at this level (0 or 1) instead of GPIO
        #[arg(long, value_name = "LEVEL", value_parser = clap::value_parser!(u8).range(0..=1))]
        sim_level: Option<u8>,
    },
    /// Load and validate the config, then print a summary
    CheckConfig,
}

impl From<CliPower> for runout_config::Power {
    fn from(p: CliPower) -> Self {
        match p {
            CliPower::Grounded => runout_config::Power::Grounded,
            CliPower::Powered => runout_config::Power::Powered,
        }
    }
}

impl From<CliTrigger> for runout_config::Trigger {
    fn from(t: CliTrigger) -> Self {
        match t {
            CliTrigger::Open => runout_config::Trigger::Open,
            CliTrigger::Closed => runout_config::Trigger::Closed,
        }
    }
}

impl From<CliNumbering> for runout_config::Numbering {
    fn from(n: CliNumbering) -> Self {
        match n {
            CliNumbering::Board => runout_config::Numbering::Board,
            CliNumbering::Bcm => runout_config::Numbering::Bcm,
        }
    }
}
