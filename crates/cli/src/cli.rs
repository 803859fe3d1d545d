use clap::{Args, Parser, Subcommand};

/// Half-duplex bus arbitration simulator.
///
/// Spawns batches of sender and receiver tasks, in normal and priority
/// classes, that share a bus with a fixed number of slots.
#[derive(Parser, Debug)]
#[command(name = "duplex", version, about = "Half-duplex bus arbitration simulator")]
pub struct CliArgs {
    /// Path to a TOML config file (default: environment / built-in defaults)
    #[arg(long, global = true, env = "DUPLEX_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one batch of tasks over the bus
    Run(RunArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of priority sender tasks
    #[arg(long, default_value_t = 0)]
    pub priority_send: usize,

    /// Number of priority receiver tasks
    #[arg(long, default_value_t = 0)]
    pub priority_receive: usize,

    /// Number of normal sender tasks
    #[arg(long, default_value_t = 0)]
    pub send: usize,

    /// Number of normal receiver tasks
    #[arg(long, default_value_t = 0)]
    pub receive: usize,

    /// Seed for transfer durations (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Length of one time unit in milliseconds (overrides config)
    #[arg(long)]
    pub time_unit_ms: Option<u64>,

    /// Print the batch report as JSON
    #[arg(long)]
    pub json: bool,

    /// Include the full admission/release event history in the output
    #[arg(long)]
    pub trace: bool,
}
