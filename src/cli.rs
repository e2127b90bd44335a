use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::DisplayMode;

/// Default monitor address of an IkaGo instance.
pub const DEFAULT_TARGET: &str = "localhost:18080";

#[derive(Parser, Debug)]
#[command(
    name = "ikamon",
    version,
    about = "Terminal dashboard for IkaGo traffic monitors"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Launch interactive TUI (default when no subcommand given)
    Monitor(MonitorArgs),
    /// Poll a few times and print the resulting view to stdout
    Snapshot(SnapshotArgs),
}

/// Arguments shared by all polling modes.
#[derive(Args, Debug, Clone)]
pub struct PollArgs {
    /// Monitor address as host:port [default: localhost:18080]
    #[arg(long, default_value = DEFAULT_TARGET)]
    pub target: String,

    /// Polling interval in seconds [default: 1.0]
    #[arg(long, default_value_t = 1.0, value_parser = validate_interval)]
    pub interval: f64,

    /// Disable country lookups
    #[arg(long)]
    pub no_geo: bool,
}

impl Default for PollArgs {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            interval: 1.0,
            no_geo: false,
        }
    }
}

/// Arguments specific to monitor (TUI) mode.
#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub poll: PollArgs,

    /// Start with running totals instead of rates
    #[arg(long)]
    pub total: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments specific to snapshot mode.
#[derive(Args, Debug, Clone)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub poll: PollArgs,

    /// Output format [default: tsv]
    #[arg(long, default_value = "tsv")]
    pub format: OutputFormat,

    /// Number of polls before printing; deltas need at least two [default: 2]
    #[arg(long, default_value_t = 2, value_parser = validate_ticks)]
    pub ticks: u32,

    /// Print running totals instead of per-interval deltas
    #[arg(long)]
    pub total: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Tsv,
    Json,
    Pretty,
}

fn validate_interval(s: &str) -> Result<f64, String> {
    let val: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if val < 0.1 {
        Err("interval must be at least 0.1 seconds".to_string())
    } else if val > 10.0 {
        Err("interval must be at most 10.0 seconds".to_string())
    } else {
        Ok(val)
    }
}

fn validate_ticks(s: &str) -> Result<u32, String> {
    let val: u32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid integer"))?;
    if val < 2 {
        Err("ticks must be at least 2".to_string())
    } else if val > 60 {
        Err("ticks must be at most 60".to_string())
    } else {
        Ok(val)
    }
}

/// Flattened CLI configuration after resolving subcommand variants.
pub struct ResolvedCli {
    pub target: String,
    pub interval: f64,
    pub no_geo: bool,
    pub mode: DisplayMode,
    pub no_color: bool,
    pub format: OutputFormat,
    pub ticks: u32,
    snapshot: bool,
}

impl ResolvedCli {
    pub fn is_monitor(&self) -> bool {
        !self.snapshot
    }
}

fn display_mode(total: bool) -> DisplayMode {
    if total {
        DisplayMode::Total
    } else {
        DisplayMode::Rate
    }
}

impl Cli {
    /// Resolve subcommand variants into a flat configuration struct.
    pub fn resolve(self) -> ResolvedCli {
        match self.command {
            Some(Command::Snapshot(s)) => ResolvedCli {
                target: s.poll.target,
                interval: s.poll.interval,
                no_geo: s.poll.no_geo,
                mode: display_mode(s.total),
                no_color: true,
                format: s.format,
                ticks: s.ticks,
                snapshot: true,
            },
            Some(Command::Monitor(m)) => ResolvedCli {
                target: m.poll.target,
                interval: m.poll.interval,
                no_geo: m.poll.no_geo,
                mode: display_mode(m.total),
                no_color: m.no_color,
                format: OutputFormat::Tsv,
                ticks: 0,
                snapshot: false,
            },
            None => {
                let poll = PollArgs::default();
                ResolvedCli {
                    target: poll.target,
                    interval: poll.interval,
                    no_geo: poll.no_geo,
                    mode: DisplayMode::Rate,
                    no_color: false,
                    format: OutputFormat::Tsv,
                    ticks: 0,
                    snapshot: false,
                }
            }
        }
    }
}
