use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use agentcarrier_frame::FrameKind;
use agentcarrier_transport::SecurityLevel;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a single frame to a port.
    Send(SendArgs),
    /// Receive frames on a local queue and print them.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Log,
    Segment,
    Yaml,
    Command,
}

impl From<KindArg> for FrameKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Log => FrameKind::Log,
            KindArg::Segment => FrameKind::Segment,
            KindArg::Yaml => FrameKind::Yaml,
            KindArg::Command => FrameKind::Command,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LevelArg {
    None,
    Standard,
    Admin,
}

impl From<LevelArg> for SecurityLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::None => SecurityLevel::None,
            LevelArg::Standard => SecurityLevel::Standard,
            LevelArg::Admin => SecurityLevel::Admin,
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Port descriptor, `<backend>:<address>` (e.g. localqueue:AgentMailbox).
    #[arg(env = "AGENTCARRIER_PORT")]
    pub port: String,
    /// Frame kind.
    #[arg(long, short = 'k', value_enum, default_value = "log")]
    pub kind: KindArg,
    /// Provider id stamped on the frame.
    #[arg(long, default_value = "main")]
    pub peer: String,
    /// Answer id. Segments default to a monotonic timestamp, other kinds to 0.
    #[arg(long)]
    pub answer_id: Option<u64>,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Write timeout for network ports (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Queue name or absolute socket path to bind.
    pub queue: String,
    /// Worker threads.
    #[arg(long, default_value_t = agentcarrier_delivery::DEFAULT_WORKERS)]
    pub workers: usize,
    /// Maximum message size in bytes.
    #[arg(long, default_value_t = agentcarrier_transport::DEFAULT_QUEUE_CAPACITY)]
    pub capacity: usize,
    /// Who may send to the queue.
    #[arg(long, value_enum, default_value = "standard")]
    pub level: LevelArg,
    /// Print only these kinds (comma-separated).
    #[arg(long, value_enum, value_delimiter = ',')]
    pub kinds: Option<Vec<KindArg>>,
    /// Route command frames through the agent command policy as well.
    #[arg(long)]
    pub route_commands: bool,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
