use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use self::{inspect::InspectArg, play::PlayArg, train::TrainArg};

mod inspect;
mod play;
mod train;

/// Where the best agent is stored unless `--agent` says otherwise.
const DEFAULT_AGENT_PATH: &str = "agents/current.agent";

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Evolve agents with the genetic algorithm
    Train(#[clap(flatten)] TrainArg),
    /// Play one episode with a stored agent
    Play(#[clap(flatten)] PlayArg),
    /// Show a stored agent and its network
    Inspect(#[clap(flatten)] InspectArg),
}

pub fn run() -> anyhow::Result<()> {
    init_tracing();
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Train(arg) => train::run(&arg)?,
        Mode::Play(arg) => play::run(&arg)?,
        Mode::Inspect(arg) => inspect::run(&arg)?,
    }
    Ok(())
}

/// Logs to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_command_definition() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_modes() {
        let args = CommandArgs::try_parse_from(["evoplat", "train", "-g", "5"]).unwrap();
        assert!(matches!(args.mode, Mode::Train(_)));
        let args = CommandArgs::try_parse_from(["evoplat", "play", "--level", "pits"]).unwrap();
        assert!(matches!(args.mode, Mode::Play(_)));
        let args = CommandArgs::try_parse_from(["evoplat", "inspect"]).unwrap();
        assert!(matches!(args.mode, Mode::Inspect(_)));
        assert!(CommandArgs::try_parse_from(["evoplat"]).is_err());
        assert!(CommandArgs::try_parse_from(["evoplat", "play", "--level", "castle"]).is_err());
    }
}
