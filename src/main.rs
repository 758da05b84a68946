use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use neurodrive::manager::Manager;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Evolve from the stored brain and save the elite of every generation.
    Run {
        #[arg(long)]
        generations: usize,
    },

    /// Forget the stored brain.
    Discard,

    Analyze,

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Run { generations } => mgr.run_session(generations)?,
        Command::Discard => mgr.discard_brain()?,
        Command::Analyze => mgr.analyze_sessions()?,
        Command::Clean => mgr.clean_sessions()?,
    }

    Ok(())
}
