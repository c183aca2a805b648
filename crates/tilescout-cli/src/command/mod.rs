use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use crate::config::AppConfig;

use self::{
    classify::ClassifyArg, config::ConfigArg, map::MapArg, run::RunArg, store::StoreArg,
};

mod classify;
mod config;
mod map;
mod run;
mod store;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// JSON configuration file; missing fields take their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Explore by replaying a directory of screenshots
    Run(#[clap(flatten)] RunArg),
    /// Classify screenshots and print their signatures
    Classify(#[clap(flatten)] ClassifyArg),
    /// Print the effective configuration
    Config(#[clap(flatten)] ConfigArg),
    /// Inspect or edit the signature-keyed walkability store
    Store(#[clap(flatten)] StoreArg),
    /// Inspect or edit the coordinate-keyed map store
    Map(#[clap(flatten)] MapArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_tracing(args.verbose);
    let app_config = AppConfig::load(args.config.as_deref())?;
    match args.mode {
        Mode::Run(arg) => run::run(app_config, &arg)?,
        Mode::Classify(arg) => classify::run(&app_config, &arg)?,
        Mode::Config(arg) => config::run(&app_config, &arg)?,
        Mode::Store(arg) => store::run(&app_config, &arg)?,
        Mode::Map(arg) => map::run(&app_config, &arg)?,
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_command_definition_is_valid() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            CommandArgs::try_parse_from(["tilescout", "store", "stats", "-v", "--config", "c.json"])
                .unwrap();
        assert!(args.verbose);
        assert_eq!(args.config, Some(PathBuf::from("c.json")));
        assert!(matches!(args.mode, Mode::Store(_)));
    }
}
