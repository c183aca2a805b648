use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::Serialize;
use tilescout_store::{TileFlag, TileFlags, Walkability, WalkabilityStore};
use tilescout_vision::TileSignature;

use crate::{config::AppConfig, util::Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct StoreArg {
    /// Walkability store file
    #[arg(long)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: StoreCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum StoreCommand {
    /// Print aggregate counts
    Stats,
    /// Print one record with its derived confidence
    Show {
        /// Tile signature as printed in logs
        #[arg(allow_hyphen_values = true)]
        signature: TileSignature,
    },
    /// Set or clear a semantic flag on a record
    Flag {
        /// Tile signature as printed in logs
        #[arg(allow_hyphen_values = true)]
        signature: TileSignature,
        /// blocking, interactable, door, warp, water, ledge or grass
        flag: TileFlag,
        /// Clear the flag instead of setting it
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Debug, Serialize)]
struct RecordReport {
    signature: String,
    success_count: u32,
    failure_count: u32,
    observation_count: u32,
    confidence: f64,
    walkability: Walkability,
    flags: TileFlags,
    last_seen: DateTime<Utc>,
}

fn record_report(store: &WalkabilityStore, signature: TileSignature) -> Option<RecordReport> {
    let record = store.get(signature)?;
    Some(RecordReport {
        signature: signature.to_string(),
        success_count: record.success_count(),
        failure_count: record.failure_count(),
        observation_count: record.observation_count(),
        confidence: record.confidence(),
        walkability: record.walkability(),
        flags: *record.flags(),
        last_seen: record.last_seen(),
    })
}

fn set_flag(
    path: &Path,
    signature: TileSignature,
    flag: TileFlag,
    value: bool,
) -> anyhow::Result<()> {
    let mut store = WalkabilityStore::load(path);
    store.set_flag(signature, flag, value);
    store
        .save(path)
        .with_context(|| format!("Failed to save walkability store: {}", path.display()))
}

pub(crate) fn run(config: &AppConfig, arg: &StoreArg) -> anyhow::Result<()> {
    let path = arg.store.as_deref().unwrap_or(&config.store.tiles);
    match &arg.command {
        StoreCommand::Stats => {
            let store = WalkabilityStore::load(path);
            Output::save_json(&store.stats(), None)?;
        }
        StoreCommand::Show { signature } => {
            let store = WalkabilityStore::load(path);
            let report = record_report(&store, *signature)
                .with_context(|| format!("No record for tile {signature} in {}", path.display()))?;
            Output::save_json(&report, None)?;
        }
        StoreCommand::Flag {
            signature,
            flag,
            clear,
        } => {
            set_flag(path, *signature, *flag, !clear)?;
            let action = if *clear { "Cleared" } else { "Set" };
            println!("{action} {flag} on tile {signature}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_persists_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.json");
        let signature = TileSignature(7);

        set_flag(&path, signature, TileFlag::Door, true).unwrap();
        let store = WalkabilityStore::load(&path);
        assert!(store.get(signature).unwrap().flags().door);
        assert_eq!(store.query(signature), Walkability::Unknown);

        set_flag(&path, signature, TileFlag::Door, false).unwrap();
        assert!(!WalkabilityStore::load(&path).get(signature).unwrap().flags().door);
    }

    #[test]
    fn test_report_derives_confidence() {
        let mut store = WalkabilityStore::new();
        let signature = TileSignature(3);
        for success in [true, true, false, true] {
            store.record_walk_attempt(signature, success);
        }
        let report = record_report(&store, signature).unwrap();
        assert!((report.confidence - 0.75).abs() < f64::EPSILON);
        assert_eq!(report.walkability, Walkability::Walkable);
        assert!(report.flags.walkable);
        assert!(record_report(&store, TileSignature(4)).is_none());
    }

    #[test]
    fn test_parse_flag_command() {
        use clap::Parser as _;

        use crate::command::CommandArgs;

        let args = CommandArgs::try_parse_from([
            "tilescout", "store", "flag", "-1234", "ledge", "--clear",
        ]);
        assert!(args.is_ok());
    }
}
