use std::{io, path::PathBuf};

use anyhow::Context;
use rand::Rng as _;
use tilescout_policy::{ExplorationPolicy, PolicyMode, PolicySeed};
use tilescout_runtime::{Controller, notification_channel};
use tilescout_store::{StoreHandle, WalkabilityStore};
use tilescout_vision::classifier::ClassifierStrategy;

use crate::{
    config::AppConfig,
    replay::{LoggingInputSink, ReplayFrameSource, spawn_notification_drain},
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RunArg {
    /// Directory of PNG screenshots, replayed in file-name order
    frames: PathBuf,
    /// Stop after this many ticks [default: one pass over the frames]
    #[arg(long)]
    ticks: Option<u64>,
    /// Start over from the first frame after the last one
    #[arg(long = "loop")]
    looping: bool,
    /// Policy seed as 32 hex digits; random when omitted
    #[arg(long)]
    seed: Option<PolicySeed>,
    /// Use discovery mode instead of exit-seeking exploration
    #[arg(long)]
    discovery: bool,
    /// Classify with templates from this JSON manifest
    #[arg(long)]
    templates: Option<PathBuf>,
    /// Walkability store file
    #[arg(long)]
    store: Option<PathBuf>,
    /// Milliseconds to wait after each action before capturing the next frame
    #[arg(long)]
    action_delay: Option<u64>,
    /// Hold and release buttons for their configured durations
    #[arg(long)]
    realtime: bool,
}

impl RunArg {
    fn apply(&self, config: &mut AppConfig) {
        if self.discovery {
            config.policy.mode = PolicyMode::Discovery;
        }
        if let Some(manifest) = &self.templates {
            config.classifier.strategy = ClassifierStrategy::Template;
            config.classifier.template_manifest = Some(manifest.clone());
        }
        if let Some(path) = &self.store {
            config.store.tiles.clone_from(path);
        }
        if let Some(delay) = self.action_delay {
            config.run.action_delay_ms = delay;
        }
        if let Some(ticks) = self.ticks {
            config.run.max_ticks = Some(ticks);
        }
    }
}

pub(crate) fn run(mut config: AppConfig, arg: &RunArg) -> anyhow::Result<()> {
    arg.apply(&mut config);

    let source = ReplayFrameSource::open(&arg.frames, arg.looping)?;
    if config.run.max_ticks.is_none() && !arg.looping {
        config.run.max_ticks = Some(u64::try_from(source.frame_count())?);
    }
    let classifier = config.classifier.build()?;

    let seed: PolicySeed = arg.seed.unwrap_or_else(|| rand::rng().random());
    tracing::info!(%seed, mode = ?config.policy.mode, "policy seeded");
    let policy = ExplorationPolicy::with_seed(config.policy, seed);

    let tiles_path = config.store.tiles.clone();
    let store = WalkabilityStore::load(&tiles_path);
    let (store, store_thread) = StoreHandle::spawn(store, Some(tiles_path.clone()));

    let (notifier, notifications) = notification_channel(config.run.notification_capacity);
    let drain = spawn_notification_drain(notifications);

    let autosave_interval = config.run.autosave_interval();
    let shutdown_timeout = config.run.shutdown_timeout();
    let bounded = config.run.max_ticks.is_some();
    let controller = Controller::new(
        source,
        LoggingInputSink::new(arg.realtime),
        classifier,
        policy,
        store.clone(),
        config.run,
    )
    .with_extraction(config.extraction)
    .with_notifier(notifier.clone());

    let handle = tilescout_runtime::spawn(controller, autosave_interval);
    let finished = if bounded {
        handle.wait()
    } else {
        eprintln!("Running until Enter is pressed or stdin closes");
        let mut line = String::new();
        if let Err(err) = io::stdin().read_line(&mut line) {
            tracing::warn!(%err, "failed to read stdin, stopping");
        }
        handle.stop(shutdown_timeout)
    };
    let ticks = finished.with_context(|| {
        format!("Failed to save walkability store: {}", tiles_path.display())
    })?;
    let stats = store.stats()?;

    let dropped = notifier.dropped();
    if dropped > 0 {
        tracing::warn!(dropped, "notifications dropped while the channel was full");
    }
    // A worker that missed the stop deadline still holds the store and notifier.
    let received = if ticks.is_some() {
        drop(store);
        drop(notifier);
        if store_thread.join().is_err() {
            tracing::error!("walkability store thread panicked");
        }
        drain.join().unwrap_or_default()
    } else {
        0
    };

    println!("Seed: {seed}");
    println!("Ticks: {}", ticks.unwrap_or_default());
    println!("Notifications: {received} ({dropped} dropped)");
    println!(
        "Tiles: {} known, {} walkable, {} blocking, {} high-confidence",
        stats.total_tiles, stats.walkable, stats.blocking, stats.high_confidence
    );
    Ok(())
}
