use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;
use tilescout_vision::{
    FrameAnalysis, PerceptualHash, PixelFrame,
    classifier::{Classification, ClassifierStrategy, StateClassifier},
};

use crate::{config::AppConfig, util::Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ClassifyArg {
    /// PNG screenshots to classify
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// Classify with templates from this JSON manifest
    #[arg(long)]
    templates: Option<PathBuf>,
    /// Write the report to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FrameReport {
    path: PathBuf,
    classification: Classification,
    frame_signature: String,
    perceptual_hash: String,
    tiles: usize,
    black_tiles: usize,
    edge_dark_tiles: usize,
}

fn report(
    path: PathBuf,
    frame: &PixelFrame,
    classifier: &dyn StateClassifier,
    config: &AppConfig,
) -> FrameReport {
    let analysis = FrameAnalysis::of(frame, &config.extraction);
    let grid = &analysis.grid;
    let threshold = config.policy.exit_darkness_threshold;
    FrameReport {
        path,
        classification: classifier.classify(frame),
        frame_signature: analysis.signature.to_string(),
        perceptual_hash: PerceptualHash::of_frame(frame).to_string(),
        tiles: grid.iter().count(),
        black_tiles: grid.iter().filter(|tile| tile.is_black).count(),
        edge_dark_tiles: grid
            .edge_tiles()
            .filter(|tile| tile.dark_ratio > threshold)
            .count(),
    }
}

pub(crate) fn run(config: &AppConfig, arg: &ClassifyArg) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(manifest) = &arg.templates {
        config.classifier.strategy = ClassifierStrategy::Template;
        config.classifier.template_manifest = Some(manifest.clone());
    }
    let classifier = config.classifier.build()?;

    let mut reports = vec![];
    for path in &arg.images {
        let frame = PixelFrame::load_png(path)
            .with_context(|| format!("Failed to load frame: {}", path.display()))?;
        let report = report(path.clone(), &frame, classifier.as_ref(), &config);
        tracing::debug!(path = %path.display(), state = ?report.classification.state, "classified");
        reports.push(report);
    }
    Output::save_json(&reports, arg.output.clone())
}

#[cfg(test)]
mod tests {
    use tilescout_vision::{
        Rgb,
        classifier::{HeuristicClassifier, StateType},
    };

    use super::*;

    #[test]
    fn test_black_frame_report() {
        let frame = PixelFrame::filled(160, 144, Rgb::BLACK);
        let config = AppConfig::default();
        let report = report(
            PathBuf::from("black.png"),
            &frame,
            &HeuristicClassifier::default(),
            &config,
        );
        assert_eq!(report.classification.state, StateType::BlackScreen);
        assert_eq!(report.tiles, 90);
        assert_eq!(report.black_tiles, 90);
        assert_eq!(report.edge_dark_tiles, 34);
        assert_eq!(report.perceptual_hash.len(), 16);
    }
}
