use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tilescout_policy::PolicyConfig;
use tilescout_runtime::RunConfig;
use tilescout_vision::{
    ExtractionConfig,
    classifier::{
        ClassifierStrategy, HeuristicClassifier, HeuristicConfig, StateClassifier, Template,
        TemplateClassifier, TemplateConfig, TemplateSpec,
    },
};

use crate::util;

/// Everything a run can be tuned with, read from `--config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub extraction: ExtractionConfig,
    pub classifier: ClassifierConfig,
    pub policy: PolicyConfig,
    pub run: RunConfig,
    pub store: StorePaths,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub strategy: ClassifierStrategy,
    pub heuristic: HeuristicConfig,
    pub template: TemplateConfig,
    /// JSON list of template specs; required by the template strategy.
    pub template_manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorePaths {
    /// Signature-keyed walkability store.
    pub tiles: PathBuf,
    /// Coordinate-keyed map store.
    pub maps: PathBuf,
}

impl Default for StorePaths {
    fn default() -> Self {
        Self {
            tiles: PathBuf::from("tilescout-tiles.json"),
            maps: PathBuf::from("tilescout-maps.json"),
        }
    }
}

impl AppConfig {
    /// Reads `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => util::read_json_file("config", path),
            None => Ok(Self::default()),
        }
    }
}

impl ClassifierConfig {
    pub fn build(&self) -> anyhow::Result<Box<dyn StateClassifier>> {
        let heuristic = HeuristicClassifier::new(self.heuristic.clone());
        match self.strategy {
            ClassifierStrategy::Heuristic => Ok(Box::new(heuristic)),
            ClassifierStrategy::Template => {
                let manifest = self
                    .template_manifest
                    .as_deref()
                    .context("Template classifier needs a template manifest")?;
                let templates = load_templates(manifest)?;
                tracing::info!(count = templates.len(), "templates loaded");
                Ok(Box::new(TemplateClassifier::new(
                    templates,
                    self.template,
                    heuristic,
                )))
            }
        }
    }
}

/// Loads every template of a manifest; image paths are relative to the manifest.
pub fn load_templates(manifest: &Path) -> anyhow::Result<Vec<Template>> {
    let specs: Vec<TemplateSpec> = util::read_json_file("template manifest", manifest)?;
    let base_dir = manifest.parent().unwrap_or(Path::new("."));
    specs
        .iter()
        .map(|spec| {
            Template::load(spec, base_dir)
                .with_context(|| format!("Failed to load template {}", spec.name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tilescout_policy::PolicyMode;
    use tilescout_vision::classifier::StateType;

    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "policy": { "mode": "discovery" }, "run": { "max_ticks": 10 } }"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.policy.mode, PolicyMode::Discovery);
        assert_eq!(config.policy.stuck_threshold, PolicyConfig::default().stuck_threshold);
        assert_eq!(config.run.max_ticks, Some(10));
        assert_eq!(config.store, StorePaths::default());
    }

    #[test]
    fn test_default_config_round_trips() {
        let json = serde_json::to_string(&AppConfig::default()).unwrap();
        let config: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_template_strategy_requires_manifest() {
        let config = ClassifierConfig {
            strategy: ClassifierStrategy::Template,
            ..ClassifierConfig::default()
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn test_load_templates_relative_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]))
            .save(dir.path().join("box.png"))
            .unwrap();
        let manifest = dir.path().join("templates.json");
        fs::write(
            &manifest,
            r#"[{ "name": "box", "path": "box.png", "state": "dialogue" }]"#,
        )
        .unwrap();

        let templates = load_templates(&manifest).unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].state, StateType::Dialogue);
        assert_eq!(templates[0].image.width(), 8);

        fs::write(
            &manifest,
            r#"[{ "name": "gone", "path": "missing.png", "state": "menu" }]"#,
        )
        .unwrap();
        let err = load_templates(&manifest).unwrap_err();
        assert!(err.to_string().contains("gone"));
    }
}
