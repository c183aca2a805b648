use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::frame::{ImageLoadError, PixelFrame, Region};

use super::{
    BattlePhase, Classification, HeuristicClassifier, MenuKind, StateClassifier, StateType,
};

/// Matching parameters shared by all templates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Maximum per-channel difference for a pixel to count as matching.
    pub tolerance: u8,
    /// Step between candidate positions in the coarse scan.
    pub coarse_step: usize,
    /// Stride between compared template pixels.
    pub sample_step: usize,
    /// Scanning stops once a position scores at least this much.
    pub early_exit_confidence: f32,
    /// Re-scan the neighbourhood of the coarse hit at step 1.
    pub refine: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            tolerance: 24,
            coarse_step: 4,
            sample_step: 2,
            early_exit_confidence: 0.98,
            refine: true,
        }
    }
}

fn default_min_confidence() -> f32 {
    0.85
}

/// Manifest entry describing one reference image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub name: String,
    /// PNG path, relative to the manifest's directory.
    pub path: PathBuf,
    pub state: StateType,
    #[serde(default)]
    pub battle_phase: BattlePhase,
    #[serde(default)]
    pub menu_kind: MenuKind,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Restricts the search to this part of the frame.
    #[serde(default)]
    pub region: Option<Region>,
}

/// A loaded reference image tagged with the state it identifies.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub state: StateType,
    pub battle_phase: BattlePhase,
    pub menu_kind: MenuKind,
    pub min_confidence: f32,
    pub region: Option<Region>,
    pub image: PixelFrame,
}

impl Template {
    pub fn load(spec: &TemplateSpec, base_dir: &Path) -> Result<Self, ImageLoadError> {
        let image = PixelFrame::load_png(base_dir.join(&spec.path))?;
        Ok(Self::from_image(spec, image))
    }

    #[must_use]
    pub fn from_image(spec: &TemplateSpec, image: PixelFrame) -> Self {
        Self {
            name: spec.name.clone(),
            state: spec.state,
            battle_phase: spec.battle_phase,
            menu_kind: spec.menu_kind,
            min_confidence: spec.min_confidence,
            region: spec.region,
            image,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub x: usize,
    pub y: usize,
    pub confidence: f32,
}

/// Fraction of sampled template pixels within tolerance of the frame at `(x, y)`.
#[expect(clippy::cast_precision_loss)]
fn score_at(
    frame: &PixelFrame,
    template: &PixelFrame,
    x: usize,
    y: usize,
    config: &TemplateConfig,
) -> f32 {
    let step = config.sample_step.max(1);
    let mut hits = 0usize;
    let mut total = 0usize;
    for ty in (0..template.height()).step_by(step) {
        for tx in (0..template.width()).step_by(step) {
            total += 1;
            if let Some(p) = frame.get(x + tx, y + ty)
                && p.within_tolerance(template.pixel(tx, ty), config.tolerance)
            {
                hits += 1;
            }
        }
    }
    if total == 0 {
        return 0.0;
    }
    hits as f32 / total as f32
}

/// Finds the best position of `template` in `frame`.
///
/// Returns `None` when the template does not fit in the search area.
#[must_use]
pub fn match_template(
    frame: &PixelFrame,
    template: &Template,
    config: &TemplateConfig,
) -> Option<TemplateMatch> {
    let area = template
        .region
        .unwrap_or_else(|| frame.bounds())
        .clamp_to(frame.width(), frame.height());
    let (tw, th) = (template.image.width(), template.image.height());
    if tw == 0 || th == 0 || tw > area.width || th > area.height {
        return None;
    }
    let max_x = area.right() - tw;
    let max_y = area.bottom() - th;
    let step = config.coarse_step.max(1);

    let mut best: Option<TemplateMatch> = None;
    let consider = |x: usize, y: usize, best: &mut Option<TemplateMatch>| {
        let confidence = score_at(frame, &template.image, x, y, config);
        if best.is_none_or(|b| confidence > b.confidence) {
            *best = Some(TemplateMatch { x, y, confidence });
        }
        confidence >= config.early_exit_confidence
    };

    'coarse: for y in (area.y..=max_y).step_by(step) {
        for x in (area.x..=max_x).step_by(step) {
            if consider(x, y, &mut best) {
                break 'coarse;
            }
        }
    }

    let coarse = best?;
    if config.refine && step > 1 && coarse.confidence < config.early_exit_confidence {
        let x_range = coarse.x.saturating_sub(step - 1).max(area.x)..=(coarse.x + step - 1).min(max_x);
        let y_range = coarse.y.saturating_sub(step - 1).max(area.y)..=(coarse.y + step - 1).min(max_y);
        'refine: for y in y_range {
            for x in x_range.clone() {
                if consider(x, y, &mut best) {
                    break 'refine;
                }
            }
        }
    }
    best
}

/// Classifies frames by matching tagged reference images.
#[derive(Debug, Clone)]
pub struct TemplateClassifier {
    templates: Vec<Template>,
    config: TemplateConfig,
    black_screen: HeuristicClassifier,
}

impl TemplateClassifier {
    /// The heuristic classifier is used only for its black-screen check.
    #[must_use]
    pub fn new(
        templates: Vec<Template>,
        config: TemplateConfig,
        black_screen: HeuristicClassifier,
    ) -> Self {
        Self {
            templates,
            config,
            black_screen,
        }
    }

    #[must_use]
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Returns the qualifying template with the highest precedence, then the highest confidence.
    #[must_use]
    pub fn best_match(&self, frame: &PixelFrame) -> Option<(&Template, TemplateMatch)> {
        self.templates
            .iter()
            .filter_map(|t| {
                let m = match_template(frame, t, &self.config)?;
                (m.confidence >= t.min_confidence).then_some((t, m))
            })
            .min_by(|(ta, ma), (tb, mb)| {
                ta.state
                    .precedence()
                    .cmp(&tb.state.precedence())
                    .then_with(|| mb.confidence.total_cmp(&ma.confidence))
            })
    }
}

impl StateClassifier for TemplateClassifier {
    fn classify(&self, frame: &PixelFrame) -> Classification {
        if self.black_screen.is_black_screen(frame) {
            return Classification::of_state(StateType::BlackScreen);
        }
        let Some((template, m)) = self.best_match(frame) else {
            return Classification::of_state(StateType::Overworld);
        };
        tracing::trace!(template = %template.name, confidence = m.confidence, "template matched");
        Classification {
            battle_phase: template.battle_phase,
            menu_kind: template.menu_kind,
            ..Classification::of_state(template.state)
        }
    }
}
