//! Weighting configuration and its validation.
//!
//! A [`WeightConfig`] is validated once per run with [`validate`] and then
//! shared read-only by every sheet and workbook.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Number of course objectives.
pub const OBJECTIVE_COUNT: usize = 3;

/// Allowed deviation of a weight sum from 1.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Share of the usual (continuous assessment) and final exam scores in the
/// blended score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub usual: f64,
    #[serde(rename = "final")]
    pub final_exam: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            usual: 0.30,
            final_exam: 0.70,
        }
    }
}

/// How a single total score is split across objectives when the sheet has no
/// per-objective sub-scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Apportion {
    /// Every objective gets the blended score's degree.
    #[default]
    Uniform,
    /// Scores are apportioned to whole points per objective before dividing.
    RoundedPoints,
}

/// Row order of the student table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StudentOrder {
    /// Sheet order, then row order.
    #[default]
    Source,
    ClassThenId,
}

/// One classification band. Bands are listed best first; a degree belongs
/// to the first band it clears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSpec {
    pub label: String,
    pub lower: f64,
    /// `true` admits `degree >= lower`, `false` only `degree > lower`.
    #[serde(default = "default_inclusive")]
    pub inclusive: bool,
}

fn default_inclusive() -> bool {
    true
}

impl BandSpec {
    pub fn new(label: &str, lower: f64, inclusive: bool) -> Self {
        Self {
            label: label.to_string(),
            lower,
            inclusive,
        }
    }

    pub fn admits(&self, degree: f64) -> bool {
        if self.inclusive {
            degree >= self.lower
        } else {
            degree > self.lower
        }
    }

    /// `完全达成 > 0.8 ≥ 较好达成 ≥ 0.6 > 基本达成 ≥ 0.5 > 较少达成 ≥ 0.4 > 没有达成`.
    pub fn defaults() -> Vec<BandSpec> {
        vec![
            BandSpec::new("完全达成", 0.8, false),
            BandSpec::new("较好达成", 0.6, true),
            BandSpec::new("基本达成", 0.5, true),
            BandSpec::new("较少达成", 0.4, true),
            BandSpec::new("没有达成", 0.0, true),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    pub objective_weights: [f64; OBJECTIVE_COUNT],
    pub component_weights: ComponentWeights,
    pub expectation_threshold: f64,
    pub full_mark: f64,
    pub apportion: Apportion,
    pub bands: Vec<BandSpec>,
    pub order: StudentOrder,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            objective_weights: [0.50, 0.30, 0.20],
            component_weights: ComponentWeights::default(),
            expectation_threshold: 0.60,
            full_mark: 100.0,
            apportion: Apportion::default(),
            bands: BandSpec::defaults(),
            order: StudentOrder::default(),
        }
    }
}

impl WeightConfig {
    /// Reads a configuration from a JSON file. Missing keys take their
    /// defaults. The result is not validated.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn validated(self) -> Result<Self, ConfigError> {
        validate(self)
    }

    /// Points objective `index` is worth out of `full_mark`.
    pub fn objective_full_mark(&self, index: usize) -> f64 {
        self.objective_weights[index] * self.full_mark
    }
}

/// Checks a configuration and returns it unchanged if it is consistent.
///
/// Checks run in a fixed order and stop at the first failure; nothing is
/// normalized or corrected.
pub fn validate(config: WeightConfig) -> Result<WeightConfig, ConfigError> {
    let unit = |v: f64| (0.0..=1.0).contains(&v);
    let sums_to_one = |sum: f64| (sum - 1.0).abs() <= WEIGHT_TOLERANCE;

    if let Some((index, &value)) = config
        .objective_weights
        .iter()
        .enumerate()
        .find(|(_, w)| !unit(**w))
    {
        return Err(ConfigError::ObjectiveWeightOutOfRange { index, value });
    }
    let sum: f64 = config.objective_weights.iter().sum();
    if !sums_to_one(sum) {
        return Err(ConfigError::ObjectiveWeightSum {
            weights: config.objective_weights,
            sum,
        });
    }

    let ComponentWeights { usual, final_exam } = config.component_weights;
    for (component, value) in [("usual", usual), ("final", final_exam)] {
        if !unit(value) {
            return Err(ConfigError::ComponentWeightOutOfRange { component, value });
        }
    }
    let sum = usual + final_exam;
    if !sums_to_one(sum) {
        return Err(ConfigError::ComponentWeightSum {
            usual,
            final_exam,
            sum,
        });
    }

    if !unit(config.expectation_threshold) {
        return Err(ConfigError::ThresholdOutOfRange {
            value: config.expectation_threshold,
        });
    }

    if !(config.full_mark.is_finite() && config.full_mark > 0.0) {
        return Err(ConfigError::FullMark {
            value: config.full_mark,
        });
    }

    validate_bands(&config.bands)?;
    Ok(config)
}

fn validate_bands(bands: &[BandSpec]) -> Result<(), ConfigError> {
    if bands.is_empty() {
        return Err(ConfigError::NoBands);
    }
    let mut previous: Option<f64> = None;
    for (index, band) in bands.iter().enumerate() {
        if band.label.trim().is_empty() {
            return Err(ConfigError::BandLabel { index });
        }
        if !(0.0..=1.0).contains(&band.lower) {
            return Err(ConfigError::BandOutOfRange {
                index,
                label: band.label.clone(),
                lower: band.lower,
            });
        }
        match previous {
            Some(previous) if band.lower >= previous => {
                return Err(ConfigError::BandOrder {
                    index,
                    label: band.label.clone(),
                    lower: band.lower,
                    previous,
                });
            }
            _ => {}
        }
        previous = Some(band.lower);
    }
    Ok(())
}
