use odal::Config;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration for anchor generation and target assignment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CtpnConfig {
    #[serde(default)]
    pub anchor: AnchorConfig,
    #[serde(default)]
    pub target: TargetConfig,
}

impl Config for CtpnConfig {
    const PATH: &'static str = "ctpn.toml";
}

impl CtpnConfig {
    /// Check every parameter, failing with [`Error::InvalidConfiguration`] on the first bad one.
    pub fn validate(&self) -> Result<()> {
        self.anchor.validate()?;
        self.target.validate()
    }
}

/// Shape of the anchors and the grid they are placed on.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AnchorConfig {
    /// Heights of the base anchors, in pixels.
    ///
    /// The order of the heights is the order of the anchors within a grid cell.
    pub heights: Vec<f32>,
    /// Width shared by all anchors, in pixels.
    pub width: f32,
    /// Distance between two grid cells in pixels, the downsampling factor of the feature map.
    pub stride: f32,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            heights: vec![
                11.0, 16.0, 23.0, 33.0, 48.0, 68.0, 97.0, 139.0, 198.0, 283.0,
            ],
            width: 16.0,
            stride: 16.0,
        }
    }
}

impl AnchorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.heights.is_empty() {
            return Err(Error::invalid_configuration("no anchor heights configured"));
        }

        if let Some(height) = self.heights.iter().find(|h| !is_positive(**h)) {
            return Err(Error::invalid_configuration(format!(
                "anchor height must be positive, got {height}"
            )));
        }

        if !is_positive(self.width) {
            return Err(Error::invalid_configuration(format!(
                "anchor width must be positive, got {}",
                self.width
            )));
        }

        if !is_positive(self.stride) {
            return Err(Error::invalid_configuration(format!(
                "stride must be positive, got {}",
                self.stride
            )));
        }

        Ok(())
    }
}

/// Sampling budget and matching thresholds for target assignment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Number of sampled anchors per image, the fixed row count of every output.
    pub train_anchors_num: usize,
    /// Fraction of [`Self::train_anchors_num`] reserved for positive anchors.
    pub positive_ratio: f64,
    /// Number of ground truth rows per image, including padding.
    pub max_gt_num: usize,
    /// Anchors with an IoU of at least this value with any ground truth box are positive.
    pub positive_iou_threshold: f32,
    /// Anchors with an IoU below this value with every ground truth box are negative candidates.
    pub negative_iou_threshold: f32,
    /// Divisors applied to the `(dy, dh, dx)` regression targets.
    pub regression_weights: [f32; 3],
    /// Seed for the positive and negative sampling.
    ///
    /// A fresh seed is drawn for every batch when this is not set.
    pub seed: Option<u64>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            train_anchors_num: 128,
            positive_ratio: 0.5,
            max_gt_num: 50,
            positive_iou_threshold: 0.7,
            negative_iou_threshold: 0.5,
            regression_weights: [0.1, 0.2, 0.1],
            seed: None,
        }
    }
}

impl TargetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.train_anchors_num == 0 {
            return Err(Error::invalid_configuration(
                "train_anchors_num must be at least 1",
            ));
        }

        if self.max_gt_num == 0 {
            return Err(Error::invalid_configuration("max_gt_num must be at least 1"));
        }

        if !(0.0..=1.0).contains(&self.positive_ratio) {
            return Err(Error::invalid_configuration(format!(
                "positive_ratio must be within [0, 1], got {}",
                self.positive_ratio
            )));
        }

        let thresholds = [self.negative_iou_threshold, self.positive_iou_threshold];
        if thresholds.iter().any(|t| !(0.0..=1.0).contains(t)) {
            return Err(Error::invalid_configuration(format!(
                "IoU thresholds must be within [0, 1], got {thresholds:?}"
            )));
        }

        if self.negative_iou_threshold > self.positive_iou_threshold {
            return Err(Error::invalid_configuration(format!(
                "negative_iou_threshold ({}) exceeds positive_iou_threshold ({})",
                self.negative_iou_threshold, self.positive_iou_threshold
            )));
        }

        if !self.regression_weights.iter().all(|w| is_positive(*w)) {
            return Err(Error::invalid_configuration(format!(
                "regression weights must be positive, got {:?}",
                self.regression_weights
            )));
        }

        Ok(())
    }

    /// Maximum number of positive rows per image, `floor(train_anchors_num * positive_ratio)`.
    #[must_use]
    pub fn positive_budget(&self) -> usize {
        floor_rows(self.train_anchors_num as f64 * self.positive_ratio)
    }

    /// Maximum number of negative rows per image, given the number of positive rows.
    #[must_use]
    pub fn negative_budget(&self, positive_count: usize) -> usize {
        let ratio_budget = floor_rows(self.train_anchors_num as f64 * (1.0 - self.positive_ratio));

        ratio_budget.min(self.train_anchors_num.saturating_sub(positive_count))
    }
}

/// Round a row count down, treating values within rounding error of the next integer as that
/// integer, e.g. `100 * 0.7` as 70.
fn floor_rows(rows: f64) -> usize {
    (rows + 1e-9).floor() as usize
}

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}
