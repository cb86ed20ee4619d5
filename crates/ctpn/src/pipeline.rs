use ndarray::ArrayView3;

use crate::anchor::{AnchorGenerator, BatchAnchors};
use crate::config::CtpnConfig;
use crate::target::{BatchAssignment, TargetAssigner};
use crate::Result;

/// Anchors and training targets of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingTargets {
    pub anchors: BatchAnchors,
    pub targets: BatchAssignment,
}

/// Builds the anchors of a feature map and assigns training targets to them, for every image in
/// a batch.
#[derive(Debug, Clone)]
pub struct CtpnTargets {
    generator: AnchorGenerator,
    assigner: TargetAssigner,
}

impl CtpnTargets {
    pub fn new(config: &CtpnConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            generator: AnchorGenerator::new(config.anchor.clone())?,
            assigner: TargetAssigner::new(config.target.clone())?,
        })
    }

    #[must_use]
    pub fn generator(&self) -> &AnchorGenerator {
        &self.generator
    }

    #[must_use]
    pub fn assigner(&self) -> &TargetAssigner {
        &self.assigner
    }

    /// Build the targets for a batch of images sharing a feature map of shape `grid_shape`.
    ///
    /// `gt_boxes` is `[batch, max_gt_num, 5]` and `gt_class_ids` is `[batch, max_gt_num, 2]`,
    /// both with a padding tag in the last column.
    pub fn build(
        &self,
        grid_shape: (usize, usize),
        gt_boxes: ArrayView3<f32>,
        gt_class_ids: ArrayView3<f32>,
    ) -> Result<TrainingTargets> {
        let batch_size = gt_boxes.dim().0;
        let anchors = self.generator.generate_batch(grid_shape, batch_size)?;
        let targets = self.assigner.assign_batch(
            gt_boxes,
            gt_class_ids,
            anchors.boxes.view(),
            anchors.indices.view(),
        )?;

        Ok(TrainingTargets { anchors, targets })
    }
}
