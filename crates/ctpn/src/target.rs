//! Training targets for the anchors of an image.
//!
//! Every ground truth box is matched to the anchors it overlaps most, and to every anchor it
//! overlaps by at least [`TargetConfig::positive_iou_threshold`]. A fixed budget of positive and
//! negative anchors is sampled from the matches, and the result is padded to
//! [`TargetConfig::train_anchors_num`] rows so every image yields arrays of the same shape.

use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis, Zip, stack};
use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::anchor::check_box_columns;
use crate::box_coder::BoxCoder;
use crate::config::TargetConfig;
use crate::overlap::compute_iou;
use crate::padding::{PADDING_TAG, remove_padding};
use crate::sampling::{image_rng, subsample};
use crate::{Error, Result};

/// What a row of an [`Assignment`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleTag {
    /// Filler row without a sample.
    Padding,
    /// Anchor matched to a ground truth box, trained on class and regression.
    Positive,
    /// Background anchor, only trained on class.
    Negative,
}

impl SampleTag {
    /// Tag stored next to an anchor index: `1` positive, `-1` negative, `0` padding.
    #[must_use]
    pub fn index_code(self) -> i64 {
        match self {
            SampleTag::Padding => 0,
            SampleTag::Positive => 1,
            SampleTag::Negative => -1,
        }
    }

    /// Tag stored next to deltas and class ids: `1` for any sample, `0` for padding.
    #[must_use]
    pub fn row_code(self) -> f32 {
        match self {
            SampleTag::Padding => 0.0,
            SampleTag::Positive | SampleTag::Negative => 1.0,
        }
    }

    #[must_use]
    pub fn is_sample(self) -> bool {
        self != SampleTag::Padding
    }
}

/// Per-image statistics of an assignment, for monitoring only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Diagnostics {
    /// Number of real ground truth boxes.
    pub gt_count: usize,
    /// Number of positive rows after sampling.
    pub positive_count: usize,
    /// Number of negative rows after sampling.
    pub negative_count: usize,
    /// Lowest IoU among all matched (ground truth, anchor) pairs, `0.0` without matches.
    pub min_matched_iou: f32,
    /// Mean IoU of all matched (ground truth, anchor) pairs, `0.0` without matches.
    pub mean_matched_iou: f32,
}

impl Diagnostics {
    /// `[gt_count, positive_count, negative_count, min_matched_iou, mean_matched_iou]`
    #[must_use]
    pub fn to_array(&self) -> [f32; 5] {
        [
            self.gt_count as f32,
            self.positive_count as f32,
            self.negative_count as f32,
            self.min_matched_iou,
            self.mean_matched_iou,
        ]
    }
}

/// Training targets of a single image.
///
/// All arrays have [`TargetConfig::train_anchors_num`] rows: positive rows first, then negative
/// rows, then padding.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub tags: Array1<SampleTag>,
    /// `[T, (dy, dh, dx)]`, zero for every row that is not positive.
    pub deltas: Array2<f32>,
    /// Class of the matched ground truth box for positive rows, `0` otherwise.
    pub class_ids: Array1<u32>,
    /// Index of the anchor in the full anchor grid, `0` for padding rows.
    pub anchor_indices: Array1<usize>,
    pub diagnostics: Diagnostics,
}

impl Assignment {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Anchor indices of the rows with the given tag.
    pub fn indices_with(&self, tag: SampleTag) -> impl Iterator<Item = usize> + '_ {
        self.tags
            .iter()
            .zip(&self.anchor_indices)
            .filter(move |(t, _)| **t == tag)
            .map(|(_, &index)| index)
    }

    /// `[T, (dy, dh, dx, tag)]` with [`SampleTag::row_code`] tags.
    #[must_use]
    pub fn tagged_deltas(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.len(), 4), |(row, col)| match col {
            3 => self.tags[row].row_code(),
            _ => self.deltas[[row, col]],
        })
    }

    /// `[T, (class_id, tag)]` with [`SampleTag::row_code`] tags.
    #[must_use]
    pub fn tagged_class_ids(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.len(), 2), |(row, col)| match col {
            0 => self.class_ids[row] as f32,
            _ => self.tags[row].row_code(),
        })
    }

    /// `[T, (anchor_index, tag)]` with [`SampleTag::index_code`] tags.
    #[must_use]
    pub fn tagged_indices(&self) -> Array2<i64> {
        Array2::from_shape_fn((self.len(), 2), |(row, col)| match col {
            0 => self.anchor_indices[row] as i64,
            _ => self.tags[row].index_code(),
        })
    }
}

/// Training targets of a batch, in image order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchAssignment {
    pub images: Vec<Assignment>,
    train_anchors_num: usize,
}

impl BatchAssignment {
    /// `[batch, T, (dy, dh, dx, tag)]`
    pub fn deltas(&self) -> Result<Array3<f32>> {
        self.stack_images(Assignment::tagged_deltas, 4)
    }

    /// `[batch, T, (class_id, tag)]`
    pub fn class_ids(&self) -> Result<Array3<f32>> {
        self.stack_images(Assignment::tagged_class_ids, 2)
    }

    /// `[batch, T, (anchor_index, tag)]`
    pub fn indices(&self) -> Result<Array3<i64>> {
        self.stack_images(Assignment::tagged_indices, 2)
    }

    /// `[batch, 5]`, one [`Diagnostics::to_array`] row per image.
    #[must_use]
    pub fn diagnostics(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.images.len(), 5), |(image, col)| {
            self.images[image].diagnostics.to_array()[col]
        })
    }

    fn stack_images<A, F>(&self, tagged: F, cols: usize) -> Result<Array3<A>>
    where
        A: Clone,
        F: Fn(&Assignment) -> Array2<A>,
    {
        if self.images.is_empty() {
            return Ok(Array3::from_shape_vec(
                (0, self.train_anchors_num, cols),
                Vec::new(),
            )?);
        }

        let arrays: Vec<Array2<A>> = self.images.iter().map(tagged).collect();
        let views: Vec<ArrayView2<A>> = arrays.iter().map(Array2::view).collect();

        Ok(stack(Axis(0), &views)?)
    }
}

/// Outcome of matching ground truth boxes to anchors, before sampling.
#[derive(Debug, Clone)]
struct Matches {
    /// Matched `(gt, anchor)` pairs in row-major order.
    pairs: Vec<(usize, usize)>,
    /// Highest IoU of every anchor with any ground truth box.
    anchor_max_iou: Array1<f32>,
    /// Whether the anchor appears in any pair.
    anchor_is_positive: Array1<bool>,
}

/// Assigns classification and regression targets to anchors.
#[derive(Debug, Clone)]
pub struct TargetAssigner {
    config: TargetConfig,
    coder: BoxCoder,
}

impl TargetAssigner {
    pub fn new(config: TargetConfig) -> Result<Self> {
        config.validate()?;
        let [wy, wh, wx] = config.regression_weights;

        Ok(Self {
            config,
            coder: BoxCoder::new((wy, wh, wx)),
        })
    }

    #[must_use]
    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    #[must_use]
    pub fn box_coder(&self) -> &BoxCoder {
        &self.coder
    }

    /// Assign targets to the anchors of a single image.
    ///
    /// - `gt_boxes`: `[max_gt_num, (y1, x1, y2, x2, tag)]`, rows with tag `0` are padding
    /// - `gt_class_ids`: `[max_gt_num, (class_id, tag)]`, tagged like `gt_boxes` row by row
    /// - `anchors`: `[N, (y1, x1, y2, x2)]`, the anchors inside the image
    /// - `valid_indices`: `[N]`, position of every anchor in the full anchor grid
    pub fn assign<R>(
        &self,
        rng: &mut R,
        gt_boxes: ArrayView2<f32>,
        gt_class_ids: ArrayView2<f32>,
        anchors: ArrayView2<f32>,
        valid_indices: ArrayView1<usize>,
    ) -> Result<Assignment>
    where
        R: Rng + ?Sized,
    {
        self.check_image_shapes(gt_boxes, gt_class_ids, anchors, valid_indices)?;

        let gt_boxes = remove_padding(gt_boxes);
        let gt_class_ids = real_class_ids(gt_class_ids)?;
        let gt_count = gt_boxes.nrows();

        let iou = compute_iou(gt_boxes.view(), anchors)?;
        let matches = self.match_anchors(&iou);

        let matched_ious: Vec<f32> = matches.pairs.iter().map(|&(g, a)| iou[[g, a]]).collect();
        let (min_matched_iou, mean_matched_iou) = if matched_ious.is_empty() {
            (0.0, 0.0)
        } else {
            let min = matched_ious.iter().copied().fold(f32::INFINITY, f32::min);
            let mean = matched_ious.iter().sum::<f32>() / matched_ious.len() as f32;
            (min, mean)
        };

        let positives = subsample(rng, &matches.pairs, self.config.positive_budget());
        let (positive_gt, positive_anchors): (Vec<usize>, Vec<usize>) =
            positives.iter().copied().unzip();

        let positive_deltas = self.coder.encode_single(
            anchors.select(Axis(0), &positive_anchors).view(),
            gt_boxes.select(Axis(0), &positive_gt).view(),
        )?;

        let negative_candidates: Vec<usize> = Zip::indexed(&matches.anchor_max_iou)
            .and(&matches.anchor_is_positive)
            .fold(Vec::new(), |mut candidates, anchor, &max_iou, &positive| {
                if max_iou < self.config.negative_iou_threshold && !positive {
                    candidates.push(anchor);
                }
                candidates
            });
        let negatives = subsample(
            rng,
            &negative_candidates,
            self.config.negative_budget(positives.len()),
        );

        let diagnostics = Diagnostics {
            gt_count,
            positive_count: positives.len(),
            negative_count: negatives.len(),
            min_matched_iou,
            mean_matched_iou,
        };

        tracing::trace!(
            gt_count,
            matched = matches.pairs.len(),
            negative_candidates = negative_candidates.len(),
            positive_count = diagnostics.positive_count,
            negative_count = diagnostics.negative_count,
            "assigned anchor targets"
        );

        let size = self.config.train_anchors_num;
        let mut assignment = Assignment {
            tags: Array1::from_elem(size, SampleTag::Padding),
            deltas: Array2::zeros((size, 3)),
            class_ids: Array1::zeros(size),
            anchor_indices: Array1::zeros(size),
            diagnostics,
        };

        for (row, (&(gt, anchor), deltas)) in positives
            .iter()
            .zip(positive_deltas.outer_iter())
            .enumerate()
        {
            assignment.tags[row] = SampleTag::Positive;
            assignment.deltas.row_mut(row).assign(&deltas);
            assignment.class_ids[row] = gt_class_ids[gt];
            assignment.anchor_indices[row] = valid_indices[anchor];
        }

        for (row, &anchor) in negatives.iter().enumerate() {
            let row = positives.len() + row;
            assignment.tags[row] = SampleTag::Negative;
            assignment.anchor_indices[row] = valid_indices[anchor];
        }

        Ok(assignment)
    }

    /// Assign targets to every image of a batch, keeping the outcome of each image separate so
    /// the caller can skip the images that fail.
    ///
    /// Image `i` samples from [`image_rng`]`(seed, i)`, where the seed is
    /// [`TargetConfig::seed`] or a fresh random value.
    pub fn assign_each(
        &self,
        gt_boxes: ArrayView3<f32>,
        gt_class_ids: ArrayView3<f32>,
        anchors: ArrayView3<f32>,
        valid_indices: ArrayView2<usize>,
    ) -> Result<Vec<Result<Assignment>>> {
        let batch_size = gt_boxes.len_of(Axis(0));
        let batch_sizes = [
            ("ground truth class ids", gt_class_ids.len_of(Axis(0))),
            ("anchors", anchors.len_of(Axis(0))),
            ("valid anchor indices", valid_indices.len_of(Axis(0))),
        ];
        if let Some((what, found)) = batch_sizes.into_iter().find(|(_, n)| *n != batch_size) {
            return Err(Error::shape_mismatch(
                what,
                format!("batch size {batch_size}"),
                format!("batch size {found}"),
            ));
        }

        let seed = self.config.seed.unwrap_or_else(rand::random);

        let assign_image = |image: usize| {
            let mut rng = image_rng(seed, image);
            self.assign(
                &mut rng,
                gt_boxes.index_axis(Axis(0), image),
                gt_class_ids.index_axis(Axis(0), image),
                anchors.index_axis(Axis(0), image),
                valid_indices.index_axis(Axis(0), image),
            )
        };

        #[cfg(feature = "parallel")]
        let results = (0..batch_size).into_par_iter().map(assign_image).collect();
        #[cfg(not(feature = "parallel"))]
        let results = (0..batch_size).map(assign_image).collect();

        Ok(results)
    }

    /// Assign targets to every image of a batch, failing if any image fails.
    pub fn assign_batch(
        &self,
        gt_boxes: ArrayView3<f32>,
        gt_class_ids: ArrayView3<f32>,
        anchors: ArrayView3<f32>,
        valid_indices: ArrayView2<usize>,
    ) -> Result<BatchAssignment> {
        let images = self
            .assign_each(gt_boxes, gt_class_ids, anchors, valid_indices)?
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            batch_size = images.len(),
            positives = images.iter().map(|a| a.diagnostics.positive_count).sum::<usize>(),
            negatives = images.iter().map(|a| a.diagnostics.negative_count).sum::<usize>(),
            "assigned batch targets"
        );

        Ok(BatchAssignment {
            images,
            train_anchors_num: self.config.train_anchors_num,
        })
    }

    // Exact float comparisons: all anchors that tie with the maximum are matched.
    #[allow(clippy::float_cmp)]
    fn match_anchors(&self, iou: &Array2<f32>) -> Matches {
        // IoU is never negative, so an empty axis folds to zero
        let gt_max_iou = iou.fold_axis(Axis(1), 0.0_f32, |&max, &v| max.max(v));
        let anchor_max_iou = iou.fold_axis(Axis(0), 0.0_f32, |&max, &v| max.max(v));
        let positive_threshold = self.config.positive_iou_threshold;

        let positive = Zip::from(iou)
            .and_broadcast(gt_max_iou.view().insert_axis(Axis(1)))
            .and_broadcast(anchor_max_iou.view().insert_axis(Axis(0)))
            .map_collect(|&v, &gt_max, &anchor_max| {
                // best anchor of a ground truth box, unless it overlaps nothing
                let best_for_gt = gt_max > 0.0 && v == gt_max;
                // best ground truth box of an anchor with a high overlap
                let best_for_anchor = anchor_max >= positive_threshold && v == anchor_max;
                best_for_gt || best_for_anchor
            });

        let pairs = positive
            .indexed_iter()
            .filter(|(_, is_positive)| **is_positive)
            .map(|(pair, _)| pair)
            .collect();
        let anchor_is_positive = positive.map_axis(Axis(0), |column| column.iter().any(|&p| p));

        Matches {
            pairs,
            anchor_max_iou,
            anchor_is_positive,
        }
    }

    fn check_image_shapes(
        &self,
        gt_boxes: ArrayView2<f32>,
        gt_class_ids: ArrayView2<f32>,
        anchors: ArrayView2<f32>,
        valid_indices: ArrayView1<usize>,
    ) -> Result<()> {
        if gt_boxes.ncols() != 5 {
            return Err(Error::shape_mismatch(
                "ground truth boxes",
                "5 columns (y1, x1, y2, x2, tag)",
                format!("{} columns", gt_boxes.ncols()),
            ));
        }

        if gt_class_ids.ncols() != 2 {
            return Err(Error::shape_mismatch(
                "ground truth class ids",
                "2 columns (class_id, tag)",
                format!("{} columns", gt_class_ids.ncols()),
            ));
        }

        if gt_boxes.nrows() != gt_class_ids.nrows() {
            return Err(Error::shape_mismatch(
                "ground truth class ids",
                format!("{} rows", gt_boxes.nrows()),
                format!("{} rows", gt_class_ids.nrows()),
            ));
        }

        let box_tags = gt_boxes.column(4);
        let class_tags = gt_class_ids.column(1);
        if let Some(row) = (0..gt_boxes.nrows())
            .find(|&row| (box_tags[row] == PADDING_TAG) != (class_tags[row] == PADDING_TAG))
        {
            return Err(Error::shape_mismatch(
                "ground truth class ids",
                format!("tag {} at row {row}, as for the box", box_tags[row]),
                format!("tag {}", class_tags[row]),
            ));
        }

        if gt_boxes.nrows() > self.config.max_gt_num {
            return Err(Error::shape_mismatch(
                "ground truth boxes",
                format!("at most {} rows", self.config.max_gt_num),
                format!("{} rows", gt_boxes.nrows()),
            ));
        }

        check_box_columns("anchors", anchors)?;
        if anchors.nrows() == 0 {
            return Err(Error::EmptyAnchorSet);
        }

        if valid_indices.len() != anchors.nrows() {
            return Err(Error::shape_mismatch(
                "valid anchor indices",
                format!("{} indices", anchors.nrows()),
                format!("{} indices", valid_indices.len()),
            ));
        }

        Ok(())
    }
}

/// Class ids of the real rows of `[max_gt_num, (class_id, tag)]`.
fn real_class_ids(gt_class_ids: ArrayView2<f32>) -> Result<Vec<u32>> {
    gt_class_ids
        .outer_iter()
        .enumerate()
        .filter(|(_, row)| row[1] != PADDING_TAG)
        .map(|(row, ids)| {
            let class_id = ids[0];
            if class_id.is_finite()
                && class_id >= 0.0
                && class_id.fract() == 0.0
                && class_id < u32::MAX as f32
            {
                Ok(class_id as u32)
            } else {
                Err(Error::InvalidClassId { row, class_id })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::padding::pad_ground_truth;
    use ndarray::{arr2, array, s};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn config() -> TargetConfig {
        TargetConfig {
            train_anchors_num: 8,
            positive_ratio: 0.25,
            max_gt_num: 4,
            seed: Some(5),
            ..TargetConfig::default()
        }
    }

    fn assigner() -> TargetAssigner {
        TargetAssigner::new(config()).unwrap()
    }

    /// Six anchors in a column, ten pixels high and spaced twenty pixels apart, the second one
    /// shifted to the right.
    fn column_anchors() -> (Array2<f32>, Array1<usize>) {
        let anchors = arr2(&[
            [0.0, 0.0, 10.0, 16.0],
            [0.0, 16.0, 10.0, 32.0],
            [20.0, 0.0, 30.0, 16.0],
            [40.0, 0.0, 50.0, 16.0],
            [60.0, 0.0, 70.0, 16.0],
            [80.0, 0.0, 90.0, 16.0],
        ]);
        (anchors, array![3, 7, 11, 15, 19, 23])
    }

    fn assign_one(
        assigner: &TargetAssigner,
        boxes: &[[f32; 4]],
        anchors: &Array2<f32>,
        indices: &Array1<usize>,
    ) -> Result<Assignment> {
        let class_ids = vec![1; boxes.len()];
        let (gt, classes) = pad_ground_truth(boxes, &class_ids, assigner.config().max_gt_num)?;
        let mut rng = StdRng::seed_from_u64(0);

        assigner.assign(&mut rng, gt.view(), classes.view(), anchors.view(), indices.view())
    }

    #[test]
    fn tag_codes() {
        assert_eq!(SampleTag::Positive.index_code(), 1);
        assert_eq!(SampleTag::Negative.index_code(), -1);
        assert_eq!(SampleTag::Padding.index_code(), 0);

        assert_eq!(SampleTag::Positive.row_code(), 1.0);
        assert_eq!(SampleTag::Negative.row_code(), 1.0);
        assert_eq!(SampleTag::Padding.row_code(), 0.0);
    }

    #[test]
    fn exact_match() {
        let (anchors, indices) = column_anchors();
        let assignment =
            assign_one(&assigner(), &[[0.0, 0.0, 10.0, 16.0]], &anchors, &indices).unwrap();

        use SampleTag::{Negative as N, Padding as Pad, Positive as P};
        assert_eq!(assignment.tags, array![P, N, N, N, N, N, Pad, Pad]);
        assert_eq!(assignment.anchor_indices, array![3, 7, 11, 15, 19, 23, 0, 0]);
        assert_eq!(assignment.class_ids, array![1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(assignment.deltas, Array2::<f32>::zeros((8, 3)));

        assert_eq!(
            assignment.diagnostics,
            Diagnostics {
                gt_count: 1,
                positive_count: 1,
                negative_count: 5,
                min_matched_iou: 1.0,
                mean_matched_iou: 1.0,
            }
        );

        assert_eq!(
            assignment.tagged_indices(),
            arr2(&[[3, 1], [7, -1], [11, -1], [15, -1], [19, -1], [23, -1], [0, 0], [0, 0]])
        );
        assert_eq!(
            assignment.tagged_class_ids().column(1),
            array![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0]
        );
        assert_eq!(assignment.tagged_deltas().dim(), (8, 4));
        assert_eq!(assignment.tagged_deltas().column(3), assignment.tagged_class_ids().column(1));
    }

    #[test]
    fn best_anchor_is_positive_below_threshold() {
        // IoU of 1/3 with the first anchor, nothing else overlaps
        let anchors = arr2(&[[0.0, 8.0, 10.0, 24.0], [40.0, 0.0, 50.0, 16.0]]);
        let indices = array![0, 1];

        let assignment =
            assign_one(&assigner(), &[[0.0, 0.0, 10.0, 16.0]], &anchors, &indices).unwrap();

        assert_eq!(assignment.indices_with(SampleTag::Positive).collect::<Vec<_>>(), vec![0]);
        assert_eq!(assignment.indices_with(SampleTag::Negative).collect::<Vec<_>>(), vec![1]);
        assert!((assignment.diagnostics.min_matched_iou - 1.0 / 3.0).abs() < 1e-6);

        // side refinement towards the left half of the anchor
        assert!(assignment.deltas[[0, 2]] < 0.0);
        assert_eq!(assignment.deltas[[0, 0]], 0.0);
        assert_eq!(assignment.deltas[[0, 1]], 0.0);
    }

    #[test]
    fn gray_zone_is_ignored() {
        let anchors = arr2(&[
            [0.0, 0.0, 10.0, 16.0],
            // IoU 0.625 with the ground truth
            [0.0, 0.0, 10.0, 10.0],
            [40.0, 0.0, 50.0, 16.0],
        ]);
        let indices = array![0, 1, 2];

        let assignment =
            assign_one(&assigner(), &[[0.0, 0.0, 10.0, 16.0]], &anchors, &indices).unwrap();

        assert_eq!(assignment.indices_with(SampleTag::Positive).collect::<Vec<_>>(), vec![0]);
        assert_eq!(assignment.indices_with(SampleTag::Negative).collect::<Vec<_>>(), vec![2]);
        assert_eq!(assignment.indices_with(SampleTag::Padding).count(), 6);
    }

    #[test]
    fn high_overlap_anchors_are_positive() {
        let anchors = arr2(&[
            [0.0, 0.0, 10.0, 16.0],
            // IoU 0.8 with the ground truth, not its best anchor
            [0.0, 0.0, 8.0, 16.0],
            [40.0, 0.0, 50.0, 16.0],
        ]);
        let indices = array![0, 1, 2];

        let assignment =
            assign_one(&assigner(), &[[0.0, 0.0, 10.0, 16.0]], &anchors, &indices).unwrap();

        assert_eq!(
            assignment.indices_with(SampleTag::Positive).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert!((assignment.diagnostics.mean_matched_iou - 0.9).abs() < 1e-6);
        assert!((assignment.diagnostics.min_matched_iou - 0.8).abs() < 1e-6);
    }

    #[test]
    fn ties_are_all_positive() {
        let anchors = arr2(&[
            [0.0, 0.0, 10.0, 16.0],
            [0.0, 8.0, 10.0, 24.0],
            [0.0, -8.0, 10.0, 8.0],
            [40.0, 0.0, 50.0, 16.0],
        ]);
        let indices = array![0, 1, 2, 3];

        // the second box overlaps nothing and adds no positives

        let gt = [[0.0, 0.0, 10.0, 16.0], [0.0, 100.0, 10.0, 116.0]];
        let assignment = assign_one(&assigner(), &gt, &anchors, &indices).unwrap();

        assert_eq!(assignment.diagnostics.gt_count, 2);
        assert_eq!(assignment.indices_with(SampleTag::Positive).count(), 1);

        let gt = [[0.0, 0.0, 10.0, 16.0]];
        // IoU 1/3 with both of the shifted anchors
        let shifted = anchors.slice(s![1.., ..]).to_owned();
        let assignment = assign_one(&assigner(), &gt, &shifted, &array![1, 2, 3]).unwrap();
        assert_eq!(
            assignment.indices_with(SampleTag::Positive).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn unmatched_ground_truth() {
        let (anchors, indices) = column_anchors();
        let assignment =
            assign_one(&assigner(), &[[200.0, 0.0, 210.0, 16.0]], &anchors, &indices).unwrap();

        assert_eq!(assignment.diagnostics.gt_count, 1);
        assert_eq!(assignment.diagnostics.positive_count, 0);
        assert_eq!(assignment.diagnostics.negative_count, 6);
        assert_eq!(assignment.diagnostics.min_matched_iou, 0.0);
        assert_eq!(assignment.diagnostics.mean_matched_iou, 0.0);
    }

    #[test]
    fn no_ground_truth() {
        let (anchors, indices) = column_anchors();
        let assignment = assign_one(&assigner(), &[], &anchors, &indices).unwrap();

        assert_eq!(assignment.diagnostics.gt_count, 0);
        assert_eq!(assignment.indices_with(SampleTag::Positive).count(), 0);
        assert_eq!(
            assignment.indices_with(SampleTag::Negative).collect::<Vec<_>>(),
            indices.to_vec()
        );
        assert_eq!(assignment.class_ids, Array1::<u32>::zeros(8));
    }

    #[test]
    fn positive_budget() {
        let anchors = Array2::from_shape_fn((20, 4), |(_, j)| [0.0, 0.0, 10.0, 16.0][j]);
        let indices = Array1::from_iter((0..20).map(|i| i * 2));

        let assignment =
            assign_one(&assigner(), &[[0.0, 0.0, 10.0, 16.0]], &anchors, &indices).unwrap();

        let positives: Vec<usize> = assignment.indices_with(SampleTag::Positive).collect();
        assert_eq!(positives.len(), 2);
        assert!(positives.windows(2).all(|w| w[0] < w[1]));
        assert!(positives.iter().all(|i| indices.iter().any(|j| i == j)));

        // every anchor is positive, nothing is left for the negatives
        assert_eq!(assignment.diagnostics.negative_count, 0);
        assert_eq!(assignment.indices_with(SampleTag::Padding).count(), 6);
        assert_eq!(
            assignment.tags.slice(s![..2]),
            Array1::from_elem(2, SampleTag::Positive)
        );
    }

    #[test]
    fn negative_budget_uses_realized_positives() {
        let mut rows = vec![[0.0, 0.0, 10.0, 16.0]];
        rows.extend((1..=20).map(|i| {
            let y = 20.0 * i as f32;
            [y, 0.0, y + 10.0, 16.0]
        }));
        let anchors = Array2::from_shape_fn((rows.len(), 4), |(i, j)| rows[i][j]);
        let indices = Array1::from_iter(0..rows.len());

        let assignment =
            assign_one(&assigner(), &[[0.0, 0.0, 10.0, 16.0]], &anchors, &indices).unwrap();

        assert_eq!(assignment.diagnostics.positive_count, 1);
        // capped by the ratio, not by the rows left after the positives
        assert_eq!(assignment.diagnostics.negative_count, 6);
        assert_eq!(assignment.indices_with(SampleTag::Padding).count(), 1);
        assert!(assignment.indices_with(SampleTag::Negative).all(|i| i != 0));
    }

    #[test]
    fn seeded_assignments_repeat() {
        let rows: Vec<[f32; 4]> = (0..60)
            .map(|i| {
                let y = 5.0 * i as f32;
                [y, 0.0, y + 10.0, 16.0]
            })
            .collect();
        let anchors = Array2::from_shape_fn((rows.len(), 4), |(i, j)| rows[i][j]);
        let indices = Array1::from_iter(0..rows.len());
        let (gt, classes) = pad_ground_truth(&[[0.0, 0.0, 40.0, 16.0]], &[1], 4).unwrap();

        let assign = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            assigner()
                .assign(&mut rng, gt.view(), classes.view(), anchors.view(), indices.view())
                .unwrap()
        };

        assert_eq!(assign(9), assign(9));
        assert_ne!(assign(9).anchor_indices, assign(10).anchor_indices);
    }

    #[test]
    fn rejects_bad_inputs() {
        let assigner = assigner();
        let (anchors, indices) = column_anchors();
        let mut rng = StdRng::seed_from_u64(0);

        let too_many = vec![[0.0, 0.0, 10.0, 16.0]; 5];
        let (gt, classes) = pad_ground_truth(&too_many, &[1; 5], 5).unwrap();
        assert!(matches!(
            assigner.assign(&mut rng, gt.view(), classes.view(), anchors.view(), indices.view()),
            Err(Error::ShapeMismatch { .. })
        ));

        let (gt, classes) = pad_ground_truth(&[[0.0, 0.0, 10.0, 16.0]], &[1], 4).unwrap();
        assert!(matches!(
            assigner.assign(
                &mut rng,
                gt.slice(s![.., ..4]),
                classes.view(),
                anchors.view(),
                indices.view()
            ),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            assigner.assign(
                &mut rng,
                gt.view(),
                classes.slice(s![..3, ..]),
                anchors.view(),
                indices.view()
            ),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            assigner.assign(
                &mut rng,
                gt.view(),
                classes.view(),
                anchors.view(),
                indices.slice(s![..2])
            ),
            Err(Error::ShapeMismatch { .. })
        ));

        let no_anchors = Array2::<f32>::zeros((0, 4));
        let no_indices = Array1::<usize>::zeros(0);
        assert!(matches!(
            assigner.assign(
                &mut rng,
                gt.view(),
                classes.view(),
                no_anchors.view(),
                no_indices.view()
            ),
            Err(Error::EmptyAnchorSet)
        ));
    }

    #[test]
    fn tags_must_agree_row_by_row() {
        let assigner = assigner();
        let (anchors, indices) = column_anchors();
        let mut rng = StdRng::seed_from_u64(0);

        let gt = arr2(&[
            [0.0, 0.0, 10.0, 16.0, 1.0],
            [0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 0.0],
        ]);
        // one real row each, but not the same one
        let classes = arr2(&[[7.0, 0.0], [0.0, 0.0], [3.0, 1.0]]);

        assert!(matches!(
            assigner.assign(&mut rng, gt.view(), classes.view(), anchors.view(), indices.view()),
            Err(Error::ShapeMismatch { .. })
        ));

        let classes = arr2(&[[7.0, 1.0], [0.0, 0.0], [3.0, 0.0]]);
        let assignment = assigner
            .assign(&mut rng, gt.view(), classes.view(), anchors.view(), indices.view())
            .unwrap();
        assert_eq!(assignment.class_ids[0], 7);
    }

    #[test]
    fn rejects_class_ids_that_are_not_whole() {
        let assigner = assigner();
        let (anchors, indices) = column_anchors();
        let mut rng = StdRng::seed_from_u64(0);
        let (gt, _) = pad_ground_truth(&[[0.0, 0.0, 10.0, 16.0]], &[1], 4).unwrap();

        for class_id in [-1.0, 2.5, f32::NAN, f32::INFINITY] {
            let mut classes = Array2::zeros((4, 2));
            classes[[0, 0]] = class_id;
            classes[[0, 1]] = 1.0;

            assert!(matches!(
                assigner.assign(&mut rng, gt.view(), classes.view(), anchors.view(), indices.view()),
                Err(Error::InvalidClassId { row: 0, .. })
            ));
        }

        // padding rows are never read
        let mut classes = Array2::zeros((4, 2));
        classes[[0, 1]] = 1.0;
        classes[[2, 0]] = -1.0;
        assert!(
            assigner
                .assign(&mut rng, gt.view(), classes.view(), anchors.view(), indices.view())
                .is_ok()
        );
    }

    #[test]
    fn rejects_invalid_configuration() {
        let config = TargetConfig {
            positive_ratio: 1.5,
            ..config()
        };
        assert!(matches!(
            TargetAssigner::new(config),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    fn batch_inputs() -> (Array3<f32>, Array3<f32>, Array3<f32>, Array2<usize>) {
        let (anchors, indices) = column_anchors();
        let (first_gt, first_classes) =
            pad_ground_truth(&[[0.0, 0.0, 10.0, 16.0]], &[1], 4).unwrap();
        let (second_gt, second_classes) = pad_ground_truth(&[], &[], 4).unwrap();

        (
            stack(Axis(0), &[first_gt.view(), second_gt.view()]).unwrap(),
            stack(Axis(0), &[first_classes.view(), second_classes.view()]).unwrap(),
            stack(Axis(0), &[anchors.view(), anchors.view()]).unwrap(),
            stack(Axis(0), &[indices.view(), indices.view()]).unwrap(),
        )
    }

    #[test]
    fn batch_keeps_image_order() {
        let (gt, classes, anchors, indices) = batch_inputs();
        let assigner = assigner();

        let batch = assigner
            .assign_batch(gt.view(), classes.view(), anchors.view(), indices.view())
            .unwrap();

        assert_eq!(batch.images.len(), 2);
        assert_eq!(batch.images[0].diagnostics.positive_count, 1);
        assert_eq!(batch.images[1].diagnostics.positive_count, 0);
        assert_eq!(batch.images[1].diagnostics.gt_count, 0);

        for image in 0..2 {
            let mut rng = image_rng(5, image);
            let expected = assigner
                .assign(
                    &mut rng,
                    gt.index_axis(Axis(0), image),
                    classes.index_axis(Axis(0), image),
                    anchors.index_axis(Axis(0), image),
                    indices.index_axis(Axis(0), image),
                )
                .unwrap();
            assert_eq!(batch.images[image], expected);
        }

        assert_eq!(batch.deltas().unwrap().dim(), (2, 8, 4));
        assert_eq!(batch.class_ids().unwrap().dim(), (2, 8, 2));
        let stacked = batch.indices().unwrap();
        assert_eq!(stacked.dim(), (2, 8, 2));
        assert_eq!(stacked.slice(s![0, .., ..]), batch.images[0].tagged_indices());
        assert_eq!(stacked[[1, 0, 1]], -1);

        let diagnostics = batch.diagnostics();
        assert_eq!(diagnostics.dim(), (2, 5));
        assert_eq!(diagnostics.row(0), array![1.0, 1.0, 5.0, 1.0, 1.0]);
        assert_eq!(diagnostics.row(1), array![0.0, 0.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn batch_reports_failing_images() {
        let (gt, classes, anchors, indices) = batch_inputs();
        let mut broken = classes.clone();
        // second image claims a class without a box
        broken[[1, 0, 1]] = 1.0;

        let results = assigner()
            .assign_each(gt.view(), broken.view(), anchors.view(), indices.view())
            .unwrap();
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::ShapeMismatch { .. })));

        assert!(
            assigner()
                .assign_batch(gt.view(), broken.view(), anchors.view(), indices.view())
                .is_err()
        );
    }

    #[test]
    fn batch_sizes_must_agree() {
        let (gt, classes, anchors, indices) = batch_inputs();

        assert!(matches!(
            assigner().assign_each(
                gt.view(),
                classes.slice(s![..1, .., ..]),
                anchors.view(),
                indices.view()
            ),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn empty_batch() {
        let batch = assigner()
            .assign_batch(
                Array3::<f32>::zeros((0, 4, 5)).view(),
                Array3::<f32>::zeros((0, 4, 2)).view(),
                Array3::<f32>::zeros((0, 6, 4)).view(),
                Array2::<usize>::zeros((0, 6)).view(),
            )
            .unwrap();

        assert!(batch.images.is_empty());
        assert_eq!(batch.deltas().unwrap().dim(), (0, 8, 4));
        assert_eq!(batch.indices().unwrap().dim(), (0, 8, 2));
        assert_eq!(batch.diagnostics().dim(), (0, 5));
    }
}
