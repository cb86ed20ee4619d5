use ndarray::{Array, Array1, Array2, Array3, ArrayView2, Axis, stack};

use crate::bbox::Bbox;
use crate::config::AnchorConfig;
use crate::meshgrid::meshgrid;
use crate::{Error, Result};

/// Create the base anchors, one `(y1, x1, y2, x2)` box per height, centered at the origin.
pub fn generate_base_anchors(heights: &[f32], width: f32) -> Result<Array2<f32>> {
    AnchorConfig {
        heights: heights.to_vec(),
        width,
        stride: 1.0,
    }
    .validate()?;

    let rows = heights
        .iter()
        .flat_map(|&h| [-0.5 * h, -0.5 * width, 0.5 * h, 0.5 * width])
        .collect();

    Ok(Array2::from_shape_vec((heights.len(), 4), rows)?)
}

/// Place the base anchors at the center of every cell of a `(height, width)` grid.
///
/// The anchors are ordered row-major over the cells, and by base anchor within a cell, so anchor
/// `(row * grid_width + col) * num_base + b` is base anchor `b` moved to cell `(row, col)`.
pub fn tile_anchors(
    grid_shape: (usize, usize),
    stride: f32,
    base_anchors: &Array2<f32>,
) -> Result<Array2<f32>> {
    if !(stride.is_finite() && stride > 0.0) {
        return Err(Error::invalid_configuration(format!(
            "stride must be positive, got {stride}"
        )));
    }
    check_box_columns("base anchors", base_anchors.view())?;

    let (grid_height, grid_width) = grid_shape;
    let num_cells = grid_height * grid_width;
    let num_base = base_anchors.nrows();

    let shifts_y = (Array::range(0.0, grid_height as f32, 1.0) + 0.5) * stride;
    let shifts_x = (Array::range(0.0, grid_width as f32, 1.0) + 0.5) * stride;

    let grids = meshgrid(&[shifts_y, shifts_x])?;
    let center_y: Array1<f32> = grids[0].iter().copied().collect();
    let center_x: Array1<f32> = grids[1].iter().copied().collect();

    // (H*W, 4) as (cy, cx, cy, cx)
    let shifts = stack(
        Axis(1),
        &[center_y.view(), center_x.view(), center_y.view(), center_x.view()],
    )?;

    // (H*W, 1, 4) + (1, A, 4)
    let anchors: Array3<f32> =
        &shifts.insert_axis(Axis(1)) + &base_anchors.view().insert_axis(Axis(0));

    Ok(anchors
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((num_cells * num_base, 4))?)
}

/// Keep the boxes that lie inside the image covered by the grid.
///
/// The image is `grid_height * stride` pixels high and `grid_width * stride` pixels wide. Returns
/// the surviving boxes and their positions in `boxes`, in increasing order.
pub fn filter_out_of_bounds(
    boxes: ArrayView2<f32>,
    grid_shape: (usize, usize),
    stride: f32,
) -> Result<(Array2<f32>, Array1<usize>)> {
    check_box_columns("anchors", boxes)?;

    let (image_height, image_width) = image_size(grid_shape, stride);

    let valid_indices: Array1<usize> = boxes
        .outer_iter()
        .enumerate()
        .filter(|(_, row)| Bbox::from_row(*row).is_inside(image_height, image_width))
        .map(|(i, _)| i)
        .collect();

    let valid_boxes = boxes.select(Axis(0), valid_indices.as_slice().unwrap_or_default());

    Ok((valid_boxes, valid_indices))
}

/// Image size in pixels, `(height, width)`, covered by a grid.
#[must_use]
pub fn image_size(grid_shape: (usize, usize), stride: f32) -> (f32, f32) {
    (grid_shape.0 as f32 * stride, grid_shape.1 as f32 * stride)
}

/// The anchors of a single image that lie within its boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidAnchors {
    /// `[N, (y1, x1, y2, x2)]`
    pub boxes: Array2<f32>,
    /// Position of every box in the full anchor grid.
    pub indices: Array1<usize>,
    /// Number of anchors in the full grid, before filtering.
    pub total: usize,
}

impl ValidAnchors {
    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.nrows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.nrows() == 0
    }

    /// Select the rows of a per-anchor array that belong to the valid anchors.
    ///
    /// `per_anchor` has one row for every anchor of the full grid, e.g. the regression or class
    /// outputs of the model.
    pub fn gather(&self, per_anchor: ArrayView2<f32>) -> Result<Array2<f32>> {
        if per_anchor.nrows() != self.total {
            return Err(Error::shape_mismatch(
                "per-anchor predictions",
                format!("{} rows", self.total),
                format!("{} rows", per_anchor.nrows()),
            ));
        }

        Ok(per_anchor.select(Axis(0), self.indices.as_slice().unwrap_or_default()))
    }
}

/// Anchors shared by all images of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchAnchors {
    /// `[batch, N, 4]`
    pub boxes: Array3<f32>,
    /// `[batch, N]`
    pub indices: Array2<usize>,
}

/// Generates the anchors for a feature map.
///
/// The base anchors only depend on the configuration and are computed once.
#[derive(Debug, Clone)]
pub struct AnchorGenerator {
    config: AnchorConfig,
    base_anchors: Array2<f32>,
}

impl AnchorGenerator {
    pub fn new(config: AnchorConfig) -> Result<Self> {
        config.validate()?;
        let base_anchors = generate_base_anchors(&config.heights, config.width)?;

        Ok(Self {
            config,
            base_anchors,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// `[num_heights, (y1, x1, y2, x2)]`
    #[must_use]
    pub fn base_anchors(&self) -> &Array2<f32> {
        &self.base_anchors
    }

    /// Number of anchors in the full grid for a feature map of shape `(height, width)`.
    #[must_use]
    pub fn num_anchors(&self, grid_shape: (usize, usize)) -> usize {
        grid_shape.0 * grid_shape.1 * self.base_anchors.nrows()
    }

    /// Generate the anchors for a feature map of shape `(height, width)` and drop the ones that
    /// cross the image boundary.
    pub fn generate(&self, grid_shape: (usize, usize)) -> Result<ValidAnchors> {
        let stride = self.config.stride;
        let anchors = tile_anchors(grid_shape, stride, &self.base_anchors)?;
        let (boxes, indices) = filter_out_of_bounds(anchors.view(), grid_shape, stride)?;

        if boxes.nrows() == 0 {
            let (height, width) = image_size(grid_shape, stride);
            tracing::warn!(height, width, "no anchors inside the image");
            return Err(Error::EmptyAnchorSet);
        }

        tracing::debug!(
            grid_height = grid_shape.0,
            grid_width = grid_shape.1,
            total = anchors.nrows(),
            valid = boxes.nrows(),
            "generated anchors"
        );

        Ok(ValidAnchors {
            boxes,
            indices,
            total: anchors.nrows(),
        })
    }

    /// Generate the anchors once and repeat them for every image in the batch.
    ///
    /// All images of a batch share the feature map shape, so they share their anchors as well.
    pub fn generate_batch(
        &self,
        grid_shape: (usize, usize),
        batch_size: usize,
    ) -> Result<BatchAnchors> {
        let anchors = self.generate(grid_shape)?;
        let n = anchors.len();

        let boxes = anchors
            .boxes
            .broadcast((batch_size, n, 4))
            .ok_or_else(|| {
                Error::shape_mismatch("anchor batch", "[N, 4]", format!("{:?}", anchors.boxes.dim()))
            })?
            .to_owned();
        let indices = anchors
            .indices
            .broadcast((batch_size, n))
            .ok_or_else(|| Error::shape_mismatch("anchor index batch", "[N]", anchors.indices.len()))?
            .to_owned();

        Ok(BatchAnchors { boxes, indices })
    }
}

pub(crate) fn check_box_columns(what: &'static str, boxes: ArrayView2<f32>) -> Result<()> {
    if boxes.ncols() == 4 {
        Ok(())
    } else {
        Err(Error::shape_mismatch(what, "4 columns", format!("{} columns", boxes.ncols())))
    }
}
