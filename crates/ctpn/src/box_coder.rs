use ndarray::{Array1, Array2, ArrayView2, Axis, Zip, stack};

use crate::anchor::check_box_columns;
use crate::{Error, Result};

/// Encodes ground truth boxes as CTPN regression targets relative to their anchors, and decodes
/// predicted targets back to boxes.
///
/// A target is `(dy, dh, dx)`: the vertical center offset relative to the anchor height, the log
/// height ratio, and the side refinement offset relative to half the anchor width. Each is divided
/// by the matching entry of [`BoxCoder::weights`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxCoder {
    pub weights: (f32, f32, f32),
}

impl Default for BoxCoder {
    fn default() -> Self {
        BoxCoder::new((0.1, 0.2, 0.1))
    }
}

impl BoxCoder {
    /// Create a new [`BoxCoder`] with the given `(dy, dh, dx)` weights.
    #[must_use]
    pub fn new(weights: (f32, f32, f32)) -> Self {
        BoxCoder { weights }
    }

    /// Compute the regression targets of `gt_boxes` relative to `anchors`, row by row.
    ///
    /// Fails with [`Error::DegenerateBox`] when an anchor or ground truth box has a non-positive
    /// height, or an anchor has a non-positive width.
    pub fn encode_single(
        &self,
        anchors: ArrayView2<f32>,
        gt_boxes: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        check_box_columns("anchors", anchors)?;
        check_box_columns("ground truth boxes", gt_boxes)?;
        if anchors.nrows() != gt_boxes.nrows() {
            return Err(Error::shape_mismatch(
                "matched ground truth boxes",
                format!("{} rows", anchors.nrows()),
                format!("{} rows", gt_boxes.nrows()),
            ));
        }

        let heights = &anchors.column(2) - &anchors.column(0);
        let widths = &anchors.column(3) - &anchors.column(1);
        let gt_heights = &gt_boxes.column(2) - &gt_boxes.column(0);

        check_degenerate(&heights, &gt_heights, &widths)?;

        let ctr_y = (&anchors.column(2) + &anchors.column(0)) * 0.5;
        let ctr_x = (&anchors.column(3) + &anchors.column(1)) * 0.5;
        let gt_ctr_y = (&gt_boxes.column(2) + &gt_boxes.column(0)) * 0.5;
        let gt_ctr_x = (&gt_boxes.column(3) + &gt_boxes.column(1)) * 0.5;

        let (wy, wh, wx) = self.weights;

        let dy = (gt_ctr_y - ctr_y) / &heights / wy;
        let dh = (gt_heights / &heights).mapv(f32::ln) / wh;
        // only one side of a text line is refined per anchor, hence twice the center offset
        let dx = (gt_ctr_x - ctr_x) * 2.0 / widths / wx;

        Ok(stack(Axis(1), &[dy.view(), dh.view(), dx.view()])?)
    }

    /// Apply regression targets `[N, (dy, dh, dx)]` to `anchors`.
    ///
    /// The height and vertical center always follow the targets. With `use_side_refine` the
    /// horizontal center is moved as well and the left side is clamped to the image; otherwise
    /// the horizontal extent of the anchor is kept.
    pub fn decode_single(
        &self,
        rel_codes: ArrayView2<f32>,
        anchors: ArrayView2<f32>,
        use_side_refine: bool,
    ) -> Result<Array2<f32>> {
        check_box_columns("anchors", anchors)?;
        if rel_codes.dim() != (anchors.nrows(), 3) {
            return Err(Error::shape_mismatch(
                "regression targets",
                format!("[{}, 3]", anchors.nrows()),
                format!("{:?}", rel_codes.dim()),
            ));
        }

        let heights = &anchors.column(2) - &anchors.column(0);
        let widths = &anchors.column(3) - &anchors.column(1);

        let ctr_y = (&anchors.column(2) + &anchors.column(0)) * 0.5;
        let ctr_x = (&anchors.column(3) + &anchors.column(1)) * 0.5;

        let (wy, wh, wx) = self.weights;

        let dy = &rel_codes.column(0) * wy;
        let dh = &rel_codes.column(1) * wh;
        let dx = &rel_codes.column(2) * wx;

        let pred_ctr_y = dy * &heights + ctr_y;
        let pred_h = dh.mapv(f32::exp) * &heights;

        let half_h = pred_h * 0.5;
        let y1 = &pred_ctr_y - &half_h;
        let y2 = &pred_ctr_y + &half_h;

        let (x1, x2) = if use_side_refine {
            let half_w = widths * 0.5;
            let pred_ctr_x = dx * &half_w + ctr_x;
            let x1 = (&pred_ctr_x - &half_w).mapv(|x| x.max(0.0));
            let x2 = &pred_ctr_x + &half_w;
            (x1, x2)
        } else {
            (anchors.column(1).to_owned(), anchors.column(3).to_owned())
        };

        Ok(stack(Axis(1), &[y1.view(), x1.view(), y2.view(), x2.view()])?)
    }
}

fn check_degenerate(
    heights: &Array1<f32>,
    gt_heights: &Array1<f32>,
    widths: &Array1<f32>,
) -> Result<()> {
    let mut degenerate = None;
    Zip::indexed(heights)
        .and(gt_heights)
        .and(widths)
        .for_each(|row, &h, &gt_h, &w| {
            // also catches NaN
            let valid = h > 0.0 && gt_h > 0.0 && w > 0.0;
            if !valid && degenerate.is_none() {
                degenerate = Some(Error::DegenerateBox {
                    row,
                    anchor_height: h,
                    gt_height: gt_h,
                    anchor_width: w,
                });
            }
        });

    degenerate.map_or(Ok(()), Err)
}
