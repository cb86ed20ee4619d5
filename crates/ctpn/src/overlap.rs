use ndarray::{Array2, ArrayView2, Axis, Zip};

use crate::Result;
use crate::anchor::check_box_columns;

/// Compute the IoU between every ground truth box and every anchor.
///
/// Both inputs are `(y1, x1, y2, x2)` boxes, the result has shape `[num_gt, num_anchors]`.
/// Pairs with an empty union, e.g. two zero-area boxes, have an IoU of `0.0`.
pub fn compute_iou(gt_boxes: ArrayView2<f32>, anchors: ArrayView2<f32>) -> Result<Array2<f32>> {
    check_box_columns("ground truth boxes", gt_boxes)?;
    check_box_columns("anchors", anchors)?;

    // [N, 1] against [1, M]
    let gt = |i: usize| gt_boxes.column(i).insert_axis(Axis(1));
    let anchor = |i: usize| anchors.column(i).insert_axis(Axis(0));

    let mut intersect_h = Array2::<f32>::zeros((gt_boxes.nrows(), anchors.nrows()));
    Zip::from(&mut intersect_h)
        .and_broadcast(gt(0))
        .and_broadcast(gt(2))
        .and_broadcast(anchor(0))
        .and_broadcast(anchor(2))
        .for_each(|h, &gy1, &gy2, &ay1, &ay2| *h = (gy2.min(ay2) - gy1.max(ay1)).max(0.0));

    let mut intersect = intersect_h;
    Zip::from(&mut intersect)
        .and_broadcast(gt(1))
        .and_broadcast(gt(3))
        .and_broadcast(anchor(1))
        .and_broadcast(anchor(3))
        .for_each(|i, &gx1, &gx2, &ax1, &ax2| *i *= (gx2.min(ax2) - gx1.max(ax1)).max(0.0));

    let area_gt = (&gt(2) - &gt(0)) * (&gt(3) - &gt(1));
    let area_anchor = (&anchor(2) - &anchor(0)) * (&anchor(3) - &anchor(1));
    let union = &(&area_gt + &area_anchor) - &intersect;

    Ok(Zip::from(&intersect)
        .and(&union)
        .map_collect(|&i, &u| if u > 0.0 { i / u } else { 0.0 }))
}
