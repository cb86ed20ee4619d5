//! Fixed-size arrays with a tag column.
//!
//! Ground truth enters, and training targets leave, as arrays with a fixed number of rows. Real
//! rows come first and the remaining rows are padding, told apart by a tag in the last column.

use ndarray::{Array2, ArrayView2, Axis, s};

use crate::{Error, Result};

/// Tag of a real ground truth row.
pub const REAL_TAG: f32 = 1.0;
/// Tag of a padding row.
pub const PADDING_TAG: f32 = 0.0;

/// Pad `rows` with `fill` up to `size` rows.
///
/// Fails with [`Error::ShapeMismatch`] when there are more than `size` rows already.
pub fn pad_rows<A: Clone>(rows: ArrayView2<A>, size: usize, fill: A) -> Result<Array2<A>> {
    if rows.nrows() > size {
        return Err(Error::shape_mismatch(
            "padded rows",
            format!("at most {size} rows"),
            format!("{} rows", rows.nrows()),
        ));
    }

    let mut padded = Array2::from_elem((size, rows.ncols()), fill);
    padded.slice_mut(s![..rows.nrows(), ..]).assign(&rows);

    Ok(padded)
}

/// Append a tag column, [`REAL_TAG`] for the given rows, and pad with [`PADDING_TAG`] rows up to
/// `size` rows.
pub fn pad_tagged(rows: ArrayView2<f32>, size: usize) -> Result<Array2<f32>> {
    let tags = Array2::from_elem((rows.nrows(), 1), REAL_TAG);
    let tagged = ndarray::concatenate(Axis(1), &[rows.view(), tags.view()])?;

    pad_rows(tagged.view(), size, PADDING_TAG)
}

/// Pack the ground truth of one image into the fixed-size input layout of the target assigner.
///
/// Returns `[max_gt_num, (y1, x1, y2, x2, tag)]` boxes and `[max_gt_num, (class_id, tag)]`
/// classes.
pub fn pad_ground_truth(
    boxes: &[[f32; 4]],
    class_ids: &[u32],
    max_gt_num: usize,
) -> Result<(Array2<f32>, Array2<f32>)> {
    if boxes.len() != class_ids.len() {
        return Err(Error::shape_mismatch(
            "ground truth class ids",
            format!("{} ids", boxes.len()),
            format!("{} ids", class_ids.len()),
        ));
    }

    let box_rows = Array2::from_shape_vec(
        (boxes.len(), 4),
        boxes.iter().flatten().copied().collect(),
    )?;
    let class_rows = Array2::from_shape_vec(
        (class_ids.len(), 1),
        class_ids.iter().map(|&id| id as f32).collect(),
    )?;

    Ok((
        pad_tagged(box_rows.view(), max_gt_num)?,
        pad_tagged(class_rows.view(), max_gt_num)?,
    ))
}

/// Keep the real rows of a tagged array and drop the tag column.
///
/// A row is real when its tag is non-zero.
#[must_use]
pub fn remove_padding(tagged: ArrayView2<f32>) -> Array2<f32> {
    let Some(tag_column) = tagged.ncols().checked_sub(1) else {
        return Array2::zeros((0, 0));
    };

    let real: Vec<usize> = tagged
        .column(tag_column)
        .indexed_iter()
        .filter(|(_, tag)| **tag != PADDING_TAG)
        .map(|(i, _)| i)
        .collect();

    tagged
        .slice(s![.., ..tag_column])
        .select(Axis(0), &real)
}
