//! Ground truth files.
//!
//! A ground truth file is a JSON list with one entry per image:
//!
//! ```json
//! [
//!   { "boxes": [[103.5, 80.0, 136.5, 96.0]], "class_ids": [1] },
//!   { "boxes": [], "class_ids": [] }
//! ]
//! ```

use std::fs;
use std::path::Path;

use ndarray::{Array2, Array3, Axis, stack};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ground truth of a single image, `(y1, x1, y2, x2)` boxes in pixels.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ImageGroundTruth {
    pub boxes: Vec<[f32; 4]>,
    pub class_ids: Vec<u32>,
}

pub fn load(path: &Path) -> Result<Vec<ImageGroundTruth>> {
    let contents = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&contents).map_err(|source| Error::GroundTruth {
        path: path.to_path_buf(),
        source,
    })
}

/// Pack the images into `[batch, max_gt_num, 5]` boxes and `[batch, max_gt_num, 2]` classes.
pub fn to_batch(
    images: &[ImageGroundTruth],
    max_gt_num: usize,
) -> Result<(Array3<f32>, Array3<f32>)> {
    let mut boxes = Vec::with_capacity(images.len());
    let mut classes = Vec::with_capacity(images.len());
    for image in images {
        let (b, c) = ctpn::padding::pad_ground_truth(&image.boxes, &image.class_ids, max_gt_num)?;
        boxes.push(b);
        classes.push(c);
    }

    if images.is_empty() {
        return Ok((
            Array3::zeros((0, max_gt_num, 5)),
            Array3::zeros((0, max_gt_num, 2)),
        ));
    }

    let box_views: Vec<_> = boxes.iter().map(Array2::view).collect();
    let class_views: Vec<_> = classes.iter().map(Array2::view).collect();

    Ok((
        stack(Axis(0), &box_views).map_err(ctpn::Error::from)?,
        stack(Axis(0), &class_views).map_err(ctpn::Error::from)?,
    ))
}
