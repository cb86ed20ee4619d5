use ndarray::{Array1, ArrayD, IxDyn};

use itertools::Itertools;

use crate::Result;

/// Coordinate grids from coordinate vectors, like `numpy.meshgrid` with `ij` indexing.
///
/// Grid `k` has shape `(len(xi[0]), len(xi[1]), ...)` and varies along axis `k`.
pub fn meshgrid<T>(xi: &[Array1<T>]) -> Result<Vec<ArrayD<T>>>
where
    T: Copy,
{
    let shape = IxDyn(&xi.iter().map(|axis| axis.len()).collect::<Vec<_>>());
    // row-major over all axes, the last axis varies fastest
    let points = xi.iter().map(|axis| axis.iter()).multi_cartesian_product();

    let grids = (0..xi.len())
        .map(|axis| {
            let coordinates = points.clone().map(|point| *point[axis]).collect();
            ArrayD::from_shape_vec(shape.clone(), coordinates)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(grids)
}
