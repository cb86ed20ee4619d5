/// A bounding box in image pixel coordinates, stored as its top-left and bottom-right corners,
/// y first.
///
/// This is the `(y1, x1, y2, x2)` layout used by every box array in this crate.
///
/// ```
/// use ctpn::bbox::Bbox;
///
/// let anchor = Bbox::yxyx(103.5, 80.0, 136.5, 96.0);
/// let slice = Bbox::yxyx(103.5, 88.0, 136.5, 104.0);
///
/// assert_eq!(anchor.height(), 33.0);
/// assert_eq!(anchor.iou(&slice), 1.0 / 3.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    pub inner: (f32, f32, f32, f32),
}

impl Bbox {
    /// Create a bounding box from its top-left and bottom-right corners.
    #[must_use]
    pub fn yxyx(y1: f32, x1: f32, y2: f32, x2: f32) -> Bbox {
        Bbox {
            inner: (y1, x1, y2, x2),
        }
    }

    /// Create a bounding box from a row of a `[N, 4]` box array.
    ///
    /// # Panics
    ///
    /// Panics if the row has fewer than four values.
    #[must_use]
    pub fn from_row(row: ndarray::ArrayView1<f32>) -> Bbox {
        Bbox::yxyx(row[0], row[1], row[2], row[3])
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        let (y1, _, y2, _) = self.inner;
        y2 - y1
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        let (_, x1, _, x2) = self.inner;
        x2 - x1
    }

    /// Area in square pixels, negative for inverted boxes.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.height() * self.width()
    }

    /// Overlapping area of both boxes, `0.0` when they are disjoint or only touch.
    #[must_use]
    pub fn intersection(&self, other: &Bbox) -> f32 {
        let (y1, x1, y2, x2) = self.inner;
        let (y3, x3, y4, x4) = other.inner;

        let h = y2.min(y4) - y1.max(y3);
        let w = x2.min(x4) - x1.max(x3);

        h.max(0.0) * w.max(0.0)
    }

    /// Area covered by either box.
    #[must_use]
    pub fn union(&self, other: &Bbox) -> f32 {
        self.area() + other.area() - self.intersection(other)
    }

    /// Intersection over union, in `[0, 1]` for valid boxes.
    ///
    /// Two boxes with an empty union, e.g. two points, have an IoU of `0.0`.
    #[must_use]
    pub fn iou(&self, other: &Bbox) -> f32 {
        match self.union(other) {
            union if union > 0.0 => self.intersection(other) / union,
            _ => 0.0,
        }
    }

    /// Whether the box lies within `[0, height] x [0, width]`.
    #[must_use]
    pub fn is_inside(&self, height: f32, width: f32) -> bool {
        let (y1, x1, y2, x2) = self.inner;
        [y1, y2].iter().all(|y| (0.0..=height).contains(y))
            && [x1, x2].iter().all(|x| (0.0..=width).contains(x))
    }
}

impl From<Bbox> for (f32, f32, f32, f32) {
    fn from(bbox: Bbox) -> Self {
        bbox.inner
    }
}
