//! See [`Error`].

use miette::Diagnostic;
use thiserror::Error;

/// Error types for this crate.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Invalid configuration: {reason}")]
    #[diagnostic(
        code(ctpn::invalid_configuration),
        help("Anchor heights, width and stride must be positive and finite")
    )]
    InvalidConfiguration { reason: String },

    #[error("No anchors lie inside the image")]
    #[diagnostic(
        code(ctpn::empty_anchor_set),
        help("The feature map is too small for the shortest configured anchor")
    )]
    EmptyAnchorSet,

    #[error(
        "Degenerate box pair at row {row}: anchor height {anchor_height}, \
            ground truth height {gt_height}, anchor width {anchor_width}"
    )]
    #[diagnostic(code(ctpn::degenerate_box))]
    DegenerateBox {
        row: usize,
        anchor_height: f32,
        gt_height: f32,
        anchor_width: f32,
    },

    #[error("Shape mismatch for {what}: expected {expected}, found {found}")]
    #[diagnostic(code(ctpn::shape_mismatch))]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("Invalid class id {class_id} at ground truth row {row}")]
    #[diagnostic(
        code(ctpn::invalid_class_id),
        help("Class ids of real ground truth rows must be whole numbers, zero or greater")
    )]
    InvalidClassId { row: usize, class_id: f32 },

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl Error {
    pub(crate) fn invalid_configuration(reason: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    pub(crate) fn shape_mismatch(
        what: &'static str,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        Error::ShapeMismatch {
            what,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// Type alias for [`Result<T, Error>`].
pub type Result<T> = std::result::Result<T, Error>;
