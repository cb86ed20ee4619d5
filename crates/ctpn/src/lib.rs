//! Anchor generation and training target assignment for CTPN text line detection.
//!
//! Anchors are fixed-width boxes of several heights placed at every cell of a feature map. For
//! every image, [`TargetAssigner`] labels the anchors that lie inside the image as positive or
//! negative samples using their overlap with the ground truth, and encodes regression targets
//! for the positive ones.
//!
//! ```
//! use ctpn::{CtpnConfig, CtpnTargets};
//! use ctpn::padding::pad_ground_truth;
//! use ndarray::Axis;
//!
//! let config = CtpnConfig::default();
//! let pipeline = CtpnTargets::new(&config)?;
//!
//! let (boxes, classes) =
//!     pad_ground_truth(&[[20.0, 32.0, 52.0, 48.0]], &[1], config.target.max_gt_num)?;
//! let targets = pipeline.build(
//!     (8, 8),
//!     boxes.insert_axis(Axis(0)).view(),
//!     classes.insert_axis(Axis(0)).view(),
//! )?;
//!
//! assert_eq!(targets.targets.deltas()?.dim(), (1, 128, 4));
//! # Ok::<(), ctpn::Error>(())
//! ```

pub mod anchor;
pub mod bbox;
pub mod box_coder;
pub mod config;
pub mod error;
pub mod meshgrid;
pub mod overlap;
pub mod padding;
pub mod pipeline;
pub mod sampling;
pub mod target;

pub use anchor::{AnchorGenerator, BatchAnchors, ValidAnchors};
pub use box_coder::BoxCoder;
pub use config::{AnchorConfig, CtpnConfig, TargetConfig};
pub use error::{Error, Result};
pub use overlap::compute_iou;
pub use pipeline::{CtpnTargets, TrainingTargets};
pub use target::{Assignment, BatchAssignment, Diagnostics, SampleTag, TargetAssigner};
