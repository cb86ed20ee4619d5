use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Type alias for [`std::result::Result`] containing a mimir [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Enum describing the possible errors that can occur in mimir.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Failed to read `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid ground truth in `{path}`")]
    #[diagnostic(
        code(mimir::ground_truth),
        help("Expected a list of images, each with `boxes` as [y1, x1, y2, x2] and `class_ids`")
    )]
    GroundTruth {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid grid shape `{0}`")]
    #[diagnostic(
        code(mimir::grid),
        help("The grid is given as HEIGHTxWIDTH in feature map cells, e.g. `38x50`")
    )]
    Grid(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] odal::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ctpn(#[from] ctpn::Error),
}
