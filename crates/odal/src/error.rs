//! Result and Error types for the crate.
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result containing an error variant from this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Which layer of the configuration failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Main,
    Overlay,
}

/// Configuration error variants
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// The config file could not be read, this wraps a [`std::io::Error`]
    #[error("`{name}`: failed to read {kind:?} config from `{path}`")]
    #[diagnostic(code(odal::load))]
    Load {
        name: &'static str,
        path: PathBuf,
        kind: ConfigKind,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid toml, this wraps a [`toml::de::Error`]
    #[error("`{name}`: failed to parse `{path}`")]
    #[diagnostic(code(odal::parse))]
    Parse {
        name: &'static str,
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The merged table does not match the config type
    #[error("`{name}`: config does not match the expected layout")]
    #[diagnostic(code(odal::deserialize), help("Check for misspelled or unknown keys"))]
    Deserialize {
        name: &'static str,
        #[source]
        source: toml::de::Error,
    },
}
