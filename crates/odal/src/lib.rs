//! Layered toml configuration.
//!
//! A config type lives in a single file, [`Config::PATH`], inside a main config directory.
//! An optional overlay directory holds a file with the same name that overrides individual keys,
//! e.g. a per-dataset tweak of the anchor heights without copying the whole file.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use toml::Table;

mod error;

pub use error::{ConfigKind, Error, Result};

pub trait Config: DeserializeOwned {
    /// File name of the config, relative to the config directories.
    const PATH: &'static str;

    /// Load the config from `root`, without applying an overlay.
    fn load(root: impl AsRef<Path>) -> Result<Self> {
        let main = read_table::<Self>(root.as_ref(), ConfigKind::Main)?;
        from_table::<Self>(main)
    }

    /// Load the config from `root`, with the keys from the same file in `overlay` taking
    /// precedence.
    fn load_with_overlay(root: impl AsRef<Path>, overlay: impl AsRef<Path>) -> Result<Self> {
        let main = read_table::<Self>(root.as_ref(), ConfigKind::Main)?;
        let overlay = read_table::<Self>(overlay.as_ref(), ConfigKind::Overlay)?;

        from_table::<Self>(overlay_table(main, overlay))
    }

    /// Like [`Config::load_with_overlay`], but a missing overlay file falls back to the main
    /// config.
    fn load_with_optional_overlay(
        root: impl AsRef<Path>,
        overlay: impl AsRef<Path>,
    ) -> Result<Self> {
        match Self::load_with_overlay(root.as_ref(), overlay) {
            Err(Error::Load {
                name,
                path,
                kind: ConfigKind::Overlay,
                ..
            }) => {
                tracing::debug!("`{name}`: no overlay at `{}`", path.display());
                Self::load(root)
            }
            result => result,
        }
    }
}

/// Merge `overlay` into `main`.
///
/// Tables are merged recursively, any other value in `overlay` replaces the value in `main`.
/// Keys that only exist in `overlay` are added.
#[must_use]
pub fn overlay_table(mut main: Table, overlay: Table) -> Table {
    for (key, value) in overlay {
        let merged = match (main.remove(&key), value) {
            (Some(toml::Value::Table(main_table)), toml::Value::Table(overlay_table_value)) => {
                toml::Value::Table(overlay_table(main_table, overlay_table_value))
            }
            (_, value) => value,
        };
        main.insert(key, merged);
    }

    main
}

fn read_table<T: Config>(dir: &Path, kind: ConfigKind) -> Result<Table> {
    let path = dir.join(T::PATH);
    let contents = fs::read_to_string(&path).map_err(|source| Error::Load {
        name: T::PATH,
        path: path.clone(),
        kind,
        source,
    })?;

    contents.parse::<Table>().map_err(|source| Error::Parse {
        name: T::PATH,
        path,
        source,
    })
}

fn from_table<T: Config>(table: Table) -> Result<T> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|source| Error::Deserialize {
            name: T::PATH,
            source,
        })
}
