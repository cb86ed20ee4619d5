use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ctpn::CtpnConfig;
use odal::Config;

use crate::error::{Error, Result};

pub mod anchors;
pub mod assign;

/// `mimir` - Inspect CTPN anchors and training targets
///
/// Loads a `ctpn.toml` configuration and shows what the anchor generator and target assigner
/// produce for a feature map, without running a model.
///
/// # Anchors
/// To show the base anchors and how many anchors fit a 38x50 feature map:
/// ```sh
/// mimir anchors --grid 38x50
/// ```
///
/// # Targets
/// To assign targets for the ground truth in a JSON file:
/// ```sh
/// mimir assign --grid 38x50 --ground-truth gt.json --seed 7
/// ```
#[derive(Parser)]
#[clap(name = "mimir", version)]
pub struct Cli {
    #[clap(subcommand)]
    pub action: Commands,
}

/// All possible commands for the cli, used for clap derive macros.
#[derive(Subcommand)]
pub enum Commands {
    Anchors(anchors::Anchors),
    Assign(assign::Assign),
}

/// Where to find the configuration.
#[derive(Clone, Debug, Args)]
pub struct ConfigOpts {
    /// Directory containing `ctpn.toml`
    #[clap(short, long, default_value = "config")]
    pub config: PathBuf,

    /// Directory with a `ctpn.toml` whose keys override the main config
    #[clap(short, long)]
    pub overlay: Option<PathBuf>,
}

impl ConfigOpts {
    pub fn load(&self) -> Result<CtpnConfig> {
        let config = match &self.overlay {
            Some(overlay) => CtpnConfig::load_with_optional_overlay(&self.config, overlay)?,
            None => CtpnConfig::load(&self.config)?,
        };
        config.validate()?;

        tracing::debug!(?config, "loaded config");
        Ok(config)
    }
}

/// Parse a grid shape given as `HEIGHTxWIDTH`.
pub fn parse_grid(value: &str) -> Result<(usize, usize)> {
    let invalid = || Error::Grid(value.to_string());

    let (height, width) = value.split_once(['x', 'X']).ok_or_else(invalid)?;
    let height = height.trim().parse().map_err(|_| invalid())?;
    let width = width.trim().parse().map_err(|_| invalid())?;

    if height == 0 || width == 0 {
        return Err(invalid());
    }

    Ok((height, width))
}
