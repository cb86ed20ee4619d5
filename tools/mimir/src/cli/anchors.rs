use clap::Parser;
use colored::Colorize;
use ctpn::AnchorGenerator;

use super::{ConfigOpts, parse_grid};
use crate::error::Result;

/// Show the base anchors and the anchors that fit a feature map.
#[derive(Parser)]
#[clap(name = "anchors")]
pub struct Anchors {
    #[clap(flatten)]
    pub config: ConfigOpts,

    /// Feature map shape as HEIGHTxWIDTH
    #[clap(short, long, value_parser = parse_grid)]
    pub grid: (usize, usize),
}

impl Anchors {
    pub fn anchors(self) -> Result<()> {
        let config = self.config.load()?;
        let generator = AnchorGenerator::new(config.anchor.clone())?;

        println!("{}", "Base anchors".bold());
        for (height, anchor) in config.anchor.heights.iter().zip(generator.base_anchors().rows()) {
            println!(
                "  {:>7.1}  [{:>8.1}, {:>6.1}, {:>8.1}, {:>6.1}]",
                height, anchor[0], anchor[1], anchor[2], anchor[3]
            );
        }

        let (grid_height, grid_width) = self.grid;
        let (image_height, image_width) = ctpn::anchor::image_size(self.grid, config.anchor.stride);
        let anchors = generator.generate(self.grid)?;

        println!();
        println!(
            "{} {grid_height}x{grid_width} cells, {image_height}x{image_width} pixels",
            "Grid".bold()
        );
        println!(
            "  {} of {} anchors inside the image ({:.1}%)",
            anchors.len().to_string().green(),
            anchors.total,
            100.0 * anchors.len() as f32 / anchors.total as f32
        );

        Ok(())
    }
}
