use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use ctpn::{CtpnTargets, Diagnostics};

use super::{ConfigOpts, parse_grid};
use crate::error::Result;
use crate::ground_truth::{self, ImageGroundTruth};

/// Assign training targets and print the diagnostics of every image.
#[derive(Parser)]
#[clap(name = "assign")]
pub struct Assign {
    #[clap(flatten)]
    pub config: ConfigOpts,

    /// Feature map shape as HEIGHTxWIDTH
    #[clap(short, long, value_parser = parse_grid)]
    pub grid: (usize, usize),

    /// JSON file with the ground truth of every image
    #[clap(long)]
    pub ground_truth: Option<PathBuf>,

    /// Number of images without ground truth, used when no ground truth file is given
    #[clap(short, long, default_value_t = 1)]
    pub batch_size: usize,

    /// Sampling seed [default: `target.seed` in `ctpn.toml`, or random]
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Print the diagnostics as JSON
    #[clap(long)]
    pub json: bool,
}

impl Assign {
    pub fn assign(self) -> Result<()> {
        let mut config = self.config.load()?;
        if self.seed.is_some() {
            config.target.seed = self.seed;
        }

        let images = match &self.ground_truth {
            Some(path) => ground_truth::load(path)?,
            None => vec![ImageGroundTruth::default(); self.batch_size],
        };
        let (gt_boxes, gt_class_ids) = ground_truth::to_batch(&images, config.target.max_gt_num)?;

        let pipeline = CtpnTargets::new(&config)?;
        let targets = pipeline.build(self.grid, gt_boxes.view(), gt_class_ids.view())?;

        if self.json {
            let diagnostics: Vec<_> = targets
                .targets
                .images
                .iter()
                .map(|image| diagnostics_json(&image.diagnostics))
                .collect();
            println!("{}", serde_json::Value::Array(diagnostics));
            return Ok(());
        }

        println!(
            "{} {} anchors per image, {} rows sampled",
            "Targets".bold(),
            targets.anchors.indices.ncols(),
            config.target.train_anchors_num
        );
        for (index, image) in targets.targets.images.iter().enumerate() {
            print_diagnostics(index, &image.diagnostics);
        }

        Ok(())
    }
}

fn diagnostics_json(diagnostics: &Diagnostics) -> serde_json::Value {
    serde_json::json!({
        "gt_count": diagnostics.gt_count,
        "positive_count": diagnostics.positive_count,
        "negative_count": diagnostics.negative_count,
        "min_matched_iou": diagnostics.min_matched_iou,
        "mean_matched_iou": diagnostics.mean_matched_iou,
    })
}

fn print_diagnostics(index: usize, diagnostics: &Diagnostics) {
    let positives = if diagnostics.positive_count == 0 && diagnostics.gt_count > 0 {
        diagnostics.positive_count.to_string().red()
    } else {
        diagnostics.positive_count.to_string().green()
    };

    println!(
        "  image {index:>3}: {} gt, {positives} positive, {} negative, IoU min {:.3} mean {:.3}",
        diagnostics.gt_count,
        diagnostics.negative_count,
        diagnostics.min_matched_iou,
        diagnostics.mean_matched_iou,
    );
}
