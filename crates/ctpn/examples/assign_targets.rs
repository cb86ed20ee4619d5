use ctpn::padding::pad_ground_truth;
use ctpn::{CtpnConfig, CtpnTargets, SampleTag};
use ndarray::{Axis, s};

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt::init();

    let mut config = CtpnConfig::default();
    config.target.seed = Some(0);
    let pipeline = CtpnTargets::new(&config)?;

    // a text line split into 16 pixel wide slices
    let line: Vec<[f32; 4]> = (4..12)
        .map(|col| {
            let x = col as f32 * 16.0;
            [96.0, x, 128.0, x + 16.0]
        })
        .collect();
    let (boxes, classes) = pad_ground_truth(&line, &vec![1; line.len()], config.target.max_gt_num)?;

    let grid = (16, 24);
    let targets = pipeline.build(
        grid,
        boxes.insert_axis(Axis(0)).view(),
        classes.insert_axis(Axis(0)).view(),
    )?;
    let image = &targets.targets.images[0];

    println!("{:?}", image.diagnostics);

    let grid_anchors = ctpn::anchor::tile_anchors(
        grid,
        config.anchor.stride,
        pipeline.generator().base_anchors(),
    )?;
    let positives: Vec<usize> = image.indices_with(SampleTag::Positive).collect();
    let decoded = pipeline.assigner().box_coder().decode_single(
        image.deltas.slice(s![..positives.len(), ..]),
        grid_anchors.select(Axis(0), &positives).view(),
        true,
    )?;

    for (anchor, decoded) in positives.iter().zip(decoded.rows()) {
        println!("anchor {anchor:>5}: {decoded}");
    }

    Ok(())
}
