use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use scenegen::generate::generate_dataset;
use scenegen::output::OutputLayout;
use scenegen::renderer::SoftwareRenderer;
use scenegen::types::{GenerationParams, PropertyCatalog};

/// Generate constrained synthetic scenes and their change-tracking
/// ground truth.
#[derive(Debug, Parser)]
#[command(name = "scenegen", version, about)]
struct CliArgs {
    /// JSON property catalog (colors, materials, shapes, sizes).
    #[arg(long, value_name = "FILE", default_value = "data/properties.json")]
    properties_json: PathBuf,

    /// Output root; images, per-scene files, and aggregates go under it.
    #[arg(long, value_name = "DIR", default_value = "output")]
    output_dir: PathBuf,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, default_value_t = 5)]
    num_images: usize,

    /// Index of the first generated image.
    #[arg(long, default_value_t = 0)]
    start_idx: usize,

    #[arg(long, default_value_t = 3)]
    min_objects: u32,

    #[arg(long, default_value_t = 10)]
    max_objects: u32,

    /// Minimum surface-to-surface distance between objects.
    #[arg(long, default_value_t = 0.25)]
    min_dist: f64,

    /// Minimum axial projection of any pair offset (rejects ambiguous
    /// near-alignments).
    #[arg(long, default_value_t = 0.4)]
    margin: f64,

    /// Minimum visible pixels per object.
    #[arg(long, default_value_t = 200)]
    min_pixels_per_object: u64,

    /// Placement attempts per object before a whole-scene restart.
    #[arg(long, default_value_t = 50)]
    max_retries: u32,

    /// Whole-scene restarts before composition fails.
    #[arg(long, default_value_t = 1000)]
    max_restarts: u32,

    /// Also generate a mutated sibling scene and change records.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    action: bool,

    #[arg(long, default_value = "new")]
    split: String,

    #[arg(long, default_value = "cor")]
    action_split: String,

    #[arg(long, default_value = "cb")]
    combined_split: String,

    #[arg(long, default_value = "CLEVR")]
    filename_prefix: String,

    #[arg(long, default_value = "png")]
    image_ext: String,

    #[arg(long, default_value_t = 320)]
    width: usize,

    #[arg(long, default_value_t = 240)]
    height: usize,

    #[arg(long, default_value = "1.0")]
    version_string: String,

    #[arg(long, default_value = "Creative Commons Attribution (CC-BY 4.0)")]
    license: String,

    /// Dataset date stamp (MM/DD/YYYY); defaults to today.
    #[arg(long)]
    date: Option<String>,
}

impl CliArgs {
    fn into_params(self) -> (GenerationParams, PathBuf, PathBuf, usize, usize) {
        let mut params = GenerationParams::with_seed(self.seed);
        params.num_images = self.num_images;
        params.start_idx = self.start_idx;
        params.min_objects = self.min_objects;
        params.max_objects = self.max_objects;
        params.min_dist = self.min_dist;
        params.margin = self.margin;
        params.min_pixels_per_object = self.min_pixels_per_object;
        params.max_retries = self.max_retries;
        params.max_restarts = self.max_restarts;
        params.action = self.action;
        params.split = self.split;
        params.action_split = self.action_split;
        params.combined_split = self.combined_split;
        params.filename_prefix = self.filename_prefix;
        params.image_ext = self.image_ext;
        params.version = self.version_string;
        params.license = self.license;
        params.date = self.date;
        (
            params,
            self.properties_json,
            self.output_dir,
            self.width,
            self.height,
        )
    }
}

fn run(args: CliArgs) -> Result<(), scenegen::error::SceneGenError> {
    let (params, properties, output_dir, width, height) = args.into_params();
    let catalog = PropertyCatalog::from_path(&properties)?;
    let layout = OutputLayout::under_root(&output_dir);
    let mut renderer = SoftwareRenderer::new(width, height, params.seed);
    let summary = generate_dataset(&catalog, &params, &mut renderer, &layout)?;
    log::info!(
        "done: {} scenes, {} changed / {} unchanged mutations",
        summary.scenes,
        summary.counts.size_changed + summary.counts.color_changed + summary.counts.mat_changed,
        summary.counts.size_unchanged
            + summary.counts.color_unchanged
            + summary.counts.mat_unchanged,
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = CliArgs::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
