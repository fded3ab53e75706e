use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use visionblocks::catalog::{Catalog, SampleMode};
use visionblocks::config::{self, Settings};
use visionblocks::export::{self, ExportOptions, ExportRequest, SubsetMode, SubsetSpec};
use visionblocks::imaging::{
    FormatFamily, ImageBackend, RustBackend, UnknownOps, filters, parse_operations, pipeline,
};
use visionblocks::output;

#[derive(Parser)]
#[command(name = "visionblocks")]
#[command(about = "Browse labeled image datasets and run preprocessing pipelines over them")]
#[command(long_about = "\
Browse labeled image datasets and run preprocessing pipelines over them

Each folder under the datasets root is one dataset:

  data/datasets/
  ├── recyclables-mini/
  │   ├── metadata.json        # Optional: name, description, classes, image_shape
  │   ├── index.csv            # Optional: id,path,class,split rows
  │   └── images/
  │       ├── glass/001.jpg    # Without index.csv, the folder name is the class
  │       └── plastic/009.png
  └── demo/                    # Written by `export`

A pipeline is a JSON array of operations applied in order, e.g.

  [{\"type\": \"resize\", \"mode\": \"fit\", \"maxside\": 256},
   {\"type\": \"edges\", \"method\": \"canny\", \"threshold\": 80, \"overlay\": true}]

Run 'visionblocks gen-config' to generate a documented visionblocks.toml.")]
#[command(version)]
struct Cli {
    /// Settings file
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Datasets root (overrides `datasets_dir` from the settings file)
    #[arg(long, global = true)]
    datasets_dir: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every dataset under the datasets root
    List,
    /// Show metadata, classes and per-class counts of one dataset
    Info { key: String },
    /// Draw one sample row
    Sample {
        key: String,
        #[arg(long, value_enum, default_value_t = SampleArg::Random)]
        mode: SampleArg,
        /// Row index for `--mode index` (clamped into range)
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(long)]
        seed: Option<u64>,
        /// Write a PNG preview of the sampled image
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run a pipeline over one image
    Apply {
        key: String,
        /// Image path relative to the dataset folder, e.g. images/glass/001.jpg
        path: String,
        /// JSON file holding the operation list
        #[arg(long)]
        ops: PathBuf,
        /// Write a PNG preview of the result
        #[arg(long)]
        out: Option<PathBuf>,
        /// Fail on unrecognized operations
        #[arg(long)]
        strict: bool,
    },
    /// Run a pipeline over a subset of a dataset and save it as a new dataset
    Export {
        key: String,
        /// Name of the new dataset (sanitized into its key)
        #[arg(long)]
        name: String,
        #[arg(long, value_enum, default_value_t = SubsetArg::All)]
        subset: SubsetArg,
        /// Subset size for firstN / randomN
        #[arg(long, default_value_t = 1)]
        n: usize,
        /// Shuffle the selected rows
        #[arg(long)]
        shuffle: bool,
        #[arg(long)]
        seed: Option<u64>,
        /// JSON file holding the operation list
        #[arg(long)]
        ops: PathBuf,
        /// Replace an existing dataset with the same key
        #[arg(long)]
        overwrite: bool,
    },
    /// Print a stock visionblocks.toml with all options documented
    GenConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum SampleArg {
    Random,
    Index,
}

#[derive(Clone, Copy, ValueEnum)]
enum SubsetArg {
    #[value(name = "all")]
    All,
    #[value(name = "firstN")]
    FirstN,
    #[value(name = "randomN")]
    RandomN,
}

impl From<SubsetArg> for SubsetMode {
    fn from(arg: SubsetArg) -> Self {
        match arg {
            SubsetArg::All => SubsetMode::All,
            SubsetArg::FirstN => SubsetMode::FirstN,
            SubsetArg::RandomN => SubsetMode::RandomN,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut settings = config::load(&cli.config)?;
    if let Some(dir) = &cli.datasets_dir {
        settings.datasets_dir = dir.clone();
    }
    let catalog = Catalog::new(&settings.datasets_dir);
    let backend = RustBackend::new();

    match cli.command {
        Command::List => {
            output::print_dataset_list(&catalog.list(), catalog.root());
        }
        Command::Info { key } => {
            output::print_dataset_info(&catalog.info(&key)?);
        }
        Command::Sample {
            key,
            mode,
            index,
            seed,
            out,
        } => {
            let mode = match mode {
                SampleArg::Random => SampleMode::Random,
                SampleArg::Index => SampleMode::Index(index),
            };
            let sample = catalog.sample_row(&key, mode, &mut make_rng(seed))?;
            if let Some(out) = &out {
                let (img, _) = catalog.load_image(&backend, &key, &sample.path)?;
                write_preview(&backend, &img, out, &settings)?;
            }
            output::print_sample(&sample, out.as_deref());
        }
        Command::Apply {
            key,
            path,
            ops,
            out,
            strict,
        } => {
            let ops = parse_operations(&std::fs::read_to_string(&ops)?)?;
            let policy = if strict {
                UnknownOps::Reject
            } else {
                settings.pipeline.unknown_ops
            };
            let (img, _) = catalog.load_image(&backend, &key, &path)?;
            let outcome = pipeline::apply_with(&img, &ops, policy)?;
            if let Some(out) = &out {
                write_preview(&backend, &outcome.image, out, &settings)?;
            }
            output::print_apply_result(
                &path,
                outcome.image.dimensions(),
                &outcome.skipped,
                out.as_deref(),
            );
        }
        Command::Export {
            key,
            name,
            subset,
            n,
            shuffle,
            seed,
            ops,
            overwrite,
        } => {
            init_thread_pool(&settings.export);
            let ops = parse_operations(&std::fs::read_to_string(&ops)?)?;
            let subset = SubsetSpec {
                mode: subset.into(),
                n,
                shuffle,
            };
            let paths = subset.select(&catalog.row_paths(&key)?, &mut make_rng(seed));
            let request = ExportRequest {
                base_dataset: key,
                paths,
                ops,
                new_name: name,
                overwrite,
            };
            let options = ExportOptions {
                jpeg_quality: settings.export.quality(),
                default_key: settings.export.default_key.clone(),
                unknown_ops: settings.pipeline.unknown_ops,
            };

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_export_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let summary = export::export_subset(&catalog, &request, &options, Some(tx))?;
            if printer.join().is_err() {
                warn!("progress printer panicked");
            }
            output::print_export_summary(&summary);
        }
        // Printed before settings are loaded.
        Command::GenConfig => {}
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on export config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(export: &config::ExportConfig) {
    let threads = config::effective_threads(export);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Downscale to the configured preview size and write as PNG.
fn write_preview(
    backend: &RustBackend,
    img: &image::RgbImage,
    out: &Path,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let preview = filters::preview(img, settings.preview.max_side);
    backend.save(&preview, out, FormatFamily::Png, settings.export.quality())?;
    Ok(())
}
