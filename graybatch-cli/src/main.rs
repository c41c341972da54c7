use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use std::path::PathBuf;

use graybatch::{Backend, BatchConfig, ImageFormat, OutputNaming, PngCompression};

#[derive(Parser)]
#[command(name = "graybatch")]
#[command(about = "Convert every image in a directory to grayscale", long_about = None)]
#[command(version)]
struct Args {
    /// Directory to read images from [default: ISIC_2020_Test_Input]
    #[arg(value_name = "INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Directory to write grayscale images to [default: ISIC_2020_Test_Output]
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Conversion backend
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,

    /// Output image format
    #[arg(long, value_enum)]
    image_format: Option<ImageFormatArg>,

    /// JPEG/WebP quality (0-100) [default: 90]
    #[arg(long, value_name = "QUALITY")]
    quality: Option<u8>,

    /// PNG compression level [default: default]
    #[arg(long, value_enum)]
    png_compression: Option<PngCompressionArg>,

    /// Replace the input extension with the output format's extension
    #[arg(long, default_value_t)]
    replace_extension: bool,

    /// JSON config file [default: ~/.config/graybatch/config.json if present]
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Store the resulting settings as the per-user default config
    #[arg(long, default_value_t)]
    save_config: bool,

    /// Write a JSON report of every file's outcome
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Number of CPU threads, defaults to the number of logical CPUs
    #[arg(short, long)]
    threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, default_value_t)]
    verbose: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, default_value_t)]
    quiet: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Auto,
    Gpu,
    Cpu,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => Backend::Auto,
            BackendArg::Gpu => Backend::Gpu,
            BackendArg::Cpu => Backend::Cpu,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ImageFormatArg {
    Png,
    Jpeg,
    Webp,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PngCompressionArg {
    Fast,
    Default,
    Best,
}

impl From<PngCompressionArg> for PngCompression {
    fn from(arg: PngCompressionArg) -> Self {
        match arg {
            PngCompressionArg::Fast => PngCompression::Fast,
            PngCompressionArg::Default => PngCompression::Default,
            PngCompressionArg::Best => PngCompression::Best,
        }
    }
}

const DEFAULT_QUALITY: u8 = 90;

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(args.verbose, args.quiet);

    if let Some(threads) = args.threads {
        if threads == 0 {
            anyhow::bail!("--threads must be at least 1");
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let config = build_config(&args)?;
    log::debug!("Config: {config:?}");

    if args.save_config && config.save().is_none() {
        log::warn!("Failed to save config");
    }

    let report = graybatch::batch::run(&config)?;

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        log::info!("Report written to {}", path.display());
    }

    // individual failures were logged; they never change the exit status
    Ok(())
}

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn build_config(args: &Args) -> Result<BatchConfig> {
    // Validate quality
    if args.quality.is_some_and(|q| q > 100) {
        anyhow::bail!("Quality must be between 0 and 100");
    }

    let mut config = match &args.config {
        Some(path) => BatchConfig::load_from(path)?,
        None => BatchConfig::load().unwrap_or_default(),
    };

    if let Some(dir) = &args.input_dir {
        config.input_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(backend) = args.backend {
        config.backend = backend.into();
    }
    config.image_format = image_format(args, config.image_format);
    if args.replace_extension {
        config.naming = OutputNaming::ReplaceExtension;
    }

    Ok(config)
}

/// The output format after `--image-format`, `--quality` and
/// `--png-compression`.
///
/// Without `--image-format` the flags tune the format the config already
/// selected.
fn image_format(args: &Args, current: ImageFormat) -> ImageFormat {
    let quality = args.quality;
    let compression = args.png_compression.map(PngCompression::from);

    let format = match args.image_format {
        Some(ImageFormatArg::Png) => ImageFormat::Png {
            compression: compression.unwrap_or(PngCompression::Default),
        },
        Some(ImageFormatArg::Jpeg) => ImageFormat::Jpeg {
            quality: quality.unwrap_or(DEFAULT_QUALITY),
        },
        Some(ImageFormatArg::Webp) => ImageFormat::WebP {
            quality: quality.unwrap_or(DEFAULT_QUALITY),
        },
        None => match current {
            ImageFormat::Png { compression: c } => ImageFormat::Png {
                compression: compression.unwrap_or(c),
            },
            ImageFormat::Jpeg { quality: q } => ImageFormat::Jpeg {
                quality: quality.unwrap_or(q),
            },
            ImageFormat::WebP { quality: q } => ImageFormat::WebP {
                quality: quality.unwrap_or(q),
            },
        },
    };

    match format {
        ImageFormat::Png { .. } if quality.is_some() => {
            log::warn!("--quality has no effect on PNG output");
        }
        ImageFormat::Jpeg { .. } | ImageFormat::WebP { .. } if compression.is_some() => {
            log::warn!("--png-compression has no effect on {} output", format.extension());
        }
        _ => {}
    }

    format
}
