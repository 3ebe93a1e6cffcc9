use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use bitpaper::camera::{self, DEFAULT_SEED};
use bitpaper::config::{
    DEFAULT_BLOCK_LEN, DEFAULT_CELL_SIZE, DEFAULT_INTERLEAVE_GROUPS, DEFAULT_MAX_PAGES,
    DEFAULT_PAGE_HEIGHT, DEFAULT_PAGE_WIDTH, DEFAULT_REDUNDANCY,
};
use bitpaper::pipeline::decode::load_raster;
use bitpaper::{pipeline, BitpaperConfig, CameraProfile, Preset};

/// bitpaper: store arbitrary files on paper as printable monochrome cell grids.
#[derive(Parser)]
#[command(name = "bitpaper", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Page and code parameters. The decoder must use the values the encoder used.
#[derive(Args)]
struct PageArgs {
    /// Page width in pixels (default: 2480, A4 at 300 DPI)
    #[arg(long, default_value_t = DEFAULT_PAGE_WIDTH)]
    width: u32,

    /// Page height in pixels (default: 3508)
    #[arg(long, default_value_t = DEFAULT_PAGE_HEIGHT)]
    height: u32,

    /// Cell edge in pixels (default: 6)
    #[arg(long, default_value_t = DEFAULT_CELL_SIZE)]
    cell_size: u32,

    /// Reed-Solomon codeword length (default: 255)
    #[arg(long, default_value_t = DEFAULT_BLOCK_LEN)]
    block_len: usize,

    /// Fraction of each codeword spent on parity (default: 0.15)
    #[arg(long, default_value_t = DEFAULT_REDUNDANCY)]
    redundancy: f64,

    /// Interleave group count (default: 3)
    #[arg(long, default_value_t = DEFAULT_INTERLEAVE_GROUPS)]
    groups: usize,

    /// Maximum number of pages per document (default: 64)
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    max_pages: usize,
}

impl PageArgs {
    fn to_config(&self) -> Result<BitpaperConfig> {
        let cfg = BitpaperConfig {
            page_width: self.width,
            page_height: self.height,
            cell_size: self.cell_size,
            block_len: self.block_len,
            redundancy: self.redundancy,
            interleave_groups: self.groups,
            max_pages: self.max_pages,
        };
        cfg.validate().context("invalid page parameters")?;
        Ok(cfg)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file into PNG pages
    Encode {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Directory to write page-NNN.png files into
        #[arg(short, long)]
        output: PathBuf,

        /// Encrypt the payload with a password
        #[arg(short, long)]
        password: Option<String>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Decode scanned or photographed pages back into the original file
    Decode {
        /// Page images, in any order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file, or a directory to restore the original file name into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Decryption password (required if the payload was encrypted)
        #[arg(short, long)]
        password: Option<String>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Apply a simulated camera capture to a page image
    Simulate {
        /// Input page image
        #[arg(short, long)]
        input: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Capture quality preset
        #[arg(long, value_enum, default_value_t = Preset::Average)]
        preset: Preset,

        /// Random seed for noise and skew
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },

    /// Print how much data fits on one page
    Capacity {
        #[command(flatten)]
        page: PageArgs,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            input,
            output,
            password,
            page,
        } => {
            let cfg = page.to_config()?;
            pipeline::encode::encode_file(&input, &output, password.as_deref(), &cfg)?;
        }

        Commands::Decode {
            inputs,
            output,
            password,
            page,
        } => {
            let cfg = page.to_config()?;
            pipeline::decode::decode_file(&inputs, &output, password.as_deref(), &cfg)?;
        }

        Commands::Simulate {
            input,
            output,
            preset,
            seed,
        } => {
            let profile = CameraProfile::preset(preset).with_seed(seed);
            let raster = load_raster(&input)?;
            info!("simulating '{}' capture of {}", profile.name(), input.display());
            camera::apply(&raster, &profile)
                .into_gray_image()
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
        }

        Commands::Capacity { page } => {
            let cfg = page.to_config()?;
            let layout = cfg.page_layout();
            println!("grid:             {} rows x {} cols", layout.rows, layout.cols);
            println!("data cells:       {}", layout.data_cells);
            println!(
                "codewords:        {} x RS({}, {})",
                layout.blocks,
                cfg.block_len,
                cfg.data_len()
            );
            println!("payload per page: {} bytes", layout.payload_capacity);
            println!(
                "max document:     {} bytes over {} pages",
                layout.payload_capacity * cfg.max_pages,
                cfg.max_pages
            );
        }
    }

    Ok(())
}
