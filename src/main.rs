mod config;
mod error;
mod layout;
mod pdf;
mod roster;
mod sheet;
mod source;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use config::{load_settings_config, SourceSpec};
use roster::build_roster;
use sheet::{SheetAssets, SheetRenderer};
use source::open_source;

/// Generate paginated admission sheets from the student roster.
#[derive(Parser, Debug)]
#[command(name = "admission_sheet")]
#[command(about = "Generate paginated admission sheet PDFs from the student roster.", long_about = None)]
struct Args {
    /// Directory containing settings.json and the sheet assets.
    /// Relative paths in the settings resolve against it.
    #[arg(short, long, default_value = ".")]
    target_dir: PathBuf,

    /// Student data to read instead of the configured source:
    /// a .csv export or an SQLite database. A relative path resolves
    /// against the target directory.
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Directory the sheets are written to (default: generated/).
    /// A relative path resolves against the target directory.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

fn run(args: Args) -> Result<()> {
    let target_dir = args.target_dir;
    if !target_dir.is_dir() {
        return Err(anyhow!("Target directory not found: {:?}", target_dir));
    }

    let mut config = load_settings_config(&target_dir.join("settings.json"))
        .context("Failed to load settings")?;
    if let Some(data) = args.data {
        config.source = SourceSpec::from_path(data);
    }
    if let Some(output_dir) = args.output_dir {
        config.output.dir = output_dir;
    }

    let source = open_source(&config.source, &target_dir);
    log::info!("Loading students from {}", source.describe());
    let records = source.fetch_students().context("Error fetching students")?;

    let roster = build_roster(records);
    if roster.is_empty() {
        log::info!("No students found for admission.");
        return Ok(());
    }
    log::info!("Found {} students for admission.", roster.len());

    let assets = SheetAssets::load(&config, &target_dir).context("Failed to load sheet assets")?;
    let renderer = SheetRenderer::new(&config, &assets.fonts, assets.resources());

    let out_dir = target_dir.join(&config.output.dir);
    let written = renderer
        .write_sheets(&roster, &out_dir)
        .context("Failed to generate admission sheets")?;
    log::info!("Wrote {} admission sheets to {:?}", written.len(), out_dir);

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        log::error!("{}", e);
        for cause in e.chain().skip(1) {
            log::error!("Caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
