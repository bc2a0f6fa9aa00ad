//! Command-line front end for stamp-core
//!
//! Reads a PDF plus stamps (or a recorded command session), runs the export
//! off the async runtime, and writes the stamped copy next to the input
//! unless told otherwise. Reports go to stdout as JSON, logs to stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use stamp_core::{
    output_filename, AppState, ExportMetrics, ExportOptions, PageGeometry, PageImage, Rasterizer,
    ScaledPageRasterizer, StampCollection, StampCommand, StampConfig,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "stamp-cli")]
#[command(version, about = "Place signatures, text, dates and checkmarks on PDF pages")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Render scale (pixels per point), overrides the configuration
    #[arg(long, global = true)]
    pub scale: Option<f64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print page geometry and the page image sizes stamps are placed against
    Info {
        pdf: PathBuf,
    },
    /// Draw a saved stamp collection into the document
    Export {
        pdf: PathBuf,
        /// Stamp collection as JSON
        #[arg(long)]
        stamps: PathBuf,
        /// Page images as JSON; rendered from the PDF when omitted
        #[arg(long)]
        pages: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replay a recorded command session, then export the result
    Replay {
        pdf: PathBuf,
        /// JSON array of commands
        #[arg(long)]
        commands: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoReport {
    pub name: String,
    pub page_count: usize,
    pub render_scale: f64,
    pub pages: Vec<PageGeometry>,
    pub page_images: Vec<PageImage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub output: PathBuf,
    pub metrics: ExportMetrics,
}

/// Load the configuration file (if any) and apply command-line overrides
pub fn load_config(path: Option<&Path>, scale: Option<f64>) -> Result<StampConfig> {
    let mut config = match path {
        Some(path) => StampConfig::from_file(path)?,
        None => StampConfig::default(),
    };
    if let Some(scale) = scale {
        anyhow::ensure!(
            scale.is_finite() && scale > 0.0,
            "--scale must be a positive number, got {}",
            scale
        );
        config.render.scale = scale;
    }
    Ok(config)
}

/// Run a parsed command line, printing its JSON report to stdout
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref(), cli.scale)?;
    let report = match cli.command {
        Command::Info { pdf } => serde_json::to_string_pretty(&info(&pdf, &config).await?)?,
        Command::Export {
            pdf,
            stamps,
            pages,
            output,
        } => serde_json::to_string_pretty(
            &export(&pdf, &stamps, pages.as_deref(), output, &config).await?,
        )?,
        Command::Replay {
            pdf,
            commands,
            output,
        } => serde_json::to_string_pretty(&replay(&pdf, &commands, output, &config).await?)?,
    };
    println!("{}", report);
    Ok(())
}

pub async fn info(pdf: &Path, config: &StampConfig) -> Result<InfoReport> {
    let bytes = read_pdf(pdf).await?;
    let rasterizer = ScaledPageRasterizer::new(config.render.scale);

    let (pages, page_images) = tokio::task::spawn_blocking(move || {
        let doc = lopdf_document(&bytes)?;
        let pages = PageGeometry::all_from_document(&doc)?;
        let page_images = pages.iter().map(|page| rasterizer.page_image(page)).collect();
        Ok::<_, anyhow::Error>((pages, page_images))
    })
    .await
    .context("Info task panicked")??;

    Ok(InfoReport {
        name: file_name(pdf),
        page_count: pages.len(),
        render_scale: config.render.scale,
        pages,
        page_images,
    })
}

pub async fn export(
    pdf: &Path,
    stamps: &Path,
    pages: Option<&Path>,
    output: Option<PathBuf>,
    config: &StampConfig,
) -> Result<ExportReport> {
    let bytes = read_pdf(pdf).await?;
    let stamps_json = tokio::fs::read_to_string(stamps)
        .await
        .with_context(|| format!("Failed to read stamps: {}", stamps.display()))?;
    let collection = StampCollection::from_json(&stamps_json)
        .with_context(|| format!("Invalid stamps file: {}", stamps.display()))?;

    let page_images = match pages {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read page images: {}", path.display()))?;
            serde_json::from_str::<Vec<PageImage>>(&json)
                .with_context(|| format!("Invalid page images file: {}", path.display()))?
        }
        None => ScaledPageRasterizer::new(config.render.scale)
            .rasterize(&bytes)
            .context("Failed to render pages")?,
    };

    let options = ExportOptions::from(config);
    let exported = tokio::task::spawn_blocking(move || {
        stamp_core::export_pdf(&bytes, &collection, &page_images, &options)
    })
    .await
    .context("Export task panicked")?
    .context("Export failed")?;

    let output = output.unwrap_or_else(|| default_output(pdf, &config.output.suffix));
    write_output(&output, &exported.bytes).await?;

    Ok(ExportReport {
        output,
        metrics: exported.metrics,
    })
}

pub async fn replay(
    pdf: &Path,
    commands: &Path,
    output: Option<PathBuf>,
    config: &StampConfig,
) -> Result<ExportReport> {
    let bytes = read_pdf(pdf).await?;
    let json = tokio::fs::read_to_string(commands)
        .await
        .with_context(|| format!("Failed to read commands: {}", commands.display()))?;
    let commands = StampCommand::list_from_json(&json)
        .with_context(|| format!("Invalid commands file: {}", commands.display()))?;

    let mut state = AppState::new();
    let rasterizer = ScaledPageRasterizer::new(config.render.scale);
    state
        .load_document(file_name(pdf), bytes, &rasterizer)
        .context("Failed to load document")?;

    let total = commands.len();
    for (position, command) in commands.into_iter().enumerate() {
        // A UI ignores actions that no longer apply; so does replay
        if let Err(e) = state.dispatch(command) {
            warn!(position, error = %e, "Command rejected");
        }
    }
    info!(
        commands = total,
        stamps = state.stamps().len(),
        "Session replayed"
    );

    let output = output.unwrap_or_else(|| {
        let name = state
            .output_filename(&config.output.suffix)
            .unwrap_or_else(|| output_filename(&file_name(pdf), &config.output.suffix));
        sibling(pdf, &name)
    });

    let options = ExportOptions::from(config);
    let exported = tokio::task::spawn_blocking(move || state.export(&options))
        .await
        .context("Export task panicked")?
        .context("Export failed")?;

    write_output(&output, &exported.bytes).await?;

    Ok(ExportReport {
        output,
        metrics: exported.metrics,
    })
}

async fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read PDF: {}", path.display()))
}

async fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write output: {}", path.display()))?;
    info!(path = %path.display(), size = bytes.len(), "Wrote stamped PDF");
    Ok(())
}

fn lopdf_document(bytes: &[u8]) -> Result<lopdf::Document> {
    lopdf::Document::load_mem(bytes).context("Failed to parse PDF")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string())
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    match path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// `dir/contract.pdf` becomes `dir/contract<suffix>.pdf`
pub fn default_output(pdf: &Path, suffix: &str) -> PathBuf {
    sibling(pdf, &output_filename(&file_name(pdf), suffix))
}
