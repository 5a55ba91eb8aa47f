use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pagemark_core::{document_geometry, export_selection, sidecar, AnnotationStore};
use pagemark_engine::{default_engine, OpenSource, PdfEngine};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "pagemark")]
#[command(about = "Select, annotate, and export PDF pages")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Export selected pages with their annotations to a new PDF.
    ///
    /// Pages are 1-based and written in the order given. Annotations come
    /// from the sidecar next to the input (`<FILE>.json`) when one exists;
    /// a fresh sidecar is written next to the output.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Pages to export, e.g. `--pages 3,1`.
        #[arg(long, value_delimiter = ',', required = true)]
        pages: Vec<u32>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    width: f32,
    height: f32,
    rotation: u16,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Export { file, pages, output } => run_export(&file, &pages, &output),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let geometry = document_geometry(&engine, handle)?;
    let pages = geometry
        .iter()
        .map(|geom| PageOutput {
            width: geom.size.width_pt,
            height: geom.size.height_pt,
            rotation: geom.rotation.degrees(),
        })
        .collect();

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count: geometry.len() as u32,
        pages,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_export(file: &Path, pages: &[u32], output: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    if pages.iter().any(|&page| page == 0) {
        anyhow::bail!("--pages is 1-based; page numbers must be >= 1");
    }
    let selection: Vec<u32> = pages.iter().map(|page| page - 1).collect();

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;
    let geometry = document_geometry(&engine, handle)?;

    let store = match sidecar::load(&sidecar::sidecar_path(file))
        .context("failed to load annotation sidecar")?
    {
        Some(record) => {
            log::info!("hydrating annotations from {}", sidecar::sidecar_path(file).display());
            sidecar::hydrate_store(&record, &geometry)
                .context("failed to hydrate annotation sidecar")?
        }
        None => AnnotationStore::new(geometry.len()),
    };

    let summary = export_selection(&mut engine, handle, &geometry, &store, &selection, output)
        .context("export failed")?;

    println!(
        "wrote {} pages ({} markups, {} text runs) to {}",
        summary.pages_written,
        summary.rect_markups,
        summary.text_runs,
        output.display()
    );
    println!("sidecar: {}", summary.sidecar_path.display());

    engine.close(handle)?;

    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
