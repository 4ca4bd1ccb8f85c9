//! chapterbook – command-line book generator.
//!
//! Usage:
//!   chapterbook <records-dir> --chapters 1,112 [-o out/] [--title "My Book"]
//!   chapterbook --demo
//!
//! `<records-dir>` holds one provider record per chapter named `<id>.json`.
//! Without `--chapters` every record in the directory is used.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use chapterbook::assembler::AssemblyConfig;
use chapterbook::content::{CoverOptions, SectionData};
use chapterbook::error::InputError;
use chapterbook::fonts::FontBook;
use chapterbook::pipeline::{DirectorySink, Pipeline};
use chapterbook::provider::{fetch_sections, DirectoryProvider};
use chapterbook::raster::{HtmlRasterizer, RasterOptions};
use chapterbook::samples::demo_sections;

#[derive(Parser)]
#[command(name = "chapterbook")]
#[command(version)]
#[command(about = "Paginate selected chapters into a PDF book", long_about = None)]
struct Cli {
    /// Directory of `<id>.json` chapter records
    #[arg(value_name = "DIR", required_unless_present = "demo")]
    records: Option<PathBuf>,

    /// Chapter ids to include, in order (default: all in DIR)
    #[arg(short, long, value_delimiter = ',')]
    chapters: Vec<u32>,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output: PathBuf,

    /// Cover title
    #[arg(long)]
    title: Option<String>,

    /// Cover subtitle
    #[arg(long)]
    subtitle: Option<String>,

    /// Leave the generation date off the cover
    #[arg(long)]
    no_date: bool,

    /// Leave the chapter/verse counts off the cover
    #[arg(long)]
    no_stats: bool,

    /// TTF/OTF font used for all text (placeholder bars without one)
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,

    /// Raster resolution multiplier (sharper images, same layout)
    #[arg(long, default_value = "1.0")]
    scale: f32,

    /// Also write the page layout as JSON
    #[arg(long, value_name = "FILE")]
    layout_json: Option<PathBuf>,

    /// Use the built-in sample chapters instead of DIR
    #[arg(long)]
    demo: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let sections = load_sections(&cli)?;

    let defaults = CoverOptions::default();
    let cover = CoverOptions {
        title: cli.title.clone().unwrap_or(defaults.title),
        subtitle: cli.subtitle.clone().unwrap_or(defaults.subtitle),
        include_date: !cli.no_date,
        include_stats: !cli.no_stats,
    };

    let fonts = match &cli.font {
        Some(path) => FontBook::from_bytes(fs::read(path)?)?,
        None => FontBook::heuristic(),
    };
    let options = RasterOptions {
        scale: cli.scale,
        ..RasterOptions::default()
    };
    let mut rasterizer = HtmlRasterizer::new(fonts, options);
    let mut sink = DirectorySink::new(&cli.output);

    let document = Pipeline::new(AssemblyConfig::default()).run(&sections, &cover, &mut rasterizer, &mut sink)?;

    if let Some(path) = &cli.layout_json {
        write_layout(path, &document.layout().to_json()?)?;
    }

    let pages = document.page_count();
    for path in sink.written() {
        eprintln!(
            "Wrote '{}' ({} page{})",
            path.display(),
            pages,
            if pages == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

fn load_sections(cli: &Cli) -> Result<Vec<SectionData>, InputError> {
    if cli.demo {
        return demo_sections();
    }
    let dir = cli.records.clone().ok_or(InputError::NoSectionsSelected)?;
    let provider = DirectoryProvider::new(dir);
    let ids = if cli.chapters.is_empty() {
        provider.available_ids()?
    } else {
        cli.chapters.clone()
    };
    fetch_sections(&provider, &ids)
}

fn write_layout(path: &Path, json: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, json)
}
