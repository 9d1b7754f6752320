//! mdexport - Main Entry Point
//!
//! Renders a Markdown file into its preview page and exports it as PDF,
//! DOCX or HTML.

use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use mdexport::config::{load_config, save_config_silent, PageSize, Settings, Theme};
use mdexport::export::{DirectorySink, ExportFormat, Exporter, LocalFetcher};
use mdexport::markdown::{load_html_page, render_preview, Preview};
use mdexport::Error;

/// Application name constant.
const APP_NAME: &str = "mdexport";

#[derive(Debug, Parser)]
#[command(name = APP_NAME, version, about = "Export Markdown to PDF, DOCX or HTML")]
struct Cli {
    /// Markdown file to export (.html/.htm pages are used as-is)
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = FormatArg::Pdf)]
    format: FormatArg,

    /// Output directory (defaults to the configured directory)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Base file name (defaults to the input file name)
    #[arg(short, long)]
    name: Option<String>,

    /// Theme to render the preview in before exporting
    #[arg(long, value_enum)]
    theme: Option<ThemeArg>,

    /// Paper size for PDF and DOCX
    #[arg(long, value_enum)]
    page_size: Option<PageSizeArg>,

    /// Open each exported file with the system handler
    #[arg(long)]
    open: bool,

    /// Log every pipeline stage
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Pdf,
    Docx,
    Html,
    All,
}

impl FormatArg {
    fn formats(self) -> Vec<ExportFormat> {
        match self {
            FormatArg::Pdf => vec![ExportFormat::Pdf],
            FormatArg::Docx => vec![ExportFormat::Docx],
            FormatArg::Html => vec![ExportFormat::Html],
            FormatArg::All => ExportFormat::all().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PageSize {
    fn from(arg: PageSizeArg) -> Self {
        match arg {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    info!("Starting {}", APP_NAME);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = load_config();
    if let Some(theme) = cli.theme {
        settings.theme = theme.into();
    }
    if let Some(page_size) = cli.page_size {
        settings.page_size = page_size.into();
    }

    let source = tokio::fs::read_to_string(&cli.input)
        .await
        .map_err(|e| Error::Application(format!("Cannot read {}: {}", cli.input.display(), e)))?;
    let preview = load_preview(&cli.input, &source, &settings);
    let body = preview
        .document
        .body_element()
        .ok_or_else(|| Error::EmptyContent("The page has no body".to_string()))?;

    let base_name = cli.name.clone().unwrap_or_else(|| file_name(&cli.input));
    let out_dir = cli
        .out
        .clone()
        .unwrap_or_else(|| settings.resolved_output_directory());
    let base_dir = cli
        .input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let exporter = Exporter::new(
        settings.clone(),
        LocalFetcher::new(base_dir),
        DirectorySink::new(&out_dir),
    );

    let mut failures = 0;
    for format in cli.format.formats() {
        match exporter
            .export(&preview.document, &body, &base_name, format)
            .await
        {
            Ok(saved) => {
                println!("{}", saved.path.display());
                if cli.open || settings.open_after_export {
                    if let Err(e) = open::that(&saved.path) {
                        warn!("Could not open {}: {}", saved.path.display(), e);
                    }
                }
            }
            Err(e) => {
                error!("{}", e);
                failures += 1;
            }
        }
    }

    // Command-line overrides are not persisted
    let mut persisted = load_config();
    persisted.last_export_directory = Some(out_dir);
    save_config_silent(&persisted);

    if failures > 0 {
        return Err(Box::new(Error::Application(format!(
            "{} export(s) failed",
            failures
        ))));
    }
    Ok(())
}

fn load_preview(input: &Path, source: &str, settings: &Settings) -> Preview {
    let is_html = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"));
    if is_html {
        load_html_page(source, &settings.content_root_id)
    } else {
        render_preview(source, settings.theme, &settings.content_root_id)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}
