//! Docboard CLI
//!
//! Command-line interface for:
//! - Analysing a document into a stored dashboard (`analyze`)
//! - Previewing the model-free analysis of a document (`inspect`)
//! - Browsing and exporting stored dashboards (`list`, `show`, `export`)
//! - Asking follow-up questions about an analysed document (`ask`)

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

use docboard_dashboard::{render_html, render_pptx, to_json, Layout, Theme};
use docboard_ingest::MediaType;
use docboard_llm::SummaryLength;
use docboard_pipeline::{AnalysisRequest, Pipeline, PipelineConfig};
use docboard_storage::{open_store, DashboardStore};

mod llm;
mod render;

#[derive(Parser)]
#[command(name = "docboard")]
#[command(
    author,
    version,
    about = "Docboard: turn reports into dashboards of charts and insights"
)]
struct Cli {
    /// Directory holding stored dashboards
    #[arg(long, global = true, env = "DOCBOARD_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a document, synthesize insights and store the dashboard.
    Analyze {
        /// Input document (pdf, docx, doc, txt)
        input: PathBuf,
        #[command(flatten)]
        media: MediaArgs,
        /// Extra instruction appended to the synthesis prompt
        #[arg(long)]
        prompt: Option<String>,
        /// Summary length: short, medium or long
        #[arg(long, default_value = "medium", value_parser = parse_length)]
        length: SummaryLength,
        /// Dashboard layout (picked from the document when omitted)
        #[arg(long = "theme", value_parser = parse_layout)]
        layout: Option<Layout>,
        #[command(flatten)]
        model: llm::ModelArgs,
        /// Also write the rendered HTML dashboard here
        #[arg(long)]
        html: Option<PathBuf>,
        /// Print the dashboard as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Parse, segment and extract metrics without calling a model.
    Inspect {
        /// Input document (pdf, docx, doc, txt)
        input: PathBuf,
        #[command(flatten)]
        media: MediaArgs,
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored dashboards, newest first.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show one stored dashboard.
    Show {
        id: Uuid,
        #[arg(long)]
        json: bool,
    },

    /// Export a stored dashboard as HTML, JSON or a PowerPoint deck.
    Export {
        id: Uuid,
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Html)]
        format: ExportFormat,
        /// Output file (stdout when omitted; required for pptx)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Ask a question about the document behind a stored dashboard.
    Ask {
        id: Uuid,
        question: String,
        #[command(flatten)]
        model: llm::ModelArgs,
    },
}

#[derive(Args)]
struct MediaArgs {
    /// Declared media type (MIME type or extension); inferred from the file name when omitted
    #[arg(long)]
    media_type: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Html,
    Json,
    Pptx,
}

fn parse_length(raw: &str) -> Result<SummaryLength, String> {
    raw.parse()
}

fn parse_layout(raw: &str) -> Result<Layout, String> {
    raw.parse()
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let mut config = PipelineConfig::from_env()?;
    if let Some(dir) = &cli.store_dir {
        config.store_dir = dir.clone();
    }

    match cli.command {
        Commands::Analyze {
            input,
            media,
            prompt,
            length,
            layout,
            model,
            html,
            json,
        } => {
            let mut request = AnalysisRequest::new(read_input(&input, &config)?, declared_type(&media))
                .summary_length(length);
            if let Some(name) = input.file_name().and_then(|n| n.to_str()) {
                request = request.file_name(name);
            }
            if let Some(prompt) = prompt {
                request = request.custom_prompt(prompt);
            }
            if let Some(layout) = layout {
                request = request.theme(Theme::with_layout(layout));
            }
            cmd_analyze(config, &model, request, html.as_deref(), json)?;
        }
        Commands::Inspect { input, media, json } => {
            cmd_inspect(config, &input, &media, json)?;
        }
        Commands::List { json } => cmd_list(&config, json)?,
        Commands::Show { id, json } => cmd_show(&config, id, json)?,
        Commands::Export { id, format, out } => cmd_export(&config, id, format, out.as_deref())?,
        Commands::Ask {
            id,
            question,
            model,
        } => cmd_ask(config, &model, id, &question)?,
    }
    Ok(())
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "docboard=info,warn",
        1 => "docboard=debug,info",
        _ => "trace",
    };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter())
    });
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter())
    });

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .init();
}

// ============================================================================
// Commands
// ============================================================================

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))
}

fn store(config: &PipelineConfig) -> Result<Arc<dyn DashboardStore>> {
    let store = open_store(&config.store_dir)
        .with_context(|| format!("opening store {}", config.store_dir.display()))?;
    Ok(Arc::new(store))
}

fn declared_type(media: &MediaArgs) -> String {
    media.media_type.clone().unwrap_or_default()
}

/// Read an input file, refusing anything over the configured upload limit.
fn read_input(path: &Path, config: &PipelineConfig) -> Result<Vec<u8>> {
    let size = fs::metadata(path)
        .with_context(|| format!("reading {}", path.display()))?
        .len();
    if size > config.max_file_bytes as u64 {
        bail!(
            "{} is {} bytes, over the {} byte limit",
            path.display(),
            size,
            config.max_file_bytes
        );
    }
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn cmd_analyze(
    config: PipelineConfig,
    model: &llm::ModelArgs,
    request: AnalysisRequest,
    html: Option<&Path>,
    json: bool,
) -> Result<()> {
    let label = request.file_name.clone().unwrap_or_else(|| "document".to_string());
    eprintln!("{} {}", "Analysing".green().bold(), label);

    let pipeline = llm::pipeline(config.clone(), model, store(&config)?)?;
    let dashboard = runtime()?.block_on(pipeline.run(request))?;

    if let Some(out) = html {
        fs::write(out, render_html(&dashboard))?;
        eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    }
    if json {
        println!("{}", to_json(&dashboard)?);
    } else {
        render::print_dashboard(&dashboard);
    }
    Ok(())
}

fn cmd_inspect(config: PipelineConfig, input: &Path, media: &MediaArgs, json: bool) -> Result<()> {
    let bytes = read_input(input, &config)?;
    let declared = match media.media_type.as_deref() {
        Some(declared) => declared.to_string(),
        None => input.to_string_lossy().into_owned(),
    };
    let media_type = MediaType::resolve(&declared)?;

    let pipeline = Pipeline::new(
        config,
        Arc::new(docboard_llm::OfflineProvider::new()),
        Arc::new(docboard_storage::MemoryStore::new()),
    );
    let analysis = pipeline.analyze(&bytes, media_type)?;

    if json {
        let value = serde_json::json!({
            "media_type": media_type,
            "title": analysis.parsed.title(),
            "warnings": analysis.parsed.warnings,
            "sections": analysis.sections,
            "series": analysis.extraction.series,
            "facts": analysis.extraction.facts,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        render::print_analysis(input, media_type, &analysis);
    }
    Ok(())
}

fn cmd_list(config: &PipelineConfig, json: bool) -> Result<()> {
    let summaries = store(config)?.list()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if summaries.is_empty() {
        eprintln!(
            "{} no dashboards in {}",
            "info:".yellow().bold(),
            config.store_dir.display()
        );
        return Ok(());
    }
    render::print_summaries(&summaries);
    Ok(())
}

fn cmd_show(config: &PipelineConfig, id: Uuid, json: bool) -> Result<()> {
    let dashboard = store(config)?.get(id)?;
    if json {
        println!("{}", to_json(&dashboard)?);
    } else {
        render::print_dashboard(&dashboard);
    }
    Ok(())
}

fn cmd_export(config: &PipelineConfig, id: Uuid, format: ExportFormat, out: Option<&Path>) -> Result<()> {
    if format == ExportFormat::Pptx && out.is_none() {
        bail!("pptx export needs --out <path>");
    }
    let dashboard = store(config)?.get(id)?;
    let rendered = match format {
        ExportFormat::Html => render_html(&dashboard).into_bytes(),
        ExportFormat::Json => to_json(&dashboard)?.into_bytes(),
        ExportFormat::Pptx => render_pptx(&dashboard)?,
    };
    match out {
        Some(path) => {
            fs::write(path, rendered)?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => println!("{}", String::from_utf8_lossy(&rendered)),
    }
    Ok(())
}

fn cmd_ask(config: PipelineConfig, model: &llm::ModelArgs, id: Uuid, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }
    let pipeline = llm::pipeline(config.clone(), model, store(&config)?)?;
    let answer = runtime()?.block_on(pipeline.ask(id, question))?;
    println!("{answer}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze_flags() {
        let cli = Cli::try_parse_from([
            "docboard",
            "--store-dir",
            "/tmp/boards",
            "analyze",
            "report.pdf",
            "--length",
            "brief",
            "--theme",
            "dashboard-cards",
            "--offline",
        ])
        .unwrap();
        assert_eq!(cli.store_dir, Some(PathBuf::from("/tmp/boards")));
        match cli.command {
            Commands::Analyze {
                length,
                layout,
                model,
                ..
            } => {
                assert_eq!(length, SummaryLength::Short);
                assert_eq!(layout, Some(Layout::DashboardCards));
                assert!(model.offline);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_rejects_unknown_length() {
        assert!(Cli::try_parse_from(["docboard", "analyze", "a.txt", "--length", "epic"]).is_err());
    }

    #[test]
    fn test_read_input_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        fs::write(&path, vec![b'a'; 32]).unwrap();
        let config = PipelineConfig {
            max_file_bytes: 16,
            ..Default::default()
        };
        assert!(read_input(&path, &config).is_err());

        let config = PipelineConfig::default();
        assert_eq!(read_input(&path, &config).unwrap().len(), 32);
    }
}
