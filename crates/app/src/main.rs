use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cardgen::{CardPipeline, Settings};
use cardgen_core::{Card, CardConfig, SegmentPolicy};
use cardgen_import::{read_sheet, CardExtractor, ScanHooks};
use cardgen_layout::{render_pdf, render_typst, PageSpec};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cardgen")]
#[command(version, about = "Turn order spreadsheets into printable gift-card sheets")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More log output (-v for debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract cards and write a printable card sheet
    Generate(GenerateArgs),
    /// Show how rows are grouped into blocks, without refining or writing
    Inspect {
        input: PathBuf,
        #[command(flatten)]
        extraction: ExtractionArgs,
    },
    /// Write the default settings file
    InitConfig {
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Spreadsheet to read (.csv, .tsv, .xlsx, .xls, .ods)
    input: PathBuf,

    /// Output document (defaults to <input stem>_cards.pdf or .typ)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Pdf)]
    format: OutputFormat,

    /// Also write the cards as JSON
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    #[command(flatten)]
    extraction: ExtractionArgs,

    /// Skip text refinement even if a service is configured
    #[arg(long)]
    no_refine: bool,

    #[arg(long, env = "CARDGEN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "CARDGEN_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "CARDGEN_MODEL")]
    model: Option<String>,

    /// Cards refined at once
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Compiled PDF
    Pdf,
    /// Typst source
    Typst,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Typst => "typ",
        }
    }

    fn render(self, cards: &[Card], spec: &PageSpec) -> Result<Option<Vec<u8>>> {
        Ok(match self {
            OutputFormat::Pdf => render_pdf(cards, spec)?,
            OutputFormat::Typst => render_typst(cards, spec).map(String::into_bytes),
        })
    }
}

/// Command-line overrides for the `[extraction]` settings.
#[derive(Args, Debug, Default)]
struct ExtractionArgs {
    /// Block grouping: strict-grid or gap
    #[arg(long)]
    policy: Option<SegmentPolicy>,

    /// Rows per recipient block (strict grid)
    #[arg(long)]
    window: Option<usize>,

    /// Header text marking the start of the recipient section
    #[arg(long)]
    anchor: Option<String>,

    /// Zero-based column holding addresses
    #[arg(long)]
    address_column: Option<usize>,

    /// Zero-based column holding gift messages
    #[arg(long)]
    message_column: Option<usize>,

    /// Emit blocks cut short by a header instead of dropping them
    #[arg(long)]
    keep_truncated: bool,

    /// Accept addresses without any digit
    #[arg(long)]
    allow_no_digit: bool,
}

impl ExtractionArgs {
    fn apply(&self, config: &mut CardConfig) {
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        if let Some(window) = self.window {
            config.window = window;
        }
        if let Some(anchor) = &self.anchor {
            config.anchor = anchor.clone();
        }
        if let Some(col) = self.address_column {
            config.address_column = col;
        }
        if let Some(col) = self.message_column {
            config.message_column = col;
        }
        if self.keep_truncated {
            config.keep_truncated_blocks = true;
        }
        if self.allow_no_digit {
            config.require_digit = false;
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = if verbose > 0 { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_target(false)
        .init();
}

fn default_output(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cards".to_string());
    input.with_file_name(format!("{stem}_cards.{}", format.extension()))
}

/// First Ctrl-C requests a cooperative stop; a second one exits at once.
fn spawn_interrupt_handler(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupted, stopping (press Ctrl-C again to quit now)");
        cancel.store(true, Ordering::Relaxed);
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

async fn generate(settings: Settings, args: GenerateArgs) -> Result<()> {
    let mut settings = settings;
    args.extraction.apply(&mut settings.extraction);
    if args.no_refine {
        settings.refiner.enabled = false;
    }
    if args.api_key.is_some() {
        settings.refiner.api_key = args.api_key;
    }
    if args.base_url.is_some() {
        settings.refiner.base_url = args.base_url;
    }
    if let Some(model) = args.model {
        settings.refiner.model = model;
    }
    if let Some(n) = args.concurrency {
        settings.refiner.concurrency = n;
    }
    settings.validate().context("invalid settings")?;

    let refiner = settings.refiner.build().context("failed to set up text refiner")?;
    if !refiner.is_enabled() {
        tracing::info!("No refinement service configured, using cleaned text as-is");
    }
    let pipeline = CardPipeline::new(&settings.extraction, refiner)?
        .with_concurrency(settings.refiner.concurrency);

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(cancel.clone());
    let last_decile = AtomicU8::new(0);
    let progress = |pct: u8| {
        let decile = pct / 10;
        if last_decile.fetch_max(decile, Ordering::Relaxed) < decile {
            tracing::info!("Scanning... {}%", decile * 10);
        }
    };
    let hooks = ScanHooks { progress: Some(&progress), cancel: Some(cancel.as_ref()) };

    let report = pipeline
        .process_file(&args.input, &settings.extraction, &hooks)
        .await
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    // A partial list must not replace a previous complete output.
    if report.cancelled {
        tracing::warn!("Cancelled with {} cards processed, nothing written", report.cards.len());
        return Ok(());
    }

    let Some(doc) = args.format.render(&report.cards, &PageSpec::default())? else {
        tracing::info!("No cards found, nothing written");
        return Ok(());
    };

    let output = args.output.unwrap_or_else(|| default_output(&args.input, args.format));
    std::fs::write(&output, doc)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if let Some(json_path) = &args.json {
        let json = serde_json::to_string_pretty(&report.cards)?;
        std::fs::write(json_path, json)
            .with_context(|| format!("failed to write {}", json_path.display()))?;
    }

    tracing::info!("Wrote {} cards to {}", report.cards.len(), output.display());
    Ok(())
}

fn inspect(mut config: CardConfig, input: &Path, overrides: &ExtractionArgs) -> Result<()> {
    overrides.apply(&mut config);
    config.validate().context("invalid settings")?;

    let sheet = read_sheet(input, &config)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let extraction = CardExtractor::new(&config).extract(sheet.rows());

    let Some(anchor) = extraction.anchor_row else {
        println!("No '{}' header found in {} rows", config.anchor, sheet.len());
        return Ok(());
    };
    println!("Header at row {} ({} policy)", anchor + 1, config.policy);

    let mut lines: Vec<(usize, String)> = extraction
        .cards
        .iter()
        .map(|c| {
            let first = c.card.address.lines().next().unwrap_or_default();
            (c.first_row, format!("rows {}-{}  card    {first}", c.first_row + 1, c.last_row + 1))
        })
        .chain(extraction.rejected.iter().map(|r| {
            let (first, last) = (r.block.first_row, r.block.last_row);
            (first, format!("rows {}-{}  reject  {}", first + 1, last + 1, r.reason))
        }))
        .collect();
    lines.sort_by_key(|(row, _)| *row);
    for (_, line) in &lines {
        println!("  {line}");
    }

    println!(
        "{} cards, {} rejected, {} truncated",
        extraction.cards.len(),
        extraction.rejected.len(),
        extraction.truncated
    );
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let Some(path) = path.or_else(Settings::default_path) else {
        bail!("no config directory on this platform; pass a path");
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Settings::default()
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}

fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    Settings::load_or_default(explicit).context("failed to load settings")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::InitConfig { path, force } => init_config(path, force),
        Commands::Generate(args) => generate(load_settings(cli.config.as_deref())?, args).await,
        Commands::Inspect { input, extraction } => {
            inspect(load_settings(cli.config.as_deref())?.extraction, &input, &extraction)
        }
    }
}
