use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vaultline_core::{
    DEFAULT_MIN_CITATIONS, FetchConfig, FileLedger, Group, HttpTransport, IngestOptions, IngestReport, Ingestor, Level,
    Mode, NoteAction, PinnedTransport, Resolver, Transport, Vault, VaultlineError, fetch_file, fetch_stdin,
    parse_source_url,
};

mod echo;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit status when the primary source could not be fetched.
const EXIT_NETWORK: u8 = 2;

/// Ingestion mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeArg {
    Single,
    Dossier,
}

impl FromStr for ModeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "dossier" => Ok(Self::Dossier),
            _ => Err(format!("Invalid mode: {}. Valid options: single, dossier", s)),
        }
    }
}

/// `auto` or a fixed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice<T> {
    Auto,
    Fixed(T),
}

impl<T: FromStr<Err = VaultlineError>> FromStr for Choice<T> {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        s.parse().map(Self::Fixed).map_err(|err: VaultlineError| err.to_string())
    }
}

impl<T> Choice<T> {
    fn fixed(self) -> Option<T> {
        match self {
            Self::Auto => None,
            Self::Fixed(value) => Some(value),
        }
    }
}

/// Ingest a web resource into a knowledge vault as a cross-linked note
#[derive(Parser, Debug)]
#[command(name = "vaultline")]
#[command(author = "Vaultline Contributors")]
#[command(version)]
#[command(about = "Ingest web resources into a knowledge vault", long_about = None)]
struct Args {
    /// Source URL to ingest
    #[arg(value_name = "URL")]
    url: String,

    /// Ingestion mode (single, dossier)
    #[arg(long, default_value = "single", value_name = "MODE")]
    mode: ModeArg,

    /// Topic of a dossier (required in dossier mode)
    #[arg(long, value_name = "TOPIC")]
    topic: Option<String>,

    /// Corroborating source URL for a dossier (repeatable)
    #[arg(long = "source", value_name = "URL")]
    sources: Vec<String>,

    /// Minimum number of usable sources for a dossier
    #[arg(long, default_value_t = DEFAULT_MIN_CITATIONS, value_name = "NUM")]
    min_citations: usize,

    /// Target group (auto, agents, ai, supercomputing, projects)
    #[arg(long, default_value = "auto", value_name = "GROUP")]
    group: Choice<Group>,

    /// Difficulty level (auto, beginner, intermediate, advanced)
    #[arg(long, default_value = "auto", value_name = "LEVEL")]
    level: Choice<Level>,

    /// Title override
    #[arg(long, value_name = "TITLE")]
    title: Option<String>,

    /// Print decisions without writing files
    #[arg(long)]
    dry_run: bool,

    /// Vault root directory
    #[arg(long, default_value = ".", value_name = "DIR")]
    vault: PathBuf,

    /// Saved copy of the page to use instead of fetching it, or "-" for stdin
    #[arg(long, value_name = "FILE")]
    html: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn ingest_options(&self) -> IngestOptions {
        let mode = match self.mode {
            ModeArg::Single => Mode::Single,
            ModeArg::Dossier => Mode::Dossier {
                topic: self.topic.clone().unwrap_or_default(),
                sources: self.sources.clone(),
                min_citations: self.min_citations,
            },
        };

        IngestOptions {
            url: self.url.clone(),
            mode,
            group: self.group.fixed(),
            level: self.level.fixed(),
            title: self.title.clone(),
            dry_run: self.dry_run,
        }
    }

    fn fetch_config(&self) -> FetchConfig {
        let builder = FetchConfig::builder().timeout(self.timeout);
        match &self.user_agent {
            Some(user_agent) => builder.user_agent(user_agent.clone()).build(),
            None => builder.build(),
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the verbosity flag.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

async fn ingest<T: Transport>(
    transport: T, config: FetchConfig, vault: Vault, options: &IngestOptions,
) -> Result<IngestReport, VaultlineError> {
    let today = vaultline_core::today();
    let ledger = FileLedger::new(vault.clone(), today);
    Ingestor::new(Resolver::new(transport, config), ledger, vault, today)
        .run(options)
        .await
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let options = args.ingest_options();
    let config = args.fetch_config();
    let vault = Vault::new(&args.vault);

    if args.mode == ModeArg::Single && (args.topic.is_some() || !args.sources.is_empty()) {
        echo::print_warning("--topic and --source only apply to --mode dossier; ignoring them");
    }

    if args.verbose {
        echo::print_detail("Vault", &vault.root().display().to_string());
    }

    let steps = if args.html.is_some() { 2 } else { 1 };
    let http = HttpTransport::new(config.clone()).context("Failed to build HTTP client")?;

    let report = match &args.html {
        Some(input) => {
            let url = parse_source_url(&args.url)?;
            if args.verbose {
                echo::print_step(1, steps, &format!("Reading saved page from {}", input.bright_white()));
            }
            let html = (if input == "-" { fetch_stdin() } else { fetch_file(input) })
                .with_context(|| format!("Failed to read page from {}", input))?;
            if args.verbose {
                echo::print_detail("Size", &echo::format_size(html.len()));
                echo::print_step(2, steps, &format!("Ingesting {}", args.url.bright_white().underline()));
            }
            ingest(PinnedTransport::new(url.as_str(), html, http), config, vault, &options).await?
        }
        None => {
            if args.verbose {
                echo::print_step(1, steps, &format!("Ingesting {}", args.url.bright_white().underline()));
            }
            ingest(http, config, vault, &options).await?
        }
    };

    print_report(&report);
    Ok(())
}

/// Decision lines go to stdout; status lines to stderr.
fn print_report(report: &IngestReport) {
    for warning in &report.warnings {
        echo::print_warning(warning);
    }
    if report.access_limited {
        echo::print_warning("Source content was not fully available; the note uses the access-limited template");
    }

    println!("group={}", report.group);
    println!("level={}", report.level);
    println!("target={}", report.note_path.display());
    println!("mode={}", report.action.as_str());
    if let Some(citations) = report.citations {
        println!("citations={}", citations);
    }

    if report.written {
        let action = match report.action {
            NoteAction::Create => "Created",
            NoteAction::Update => "Updated",
        };
        echo::print_success(&format!("{}: {}", action, report.note_path.display()));
        echo::print_success(&format!("Updated: {}", report.index_path.display()));
    } else {
        echo::print_info("Dry run: no files written");
    }
}

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<VaultlineError>() {
        Some(err) if err.is_network() => EXIT_NETWORK,
        _ => 1,
    }
}

fn is_validation_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<VaultlineError>().is_some_and(VaultlineError::is_validation)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        echo::print_banner();
        echo::print_info("Debug logging enabled");
        eprintln!();
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            echo::print_error(&format!("{:#}", err));
            if is_validation_error(&err) {
                echo::print_info("Nothing was written to the vault");
            }
            ExitCode::from(exit_status(&err))
        }
    }
}
