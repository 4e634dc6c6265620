//! Wayfinder CLI.
//!
//! Exposes the agent's entry points as subcommands. Every subcommand prints
//! a JSON envelope (`{"status": "success", "data": ...}` or
//! `{"status": "error", "detail": ...}`) on stdout.
//!
//! Usage examples:
//!     $ GEMINI_API_KEY=... cargo run --bin wayfinder -- run \
//!         --goal "Find the support email" --url https://example.com
//!     $ WAYFINDER_CHROME_BIN=/path/to/chrome GEMINI_API_KEY=... \
//!         cargo run --bin wayfinder -- navigate --url https://example.com
//!     $ cargo run --bin wayfinder -- scrape --goal "List prices" --html page.html

use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::Serialize;
use wayfinder_rs::config::{Verbosity, WayfinderConfig, WayfinderConfigOverrides};
use wayfinder_rs::types::{
    ApiEnvelope, ElementDescriptor, HealthStatus, NavigateRequest, ScrapeRequest,
    SuggestActionRequest,
};
use wayfinder_rs::wayfinder::Wayfinder;

#[derive(Parser)]
#[command(
    name = "wayfinder",
    author,
    version,
    about = "Goal-directed web navigation agent"
)]
struct Cli {
    /// Increase log verbosity (pass multiple times for DEBUG).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Show the launched browser window.
    #[arg(long, global = true)]
    show_browser: bool,

    /// Override the reasoning model name.
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a page and print its tagged elements.
    Navigate(NavigateArgs),
    /// Ask for the next action given a goal and an element list.
    Suggest(SuggestArgs),
    /// Extract goal-relevant JSON from an HTML document.
    Scrape(ScrapeArgs),
    /// Run the full navigation loop.
    Run(RunArgs),
    /// Print a liveness marker.
    Health,
}

#[derive(Args)]
struct NavigateArgs {
    #[arg(long)]
    url: String,
}

#[derive(Args)]
struct SuggestArgs {
    #[arg(long)]
    goal: String,

    #[arg(long)]
    current_url: String,

    /// JSON array of elements; `-` reads from stdin.
    #[arg(long)]
    elements: PathBuf,
}

#[derive(Args)]
struct ScrapeArgs {
    #[arg(long)]
    goal: String,

    /// HTML file to extract from; `-` reads from stdin.
    #[arg(long)]
    html: PathBuf,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    goal: String,

    #[arg(long)]
    url: String,

    /// Maximum number of page loads.
    #[arg(long)]
    max_steps: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_env_logger();

    let cli = Cli::parse();
    let verbosity = verbosity_from_count(cli.verbose);

    let load_config = || build_config(cli.show_browser, cli.model.clone(), verbosity);

    match cli.command {
        Command::Health => print_json(&HealthStatus::ok()),
        Command::Navigate(args) => {
            let wayfinder = Wayfinder::from_config(load_config()?)?;
            let envelope = wayfinder
                .handle_navigate(NavigateRequest { url: args.url })
                .await;
            emit(&envelope)
        }
        Command::Suggest(args) => {
            let raw = read_input(&args.elements)?;
            let elements: Vec<ElementDescriptor> =
                serde_json::from_str(&raw).context("elements must be a JSON array")?;
            let wayfinder = Wayfinder::from_config(load_config()?)?;
            let envelope = wayfinder
                .handle_suggest_action(SuggestActionRequest {
                    goal: args.goal,
                    current_url: args.current_url,
                    elements,
                })
                .await;
            emit(&envelope)
        }
        Command::Scrape(args) => {
            let html_content = read_input(&args.html)?;
            let wayfinder = Wayfinder::from_config(load_config()?)?;
            let envelope = wayfinder
                .handle_scrape(ScrapeRequest {
                    goal: args.goal,
                    html_content,
                })
                .await;
            emit(&envelope)
        }
        Command::Run(args) => {
            let config = load_config()?;
            let config = match args.max_steps {
                Some(max_steps) => {
                    config.with_overrides(WayfinderConfigOverrides::default().max_steps(max_steps))
                }
                None => config,
            };
            let wayfinder = Wayfinder::from_config(config)?;
            info!("Running goal {:?} from {}", args.goal, args.url);
            let outcome = wayfinder.run(&args.goal, &args.url).await;
            info!("Oracle usage: {:?}", wayfinder.metrics());
            let envelope = ApiEnvelope::success(outcome);
            emit(&envelope)
        }
    }
}

fn build_config(
    show_browser: bool,
    model: Option<String>,
    verbosity: Option<Verbosity>,
) -> Result<WayfinderConfig> {
    let config = WayfinderConfig::from_env().context("invalid Wayfinder environment")?;

    let mut overrides = WayfinderConfigOverrides::default();
    overrides.verbose = verbosity;
    if show_browser {
        overrides = overrides.headless(false);
    }
    if let Some(model) = model {
        overrides = overrides.model_name(model);
    }

    Ok(config.with_overrides(overrides))
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read stdin")?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn emit<T: Serialize>(envelope: &ApiEnvelope<T>) -> Result<()> {
    print_json(envelope)?;
    if !envelope.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON output")?;
    println!("{rendered}");
    Ok(())
}

fn verbosity_from_count(count: u8) -> Option<Verbosity> {
    match count {
        0 => None,
        1 => Some(Verbosity::Medium),
        _ => Some(Verbosity::Detailed),
    }
}

fn init_env_logger() {
    if env::var("RUST_LOG").is_err() {
        unsafe {
            env::set_var("RUST_LOG", "info");
        }
    }

    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp_secs()
        .try_init();
}
