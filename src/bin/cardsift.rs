//! Cardsift command line
//!
//! Filters a JSON card collection through a multi-step tag query and prints
//! the outcome.
//!
//! # Configuration
//!
//! Configuration is read from:
//! 1. `--config <path>`
//! 2. `CARDSIFT_CONFIG` environment variable (path to TOML file)
//! 3. `./cardsift.toml` in current directory
//! 4. Default configuration
//!
//! Environment overrides (`CARDSIFT_DIRECT_MAX`, `CARDSIFT_WORKERS`, ...)
//! apply on top of whichever source was used.
//!
//! # Example Usage
//!
//! ```bash
//! # Cards that are urgent bugs but not features
//! cardsift query --cards board.json \
//!   --step "intersection:urgent,bug" --step "exclusion:feature"
//!
//! # Same query in one string, with a deadline
//! cardsift query --cards board.json \
//!   --query "intersection:urgent,bug; exclusion:feature" --deadline-ms 200
//!
//! # Validate configuration
//! cardsift --config /etc/cardsift.toml check-config
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{debug, error, info, warn};

use cardsift::config::EngineConfig;
use cardsift::query::{Query, QueryEngine, QueryOutcome, Step};
use cardsift::types::Card;

// =============================================================================
// CLI Definition
// =============================================================================

/// Cardsift - deterministic tag filtering for card collections
#[derive(Parser)]
#[command(name = "cardsift")]
#[command(version)]
#[command(about = "Filter tagged cards through multi-step set queries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (overrides CARDSIFT_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query against a JSON array of cards
    Query {
        /// Path to the card collection (JSON array of {id, title, tags})
        #[arg(long)]
        cards: PathBuf,

        /// One step as `op:tag,tag`; repeat in evaluation order
        #[arg(short, long = "step", conflicts_with = "query")]
        steps: Vec<String>,

        /// Whole query as `op:tags; op:tags`
        #[arg(short, long)]
        query: Option<String>,

        /// Fail if evaluation takes longer than this many milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,

        /// Output format (json, text)
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Validate configuration and print a summary
    CheckConfig,
}

// =============================================================================
// Configuration Loading
// =============================================================================

fn load_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var("CARDSIFT_CONFIG").ok().map(PathBuf::from))
        .or_else(|| {
            let local = PathBuf::from("cardsift.toml");
            local.exists().then_some(local)
        });

    let config = match path {
        Some(path) => EngineConfig::from_file_with_env(&path)?,
        None => EngineConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &EngineConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

fn read_cards(path: &Path) -> Result<Vec<Card>, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let cards: Vec<Card> = serde_json::from_str(&contents)?;
    Ok(cards)
}

fn parse_query(steps: &[String], query: Option<&str>) -> Result<Query, Box<dyn std::error::Error>> {
    let query = match query {
        Some(text) => text.parse()?,
        None => {
            let steps = steps
                .iter()
                .map(|s| s.parse::<Step>())
                .collect::<Result<Vec<_>, _>>()?;
            Query::new(steps)?
        }
    };
    Ok(query)
}

fn print_outcome(outcome: &QueryOutcome, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        for id in &outcome.card_ids {
            println!("{}", id);
        }
        eprintln!(
            "{} matched, {}/{} steps, tiers {:?}, cache_hit={}, {:?}",
            outcome.len(),
            outcome.steps_applied,
            outcome.steps_total,
            outcome.tiers,
            outcome.cache_hit,
            outcome.elapsed
        );
    }
    Ok(())
}

async fn cmd_query(
    config: EngineConfig,
    cards_path: &Path,
    steps: &[String],
    query: Option<&str>,
    deadline_ms: Option<u64>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let cards = read_cards(cards_path)?;
    let query = parse_query(steps, query)?;
    debug!(cards = cards.len(), query = %query, "Loaded input");

    let engine = Arc::new(QueryEngine::new(config)?);

    let outcome = match deadline_ms {
        Some(ms) => {
            engine
                .execute_with_deadline(Arc::from(cards), query, Duration::from_millis(ms))
                .await?
        }
        None => engine.execute(&cards, &query)?,
    };

    if outcome.short_circuited {
        info!(
            steps_applied = outcome.steps_applied,
            steps_total = outcome.steps_total,
            "Evaluation stopped early on an empty set"
        );
    }

    print_outcome(&outcome, format)
}

fn cmd_check_config(config: &EngineConfig) {
    println!("Configuration is valid!");
    println!();
    println!("Strategy:");
    println!("  Direct tier up to: {} cards", config.strategy.direct_max);
    println!("  Chunked tier up to: {} cards", config.strategy.parallel_max);
    println!("  Min chunk size: {}", config.strategy.min_chunk_size);
    match config.strategy.force_tier {
        Some(tier) => println!("  Forced tier: {}", tier),
        None => println!("  Forced tier: none"),
    }
    println!();
    println!("Workers: {}", config.parallel.num_workers);
    println!();
    println!("Cache:");
    println!("  Enabled: {}", config.cache.enabled);
    println!("  Capacity: {} entries", config.cache.capacity);
    println!("  Lock timeout: {} ms", config.cache.lock_timeout_ms);
    println!();
    println!("Log level: {}", config.logging.level);
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    let result = match &cli.command {
        Commands::CheckConfig => {
            cmd_check_config(&config);
            Ok(())
        }
        Commands::Query {
            cards,
            steps,
            query,
            deadline_ms,
            format,
        } => {
            if steps.is_empty() && query.is_none() {
                warn!("No steps given; pass --step or --query");
            }
            cmd_query(config, cards, steps, query.as_deref(), *deadline_ms, format).await
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
