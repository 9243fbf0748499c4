use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use piscine_rag::advice::{AdviceRequest, PoolProfile};
use piscine_rag::commands::{advise, ask, build_index, init_config, search, show_status};
use piscine_rag::config::{Config, get_config_dir, show_config};
use piscine_rag::engine::Engine;

#[derive(Parser)]
#[command(name = "piscine-rag")]
#[command(about = "Retrieval-augmented answers from a pool maintenance knowledge base")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.piscine-rag)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default configuration, or show the current one
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Show corpus, index and API key status
    Status,
    /// Load or build the knowledge base index
    Build {
        /// Discard persisted artifacts and rebuild from the corpus
        #[arg(long)]
        force: bool,
    },
    /// Search the knowledge base
    Search {
        query: String,
        /// Number of results
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Answer a customer question
    Ask {
        question: String,
        #[command(flatten)]
        profile: ProfileArgs,
        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Ask for structured technical advice
    Advise {
        #[command(flatten)]
        profile: ProfileArgs,
        #[command(subcommand)]
        topic: AdviceTopic,
    },
}

#[derive(clap::Args)]
struct ProfileArgs {
    /// Pool type, e.g. "enterrée" or "hors-sol"
    #[arg(long)]
    pool_type: Option<String>,
    /// Pool size, e.g. "8x4" or "petite"
    #[arg(long)]
    pool_size: Option<String>,
}

impl From<ProfileArgs> for PoolProfile {
    fn from(args: ProfileArgs) -> Self {
        PoolProfile::new(args.pool_type, args.pool_size)
    }
}

#[derive(Subcommand)]
enum AdviceTopic {
    /// Free-form question
    General { question: String },
    /// Water chemistry issue
    Chemistry { issue: String },
    /// Equipment malfunction
    Equipment { equipment: String, problem: String },
    /// Maintenance schedule for the pool profile
    Maintenance,
    /// Seasonal maintenance
    Seasonal { season: String },
    /// Urgent problem; the answer ends with a safety checklist
    Emergency { description: String },
}

impl From<AdviceTopic> for AdviceRequest {
    fn from(topic: AdviceTopic) -> Self {
        match topic {
            AdviceTopic::General { question } => AdviceRequest::General { question },
            AdviceTopic::Chemistry { issue } => AdviceRequest::WaterChemistry { issue },
            AdviceTopic::Equipment { equipment, problem } => {
                AdviceRequest::Equipment { equipment, problem }
            }
            AdviceTopic::Maintenance => AdviceRequest::Maintenance,
            AdviceTopic::Seasonal { season } => AdviceRequest::Seasonal { season },
            AdviceTopic::Emergency { description } => AdviceRequest::Emergency { description },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    let config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config);
            } else {
                init_config(&config)?;
            }
        }
        Commands::Status => {
            show_status(&config)?;
        }
        Commands::Build { force } => {
            let engine = Engine::from_config(&config)?;
            build_index(&engine, force).await?;
        }
        Commands::Search { query, k } => {
            let engine = Engine::from_config(&config)?;
            search(&engine, &query, k.unwrap_or(config.retrieval.top_k)).await?;
        }
        Commands::Ask {
            question,
            profile,
            timeout_secs,
        } => {
            let engine = Engine::from_config(&config)?;
            let profile = PoolProfile::from(profile);
            ask(
                &engine,
                &question,
                &profile,
                timeout_secs.map(Duration::from_secs),
            )
            .await?;
        }
        Commands::Advise { profile, topic } => {
            let engine = Engine::from_config(&config)?;
            advise(&engine, &AdviceRequest::from(topic), &PoolProfile::from(profile)).await?;
        }
    }

    Ok(())
}
