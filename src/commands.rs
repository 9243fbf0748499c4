use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use tracing::{info, warn};

use crate::advice::{AdviceRequest, PoolProfile};
use crate::builder::ArtifactLayout;
use crate::config::Config;
use crate::engine::{Engine, EngineStatus};
use crate::index::VectorIndex;

/// Write a default `config.toml` unless one already exists
#[inline]
pub fn init_config(config: &Config) -> Result<()> {
    let path = config.config_file_path();
    if path.exists() {
        println!("Configuration already exists: {}", path.display());
        println!("Use 'piscine-rag config --show' to display it.");
        return Ok(());
    }

    config.save().context("Failed to write default configuration")?;
    fs::create_dir_all(config.data_dir()).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.data_dir().display()
        )
    })?;

    println!(
        "{} {}",
        style("Created").green(),
        style(path.display()).cyan()
    );
    println!(
        "Place the knowledge base CSV (with a 'content' column) at {}",
        config.corpus_path().display()
    );
    Ok(())
}

/// Report corpus, artifact and API key state without building anything
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    let layout = ArtifactLayout::from_config(config);

    println!("📊 piscine-rag Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("📄 Corpus:");
    if layout.corpus_present() {
        println!("   ✅ {}", layout.corpus_source.display());
    } else {
        println!("   ❌ Missing: {}", layout.corpus_source.display());
    }

    println!("🔍 Index:");
    for path in layout.artifacts() {
        let marker = if path.exists() { "✅" } else { "❌" };
        println!("   {} {}", marker, path.display());
    }
    if layout.artifacts_present() {
        match VectorIndex::load(&layout.index, config.embedding_dimension()) {
            Ok(index) => println!(
                "   📦 {} vectors of dimension {}",
                index.len(),
                index.dimension()
            ),
            Err(e) => println!("   ⚠️  Index unreadable, it will be rebuilt: {}", e),
        }
    } else {
        println!("   💤 Not built yet; it will be built on first use");
    }

    println!("🤖 Upstream API:");
    println!("   🌐 {}", config.openai.api_base);
    match config.openai.resolve_api_key() {
        Ok(_) => println!("   ✅ API key: set"),
        Err(e) => println!("   ❌ API key: {}", e),
    }

    Ok(())
}

/// Load or build the knowledge base; `force` discards persisted artifacts first
#[inline]
pub async fn build_index(engine: &Engine, force: bool) -> Result<()> {
    let status = if force {
        info!("Forcing a rebuild of the knowledge base");
        engine.rebuild().await.context("Rebuild failed")?
    } else {
        engine.initialize().await
    };

    match status {
        EngineStatus::Loaded { chunks } => {
            println!("{} {} chunks indexed", style("✅").green(), chunks);
        }
        EngineStatus::Degraded => {
            println!(
                "{} No usable corpus; answers will report missing information",
                style("⚠️").yellow()
            );
        }
        EngineStatus::NotBuilt => {
            anyhow::bail!("Knowledge base could not be built, see the log for details");
        }
    }
    Ok(())
}

#[inline]
pub async fn search(engine: &Engine, query: &str, k: usize) -> Result<()> {
    let results = engine.search(query, k).await;
    if results.is_empty() {
        println!("No results for '{}'", query);
        return Ok(());
    }

    println!("Results for '{}':", style(query).bold());
    println!();
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{}. [{}] chunk {}",
            rank + 1,
            style(format!("{:.3}", result.score)).cyan(),
            result.chunk.index
        );
        println!("   {}", result.chunk.preview(200));
    }
    Ok(())
}

#[inline]
pub async fn ask(
    engine: &Engine,
    question: &str,
    profile: &PoolProfile,
    timeout: Option<Duration>,
) -> Result<()> {
    let answer = match timeout {
        Some(deadline) => engine.answer_within(question, profile, deadline).await,
        None => engine.answer_for(question, profile).await,
    };
    println!("{}", answer);
    Ok(())
}

#[inline]
pub async fn advise(engine: &Engine, request: &AdviceRequest, profile: &PoolProfile) -> Result<()> {
    if profile.is_empty() && matches!(request, AdviceRequest::Maintenance) {
        warn!("No pool profile given, using a standard medium pool");
    }
    let answer = engine.advise(request, profile).await;
    println!("{}", answer);
    Ok(())
}
