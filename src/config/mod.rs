// Configuration management module
// TOML settings for the upstream API, retrieval, generation and on-disk layout

pub mod settings;


use std::path::PathBuf;

use anyhow::Result;
use console::style;

pub use settings::{
    Config, ConfigError, GenerationConfig, OpenAiConfig, RetrievalConfig, StorageConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    Config::config_dir()
}

/// Render the effective configuration for the `config --show` command
#[inline]
pub fn render_config(config: &Config) -> String {
    let key_status = match config.openai.resolve_api_key() {
        Ok(_) => style("set").green().to_string(),
        Err(_) => style(format!("missing ({})", config.openai.api_key_env))
            .red()
            .to_string(),
    };

    let lines = [
        style("Upstream API").bold().yellow().to_string(),
        format!("  Base URL:            {}", config.openai.api_base),
        format!("  API key:             {}", key_status),
        format!("  Embedding model:     {}", config.openai.embedding_model),
        format!("  Embedding dimension: {}", config.openai.embedding_dimension),
        format!(
            "  Batching:            {} texts, {} ms between batches",
            config.openai.batch_size, config.openai.batch_delay_ms
        ),
        format!("  Generation model:    {}", config.openai.generation_model),
        format!(
            "  Timeout / retries:   {}s / {}",
            config.openai.timeout_seconds, config.openai.retry_attempts
        ),
        String::new(),
        style("Retrieval").bold().yellow().to_string(),
        format!("  Top k:               {}", config.retrieval.top_k),
        format!("  Score threshold:     {}", config.retrieval.score_threshold),
        String::new(),
        style("Generation").bold().yellow().to_string(),
        format!(
            "  Temperature:         {}",
            config.generation.temperature
        ),
        format!("  Max tokens:          {}", config.generation.max_tokens),
        String::new(),
        style("Storage").bold().yellow().to_string(),
        format!("  Data directory:      {}", config.data_dir().display()),
        format!("  Corpus source:       {}", config.corpus_path().display()),
    ];

    lines.join("\n")
}

#[inline]
pub fn show_config(config: &Config) {
    println!("{}", style("piscine-rag configuration").bold().cyan());
    println!(
        "Config file: {}",
        style(config.config_file_path().display()).cyan()
    );
    println!();
    println!("{}", render_config(config));
}
