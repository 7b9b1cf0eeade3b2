use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RefactoryError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider (openai, openai-compatible, ollama)
    pub provider: String,

    /// Model name (e.g., "gpt-4o-mini", "llama3")
    pub model: String,

    /// API key; falls back to OPENAI_API_KEY when unset
    pub api_key: Option<String>,

    /// Base URL for OpenAI-compatible or local endpoints
    pub base_url: Option<String>,

    /// Maximum tokens for LLM responses
    pub max_tokens: Option<u32>,

    /// Temperature for LLM responses (0.0 to 1.0)
    pub temperature: Option<f32>,

    /// Request streamed output and accumulate it client-side
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Number of functions analyzed concurrently per batch
    pub batch_size: usize,

    /// Delay between batches, in milliseconds (rate-limiting courtesy)
    pub batch_delay_ms: u64,

    /// Time-to-live for cached verdicts, in seconds
    pub cache_ttl_secs: u64,

    /// Maximum input file size to analyze (in bytes)
    pub max_file_size: usize,
}

/// How the refactor file is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// One whole-file refactor instruction plus the original content
    Consolidated,
    /// Copy of the original with inline comment blocks above flagged functions
    Spliced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub mode: OutputMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Batching and caching behaviour
    pub analysis: AnalysisConfig,

    /// Refactor file output settings
    pub output: OutputConfig,

    /// LLM endpoint settings
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig {
                batch_size: 1,
                batch_delay_ms: 1000,
                cache_ttl_secs: 300,
                max_file_size: 1024 * 1024, // 1MB
            },
            output: OutputConfig {
                mode: OutputMode::Consolidated,
            },
            llm: LlmConfig {
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                base_url: None,
                max_tokens: Some(2000),
                temperature: Some(0.3),
                stream: true,
            },
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| RefactoryError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = ["Refactory.toml", "refactory.toml", ".refactory.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}
