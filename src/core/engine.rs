use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::analyzer::{AnalyzedFunctionRecord, BatchAnalyzer};
use super::cache::AnalysisCache;
use super::generator::RefactorFileGenerator;
use super::llm::{create_chat_client, ChatClient};
use super::prompt::build_prompt;
use super::scanner::FunctionScanner;
use crate::config::{Config, OutputMode};
use crate::error::{RefactoryError, Result};

/// Wires the pipeline together: read file, scan functions, analyze in
/// batches, write the refactor file, report a summary.
pub struct Engine {
    config: Config,
    scanner: FunctionScanner,
    analyzer: BatchAnalyzer,
    generator: RefactorFileGenerator,
}

impl Engine {
    pub async fn new(config_path: Option<&Path>, mode_override: Option<OutputMode>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!(
            "using provider '{}' model '{}', batch size {}",
            config.llm.provider, config.llm.model, config.analysis.batch_size
        );

        let client: Arc<dyn ChatClient> = Arc::from(create_chat_client(&config.llm)?);
        info!(
            "analysis backed by {} ({})",
            client.provider_name(),
            client.model_name()
        );
        Self::assemble(config, client, mode_override)
    }

    fn assemble(
        config: Config,
        client: Arc<dyn ChatClient>,
        mode_override: Option<OutputMode>,
    ) -> Result<Self> {
        let cache = AnalysisCache::new(Duration::from_secs(config.analysis.cache_ttl_secs));
        let analyzer = BatchAnalyzer::new(client, cache, config.llm.stream);
        let mode = mode_override.unwrap_or(config.output.mode);

        Ok(Self {
            config,
            scanner: FunctionScanner::new()?,
            analyzer,
            generator: RefactorFileGenerator::new(mode),
        })
    }

    /// Analyze one source file and emit its `.refactor` sibling.
    pub async fn run(&self, file: &Path, requirement: Option<&str>) -> Result<()> {
        let content = std::fs::read_to_string(file).map_err(|e| {
            RefactoryError::Scanner(format!("cannot read {}: {}", file.display(), e))
        })?;
        let max = self.config.analysis.max_file_size;
        if content.len() > max {
            return Err(RefactoryError::Scanner(format!(
                "{} is {} bytes, above the configured limit of {}",
                file.display(),
                content.len(),
                max
            )));
        }

        let prompt = build_prompt(requirement);
        let records = self.scanner.scan(&content)?;
        info!("found {} function(s) in {}", records.len(), file.display());

        let batch_size = self.config.analysis.batch_size.max(1);
        let delay = Duration::from_millis(self.config.analysis.batch_delay_ms);
        let total_batches = records.chunks(batch_size).count();

        let mut analyzed: Vec<AnalyzedFunctionRecord> = Vec::with_capacity(records.len());
        for (i, batch) in records.chunks(batch_size).enumerate() {
            info!("analyzing batch {}/{}", i + 1, total_batches);
            analyzed.extend(self.analyzer.analyze_batch(batch, &prompt).await);
            if i + 1 < total_batches && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let flagged = analyzed.iter().filter(|a| a.analysis.needs_refactor).count();
        match self.generator.generate(file, &analyzed, &content)? {
            Some(path) => {
                println!(
                    "{} function(s) need refactoring. Suggestions written to {}",
                    flagged,
                    path.display()
                );
            }
            None => {
                println!("No functions require refactoring!");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::{ChatRequest, ChatStream};
    use async_trait::async_trait;
    use futures::StreamExt;

    struct FixedReplyClient {
        reply: String,
    }

    #[async_trait]
    impl ChatClient for FixedReplyClient {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatStream> {
            Ok(futures::stream::iter(vec![Ok(self.reply.clone())]).boxed())
        }

        fn provider_name(&self) -> &str {
            "fixed"
        }

        fn model_name(&self) -> &str {
            "fixed-model"
        }
    }

    fn engine(reply: &str, mode: OutputMode) -> Engine {
        let mut config = Config::default();
        config.analysis.batch_delay_ms = 0;
        Engine::assemble(
            config,
            Arc::new(FixedReplyClient {
                reply: reply.to_string(),
            }),
            Some(mode),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_file_without_functions_produces_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.js");
        std::fs::write(&path, "// nothing callable here\nconst five = 5;\n").unwrap();

        engine("irrelevant", OutputMode::Consolidated)
            .run(&path, None)
            .await
            .unwrap();

        assert!(!dir.path().join("plain.refactor.js").exists());
    }

    #[tokio::test]
    async fn test_flagged_function_lands_in_refactor_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.js");
        std::fs::write(
            &path,
            "function handle(req) {\n    return req.body;\n}\n",
        )
        .unwrap();

        engine(
            "{\"needsRefactor\": true, \"refactorPrompt\": \"Add input validation.\"}",
            OutputMode::Consolidated,
        )
        .run(&path, None)
        .await
        .unwrap();

        let output = std::fs::read_to_string(dir.path().join("api.refactor.js")).unwrap();
        assert!(output.contains("Function 'handle': Add input validation."));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let result = engine("irrelevant", OutputMode::Consolidated)
            .run(Path::new("/no/such/file.js"), None)
            .await;
        assert!(matches!(result, Err(RefactoryError::Scanner(_))));
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.js");
        std::fs::write(&path, "x".repeat(128)).unwrap();

        let mut config = Config::default();
        config.analysis.max_file_size = 64;
        config.analysis.batch_delay_ms = 0;
        let engine = Engine::assemble(
            config,
            Arc::new(FixedReplyClient {
                reply: String::new(),
            }),
            None,
        )
        .unwrap();

        assert!(engine.run(&path, None).await.is_err());
    }
}
