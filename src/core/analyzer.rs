use futures::future::join_all;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::{fingerprint, AnalysisCache};
use super::llm::{ChatClient, ChatMessage, ChatRequest};
use super::scanner::FunctionRecord;
use crate::error::{RefactoryError, Result};

const SYSTEM_MESSAGE: &str = "You are a functional-programming-focused code analysis \
assistant. You return JSON without markdown formatting.";

/// The model's decision for one function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisVerdict {
    pub needs_refactor: bool,

    #[serde(default)]
    pub refactor_prompt: Option<String>,
}

impl Default for AnalysisVerdict {
    fn default() -> Self {
        Self {
            needs_refactor: false,
            refactor_prompt: None,
        }
    }
}

/// A function record paired with its verdict
#[derive(Debug, Clone)]
pub struct AnalyzedFunctionRecord {
    pub record: FunctionRecord,
    pub analysis: AnalysisVerdict,
}

/// Sends batches of functions to the chat endpoint and collects verdicts.
///
/// All members of one batch fan out concurrently; batches themselves are
/// sequenced by the engine. A verdict cache is injected rather than held in
/// ambient state so the analyzer stays testable.
pub struct BatchAnalyzer {
    client: Arc<dyn ChatClient>,
    cache: AnalysisCache,
    stream: bool,
}

impl BatchAnalyzer {
    pub fn new(client: Arc<dyn ChatClient>, cache: AnalysisCache, stream: bool) -> Self {
        Self {
            client,
            cache,
            stream,
        }
    }

    /// Analyze every function in the batch concurrently.
    ///
    /// Result order matches input order regardless of completion order.
    /// Per-function failures are logged and downgraded to the default
    /// verdict; they never abort the batch.
    pub async fn analyze_batch(
        &self,
        batch: &[FunctionRecord],
        prompt: &str,
    ) -> Vec<AnalyzedFunctionRecord> {
        let verdicts = join_all(
            batch
                .iter()
                .map(|record| self.analyze_function(record, prompt)),
        )
        .await;

        batch
            .iter()
            .cloned()
            .zip(verdicts)
            .map(|(record, analysis)| AnalyzedFunctionRecord { record, analysis })
            .collect()
    }

    async fn analyze_function(&self, record: &FunctionRecord, prompt: &str) -> AnalysisVerdict {
        let key = fingerprint(&[
            prompt,
            &record.module_context.imports.join("\n"),
            &record.module_context.declarations.join("\n"),
            &record.code,
        ]);

        if let Some(verdict) = self.cache.get(&key) {
            debug!("verdict cache hit for function '{}'", record.name);
            return verdict;
        }

        match self.request_verdict(record, prompt).await {
            Ok(verdict) => {
                self.cache.insert(key, verdict.clone());
                verdict
            }
            Err(e) => {
                warn!(
                    "analysis of function '{}' failed, defaulting to no-refactor: {}",
                    record.name, e
                );
                AnalysisVerdict::default()
            }
        }
    }

    async fn request_verdict(&self, record: &FunctionRecord, prompt: &str) -> Result<AnalysisVerdict> {
        let request = ChatRequest::new(
            vec![
                ChatMessage::system(SYSTEM_MESSAGE),
                ChatMessage::user(build_user_message(record, prompt)),
            ],
            self.stream,
        );

        let mut stream = self.client.chat(request).await?;
        let mut accumulated = String::new();
        while let Some(fragment) = stream.next().await {
            accumulated.push_str(&fragment?);
        }

        parse_verdict(&accumulated)
    }
}

fn build_user_message(record: &FunctionRecord, prompt: &str) -> String {
    let ctx = &record.module_context;
    let mut message = String::from(prompt);

    message.push_str("\n\nModule Context:\n");
    if !ctx.imports.is_empty() {
        message.push_str("Imports:\n");
        for import in &ctx.imports {
            message.push_str(import);
            message.push('\n');
        }
    }
    if !ctx.declarations.is_empty() {
        message.push_str("Declarations:\n");
        for declaration in &ctx.declarations {
            message.push_str(declaration);
            message.push('\n');
        }
    }

    message.push_str("\nFunction to analyze:\n");
    message.push_str(&record.code);
    message
}

/// Extract the JSON object out of accumulated model output.
///
/// Code-fence lines are stripped first; the substring from the first `{` to
/// the last `}` is then parsed. Anything else in the response is ignored.
fn parse_verdict(text: &str) -> Result<AnalysisVerdict> {
    let stripped: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let start = stripped
        .find('{')
        .ok_or_else(|| RefactoryError::Chat("no JSON object in response".to_string()))?;
    let end = stripped
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| RefactoryError::Chat("unterminated JSON object in response".to_string()))?;

    let verdict: AnalysisVerdict = serde_json::from_str(&stripped[start..=end])?;
    Ok(verdict)
}
