//! Core analysis pipeline
//!
//! Raw source text flows through the scanner into function records, each
//! carrying its module context; the analyzer annotates records with verdicts
//! from the chat endpoint; the generator renders flagged records into the
//! `.refactor` sibling file. The engine sequences the whole pipeline.

mod analyzer;
mod cache;
mod context;
mod engine;
mod generator;
mod llm;
mod prompt;
mod scanner;

pub use analyzer::{AnalysisVerdict, AnalyzedFunctionRecord, BatchAnalyzer};
pub use cache::{fingerprint, AnalysisCache};
pub use context::{ContextExtractor, ModuleContext};
pub use generator::RefactorFileGenerator;
pub use llm::{create_chat_client, ChatClient, ChatMessage, ChatRequest, ChatStream};
pub use prompt::build_prompt;
pub use scanner::{FunctionRecord, FunctionScanner};

// Export the main engine
pub use engine::Engine;
