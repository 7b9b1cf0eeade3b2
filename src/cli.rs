use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;

use crate::config::OutputMode;
use crate::core::Engine;

#[derive(Parser)]
#[command(name = "refactory")]
#[command(about = "The Refactor Advisor That Reads Your Functions")]
#[command(version)]
pub struct Cli {
    /// Source file to analyze
    pub file: Option<PathBuf>,

    /// Additional analysis requirements, appended verbatim to the rubric
    pub requirement: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Splice refactor comments into a copy of the file instead of
    /// producing a consolidated refactor prompt
    #[arg(long)]
    pub splice: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Output-mode override from the command line, if any
    pub fn output_mode(&self) -> Option<OutputMode> {
        self.splice.then_some(OutputMode::Spliced)
    }

    pub async fn execute(self) -> Result<()> {
        let mode = self.output_mode();
        let Some(file) = self.file else {
            // A missing file path is a usage error, not a clap parse error:
            // print help and exit 1 rather than clap's default status 2.
            // Config and endpoint client are never touched on this path.
            Cli::command().print_help()?;
            std::process::exit(1);
        };

        let engine = Engine::new(self.config.as_deref(), mode).await?;
        engine.run(&file, self.requirement.as_deref()).await?;
        Ok(())
    }
}
