use std::path::{Path, PathBuf};
use tracing::info;

use super::analyzer::AnalyzedFunctionRecord;
use crate::config::OutputMode;
use crate::error::{RefactoryError, Result};

/// Writes the `.refactor` sibling file from a set of analyzed functions.
///
/// Two output modes: a consolidated whole-file refactor prompt, or a copy of
/// the source with instruction comments spliced above each flagged function.
/// If nothing is flagged, nothing is written.
pub struct RefactorFileGenerator {
    mode: OutputMode,
}

impl RefactorFileGenerator {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    /// Produce the output file next to `file_path`, returning its path, or
    /// `None` when no function was flagged.
    ///
    /// The output string is assembled completely before a single write, so a
    /// failure never leaves a partial file behind.
    pub fn generate(
        &self,
        file_path: &Path,
        analyzed: &[AnalyzedFunctionRecord],
        original: &str,
    ) -> Result<Option<PathBuf>> {
        let flagged: Vec<&AnalyzedFunctionRecord> = analyzed
            .iter()
            .filter(|a| a.analysis.needs_refactor)
            .collect();
        if flagged.is_empty() {
            return Ok(None);
        }

        let content = match self.mode {
            OutputMode::Consolidated => consolidated_content(&flagged, original),
            OutputMode::Spliced => spliced_content(&flagged, original),
        };

        let output_path = refactor_path(file_path)?;
        std::fs::write(&output_path, content)?;
        info!(
            "wrote {} refactor suggestion(s) to {}",
            flagged.len(),
            output_path.display()
        );
        Ok(Some(output_path))
    }
}

/// Sibling path with `.refactor` between stem and extension
fn refactor_path(file_path: &Path) -> Result<PathBuf> {
    let stem = file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            RefactoryError::Output(format!("invalid file name: {}", file_path.display()))
        })?;
    let name = match file_path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.refactor.{}", stem, ext),
        None => format!("{}.refactor", stem),
    };
    Ok(file_path.with_file_name(name))
}

/// Flagged records are numbered in source order, ascending by start offset.
fn consolidated_content(flagged: &[&AnalyzedFunctionRecord], original: &str) -> String {
    let mut items: Vec<&&AnalyzedFunctionRecord> = flagged.iter().collect();
    items.sort_by_key(|item| item.record.start_index);

    let mut out = String::from(
        "Please refactor this file. Focus on the following functions:\n\n",
    );
    for (i, item) in items.iter().enumerate() {
        let prompt = item
            .analysis
            .refactor_prompt
            .as_deref()
            .unwrap_or("Refactor this function.");
        out.push_str(&format!(
            "{}. Function '{}': {}\n",
            i + 1,
            item.record.name,
            flatten_prompt(prompt)
        ));
    }
    out.push_str("\nOriginal file content:\n\n");
    out.push_str(original);
    out.push_str("\n\nReturn only the full refactored file, with no commentary.\n");
    out
}

/// Collapse a multi-line prompt to one line, dropping module-context echoes
/// and bare fence-tag lines the model sometimes includes
fn flatten_prompt(prompt: &str) -> String {
    prompt
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.contains("Module Context"))
        .filter(|line| !line.starts_with("```"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Insert a `/** REFACTOR: ... */` doc block above each flagged span.
///
/// Insertions run in descending start order so earlier offsets stay valid.
fn spliced_content(flagged: &[&AnalyzedFunctionRecord], original: &str) -> String {
    let mut items: Vec<&&AnalyzedFunctionRecord> = flagged.iter().collect();
    items.sort_by(|a, b| b.record.start_index.cmp(&a.record.start_index));

    let mut content = original.to_string();
    for item in items {
        let offset = item.record.start_index.min(content.len());
        // insert at line start so the block sits above the whole span
        let line_start = content[..offset].rfind('\n').map(|p| p + 1).unwrap_or(0);
        let indent: String = content[line_start..]
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect();
        let prompt = item
            .analysis
            .refactor_prompt
            .as_deref()
            .unwrap_or("Refactor this function.");
        content.insert_str(line_start, &comment_block(prompt, &indent));
    }
    content
}

fn comment_block(prompt: &str, indent: &str) -> String {
    let mut block = format!("{}/**\n{} * REFACTOR:\n", indent, indent);
    for line in prompt.lines() {
        block.push_str(&format!("{} * {}\n", indent, line.trim_end()));
    }
    block.push_str(&format!("{} */\n", indent));
    block
}
