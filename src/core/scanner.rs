use regex::Regex;
use serde::{Deserialize, Serialize};

use super::context::{ContextExtractor, ModuleContext};
use crate::error::{RefactoryError, Result};

/// One extracted function definition with its source span and module context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Name of the function or the binding it is assigned to
    pub name: String,

    /// Verbatim source span, including an adjacent leading doc comment
    pub code: String,

    /// Byte offset where the span starts in the original content
    pub start_index: usize,

    /// Byte offset one past the end of the span
    pub end_index: usize,

    /// Most recent `REFACTOR:`-tagged doc block preceding the function,
    /// or empty. Left over by previous runs of the spliced output mode;
    /// carried for downstream consumers, not consulted during analysis.
    pub pre_text: String,

    /// Imports and top-level declarations visible before the function
    pub module_context: ModuleContext,
}

/// Locates top-level function definitions in JavaScript/TypeScript source.
///
/// A regex finds candidate heads (named declarations and const/let/var
/// function or arrow bindings); parameter lists and bodies are then walked
/// with explicit paren/brace depth counters so nested bodies resolve to the
/// correct closing brace. Template-literal interpolation and object-typed
/// return annotations are known blind spots of the head heuristics.
pub struct FunctionScanner {
    head: Regex,
    doc_block: Regex,
    context: ContextExtractor,
}

impl FunctionScanner {
    pub fn new() -> Result<Self> {
        let head = Regex::new(
            r"(?m)^[ \t]*(?:export\s+)?(?:(?:async\s+)?function\s+(?P<fname>[A-Za-z_$][A-Za-z0-9_$]*)|(?:const|let|var)\s+(?P<cname>[A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?:async\s+)?(?:function(?:\s+[A-Za-z_$][A-Za-z0-9_$]*)?\s*)?)",
        )
        .map_err(|e| RefactoryError::Scanner(e.to_string()))?;

        let doc_block =
            Regex::new(r"(?s)/\*\*.*?\*/").map_err(|e| RefactoryError::Scanner(e.to_string()))?;

        Ok(Self {
            head,
            doc_block,
            context: ContextExtractor::new()?,
        })
    }

    /// Extract function records in source order.
    ///
    /// Spans are sorted ascending by `start_index` and never overlap:
    /// scanning resumes at the end of each resolved body. A file with no
    /// function-shaped definitions yields an empty vector.
    pub fn scan(&self, content: &str) -> Result<Vec<FunctionRecord>> {
        let mut records = Vec::new();
        let mut cursor = 0usize;

        while cursor < content.len() {
            let Some(caps) = self.head.captures(&content[cursor..]) else {
                break;
            };
            let Some(head) = caps.get(0) else {
                break;
            };
            let head_start = cursor + head.start();
            let head_end = cursor + head.end();

            let Some(name) = caps
                .name("fname")
                .or_else(|| caps.name("cname"))
                .map(|m| m.as_str().to_string())
            else {
                cursor = head_end;
                continue;
            };
            let arrow_candidate =
                caps.name("cname").is_some() && !head.as_str().contains("function");

            // Heads that do not resolve to a parameter list and body are
            // plain value bindings; skip past them.
            let Some(end_index) = body_end(content, head_end, arrow_candidate) else {
                cursor = head_end;
                continue;
            };

            let span_start = adjacent_doc_start(content, head_start, cursor).unwrap_or(head_start);
            let pre_text = self.nearest_refactor_marker(&content[..head_start]);
            let module_context = self.context.extract(content, span_start)?;

            records.push(FunctionRecord {
                name,
                code: content[span_start..end_index].to_string(),
                start_index: span_start,
                end_index,
                pre_text,
                module_context,
            });
            cursor = end_index;
        }

        Ok(records)
    }

    fn nearest_refactor_marker(&self, preceding: &str) -> String {
        self.doc_block
            .find_iter(preceding)
            .filter(|m| m.as_str().contains("REFACTOR:"))
            .last()
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }
}

/// Start of a doc comment immediately preceding the head, if one is
/// adjacent (whitespace only in between) and does not reach back past
/// `floor` into an already-consumed span.
fn adjacent_doc_start(content: &str, head_start: usize, floor: usize) -> Option<usize> {
    let before = content[..head_start].trim_end();
    if !before.ends_with("*/") {
        return None;
    }
    let doc_start = before.rfind("/**")?;
    if doc_start < floor {
        return None;
    }
    // The opener must belong to the terminating comment
    if content[doc_start..before.len() - 2].contains("*/") {
        return None;
    }
    Some(doc_start)
}

/// Resolve the end of a function body starting from the head match.
///
/// Walks the parameter list with a paren counter, then either a braced body
/// with a brace counter or, for arrows, an expression body ending at the
/// statement boundary. Returns `None` when the head turns out not to be a
/// function (value binding, ambient declaration).
fn body_end(content: &str, head_end: usize, arrow_candidate: bool) -> Option<usize> {
    let bytes = content.as_bytes();

    let mut i = head_end;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if bytes.get(i) != Some(&b'(') {
        return None;
    }
    let params_end = balanced_end(bytes, i, b'(', b')')?;

    if arrow_candidate {
        let arrow = find_arrow(bytes, params_end)?;
        let mut j = arrow + 2;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if bytes.get(j) == Some(&b'{') {
            balanced_end(bytes, j, b'{', b'}')
        } else {
            Some(statement_end(bytes, j))
        }
    } else {
        // Skip an optional return annotation up to the opening brace
        let mut j = params_end;
        while j < bytes.len() {
            match bytes[j] {
                b'{' => return balanced_end(bytes, j, b'{', b'}'),
                b';' => return None,
                _ => j += 1,
            }
        }
        None
    }
}

/// Index one past the delimiter matching `bytes[open_idx]`, tracking
/// nesting depth and skipping string literals and comments.
fn balanced_end(bytes: &[u8], open_idx: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open_idx;
    while i < bytes.len() {
        let b = bytes[i];
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i + 1);
            }
        } else {
            match b {
                b'\'' | b'"' | b'`' => {
                    i = skip_string(bytes, i, b)?;
                    continue;
                }
                b'/' => match bytes.get(i + 1) {
                    Some(b'/') => {
                        i = skip_line(bytes, i);
                        continue;
                    }
                    Some(b'*') => {
                        i = skip_block_comment(bytes, i)?;
                        continue;
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Position of `=>` between the parameter list and the body, or `None`
/// when a statement boundary or block intervenes (not an arrow after all).
fn find_arrow(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < bytes.len() {
        match bytes[i] {
            b'=' if bytes[i + 1] == b'>' => return Some(i),
            b';' | b'{' | b')' => return None,
            _ => {}
        }
        i += 1;
    }
    None
}

/// End of an expression-bodied statement: the first `;` or newline at
/// bracket depth zero, or end of input. A newline does not end the
/// statement when the expression visibly continues across it.
fn statement_end(bytes: &[u8], from: usize) -> usize {
    let mut depth = 0usize;
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'\'' | b'"' | b'`' => match skip_string(bytes, i, bytes[i]) {
                Some(next) => {
                    i = next;
                    continue;
                }
                None => return bytes.len(),
            },
            b';' if depth == 0 => return i + 1,
            b'\n' if depth == 0 && !continues_expression(bytes, i) => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// A depth-zero newline continues the expression when the previous line
/// ends with a binary operator or the next line starts with a chained
/// member access, ternary arm, or logical operator.
fn continues_expression(bytes: &[u8], newline: usize) -> bool {
    let mut i = newline;
    while i > 0 && matches!(bytes[i - 1], b' ' | b'\t' | b'\r') {
        i -= 1;
    }
    if i > 0
        && matches!(
            bytes[i - 1],
            b'+' | b'-'
                | b'*'
                | b'/'
                | b'%'
                | b'<'
                | b'>'
                | b'='
                | b'&'
                | b'|'
                | b'?'
                | b':'
                | b','
                | b'.'
        )
    {
        return true;
    }

    let mut j = newline + 1;
    while j < bytes.len() && bytes[j].is_ascii_whitespace() {
        j += 1;
    }
    matches!(bytes.get(j), Some(b'.' | b'?' | b':' | b'&' | b'|'))
}

fn skip_string(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

fn skip_block_comment(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return Some(i + 2);
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(content: &str) -> Vec<FunctionRecord> {
        FunctionScanner::new().unwrap().scan(content).unwrap()
    }

    #[test]
    fn test_named_function_declaration() {
        let records = scan("function add(a, b) {\n    return a + b;\n}\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "add");
        assert!(records[0].code.starts_with("function add"));
        assert!(records[0].code.ends_with('}'));
    }

    #[test]
    fn test_async_arrow_binding() {
        let source = "const fetchUser = async (id) => {\n    return api.get(id);\n};\n";
        let records = scan(source);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "fetchUser");
        assert!(records[0].code.contains("api.get(id)"));
    }

    #[test]
    fn test_expression_bodied_arrow_ends_at_statement_boundary() {
        let source = "const double = (x) => x * 2;\nconst label = 'unused';\n";
        let records = scan(source);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, "const double = (x) => x * 2;");
    }

    #[test]
    fn test_expression_arrow_continues_past_trailing_operator() {
        let source = "const add = (x) => x +\n    2;\nconst other = 1;\n";
        let records = scan(source);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, "const add = (x) => x +\n    2;");
    }

    #[test]
    fn test_expression_arrow_continues_into_chained_call() {
        let source =
            "const load = (id) => api.get(id)\n    .then((r) => r.json());\nlet done = true;\n";
        let records = scan(source);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "load");
        assert!(records[0].code.ends_with(".then((r) => r.json());"));
    }

    #[test]
    fn test_value_bindings_are_not_functions() {
        let source = "const limit = 5;\nconst total = (a + b) * 2;\n";
        assert!(scan(source).is_empty());
    }

    #[test]
    fn test_zero_matches_yields_empty_sequence() {
        assert!(scan("// just a comment\nimport fs from 'fs';\n").is_empty());
        assert!(scan("").is_empty());
    }

    #[test]
    fn test_deeply_nested_braces_resolve_to_outer_close() {
        let source = r#"function outer(x) {
    if (x) {
        return items.map((i) => {
            return { value: i, nested: { deep: true } };
        });
    }
    return null;
}
"#;
        let records = scan(source);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].end_index, source.trim_end().len());
    }

    #[test]
    fn test_braces_in_strings_and_comments_are_ignored() {
        let source = "function tricky() {\n    // a } in a comment\n    const s = \"}\";\n    return s;\n}\n";
        let records = scan(source);
        assert_eq!(records.len(), 1);
        assert!(records[0].code.ends_with('}'));
        assert!(records[0].code.contains("return s;"));
    }

    #[test]
    fn test_adjacent_doc_block_is_included_in_span() {
        let source = "/**\n * Adds two numbers.\n */\nfunction add(a, b) {\n    return a + b;\n}\n";
        let records = scan(source);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start_index, 0);
        assert!(records[0].code.starts_with("/**"));
    }

    #[test]
    fn test_refactor_marker_lands_in_pre_text() {
        let source = "/**\n * REFACTOR: split this up\n */\nfunction big() {\n    return 1;\n}\n";
        let records = scan(source);
        assert_eq!(records.len(), 1);
        assert!(records[0].pre_text.contains("REFACTOR: split this up"));
    }

    #[test]
    fn test_spans_are_sorted_and_non_overlapping() {
        let source = r#"import fs from 'fs';

function first(a) {
    return a;
}

const second = (b) => {
    return b + 1;
};

async function third(c) {
    return await c;
}
"#;
        let records = scan(source);
        assert_eq!(records.len(), 3);
        assert_eq!(
            records.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["first", "second", "third"]
        );
        for pair in records.windows(2) {
            assert!(pair[0].start_index < pair[1].start_index);
            assert!(pair[0].end_index <= pair[1].start_index);
        }
    }

    #[test]
    fn test_gaps_plus_spans_reconstruct_original_content() {
        let source = "const a = (x) => x;\nlet gap = 1;\nfunction b() {\n    return gap;\n}\n";
        let records = scan(source);
        assert!(!records.is_empty());

        let mut rebuilt = String::new();
        let mut pos = 0;
        for record in &records {
            rebuilt.push_str(&source[pos..record.start_index]);
            rebuilt.push_str(&record.code);
            pos = record.end_index;
        }
        rebuilt.push_str(&source[pos..]);
        assert_eq!(rebuilt, source);
    }

    #[test]
    fn test_module_context_visible_before_function() {
        let source = "import api from './api';\nconst RETRIES = 3;\n\nfunction load() {\n    return api.get(RETRIES);\n}\n";
        let records = scan(source);
        assert_eq!(records.len(), 1);
        let ctx = &records[0].module_context;
        assert_eq!(ctx.imports.len(), 1);
        assert!(ctx.imports[0].contains("./api"));
        assert!(ctx.declarations.iter().any(|d| d.contains("RETRIES")));
    }
}
