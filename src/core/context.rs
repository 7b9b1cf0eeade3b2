use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RefactoryError, Result};

/// Imports and top-level declarations textually preceding a function,
/// supplied to the model so verdicts are informed by module context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleContext {
    /// Import-shaped lines, in order of appearance, trimmed
    pub imports: Vec<String>,

    /// Top-level binding and type-alias declarations, in order, trimmed
    pub declarations: Vec<String>,

    /// Verbatim content preceding the function
    pub full_context: String,
}

/// Derives the module context visible before a given offset.
///
/// Recomputed per function; results depend only on the content slice, so an
/// offset-keyed cache would be a safe optimization.
pub struct ContextExtractor {
    imports: Regex,
    declarations: Regex,
}

impl ContextExtractor {
    pub fn new() -> Result<Self> {
        // ES module imports, bare side-effect imports, and CommonJS requires
        let imports = Regex::new(
            r#"(?m)^[ \t]*(?:import\s+(?:[^'";\n]+\s+from\s+)?["'][^"']+["']|(?:const|let|var)\s+[\w$\{\},:\s]+?=\s*require\(\s*["'][^"']+["']\s*\))\s*;?"#,
        )
        .map_err(|e| RefactoryError::Scanner(e.to_string()))?;

        // A binding keyword, an identifier, and a value or braces up to a
        // statement boundary
        let declarations = Regex::new(
            r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var|type)\s+[A-Za-z_$][A-Za-z0-9_$]*\s*(?::[^=;\n]+)?=\s*(?:\{[^}]*\}|[^;\n]+);?",
        )
        .map_err(|e| RefactoryError::Scanner(e.to_string()))?;

        Ok(Self {
            imports,
            declarations,
        })
    }

    /// Collect imports and declarations from `content[..upto]`.
    ///
    /// The offset is a caller contract: it must lie within the content and
    /// on a character boundary. Violations are surfaced as errors, never
    /// silently defaulted.
    pub fn extract(&self, content: &str, upto: usize) -> Result<ModuleContext> {
        if upto > content.len() || !content.is_char_boundary(upto) {
            return Err(RefactoryError::InvalidOffset {
                offset: upto,
                len: content.len(),
            });
        }

        let visible = &content[..upto];

        let imports = self
            .imports
            .find_iter(visible)
            .map(|m| m.as_str().trim().to_string())
            .collect();

        let declarations = self
            .declarations
            .find_iter(visible)
            .map(|m| m.as_str().trim().to_string())
            .collect();

        Ok(ModuleContext {
            imports,
            declarations,
            full_context: visible.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(content: &str, upto: usize) -> ModuleContext {
        ContextExtractor::new().unwrap().extract(content, upto).unwrap()
    }

    #[test]
    fn test_collects_import_variants_in_order() {
        let source = concat!(
            "import fs from 'fs';\n",
            "import './side-effect';\n",
            "import { join, resolve } from \"path\";\n",
            "const lodash = require('lodash');\n",
        );
        let ctx = extract(source, source.len());
        assert_eq!(ctx.imports.len(), 4);
        assert!(ctx.imports[0].starts_with("import fs"));
        assert!(ctx.imports[1].contains("side-effect"));
        assert!(ctx.imports[3].contains("require('lodash')"));
    }

    #[test]
    fn test_collects_declarations_trimmed() {
        let source = "   const MAX = 10;\nlet current = MAX - 1;\ntype Id = string;\n";
        let ctx = extract(source, source.len());
        assert_eq!(ctx.declarations.len(), 3);
        assert_eq!(ctx.declarations[0], "const MAX = 10;");
        assert_eq!(ctx.declarations[2], "type Id = string;");
    }

    #[test]
    fn test_only_content_before_offset_is_visible() {
        let source = "const before = 1;\nconst after = 2;\n";
        let upto = source.find("const after").unwrap();
        let ctx = extract(source, upto);
        assert_eq!(ctx.declarations.len(), 1);
        assert!(ctx.declarations[0].contains("before"));
        assert_eq!(ctx.full_context, &source[..upto]);
    }

    #[test]
    fn test_zero_offset_yields_empty_context() {
        let ctx = extract("const a = 1;\n", 0);
        assert!(ctx.imports.is_empty());
        assert!(ctx.declarations.is_empty());
        assert_eq!(ctx.full_context, "");
    }

    #[test]
    fn test_out_of_bounds_offset_is_an_error() {
        let extractor = ContextExtractor::new().unwrap();
        let err = extractor.extract("short", 99).unwrap_err();
        assert!(matches!(
            err,
            RefactoryError::InvalidOffset { offset: 99, len: 5 }
        ));
    }

    #[test]
    fn test_non_char_boundary_offset_is_an_error() {
        let extractor = ContextExtractor::new().unwrap();
        // 'é' is two bytes; offset 1 splits it
        let err = extractor.extract("é = 1;", 1).unwrap_err();
        assert!(matches!(err, RefactoryError::InvalidOffset { .. }));
    }
}
