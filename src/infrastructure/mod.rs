// Infrastructure adapters: JSON parsing/export and validation plumbing.

pub mod concurrency;

use crate::domain::ast::Program;
use crate::domain::report::AnalysisReport;
use crate::ports::{PseudocodeParser, ReportExporter, SyntaxValidator, ValidationOutcome};
use anyhow::{Context, Result};

/// Stand-in for the external grammar parser: accepts the AST contract as
/// a JSON document.
pub struct JsonProgramParser;

impl PseudocodeParser for JsonProgramParser {
    fn parse(&self, source: &str) -> Result<Program> {
        serde_json::from_str(source).context("Invalid program AST document")
    }
}

/// Validator that normalizes line endings and tabs so the annotator's
/// per-line attribution matches what the parser saw.
pub struct LineNormalizer {
    pub tab_width: usize,
}

impl Default for LineNormalizer {
    fn default() -> Self {
        LineNormalizer { tab_width: 4 }
    }
}

impl SyntaxValidator for LineNormalizer {
    fn validate(&self, source: &str) -> ValidationOutcome {
        let mut normalizations = Vec::new();

        let mut text = source.to_string();
        if text.contains("\r\n") {
            text = text.replace("\r\n", "\n");
            normalizations.push("normalized CRLF line endings".to_string());
        }
        if text.contains('\t') {
            text = text.replace('\t', &" ".repeat(self.tab_width));
            normalizations.push("expanded tabs to spaces".to_string());
        }
        let stripped: Vec<String> = text
            .lines()
            .map(|l| l.trim_end().to_string())
            .collect();
        let rejoined = stripped.join("\n");
        if rejoined != text {
            normalizations.push("stripped trailing whitespace".to_string());
            text = rejoined;
        }

        let mut errors = Vec::new();
        let mut depth: i64 = 0;
        for c in text.chars() {
            match c {
                '(' | '[' => depth += 1,
                ')' | ']' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                break;
            }
        }
        if depth != 0 {
            errors.push("unbalanced brackets".to_string());
        }

        ValidationOutcome {
            is_valid: errors.is_empty(),
            corrected_text: text,
            errors,
            normalizations,
        }
    }
}

/// Writes the full analysis report as pretty-printed JSON.
pub struct JsonReportExporter;

impl ReportExporter for JsonReportExporter {
    fn export(&self, report: &AnalysisReport, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(report).context("Serializing report")?;
        std::fs::write(path, content).with_context(|| format!("Writing report to {}", path))?;
        Ok(())
    }
}
