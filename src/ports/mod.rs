use crate::domain::ast::Program;
use crate::domain::report::AnalysisReport;
use anyhow::Result;

pub mod text_report;

/// Seam for the external grammar parser that turns pseudocode text into
/// the AST contract.
pub trait PseudocodeParser {
    fn parse(&self, source: &str) -> Result<Program>;
}

/// Result of upstream syntax validation/normalization.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub corrected_text: String,
    pub errors: Vec<String>,
    pub normalizations: Vec<String>,
}

/// Seam for the validator that runs before parsing. This is also where a
/// natural-language-to-pseudocode converter would plug in.
pub trait SyntaxValidator {
    fn validate(&self, source: &str) -> ValidationOutcome;
}

pub trait ReportExporter {
    fn export(&self, report: &AnalysisReport, path: &str) -> Result<()>;
}
