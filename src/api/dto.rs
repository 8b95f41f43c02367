use crate::application::analyzer::AnalyzerConfig;
use crate::domain::ast::Program;
use crate::domain::report::{CostTriple, LineCostRecord};
use serde::Deserialize;

fn default_steps() -> bool {
    true
}

/// Params of the `ANALYZE` command: the AST from the external parser,
/// the source text for per-line attribution, and optional knobs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default)]
    pub source: String,
    pub ast: Program,
    #[serde(default)]
    pub config: Option<AnalyzerConfig>,
    #[serde(default = "default_steps")]
    pub steps: bool,
}

/// Params of the `SOLVE` command: a cost triple in the annotator's
/// grammar, plus optional per-line records for the didactic trace.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    pub total: CostTriple,
    #[serde(default)]
    pub lines: Vec<LineCostRecord>,
    #[serde(default = "default_steps")]
    pub steps: bool,
}
