pub mod analyzer;
pub mod solver;

use crate::domain::ast::Program;
use crate::domain::report::AnalysisReport;
use crate::ports::{ReportExporter, SyntaxValidator};
use analyzer::AnalyzerConfig;
use anyhow::Result;

/// Full pipeline over injected ports: validate the source text, annotate
/// the AST, solve the totals, and (optionally) export the report.
pub struct AnalyzeUsecase<'a> {
    pub validator: &'a dyn SyntaxValidator,
    pub exporter: &'a dyn ReportExporter,
}

impl<'a> AnalyzeUsecase<'a> {
    /// Analyze one program. The AST comes from the external parser; the
    /// source text drives per-line attribution.
    pub fn analyze(
        &self,
        program: &Program,
        source_text: &str,
        config: &AnalyzerConfig,
        show_steps: bool,
    ) -> AnalysisReport {
        let outcome = self.validator.validate(source_text);
        let costs = analyzer::analyze_costs(program, &outcome.corrected_text, config);
        let solution = solver::solve(&costs.total_cost, &costs.lines, show_steps);
        AnalysisReport { costs, solution }
    }

    pub fn run(
        &self,
        program: &Program,
        source_text: &str,
        config: &AnalyzerConfig,
        show_steps: bool,
        export_path: &str,
    ) -> Result<()> {
        let report = self.analyze(program, source_text, config, show_steps);
        self.exporter.export(&report, export_path)
    }
}
