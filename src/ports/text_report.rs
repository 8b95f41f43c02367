//! Plain-Text Report Renderer
//!
//! Renders an analysis report as a readable text document: bounds first,
//! then exact costs, the per-line cost table, and the derivation steps.

use crate::domain::report::{AnalysisReport, Case, DerivationStep};
use crate::ports::ReportExporter;
use anyhow::Context;
use std::io::Result;

pub struct TextReportRenderer;

impl ReportExporter for TextReportRenderer {
    fn export(&self, report: &AnalysisReport, path: &str) -> anyhow::Result<()> {
        TextReportRenderer::export(report, path)
            .with_context(|| format!("Writing text report to {}", path))
    }
}

impl TextReportRenderer {
    /// Render a report and write it to `path`.
    pub fn export(report: &AnalysisReport, path: &str) -> Result<()> {
        let content = Self::to_text(report);
        std::fs::write(path, content)
    }

    /// Convert a report to its text form.
    pub fn to_text(report: &AnalysisReport) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Complexity analysis: {}",
            report.costs.functions.join(", ")
        ));
        lines.push("=".repeat(60));
        lines.push(String::new());

        let b = &report.solution.bounds;
        lines.push(format!(
            "Bounds: {} / {} / {}",
            b.omega, b.theta, b.big_o
        ));
        lines.push(String::new());

        lines.push("Case       Exact cost                     Growth".to_string());
        for case in Case::ALL {
            lines.push(format!(
                "{:<10} {:<30} {}",
                case.label(),
                report.solution.exact.get(case),
                report.solution.big_o.get(case)
            ));
        }
        lines.push(String::new());

        if !report.costs.lines.is_empty() {
            lines.push("Per-line costs (worst case):".to_string());
            for lc in &report.costs.lines {
                let text = lc.text.as_deref().unwrap_or("");
                lines.push(format!("  L{:<4} {:<40} {}", lc.line, text, lc.cost.worst));
            }
            lines.push(String::new());
        }

        if !report.solution.aggregate_steps.is_empty() {
            lines.push("Derivation:".to_string());
            Self::render_steps(&report.solution.aggregate_steps, &mut lines);
            lines.push(String::new());
        }

        if !report.solution.per_line_steps.is_empty() {
            lines.push("Line-by-line derivation:".to_string());
            Self::render_steps(&report.solution.per_line_steps, &mut lines);
        }

        lines.join("\n")
    }

    fn render_steps(steps: &[DerivationStep], lines: &mut Vec<String>) {
        let mut current_case = None;
        for step in steps {
            if current_case != Some(step.case) {
                current_case = Some(step.case);
                lines.push(format!("  [{}]", step.case.label()));
            }
            lines.push(format!("  {:>3}. {}", step.step, step.title));
            lines.push(format!("       {}", step.expression));
        }
    }
}
