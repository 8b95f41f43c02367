/// End-to-end verification on the canonical quadratic example: a bubble
/// sort with two nested loops and a guarded swap.

use costscope::application::analyzer::AnalyzerConfig;
use costscope::application::AnalyzeUsecase;
use costscope::domain::ast::Program;
use costscope::infrastructure::{JsonReportExporter, LineNormalizer};
use costscope::ports::text_report::TextReportRenderer;

const SOURCE: &str = "for i \u{2190} 1 to n-1\n  for j \u{2190} 1 to n-i\n    if A[j] > A[j+1]\n      t \u{2190} A[j]\n      A[j] \u{2190} A[j+1]\n      A[j+1] \u{2190} t\n    end\nend";

fn bubble_sort_ast() -> Program {
    serde_json::from_str(
        r#"{"functions": [{
            "name": "bubble_sort",
            "params": [{"name": "A"}, {"name": "n"}],
            "body": {"statements": [{
                "type": "For", "var": "i",
                "start": {"type": "Literal", "value": 1},
                "end": {"type": "BinOp", "op": "-",
                        "left": {"type": "Var", "name": "n"},
                        "right": {"type": "Literal", "value": 1}},
                "line_start": 1, "line_end": 8,
                "body": {"statements": [{
                    "type": "For", "var": "j",
                    "start": {"type": "Literal", "value": 1},
                    "end": {"type": "BinOp", "op": "-",
                            "left": {"type": "Var", "name": "n"},
                            "right": {"type": "Var", "name": "i"}},
                    "line_start": 2, "line_end": 7,
                    "body": {"statements": [{
                        "type": "If",
                        "condition": {"type": "Compare", "op": ">",
                            "left": {"type": "ArrayAccess",
                                "array": {"type": "Var", "name": "A"},
                                "index": {"type": "Var", "name": "j"}},
                            "right": {"type": "ArrayAccess",
                                "array": {"type": "Var", "name": "A"},
                                "index": {"type": "BinOp", "op": "+",
                                    "left": {"type": "Var", "name": "j"},
                                    "right": {"type": "Literal", "value": 1}}}},
                        "line_start": 3, "line_end": 7,
                        "then_block": {"statements": [
                            {"type": "Assign",
                             "target": {"type": "Var", "name": "t"},
                             "value": {"type": "ArrayAccess",
                                "array": {"type": "Var", "name": "A"},
                                "index": {"type": "Var", "name": "j"}},
                             "line_start": 4, "line_end": 4},
                            {"type": "Assign",
                             "target": {"type": "ArrayAccess",
                                "array": {"type": "Var", "name": "A"},
                                "index": {"type": "Var", "name": "j"}},
                             "value": {"type": "Var", "name": "x"},
                             "line_start": 5, "line_end": 5},
                            {"type": "Assign",
                             "target": {"type": "Var", "name": "y"},
                             "value": {"type": "Var", "name": "t"},
                             "line_start": 6, "line_end": 6}
                        ]}
                    }]}
                }]}
            }]}
        }]}"#,
    )
    .unwrap()
}

fn analyze() -> costscope::domain::report::AnalysisReport {
    let validator = LineNormalizer::default();
    let exporter = JsonReportExporter;
    let usecase = AnalyzeUsecase {
        validator: &validator,
        exporter: &exporter,
    };
    usecase.analyze(
        &bubble_sort_ast(),
        SOURCE,
        &AnalyzerConfig::default(),
        true,
    )
}

#[test]
fn test_exact_costs_and_growth() {
    let report = analyze();

    assert_eq!(report.solution.exact.best, "n*(n - 1)/2");
    assert_eq!(report.solution.exact.avg, "5*n*(n - 1)/4");
    assert_eq!(report.solution.exact.worst, "2*n*(n - 1)");

    assert_eq!(report.solution.big_o.best, "O(n**2)");
    assert_eq!(report.solution.big_o.avg, "O(n**2)");
    assert_eq!(report.solution.big_o.worst, "O(n**2)");

    assert_eq!(report.solution.bounds.omega, "\u{3a9}(n**2)");
    assert_eq!(report.solution.bounds.theta, "\u{398}(n**2)");
    assert_eq!(report.solution.bounds.big_o, "O(n**2)");
}

#[test]
fn test_annotated_lines() {
    let report = analyze();

    // The comparison executes once per (i, j) pair in every case.
    let line3 = report.costs.lines.iter().find(|l| l.line == 3).unwrap();
    assert_eq!(
        line3.cost.worst,
        "Sum(Sum(1, (j, 1, n - i)), (i, 1, n - 1))"
    );
    assert_eq!(line3.cost.best, line3.cost.worst);
    assert_eq!(line3.text.as_deref(), Some("    if A[j] > A[j+1]"));

    // Swap lines are skipped at best, halved on average.
    let line4 = report.costs.lines.iter().find(|l| l.line == 4).unwrap();
    assert_eq!(line4.cost.best, "0");
    assert_eq!(
        line4.cost.avg,
        "Sum(Sum(1/2, (j, 1, n - i)), (i, 1, n - 1))"
    );
}

#[test]
fn test_derivation_traces_present() {
    let report = analyze();

    // Inner summation resolved before the outer one.
    let resolutions: Vec<&str> = report
        .solution
        .aggregate_steps
        .iter()
        .filter(|s| s.title.starts_with("Resolve"))
        .map(|s| s.expression.as_str())
        .collect();
    assert!(resolutions.len() >= 2);
    assert!(resolutions[0].contains("(j, 1, n - i)"));
    assert!(resolutions[1].contains("(i, 1, n - 1)"));

    // The per-line trace starts from the C_i * L_i formula.
    let first = &report.solution.per_line_steps[0];
    assert!(first.expression.starts_with("T(n) = C1*L"));
}

#[test]
fn test_report_round_trips_through_json() {
    let report = analyze();
    let raw = serde_json::to_string(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["solution"]["exact"]["worst"], "2*n*(n - 1)");
    assert_eq!(value["solution"]["bounds"]["theta"], "\u{398}(n**2)");
    assert_eq!(value["costs"]["totalCost"]["best"],
        "Sum(Sum(1, (j, 1, n - i)), (i, 1, n - 1))");
}

#[test]
fn test_text_rendering() {
    let report = analyze();
    let text = TextReportRenderer::to_text(&report);
    assert!(text.contains("Complexity analysis: bubble_sort"));
    assert!(text.contains("\u{3a9}(n**2) / \u{398}(n**2) / O(n**2)"));
    assert!(text.contains("n*(n - 1)/2"));
}

#[test]
fn test_crlf_source_lines_still_attach() {
    let validator = LineNormalizer::default();
    let exporter = JsonReportExporter;
    let usecase = AnalyzeUsecase {
        validator: &validator,
        exporter: &exporter,
    };
    let crlf = SOURCE.replace('\n', "\r\n");
    let report = usecase.analyze(&bubble_sort_ast(), &crlf, &AnalyzerConfig::default(), false);
    let line3 = report.costs.lines.iter().find(|l| l.line == 3).unwrap();
    assert_eq!(line3.text.as_deref(), Some("    if A[j] > A[j+1]"));
    assert_eq!(report.solution.exact.worst, "2*n*(n - 1)");
}
