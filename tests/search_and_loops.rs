/// End-to-end verification on programs with early returns, while loops,
/// and loop-control accounting.

use costscope::application::analyzer::{analyze_costs, AnalyzerConfig, IncrementStyle};
use costscope::application::solver;
use costscope::domain::ast::Program;

fn program(json: &str) -> Program {
    serde_json::from_str(json).unwrap()
}

fn linear_search() -> Program {
    program(
        r#"{"functions": [{
            "name": "search",
            "params": [{"name": "A"}, {"name": "n"}, {"name": "x"}],
            "body": {"statements": [
                {"type": "For", "var": "i",
                 "start": {"type": "Literal", "value": 1},
                 "end": {"type": "Var", "name": "n"},
                 "line_start": 1, "line_end": 3,
                 "body": {"statements": [
                    {"type": "If",
                     "condition": {"type": "Compare", "op": "==",
                        "left": {"type": "ArrayAccess",
                            "array": {"type": "Var", "name": "A"},
                            "index": {"type": "Var", "name": "i"}},
                        "right": {"type": "Var", "name": "x"}},
                     "line_start": 2, "line_end": 3,
                     "then_block": {"statements": [
                        {"type": "Return",
                         "value": {"type": "Var", "name": "i"},
                         "line_start": 3, "line_end": 3}
                     ]}}
                 ]}},
                {"type": "Return",
                 "value": {"type": "Literal", "value": -1},
                 "line_start": 4, "line_end": 4}
            ]}
        }]}"#,
    )
}

const SEARCH_SOURCE: &str = "for i \u{2190} 1 to n\n  if A[i] == x\n    return i\nreturn -1";

#[test]
fn test_linear_search_asymmetric_bounds() {
    let costs = analyze_costs(&linear_search(), SEARCH_SOURCE, &AnalyzerConfig::default());
    let out = solver::solve(&costs.total_cost, &costs.lines, false);

    // A hit on the first element: one comparison and one return.
    assert_eq!(out.exact.best, "2");
    assert_eq!(out.big_o.best, "O(1)");

    assert_eq!(out.exact.avg, "3*n/2 + 1");
    assert_eq!(out.exact.worst, "2*n + 1");
    assert_eq!(out.big_o.worst, "O(n)");

    // Best and worst growth disagree, so theta reports the average case.
    assert_eq!(out.bounds.omega, "\u{3a9}(1)");
    assert_eq!(out.bounds.theta, "\u{398}(n)");
    assert_eq!(out.bounds.big_o, "O(n)");
}

#[test]
fn test_while_loop_under_enclosing_for() {
    // for i <- 1 to n { while x > 0 { x <- x - 1 } }
    // The while bound is the nearest enclosing loop bound, n here.
    let prog = program(
        r#"{"functions": [{
            "name": "drain",
            "body": {"statements": [
                {"type": "For", "var": "i",
                 "start": {"type": "Literal", "value": 1},
                 "end": {"type": "Var", "name": "n"},
                 "line_start": 1, "line_end": 3,
                 "body": {"statements": [
                    {"type": "While",
                     "condition": {"type": "Compare", "op": ">",
                        "left": {"type": "Var", "name": "x"},
                        "right": {"type": "Literal", "value": 0}},
                     "line_start": 2, "line_end": 3,
                     "body": {"statements": [
                        {"type": "Assign",
                         "target": {"type": "Var", "name": "x"},
                         "value": {"type": "BinOp", "op": "-",
                            "left": {"type": "Var", "name": "x"},
                            "right": {"type": "Literal", "value": 1}},
                         "line_start": 3, "line_end": 3}
                     ]}}
                 ]}}
            ]}
        }]}"#,
    );
    let source = "for i \u{2190} 1 to n\n  while x > 0\n    x \u{2190} x - 1";
    let costs = analyze_costs(&prog, source, &AnalyzerConfig::default());

    // The innermost line multiplies by both loops, worst case n * n.
    let line3 = costs.lines.iter().find(|l| l.line == 3).unwrap();
    assert_eq!(line3.cost.worst, "Sum(Sum(2, (t, 1, n)), (i, 1, n))");
    assert_eq!(line3.cost.best, "0");

    let out = solver::solve(&costs.total_cost, &[], false);
    assert_eq!(out.big_o.worst, "O(n**2)");
    // The while guard may fail immediately on every for-iteration.
    assert_eq!(out.big_o.best, "O(n)");
}

#[test]
fn test_loop_control_accounting() {
    let prog = program(
        r#"{"functions": [{
            "name": "touch",
            "body": {"statements": [
                {"type": "For", "var": "i",
                 "start": {"type": "Literal", "value": 1},
                 "end": {"type": "Var", "name": "n"},
                 "line_start": 1, "line_end": 2,
                 "body": {"statements": [
                    {"type": "Assign",
                     "target": {"type": "Var", "name": "x"},
                     "value": {"type": "Literal", "value": 0},
                     "line_start": 2, "line_end": 2}
                 ]}}
            ]}
        }]}"#,
    );
    let source = "for i \u{2190} 1 to n\n  x \u{2190} 0";

    let free = analyze_costs(&prog, source, &AnalyzerConfig::default());
    let free_out = solver::solve(&free.total_cost, &[], false);
    assert_eq!(free_out.exact.worst, "n");

    let counted = AnalyzerConfig {
        count_loop_control: true,
        ..AnalyzerConfig::default()
    };
    let charged = analyze_costs(&prog, source, &counted);
    let charged_out = solver::solve(&charged.total_cost, &[], false);
    // n body steps + (n + 1) header evaluations.
    assert_eq!(charged_out.exact.worst, "2*n + 1");
    assert_eq!(charged_out.big_o.worst, "O(n)");

    let expanded = AnalyzerConfig {
        count_loop_control: true,
        increment_style: IncrementStyle::Expanded,
        ..AnalyzerConfig::default()
    };
    let node_cost = analyze_costs(&prog, "", &expanded);
    let for_node = node_cost.nodes.iter().find(|n| n.kind == "For").unwrap();
    // 1 init + (n + 1) tests + 2n increments.
    assert_eq!(for_node.own_cost.worst, "3*n + 2");
}

#[test]
fn test_config_deserializes_from_camel_case() {
    let config: AnalyzerConfig = serde_json::from_str(
        r#"{"countLoopControl": true, "incrementStyle": "expanded", "defaultBranchProbability": 0.25}"#,
    )
    .unwrap();
    assert!(config.count_loop_control);
    assert_eq!(config.increment_style, IncrementStyle::Expanded);
    assert!((config.default_branch_probability - 0.25).abs() < 1e-9);
}
