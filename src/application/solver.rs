//! Series Solver
//!
//! Takes the annotator's string-form cost expressions, resolves every
//! summation to closed form (innermost first), simplifies, factors when the
//! factored form is no longer than the expanded one, and classifies growth
//! to produce Big-O labels and Ω/Θ/O bounds.
//!
//! The solver never fails: any subexpression that cannot be parsed or
//! resolved degrades to an `unknown(<text>)` leaf and the pipeline carries
//! it through to the final labels.

use crate::domain::algebra::{
    self, atom_mentions_var, explicit_exponent, factor, factored_to_expr, poly_to_expr, to_poly,
    Monomial,
};
use crate::domain::expr::{SumLimit, SymExpr};
use crate::domain::parse::parse_cost_expr;
use crate::domain::report::{
    Bounds, Case, CostTriple, DerivationStep, LineCostRecord, SolutionReport,
};
use std::collections::HashMap;

/// The distinguished problem-size variable.
const SIZE_VAR: &str = "n";

/// Resolve a cost triple. `per_line` (possibly empty) feeds the per-line
/// derivation trace; `show_steps` gates both traces.
pub fn solve(total: &CostTriple, per_line: &[LineCostRecord], show_steps: bool) -> SolutionReport {
    let mut aggregate_steps = Vec::new();
    let mut exact = Vec::with_capacity(3);

    for case in Case::ALL {
        // Aggregate numbering restarts per case.
        let mut counter = 1;
        let (expr, steps) = solve_case(total.get(case), case, &mut counter);
        if show_steps {
            aggregate_steps.extend(steps);
        }
        exact.push(expr);
    }

    let labels: Vec<String> = exact.iter().map(extract_big_o).collect();
    let bounds = derive_bounds(&labels[0], &labels[1], &labels[2]);

    let per_line_steps = if show_steps && !per_line.is_empty() {
        line_by_line_steps(per_line)
    } else {
        Vec::new()
    };

    SolutionReport {
        exact: CostTriple {
            best: exact[0].to_string(),
            avg: exact[1].to_string(),
            worst: exact[2].to_string(),
        },
        big_o: CostTriple {
            best: labels[0].clone(),
            avg: labels[1].clone(),
            worst: labels[2].clone(),
        },
        bounds,
        aggregate_steps,
        per_line_steps,
    }
}

// ============================================================================
// Per-case pipeline
// ============================================================================

fn solve_case(expr_str: &str, case: Case, counter: &mut usize) -> (SymExpr, Vec<DerivationStep>) {
    let mut steps = Vec::new();
    let trimmed = expr_str.trim();
    if trimmed.is_empty() || trimmed == "0" {
        return (SymExpr::zero(), steps);
    }

    let parsed = match parse_cost_expr(trimmed) {
        Ok(p) => p,
        Err(_) => return (SymExpr::Unknown(trimmed.to_string()), steps),
    };
    let expr = parsed.expr;

    // Resolve every unique summation, innermost first.
    let mut cache: HashMap<String, SymExpr> = HashMap::new();
    let mut sums = Vec::new();
    collect_sums(&expr, &mut sums);
    for sum in sums {
        let key = sum.to_string();
        if cache.contains_key(&key) {
            continue;
        }
        let resolved = resolve_sum_node(sum, &cache, case, counter, &mut steps);
        cache.insert(key, resolved);
    }

    let substituted = substitute(&expr, &cache);
    if !cache.is_empty() && substituted != expr {
        push_step(
            &mut steps,
            counter,
            case,
            format!("Substitute resolved summations ({})", case.label()),
            format!("T(n) = {}", substituted),
        );
    }

    let simplified = algebra::simplify(&substituted);
    if simplified.to_string() != substituted.to_string() {
        push_step(
            &mut steps,
            counter,
            case,
            format!("Simplify algebraically ({})", case.label()),
            format!("T(n) = {}", simplified),
        );
    }

    // Decimal coefficients were already canonicalized to exact rationals
    // while parsing; surface that as a step when the input had any.
    if parsed.had_decimals {
        push_step(
            &mut steps,
            counter,
            case,
            format!("Convert decimal coefficients to fractions ({})", case.label()),
            format!("T(n) = {}", simplified),
        );
    }

    let simplified_text = simplified.to_string();
    let final_expr = match factor(&to_poly(&simplified)) {
        Some(f) => {
            let factored = factored_to_expr(&f);
            let factored_text = factored.to_string();
            if factored_text.len() <= simplified_text.len() {
                if factored_text != simplified_text {
                    push_step(
                        &mut steps,
                        counter,
                        case,
                        format!("Factor ({})", case.label()),
                        format!("T(n) = {}", factored_text),
                    );
                }
                factored
            } else {
                simplified
            }
        }
        None => simplified,
    };

    push_step(
        &mut steps,
        counter,
        case,
        format!("Final result ({})", case.label()),
        format!("T(n) = {}", final_expr),
    );

    (final_expr, steps)
}

fn push_step(
    steps: &mut Vec<DerivationStep>,
    counter: &mut usize,
    case: Case,
    title: String,
    expression: String,
) {
    steps.push(DerivationStep {
        step: *counter,
        case,
        title,
        expression,
    });
    *counter += 1;
}

// ============================================================================
// Summation resolution
// ============================================================================

/// Post-order collection, so inner sums precede the sums containing them.
fn collect_sums<'e>(expr: &'e SymExpr, out: &mut Vec<&'e SymExpr>) {
    match expr {
        SymExpr::Num(_) | SymExpr::Var(_) | SymExpr::Unknown(_) => {}
        SymExpr::Add(xs) | SymExpr::Mul(xs) | SymExpr::Func(_, xs) => {
            for x in xs {
                collect_sums(x, out);
            }
        }
        SymExpr::Pow(a, b) | SymExpr::Div(a, b) | SymExpr::Min(a, b) | SymExpr::Max(a, b) => {
            collect_sums(a, out);
            collect_sums(b, out);
        }
        SymExpr::Sum(body, limits) => {
            collect_sums(body, out);
            for l in limits {
                collect_sums(&l.lo, out);
                collect_sums(&l.hi, out);
            }
            out.push(expr);
        }
    }
}

/// Replace every cached summation (and rebuild everything around it).
fn substitute(expr: &SymExpr, cache: &HashMap<String, SymExpr>) -> SymExpr {
    if matches!(expr, SymExpr::Sum(_, _)) {
        if let Some(hit) = cache.get(&expr.to_string()) {
            return hit.clone();
        }
    }
    match expr {
        SymExpr::Num(_) | SymExpr::Var(_) | SymExpr::Unknown(_) => expr.clone(),
        SymExpr::Add(xs) => SymExpr::add(xs.iter().map(|x| substitute(x, cache)).collect()),
        SymExpr::Mul(xs) => SymExpr::mul(xs.iter().map(|x| substitute(x, cache)).collect()),
        SymExpr::Pow(a, b) => SymExpr::Pow(
            Box::new(substitute(a, cache)),
            Box::new(substitute(b, cache)),
        ),
        SymExpr::Div(a, b) => SymExpr::Div(
            Box::new(substitute(a, cache)),
            Box::new(substitute(b, cache)),
        ),
        SymExpr::Min(a, b) => SymExpr::min_of(substitute(a, cache), substitute(b, cache)),
        SymExpr::Max(a, b) => SymExpr::max_of(substitute(a, cache), substitute(b, cache)),
        SymExpr::Sum(body, limits) => SymExpr::Sum(
            Box::new(substitute(body, cache)),
            limits
                .iter()
                .map(|l| SumLimit {
                    var: l.var.clone(),
                    lo: substitute(&l.lo, cache),
                    hi: substitute(&l.hi, cache),
                })
                .collect(),
        ),
        SymExpr::Func(name, args) => SymExpr::Func(
            name.clone(),
            args.iter().map(|a| substitute(a, cache)).collect(),
        ),
    }
}

/// Resolve one `Sum` node limit-by-limit, innermost limit first, emitting a
/// step per level. Any failure degrades the whole node to `unknown(...)`.
fn resolve_sum_node(
    sum: &SymExpr,
    cache: &HashMap<String, SymExpr>,
    case: Case,
    counter: &mut usize,
    steps: &mut Vec<DerivationStep>,
) -> SymExpr {
    let SymExpr::Sum(body, limits) = sum else {
        return sum.clone();
    };
    let total = limits.len();
    let mut current = substitute(body, cache);

    for (idx, limit) in limits.iter().enumerate() {
        let lo = substitute(&limit.lo, cache);
        let hi = substitute(&limit.hi, cache);
        let level = SymExpr::Sum(
            Box::new(current.clone()),
            vec![SumLimit {
                var: limit.var.clone(),
                lo: lo.clone(),
                hi: hi.clone(),
            }],
        );
        let resolved =
            algebra::resolve_sum(&to_poly(&current), &limit.var, &to_poly(&lo), &to_poly(&hi));
        let Some(poly) = resolved else {
            return SymExpr::Unknown(sum.to_string());
        };
        let solved = poly_to_expr(&poly);
        push_step(
            steps,
            counter,
            case,
            level_title(idx, total, &limit.var),
            format!("{} = {}", level, solved),
        );
        current = solved;
    }
    current
}

fn level_title(idx: usize, total: usize, var: &str) -> String {
    if total == 1 {
        return "Resolve summation".to_string();
    }
    if total == 2 {
        return if idx == 0 {
            format!("Resolve inner summation (over {})", var)
        } else {
            format!("Resolve outer summation (over {})", var)
        };
    }
    let position = if idx == 0 {
        "innermost"
    } else if idx + 1 == total {
        "outermost"
    } else {
        "intermediate"
    };
    format!(
        "Resolve {} summation (level {}/{}, over {})",
        position,
        idx + 1,
        total,
        var
    )
}

// ============================================================================
// Asymptotic classification
// ============================================================================

/// Big-O label of a resolved expression: degree of the dominant additive
/// term with respect to `n`.
pub fn extract_big_o(expr: &SymExpr) -> String {
    if expr.is_zero() {
        return "O(1)".to_string();
    }
    let rendered = expr.to_string();
    if rendered.starts_with("unknown(") {
        return format!("O({})", rendered);
    }

    let poly = to_poly(expr);
    if poly.is_zero() {
        return "O(1)".to_string();
    }
    let mut max_degree = 0;
    let mut dominant: Option<Monomial> = None;
    for (mono, _) in poly.ordered_terms() {
        let d = term_degree(&mono);
        if dominant.is_none() || d > max_degree {
            max_degree = d;
            dominant = Some(mono);
        }
    }
    match max_degree {
        0 => "O(1)".to_string(),
        1 => "O(n)".to_string(),
        2 => "O(n**2)".to_string(),
        _ => format!(
            "O({})",
            render_size_factor(dominant.as_deref().unwrap_or(&[]))
        ),
    }
}

/// Growth degree of a monomial in `n`. Logarithmic atoms pin the term to
/// degree 0; other opaque atoms contribute their highest explicit `n**k`.
fn term_degree(mono: &Monomial) -> u32 {
    if mono.iter().any(|(atom, _)| atom.starts_with("log(")) {
        return 0;
    }
    let mut degree = 0;
    for (atom, exp) in mono {
        if atom == SIZE_VAR {
            degree = degree.max(*exp);
        } else if atom_mentions_var(atom, SIZE_VAR) {
            degree = degree.max(explicit_exponent(atom, SIZE_VAR));
        }
    }
    degree
}

/// The `n`-dependent factor of a monomial, constants dropped.
fn render_size_factor(mono: &[(String, u32)]) -> String {
    let mut factors = Vec::new();
    for (atom, exp) in mono {
        if atom == SIZE_VAR || atom_mentions_var(atom, SIZE_VAR) {
            if *exp == 1 {
                factors.push(atom.clone());
            } else {
                factors.push(format!("{}**{}", atom, exp));
            }
        }
    }
    if factors.is_empty() {
        "1".to_string()
    } else {
        factors.join("*")
    }
}

fn derive_bounds(best: &str, avg: &str, worst: &str) -> Bounds {
    let omega = best.replacen("O(", "\u{3a9}(", 1);
    let theta = if best == worst {
        best.replacen("O(", "\u{398}(", 1)
    } else {
        avg.replacen("O(", "\u{398}(", 1)
    };
    Bounds {
        omega,
        big_o: worst.to_string(),
        theta,
    }
}

// ============================================================================
// Per-line trace
// ============================================================================

/// Didactic trace: start from `C1*L1 + C2*L2 + ...`, list each line's own
/// expression, collapse the constants to 1, then run the normal pipeline.
/// One continuous step counter across the three cases.
fn line_by_line_steps(per_line: &[LineCostRecord]) -> Vec<DerivationStep> {
    let mut steps = Vec::new();
    let mut counter = 1;

    for case in Case::ALL {
        let formula = per_line
            .iter()
            .enumerate()
            .map(|(idx, lc)| format!("C{}*L{}", idx + 1, lc.line))
            .collect::<Vec<_>>()
            .join(" + ");
        push_step(
            &mut steps,
            &mut counter,
            case,
            format!("Line-by-line cost formula ({})", case.label()),
            format!("T(n) = {}", formula),
        );

        for lc in per_line {
            let text = lc.text.as_deref().unwrap_or("").trim();
            let shown: String = text.chars().take(40).collect();
            push_step(
                &mut steps,
                &mut counter,
                case,
                format!("Line {}: {}...", lc.line, shown),
                format!("L{} = {}", lc.line, lc.cost.get(case)),
            );
        }

        let with_constants = per_line
            .iter()
            .enumerate()
            .map(|(idx, lc)| format!("C{}*({})", idx + 1, lc.cost.get(case)))
            .collect::<Vec<_>>()
            .join(" + ");
        push_step(
            &mut steps,
            &mut counter,
            case,
            format!("Substitute each line's cost ({})", case.label()),
            format!("T(n) = {}", with_constants),
        );

        let collapsed = per_line
            .iter()
            .map(|lc| format!("({})", lc.cost.get(case)))
            .collect::<Vec<_>>()
            .join(" + ");
        push_step(
            &mut steps,
            &mut counter,
            case,
            format!(
                "Assume C1 = C2 = ... = 1 for asymptotic analysis ({})",
                case.label()
            ),
            format!("T(n) = {}", collapsed),
        );

        let (result, resolution) = solve_case(&collapsed, case, &mut counter);
        steps.extend(resolution);
        push_step(
            &mut steps,
            &mut counter,
            case,
            format!("Line-by-line result ({})", case.label()),
            format!("T(n) = {}", result),
        );
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(best: &str, avg: &str, worst: &str) -> CostTriple {
        CostTriple {
            best: best.into(),
            avg: avg.into(),
            worst: worst.into(),
        }
    }

    #[test]
    fn test_single_sum_of_one() {
        let out = solve(&CostTriple::uniform("Sum(1, (i, 1, n))"), &[], false);
        assert_eq!(out.exact.worst, "n");
        assert_eq!(out.big_o.worst, "O(n)");
        assert_eq!(out.bounds.omega, "\u{3a9}(n)");
        assert_eq!(out.bounds.theta, "\u{398}(n)");
        assert_eq!(out.bounds.big_o, "O(n)");
    }

    #[test]
    fn test_nested_sums_square() {
        let out = solve(
            &CostTriple::uniform("Sum(Sum(1, (j, 1, n)), (i, 1, n))"),
            &[],
            false,
        );
        assert_eq!(out.exact.worst, "n**2");
        assert_eq!(out.big_o.worst, "O(n**2)");
    }

    #[test]
    fn test_inner_sum_resolved_before_outer() {
        let out = solve(
            &CostTriple::uniform("Sum(Sum(1, (j, 1, n - i)), (i, 1, n - 1))"),
            &[],
            true,
        );
        let resolutions: Vec<&DerivationStep> = out
            .aggregate_steps
            .iter()
            .filter(|s| s.title.starts_with("Resolve"))
            .collect();
        assert!(resolutions.len() >= 2);
        assert!(resolutions[0].expression.contains("(j, 1, n - i)"));
        assert!(resolutions[1].expression.contains("(i, 1, n - 1)"));
    }

    #[test]
    fn test_multi_limit_sum() {
        let out = solve(
            &CostTriple::uniform("Sum(1, (j, 1, n - i), (i, 1, n - 1))"),
            &[],
            true,
        );
        assert_eq!(out.exact.worst, "n*(n - 1)/2");
        let titles: Vec<&str> = out
            .aggregate_steps
            .iter()
            .filter(|s| s.case == Case::Best && s.title.starts_with("Resolve"))
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(
            titles,
            vec![
                "Resolve inner summation (over j)",
                "Resolve outer summation (over i)"
            ]
        );
    }

    #[test]
    fn test_bubble_sort_totals() {
        let sum1 = "Sum(Sum(1, (j, 1, n - i)), (i, 1, n - 1))";
        let half = "Sum(Sum(1/2, (j, 1, n - i)), (i, 1, n - 1))";
        let best = sum1.to_string();
        let avg = format!("{sum1} + {half} + {half} + {half}");
        let worst = format!("{sum1} + {sum1} + {sum1} + {sum1}");
        let out = solve(&triple(&best, &avg, &worst), &[], false);

        assert_eq!(out.exact.best, "n*(n - 1)/2");
        assert_eq!(out.exact.avg, "5*n*(n - 1)/4");
        assert_eq!(out.exact.worst, "2*n*(n - 1)");
        assert_eq!(out.big_o.best, "O(n**2)");
        assert_eq!(out.big_o.avg, "O(n**2)");
        assert_eq!(out.big_o.worst, "O(n**2)");
        assert_eq!(out.bounds.omega, "\u{3a9}(n**2)");
        assert_eq!(out.bounds.theta, "\u{398}(n**2)");
        assert_eq!(out.bounds.big_o, "O(n**2)");
    }

    #[test]
    fn test_linear_search_bounds() {
        let out = solve(
            &triple(
                "1 + 1",
                "Sum(1, (i, 1, n)) + Sum(1/2, (i, 1, n)) + 1",
                "Sum(1, (i, 1, n)) + Sum(1, (i, 1, n)) + 1",
            ),
            &[],
            false,
        );
        assert_eq!(out.exact.best, "2");
        assert_eq!(out.big_o.best, "O(1)");
        assert_eq!(out.exact.worst, "2*n + 1");
        assert_eq!(out.big_o.worst, "O(n)");
        // Best and worst disagree, so theta falls back to the average case.
        assert_eq!(out.bounds.omega, "\u{3a9}(1)");
        assert_eq!(out.bounds.theta, "\u{398}(n)");
        assert_eq!(out.bounds.big_o, "O(n)");
    }

    #[test]
    fn test_min_max_resolution() {
        let out = solve(&CostTriple::uniform("max(1, 0)"), &[], false);
        assert_eq!(out.exact.worst, "1");
        assert_eq!(out.big_o.worst, "O(1)");

        let out = solve(&CostTriple::uniform("min(a, 0)"), &[], false);
        assert_eq!(out.exact.worst, "0");
        assert_eq!(out.big_o.worst, "O(1)");
    }

    #[test]
    fn test_constant_code_is_constant() {
        let out = solve(&triple("3", "3", "3"), &[], false);
        assert_eq!(out.exact.best, "3");
        assert_eq!(out.big_o.best, "O(1)");
        assert_eq!(out.bounds.theta, "\u{398}(1)");
    }

    #[test]
    fn test_idempotent_on_resolved_input() {
        let resolved = triple("n*(n - 1)/2", "5*n*(n - 1)/4", "2*n*(n - 1)");
        let out = solve(&resolved, &[], false);
        assert_eq!(out.exact, resolved);
        let again = solve(&out.exact, &[], false);
        assert_eq!(again.exact, resolved);
    }

    #[test]
    fn test_malformed_input_degrades() {
        let out = solve(&CostTriple::uniform("n +* 2"), &[], false);
        assert_eq!(out.exact.worst, "unknown(n +* 2)");
        assert!(out.big_o.worst.contains("unknown("));
        assert!(out.bounds.big_o.contains("unknown("));
    }

    #[test]
    fn test_unresolvable_sum_degrades() {
        // The bound variable is buried inside an opaque call.
        let out = solve(&CostTriple::uniform("Sum(foo(i), (i, 1, n))"), &[], false);
        assert_eq!(out.exact.worst, "unknown(Sum(foo(i), (i, 1, n)))");
        assert!(out.big_o.worst.contains("unknown("));
    }

    #[test]
    fn test_wide_coefficients_survive_factoring() {
        // The discriminant of the quadratic is far outside i64; factoring
        // backs off and the simplified form is kept.
        let out = solve(
            &CostTriple::uniform("n**2 + 4000000000*n + 1"),
            &[],
            false,
        );
        assert_eq!(out.exact.worst, "n**2 + 4000000000*n + 1");
        assert_eq!(out.big_o.worst, "O(n**2)");
    }

    #[test]
    fn test_overflowing_product_stays_opaque() {
        // The product does not fit an i64 coefficient; the term is kept
        // verbatim rather than silently truncated.
        let out = solve(&CostTriple::uniform("5000000000*5000000000"), &[], false);
        assert_eq!(out.exact.worst, "5000000000*5000000000");
        assert_eq!(out.big_o.worst, "O(1)");
    }

    #[test]
    fn test_cubic_dominant_term() {
        let out = solve(
            &CostTriple::uniform("Sum(Sum(Sum(1, (k, 1, n)), (j, 1, n)), (i, 1, n))"),
            &[],
            false,
        );
        assert_eq!(out.exact.worst, "n**3");
        assert_eq!(out.big_o.worst, "O(n**3)");
    }

    #[test]
    fn test_log_terms_stay_constant_class() {
        let out = solve(&CostTriple::uniform("2*log(n) + 3"), &[], false);
        assert_eq!(out.big_o.worst, "O(1)");
    }

    #[test]
    fn test_aggregate_steps_restart_per_case() {
        let out = solve(&CostTriple::uniform("Sum(1, (i, 1, n))"), &[], true);
        for case in Case::ALL {
            let first = out
                .aggregate_steps
                .iter()
                .find(|s| s.case == case)
                .unwrap();
            assert_eq!(first.step, 1);
        }
    }

    #[test]
    fn test_per_line_trace() {
        let lines = vec![
            LineCostRecord {
                line: 1,
                text: Some("for i \u{2190} 1 to n".into()),
                kinds: vec!["For".into()],
                cost: CostTriple::uniform("0"),
            },
            LineCostRecord {
                line: 2,
                text: Some("x \u{2190} x + 1".into()),
                kinds: vec!["Assign".into()],
                cost: CostTriple::uniform("Sum(2, (i, 1, n))"),
            },
        ];
        let out = solve(&CostTriple::uniform("Sum(2, (i, 1, n))"), &lines, true);
        assert!(!out.per_line_steps.is_empty());
        let first = &out.per_line_steps[0];
        assert_eq!(first.step, 1);
        assert_eq!(first.expression, "T(n) = C1*L1 + C2*L2");
        // Continuous numbering across the whole trace.
        for (idx, step) in out.per_line_steps.iter().enumerate() {
            assert_eq!(step.step, idx + 1);
        }
        let last = out.per_line_steps.last().unwrap();
        assert_eq!(last.expression, "T(n) = 2*n");
    }

    #[test]
    fn test_solving_empty_triple() {
        let out = solve(&CostTriple::uniform("0"), &[], true);
        assert_eq!(out.exact.worst, "0");
        assert_eq!(out.big_o.worst, "O(1)");
        assert!(out.aggregate_steps.is_empty());
    }
}
