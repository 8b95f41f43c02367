//! Cost Annotator
//!
//! Walks the pseudocode AST bottom-up and produces symbolic best/avg/worst
//! cost expressions per node, per source line, and in total. Loop bodies
//! become `Sum(...)` terms over fresh depth-keyed iteration variables;
//! conditionals split into `min`/probability-weighted/`max` branches.
//!
//! The annotator is pure: one fresh context per call, nothing shared.

use crate::domain::algebra;
use crate::domain::ast::{Block, Expr, Function, LiteralValue, Program, Stmt};
use crate::domain::expr::{Rat, SymExpr};
use crate::domain::report::{
    CostTriple, CostsReport, LineCostRecord, LoopInfo, NodeCostRecord,
};
use serde::Deserialize;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncrementStyle {
    /// `i++` counts as one operation per iteration.
    #[default]
    Unit,
    /// `i <- i + 1` counts as two operations per iteration.
    Expanded,
}

/// The only tunable knobs of the annotator. Everything else is fixed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzerConfig {
    /// Charge loop init/test/increment overhead on `For` loops.
    pub count_loop_control: bool,
    pub increment_style: IncrementStyle,
    /// Probability that an `if` takes its then-branch, used for the
    /// average case.
    pub default_branch_probability: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            count_loop_control: false,
            increment_style: IncrementStyle::Unit,
            default_branch_probability: 0.5,
        }
    }
}

// ============================================================================
// Internal cost triples over expression trees
// ============================================================================

#[derive(Debug, Clone)]
struct Cost {
    best: SymExpr,
    avg: SymExpr,
    worst: SymExpr,
}

impl Cost {
    fn zero() -> Self {
        Cost::uniform(SymExpr::zero())
    }

    fn uniform(e: SymExpr) -> Self {
        Cost {
            best: e.clone(),
            avg: e.clone(),
            worst: e,
        }
    }

    fn add(&self, other: &Cost) -> Cost {
        Cost {
            best: SymExpr::add(vec![self.best.clone(), other.best.clone()]),
            avg: SymExpr::add(vec![self.avg.clone(), other.avg.clone()]),
            worst: SymExpr::add(vec![self.worst.clone(), other.worst.clone()]),
        }
    }

    fn render(&self) -> CostTriple {
        CostTriple {
            best: self.best.to_string(),
            avg: self.avg.to_string(),
            worst: self.worst.to_string(),
        }
    }
}

// ============================================================================
// Annotation context (call-scoped, never shared)
// ============================================================================

/// How a loop multiplies the lines strictly inside its span.
#[derive(Debug, Clone)]
enum LoopWrap {
    For {
        var: String,
        lo: SymExpr,
        hi: SymExpr,
        /// Body contains a `return`: the best case runs one iteration.
        body_returns: bool,
    },
    While {
        m_avg: SymExpr,
        m_worst: SymExpr,
    },
}

#[derive(Debug, Clone)]
struct LoopSpan {
    start: usize,
    end: usize,
    wrap: LoopWrap,
}

#[derive(Debug)]
struct NodeInfo {
    id: usize,
    kind: &'static str,
    line_start: Option<usize>,
    line_end: Option<usize>,
    snippet: Option<String>,
    own: Cost,
    block: Cost,
    loop_info: Option<LoopInfo>,
}

struct AnnotateCtx {
    node_seq: usize,
    loop_depth: usize,
    /// Original loop-variable name -> fresh per-depth name, as a scope
    /// stack so shadowing resolves to the innermost mapping.
    renames: Vec<(String, String)>,
    /// Upper bounds of enclosing loops, innermost last.
    bound_stack: Vec<SymExpr>,
    nodes: Vec<NodeInfo>,
    loops: Vec<LoopSpan>,
    /// Line spans of `If` statements, for probability depth.
    conds: Vec<(usize, usize)>,
}

impl AnnotateCtx {
    fn new() -> Self {
        AnnotateCtx {
            node_seq: 0,
            loop_depth: 0,
            renames: Vec::new(),
            bound_stack: Vec::new(),
            nodes: Vec::new(),
            loops: Vec::new(),
            conds: Vec::new(),
        }
    }

    fn next_id(&mut self) -> usize {
        self.node_seq += 1;
        self.node_seq
    }

    fn fresh_loop_var(&self) -> String {
        const NAMES: [&str; 8] = ["i", "j", "k", "l", "m", "p", "q", "r"];
        match NAMES.get(self.loop_depth) {
            Some(name) => (*name).to_string(),
            None => format!("v{}", self.loop_depth),
        }
    }

    fn renamed(&self, original: &str) -> String {
        self.renames
            .iter()
            .rev()
            .find(|(from, _)| from == original)
            .map(|(_, to)| to.clone())
            .unwrap_or_else(|| original.to_string())
    }
}

// ============================================================================
// Annotator
// ============================================================================

pub struct CostAnnotator<'a> {
    config: &'a AnalyzerConfig,
    p_true: Rat,
}

/// Annotate a program. `source_text` enables per-line attribution; when it
/// is empty, `total_cost` falls back to the root block cost.
pub fn analyze_costs(program: &Program, source_text: &str, config: &AnalyzerConfig) -> CostsReport {
    CostAnnotator::new(config).analyze(program, source_text)
}

impl<'a> CostAnnotator<'a> {
    pub fn new(config: &'a AnalyzerConfig) -> Self {
        CostAnnotator {
            config,
            p_true: Rat::approx_f64(config.default_branch_probability),
        }
    }

    pub fn analyze(&self, program: &Program, source_text: &str) -> CostsReport {
        let mut ctx = AnnotateCtx::new();

        let mut program_cost = Cost::zero();
        let mut names = Vec::new();
        for func in &program.functions {
            let cost = self.visit_function(func, &mut ctx);
            program_cost = program_cost.add(&cost);
            names.push(func.name.clone());
        }

        ctx.nodes.sort_by_key(|n| n.id);

        let (lines, line_total) = self.attribute_lines(&ctx, source_text);
        let total = match line_total {
            Some(t) => t,
            None => program_cost,
        };

        CostsReport {
            functions: names,
            nodes: ctx
                .nodes
                .iter()
                .map(|n| NodeCostRecord {
                    node_id: n.id,
                    kind: n.kind.to_string(),
                    line_start: n.line_start,
                    line_end: n.line_end,
                    snippet: n.snippet.clone(),
                    own_cost: n.own.render(),
                    block_cost: n.block.render(),
                    loop_info: n.loop_info.clone(),
                })
                .collect(),
            lines,
            total_cost: total.render(),
        }
    }

    fn visit_function(&self, func: &Function, ctx: &mut AnnotateCtx) -> Cost {
        let id = ctx.next_id();
        let cost = self.visit_block(&func.body, ctx);
        ctx.nodes.push(NodeInfo {
            id,
            kind: "Function",
            line_start: None,
            line_end: None,
            snippet: Some(format!("function {}(...)", func.name)),
            own: Cost::zero(),
            block: cost.clone(),
            loop_info: None,
        });
        cost
    }

    fn visit_block(&self, block: &Block, ctx: &mut AnnotateCtx) -> Cost {
        let mut acc = Cost::zero();
        for stmt in &block.statements {
            let cost = self.visit_stmt(stmt, ctx);
            acc = acc.add(&cost);
        }
        acc
    }

    fn visit_stmt(&self, stmt: &Stmt, ctx: &mut AnnotateCtx) -> Cost {
        match stmt {
            Stmt::For { .. } => self.visit_for(stmt, ctx),
            Stmt::While { .. } => self.visit_while(stmt, ctx),
            Stmt::If { .. } => self.visit_if(stmt, ctx),
            Stmt::Assign {
                target,
                value,
                line_start,
                line_end,
            } => {
                let id = ctx.next_id();
                let cost = Cost::uniform(SymExpr::int(1 + cost_of_expr(value)));
                let snippet = match target {
                    Expr::Var { name } => format!("{} ← ...", name),
                    _ => "... ← ...".to_string(),
                };
                ctx.nodes.push(NodeInfo {
                    id,
                    kind: "Assign",
                    line_start: *line_start,
                    line_end: *line_end,
                    snippet: Some(snippet),
                    own: cost.clone(),
                    block: cost.clone(),
                    loop_info: None,
                });
                cost
            }
            Stmt::Return {
                line_start,
                line_end,
                ..
            } => {
                let id = ctx.next_id();
                let cost = Cost::uniform(SymExpr::one());
                ctx.nodes.push(NodeInfo {
                    id,
                    kind: "Return",
                    line_start: *line_start,
                    line_end: *line_end,
                    snippet: Some("return ...".to_string()),
                    own: cost.clone(),
                    block: cost.clone(),
                    loop_info: None,
                });
                cost
            }
            Stmt::ExprStmt {
                expr,
                line_start,
                line_end,
            } => {
                let id = ctx.next_id();
                // A bare expression still takes at least one step.
                let cost = Cost::uniform(SymExpr::int(cost_of_expr(expr).max(1)));
                ctx.nodes.push(NodeInfo {
                    id,
                    kind: "ExprStmt",
                    line_start: *line_start,
                    line_end: *line_end,
                    snippet: None,
                    own: cost.clone(),
                    block: cost.clone(),
                    loop_info: None,
                });
                cost
            }
            Stmt::Opaque => {
                // Unrecognized statement kind: fallback constant cost.
                let id = ctx.next_id();
                let cost = Cost::uniform(SymExpr::one());
                ctx.nodes.push(NodeInfo {
                    id,
                    kind: "Opaque",
                    line_start: None,
                    line_end: None,
                    snippet: None,
                    own: cost.clone(),
                    block: cost.clone(),
                    loop_info: None,
                });
                cost
            }
        }
    }

    fn visit_for(&self, stmt: &Stmt, ctx: &mut AnnotateCtx) -> Cost {
        let Stmt::For {
            var,
            start,
            end,
            body,
            line_start,
            line_end,
        } = stmt
        else {
            unreachable!("visit_for on non-For");
        };
        let id = ctx.next_id();
        let fresh = ctx.fresh_loop_var();
        // Bounds render under the outer scope's renames only.
        let lo = bound_expr(start, ctx);
        let hi = bound_expr(end, ctx);

        ctx.renames.push((var.clone(), fresh.clone()));
        ctx.bound_stack.push(hi.clone());
        ctx.loop_depth += 1;
        let body_cost = self.visit_block(body, ctx);
        ctx.loop_depth -= 1;
        ctx.bound_stack.pop();
        ctx.renames.pop();

        let body_returns = body.contains_return();
        // An early return caps the best case at a single iteration.
        let best = if body_returns {
            body_cost.best.clone()
        } else {
            SymExpr::sum(body_cost.best.clone(), fresh.clone(), lo.clone(), hi.clone())
        };
        let mut block = Cost {
            best,
            avg: SymExpr::sum(body_cost.avg.clone(), fresh.clone(), lo.clone(), hi.clone()),
            worst: SymExpr::sum(body_cost.worst, fresh.clone(), lo.clone(), hi.clone()),
        };

        let own = if self.config.count_loop_control {
            let control = self.loop_control_cost(&lo, &hi);
            block = block.add(&Cost::uniform(control.clone()));
            Cost::uniform(control)
        } else {
            Cost::zero()
        };

        if let (Some(ls), Some(le)) = (line_start, line_end) {
            ctx.loops.push(LoopSpan {
                start: *ls,
                end: *le,
                wrap: LoopWrap::For {
                    var: fresh.clone(),
                    lo: lo.clone(),
                    hi: hi.clone(),
                    body_returns,
                },
            });
        }

        ctx.nodes.push(NodeInfo {
            id,
            kind: "For",
            line_start: *line_start,
            line_end: *line_end,
            snippet: Some(format!("for {} ← ... to ...", var)),
            own,
            block: block.clone(),
            loop_info: Some(LoopInfo {
                var: fresh,
                start: lo.to_string(),
                end: hi.to_string(),
            }),
        });

        block
    }

    /// init + tests + increments: `1 + (hi - lo + 2) + s*(hi - lo + 1)`
    /// with `s` 1 or 2 per the increment style.
    fn loop_control_cost(&self, lo: &SymExpr, hi: &SymExpr) -> SymExpr {
        let tests = SymExpr::add(vec![
            hi.clone(),
            SymExpr::neg(lo.clone()),
            SymExpr::int(2),
        ]);
        let trips = SymExpr::add(vec![
            hi.clone(),
            SymExpr::neg(lo.clone()),
            SymExpr::int(1),
        ]);
        let per_trip = match self.config.increment_style {
            IncrementStyle::Unit => Rat::one(),
            IncrementStyle::Expanded => Rat::int(2),
        };
        algebra::simplify(&SymExpr::add(vec![
            SymExpr::one(),
            tests,
            SymExpr::scale(per_trip, trips),
        ]))
    }

    fn visit_while(&self, stmt: &Stmt, ctx: &mut AnnotateCtx) -> Cost {
        let Stmt::While {
            condition,
            body,
            line_start,
            line_end,
        } = stmt
        else {
            unreachable!("visit_while on non-While");
        };
        let id = ctx.next_id();
        let guard = cost_of_expr(condition);

        // Iteration bound: the nearest enclosing loop's bound, `n` at
        // top level. Average case assumes half of it.
        let m_base = ctx
            .bound_stack
            .last()
            .cloned()
            .unwrap_or_else(|| SymExpr::var("n"));
        let m_avg = SymExpr::scale(Rat::new(1, 2), m_base.clone());
        let m_worst = m_base;

        ctx.bound_stack.push(m_worst.clone());
        ctx.loop_depth += 1;
        let body_cost = self.visit_block(body, ctx);
        ctx.loop_depth -= 1;
        ctx.bound_stack.pop();

        // Best: the guard is evaluated once and fails.
        let best = SymExpr::int(guard.max(1));
        let guard_evals_avg = SymExpr::scale(Rat::int(guard), m_avg.clone());
        let guard_evals_worst = SymExpr::scale(Rat::int(guard), m_worst.clone());
        let avg = SymExpr::add(vec![
            guard_evals_avg.clone(),
            SymExpr::sum(body_cost.avg, "t", SymExpr::one(), m_avg.clone()),
            SymExpr::int(guard),
        ]);
        let worst = SymExpr::add(vec![
            guard_evals_worst.clone(),
            SymExpr::sum(body_cost.worst, "t", SymExpr::one(), m_worst.clone()),
            SymExpr::int(guard),
        ]);

        let own = Cost {
            best: SymExpr::int(guard),
            avg: SymExpr::add(vec![guard_evals_avg, SymExpr::int(guard)]),
            worst: SymExpr::add(vec![guard_evals_worst, SymExpr::int(guard)]),
        };
        let block = Cost { best, avg, worst };

        if let (Some(ls), Some(le)) = (line_start, line_end) {
            ctx.loops.push(LoopSpan {
                start: *ls,
                end: *le,
                wrap: LoopWrap::While {
                    m_avg,
                    m_worst,
                },
            });
        }

        ctx.nodes.push(NodeInfo {
            id,
            kind: "While",
            line_start: *line_start,
            line_end: *line_end,
            snippet: Some("while ...".to_string()),
            own,
            block: block.clone(),
            loop_info: None,
        });

        block
    }

    fn visit_if(&self, stmt: &Stmt, ctx: &mut AnnotateCtx) -> Cost {
        let Stmt::If {
            condition,
            then_block,
            else_block,
            line_start,
            line_end,
        } = stmt
        else {
            unreachable!("visit_if on non-If");
        };
        let id = ctx.next_id();
        let guard = SymExpr::int(cost_of_expr(condition));

        let then_cost = self.visit_block(then_block, ctx);
        let else_cost = match else_block {
            Some(b) => self.visit_block(b, ctx),
            None => Cost::zero(),
        };

        let p = self.p_true;
        // p sits in [0, 1] with a bounded denominator; the complement always
        // fits.
        let one_minus_p = Rat::one().sub(&p).unwrap_or_else(Rat::zero);
        let block = Cost {
            best: SymExpr::add(vec![
                guard.clone(),
                SymExpr::min_of(then_cost.best, else_cost.best),
            ]),
            avg: SymExpr::add(vec![
                guard.clone(),
                SymExpr::scale(p, then_cost.avg),
                SymExpr::scale(one_minus_p, else_cost.avg),
            ]),
            worst: SymExpr::add(vec![
                guard.clone(),
                SymExpr::max_of(then_cost.worst, else_cost.worst),
            ]),
        };

        if let (Some(ls), Some(le)) = (line_start, line_end) {
            ctx.conds.push((*ls, *le));
        }

        ctx.nodes.push(NodeInfo {
            id,
            kind: "If",
            line_start: *line_start,
            line_end: *line_end,
            snippet: Some("if ...".to_string()),
            own: Cost::uniform(guard),
            block: block.clone(),
            loop_info: None,
        });

        block
    }

    // ========================================================================
    // Per-line attribution
    // ========================================================================

    /// Scale each node's own cost by its execution count (enclosing loops
    /// as nested sums, innermost wrap applied first) and its conditional
    /// depth, then group by source line. Returns `None` as the total when
    /// there is no source text to attribute against.
    fn attribute_lines(
        &self,
        ctx: &AnnotateCtx,
        source_text: &str,
    ) -> (Vec<LineCostRecord>, Option<Cost>) {
        if source_text.is_empty() {
            return (Vec::new(), None);
        }
        let lines: Vec<&str> = source_text.lines().collect();

        let mut per_line: Vec<(usize, Vec<String>, Cost)> = Vec::new();
        for node in &ctx.nodes {
            if node.kind == "Function" {
                continue;
            }
            let Some(line) = node.line_start else {
                continue;
            };

            // Loops whose body strictly contains this line, outermost first.
            let mut enclosing: Vec<&LoopSpan> = ctx
                .loops
                .iter()
                .filter(|s| s.start < line && line <= s.end)
                .collect();
            enclosing.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

            let cond_depth = ctx
                .conds
                .iter()
                .filter(|(s, e)| *s < line && line <= *e)
                .count();

            let cost = self.line_cost_of(node, &enclosing, cond_depth);

            match per_line.iter_mut().find(|(l, _, _)| *l == line) {
                Some((_, kinds, acc)) => {
                    kinds.push(node.kind.to_string());
                    *acc = acc.add(&cost);
                }
                None => per_line.push((line, vec![node.kind.to_string()], cost)),
            }
        }
        per_line.sort_by_key(|(l, _, _)| *l);

        let mut total = Cost::zero();
        let records = per_line
            .into_iter()
            .map(|(line, kinds, cost)| {
                total = total.add(&cost);
                LineCostRecord {
                    line,
                    text: line
                        .checked_sub(1)
                        .and_then(|idx| lines.get(idx))
                        .map(|s| s.to_string()),
                    kinds,
                    cost: cost.render(),
                }
            })
            .collect();
        (records, Some(total))
    }

    fn line_cost_of(&self, node: &NodeInfo, enclosing: &[&LoopSpan], cond_depth: usize) -> Cost {
        let mut cost = match node.kind {
            "For" => {
                if self.config.count_loop_control {
                    // The header runs once per iteration plus the failing
                    // test: (hi - lo + 2) evaluations.
                    let evals = match &node.loop_info {
                        Some(info) => header_evaluations(&info.start, &info.end),
                        None => SymExpr::one(),
                    };
                    Cost::uniform(evals)
                } else {
                    // Loop control is modeled as free.
                    Cost::zero()
                }
            }
            "While" => node.own.clone(),
            _ => {
                let mut c = node.own.clone();
                if cond_depth > 0 {
                    // Inside a conditional: never taken in the best case,
                    // always in the worst, p^depth on average.
                    c.best = SymExpr::zero();
                    // A power of p past the rational range is as good as zero.
                    let weight = self
                        .p_true
                        .pow(cond_depth as u32)
                        .unwrap_or_else(Rat::zero);
                    c.avg = SymExpr::scale(weight, c.avg);
                }
                c
            }
        };

        // Innermost loop wraps first, so the outermost Sum ends up
        // outermost in the rendered expression.
        for span in enclosing.iter().rev() {
            cost = match &span.wrap {
                LoopWrap::For {
                    var,
                    lo,
                    hi,
                    body_returns,
                } => Cost {
                    best: if *body_returns {
                        cost.best
                    } else {
                        SymExpr::sum(cost.best, var.clone(), lo.clone(), hi.clone())
                    },
                    avg: SymExpr::sum(cost.avg, var.clone(), lo.clone(), hi.clone()),
                    worst: SymExpr::sum(cost.worst, var.clone(), lo.clone(), hi.clone()),
                },
                LoopWrap::While { m_avg, m_worst } => Cost {
                    // Best case: the loop exits before the line runs.
                    best: SymExpr::zero(),
                    avg: SymExpr::sum(cost.avg, "t", SymExpr::one(), m_avg.clone()),
                    worst: SymExpr::sum(cost.worst, "t", SymExpr::one(), m_worst.clone()),
                },
            };
        }
        cost
    }
}

// ============================================================================
// Expression helpers
// ============================================================================

/// Evaluation cost of an expression: one unit per operator or comparison.
/// Literals, variables, array accesses, and calls are free.
fn cost_of_expr(expr: &Expr) -> i64 {
    match expr {
        Expr::BinOp { left, right, .. } | Expr::Compare { left, right, .. } => {
            1 + cost_of_expr(left) + cost_of_expr(right)
        }
        _ => 0,
    }
}

/// Render a loop-bound expression symbolically, applying the enclosing
/// scopes' loop-variable renames. Anything outside the arithmetic subset
/// degrades to the size variable `n`.
fn bound_expr(expr: &Expr, ctx: &AnnotateCtx) -> SymExpr {
    match expr {
        Expr::Literal { value } => match value {
            LiteralValue::Int(v) => SymExpr::int(*v),
            LiteralValue::Float(v) => SymExpr::Num(Rat::approx_f64(*v)),
            LiteralValue::Bool(_) | LiteralValue::Str(_) => SymExpr::var("n"),
        },
        Expr::Var { name } => SymExpr::var(ctx.renamed(name)),
        Expr::BinOp { op, left, right } => {
            let l = bound_expr(left, ctx);
            let r = bound_expr(right, ctx);
            match op.as_str() {
                "+" => SymExpr::add(vec![l, r]),
                "-" => SymExpr::add(vec![l, SymExpr::neg(r)]),
                "*" => SymExpr::mul(vec![l, r]),
                "/" => SymExpr::Div(Box::new(l), Box::new(r)),
                _ => SymExpr::var("n"),
            }
        }
        _ => SymExpr::var("n"),
    }
}

/// `(end - start + 2)` evaluations of a For header, simplified. Falls back
/// to the raw form when the recorded bounds do not parse.
fn header_evaluations(start: &str, end: &str) -> SymExpr {
    use crate::domain::parse::parse_cost_expr;
    match (parse_cost_expr(start), parse_cost_expr(end)) {
        (Ok(lo), Ok(hi)) => algebra::simplify(&SymExpr::add(vec![
            hi.expr,
            SymExpr::neg(lo.expr),
            SymExpr::int(2),
        ])),
        _ => SymExpr::Unknown(format!("({}) - ({}) + 2", end, start)),
    }
}
