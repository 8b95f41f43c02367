//! Report Shapes
//!
//! Wire-format DTOs produced by the annotator and the solver. Cost
//! expressions travel as strings in the grammar the solver parses, so the
//! two stages stay decoupled: an annotation report can be stored, shipped,
//! and solved later.

use serde::{Deserialize, Serialize};

/// The three analysis cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Case {
    Best,
    Avg,
    Worst,
}

impl Case {
    pub const ALL: [Case; 3] = [Case::Best, Case::Avg, Case::Worst];

    pub fn label(self) -> &'static str {
        match self {
            Case::Best => "best",
            Case::Avg => "avg",
            Case::Worst => "worst",
        }
    }
}

/// One cost expression per case, rendered in the cost grammar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostTriple {
    pub best: String,
    pub avg: String,
    pub worst: String,
}

impl CostTriple {
    pub fn uniform(text: impl Into<String>) -> Self {
        let text = text.into();
        CostTriple {
            best: text.clone(),
            avg: text.clone(),
            worst: text,
        }
    }

    pub fn get(&self, case: Case) -> &str {
        match case {
            Case::Best => &self.best,
            Case::Avg => &self.avg,
            Case::Worst => &self.worst,
        }
    }
}

/// A loop's bound variable and symbolic range, as recorded on loop nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopInfo {
    pub var: String,
    pub start: String,
    pub end: String,
}

/// Per-node annotation record, emitted in pre-order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCostRecord {
    pub node_id: usize,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<usize>,
    /// Reconstructed source fragment, e.g. `for i ← ... to ...`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Cost of the node itself, excluding children.
    pub own_cost: CostTriple,
    /// Cost of the node including its children.
    pub block_cost: CostTriple,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_info: Option<LoopInfo>,
}

/// Per-line attribution record, emitted in ascending line order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineCostRecord {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Kinds of the AST nodes contributing to this line.
    #[serde(default)]
    pub kinds: Vec<String>,
    pub cost: CostTriple,
}

/// Output of the Cost Annotator for one function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostsReport {
    /// Names of the analyzed functions, in program order.
    pub functions: Vec<String>,
    pub nodes: Vec<NodeCostRecord>,
    pub lines: Vec<LineCostRecord>,
    pub total_cost: CostTriple,
}

/// One step of a derivation trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivationStep {
    pub step: usize,
    pub case: Case,
    pub title: String,
    pub expression: String,
}

/// Asymptotic bounds: Ω from best, O from worst, Θ from best when tight,
/// otherwise from average.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub omega: String,
    pub big_o: String,
    pub theta: String,
}

/// Output of the Series Solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionReport {
    /// Closed forms per case.
    pub exact: CostTriple,
    /// Big-O label per case.
    pub big_o: CostTriple,
    pub bounds: Bounds,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregate_steps: Vec<DerivationStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub per_line_steps: Vec<DerivationStep>,
}

/// Full analysis result for one function: annotation plus solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub costs: CostsReport,
    pub solution: SolutionReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Case::Best).unwrap(), r#""best""#);
        assert_eq!(serde_json::to_string(&Case::Avg).unwrap(), r#""avg""#);
    }

    #[test]
    fn test_camel_case_wire_names() {
        let record = NodeCostRecord {
            node_id: 3,
            kind: "For".into(),
            line_start: Some(1),
            line_end: Some(4),
            snippet: Some("for i ← ... to ...".into()),
            own_cost: CostTriple::uniform("0"),
            block_cost: CostTriple::uniform("Sum(1, (i, 1, n))"),
            loop_info: Some(LoopInfo {
                var: "i".into(),
                start: "1".into(),
                end: "n".into(),
            }),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["nodeId"], 3);
        assert_eq!(json["blockCost"]["worst"], "Sum(1, (i, 1, n))");
        assert_eq!(json["loopInfo"]["var"], "i");
    }

    #[test]
    fn test_optional_fields_omitted() {
        let record = LineCostRecord {
            line: 2,
            text: None,
            kinds: vec!["Assign".into()],
            cost: CostTriple::uniform("1"),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("text"));
    }
}
