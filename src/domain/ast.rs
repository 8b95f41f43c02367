// AST contract for pseudocode programs.
// The tree arrives as JSON from the external grammar parser; nodes are
// internally tagged with "type" and carry optional 1-indexed inclusive
// source line spans.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub functions: Vec<Function>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    pub body: Block,
    #[serde(default)]
    pub line_start: Option<usize>,
    #[serde(default)]
    pub line_end: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Param {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub statements: Vec<Stmt>,
}

/// A statement node. Unrecognized kinds deserialize as `Opaque` so a newer
/// parser grammar never breaks analysis; an opaque statement costs 1.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Stmt {
    Assign {
        target: Expr,
        value: Expr,
        #[serde(default)]
        line_start: Option<usize>,
        #[serde(default)]
        line_end: Option<usize>,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
        #[serde(default)]
        line_start: Option<usize>,
        #[serde(default)]
        line_end: Option<usize>,
    },
    ExprStmt {
        expr: Expr,
        #[serde(default)]
        line_start: Option<usize>,
        #[serde(default)]
        line_end: Option<usize>,
    },
    If {
        condition: Expr,
        then_block: Block,
        #[serde(default)]
        else_block: Option<Block>,
        #[serde(default)]
        line_start: Option<usize>,
        #[serde(default)]
        line_end: Option<usize>,
    },
    While {
        condition: Expr,
        body: Block,
        #[serde(default)]
        line_start: Option<usize>,
        #[serde(default)]
        line_end: Option<usize>,
    },
    For {
        var: String,
        start: Expr,
        end: Expr,
        body: Block,
        #[serde(default)]
        line_start: Option<usize>,
        #[serde(default)]
        line_end: Option<usize>,
    },
    #[serde(other)]
    Opaque,
}

/// An expression node. Unrecognized kinds deserialize as `Opaque` and
/// cost 0.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    Literal {
        value: LiteralValue,
    },
    Var {
        name: String,
    },
    ArrayAccess {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    BinOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: String,
        operand: Box<Expr>,
    },
    Compare {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    #[serde(other)]
    Opaque,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Stmt {
    /// Short kind name for node records.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Assign { .. } => "Assign",
            Stmt::Return { .. } => "Return",
            Stmt::ExprStmt { .. } => "ExprStmt",
            Stmt::If { .. } => "If",
            Stmt::While { .. } => "While",
            Stmt::For { .. } => "For",
            Stmt::Opaque => "Opaque",
        }
    }

    pub fn line_span(&self) -> (Option<usize>, Option<usize>) {
        match self {
            Stmt::Assign {
                line_start,
                line_end,
                ..
            }
            | Stmt::Return {
                line_start,
                line_end,
                ..
            }
            | Stmt::ExprStmt {
                line_start,
                line_end,
                ..
            }
            | Stmt::If {
                line_start,
                line_end,
                ..
            }
            | Stmt::While {
                line_start,
                line_end,
                ..
            }
            | Stmt::For {
                line_start,
                line_end,
                ..
            } => (*line_start, *line_end),
            Stmt::Opaque => (None, None),
        }
    }
}

impl Block {
    /// Whether any statement in the block (recursively) is a `Return`.
    pub fn contains_return(&self) -> bool {
        self.statements.iter().any(|s| match s {
            Stmt::Return { .. } => true,
            Stmt::If {
                then_block,
                else_block,
                ..
            } => {
                then_block.contains_return()
                    || else_block.as_ref().map_or(false, Block::contains_return)
            }
            Stmt::While { body, .. } | Stmt::For { body, .. } => body.contains_return(),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_simple_function() {
        let doc = r#"{
            "functions": [{
                "name": "f",
                "params": [{"name": "n"}],
                "body": {"statements": [
                    {"type": "Assign",
                     "target": {"type": "Var", "name": "x"},
                     "value": {"type": "Literal", "value": 0},
                     "line_start": 2, "line_end": 2},
                    {"type": "Return",
                     "value": {"type": "Var", "name": "x"},
                     "line_start": 3, "line_end": 3}
                ]}
            }]
        }"#;
        let program: Program = serde_json::from_str(doc).unwrap();
        assert_eq!(program.functions.len(), 1);
        let body = &program.functions[0].body;
        assert_eq!(body.statements.len(), 2);
        assert_eq!(body.statements[0].kind_name(), "Assign");
        assert_eq!(body.statements[0].line_span(), (Some(2), Some(2)));
    }

    #[test]
    fn test_unknown_stmt_kind_is_opaque() {
        let doc = r#"{"statements": [{"type": "GotoLabel", "label": "L1"}]}"#;
        let block: Block = serde_json::from_str(doc).unwrap();
        assert_eq!(block.statements[0].kind_name(), "Opaque");
    }

    #[test]
    fn test_unknown_expr_kind_is_opaque() {
        let doc = r#"{"type": "Lambda", "body": []}"#;
        let expr: Expr = serde_json::from_str(doc).unwrap();
        assert!(matches!(expr, Expr::Opaque));
    }

    #[test]
    fn test_contains_return_sees_nested() {
        let doc = r#"{"statements": [
            {"type": "If",
             "condition": {"type": "Literal", "value": true},
             "then_block": {"statements": [
                {"type": "Return", "value": {"type": "Literal", "value": 1}}
             ]}}
        ]}"#;
        let block: Block = serde_json::from_str(doc).unwrap();
        assert!(block.contains_return());
    }
}
