// Domain layer: AST contract, symbolic cost expressions, and report shapes.

pub mod algebra;
pub mod ast;
pub mod expr;
pub mod parse;
pub mod report;
