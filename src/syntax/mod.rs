//! Source syntax layer
//!
//! A small C#-flavoured front end: a lexer, an arena expression tree with
//! parent links and stable node identity, and a parser that produces the
//! declaration/statement outline the locator walks.

pub mod lexer;
pub mod outline;
pub mod parser;
pub mod tree;

pub use lexer::{line_col, Span};
pub use outline::{metadata_name, EnumDecl, Item, ScopeKind, ScopeSegment, SourceFile, Stmt};
pub use parser::{parse_expression, parse_source};
pub use tree::{BinaryOp, ExprKind, Literal, NodeId, SyntaxTree, TypeRef, UnaryOp};
