//! Arena-backed expression tree
//!
//! Expressions of every parsed document live in one `SyntaxTree`. Nodes are
//! addressed by `NodeId` and carry a parent link, so callers can walk both
//! down (children, pre-order descendants) and up (ancestors) without
//! borrowing issues. Node identity is the arena index, never the text.

use super::lexer::{line_col, Span};
use serde::Serialize;
use std::fmt;

/// Stable identity of an expression node within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A type as written in source, e.g. `int`, `global::Ns.Outer.Flags`, `uint?`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeRef {
    /// Dotted name segments without any `global::` prefix
    pub segments: Vec<String>,
    /// Source text of the whole type
    pub text: String,
    pub span: Span,
    pub nullable: bool,
    pub array_rank: usize,
    pub has_type_arguments: bool,
}

/// Keyword types that hold integral values
pub const INTEGRAL_TYPE_KEYWORDS: &[&str] = &[
    "sbyte", "byte", "short", "ushort", "int", "uint", "long", "ulong", "char", "nint", "nuint",
];

/// All predefined keyword types
pub const PREDEFINED_TYPE_KEYWORDS: &[&str] = &[
    "bool", "byte", "sbyte", "short", "ushort", "int", "uint", "long", "ulong", "char", "float",
    "double", "decimal", "string", "object", "void", "nint", "nuint", "dynamic",
];

impl TypeRef {
    pub fn simple(name: &str) -> Self {
        Self {
            segments: vec![name.to_string()],
            text: name.to_string(),
            span: Span::default(),
            nullable: false,
            array_rank: 0,
            has_type_arguments: false,
        }
    }

    pub fn is_predefined(&self) -> bool {
        self.segments.len() == 1 && PREDEFINED_TYPE_KEYWORDS.contains(&self.segments[0].as_str())
    }

    /// Integral keyword type (arrays and nullables excluded)
    pub fn integral_keyword(&self) -> Option<&str> {
        if self.array_rank > 0 || self.has_type_arguments || self.segments.len() != 1 {
            return None;
        }
        let name = self.segments[0].as_str();
        INTEGRAL_TYPE_KEYWORDS.contains(&name).then_some(name)
    }

    pub fn is_scalar(&self) -> bool {
        self.array_rank == 0 && !self.has_type_arguments
    }

    pub fn last_segment(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    /// Integer literal, stored with two's complement wrap for values above `i64::MAX`
    Int(i64),
    Real(f64),
    Char(char),
    Str(String),
    /// Interpolated string, opaque
    Interpolated,
    Bool(bool),
    Null,
    /// `default` or `default(T)`
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Plus,
    Negate,
    LogicalNot,
    BitNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Negate => "-",
            UnaryOp::LogicalNot => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::PreIncrement | UnaryOp::PostIncrement => "++",
            UnaryOp::PreDecrement | UnaryOp::PostDecrement => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinaryOp {
    Multiply,
    Divide,
    Remainder,
    Add,
    Subtract,
    ShiftLeft,
    ShiftRight,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    BitAnd,
    BitXor,
    BitOr,
    LogicalAnd,
    LogicalOr,
    Coalesce,
}

impl BinaryOp {
    /// Binding strength, higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Coalesce => 1,
            BinaryOp::LogicalOr => 2,
            BinaryOp::LogicalAnd => 3,
            BinaryOp::BitOr => 4,
            BinaryOp::BitXor => 5,
            BinaryOp::BitAnd => 6,
            BinaryOp::Equal | BinaryOp::NotEqual => 7,
            BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEqual | BinaryOp::GreaterEqual => 8,
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => 9,
            BinaryOp::Add | BinaryOp::Subtract => 10,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Remainder => 11,
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::Coalesce => "??",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignOp {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeTestOp {
    Is,
    As,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(String),
    /// `target.member`; the member name is its own `Identifier` node
    MemberAccess { target: NodeId, member: NodeId },
    Invocation { callee: NodeId, args: Vec<NodeId> },
    ElementAccess { target: NodeId, args: Vec<NodeId> },
    Cast { ty: TypeRef, operand: NodeId },
    Paren(NodeId),
    Unary { op: UnaryOp, operand: NodeId },
    Binary { op: BinaryOp, left: NodeId, right: NodeId },
    Conditional { condition: NodeId, when_true: NodeId, when_false: NodeId },
    Assignment { op: AssignOp, target: NodeId, value: NodeId },
    ObjectCreation { ty: TypeRef, args: Vec<NodeId> },
    TypeTest { op: TypeTestOp, operand: NodeId, ty: TypeRef },
    /// Lambdas, `await` and other constructs that are kept but never analysed
    Opaque,
}

impl ExprKind {
    /// Child nodes in source order
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            ExprKind::Literal(_) | ExprKind::Identifier(_) | ExprKind::Opaque => Vec::new(),
            ExprKind::MemberAccess { target, member } => vec![*target, *member],
            ExprKind::Invocation { callee, args } | ExprKind::ElementAccess { target: callee, args } => {
                let mut children = Vec::with_capacity(args.len() + 1);
                children.push(*callee);
                children.extend(args.iter().copied());
                children
            }
            ExprKind::Cast { operand, .. }
            | ExprKind::Paren(operand)
            | ExprKind::Unary { operand, .. }
            | ExprKind::TypeTest { operand, .. } => vec![*operand],
            ExprKind::Binary { left, right, .. } => vec![*left, *right],
            ExprKind::Conditional {
                condition,
                when_true,
                when_false,
            } => vec![*condition, *when_true, *when_false],
            ExprKind::Assignment { target, value, .. } => vec![*target, *value],
            ExprKind::ObjectCreation { args, .. } => args.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub kind: ExprKind,
    pub span: Span,
    pub parent: Option<NodeId>,
}

/// Expression arena for one source document
#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    source: String,
    nodes: Vec<Node>,
}

impl SyntaxTree {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            nodes: Vec::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node and adopt its children
    pub fn alloc(&mut self, kind: ExprKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for child in kind.children() {
            if let Some(node) = self.nodes.get_mut(child.index()) {
                node.parent = Some(id);
            }
        }
        self.nodes.push(Node {
            kind,
            span,
            parent: None,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &ExprKind {
        &self.nodes[id.index()].kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    /// Source text of a node
    pub fn text(&self, id: NodeId) -> &str {
        let span = self.span(id);
        &self.source[span.start..span.end]
    }

    /// 1-based line and column of a node's first character
    pub fn position(&self, id: NodeId) -> (usize, usize) {
        line_col(&self.source, self.span(id).start)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.kind(id).children()
    }

    /// The node followed by all of its descendants in pre-order
    pub fn descendants_and_self(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            let children = self.children(current);
            stack.extend(children.into_iter().rev());
        }
        order
    }

    /// Strict ancestors, innermost first
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    /// True when `ancestor` is `node` or one of its ancestors
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Ancestors of `id` up to and including `boundary`, innermost first
    ///
    /// When `boundary` is not an ancestor this yields every ancestor.
    pub fn ancestors_within(&self, id: NodeId, boundary: NodeId) -> Vec<NodeId> {
        if id == boundary {
            return Vec::new();
        }
        let mut result = Vec::new();
        for ancestor in self.ancestors(id) {
            result.push(ancestor);
            if ancestor == boundary {
                break;
            }
        }
        result
    }

    pub fn identifier_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            ExprKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn binary(&self, id: NodeId) -> Option<(BinaryOp, NodeId, NodeId)> {
        match self.kind(id) {
            ExprKind::Binary { op, left, right } => Some((*op, *left, *right)),
            _ => None,
        }
    }

    /// Dotted path of an identifier or member access chain, e.g. `A.B.C`
    pub fn dotted_path(&self, id: NodeId) -> Option<Vec<&str>> {
        match self.kind(id) {
            ExprKind::Identifier(name) => Some(vec![name.as_str()]),
            ExprKind::MemberAccess { target, member } => {
                let mut path = self.dotted_path(*target)?;
                path.push(self.identifier_name(*member)?);
                Some(path)
            }
            _ => None,
        }
    }

    /// Last name of a callee, e.g. `Foo` for `a.b.Foo`
    pub fn callee_name(&self, callee: NodeId) -> Option<&str> {
        match self.kind(callee) {
            ExprKind::Identifier(name) => Some(name),
            ExprKind::MemberAccess { member, .. } => self.identifier_name(*member),
            _ => None,
        }
    }

    /// The call (and argument index) whose argument list contains `id`, if any
    pub fn enclosing_argument(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let mut child = id;
        for ancestor in self.ancestors(id) {
            match self.kind(ancestor) {
                ExprKind::Invocation { args, .. }
                | ExprKind::ElementAccess { args, .. }
                | ExprKind::ObjectCreation { args, .. } => {
                    if let Some(index) = args.iter().position(|a| *a == child) {
                        return Some((ancestor, index));
                    }
                }
                _ => {}
            }
            child = ancestor;
        }
        None
    }

    /// True when `id` is the member-name half of a member access
    pub fn is_member_name(&self, id: NodeId) -> bool {
        match self.parent(id).map(|p| self.kind(p)) {
            Some(ExprKind::MemberAccess { member, .. }) => *member == id,
            _ => false,
        }
    }
}

pub struct Ancestors<'a> {
    tree: &'a SyntaxTree,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(tree: &mut SyntaxTree, value: i64, start: usize) -> NodeId {
        tree.alloc(ExprKind::Literal(Literal::Int(value)), Span::new(start, start + 1))
    }

    #[test]
    fn test_alloc_links_parents() {
        let mut tree = SyntaxTree::new("1|2");
        let left = leaf(&mut tree, 1, 0);
        let right = leaf(&mut tree, 2, 2);
        let or = tree.alloc(
            ExprKind::Binary {
                op: BinaryOp::BitOr,
                left,
                right,
            },
            Span::new(0, 3),
        );
        assert_eq!(tree.parent(left), Some(or));
        assert_eq!(tree.parent(or), None);
        assert_eq!(tree.descendants_and_self(or), vec![or, left, right]);
        assert!(tree.contains(or, right));
        assert!(!tree.contains(left, right));
        assert_eq!(tree.text(right), "2");
    }

    #[test]
    fn test_precedence_order() {
        assert!(BinaryOp::BitAnd.precedence() > BinaryOp::BitOr.precedence());
        assert!(BinaryOp::Equal.precedence() > BinaryOp::BitAnd.precedence());
        assert!(BinaryOp::LogicalAnd.precedence() < BinaryOp::BitOr.precedence());
    }
}
