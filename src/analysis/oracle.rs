//! Constant/type oracle and the structure helpers built on top of it

use super::constant_folding::{ConstantFolder, ConstantValue, NameResolver};
use super::semantic::SemanticModel;
use crate::flags::FlagSet;
use crate::syntax::tree::{BinaryOp, ExprKind, Literal, NodeId, SyntaxTree, TypeRef, TypeTestOp, UnaryOp};
use serde::Serialize;

/// Coarse static type of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeHandle {
    /// The flag set being converted
    FlagSet,
    Integral,
    Text,
    Boolean,
    /// A stateless static class such as `Math`
    StaticContainer,
    Unknown,
}

/// Classify a written type against the flag set
pub fn classify_type(ty: &TypeRef, flag_set: &FlagSet) -> TypeHandle {
    if denotes_flag_set(ty, flag_set) {
        TypeHandle::FlagSet
    } else if !ty.is_scalar() {
        TypeHandle::Unknown
    } else if ty.integral_keyword().is_some() {
        TypeHandle::Integral
    } else {
        match ty.last_segment() {
            "string" | "String" => TypeHandle::Text,
            "bool" | "Boolean" => TypeHandle::Boolean,
            _ => TypeHandle::Unknown,
        }
    }
}

/// A written type denotes the flag set when its name is a suffix of the flag set's full path
pub fn denotes_flag_set(ty: &TypeRef, flag_set: &FlagSet) -> bool {
    if !ty.is_scalar() || ty.segments.is_empty() {
        return false;
    }
    let full = flag_set.full_path();
    ty.segments.len() <= full.len()
        && full[full.len() - ty.segments.len()..]
            .iter()
            .zip(ty.segments.iter())
            .all(|(a, b)| *a == b)
}

/// Answers constant and type questions about expression nodes
pub trait ConstantOracle {
    fn constant_value(&self, tree: &SyntaxTree, node: NodeId) -> Option<ConstantValue>;
    fn static_type_of(&self, tree: &SyntaxTree, node: NodeId) -> TypeHandle;
}

/// Oracle backed by the flag set and the locator's identifier bindings
pub struct SemanticOracle<'a> {
    flag_set: &'a FlagSet,
    model: &'a SemanticModel,
}

impl<'a> SemanticOracle<'a> {
    pub fn new(flag_set: &'a FlagSet, model: &'a SemanticModel) -> Self {
        Self { flag_set, model }
    }
}

impl<'a> NameResolver for SemanticOracle<'a> {
    /// `Flags.A`, `Outer.Flags.A`, `global::Ns.Outer.Flags.A`
    fn resolve_path(&self, path: &[&str]) -> Option<i64> {
        let (member, qualifier) = path.split_last()?;
        if qualifier.is_empty() {
            return None;
        }
        let qualifier: Vec<&str> = match qualifier.first() {
            Some(&"global") => qualifier[1..].to_vec(),
            _ => qualifier.to_vec(),
        };
        let full = self.flag_set.full_path();
        if qualifier.len() > full.len() || full[full.len() - qualifier.len()..] != qualifier[..] {
            return None;
        }
        self.flag_set.entry(member).map(|e| e.value)
    }

    fn is_flag_type(&self, ty: &TypeRef) -> bool {
        denotes_flag_set(ty, self.flag_set)
    }
}

impl<'a> ConstantOracle for SemanticOracle<'a> {
    fn constant_value(&self, tree: &SyntaxTree, node: NodeId) -> Option<ConstantValue> {
        ConstantFolder::evaluate(tree, node, self)
    }

    fn static_type_of(&self, tree: &SyntaxTree, node: NodeId) -> TypeHandle {
        match tree.kind(node) {
            ExprKind::Literal(literal) => match literal {
                Literal::Int(_) | Literal::Char(_) => TypeHandle::Integral,
                Literal::Str(_) | Literal::Interpolated => TypeHandle::Text,
                Literal::Bool(_) => TypeHandle::Boolean,
                _ => TypeHandle::Unknown,
            },
            ExprKind::Identifier(_) => self.model.type_of(node),
            ExprKind::MemberAccess { member, .. } => {
                let is_entry = tree
                    .dotted_path(node)
                    .map_or(false, |path| self.resolve_path(&path).is_some());
                if is_entry {
                    TypeHandle::FlagSet
                } else {
                    self.model.type_of(*member)
                }
            }
            ExprKind::Invocation { callee, .. } => match tree.kind(*callee) {
                ExprKind::Identifier(_) => self.model.type_of(*callee),
                ExprKind::MemberAccess { member, .. } => self.model.type_of(*member),
                _ => TypeHandle::Unknown,
            },
            ExprKind::Cast { ty, .. } | ExprKind::ObjectCreation { ty, .. } => classify_type(ty, self.flag_set),
            ExprKind::Paren(inner) => self.static_type_of(tree, *inner),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::LogicalNot => TypeHandle::Boolean,
                _ => self.static_type_of(tree, *operand),
            },
            ExprKind::Binary { op, left, right } => {
                if matches!(
                    op,
                    BinaryOp::Less
                        | BinaryOp::Greater
                        | BinaryOp::LessEqual
                        | BinaryOp::GreaterEqual
                        | BinaryOp::Equal
                        | BinaryOp::NotEqual
                        | BinaryOp::LogicalAnd
                        | BinaryOp::LogicalOr
                ) {
                    return TypeHandle::Boolean;
                }
                let left = self.static_type_of(tree, *left);
                let right = self.static_type_of(tree, *right);
                if left == TypeHandle::FlagSet || right == TypeHandle::FlagSet {
                    TypeHandle::FlagSet
                } else if left == right {
                    left
                } else {
                    TypeHandle::Unknown
                }
            }
            ExprKind::Conditional { when_true, .. } => self.static_type_of(tree, *when_true),
            ExprKind::Assignment { target, .. } => self.static_type_of(tree, *target),
            ExprKind::TypeTest { op, ty, .. } => match op {
                TypeTestOp::Is => TypeHandle::Boolean,
                TypeTestOp::As => classify_type(ty, self.flag_set),
            },
            ExprKind::ElementAccess { .. } | ExprKind::Opaque => TypeHandle::Unknown,
        }
    }
}

/// Flag-engine view over an oracle: integer constants plus wrapper handling
pub struct OracleAdapter<'a> {
    tree: &'a SyntaxTree,
    oracle: &'a dyn ConstantOracle,
    conversion_calls: &'a [String],
}

impl<'a> OracleAdapter<'a> {
    pub fn new(tree: &'a SyntaxTree, oracle: &'a dyn ConstantOracle, conversion_calls: &'a [String]) -> Self {
        Self {
            tree,
            oracle,
            conversion_calls,
        }
    }

    pub fn tree(&self) -> &'a SyntaxTree {
        self.tree
    }

    /// Integer value of a node; chars and one-character strings count as their ordinal
    pub fn constant_of(&self, node: NodeId) -> Option<i64> {
        match self.oracle.constant_value(self.tree, node)? {
            ConstantValue::Integer(value) => Some(value),
            ConstantValue::Char(c) => Some(c as i64),
            ConstantValue::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c as i64),
                    _ => None,
                }
            }
            ConstantValue::Boolean(_) => None,
        }
    }

    pub fn is_boolean_constant(&self, node: NodeId) -> bool {
        matches!(
            self.oracle.constant_value(self.tree, node),
            Some(ConstantValue::Boolean(_))
        )
    }

    pub fn static_type_of(&self, node: NodeId) -> TypeHandle {
        self.oracle.static_type_of(self.tree, node)
    }

    pub fn unwrap_casts(&self, mut node: NodeId) -> NodeId {
        while let ExprKind::Cast { operand, .. } = self.tree.kind(node) {
            node = *operand;
        }
        node
    }

    pub fn unwrap_parens(&self, mut node: NodeId) -> NodeId {
        while let ExprKind::Paren(inner) = self.tree.kind(node) {
            node = *inner;
        }
        node
    }

    /// Strip casts and parentheses in any interleaving
    pub fn unwrap_value(&self, node: NodeId) -> NodeId {
        let mut current = node;
        loop {
            let next = self.unwrap_parens(self.unwrap_casts(current));
            if next == current {
                return current;
            }
            current = next;
        }
    }

    /// Numeric literal as written: integer, char or one-character string
    pub fn is_numeric_literal(&self, node: NodeId) -> bool {
        match self.tree.kind(node) {
            ExprKind::Literal(Literal::Int(_)) | ExprKind::Literal(Literal::Char(_)) => true,
            ExprKind::Literal(Literal::Str(s)) => s.chars().count() == 1,
            _ => false,
        }
    }

    /// Whether a callee path is on the conversion allow-list
    pub fn is_conversion_name(&self, path: &[&str]) -> bool {
        if path.is_empty() {
            return false;
        }
        let dotted = path.join(".");
        let first = path[0];
        let last = path[path.len() - 1];
        self.conversion_calls
            .iter()
            .any(|name| *name == dotted || name == first || name == last)
    }

    /// An invocation whose callee is on the conversion allow-list
    pub fn is_allowed_conversion_call(&self, node: NodeId) -> bool {
        match self.tree.kind(node) {
            ExprKind::Invocation { callee, .. } => self
                .tree
                .dotted_path(*callee)
                .map_or(false, |path| self.is_conversion_name(&path)),
            _ => false,
        }
    }

    /// The single argument of an allowed conversion call
    pub fn conversion_argument(&self, node: NodeId) -> Option<NodeId> {
        if !self.is_allowed_conversion_call(node) {
            return None;
        }
        match self.tree.kind(node) {
            ExprKind::Invocation { args, .. } if args.len() == 1 => Some(args[0]),
            _ => None,
        }
    }

    /// Outermost cast, parenthesis or conversion call wrapping `node`, not past `boundary`
    pub fn replacement_target(&self, node: NodeId, boundary: NodeId) -> NodeId {
        let mut target = node;
        while target != boundary {
            let Some(parent) = self.tree.parent(target) else {
                break;
            };
            let wraps = match self.tree.kind(parent) {
                ExprKind::Paren(_) | ExprKind::Cast { .. } => true,
                ExprKind::Invocation { .. } => self.conversion_argument(parent) == Some(target),
                _ => false,
            };
            if !wraps {
                break;
            }
            target = parent;
        }
        target
    }
}
