//! Constant folding over expression nodes
//!
//! Evaluates compile-time constant expressions with C# integer semantics
//! (wrapping arithmetic, truncating casts). Named constants are looked up
//! through a `NameResolver` so the same folder serves both enum member
//! initialisers and flag references inside method bodies.

use crate::syntax::tree::{BinaryOp, ExprKind, Literal, NodeId, SyntaxTree, TypeRef, UnaryOp};

/// A compile-time constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantValue {
    Integer(i64),
    Char(char),
    String(String),
    Boolean(bool),
}

impl ConstantValue {
    /// Integral view of the value (integers and chars)
    pub fn as_number(&self) -> Option<i64> {
        match self {
            ConstantValue::Integer(value) => Some(*value),
            ConstantValue::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstantValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

/// Supplies values of named constants
pub trait NameResolver {
    /// Value of the constant named by a dotted path such as `Flags.A`
    fn resolve_path(&self, path: &[&str]) -> Option<i64>;

    /// Whether a cast to `ty` keeps the integral value unchanged (the flag type itself)
    fn is_flag_type(&self, _ty: &TypeRef) -> bool {
        false
    }
}

/// Performs constant folding operations
pub struct ConstantFolder;

impl ConstantFolder {
    /// Evaluate a node, `None` when it is not a constant
    pub fn evaluate(tree: &SyntaxTree, node: NodeId, resolver: &dyn NameResolver) -> Option<ConstantValue> {
        match tree.kind(node) {
            ExprKind::Literal(literal) => match literal {
                Literal::Int(value) => Some(ConstantValue::Integer(*value)),
                Literal::Char(c) => Some(ConstantValue::Char(*c)),
                Literal::Str(s) => Some(ConstantValue::String(s.clone())),
                Literal::Bool(b) => Some(ConstantValue::Boolean(*b)),
                _ => None,
            },
            ExprKind::Identifier(_) | ExprKind::MemberAccess { .. } => {
                let path = tree.dotted_path(node)?;
                resolver.resolve_path(&path).map(ConstantValue::Integer)
            }
            ExprKind::Paren(inner) => Self::evaluate(tree, *inner, resolver),
            ExprKind::Cast { ty, operand } => {
                let value = Self::evaluate(tree, *operand, resolver)?;
                Self::fold_cast(ty, &value, resolver)
            }
            ExprKind::Unary { op, operand } => {
                let value = Self::evaluate(tree, *operand, resolver)?;
                Self::fold_unary(*op, &value)
            }
            ExprKind::Binary { op, left, right } => {
                let left = Self::evaluate(tree, *left, resolver)?;
                let right = Self::evaluate(tree, *right, resolver)?;
                Self::fold_binary(*op, &left, &right)
            }
            ExprKind::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                let condition = Self::evaluate(tree, *condition, resolver)?.as_bool()?;
                let branch = if condition { *when_true } else { *when_false };
                Self::evaluate(tree, branch, resolver)
            }
            ExprKind::Invocation { .. }
            | ExprKind::ElementAccess { .. }
            | ExprKind::Assignment { .. }
            | ExprKind::ObjectCreation { .. }
            | ExprKind::TypeTest { .. }
            | ExprKind::Opaque => None,
        }
    }

    /// Fold a binary operation with constant operands
    pub fn fold_binary(op: BinaryOp, left: &ConstantValue, right: &ConstantValue) -> Option<ConstantValue> {
        if let (Some(l), Some(r)) = (left.as_bool(), right.as_bool()) {
            return match op {
                BinaryOp::LogicalAnd => Some(ConstantValue::Boolean(l && r)),
                BinaryOp::LogicalOr => Some(ConstantValue::Boolean(l || r)),
                BinaryOp::Equal => Some(ConstantValue::Boolean(l == r)),
                BinaryOp::NotEqual => Some(ConstantValue::Boolean(l != r)),
                _ => None,
            };
        }

        let l = left.as_number()?;
        let r = right.as_number()?;
        let integer = |value: i64| Some(ConstantValue::Integer(value));
        let boolean = |value: bool| Some(ConstantValue::Boolean(value));
        match op {
            BinaryOp::Add => integer(l.wrapping_add(r)),
            BinaryOp::Subtract => integer(l.wrapping_sub(r)),
            BinaryOp::Multiply => integer(l.wrapping_mul(r)),
            BinaryOp::Divide => l.checked_div(r).map(ConstantValue::Integer),
            BinaryOp::Remainder => l.checked_rem(r).map(ConstantValue::Integer),
            BinaryOp::ShiftLeft => integer(Self::shift(l, r, true)),
            BinaryOp::ShiftRight => integer(Self::shift(l, r, false)),
            BinaryOp::BitAnd => integer(l & r),
            BinaryOp::BitOr => integer(l | r),
            BinaryOp::BitXor => integer(l ^ r),
            BinaryOp::Less => boolean(l < r),
            BinaryOp::Greater => boolean(l > r),
            BinaryOp::LessEqual => boolean(l <= r),
            BinaryOp::GreaterEqual => boolean(l >= r),
            BinaryOp::Equal => boolean(l == r),
            BinaryOp::NotEqual => boolean(l != r),
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::Coalesce => None,
        }
    }

    /// Shift with the width of the left operand: `int` when it fits, then
    /// `uint`, else `long`. The count is masked to that width.
    pub fn shift(value: i64, count: i64, left: bool) -> i64 {
        if let Ok(v) = i32::try_from(value) {
            let count = (count & 31) as u32;
            (if left { v.wrapping_shl(count) } else { v.wrapping_shr(count) }) as i64
        } else if let Ok(v) = u32::try_from(value) {
            let count = (count & 31) as u32;
            (if left { v.wrapping_shl(count) } else { v.wrapping_shr(count) }) as i64
        } else {
            let count = (count & 63) as u32;
            if left {
                value.wrapping_shl(count)
            } else {
                value.wrapping_shr(count)
            }
        }
    }

    /// Fold a unary operation
    pub fn fold_unary(op: UnaryOp, value: &ConstantValue) -> Option<ConstantValue> {
        match op {
            UnaryOp::LogicalNot => value.as_bool().map(|b| ConstantValue::Boolean(!b)),
            UnaryOp::Plus => value.as_number().map(ConstantValue::Integer),
            UnaryOp::Negate => value.as_number().map(|v| ConstantValue::Integer(v.wrapping_neg())),
            UnaryOp::BitNot => value.as_number().map(|v| ConstantValue::Integer(!v)),
            _ => None,
        }
    }

    /// Apply an explicit conversion to a constant
    pub fn fold_cast(ty: &TypeRef, value: &ConstantValue, resolver: &dyn NameResolver) -> Option<ConstantValue> {
        if let Some(keyword) = ty.integral_keyword() {
            let number = value.as_number()?;
            return Some(match keyword {
                "char" => ConstantValue::Char(char::from_u32(number as u16 as u32)?),
                _ => ConstantValue::Integer(Self::truncate(keyword, number)),
            });
        }
        if resolver.is_flag_type(ty) {
            return value.as_number().map(ConstantValue::Integer);
        }
        None
    }

    /// Truncate to the width of an integral keyword type
    pub fn truncate(keyword: &str, value: i64) -> i64 {
        match keyword {
            "sbyte" => value as i8 as i64,
            "byte" => value as u8 as i64,
            "short" => value as i16 as i64,
            "ushort" | "char" => value as u16 as i64,
            "int" => value as i32 as i64,
            "uint" => value as u32 as i64,
            _ => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_expression;

    struct NoNames;

    impl NameResolver for NoNames {
        fn resolve_path(&self, _path: &[&str]) -> Option<i64> {
            None
        }
    }

    fn eval(source: &str) -> Option<ConstantValue> {
        let (tree, root) = parse_expression(source).unwrap();
        ConstantFolder::evaluate(&tree, root, &NoNames)
    }

    #[test]
    fn test_arithmetic_and_bitwise() {
        assert_eq!(eval("1 + 2 + 4 + 248"), Some(ConstantValue::Integer(255)));
        assert_eq!(eval("(1 << 3) | 2"), Some(ConstantValue::Integer(10)));
        assert_eq!(eval("~2 & 7"), Some(ConstantValue::Integer(5)));
        assert_eq!(eval("2 * 4 + 8"), Some(ConstantValue::Integer(16)));
    }

    #[test]
    fn test_division_by_zero_is_not_constant() {
        assert_eq!(eval("4 / 0"), None);
    }

    #[test]
    fn test_casts_truncate() {
        assert_eq!(eval("(byte)257"), Some(ConstantValue::Integer(1)));
        assert_eq!(eval("(char)65"), Some(ConstantValue::Char('A')));
        assert_eq!(eval("(int)'a'"), Some(ConstantValue::Integer(97)));
    }

    #[test]
    fn test_unknown_names_are_not_constant() {
        assert_eq!(eval("x | 2"), None);
        assert_eq!(eval("Foo(2)"), None);
    }

    #[test]
    fn test_comparisons_fold_to_booleans() {
        assert_eq!(eval("1 < 2"), Some(ConstantValue::Boolean(true)));
        assert_eq!(eval("1 < 2 && 3 == 4"), Some(ConstantValue::Boolean(false)));
    }

    #[test]
    fn test_shift_count_follows_operand_width() {
        assert_eq!(eval("1 << 33"), Some(ConstantValue::Integer(2)));
        assert_eq!(eval("1 << 31"), Some(ConstantValue::Integer(i32::MIN as i64)));
        assert_eq!(eval("-8 >> 1"), Some(ConstantValue::Integer(-4)));
        assert_eq!(eval("0x80000000 >> 31"), Some(ConstantValue::Integer(1)));
        assert_eq!(eval("0x100000000 << 1"), Some(ConstantValue::Integer(0x200000000)));
    }
}
