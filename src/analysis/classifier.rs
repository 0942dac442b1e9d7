//! Expression classifier
//!
//! Decides, for one candidate expression, which integer literals stand for
//! flag values and hands them to the rewrite engine. The order matters:
//!
//! 1. a bare literal (possibly cast or parenthesized) is rewritten directly
//! 2. the identifier guard rejects expressions mixing in foreign values
//! 3. `(x & M) > 0`, `(x & M) == M` and `(x & M) == 0` become has-flag calls
//! 4. OR/ADD chains lighting the same bit twice are rejected
//! 5. constant binary subtrees are folded, other binaries get their literal
//!    operands rewritten
//! 6. constant operands of `~` are rewritten

use super::guards::{self, GuardVerdict};
use super::oracle::OracleAdapter;
use crate::flags::Decomposition;
use crate::rewrite::context::{DiagnosticKind, RunContext};
use crate::rewrite::engine::RewriteEngine;
use crate::syntax::tree::{BinaryOp, ExprKind, NodeId, SyntaxTree, UnaryOp};
use std::collections::HashSet;

/// What happened to one candidate expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Number of nodes replaced
    Rewritten(usize),
    HasFlag,
    Unchanged,
    Rejected(DiagnosticKind),
}

pub struct Classifier<'a> {
    adapter: &'a OracleAdapter<'a>,
    engine: RewriteEngine<'a>,
    has_flag_method: &'a str,
}

impl<'a> Classifier<'a> {
    pub fn new(adapter: &'a OracleAdapter<'a>, engine: RewriteEngine<'a>, has_flag_method: &'a str) -> Self {
        Self {
            adapter,
            engine,
            has_flag_method,
        }
    }

    /// Classify and rewrite one candidate expression
    ///
    /// `subject` is the flag-typed symbol the expression is about, if known.
    /// `allow_grouping_parens` lets a multi-entry rendering at the root be
    /// wrapped in parentheses.
    pub fn analyze(
        &mut self,
        ctx: &mut RunContext,
        expr: NodeId,
        subject: Option<&str>,
        allow_grouping_parens: bool,
    ) -> Outcome {
        let tree = self.adapter.tree();
        let before = ctx.replaced();
        let node = self.adapter.unwrap_value(expr);
        log::debug!("Analyzing `{}` (subject: {:?})", tree.text(expr), subject);

        if self.adapter.is_numeric_literal(node) {
            if let Some(value) = self.adapter.constant_of(node) {
                self.engine.replace(ctx, node, value, expr, allow_grouping_parens);
                return Self::outcome(ctx, before);
            }
        }

        match guards::check_identifiers(self.adapter, node, subject) {
            GuardVerdict::Clear => {}
            GuardVerdict::RepeatedSubject { name, count } => {
                ctx.report_at(
                    DiagnosticKind::AmbiguousExpression,
                    format!(
                        "`{}` is used {} times in `{}`; expression left unchanged",
                        name,
                        count,
                        tree.text(expr)
                    ),
                    tree,
                    expr,
                );
                return Outcome::Rejected(DiagnosticKind::AmbiguousExpression);
            }
            GuardVerdict::ForeignIdentifier { name } => {
                ctx.report_at(
                    DiagnosticKind::AmbiguousExpression,
                    format!(
                        "Ambiguous expression `{}`: `{}` is not a flag value; expression left unchanged",
                        tree.text(expr),
                        name
                    ),
                    tree,
                    expr,
                );
                return Outcome::Rejected(DiagnosticKind::AmbiguousExpression);
            }
        }

        if self.try_has_flag(ctx, node) {
            return Outcome::HasFlag;
        }

        if let Some(duplicate) = guards::find_duplicate_bits(self.adapter, node) {
            ctx.report_at(
                DiagnosticKind::DuplicateBitContribution,
                format!(
                    "`{}` sets bit(s) {:#x} more than once; expression left unchanged",
                    tree.text(duplicate.chain),
                    duplicate.bits
                ),
                tree,
                duplicate.chain,
            );
            return Outcome::Rejected(DiagnosticKind::DuplicateBitContribution);
        }

        self.fold_binaries(ctx, node, expr, allow_grouping_parens);
        self.rewrite_complements(ctx, node, expr, allow_grouping_parens);

        Self::outcome(ctx, before)
    }

    fn outcome(ctx: &RunContext, before: usize) -> Outcome {
        match ctx.replaced() - before {
            0 => Outcome::Unchanged,
            n => Outcome::Rewritten(n),
        }
    }

    /// `(x & M) > 0`, `(x & M) == M` and `(x & M) == 0`; returns true when the
    /// idiom matched, whether or not the mask could be rendered
    fn try_has_flag(&mut self, ctx: &mut RunContext, node: NodeId) -> bool {
        let adapter = self.adapter;
        let tree = adapter.tree();
        let Some((comparison, left, right)) = tree.binary(node) else {
            return false;
        };
        let Some(right_value) = adapter.constant_of(right) else {
            return false;
        };
        let ExprKind::Paren(inner) = tree.kind(adapter.unwrap_casts(left)) else {
            return false;
        };
        let Some((BinaryOp::BitAnd, variable, mask)) = tree.binary(adapter.unwrap_parens(*inner)) else {
            return false;
        };

        let mask = adapter.unwrap_value(adapter.conversion_argument(mask).unwrap_or(mask));
        if has_operators(tree, mask) {
            return false;
        }
        let Some(mask_value) = adapter.constant_of(mask) else {
            return false;
        };

        let negated = match comparison {
            BinaryOp::Greater if right_value == 0 => false,
            BinaryOp::Equal if mask_value == right_value => false,
            BinaryOp::Equal if mask_value != 0 && right_value == 0 => true,
            _ => return false,
        };

        let mut variable = adapter.unwrap_value(variable);
        if let Some(argument) = adapter.conversion_argument(variable) {
            variable = adapter.unwrap_value(argument);
        }
        let plain_receiver = matches!(
            tree.kind(variable),
            ExprKind::Identifier(_) | ExprKind::MemberAccess { .. } | ExprKind::ElementAccess { .. }
        ) && adapter.constant_of(variable).is_none()
            && !has_operators(tree, variable);
        if !plain_receiver {
            return false;
        }

        let flag_set = self.engine.flag_set();
        let decomposition = flag_set.resolve(mask_value);
        if let Decomposition::Unresolved { missing_bits, .. } = &decomposition {
            ctx.report_at(
                DiagnosticKind::UnresolvedBits,
                format!(
                    "Could not resolve mask {} in `{}`: no entry for bit(s) {:?}",
                    mask_value,
                    tree.text(node),
                    missing_bits
                ),
                tree,
                node,
            );
            return true;
        }

        let text = format!(
            "{}{}.{}({})",
            if negated { "!" } else { "" },
            tree.text(variable),
            self.has_flag_method,
            flag_set.render(&decomposition)
        );
        self.engine.replace_with_text(ctx, node, text);
        true
    }

    fn fold_binaries(&mut self, ctx: &mut RunContext, node: NodeId, root: NodeId, allow_grouping_parens: bool) {
        let adapter = self.adapter;
        let tree = adapter.tree();
        let mut skip: HashSet<NodeId> = HashSet::new();

        for binary in tree.descendants_and_self(node) {
            if skip.contains(&binary) || tree.binary(binary).is_none() {
                continue;
            }

            if let Some(value) = adapter.constant_of(binary) {
                // already symbolic, e.g. `Flags.A | Flags.B`
                if self.has_literal(binary) {
                    self.engine.replace(ctx, binary, value, root, allow_grouping_parens);
                }
                skip.extend(tree.descendants_and_self(binary));
                continue;
            }
            if adapter.is_boolean_constant(binary) {
                skip.extend(tree.descendants_and_self(binary));
                continue;
            }

            let Some(filtered) = self.filter_binary(binary) else {
                continue;
            };
            skip.insert(filtered);

            let mut literals = self.literal_children(filtered);
            if literals.is_empty() {
                literals = self.conversion_children(filtered);
            }
            for literal in literals {
                if let Some(value) = adapter.constant_of(literal) {
                    self.engine.replace(ctx, literal, value, root, allow_grouping_parens);
                }
            }
        }
    }

    /// The part of a non-constant binary whose literal operands are flag values
    fn filter_binary(&self, binary: NodeId) -> Option<NodeId> {
        let adapter = self.adapter;
        let tree = adapter.tree();
        let (op, left, right) = tree.binary(binary)?;

        if tree.enclosing_argument(binary).is_some() && !op.is_bitwise() && op != BinaryOp::Equal {
            return None;
        }
        if matches!(op, BinaryOp::Greater | BinaryOp::GreaterEqual | BinaryOp::Equal)
            && adapter.constant_of(right) == Some(0)
        {
            return Some(adapter.unwrap_parens(left));
        }
        Some(binary)
    }

    /// Direct children that are numeric literals once casts and parentheses are removed
    fn literal_children(&self, node: NodeId) -> Vec<NodeId> {
        self.adapter
            .tree()
            .children(node)
            .into_iter()
            .map(|child| self.adapter.unwrap_value(child))
            .filter(|child| self.adapter.is_numeric_literal(*child))
            .collect()
    }

    /// Arguments of single-argument conversion calls among the direct children
    fn conversion_children(&self, node: NodeId) -> Vec<NodeId> {
        self.adapter
            .tree()
            .children(node)
            .into_iter()
            .filter_map(|child| self.adapter.conversion_argument(self.adapter.unwrap_value(child)))
            .map(|argument| self.adapter.unwrap_value(argument))
            .filter(|argument| self.adapter.is_numeric_literal(*argument))
            .collect()
    }

    fn has_literal(&self, node: NodeId) -> bool {
        self.adapter
            .tree()
            .descendants_and_self(node)
            .into_iter()
            .any(|n| self.adapter.is_numeric_literal(n))
    }

    fn rewrite_complements(&mut self, ctx: &mut RunContext, node: NodeId, root: NodeId, allow_grouping_parens: bool) {
        let adapter = self.adapter;
        let tree = adapter.tree();
        for id in tree.descendants_and_self(node) {
            let ExprKind::Unary {
                op: UnaryOp::BitNot,
                operand,
            } = tree.kind(id)
            else {
                continue;
            };
            if ctx.is_rewritten(tree, *operand) || !self.has_literal(*operand) {
                continue;
            }
            if let Some(value) = adapter.constant_of(*operand) {
                self.engine.replace(ctx, *operand, value, root, allow_grouping_parens);
            }
        }
    }
}

fn has_operators(tree: &SyntaxTree, node: NodeId) -> bool {
    tree.descendants_and_self(node)
        .into_iter()
        .any(|n| matches!(tree.kind(n), ExprKind::Binary { .. } | ExprKind::Unary { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::oracle::{SemanticOracle, TypeHandle};
    use crate::analysis::semantic::SemanticModel;
    use crate::flags::FlagSet;
    use crate::rewrite::sink::TextEditSink;
    use crate::syntax::parse_expression;

    fn run(expr: &str, subject: Option<&str>) -> (String, Outcome, RunContext) {
        let flag_set = FlagSet::build("enum F { None = 0, A = 1, B = 2, C = 4 }").unwrap();
        let (tree, root) = parse_expression(expr).unwrap();
        let mut model = SemanticModel::new();
        for id in tree.descendants_and_self(root) {
            if subject.is_some() && tree.identifier_name(id) == subject {
                model.bind(id, TypeHandle::FlagSet);
            }
        }
        let oracle = SemanticOracle::new(&flag_set, &model);
        let calls = vec!["Conversions".to_string()];
        let adapter = OracleAdapter::new(&tree, &oracle, &calls);
        let mut sink = TextEditSink::new();
        let mut ctx = RunContext::new();
        ctx.begin_document("expr");
        let outcome = {
            let engine = RewriteEngine::new(&adapter, &flag_set, &mut sink);
            let mut classifier = Classifier::new(&adapter, engine, "HasFlag");
            classifier.analyze(&mut ctx, root, subject, false)
        };
        (sink.apply("expr", expr).unwrap(), outcome, ctx)
    }

    #[test]
    fn test_bare_literal() {
        let (text, outcome, _) = run("(F)6", None);
        assert_eq!(text, "F.B | F.C");
        assert_eq!(outcome, Outcome::Rewritten(1));
    }

    #[test]
    fn test_has_flag_negated() {
        let (text, outcome, _) = run("(x & 2) == 0", Some("x"));
        assert_eq!(text, "!x.HasFlag(F.B)");
        assert_eq!(outcome, Outcome::HasFlag);
    }

    #[test]
    fn test_foreign_identifier_is_rejected() {
        let (text, outcome, ctx) = run("x | y | 2", Some("x"));
        assert_eq!(text, "x | y | 2");
        assert_eq!(outcome, Outcome::Rejected(DiagnosticKind::AmbiguousExpression));
        assert_eq!(ctx.warnings(), 1);
    }

    #[test]
    fn test_complement_operand() {
        let (text, _, _) = run("x & ~(2 | 4)", Some("x"));
        assert_eq!(text, "x & ~(F.B | F.C)");
    }

    #[test]
    fn test_symbolic_operands_are_left_alone() {
        let (text, outcome, _) = run("x & ~(F.B | F.C)", Some("x"));
        assert_eq!(text, "x & ~(F.B | F.C)");
        assert_eq!(outcome, Outcome::Unchanged);
    }
}
