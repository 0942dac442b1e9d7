//! Rewrite engine: turns an integer at a node into flag symbols
//!
//! Every accepted rewrite goes through the change ledger so that a node,
//! or anything nested in or around it, is rewritten at most once per run.

use super::context::{DiagnosticKind, RunContext};
use super::sink::MutationSink;
use crate::analysis::oracle::OracleAdapter;
use crate::flags::{Decomposition, FlagSet};
use crate::syntax::tree::{BinaryOp, ExprKind, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    Applied,
    Unresolved,
    Conflict,
    SinkRejected,
}

pub struct RewriteEngine<'a> {
    adapter: &'a OracleAdapter<'a>,
    flag_set: &'a FlagSet,
    sink: &'a mut dyn MutationSink,
}

impl<'a> RewriteEngine<'a> {
    pub fn new(adapter: &'a OracleAdapter<'a>, flag_set: &'a FlagSet, sink: &'a mut dyn MutationSink) -> Self {
        Self {
            adapter,
            flag_set,
            sink,
        }
    }

    pub fn flag_set(&self) -> &'a FlagSet {
        self.flag_set
    }

    /// Replace the value at `node` (or the outermost wrapper around it, up to
    /// `boundary`) with the rendered decomposition of `value`
    pub fn replace(
        &mut self,
        ctx: &mut RunContext,
        node: NodeId,
        value: i64,
        boundary: NodeId,
        allow_grouping_parens: bool,
    ) -> RewriteOutcome {
        let tree = self.adapter.tree();
        let target = self.adapter.replacement_target(node, boundary);
        let decomposition = self.flag_set.resolve(value);

        if let Decomposition::Unresolved { missing_bits, .. } = &decomposition {
            let partial = self.flag_set.render(&decomposition);
            let mut message = format!(
                "Could not resolve {} in `{}`: no entry for bit(s) {:?}",
                value,
                tree.text(target),
                missing_bits
            );
            if !partial.is_empty() {
                message.push_str(&format!(" (resolved part: {})", partial));
            }
            ctx.report_at(DiagnosticKind::UnresolvedBits, message, tree, target);
            return RewriteOutcome::Unresolved;
        }

        let mut text = self.flag_set.render(&decomposition);
        if decomposition.entry_count() > 1 && self.needs_parens(target, boundary, allow_grouping_parens) {
            text = format!("({})", text);
        }
        self.commit(ctx, target, text)
    }

    /// Replace `target` with literal replacement text
    pub fn replace_with_text(&mut self, ctx: &mut RunContext, target: NodeId, text: String) -> RewriteOutcome {
        self.commit(ctx, target, text)
    }

    fn commit(&mut self, ctx: &mut RunContext, target: NodeId, text: String) -> RewriteOutcome {
        let tree = self.adapter.tree();
        if ctx.is_rewritten(tree, target) {
            ctx.report_at(
                DiagnosticKind::DoubleRewriteConflict,
                format!("`{}` overlaps a node that was already rewritten", tree.text(target)),
                tree,
                target,
            );
            return RewriteOutcome::Conflict;
        }

        if let Err(err) = self.sink.replace_node(tree.span(target), &text) {
            ctx.report_at(
                DiagnosticKind::SinkRejected,
                format!("Could not replace `{}`: {}", tree.text(target), err),
                tree,
                target,
            );
            return RewriteOutcome::SinkRejected;
        }

        log::info!("Replaced node: {} with: {}", tree.text(target), text);
        ctx.record_rewrite(tree, target);
        RewriteOutcome::Applied
    }

    /// A multi-entry rendering needs its own parentheses when the parent binds
    /// tighter than `|`, or at the candidate root when grouping is allowed
    fn needs_parens(&self, target: NodeId, boundary: NodeId, allow_grouping_parens: bool) -> bool {
        let tree = self.adapter.tree();
        let Some(parent) = tree.parent(target) else {
            return allow_grouping_parens;
        };
        let binds_tighter = match tree.kind(parent) {
            ExprKind::Paren(_) => return false,
            ExprKind::Binary { op, .. } => op.precedence() > BinaryOp::BitOr.precedence(),
            ExprKind::Unary { .. } | ExprKind::Cast { .. } | ExprKind::TypeTest { .. } => true,
            ExprKind::MemberAccess { target: object, .. } | ExprKind::ElementAccess { target: object, .. } => {
                *object == target
            }
            _ => false,
        };
        binds_tighter || (target == boundary && allow_grouping_parens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::oracle::SemanticOracle;
    use crate::analysis::semantic::SemanticModel;
    use crate::rewrite::sink::TextEditSink;
    use crate::syntax::parse_expression;

    #[test]
    fn test_second_rewrite_of_covered_node_conflicts() {
        let flag_set = FlagSet::build("enum F { None = 0, A = 1, B = 2, C = 4 }").unwrap();
        let source = "x | (2 + 4)";
        let (tree, root) = parse_expression(source).unwrap();
        let (_, _, right) = tree.binary(root).unwrap();
        let sum = tree.children(right)[0];
        let (_, two, _) = tree.binary(sum).unwrap();

        let model = SemanticModel::new();
        let oracle = SemanticOracle::new(&flag_set, &model);
        let calls: Vec<String> = Vec::new();
        let adapter = OracleAdapter::new(&tree, &oracle, &calls);
        let mut sink = TextEditSink::new();
        let mut ctx = RunContext::new();
        ctx.begin_document("expr");

        let (first, again, nested) = {
            let mut engine = RewriteEngine::new(&adapter, &flag_set, &mut sink);
            (
                engine.replace(&mut ctx, sum, 6, root, false),
                engine.replace(&mut ctx, sum, 6, root, false),
                engine.replace(&mut ctx, two, 2, root, false),
            )
        };

        assert_eq!(first, RewriteOutcome::Applied);
        assert_eq!(again, RewriteOutcome::Conflict);
        assert_eq!(nested, RewriteOutcome::Conflict);
        assert_eq!(sink.len(), 1);
        assert_eq!(ctx.replaced(), 1);
        assert_eq!(ctx.errors(), 2);
        assert!(ctx
            .diagnostics()
            .iter()
            .all(|d| d.kind == DiagnosticKind::DoubleRewriteConflict));
        assert_eq!(sink.apply("expr", source).unwrap(), "x | F.B | F.C");
    }
}
