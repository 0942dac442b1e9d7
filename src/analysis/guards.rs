//! Ambiguity and duplicate-bit guards
//!
//! Both guards run before anything in an expression is rewritten. A guard
//! hit leaves the whole expression untouched.

use super::oracle::{OracleAdapter, TypeHandle};
use crate::syntax::tree::{BinaryOp, ExprKind, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Clear,
    /// The subject shows up more than once in one decomposable slot
    RepeatedSubject { name: String, count: usize },
    /// An identifier that is neither the subject nor provably benign
    ForeignIdentifier { name: String },
}

impl GuardVerdict {
    pub fn is_clear(&self) -> bool {
        matches!(self, GuardVerdict::Clear)
    }
}

/// An OR/ADD chain whose constant operands light the same bit twice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateBits {
    pub chain: NodeId,
    pub bits: i64,
}

/// Check the identifiers of `expr` against the subject
pub fn check_identifiers(adapter: &OracleAdapter<'_>, expr: NodeId, subject: Option<&str>) -> GuardVerdict {
    let tree = adapter.tree();
    let identifiers: Vec<NodeId> = tree
        .descendants_and_self(expr)
        .into_iter()
        .filter(|id| matches!(tree.kind(*id), ExprKind::Identifier(_)))
        .collect();

    if let Some(subject) = subject {
        let occurrences: Vec<NodeId> = identifiers
            .iter()
            .copied()
            .filter(|id| tree.identifier_name(*id) == Some(subject))
            .collect();
        if occurrences.len() > 1 {
            let mut slots: Vec<NodeId> = occurrences.iter().map(|id| logical_slot(adapter, *id, expr)).collect();
            slots.sort();
            if slots.windows(2).any(|w| w[0] == w[1]) {
                return GuardVerdict::RepeatedSubject {
                    name: subject.to_string(),
                    count: occurrences.len(),
                };
            }
        }
    }

    for id in identifiers {
        let Some(name) = tree.identifier_name(id) else {
            continue;
        };
        if Some(name) == subject {
            continue;
        }
        if !is_benign(adapter, id, expr, subject) {
            log::debug!("Identifier {} is not the subject and not benign", name);
            return GuardVerdict::ForeignIdentifier {
                name: name.to_string(),
            };
        }
    }

    GuardVerdict::Clear
}

/// The operand of the innermost logical AND/OR that contains `node`, or `expr`
fn logical_slot(adapter: &OracleAdapter<'_>, node: NodeId, expr: NodeId) -> NodeId {
    let tree = adapter.tree();
    let mut child = node;
    for ancestor in tree.ancestors_within(node, expr) {
        if let Some((op, _, _)) = tree.binary(ancestor) {
            if op.is_logical() {
                return child;
            }
        }
        child = ancestor;
    }
    expr
}

fn is_benign(adapter: &OracleAdapter<'_>, id: NodeId, expr: NodeId, subject: Option<&str>) -> bool {
    let tree = adapter.tree();

    // Qualified access chain: through the subject, or a constant such as `Flags.A`
    let mut chain = id;
    while let Some(parent) = tree.parent(chain) {
        if !matches!(tree.kind(parent), ExprKind::MemberAccess { .. }) || !tree.contains(expr, parent) {
            break;
        }
        chain = parent;
    }
    if chain != id {
        let through_subject = subject.map_or(false, |s| {
            tree.descendants_and_self(chain)
                .into_iter()
                .any(|n| tree.identifier_name(n) == Some(s))
        });
        if through_subject || adapter.constant_of(chain).is_some() {
            return true;
        }
    }

    // Anything inside an allow-listed conversion call
    let nearest_call = tree
        .ancestors_within(id, expr)
        .into_iter()
        .find(|a| matches!(tree.kind(*a), ExprKind::Invocation { .. }));
    if let Some(call) = nearest_call {
        if adapter.is_allowed_conversion_call(call) {
            return true;
        }
    }

    adapter.static_type_of(id) == TypeHandle::StaticContainer
}

/// First OR/ADD chain in `expr` with overlapping constant operands
pub fn find_duplicate_bits(adapter: &OracleAdapter<'_>, expr: NodeId) -> Option<DuplicateBits> {
    let tree = adapter.tree();
    for node in tree.descendants_and_self(expr) {
        if !is_chain_op(tree.binary(node).map(|(op, _, _)| op)) {
            continue;
        }
        // only chain heads
        if node != expr && is_chain_op(tree.parent(node).and_then(|p| tree.binary(p)).map(|(op, _, _)| op)) {
            continue;
        }

        let mut operands = Vec::new();
        flatten_chain(adapter, node, &mut operands);
        let mut seen = 0i64;
        for operand in operands {
            let Some(value) = adapter.constant_of(operand) else {
                continue;
            };
            let overlap = seen & value;
            if overlap != 0 {
                return Some(DuplicateBits {
                    chain: node,
                    bits: overlap,
                });
            }
            seen |= value;
        }
    }
    None
}

fn is_chain_op(op: Option<BinaryOp>) -> bool {
    matches!(op, Some(BinaryOp::BitOr) | Some(BinaryOp::Add))
}

fn flatten_chain(adapter: &OracleAdapter<'_>, node: NodeId, operands: &mut Vec<NodeId>) {
    let inner = adapter.unwrap_parens(node);
    match adapter.tree().binary(inner) {
        Some((op, left, right)) if is_chain_op(Some(op)) => {
            flatten_chain(adapter, left, operands);
            flatten_chain(adapter, right, operands);
        }
        _ => operands.push(inner),
    }
}
