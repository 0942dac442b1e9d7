//! Per-run state: change ledger, counters and diagnostics

use crate::syntax::tree::{NodeId, SyntaxTree};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Local, recoverable failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    /// A set bit of a target integer has no entry
    UnresolvedBits,
    /// Repeated subject or foreign identifiers in an expression
    AmbiguousExpression,
    /// Two constant operands of an OR/ADD chain light the same bit
    DuplicateBitContribution,
    /// A node overlapping an already rewritten node was claimed again
    DoubleRewriteConflict,
    /// The mutation sink refused an edit
    SinkRejected,
    /// Informational findings about the flag set or the inputs
    Advisory,
    /// A document could not be processed
    DocumentSkipped,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::AmbiguousExpression
            | DiagnosticKind::DuplicateBitContribution
            | DiagnosticKind::Advisory => Severity::Warning,
            DiagnosticKind::UnresolvedBits
            | DiagnosticKind::DoubleRewriteConflict
            | DiagnosticKind::SinkRejected
            | DiagnosticKind::DocumentSkipped => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::UnresolvedBits => "unresolved-bits",
            DiagnosticKind::AmbiguousExpression => "ambiguous-expression",
            DiagnosticKind::DuplicateBitContribution => "duplicate-bit-contribution",
            DiagnosticKind::DoubleRewriteConflict => "double-rewrite-conflict",
            DiagnosticKind::SinkRejected => "sink-rejected",
            DiagnosticKind::Advisory => "advisory",
            DiagnosticKind::DocumentSkipped => "document-skipped",
        };
        f.write_str(name)
    }
}

/// Source position attached to a diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub document: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        };
        match &self.location {
            Some(loc) => write!(
                f,
                "{} [{}] {}:{}:{}: {}",
                severity, self.kind, loc.document, loc.line, loc.column, self.message
            ),
            None => write!(f, "{} [{}]: {}", severity, self.kind, self.message),
        }
    }
}

/// Identity of a node across all documents of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub document: usize,
    pub node: NodeId,
}

/// Nodes already rewritten in the current run
///
/// Besides the rewritten nodes themselves the ledger keeps every ancestor of
/// a rewritten node, so an overlap check is one walk up from the queried node.
#[derive(Debug, Default)]
pub struct ChangeLedger {
    rewritten: HashSet<NodeKey>,
    enclosing: HashSet<NodeKey>,
}

impl ChangeLedger {
    /// Record `key`; false when it was already recorded
    pub fn record(&mut self, key: NodeKey, tree: &SyntaxTree) -> bool {
        if !self.rewritten.insert(key) {
            return false;
        }
        for ancestor in tree.ancestors(key.node) {
            let enclosing = NodeKey {
                document: key.document,
                node: ancestor,
            };
            if !self.enclosing.insert(enclosing) {
                break;
            }
        }
        true
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.rewritten.contains(key)
    }

    /// True when `node`, one of its ancestors or one of its descendants was rewritten
    pub fn overlaps(&self, document: usize, tree: &SyntaxTree, node: NodeId) -> bool {
        let key = |node| NodeKey { document, node };
        self.enclosing.contains(&key(node))
            || self.rewritten.contains(&key(node))
            || tree.ancestors(node).any(|a| self.rewritten.contains(&key(a)))
    }

    pub fn len(&self) -> usize {
        self.rewritten.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewritten.is_empty()
    }

    pub fn clear(&mut self) {
        self.rewritten.clear();
        self.enclosing.clear();
    }
}

/// Mutable state of one conversion run
#[derive(Debug, Default)]
pub struct RunContext {
    pub ledger: ChangeLedger,
    replaced: usize,
    warnings: usize,
    errors: usize,
    diagnostics: Vec<Diagnostic>,
    documents: Vec<String>,
    current_document: usize,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all state from a previous run
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Register a document and make it current; returns its index
    pub fn begin_document(&mut self, name: impl Into<String>) -> usize {
        self.documents.push(name.into());
        self.current_document = self.documents.len() - 1;
        self.current_document
    }

    pub fn current_document(&self) -> usize {
        self.current_document
    }

    pub fn document_name(&self) -> &str {
        self.documents
            .get(self.current_document)
            .map(String::as_str)
            .unwrap_or("<input>")
    }

    pub fn key(&self, node: NodeId) -> NodeKey {
        NodeKey {
            document: self.current_document,
            node,
        }
    }

    /// Location of a node in the current document
    pub fn locate(&self, tree: &SyntaxTree, node: NodeId) -> Location {
        let (line, column) = tree.position(node);
        Location {
            document: self.document_name().to_string(),
            line,
            column,
        }
    }

    pub fn is_rewritten(&self, tree: &SyntaxTree, node: NodeId) -> bool {
        self.ledger.overlaps(self.current_document, tree, node)
    }

    pub fn record_rewrite(&mut self, tree: &SyntaxTree, node: NodeId) {
        let key = self.key(node);
        self.ledger.record(key, tree);
        self.replaced += 1;
    }

    /// Record a diagnostic; severity follows the kind
    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>, location: Option<Location>) {
        let diagnostic = Diagnostic {
            severity: kind.severity(),
            kind,
            message: message.into(),
            location,
        };
        match diagnostic.severity {
            Severity::Warning => {
                log::warn!("{}", diagnostic);
                self.warnings += 1;
            }
            Severity::Error => {
                log::error!("{}", diagnostic);
                self.errors += 1;
            }
        }
        self.diagnostics.push(diagnostic);
    }

    /// Report against a node of the current document
    pub fn report_at(&mut self, kind: DiagnosticKind, message: impl Into<String>, tree: &SyntaxTree, node: NodeId) {
        let location = self.locate(tree, node);
        self.report(kind, message, Some(location));
    }

    pub fn replaced(&self) -> usize {
        self.replaced
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_expression;

    #[test]
    fn test_counters_follow_severity() {
        let mut ctx = RunContext::new();
        ctx.report(DiagnosticKind::AmbiguousExpression, "a", None);
        ctx.report(DiagnosticKind::UnresolvedBits, "b", None);
        ctx.report(DiagnosticKind::DuplicateBitContribution, "c", None);
        assert_eq!(ctx.warnings(), 2);
        assert_eq!(ctx.errors(), 1);
        assert_eq!(ctx.diagnostics().len(), 3);

        ctx.reset();
        assert_eq!(ctx.warnings(), 0);
        assert!(ctx.diagnostics().is_empty());
    }

    #[test]
    fn test_ledger_overlap_is_structural_containment() {
        let (tree, root) = parse_expression("x | (2 + 4)").unwrap();
        let (_, left, right) = tree.binary(root).unwrap();
        let mut ctx = RunContext::new();
        ctx.begin_document("a.cs");
        ctx.record_rewrite(&tree, right);

        assert!(ctx.is_rewritten(&tree, right));
        assert!(ctx.is_rewritten(&tree, root));
        assert!(!ctx.is_rewritten(&tree, left));
        let inner = tree.children(right)[0];
        assert!(ctx.is_rewritten(&tree, inner));

        // Same node id in another document is a different node
        ctx.begin_document("b.cs");
        assert!(!ctx.is_rewritten(&tree, right));
    }
}
