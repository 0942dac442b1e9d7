//! Candidate location
//!
//! Finds the value-producing places in a parsed document where an integer
//! may stand for the flag set: initializers and default values of flag-typed
//! symbols, assignments to them, conditions and switches that test them,
//! return values of flag-returning methods and call arguments.

pub mod symbols;
mod walker;

pub use symbols::{MethodSignature, SymbolTable};

use crate::analysis::semantic::SemanticModel;
use crate::config::ConvertOptions;
use crate::flags::FlagSet;
use crate::rewrite::context::RunContext;
use crate::syntax::tree::{NodeId, SyntaxTree};
use crate::syntax::SourceFile;
use serde::Serialize;
use std::collections::HashSet;
use walker::Walker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CandidateKind {
    Declaration,
    Parameter,
    Assignment,
    Condition,
    SwitchSubject,
    CaseLabel,
    Return,
    Argument,
}

impl CandidateKind {
    /// Whether a multi-entry rendering at the root may get its own parentheses
    pub fn allows_grouping_parens(self) -> bool {
        matches!(
            self,
            CandidateKind::Condition | CandidateKind::SwitchSubject | CandidateKind::CaseLabel
        )
    }
}

/// One expression to classify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub root: NodeId,
    /// The flag-typed symbol the expression is about
    pub subject: Option<String>,
}

impl Candidate {
    pub fn allow_grouping_parens(&self) -> bool {
        self.kind.allows_grouping_parens()
    }
}

/// Candidates of one document plus the identifier bindings made while finding them
#[derive(Debug, Default)]
pub struct Located {
    pub candidates: Vec<Candidate>,
    pub model: SemanticModel,
}

pub struct Locator<'a> {
    flag_set: &'a FlagSet,
    options: &'a ConvertOptions,
    symbols: &'a SymbolTable,
}

impl<'a> Locator<'a> {
    pub fn new(flag_set: &'a FlagSet, options: &'a ConvertOptions, symbols: &'a SymbolTable) -> Self {
        Self {
            flag_set,
            options,
            symbols,
        }
    }

    pub fn locate(&self, ctx: &mut RunContext, file: &SourceFile) -> Located {
        let mut walker = Walker::new(self.flag_set, self.options, self.symbols, &file.tree, ctx);
        walker.walk_items(&file.items);
        let (candidates, model) = walker.finish();

        let candidates = dedupe(&file.tree, candidates);
        log::debug!("Located {} candidates", candidates.len());
        Located { candidates, model }
    }
}

/// Drop repeated `(root, subject)` pairs and candidates nested inside another candidate
fn dedupe(tree: &SyntaxTree, candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let unique: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| seen.insert((c.root, c.subject.clone())))
        .collect();

    unique
        .iter()
        .filter(|c| {
            !unique
                .iter()
                .any(|outer| outer.root != c.root && tree.contains(outer.root, c.root))
        })
        .cloned()
        .collect()
}
