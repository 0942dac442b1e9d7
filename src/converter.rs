//! Conversion runs
//!
//! A run parses the flag declaration, finds the same enum in the input
//! documents, locates candidate expressions in every document and rewrites
//! them. Fatal problems (bad declaration, enum not found or different) abort
//! the run before any document is touched; everything else is a diagnostic.

use crate::analysis::classifier::{Classifier, Outcome};
use crate::analysis::oracle::{OracleAdapter, SemanticOracle, TypeHandle};
use crate::analysis::semantic::SemanticModel;
use crate::config::ConvertOptions;
use crate::error::{Error, Result};
use crate::flags::{FlagSet, FlagSetIdentity};
use crate::locator::{Locator, SymbolTable};
use crate::rewrite::context::{Diagnostic, DiagnosticKind, Location, RunContext};
use crate::rewrite::engine::RewriteEngine;
use crate::rewrite::sink::TextEditSink;
use crate::syntax::outline::metadata_name;
use crate::syntax::{line_col, parse_expression, parse_source, SourceFile};
use serde::Serialize;
use std::path::Path;

/// One input document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub name: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Ok(Self::new(path.display().to_string(), text))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RewrittenDocument {
    pub name: String,
    #[serde(skip)]
    pub original: String,
    pub rewritten: String,
    pub edits: usize,
}

impl RewrittenDocument {
    pub fn is_changed(&self) -> bool {
        self.original != self.rewritten
    }
}

/// Counters, diagnostics and output of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub flag_set: String,
    pub replaced: usize,
    pub warnings: usize,
    pub errors: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub documents: Vec<RewrittenDocument>,
}

pub struct Converter {
    options: ConvertOptions,
    ctx: RunContext,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            ctx: RunContext::new(),
        }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert `documents` against the enum declared in `flag_declaration`
    pub fn run(&mut self, flag_declaration: &str, documents: &[SourceDocument]) -> Result<RunSummary> {
        self.ctx.reset();
        let declared = FlagSet::build(flag_declaration)?;
        log::info!("Parsed flag set {} ({} entries)", declared.metadata_name(), declared.len());

        let parsed: Vec<std::result::Result<SourceFile, Error>> =
            documents.iter().map(|doc| parse_source(&doc.text)).collect();
        let files: Vec<(&SourceDocument, &SourceFile)> = documents
            .iter()
            .zip(parsed.iter())
            .filter_map(|(doc, file)| file.as_ref().ok().map(|f| (doc, f)))
            .collect();

        let flag_set = self.resolve_identity(&declared, &files)?;
        let symbols = SymbolTable::collect(files.iter().map(|(_, f)| *f), &flag_set);

        let mut rewritten = Vec::with_capacity(documents.len());
        for (doc, file) in documents.iter().zip(parsed.iter()) {
            self.ctx.begin_document(&doc.name);
            let file = match file {
                Ok(file) => file,
                Err(err) => {
                    let (line, column) = match err {
                        Error::Parse { line, column, .. } => (*line, *column),
                        _ => (1, 1),
                    };
                    self.ctx.report(
                        DiagnosticKind::DocumentSkipped,
                        format!("Could not parse document: {}", err),
                        Some(Location {
                            document: doc.name.clone(),
                            line,
                            column,
                        }),
                    );
                    rewritten.push(RewrittenDocument {
                        name: doc.name.clone(),
                        original: doc.text.clone(),
                        rewritten: doc.text.clone(),
                        edits: 0,
                    });
                    continue;
                }
            };

            log::info!("Analyzing file {}", doc.name);
            rewritten.push(self.convert_document(&flag_set, &symbols, doc, file)?);
        }

        log::info!("Replaced {} nodes", self.ctx.replaced());
        Ok(RunSummary {
            flag_set: flag_set.metadata_name().to_string(),
            replaced: self.ctx.replaced(),
            warnings: self.ctx.warnings(),
            errors: self.ctx.errors(),
            diagnostics: self.ctx.take_diagnostics(),
            documents: rewritten,
        })
    }

    fn convert_document(
        &mut self,
        flag_set: &FlagSet,
        symbols: &SymbolTable,
        doc: &SourceDocument,
        file: &SourceFile,
    ) -> Result<RewrittenDocument> {
        let located = Locator::new(flag_set, &self.options, symbols).locate(&mut self.ctx, file);

        let oracle = SemanticOracle::new(flag_set, &located.model);
        let adapter = OracleAdapter::new(&file.tree, &oracle, &self.options.conversion_calls);
        let mut sink = TextEditSink::for_document(doc.text.len());
        {
            let engine = RewriteEngine::new(&adapter, flag_set, &mut sink);
            let mut classifier = Classifier::new(&adapter, engine, &self.options.has_flag_method);
            for candidate in &located.candidates {
                let outcome = classifier.analyze(
                    &mut self.ctx,
                    candidate.root,
                    candidate.subject.as_deref(),
                    candidate.allow_grouping_parens(),
                );
                log::debug!("{:?} candidate: {:?}", candidate.kind, outcome);
            }
        }

        Ok(RewrittenDocument {
            name: doc.name.clone(),
            original: doc.text.clone(),
            rewritten: sink.apply(&doc.name, &doc.text)?,
            edits: sink.len(),
        })
    }

    /// Find the declared enum among the inputs and check it matches the declaration
    fn resolve_identity(&mut self, declared: &FlagSet, files: &[(&SourceDocument, &SourceFile)]) -> Result<FlagSet> {
        let mut found = Vec::new();
        for (doc, file) in files {
            for (scope, decl) in file.enums() {
                if decl.name == declared.name() {
                    found.push((*doc, *file, scope, decl));
                }
            }
        }

        let exact = found
            .iter()
            .position(|(_, _, scope, decl)| metadata_name(scope, &decl.name) == declared.metadata_name());
        let index = match exact {
            Some(index) => index,
            None if found.len() == 1 => {
                self.ctx.report(
                    DiagnosticKind::Advisory,
                    "Could not resolve the exact enum position. Maybe an enclosing class or namespace is missing. \
                     Using the only matching enum.",
                    None,
                );
                0
            }
            None => {
                return Err(Error::FlagSetNotFound {
                    name: declared.metadata_name().to_string(),
                })
            }
        };

        let (doc, file, scope, decl) = &found[index];
        let (line, column) = line_col(file.tree.source(), decl.name_span.start);
        let location = format!("{}:{}", doc.name, line);
        let mismatch = || Error::IdentityMismatch {
            name: declared.metadata_name().to_string(),
            location: location.clone(),
        };

        let mut flag_set = FlagSet::from_declaration(&file.tree, decl, scope).map_err(|_| mismatch())?;
        if !declared.compare_entries(&flag_set) {
            return Err(mismatch());
        }
        log::info!("Found flag set {} in {}", flag_set.metadata_name(), doc.name);

        let here = Location {
            document: doc.name.clone(),
            line,
            column,
        };
        if !flag_set.has_flags_attribute() {
            self.ctx.report(
                DiagnosticKind::Advisory,
                "The enum does not have a [Flags] attribute. It is highly recommended to add the attribute.",
                Some(here.clone()),
            );
        }
        if !flag_set.has_zero_entry() {
            self.ctx.report(
                DiagnosticKind::Advisory,
                "The enum does not have an entry with the value 0. It is recommended to add one with a name like \"NONE\".",
                Some(here),
            );
        }

        let qualifier = self
            .options
            .qualifier
            .clone()
            .unwrap_or_else(|| flag_set.type_qualifier());
        flag_set.set_qualifier(qualifier);
        flag_set.set_identity(FlagSetIdentity {
            document: doc.name.clone(),
            metadata_name: flag_set.metadata_name().to_string(),
            line,
        });
        Ok(flag_set)
    }
}

/// Result of rewriting a single expression
#[derive(Debug)]
pub struct ExpressionRewrite {
    pub text: String,
    pub outcome: Outcome,
    pub context: RunContext,
}

/// Classify and rewrite a standalone expression
///
/// Every identifier named `subject` is taken to be of the flag type.
pub fn rewrite_expression(
    flag_set: &FlagSet,
    expression: &str,
    subject: Option<&str>,
    allow_grouping_parens: bool,
    options: &ConvertOptions,
) -> Result<ExpressionRewrite> {
    let (tree, root) = parse_expression(expression)?;
    let mut model = SemanticModel::new();
    if let Some(subject) = subject {
        for id in tree.descendants_and_self(root) {
            if tree.identifier_name(id) == Some(subject) {
                model.bind(id, TypeHandle::FlagSet);
            }
        }
    }

    let oracle = SemanticOracle::new(flag_set, &model);
    let adapter = OracleAdapter::new(&tree, &oracle, &options.conversion_calls);
    let mut ctx = RunContext::new();
    ctx.begin_document("<expression>");
    let mut sink = TextEditSink::for_document(expression.len());
    let outcome = {
        let engine = RewriteEngine::new(&adapter, flag_set, &mut sink);
        let mut classifier = Classifier::new(&adapter, engine, &options.has_flag_method);
        classifier.analyze(&mut ctx, root, subject, allow_grouping_parens)
    };

    Ok(ExpressionRewrite {
        text: sink.apply("<expression>", expression)?,
        outcome,
        context: ctx,
    })
}
