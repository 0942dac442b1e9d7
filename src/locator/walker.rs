//! Statement walker: binds identifiers and collects candidates

use super::symbols::SymbolTable;
use super::{Candidate, CandidateKind};
use crate::analysis::constant_folding::NameResolver;
use crate::analysis::oracle::{classify_type, ConstantOracle, OracleAdapter, SemanticOracle, TypeHandle};
use crate::analysis::semantic::SemanticModel;
use crate::config::ConvertOptions;
use crate::flags::FlagSet;
use crate::rewrite::context::{DiagnosticKind, RunContext};
use crate::syntax::outline::{Item, MethodDecl, SwitchLabel, SwitchSection};
use crate::syntax::tree::{BinaryOp, ExprKind, NodeId, SyntaxTree, TypeRef};
use crate::syntax::Stmt;
use std::collections::HashMap;

pub(super) struct Walker<'a> {
    flag_set: &'a FlagSet,
    options: &'a ConvertOptions,
    symbols: &'a SymbolTable,
    tree: &'a SyntaxTree,
    ctx: &'a mut RunContext,
    scopes: Vec<HashMap<String, TypeHandle>>,
    model: SemanticModel,
    candidates: Vec<Candidate>,
    returns_flag_set: bool,
}

impl<'a> Walker<'a> {
    pub(super) fn new(
        flag_set: &'a FlagSet,
        options: &'a ConvertOptions,
        symbols: &'a SymbolTable,
        tree: &'a SyntaxTree,
        ctx: &'a mut RunContext,
    ) -> Self {
        Self {
            flag_set,
            options,
            symbols,
            tree,
            ctx,
            scopes: Vec::new(),
            model: SemanticModel::new(),
            candidates: Vec::new(),
            returns_flag_set: false,
        }
    }

    pub(super) fn finish(self) -> (Vec<Candidate>, SemanticModel) {
        (self.candidates, self.model)
    }

    pub(super) fn walk_items(&mut self, items: &[Item]) {
        for item in items {
            match item {
                Item::Namespace(ns) => self.walk_items(&ns.items),
                Item::Type(ty) => self.walk_items(&ty.items),
                Item::Field(field) => {
                    let handle = classify_type(&field.ty, self.flag_set);
                    for declarator in &field.declarators {
                        if let Some(init) = declarator.initializer {
                            self.declaration(init, &declarator.name, handle);
                        }
                    }
                }
                Item::Method(method) => self.walk_method(method),
                // enum member values and property bodies are left alone
                Item::Enum(_) | Item::Property(_) => {}
            }
        }
    }

    fn walk_method(&mut self, method: &MethodDecl) {
        log::debug!("Walking method {}", method.name);
        self.scopes.push(HashMap::new());
        for param in &method.params {
            let handle = classify_type(&param.ty, self.flag_set);
            self.declare(&param.name, handle);
            if let Some(default) = param.default {
                self.bind_expr(default);
                if handle == TypeHandle::FlagSet {
                    self.push(CandidateKind::Parameter, default, Some(param.name.clone()));
                }
            }
        }

        self.returns_flag_set = method
            .return_type
            .as_ref()
            .map_or(false, |ty| classify_type(ty, self.flag_set) == TypeHandle::FlagSet);
        if let Some(body) = &method.body {
            self.walk_stmts(body);
        }
        self.returns_flag_set = false;
        self.scopes.pop();
    }

    fn walk_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.walk_stmt(stmt);
        }
    }

    fn walk_scoped(&mut self, stmt: &Stmt) {
        self.scopes.push(HashMap::new());
        self.walk_stmt(stmt);
        self.scopes.pop();
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(stmts) => {
                self.scopes.push(HashMap::new());
                self.walk_stmts(stmts);
                self.scopes.pop();
            }
            Stmt::Local { ty, declarators } => {
                for declarator in declarators {
                    let handle = match declarator.initializer {
                        Some(init) if is_var(ty) => {
                            self.bind_expr(init);
                            self.static_type(init)
                        }
                        _ => classify_type(ty, self.flag_set),
                    };
                    if let Some(init) = declarator.initializer {
                        self.declaration(init, &declarator.name, handle);
                    }
                    self.declare(&declarator.name, handle);
                }
            }
            Stmt::Expr(expr) => self.visit_expr(*expr),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.condition(*condition);
                self.walk_scoped(then_branch);
                if let Some(else_branch) = else_branch {
                    self.walk_scoped(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.condition(*condition);
                self.walk_scoped(body);
            }
            Stmt::DoWhile { body, condition } => {
                self.walk_scoped(body);
                self.condition(*condition);
            }
            Stmt::For {
                init,
                condition,
                step,
                body,
            } => {
                self.scopes.push(HashMap::new());
                self.walk_stmts(init);
                if let Some(condition) = condition {
                    self.condition(*condition);
                }
                for expr in step {
                    self.visit_expr(*expr);
                }
                self.walk_scoped(body);
                self.scopes.pop();
            }
            Stmt::Foreach { ty, name, iterable, body } => {
                self.visit_expr(*iterable);
                self.scopes.push(HashMap::new());
                let handle = if is_var(ty) {
                    TypeHandle::Unknown
                } else {
                    classify_type(ty, self.flag_set)
                };
                self.declare(name, handle);
                self.walk_stmt(body);
                self.scopes.pop();
            }
            Stmt::Switch { subject, sections } => self.switch(*subject, sections),
            Stmt::Return(Some(expr)) => {
                self.visit_expr(*expr);
                if self.returns_flag_set && !self.is_opaque_call(*expr) {
                    self.push(CandidateKind::Return, *expr, None);
                }
            }
            Stmt::Throw(Some(expr)) => self.visit_expr(*expr),
            Stmt::Guarded { header, body } => {
                self.scopes.push(HashMap::new());
                if let Some(header) = header {
                    self.visit_expr(*header);
                }
                self.walk_stmt(body);
                self.scopes.pop();
            }
            Stmt::Try { body, handlers } => {
                self.scopes.push(HashMap::new());
                self.walk_stmts(body);
                self.scopes.pop();
                for handler in handlers {
                    self.scopes.push(HashMap::new());
                    self.walk_stmts(handler);
                    self.scopes.pop();
                }
            }
            Stmt::Return(None) | Stmt::Throw(None) | Stmt::Other => {}
        }
    }

    /// Initializer of a field or local
    fn declaration(&mut self, init: NodeId, name: &str, handle: TypeHandle) {
        self.bind_expr(init);
        if handle == TypeHandle::FlagSet && !self.is_opaque_call(init) {
            self.push(CandidateKind::Declaration, init, Some(name.to_string()));
        }
        self.scan(init);
    }

    fn visit_expr(&mut self, expr: NodeId) {
        self.bind_expr(expr);
        self.scan(expr);
    }

    /// Assignments and call arguments anywhere inside `expr`
    fn scan(&mut self, expr: NodeId) {
        let tree = self.tree;
        for node in tree.descendants_and_self(expr) {
            match tree.kind(node) {
                ExprKind::Assignment { target, value, .. } => {
                    if self.static_type(*target) == TypeHandle::FlagSet && !self.is_opaque_call(*value) {
                        let subject = tree.callee_name(*target).map(str::to_string);
                        self.push(CandidateKind::Assignment, *value, subject);
                    }
                }
                ExprKind::Invocation { callee, args } => self.arguments(node, *callee, args),
                _ => {}
            }
        }
    }

    fn arguments(&mut self, call: NodeId, callee: NodeId, args: &[NodeId]) {
        if self.is_conversion_call(call) {
            return;
        }
        let tree = self.tree;
        let name = tree.callee_name(callee);

        if let Some(index) = name.and_then(|n| self.options.bit_argument_index(n)) {
            if let Some(arg) = args.get(index) {
                log::debug!("Bit argument {} of {}", index, tree.text(call));
                self.push(CandidateKind::Argument, *arg, None);
            }
            return;
        }

        for (index, arg) in args.iter().enumerate() {
            if self.is_opaque_call(*arg) {
                continue;
            }
            let references = self.references(*arg);
            let flagged = name.map_or(false, |n| self.symbols.flag_parameter(n, index))
                || self.static_type(*arg) == TypeHandle::FlagSet
                || !references.is_empty();
            if !flagged {
                continue;
            }

            let mut names: Vec<&str> = references
                .iter()
                .filter_map(|r| tree.identifier_name(*r))
                .collect();
            names.dedup();
            let subject = match names.as_slice() {
                [single] => Some(single.to_string()),
                _ => None,
            };
            self.push(CandidateKind::Argument, *arg, subject);
        }
    }

    /// Each flag-typed reference in a condition selects its outermost non-logical binary
    fn condition(&mut self, condition: NodeId) {
        self.visit_expr(condition);
        let tree = self.tree;

        for (name, references) in self.references_by_name(condition) {
            let roots: Vec<NodeId> = references.iter().filter_map(|r| highest_binary(tree, *r)).collect();
            let mut distinct = roots.clone();
            distinct.sort();
            distinct.dedup();
            if distinct.len() != roots.len() {
                self.ctx.report_at(
                    DiagnosticKind::AmbiguousExpression,
                    format!(
                        "`{}` is used multiple times in `{}` without && or || between the uses; condition left unchanged",
                        name,
                        tree.text(condition)
                    ),
                    tree,
                    condition,
                );
                continue;
            }

            for root in roots {
                let has_logical_and = tree.descendants_and_self(root).into_iter().any(|n| {
                    matches!(tree.kind(n), ExprKind::Binary { op, .. } if *op == BinaryOp::LogicalAnd)
                });
                if has_logical_and {
                    self.ctx.report_at(
                        DiagnosticKind::AmbiguousExpression,
                        format!("Perhaps incorrect parentheses in `{}`; left unchanged", tree.text(root)),
                        tree,
                        root,
                    );
                    break;
                }
                self.push(CandidateKind::Condition, root, Some(name.clone()));
            }
        }
    }

    fn switch(&mut self, subject: NodeId, sections: &[SwitchSection]) {
        self.visit_expr(subject);
        let tree = self.tree;

        let references = self.references(subject);
        for reference in &references {
            if let Some(root) = highest_binary(tree, *reference) {
                let name = tree.identifier_name(*reference).map(str::to_string);
                self.push(CandidateKind::SwitchSubject, root, name);
            }
        }
        let subject_name = references
            .first()
            .and_then(|r| tree.identifier_name(*r))
            .map(str::to_string);
        let is_flag_switch = !references.is_empty() || self.static_type(subject) == TypeHandle::FlagSet;

        for section in sections {
            for label in &section.labels {
                if let SwitchLabel::Case(expr) = label {
                    self.bind_expr(*expr);
                    if is_flag_switch {
                        self.push(CandidateKind::CaseLabel, *expr, subject_name.clone());
                    }
                }
            }
            self.scopes.push(HashMap::new());
            self.walk_stmts(&section.body);
            self.scopes.pop();
        }
    }

    /// Record static types of the identifiers in `expr`
    fn bind_expr(&mut self, expr: NodeId) {
        let tree = self.tree;
        for id in tree.descendants_and_self(expr) {
            let Some(name) = tree.identifier_name(id) else {
                continue;
            };
            let parent = tree.parent(id);
            let is_callee = parent.map_or(false, |p| {
                matches!(tree.kind(p), ExprKind::Invocation { callee, .. } if *callee == id)
            });

            let handle = if tree.is_member_name(id) {
                let Some(access) = parent else {
                    continue;
                };
                let access_is_callee = tree.parent(access).map_or(false, |p| {
                    matches!(tree.kind(p), ExprKind::Invocation { callee, .. } if *callee == access)
                });
                if access_is_callee {
                    self.method_handle(name)
                } else if self.is_entry_access(access) {
                    None
                } else {
                    self.symbols.global(name)
                }
            } else if is_callee {
                self.method_handle(name)
            } else {
                self.lookup(name)
            };

            if let Some(handle) = handle {
                self.model.bind(id, handle);
            }
        }
    }

    fn method_handle(&self, name: &str) -> Option<TypeHandle> {
        self.symbols
            .returns_flag_set(name)
            .then_some(TypeHandle::FlagSet)
    }

    fn lookup(&self, name: &str) -> Option<TypeHandle> {
        if let Some(handle) = self.scopes.iter().rev().find_map(|scope| scope.get(name)) {
            return Some(*handle);
        }
        if let Some(handle) = self.symbols.global(name) {
            return Some(handle);
        }
        if self.symbols.is_static_type(name) || self.options.is_static_container(name) {
            return Some(TypeHandle::StaticContainer);
        }
        None
    }

    fn declare(&mut self, name: &str, handle: TypeHandle) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), handle);
        }
    }

    fn push(&mut self, kind: CandidateKind, root: NodeId, subject: Option<String>) {
        log::debug!("{:?} candidate `{}` (subject: {:?})", kind, self.tree.text(root), subject);
        self.candidates.push(Candidate { kind, root, subject });
    }

    /// Flag-typed identifier references in `expr`, in source order
    fn references(&self, expr: NodeId) -> Vec<NodeId> {
        self.tree
            .descendants_and_self(expr)
            .into_iter()
            .filter(|id| self.model.is_flag_typed(*id))
            .collect()
    }

    fn references_by_name(&self, expr: NodeId) -> Vec<(String, Vec<NodeId>)> {
        let mut grouped: Vec<(String, Vec<NodeId>)> = Vec::new();
        for reference in self.references(expr) {
            let Some(name) = self.tree.identifier_name(reference) else {
                continue;
            };
            match grouped.iter_mut().find(|(n, _)| n == name) {
                Some((_, nodes)) => nodes.push(reference),
                None => grouped.push((name.to_string(), vec![reference])),
            }
        }
        grouped
    }

    fn static_type(&self, node: NodeId) -> TypeHandle {
        SemanticOracle::new(self.flag_set, &self.model).static_type_of(self.tree, node)
    }

    fn is_entry_access(&self, access: NodeId) -> bool {
        let oracle = SemanticOracle::new(self.flag_set, &self.model);
        self.tree
            .dotted_path(access)
            .map_or(false, |path| oracle.resolve_path(&path).is_some())
    }

    fn is_conversion_call(&self, node: NodeId) -> bool {
        let oracle = SemanticOracle::new(self.flag_set, &self.model);
        OracleAdapter::new(self.tree, &oracle, &self.options.conversion_calls).is_allowed_conversion_call(node)
    }

    /// A call other than an allowed conversion, after casts and parentheses
    fn is_opaque_call(&self, node: NodeId) -> bool {
        let oracle = SemanticOracle::new(self.flag_set, &self.model);
        let adapter = OracleAdapter::new(self.tree, &oracle, &self.options.conversion_calls);
        let inner = adapter.unwrap_value(node);
        matches!(self.tree.kind(inner), ExprKind::Invocation { .. }) && !adapter.is_allowed_conversion_call(inner)
    }
}

fn is_var(ty: &TypeRef) -> bool {
    ty.text == "var"
}

/// Outermost binary ancestor of `node` that is not `&&` or `||`
fn highest_binary(tree: &SyntaxTree, node: NodeId) -> Option<NodeId> {
    tree.ancestors(node)
        .filter(|a| tree.binary(*a).map_or(false, |(op, _, _)| !op.is_logical()))
        .last()
}
