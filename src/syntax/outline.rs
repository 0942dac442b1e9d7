//! Declaration and statement outline of a source document
//!
//! Only the structure needed to find flag-typed locations is modelled:
//! namespaces, types, enums, fields, properties, methods and the statements
//! inside method bodies. Expressions are stored as ids into the document's
//! `SyntaxTree`.

use super::lexer::Span;
use super::tree::{NodeId, SyntaxTree, TypeRef};

/// A parsed document: expression arena plus top-level items
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub tree: SyntaxTree,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Namespace,
    Type,
}

/// One enclosing namespace or type of a declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSegment {
    pub name: String,
    pub kind: ScopeKind,
}

impl ScopeSegment {
    pub fn namespace(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ScopeKind::Namespace,
        }
    }

    pub fn type_scope(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ScopeKind::Type,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Item {
    Namespace(NamespaceDecl),
    Type(TypeDecl),
    Enum(EnumDecl),
    Field(FieldDecl),
    Property(PropertyDecl),
    Method(MethodDecl),
}

#[derive(Debug, Clone)]
pub struct NamespaceDecl {
    /// Dotted name split into segments
    pub name: Vec<String>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Record,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub name: String,
    pub is_static: bool,
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub name_span: Span,
    /// Attribute names as written, e.g. `Flags`, `System.FlagsAttribute`
    pub attributes: Vec<String>,
    pub members: Vec<EnumMember>,
    pub span: Span,
}

impl EnumDecl {
    pub fn has_flags_attribute(&self) -> bool {
        self.attributes.iter().any(|a| {
            let last = a.rsplit('.').next().unwrap_or(a);
            last == "Flags" || last == "FlagsAttribute"
        })
    }
}

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<NodeId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Declarator {
    pub name: String,
    pub span: Span,
    pub initializer: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub ty: TypeRef,
    pub is_static: bool,
    pub is_const: bool,
    pub declarators: Vec<Declarator>,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub ty: TypeRef,
    pub name: String,
    pub is_static: bool,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub ty: TypeRef,
    pub name: String,
    pub default: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    /// `None` for constructors and destructors
    pub return_type: Option<TypeRef>,
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum SwitchLabel {
    Case(NodeId),
    Default,
}

#[derive(Debug, Clone)]
pub struct SwitchSection {
    pub labels: Vec<SwitchLabel>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Vec<Stmt>),
    Local {
        ty: TypeRef,
        declarators: Vec<Declarator>,
    },
    Expr(NodeId),
    If {
        condition: NodeId,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: NodeId,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        condition: NodeId,
    },
    For {
        init: Vec<Stmt>,
        condition: Option<NodeId>,
        step: Vec<NodeId>,
        body: Box<Stmt>,
    },
    Foreach {
        ty: TypeRef,
        name: String,
        iterable: NodeId,
        body: Box<Stmt>,
    },
    Switch {
        subject: NodeId,
        sections: Vec<SwitchSection>,
    },
    Return(Option<NodeId>),
    Throw(Option<NodeId>),
    /// `using`, `lock`, `fixed` and friends: a header expression guarding a body
    Guarded {
        header: Option<NodeId>,
        body: Box<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<Vec<Stmt>>,
    },
    /// break, continue, goto, empty statement and anything skipped by recovery
    Other,
}

impl SourceFile {
    /// Every enum declaration in source order, with its enclosing scopes
    pub fn enums(&self) -> Vec<(Vec<ScopeSegment>, &EnumDecl)> {
        let mut found = Vec::new();
        collect_enums(&self.items, &mut Vec::new(), &mut found);
        found
    }
}

fn collect_enums<'a>(
    items: &'a [Item],
    scope: &mut Vec<ScopeSegment>,
    found: &mut Vec<(Vec<ScopeSegment>, &'a EnumDecl)>,
) {
    for item in items {
        match item {
            Item::Namespace(ns) => {
                let depth = scope.len();
                scope.extend(ns.name.iter().map(ScopeSegment::namespace));
                collect_enums(&ns.items, scope, found);
                scope.truncate(depth);
            }
            Item::Type(ty) => {
                scope.push(ScopeSegment::type_scope(&ty.name));
                collect_enums(&ty.items, scope, found);
                scope.pop();
            }
            Item::Enum(decl) => found.push((scope.clone(), decl)),
            _ => {}
        }
    }
}

/// Runtime metadata name, e.g. `Ns.Outer+Inner+Flags`
pub fn metadata_name(scope: &[ScopeSegment], name: &str) -> String {
    let mut result = String::new();
    let mut previous: Option<ScopeKind> = None;
    for segment in scope {
        if let Some(kind) = previous {
            result.push(if kind == ScopeKind::Type { '+' } else { '.' });
        }
        result.push_str(&segment.name);
        previous = Some(segment.kind);
    }
    match previous {
        Some(ScopeKind::Type) => result.push('+'),
        Some(ScopeKind::Namespace) => result.push('.'),
        None => {}
    }
    result.push_str(name);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_name_uses_plus_for_nested_types() {
        let scope = vec![
            ScopeSegment::namespace("App"),
            ScopeSegment::namespace("Model"),
            ScopeSegment::type_scope("Outer"),
            ScopeSegment::type_scope("Inner"),
        ];
        assert_eq!(metadata_name(&scope, "Flags"), "App.Model.Outer+Inner+Flags");
        assert_eq!(metadata_name(&[], "Flags"), "Flags");
    }
}
