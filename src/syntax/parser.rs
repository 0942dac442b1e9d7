//! Recursive-descent parser producing the declaration outline and the
//! expression arena
//!
//! Expressions use precedence climbing. Members and statements the parser
//! does not model are skipped with brace-aware recovery so that one odd
//! construct never hides the rest of a document.

use super::lexer::{line_col, tokenize, Span, Token, TokenKind};
use super::outline::*;
use super::tree::*;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Keywords that can never name a variable or type in expression position
static RESERVED_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "abstract", "as", "break", "case", "catch", "class", "const", "continue", "default",
        "delegate", "do", "else", "enum", "event", "explicit", "extern", "finally", "fixed", "for",
        "foreach", "goto", "if", "implicit", "in", "interface", "internal", "is", "lock",
        "namespace", "new", "operator", "out", "override", "params", "private", "protected",
        "public", "readonly", "ref", "return", "sealed", "stackalloc", "static", "struct",
        "switch", "throw", "try", "typeof", "sizeof", "unchecked", "checked", "unsafe", "using",
        "virtual", "volatile", "while", "true", "false", "null",
    ]
    .into_iter()
    .collect()
});

const MEMBER_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "readonly", "const", "volatile",
    "abstract", "virtual", "override", "sealed", "extern", "unsafe", "new", "partial", "async",
    "required", "event", "file",
];

const LOCAL_MODIFIERS: &[&str] = &["const", "ref", "readonly", "scoped", "static"];

/// Keywords that may start an operand, used for cast disambiguation
const OPERAND_KEYWORDS: &[&str] = &[
    "this", "base", "new", "default", "typeof", "sizeof", "checked", "unchecked", "true", "false",
    "null",
];

/// Parse a complete source document
pub fn parse_source(source: &str) -> Result<SourceFile> {
    let mut parser = Parser::new(source)?;
    let items = parser.parse_items(false, None);
    Ok(SourceFile {
        tree: parser.tree,
        items,
    })
}

/// Parse a single expression, e.g. `((int)x & 2) > 0`
pub fn parse_expression(source: &str) -> Result<(SyntaxTree, NodeId)> {
    let mut parser = Parser::new(source)?;
    let root = parser.parse_expression()?;
    if !matches!(parser.peek().kind, TokenKind::Eof) {
        return Err(parser.unexpected("end of expression"));
    }
    Ok((parser.tree, root))
}

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    tree: SyntaxTree,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self> {
        Ok(Self {
            source,
            tokens: tokenize(source)?,
            pos: 0,
            tree: SyntaxTree::new(source),
        })
    }

    // ---- token helpers ----

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let index = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.peek().is_punct(punct)
    }

    fn at_word(&self, word: &str) -> bool {
        self.peek().is_word(word)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.at_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn start(&self) -> usize {
        self.peek().span.start
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> Error {
        let (line, column) = line_col(self.source, offset);
        Error::parse(line, column, message)
    }

    fn unexpected(&self, expected: &str) -> Error {
        let token = self.peek();
        let found = if matches!(token.kind, TokenKind::Eof) {
            "end of input".to_string()
        } else {
            format!("'{}'", &self.source[token.span.start..token.span.end])
        };
        self.error_at(token.span.start, format!("expected {}, found {}", expected, found))
    }

    fn expect_punct(&mut self, punct: &str) -> Result<Span> {
        if self.at_punct(punct) {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(&format!("'{}'", punct)))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span)> {
        match &self.peek().kind {
            TokenKind::Ident(word) if !RESERVED_WORDS.contains(word.as_str()) => {
                let word = word.clone();
                let span = self.advance().span;
                Ok((word, span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn is_plain_ident(token: &Token) -> bool {
        matches!(&token.kind, TokenKind::Ident(w) if !RESERVED_WORDS.contains(w.as_str()))
    }

    /// Two `>` tokens written back to back form a right shift
    fn adjacent(&self, ahead: usize) -> bool {
        self.peek_at(ahead).span.end == self.peek_at(ahead + 1).span.start
    }

    /// Skip a bracketed group starting at the current open token
    fn skip_balanced(&mut self) -> Result<()> {
        let (open, close) = match &self.peek().kind {
            TokenKind::Punct("(") => ("(", ")"),
            TokenKind::Punct("[") => ("[", "]"),
            TokenKind::Punct("{") => ("{", "}"),
            _ => return Err(self.unexpected("'(', '[' or '{'")),
        };
        let start = self.start();
        let mut depth = 0usize;
        loop {
            if self.at_eof() {
                return Err(self.error_at(start, format!("unbalanced '{}'", open)));
            }
            let token = self.advance();
            if token.is_punct(open) {
                depth += 1;
            } else if token.is_punct(close) {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
    }

    /// Skip tokens until one of `stops` at nesting depth zero (not consumed)
    fn skip_until(&mut self, stops: &[&str]) {
        let mut depth = 0usize;
        while !self.at_eof() {
            let token = self.peek();
            if depth == 0 && stops.iter().any(|s| token.is_punct(s)) {
                return;
            }
            if token.is_punct("(") || token.is_punct("[") || token.is_punct("{") {
                depth += 1;
            } else if token.is_punct(")") || token.is_punct("]") || token.is_punct("}") {
                if depth == 0 {
                    return;
                }
                depth -= 1;
            }
            self.advance();
        }
    }

    /// Resynchronise after a parse error: stop after a `;` or a closed brace group
    fn recover(&mut self) {
        let mut depth = 0usize;
        loop {
            let token = self.peek();
            if matches!(token.kind, TokenKind::Eof) {
                return;
            }
            if token.is_punct("{") {
                depth += 1;
            } else if token.is_punct("}") {
                if depth == 0 {
                    return;
                }
                depth -= 1;
                self.advance();
                if depth == 0 {
                    return;
                }
                continue;
            } else if token.is_punct(";") && depth == 0 {
                self.advance();
                return;
            }
            self.advance();
        }
    }

    // ---- declarations ----

    fn parse_items(&mut self, in_braces: bool, type_name: Option<&str>) -> Vec<Item> {
        let mut items = Vec::new();
        loop {
            if self.at_eof() || (in_braces && self.at_punct("}")) {
                break;
            }
            let start = self.pos;
            match self.parse_item(type_name) {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
                Err(err) => {
                    log::debug!("Skipping member that could not be parsed: {}", err);
                    self.recover();
                }
            }
            if self.pos == start {
                self.advance();
            }
        }
        items
    }

    fn parse_attributes(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        while self.at_punct("[") {
            self.advance();
            loop {
                if self.at_punct("]") {
                    break;
                }
                let mut name = self.parse_dotted_name()?;
                if self.eat_punct(":") {
                    // attribute target such as `assembly:`
                    name = self.parse_dotted_name()?;
                }
                names.push(name);
                if self.at_punct("(") {
                    self.skip_balanced()?;
                }
                if !self.eat_punct(",") {
                    break;
                }
            }
            self.expect_punct("]")?;
        }
        Ok(names)
    }

    fn parse_dotted_name(&mut self) -> Result<String> {
        let mut name = self.expect_ident()?.0;
        while self.at_punct(".") || self.at_punct("::") {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_ident()?.0);
        }
        Ok(name)
    }

    fn parse_item(&mut self, type_name: Option<&str>) -> Result<Option<Item>> {
        let start = self.start();
        let attributes = self.parse_attributes()?;

        let mut is_static = false;
        let mut is_const = false;
        while let Some(word) = self.peek().ident() {
            if !MEMBER_MODIFIERS.contains(&word) {
                break;
            }
            is_static |= word == "static";
            is_const |= word == "const";
            self.advance();
        }

        if self.eat_word("namespace") {
            let name: Vec<String> = self.parse_dotted_name()?.split('.').map(String::from).collect();
            let items = if self.eat_punct(";") {
                self.parse_items(false, None)
            } else {
                self.expect_punct("{")?;
                let items = self.parse_items(true, None);
                self.expect_punct("}")?;
                items
            };
            return Ok(Some(Item::Namespace(NamespaceDecl { name, items })));
        }

        if self.at_word("using") {
            self.skip_until(&[";"]);
            self.eat_punct(";");
            return Ok(None);
        }

        let type_kind = match self.peek().ident() {
            Some("class") => Some(TypeKind::Class),
            Some("struct") => Some(TypeKind::Struct),
            Some("interface") => Some(TypeKind::Interface),
            Some("record") if Self::is_plain_ident(self.peek_at(1)) || self.peek_at(1).is_word("struct") || self.peek_at(1).is_word("class") => Some(TypeKind::Record),
            _ => None,
        };
        if let Some(kind) = type_kind {
            self.advance();
            if kind == TypeKind::Record && !self.eat_word("struct") {
                self.eat_word("class");
            }
            let (name, _) = self.expect_ident()?;
            self.skip_until(&["{", ";"]);
            let items = if self.eat_punct(";") {
                Vec::new()
            } else {
                self.expect_punct("{")?;
                let items = self.parse_items(true, Some(&name));
                self.expect_punct("}")?;
                self.eat_punct(";");
                items
            };
            return Ok(Some(Item::Type(TypeDecl {
                kind,
                name,
                is_static,
                items,
                span: Span::new(start, self.prev_end()),
            })));
        }

        if self.eat_word("enum") {
            return self.parse_enum(start, attributes).map(|e| Some(Item::Enum(e)));
        }

        if self.at_word("delegate") {
            self.skip_until(&[";"]);
            self.eat_punct(";");
            return Ok(None);
        }

        // Constructor or destructor
        let is_ctor = type_name.map_or(false, |t| self.at_word(t)) && self.peek_at(1).is_punct("(");
        if is_ctor || self.at_punct("~") {
            self.eat_punct("~");
            let (name, _) = self.expect_ident()?;
            return self.parse_method_rest(start, None, name).map(|m| Some(Item::Method(m)));
        }

        let ty = self.parse_type()?;
        if self.at_word("operator") || self.at_word("this") {
            return Err(self.unexpected("member name"));
        }
        let (mut name, mut name_span) = self.expect_ident()?;
        // Explicit interface implementation: `IFoo.Bar`
        while self.at_punct(".") {
            self.advance();
            let (next, span) = self.expect_ident()?;
            name = next;
            name_span = span;
        }
        if self.at_punct("<") {
            self.try_skip_type_arguments();
        }

        if self.at_punct("(") {
            return self
                .parse_method_rest(start, Some(ty), name)
                .map(|m| Some(Item::Method(m)));
        }

        if self.at_punct("{") {
            self.skip_balanced()?;
            if self.eat_punct("=") {
                self.parse_variable_initializer()?;
                self.expect_punct(";")?;
            }
            return Ok(Some(Item::Property(PropertyDecl { ty, name, is_static })));
        }

        if self.eat_punct("=>") {
            self.parse_expression()?;
            self.expect_punct(";")?;
            return Ok(Some(Item::Property(PropertyDecl { ty, name, is_static })));
        }

        let declarators = self.parse_declarators_from(name, name_span)?;
        self.expect_punct(";")?;
        Ok(Some(Item::Field(FieldDecl {
            ty,
            is_static: is_static || is_const,
            is_const,
            declarators,
        })))
    }

    fn parse_enum(&mut self, start: usize, attributes: Vec<String>) -> Result<EnumDecl> {
        let (name, name_span) = self.expect_ident()?;
        if self.eat_punct(":") {
            self.parse_type()?;
        }
        self.expect_punct("{")?;
        let mut members = Vec::new();
        while !self.at_punct("}") {
            self.parse_attributes()?;
            let (member, span) = self.expect_ident()?;
            let value = if self.eat_punct("=") {
                Some(self.parse_expression()?)
            } else {
                None
            };
            members.push(EnumMember {
                name: member,
                value,
                span: Span::new(span.start, self.prev_end()),
            });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        self.eat_punct(";");
        Ok(EnumDecl {
            name,
            name_span,
            attributes,
            members,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn parse_method_rest(&mut self, start: usize, return_type: Option<TypeRef>, name: String) -> Result<MethodDecl> {
        let params = self.parse_parameters()?;
        // Constructor initializer or generic constraints
        if self.at_punct(":") || self.at_word("where") {
            self.skip_until(&["{", "=>", ";"]);
        }
        let is_void = return_type.as_ref().map_or(true, |t| t.text == "void");
        let body = if self.at_punct("{") {
            Some(self.parse_block()?)
        } else if self.eat_punct("=>") {
            let expr = self.parse_expression()?;
            self.expect_punct(";")?;
            Some(vec![if is_void { Stmt::Expr(expr) } else { Stmt::Return(Some(expr)) }])
        } else {
            self.expect_punct(";")?;
            None
        };
        Ok(MethodDecl {
            return_type,
            name,
            params,
            body,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn parse_parameters(&mut self) -> Result<Vec<Parameter>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if self.eat_punct(")") {
            return Ok(params);
        }
        loop {
            self.parse_attributes()?;
            while ["ref", "out", "in", "params", "this", "scoped", "readonly"]
                .iter()
                .any(|m| self.at_word(m))
            {
                self.advance();
            }
            let ty = self.parse_type()?;
            let (name, _) = self.expect_ident()?;
            let default = if self.eat_punct("=") {
                Some(self.parse_expression()?)
            } else {
                None
            };
            params.push(Parameter { ty, name, default });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(params)
    }

    /// Declarators after the first name has already been read
    fn parse_declarators_from(&mut self, name: String, span: Span) -> Result<Vec<Declarator>> {
        let mut declarators = Vec::new();
        let mut current = (name, span);
        loop {
            let initializer = if self.eat_punct("=") {
                self.parse_variable_initializer()?
            } else {
                None
            };
            declarators.push(Declarator {
                name: current.0,
                span: current.1,
                initializer,
            });
            if !self.eat_punct(",") {
                break;
            }
            current = self.expect_ident()?;
        }
        Ok(declarators)
    }

    fn parse_variable_initializer(&mut self) -> Result<Option<NodeId>> {
        if self.at_punct("{") {
            // array initializer
            self.skip_balanced()?;
            return Ok(None);
        }
        self.eat_word("ref");
        self.parse_expression().map(Some)
    }

    // ---- types ----

    pub fn parse_type(&mut self) -> Result<TypeRef> {
        let start = self.start();
        if self.at_word("global") && self.peek_at(1).is_punct("::") {
            self.advance();
            self.advance();
        }
        let mut segments = vec![self.expect_ident()?.0];
        let mut has_type_arguments = false;
        loop {
            if self.at_punct("<") && self.try_skip_type_arguments() {
                has_type_arguments = true;
            } else if (self.at_punct(".") || self.at_punct("::")) && Self::is_plain_ident(self.peek_at(1)) {
                self.advance();
                segments.push(self.expect_ident()?.0);
            } else {
                break;
            }
        }
        let mut nullable = false;
        if self.at_punct("?") {
            let next = self.peek_at(1);
            if next.is_punct(")") || next.is_punct(",") || next.is_punct(">") || next.is_punct("[") || next.is_punct("]") || Self::is_plain_ident(next) {
                self.advance();
                nullable = true;
            }
        }
        let mut array_rank = 0;
        while self.at_punct("[") && (self.peek_at(1).is_punct("]") || self.peek_at(1).is_punct(",")) {
            self.advance();
            while self.eat_punct(",") {}
            self.expect_punct("]")?;
            array_rank += 1;
        }
        let end = self.prev_end();
        Ok(TypeRef {
            segments,
            text: self.source[start..end].to_string(),
            span: Span::new(start, end),
            nullable,
            array_rank,
            has_type_arguments,
        })
    }

    /// Skip `<...>` when it looks like a type argument list; restores position otherwise
    fn try_skip_type_arguments(&mut self) -> bool {
        let saved = self.pos;
        let mut depth = 0usize;
        loop {
            let token = self.peek();
            if token.is_punct("<") {
                depth += 1;
            } else if token.is_punct(">") {
                depth -= 1;
                if depth == 0 {
                    self.advance();
                    return true;
                }
            } else if !(Self::is_plain_ident(token)
                || token.is_punct(",")
                || token.is_punct(".")
                || token.is_punct("?")
                || token.is_punct("[")
                || token.is_punct("]")
                || token.is_punct("::"))
            {
                self.pos = saved;
                return false;
            }
            self.advance();
        }
    }

    // ---- statements ----

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect_punct("{")?;
        let statements = self.parse_statements(false);
        self.expect_punct("}")?;
        Ok(statements)
    }

    /// Statements until `}` or, inside switch sections, the next label
    fn parse_statements(&mut self, in_section: bool) -> Vec<Stmt> {
        let mut statements = Vec::new();
        loop {
            if self.at_eof() || self.at_punct("}") {
                break;
            }
            if in_section && self.at_section_label() {
                break;
            }
            let start = self.pos;
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    log::debug!("Skipping statement that could not be parsed: {}", err);
                    self.recover();
                    statements.push(Stmt::Other);
                }
            }
            if self.pos == start {
                self.advance();
            }
        }
        statements
    }

    fn at_section_label(&self) -> bool {
        self.at_word("case") || (self.at_word("default") && self.peek_at(1).is_punct(":"))
    }

    fn parse_embedded(&mut self) -> Result<Box<Stmt>> {
        self.parse_statement().map(Box::new)
    }

    fn parse_paren_condition(&mut self) -> Result<NodeId> {
        self.expect_punct("(")?;
        let condition = self.parse_expression()?;
        self.expect_punct(")")?;
        Ok(condition)
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        if self.at_punct("{") {
            return self.parse_block().map(Stmt::Block);
        }
        if self.eat_punct(";") {
            return Ok(Stmt::Other);
        }

        let word = self.peek().ident().map(str::to_string);
        match word.as_deref() {
            Some("if") => {
                self.advance();
                let condition = self.parse_paren_condition()?;
                let then_branch = self.parse_embedded()?;
                let else_branch = if self.eat_word("else") {
                    Some(self.parse_embedded()?)
                } else {
                    None
                };
                Ok(Stmt::If {
                    condition,
                    then_branch,
                    else_branch,
                })
            }
            Some("while") => {
                self.advance();
                let condition = self.parse_paren_condition()?;
                let body = self.parse_embedded()?;
                Ok(Stmt::While { condition, body })
            }
            Some("do") => {
                self.advance();
                let body = self.parse_embedded()?;
                if !self.eat_word("while") {
                    return Err(self.unexpected("'while'"));
                }
                let condition = self.parse_paren_condition()?;
                self.expect_punct(";")?;
                Ok(Stmt::DoWhile { body, condition })
            }
            Some("for") => self.parse_for(),
            Some("foreach") => {
                self.advance();
                self.expect_punct("(")?;
                let ty = self.parse_type()?;
                let (name, _) = self.expect_ident()?;
                if !self.eat_word("in") {
                    return Err(self.unexpected("'in'"));
                }
                let iterable = self.parse_expression()?;
                self.expect_punct(")")?;
                let body = self.parse_embedded()?;
                Ok(Stmt::Foreach {
                    ty,
                    name,
                    iterable,
                    body,
                })
            }
            Some("switch") => self.parse_switch(),
            Some("return") | Some("throw") => {
                self.advance();
                let value = if self.at_punct(";") {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect_punct(";")?;
                Ok(if word.as_deref() == Some("return") {
                    Stmt::Return(value)
                } else {
                    Stmt::Throw(value)
                })
            }
            Some("break") | Some("continue") | Some("goto") | Some("yield") => {
                self.skip_until(&[";"]);
                self.expect_punct(";")?;
                Ok(Stmt::Other)
            }
            Some("try") => {
                self.advance();
                let body = self.parse_block()?;
                let mut handlers = Vec::new();
                loop {
                    if self.eat_word("catch") {
                        if self.at_punct("(") {
                            self.skip_balanced()?;
                        }
                        if self.eat_word("when") {
                            self.skip_balanced()?;
                        }
                        handlers.push(self.parse_block()?);
                    } else if self.eat_word("finally") {
                        handlers.push(self.parse_block()?);
                    } else {
                        break;
                    }
                }
                Ok(Stmt::Try { body, handlers })
            }
            Some("using") | Some("lock") | Some("fixed") if self.peek_at(1).is_punct("(") => {
                self.advance();
                self.advance();
                if self.is_local_declaration() {
                    let local = self.parse_local_declaration()?;
                    self.expect_punct(")")?;
                    let body = self.parse_statement()?;
                    return Ok(Stmt::Block(vec![local, body]));
                }
                let header = self.parse_expression()?;
                self.expect_punct(")")?;
                let body = self.parse_embedded()?;
                Ok(Stmt::Guarded {
                    header: Some(header),
                    body,
                })
            }
            Some("using") => {
                self.advance();
                let local = self.parse_local_declaration()?;
                self.expect_punct(";")?;
                Ok(local)
            }
            Some("checked") | Some("unchecked") | Some("unsafe") if self.peek_at(1).is_punct("{") => {
                self.advance();
                let body = self.parse_block()?;
                Ok(Stmt::Guarded {
                    header: None,
                    body: Box::new(Stmt::Block(body)),
                })
            }
            _ => {
                // Labeled statement
                if Self::is_plain_ident(self.peek()) && self.peek_at(1).is_punct(":") {
                    self.advance();
                    self.advance();
                    return self.parse_statement();
                }
                if self.is_local_declaration() {
                    let local = self.parse_local_declaration()?;
                    self.expect_punct(";")?;
                    return Ok(local);
                }
                let expr = self.parse_expression()?;
                self.expect_punct(";")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        self.advance();
        self.expect_punct("(")?;
        let mut init = Vec::new();
        if !self.at_punct(";") {
            if self.is_local_declaration() {
                init.push(self.parse_local_declaration()?);
            } else {
                loop {
                    init.push(Stmt::Expr(self.parse_expression()?));
                    if !self.eat_punct(",") {
                        break;
                    }
                }
            }
        }
        self.expect_punct(";")?;
        let condition = if self.at_punct(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(";")?;
        let mut step = Vec::new();
        while !self.at_punct(")") {
            step.push(self.parse_expression()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        let body = self.parse_embedded()?;
        Ok(Stmt::For {
            init,
            condition,
            step,
            body,
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt> {
        self.advance();
        let subject = self.parse_paren_condition()?;
        self.expect_punct("{")?;
        let mut sections = Vec::new();
        while !self.at_punct("}") && !self.at_eof() {
            let mut labels = Vec::new();
            while self.at_section_label() {
                if self.eat_word("case") {
                    if let Some(label) = self.parse_case_label()? {
                        labels.push(SwitchLabel::Case(label));
                    }
                } else {
                    self.advance();
                    self.advance();
                    labels.push(SwitchLabel::Default);
                }
            }
            if labels.is_empty() {
                return Err(self.unexpected("'case' or 'default'"));
            }
            let body = self.parse_statements(true);
            sections.push(SwitchSection { labels, body });
        }
        self.expect_punct("}")?;
        Ok(Stmt::Switch { subject, sections })
    }

    /// A constant case label; patterns are skipped and yield `None`
    fn parse_case_label(&mut self) -> Result<Option<NodeId>> {
        let saved = self.pos;
        if let Ok(label) = self.parse_expression() {
            if self.eat_punct(":") {
                return Ok(Some(label));
            }
        }
        self.pos = saved;
        self.skip_until(&[":"]);
        self.expect_punct(":")?;
        Ok(None)
    }

    /// Lookahead: `Type name =`, `Type name;` or `Type name,`
    fn is_local_declaration(&mut self) -> bool {
        let saved = self.pos;
        while LOCAL_MODIFIERS.iter().any(|m| self.at_word(m)) {
            self.advance();
        }
        let result = self.parse_type().is_ok()
            && Self::is_plain_ident(self.peek())
            && {
                let next = self.peek_at(1);
                next.is_punct("=") || next.is_punct(";") || next.is_punct(",") || next.is_punct(")")
            };
        self.pos = saved;
        result
    }

    fn parse_local_declaration(&mut self) -> Result<Stmt> {
        while LOCAL_MODIFIERS.iter().any(|m| self.at_word(m)) {
            self.advance();
        }
        let ty = self.parse_type()?;
        let (name, span) = self.expect_ident()?;
        let declarators = self.parse_declarators_from(name, span)?;
        Ok(Stmt::Local { ty, declarators })
    }

    // ---- expressions ----

    pub fn parse_expression(&mut self) -> Result<NodeId> {
        if let Some(lambda) = self.try_lambda()? {
            return Ok(lambda);
        }
        let target = self.parse_conditional()?;
        if let Some((op, width)) = self.peek_assign_op() {
            for _ in 0..width {
                self.advance();
            }
            let value = self.parse_expression()?;
            let span = self.tree.span(target).to(self.tree.span(value));
            return Ok(self.tree.alloc(ExprKind::Assignment { op, target, value }, span));
        }
        Ok(target)
    }

    fn peek_assign_op(&self) -> Option<(AssignOp, usize)> {
        let token = self.peek();
        let op = match &token.kind {
            TokenKind::Punct("=") => AssignOp::Assign,
            TokenKind::Punct("+=") => AssignOp::Add,
            TokenKind::Punct("-=") => AssignOp::Subtract,
            TokenKind::Punct("*=") => AssignOp::Multiply,
            TokenKind::Punct("/=") => AssignOp::Divide,
            TokenKind::Punct("%=") => AssignOp::Remainder,
            TokenKind::Punct("&=") => AssignOp::BitAnd,
            TokenKind::Punct("|=") => AssignOp::BitOr,
            TokenKind::Punct("^=") => AssignOp::BitXor,
            TokenKind::Punct("<<=") => AssignOp::ShiftLeft,
            TokenKind::Punct("??=") => AssignOp::Coalesce,
            TokenKind::Punct(">") if self.peek_at(1).is_punct(">=") && self.adjacent(0) => {
                return Some((AssignOp::ShiftRight, 2))
            }
            _ => return None,
        };
        Some((op, 1))
    }

    fn try_lambda(&mut self) -> Result<Option<NodeId>> {
        let start = self.start();
        let saved = self.pos;
        self.eat_word("async");
        if Self::is_plain_ident(self.peek()) && self.peek_at(1).is_punct("=>") {
            self.advance();
        } else if self.at_punct("(") {
            if self.skip_balanced().is_err() || !self.at_punct("=>") {
                self.pos = saved;
                return Ok(None);
            }
        } else {
            self.pos = saved;
            return Ok(None);
        }
        self.expect_punct("=>")?;
        if self.at_punct("{") {
            self.skip_balanced()?;
        } else {
            self.parse_expression()?;
        }
        let span = Span::new(start, self.prev_end());
        Ok(Some(self.tree.alloc(ExprKind::Opaque, span)))
    }

    fn parse_conditional(&mut self) -> Result<NodeId> {
        let condition = self.parse_binary(0)?;
        if !self.at_punct("?") {
            return Ok(condition);
        }
        self.advance();
        let when_true = self.parse_expression()?;
        self.expect_punct(":")?;
        let when_false = self.parse_expression()?;
        let span = self.tree.span(condition).to(self.tree.span(when_false));
        Ok(self.tree.alloc(
            ExprKind::Conditional {
                condition,
                when_true,
                when_false,
            },
            span,
        ))
    }

    fn peek_binary_op(&self) -> Option<(BinaryOp, usize)> {
        let op = match &self.peek().kind {
            TokenKind::Punct("*") => BinaryOp::Multiply,
            TokenKind::Punct("/") => BinaryOp::Divide,
            TokenKind::Punct("%") => BinaryOp::Remainder,
            TokenKind::Punct("+") => BinaryOp::Add,
            TokenKind::Punct("-") => BinaryOp::Subtract,
            TokenKind::Punct("<<") => BinaryOp::ShiftLeft,
            TokenKind::Punct("<") => BinaryOp::Less,
            TokenKind::Punct(">") => {
                let next = self.peek_at(1);
                if self.adjacent(0) && next.is_punct(">") {
                    return Some((BinaryOp::ShiftRight, 2));
                }
                if self.adjacent(0) && next.is_punct(">=") {
                    return None;
                }
                BinaryOp::Greater
            }
            TokenKind::Punct("<=") => BinaryOp::LessEqual,
            TokenKind::Punct(">=") => BinaryOp::GreaterEqual,
            TokenKind::Punct("==") => BinaryOp::Equal,
            TokenKind::Punct("!=") => BinaryOp::NotEqual,
            TokenKind::Punct("&") => BinaryOp::BitAnd,
            TokenKind::Punct("^") => BinaryOp::BitXor,
            TokenKind::Punct("|") => BinaryOp::BitOr,
            TokenKind::Punct("&&") => BinaryOp::LogicalAnd,
            TokenKind::Punct("||") => BinaryOp::LogicalOr,
            TokenKind::Punct("??") => BinaryOp::Coalesce,
            _ => return None,
        };
        Some((op, 1))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<NodeId> {
        let mut left = self.parse_unary()?;
        loop {
            if (self.at_word("is") || self.at_word("as")) && BinaryOp::Less.precedence() >= min_precedence {
                left = self.parse_type_test(left)?;
                continue;
            }
            let Some((op, width)) = self.peek_binary_op() else {
                break;
            };
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            for _ in 0..width {
                self.advance();
            }
            let right = if op == BinaryOp::Coalesce {
                self.parse_binary(precedence)?
            } else {
                self.parse_binary(precedence + 1)?
            };
            let span = self.tree.span(left).to(self.tree.span(right));
            left = self.tree.alloc(ExprKind::Binary { op, left, right }, span);
        }
        Ok(left)
    }

    fn parse_type_test(&mut self, operand: NodeId) -> Result<NodeId> {
        let op = if self.eat_word("is") {
            TypeTestOp::Is
        } else {
            self.advance();
            TypeTestOp::As
        };
        self.eat_word("not");
        let ty = if Self::is_plain_ident(self.peek()) || self.at_word("global") {
            let ty = self.parse_type()?;
            // designation, e.g. `is Foo foo`
            if op == TypeTestOp::Is && Self::is_plain_ident(self.peek()) {
                self.advance();
            }
            ty
        } else {
            let start = self.start();
            self.parse_unary()?;
            let end = self.prev_end();
            TypeRef::simple(&self.source[start..end])
        };
        let span = Span::new(self.tree.span(operand).start, self.prev_end());
        Ok(self.tree.alloc(ExprKind::TypeTest { op, operand, ty }, span))
    }

    fn parse_unary(&mut self) -> Result<NodeId> {
        let start = self.start();
        let op = match &self.peek().kind {
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Punct("-") => Some(UnaryOp::Negate),
            TokenKind::Punct("!") => Some(UnaryOp::LogicalNot),
            TokenKind::Punct("~") => Some(UnaryOp::BitNot),
            TokenKind::Punct("++") => Some(UnaryOp::PreIncrement),
            TokenKind::Punct("--") => Some(UnaryOp::PreDecrement),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = Span::new(start, self.tree.span(operand).end);
            return Ok(self.tree.alloc(ExprKind::Unary { op, operand }, span));
        }
        if self.at_word("await") && (Self::is_plain_ident(self.peek_at(1)) || self.peek_at(1).is_punct("(")) {
            self.advance();
            self.parse_unary()?;
            return Ok(self.tree.alloc(ExprKind::Opaque, Span::new(start, self.prev_end())));
        }
        if self.at_punct("(") {
            if let Some(cast) = self.try_cast()? {
                return Ok(cast);
            }
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    /// `(T)operand` when the parenthesised part is a type and what follows can
    /// only be an operand; otherwise the position is restored
    fn try_cast(&mut self) -> Result<Option<NodeId>> {
        let saved = self.pos;
        let start = self.start();
        self.advance();
        let ty = match self.parse_type() {
            Ok(ty) if self.at_punct(")") => ty,
            _ => {
                self.pos = saved;
                return Ok(None);
            }
        };
        self.advance();

        let next = self.peek();
        let starts_operand = match &next.kind {
            TokenKind::Ident(word) => !RESERVED_WORDS.contains(word.as_str()) || OPERAND_KEYWORDS.contains(&word.as_str()),
            TokenKind::Int(_) | TokenKind::Real(_) | TokenKind::Char(_) | TokenKind::Str(_) | TokenKind::InterpolatedStr => true,
            TokenKind::Punct("(") | TokenKind::Punct("~") | TokenKind::Punct("!") => true,
            TokenKind::Punct("-") | TokenKind::Punct("+") | TokenKind::Punct("++") | TokenKind::Punct("--") => ty.is_predefined(),
            _ => false,
        };
        if !starts_operand {
            self.pos = saved;
            return Ok(None);
        }

        let operand = self.parse_unary()?;
        let span = Span::new(start, self.tree.span(operand).end);
        Ok(Some(self.tree.alloc(ExprKind::Cast { ty, operand }, span)))
    }

    fn literal(&mut self, literal: Literal) -> NodeId {
        let span = self.advance().span;
        self.tree.alloc(ExprKind::Literal(literal), span)
    }

    fn parse_primary(&mut self) -> Result<NodeId> {
        let start = self.start();
        let kind = self.peek().kind.clone();
        match kind {
            TokenKind::Int(value) => Ok(self.literal(Literal::Int(value as i64))),
            TokenKind::Real(value) => Ok(self.literal(Literal::Real(value))),
            TokenKind::Char(value) => Ok(self.literal(Literal::Char(value))),
            TokenKind::Str(value) => Ok(self.literal(Literal::Str(value))),
            TokenKind::InterpolatedStr => Ok(self.literal(Literal::Interpolated)),
            TokenKind::Punct("(") => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect_punct(")")?;
                Ok(self.tree.alloc(ExprKind::Paren(inner), Span::new(start, self.prev_end())))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" => Ok(self.literal(Literal::Bool(true))),
                "false" => Ok(self.literal(Literal::Bool(false))),
                "null" => Ok(self.literal(Literal::Null)),
                "default" => {
                    self.advance();
                    if self.eat_punct("(") {
                        self.parse_type()?;
                        self.expect_punct(")")?;
                    }
                    Ok(self.tree.alloc(ExprKind::Literal(Literal::Default), Span::new(start, self.prev_end())))
                }
                "new" => self.parse_object_creation(),
                "typeof" | "sizeof" | "nameof" if self.peek_at(1).is_punct("(") => {
                    let callee_span = self.advance().span;
                    let callee = self.tree.alloc(ExprKind::Identifier(word.clone()), callee_span);
                    self.skip_balanced()?;
                    Ok(self.tree.alloc(
                        ExprKind::Invocation {
                            callee,
                            args: Vec::new(),
                        },
                        Span::new(start, self.prev_end()),
                    ))
                }
                "checked" | "unchecked" if self.peek_at(1).is_punct("(") => {
                    self.advance();
                    self.advance();
                    let inner = self.parse_expression()?;
                    self.expect_punct(")")?;
                    Ok(self.tree.alloc(ExprKind::Paren(inner), Span::new(start, self.prev_end())))
                }
                "this" | "base" => {
                    let span = self.advance().span;
                    Ok(self.tree.alloc(ExprKind::Identifier(word.clone()), span))
                }
                _ if RESERVED_WORDS.contains(word.as_str()) => Err(self.unexpected("expression")),
                _ => {
                    let span = self.advance().span;
                    Ok(self.tree.alloc(ExprKind::Identifier(word.clone()), span))
                }
            },
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_object_creation(&mut self) -> Result<NodeId> {
        let start = self.start();
        self.advance();
        let ty = if self.at_punct("[") {
            self.skip_balanced()?;
            TypeRef::simple("array")
        } else if self.at_punct("{") || self.at_punct("(") {
            TypeRef::simple("object")
        } else {
            self.parse_type()?
        };
        let mut args = Vec::new();
        if self.at_punct("[") {
            self.skip_balanced()?;
        }
        if self.at_punct("(") {
            args = self.parse_arguments(")")?;
        }
        if self.at_punct("{") {
            self.skip_balanced()?;
        }
        Ok(self.tree.alloc(
            ExprKind::ObjectCreation { ty, args },
            Span::new(start, self.prev_end()),
        ))
    }

    fn parse_postfix(&mut self, mut expr: NodeId) -> Result<NodeId> {
        loop {
            let start = self.tree.span(expr).start;
            if self.at_punct(".") || self.at_punct("?.") || self.at_punct("::") {
                self.advance();
                let (name, span) = match &self.peek().kind {
                    TokenKind::Ident(word) => (word.clone(), self.peek().span),
                    _ => return Err(self.unexpected("member name")),
                };
                self.advance();
                let member = self.tree.alloc(ExprKind::Identifier(name), span);
                expr = self.tree.alloc(
                    ExprKind::MemberAccess { target: expr, member },
                    Span::new(start, span.end),
                );
                self.skip_generic_call_arguments();
            } else if self.at_punct("(") {
                let args = self.parse_arguments(")")?;
                expr = self.tree.alloc(
                    ExprKind::Invocation { callee: expr, args },
                    Span::new(start, self.prev_end()),
                );
            } else if self.at_punct("[") {
                let args = self.parse_arguments("]")?;
                expr = self.tree.alloc(
                    ExprKind::ElementAccess { target: expr, args },
                    Span::new(start, self.prev_end()),
                );
            } else if self.at_punct("++") || self.at_punct("--") {
                let op = if self.at_punct("++") {
                    UnaryOp::PostIncrement
                } else {
                    UnaryOp::PostDecrement
                };
                self.advance();
                expr = self.tree.alloc(
                    ExprKind::Unary { op, operand: expr },
                    Span::new(start, self.prev_end()),
                );
            } else if self.at_punct("!") && (self.peek_at(1).is_punct(".") || self.peek_at(1).is_punct(")")) && self.adjacent(0) {
                // null-forgiving operator
                self.advance();
            } else if self.at_punct("<") && matches!(self.tree.kind(expr), ExprKind::Identifier(_)) {
                if !self.skip_generic_call_arguments() {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Skip `<T>` directly followed by an argument list, as in `Parse<int>(x)`
    fn skip_generic_call_arguments(&mut self) -> bool {
        if !self.at_punct("<") {
            return false;
        }
        let saved = self.pos;
        if self.try_skip_type_arguments() && self.at_punct("(") {
            return true;
        }
        self.pos = saved;
        false
    }

    fn parse_arguments(&mut self, close: &str) -> Result<Vec<NodeId>> {
        self.advance();
        let mut args = Vec::new();
        if self.eat_punct(close) {
            return Ok(args);
        }
        loop {
            // named argument
            if Self::is_plain_ident(self.peek()) && self.peek_at(1).is_punct(":") {
                self.advance();
                self.advance();
            }
            let out_var = self.at_word("out");
            while self.at_word("ref") || self.at_word("out") || self.at_word("in") {
                self.advance();
            }
            let arg = if out_var && Self::is_plain_ident(self.peek()) && Self::is_plain_ident(self.peek_at(1)) {
                // `out var name` / `out int name`
                self.parse_type()?;
                let (name, span) = self.expect_ident()?;
                self.tree.alloc(ExprKind::Identifier(name), span)
            } else {
                self.parse_expression()?
            };
            args.push(arg);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(close)?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> (SyntaxTree, NodeId) {
        parse_expression(source).unwrap()
    }

    #[test]
    fn test_bitwise_precedence() {
        let (tree, root) = expr("a | b & c");
        let (op, left, right) = tree.binary(root).unwrap();
        assert_eq!(op, BinaryOp::BitOr);
        assert_eq!(tree.text(left), "a");
        assert_eq!(tree.text(right), "b & c");
    }

    #[test]
    fn test_comparison_binds_tighter_than_and() {
        let (tree, root) = expr("(x & 2) > 0");
        let (op, left, _) = tree.binary(root).unwrap();
        assert_eq!(op, BinaryOp::Greater);
        assert!(matches!(tree.kind(left), ExprKind::Paren(_)));
    }

    #[test]
    fn test_cast_disambiguation() {
        // Predefined type: always a cast
        let (tree, root) = expr("(int)-1");
        assert!(matches!(tree.kind(root), ExprKind::Cast { .. }));

        // Named type followed by an operand: cast
        let (tree, root) = expr("(Flag)(2 + 4)");
        match tree.kind(root) {
            ExprKind::Cast { ty, operand } => {
                assert_eq!(ty.text, "Flag");
                assert_eq!(tree.text(*operand), "(2 + 4)");
            }
            other => panic!("expected cast, got {:?}", other),
        }

        // Named type followed by a binary operator: parenthesised subtraction
        let (tree, root) = expr("(a) - 1");
        assert!(matches!(tree.kind(root), ExprKind::Binary { op: BinaryOp::Subtract, .. }));
    }

    #[test]
    fn test_shift_right_from_split_tokens() {
        let (tree, root) = expr("a >> 2");
        assert!(matches!(tree.kind(root), ExprKind::Binary { op: BinaryOp::ShiftRight, .. }));
    }

    #[test]
    fn test_member_access_and_invocation() {
        let (tree, root) = expr("Conversions.ToInteger(x.Value, 2)");
        match tree.kind(root) {
            ExprKind::Invocation { callee, args } => {
                assert_eq!(tree.dotted_path(*callee).unwrap(), vec!["Conversions", "ToInteger"]);
                assert_eq!(args.len(), 2);
                assert_eq!(tree.text(args[0]), "x.Value");
            }
            other => panic!("expected invocation, got {:?}", other),
        }
    }

    #[test]
    fn test_source_outline() {
        let file = parse_source(
            r#"
            namespace App.Model {
                public class Holder {
                    [Flags]
                    public enum Mode { None = 0, A = 1, B = 1 << 1 }
                    private Mode current = (Mode)3;
                    public int Count { get; set; }
                    public void Run(Mode m = (Mode)1) {
                        var x = 2;
                        if ((x & 2) > 0) { current = (Mode)4; }
                        switch (m) { case (Mode)2: break; default: break; }
                    }
                }
            }
            "#,
        )
        .unwrap();

        let enums = file.enums();
        assert_eq!(enums.len(), 1);
        let (scope, decl) = &enums[0];
        assert_eq!(decl.name, "Mode");
        assert!(decl.has_flags_attribute());
        assert_eq!(decl.members.len(), 3);
        assert_eq!(metadata_name(scope, &decl.name), "App.Model.Holder+Mode");

        let Item::Namespace(ns) = &file.items[0] else {
            panic!("expected namespace");
        };
        let Item::Type(holder) = &ns.items[0] else {
            panic!("expected class");
        };
        assert_eq!(holder.items.len(), 4);
        let Item::Method(run) = &holder.items[3] else {
            panic!("expected method");
        };
        assert_eq!(run.params.len(), 1);
        assert!(run.params[0].default.is_some());
        assert_eq!(run.body.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_recovery_keeps_following_statements() {
        let file = parse_source(
            r#"
            class C {
                void M() {
                    foo bar baz;
                    int y = 3;
                }
            }
            "#,
        )
        .unwrap();
        let Item::Type(class) = &file.items[0] else {
            panic!("expected class");
        };
        let Item::Method(method) = &class.items[0] else {
            panic!("expected method");
        };
        let body = method.body.as_ref().unwrap();
        assert!(body.iter().any(|s| matches!(s, Stmt::Local { .. })));
    }
}
