//! Recursive descent parser with statement-level error recovery

use crate::ast::*;
use crate::diagnostics::{codes, Diagnostic, Span};
use crate::lexer::{tokenize, Token, TokenKind};

/// Stop collecting syntax errors past this many
const MAX_SYNTAX_ERRORS: usize = 100;

/// Deepest expression or block nesting accepted
const MAX_NESTING: usize = 128;

/// Parse `source` into a program plus all lexical and syntax diagnostics
pub fn parse(source: &str) -> (Program, Vec<Diagnostic>) {
    let (tokens, mut diagnostics) = tokenize(source);
    let mut parser = Parser::new(tokens);
    let program = parser.program();
    diagnostics.append(&mut parser.diagnostics);
    diagnostics.sort_by_key(|d| d.span.start);
    (program, diagnostics)
}

/// Marker for a reported syntax error; the diagnostic is already recorded
struct Reported;

type PResult<T> = Result<T, Reported>;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            diagnostics: Vec::new(),
        }
    }

    fn peek(&self) -> &TokenKind {
        &self.current().kind
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn previous_span(&self) -> Span {
        if self.pos == 0 {
            self.current().span
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error<T>(&mut self, code: &'static str, message: impl Into<String>, span: Span) -> PResult<T> {
        if self.diagnostics.len() < MAX_SYNTAX_ERRORS {
            self.diagnostics.push(Diagnostic::syntax(code, message, span));
        }
        Err(Reported)
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(&mut self, inner: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.deepen()?;
        let result = inner(self);
        self.depth -= 1;
        result
    }

    /// Take one more nesting level; the caller restores `depth`
    fn deepen(&mut self) -> PResult<()> {
        if self.depth >= MAX_NESTING {
            let span = self.current().span;
            return self.error(codes::NESTING_TOO_DEEP, "Code is nested too deeply", span);
        }
        self.depth += 1;
        Ok(())
    }

    /// Run a left-associative chain parser; each link it adds counts as a level
    fn chain<T>(&mut self, inner: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let depth = self.depth;
        let result = inner(self);
        self.depth = depth;
        result
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.check(&kind) {
            return Ok(self.advance());
        }
        let found = self.peek().describe();
        let span = self.current().span;
        self.error(
            codes::EXPECTED_TOKEN,
            format!("{} expected, found {}", kind.describe(), found),
            span,
        )
    }

    fn ident(&mut self) -> PResult<Ident> {
        if let TokenKind::Ident(name) = self.peek().clone() {
            let span = self.advance().span;
            return Ok(Ident { name, span });
        }
        let found = self.peek().describe();
        let span = self.current().span;
        self.error(
            codes::EXPECTED_IDENTIFIER,
            format!("Identifier expected, found {}", found),
            span,
        )
    }

    fn program(&mut self) -> Program {
        let mut items = Vec::new();
        while !self.at_eof() {
            let before = self.pos;
            match self.item() {
                Ok(item) => items.push(item),
                Err(Reported) => self.recover_item(before),
            }
        }
        Program { items }
    }

    /// Skip to the next token that can start an item
    fn recover_item(&mut self, start: usize) {
        if self.pos == start {
            self.advance();
        }
        let mut depth = 0usize;
        while !self.at_eof() {
            match self.peek() {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    if depth <= 1 {
                        self.advance();
                        if depth == 1 {
                            return;
                        }
                        continue;
                    }
                    depth -= 1;
                }
                TokenKind::Use
                | TokenKind::Const
                | TokenKind::Fn
                | TokenKind::Connector
                | TokenKind::Abstract
                    if depth == 0 =>
                {
                    return
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Skip past the current statement: through the next `;` or up to a closing `}`
    fn recover_stmt(&mut self, start: usize) {
        if self.pos == start && !self.check(&TokenKind::RBrace) {
            self.advance();
        }
        let mut depth = 0usize;
        while !self.at_eof() {
            match self.peek() {
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn item(&mut self) -> PResult<Item> {
        match self.peek() {
            TokenKind::Use => {
                let start = self.advance().span;
                let module = self.ident()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Item::Use(UseDecl {
                    module,
                    span: start.to(self.previous_span()),
                }))
            }
            TokenKind::Const => {
                let start = self.advance().span;
                let name = self.ident()?;
                self.expect(TokenKind::Assign)?;
                let value = self.expr()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Item::Const(ConstDecl {
                    name,
                    value,
                    span: start.to(self.previous_span()),
                }))
            }
            TokenKind::Fn => Ok(Item::Function(self.function()?)),
            TokenKind::Connector | TokenKind::Abstract => Ok(Item::Connector(self.connector()?)),
            other => {
                let message = format!(
                    "Expected 'use', 'const', 'fn' or 'connector', found {}",
                    other.describe()
                );
                let span = self.current().span;
                self.error(codes::EXPECTED_ITEM, message, span)
            }
        }
    }

    fn function(&mut self) -> PResult<FunctionDecl> {
        let start = self.expect(TokenKind::Fn)?.span;
        let name = self.ident()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.ident()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = self.block()?;
        Ok(FunctionDecl {
            name,
            params,
            span: start.to(body.span),
            body,
        })
    }

    fn connector(&mut self) -> PResult<ConnectorDecl> {
        let start = self.current().span;
        let is_abstract = self.eat(&TokenKind::Abstract);
        self.expect(TokenKind::Connector)?;
        let name = self.ident()?;
        let base = if self.eat(&TokenKind::Extends) {
            Some(self.ident()?)
        } else {
            None
        };
        self.expect(TokenKind::LBrace)?;

        let mut members = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let before = self.pos;
            match self.member() {
                Ok(member) => members.push(member),
                Err(Reported) => self.recover_stmt(before),
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(ConnectorDecl {
            name,
            is_abstract,
            base,
            members,
            span: start.to(self.previous_span()),
        })
    }

    fn member(&mut self) -> PResult<Member> {
        if self.check(&TokenKind::Fn) {
            return Ok(Member::Method(self.function()?));
        }
        let name = self.ident()?;
        self.expect(TokenKind::Assign)?;
        let value = self.expr()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Member::Property(PropertyDecl {
            span: name.span.to(self.previous_span()),
            name,
            value,
        }))
    }

    fn block(&mut self) -> PResult<Block> {
        self.nested(Self::block_inner)
    }

    fn block_inner(&mut self) -> PResult<Block> {
        let start = self.expect(TokenKind::LBrace)?.span;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            let before = self.pos;
            match self.stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(Reported) => self.recover_stmt(before),
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Block {
            stmts,
            span: start.to(self.previous_span()),
        })
    }

    fn stmt(&mut self) -> PResult<Stmt> {
        let start = self.current().span;
        let kind = match self.peek() {
            TokenKind::Let => {
                self.advance();
                let name = self.ident()?;
                self.expect(TokenKind::Assign)?;
                let value = self.expr()?;
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Let { name, value }
            }
            TokenKind::If => return self.if_stmt(),
            TokenKind::While => {
                self.advance();
                let cond = self.expr()?;
                let body = self.block()?;
                StmtKind::While { cond, body }
            }
            TokenKind::For => {
                self.advance();
                let var = self.ident()?;
                self.expect(TokenKind::In)?;
                let iterable = self.expr()?;
                let body = self.block()?;
                StmtKind::For {
                    var,
                    iterable,
                    body,
                }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Return(value)
            }
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Continue
            }
            _ => {
                let expr = self.expr()?;
                if self.eat(&TokenKind::Assign) {
                    let target = match expr.kind {
                        ExprKind::Ident(name) => AssignTarget::Variable(Ident {
                            name,
                            span: expr.span,
                        }),
                        ExprKind::Member { object, name } if object.kind == ExprKind::SelfRef => {
                            AssignTarget::SelfField(name)
                        }
                        _ => {
                            return self.error(
                                codes::INVALID_ASSIGNMENT,
                                "The left-hand side of an assignment must be a variable or a 'self' field",
                                expr.span,
                            )
                        }
                    };
                    let value = self.expr()?;
                    self.expect(TokenKind::Semicolon)?;
                    StmtKind::Assign { target, value }
                } else {
                    self.expect(TokenKind::Semicolon)?;
                    StmtKind::Expr(expr)
                }
            }
        };
        Ok(Stmt {
            kind,
            span: start.to(self.previous_span()),
        })
    }

    fn if_stmt(&mut self) -> PResult<Stmt> {
        let start = self.expect(TokenKind::If)?.span;
        let cond = self.expr()?;
        let then_block = self.block()?;
        let else_block = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                let nested = self.nested(Self::if_stmt)?;
                Some(Block {
                    span: nested.span,
                    stmts: vec![nested],
                })
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                cond,
                then_block,
                else_block,
            },
            span: start.to(self.previous_span()),
        })
    }

    fn expr(&mut self) -> PResult<Expr> {
        self.nested(|p| p.binary(0))
    }

    fn binary(&mut self, min_precedence: u8) -> PResult<Expr> {
        self.chain(|p| p.binary_chain(min_precedence))
    }

    fn binary_chain(&mut self, min_precedence: u8) -> PResult<Expr> {
        let mut lhs = self.unary()?;
        while let Some((op, precedence)) = binary_op(self.peek()) {
            if precedence < min_precedence {
                break;
            }
            self.deepen()?;
            self.advance();
            let rhs = self.binary(precedence + 1)?;
            lhs = Expr {
                span: lhs.span.to(rhs.span),
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        let start = self.advance().span;
        let operand = self.nested(Self::unary)?;
        Ok(Expr {
            span: start.to(operand.span),
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    }

    fn postfix(&mut self) -> PResult<Expr> {
        self.chain(Self::postfix_chain)
    }

    fn postfix_chain(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if matches!(
                self.peek(),
                TokenKind::LParen | TokenKind::Dot | TokenKind::LBracket
            ) {
                self.deepen()?;
            }
            match self.peek() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.comma_list(TokenKind::RParen, Self::expr)?;
                    expr = Expr {
                        span: expr.span.to(self.previous_span()),
                        kind: ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.ident()?;
                    expr = Expr {
                        span: expr.span.to(name.span),
                        kind: ExprKind::Member {
                            object: Box::new(expr),
                            name,
                        },
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr {
                        span: expr.span.to(self.previous_span()),
                        kind: ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> PResult<Expr> {
        let token = self.current().clone();
        let kind = match token.kind {
            TokenKind::Null => ExprKind::Null,
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Int(v) => ExprKind::Int(v),
            TokenKind::Float(v) => ExprKind::Float(v),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::Ident(name) => ExprKind::Ident(name),
            TokenKind::SelfKw => ExprKind::SelfRef,
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(Expr {
                    kind: inner.kind,
                    span: token.span.to(self.previous_span()),
                });
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.comma_list(TokenKind::RBracket, Self::expr)?;
                return Ok(Expr {
                    kind: ExprKind::List(items),
                    span: token.span.to(self.previous_span()),
                });
            }
            TokenKind::LBrace => {
                self.advance();
                let entries = self.comma_list(TokenKind::RBrace, Self::map_entry)?;
                return Ok(Expr {
                    kind: ExprKind::Map(entries),
                    span: token.span.to(self.previous_span()),
                });
            }
            other => {
                return self.error(
                    codes::EXPECTED_EXPRESSION,
                    format!("Expression expected, found {}", other.describe()),
                    token.span,
                )
            }
        };
        self.advance();
        Ok(Expr {
            kind,
            span: token.span,
        })
    }

    fn map_entry(&mut self) -> PResult<(String, Expr)> {
        let key = match self.peek().clone() {
            TokenKind::Ident(name) => name,
            TokenKind::Str(s) => s,
            other => {
                let span = self.current().span;
                return self.error(
                    codes::EXPECTED_IDENTIFIER,
                    format!("Map key expected, found {}", other.describe()),
                    span,
                );
            }
        };
        self.advance();
        self.expect(TokenKind::Colon)?;
        Ok((key, self.expr()?))
    }

    /// Comma separated list closed by `close`; a trailing comma is allowed
    fn comma_list<T>(
        &mut self,
        close: TokenKind,
        mut element: impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<Vec<T>> {
        let mut items = Vec::new();
        while !self.check(&close) {
            items.push(element(self)?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }
}

fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    let op = match kind {
        TokenKind::OrOr => (BinaryOp::Or, 1),
        TokenKind::AndAnd => (BinaryOp::And, 2),
        TokenKind::Eq => (BinaryOp::Eq, 3),
        TokenKind::NotEq => (BinaryOp::NotEq, 3),
        TokenKind::Lt => (BinaryOp::Lt, 4),
        TokenKind::LtEq => (BinaryOp::LtEq, 4),
        TokenKind::Gt => (BinaryOp::Gt, 4),
        TokenKind::GtEq => (BinaryOp::GtEq, 4),
        TokenKind::Plus => (BinaryOp::Add, 5),
        TokenKind::Minus => (BinaryOp::Sub, 5),
        TokenKind::Star => (BinaryOp::Mul, 6),
        TokenKind::Slash => (BinaryOp::Div, 6),
        TokenKind::Percent => (BinaryOp::Rem, 6),
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse_ok(source: &str) -> Program {
        let (program, diagnostics) = parse(source);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        program
    }

    #[test]
    fn test_empty_source() {
        assert!(parse_ok("").items.is_empty());
        assert!(parse_ok("  \n\t ").items.is_empty());
    }

    #[test]
    fn test_connector_with_members() {
        let program = parse_ok(
            r#"
use json;

abstract connector Base {
    version = "2.0";
}

connector Files extends Base {
    id = "files";
    fn search(query, max_results) {
        let found = [];
        for item in ["a", "b"] {
            if contains(item, query) { found = push(found, {title: item}); }
            else if item == "b" { continue; }
            else { break; }
        }
        self.last = query;
        return found;
    }
}
"#,
        );

        assert_eq!(program.uses().count(), 1);
        let files = program.connector("Files").unwrap();
        assert!(!files.is_abstract);
        assert_eq!(files.base.as_ref().unwrap().name, "Base");
        assert_eq!(files.method("search").unwrap().params.len(), 2);
        assert_eq!(program.connector_chain(files).len(), 2);
        assert!(program.has_property(files, "version"));
        assert_eq!(program.first_concrete_connector().unwrap().name.name, "Files");
    }

    #[test]
    fn test_precedence() {
        let program = parse_ok("const X = 1 + 2 * 3 == 7 || false;");
        let Item::Const(decl) = &program.items[0] else {
            panic!("expected const");
        };
        match &decl.value.kind {
            ExprKind::Binary { op, lhs, .. } => {
                assert_eq!(*op, BinaryOp::Or);
                assert!(matches!(lhs.kind, ExprKind::Binary { op: BinaryOp::Eq, .. }));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_semicolon_reports_position() {
        let (_, diagnostics) = parse("connector A {\n    id = \"a\"\n}");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, codes::EXPECTED_TOKEN);
        assert_eq!(diagnostics[0].span.start.line, 2);
    }

    #[test]
    fn test_recovers_and_reports_multiple_errors() {
        let (program, diagnostics) = parse(
            "fn a() { let = 1; let b = ; return 2; }\nfn ok() { return 1; }",
        );
        assert_eq!(diagnostics.len(), 2);
        assert!(program.function("ok").is_some());
    }

    #[test]
    fn test_top_level_statement_is_rejected() {
        let (_, diagnostics) = parse("return 5;");
        assert!(!diagnostics.is_empty());
        assert_eq!(diagnostics[0].code, codes::EXPECTED_ITEM);
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let source = format!("const X = {}1{};", "(".repeat(500), ")".repeat(500));
        let (_, diagnostics) = parse(&source);
        assert!(diagnostics.iter().any(|d| d.code == codes::NESTING_TOO_DEEP));

        let source = format!("const X = {}1;", "-".repeat(500));
        let (_, diagnostics) = parse(&source);
        assert!(diagnostics.iter().any(|d| d.code == codes::NESTING_TOO_DEEP));
    }

    #[rstest]
    #[case::sum(format!("const X = 1{};", " + 1".repeat(10_000)))]
    #[case::concat(format!("const X = \"a\"{};", " + \"b\"".repeat(10_000)))]
    #[case::calls(format!("const X = f{};", "()".repeat(10_000)))]
    #[case::members(format!("const X = a{};", ".b".repeat(10_000)))]
    #[case::indexes(format!("const X = a{};", "[0]".repeat(10_000)))]
    #[case::else_if(format!(
        "fn f(x) {{ if x == 0 {{ return 0; }}{} }}",
        " else if x == 1 { return 1; }".repeat(10_000)
    ))]
    fn test_long_chains_are_bounded(#[case] source: String) {
        let (_, diagnostics) = parse(&source);
        let error = diagnostics
            .iter()
            .find(|d| d.code == codes::NESTING_TOO_DEEP)
            .expect("nesting error");
        assert_eq!(error.span.start.line, 0);
        assert!(error.span.start.column > 0);
    }

    #[test]
    fn test_moderate_chain_is_accepted() {
        parse_ok(&format!("const X = 1{};", " + 1".repeat(100)));
        parse_ok(&format!("const X = a{};", ".b".repeat(100)));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let (_, diagnostics) = parse("fn f() { f() = 2; }");
        assert_eq!(diagnostics[0].code, codes::INVALID_ASSIGNMENT);
    }
}
