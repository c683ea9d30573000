//! Tokenizer for connector scripts

use crate::diagnostics::{codes, Diagnostic, Position, Span};

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    // Keywords
    Use,
    Connector,
    Abstract,
    Extends,
    Fn,
    Let,
    Const,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Break,
    Continue,
    True,
    False,
    Null,
    SelfKw,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Assign,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,

    Eof,
}

impl TokenKind {
    /// Text used in "expected ..." messages
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Int(v) => format!("number '{}'", v),
            TokenKind::Float(v) => format!("number '{}'", v),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Use => "use",
            TokenKind::Connector => "connector",
            TokenKind::Abstract => "abstract",
            TokenKind::Extends => "extends",
            TokenKind::Fn => "fn",
            TokenKind::Let => "let",
            TokenKind::Const => "const",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Return => "return",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::SelfKw => "self",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::Assign => "=",
            TokenKind::Eq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Ident(_)
            | TokenKind::Int(_)
            | TokenKind::Float(_)
            | TokenKind::Str(_)
            | TokenKind::Eof => "",
        }
    }
}

/// Reserved words, in the order completion lists them
pub const KEYWORDS: &[&str] = &[
    "use", "connector", "abstract", "extends", "fn", "let", "const", "if", "else", "while", "for",
    "in", "return", "break", "continue", "true", "false", "null", "self",
];

fn keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "use" => TokenKind::Use,
        "connector" => TokenKind::Connector,
        "abstract" => TokenKind::Abstract,
        "extends" => TokenKind::Extends,
        "fn" => TokenKind::Fn,
        "let" => TokenKind::Let,
        "const" => TokenKind::Const,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "return" => TokenKind::Return,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "self" => TokenKind::SelfKw,
        _ => return None,
    };
    Some(kind)
}

/// Whether `c` may start an identifier
pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Whether `c` may continue an identifier
pub fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A token with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Tokenize `source`; the returned tokens always end with `Eof`
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = Lexer::new(source);
    lexer.run();
    (lexer.tokens, lexer.diagnostics)
}

struct Lexer<'a> {
    source: &'a str,
    pos: Position,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: Position::default(),
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos.offset..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.source[self.pos.offset..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos.offset += c.len_utf8();
        if c == '\n' {
            self.pos.line += 1;
            self.pos.column = 0;
        } else {
            self.pos.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn push(&mut self, kind: TokenKind, start: Position) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, self.pos),
        });
    }

    fn run(&mut self) {
        loop {
            self.skip_trivia();
            let start = self.pos;
            let Some(c) = self.bump() else {
                self.push(TokenKind::Eof, start);
                return;
            };

            let kind = match c {
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                ',' => TokenKind::Comma,
                ';' => TokenKind::Semicolon,
                ':' => TokenKind::Colon,
                '.' => TokenKind::Dot,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '%' => TokenKind::Percent,
                '=' if self.eat('=') => TokenKind::Eq,
                '=' => TokenKind::Assign,
                '!' if self.eat('=') => TokenKind::NotEq,
                '!' => TokenKind::Bang,
                '<' if self.eat('=') => TokenKind::LtEq,
                '<' => TokenKind::Lt,
                '>' if self.eat('=') => TokenKind::GtEq,
                '>' => TokenKind::Gt,
                '&' if self.eat('&') => TokenKind::AndAnd,
                '|' if self.eat('|') => TokenKind::OrOr,
                '"' => self.string(start),
                c if c.is_ascii_digit() => self.number(c, start),
                c if is_ident_start(c) => self.ident(c),
                other => {
                    self.diagnostics.push(Diagnostic::syntax(
                        codes::UNEXPECTED_CHARACTER,
                        format!("Unexpected character '{}'", other),
                        Span::new(start, self.pos),
                    ));
                    continue;
                }
            };
            self.push(kind, start);
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.pos;
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        if c == '*' && self.eat('/') {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        self.diagnostics.push(Diagnostic::syntax(
                            codes::UNTERMINATED_COMMENT,
                            "End-of-file found, '*/' expected",
                            Span::new(start, self.pos),
                        ));
                    }
                }
                _ => return,
            }
        }
    }

    fn ident(&mut self, first: char) -> TokenKind {
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if !is_ident_continue(c) {
                break;
            }
            text.push(c);
            self.bump();
        }
        keyword(&text).unwrap_or(TokenKind::Ident(text))
    }

    fn number(&mut self, first: char, start: Position) -> TokenKind {
        let mut text = String::from(first);
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            text.push(c);
            self.bump();
        }

        let is_float = self.peek() == Some('.')
            && self.peek_second().map_or(false, |c| c.is_ascii_digit());
        if is_float {
            text.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                text.push(c);
                self.bump();
            }
            return match text.parse::<f64>() {
                Ok(v) => TokenKind::Float(v),
                Err(_) => self.invalid_number(&text, start),
            };
        }

        match text.parse::<i64>() {
            Ok(v) => TokenKind::Int(v),
            Err(_) => self.invalid_number(&text, start),
        }
    }

    fn invalid_number(&mut self, text: &str, start: Position) -> TokenKind {
        self.diagnostics.push(Diagnostic::syntax(
            codes::INVALID_NUMBER,
            format!("Integral constant '{}' is too large", text),
            Span::new(start, self.pos),
        ));
        TokenKind::Int(0)
    }

    fn string(&mut self, start: Position) -> TokenKind {
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.diagnostics.push(Diagnostic::syntax(
                        codes::UNTERMINATED_STRING,
                        "Newline in constant",
                        Span::new(start, self.pos),
                    ));
                    break;
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    let escape_start = self.pos;
                    self.bump();
                    match self.escape() {
                        Some(c) => value.push(c),
                        None => self.diagnostics.push(Diagnostic::syntax(
                            codes::INVALID_ESCAPE,
                            "Unrecognized escape sequence",
                            Span::new(escape_start, self.pos),
                        )),
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
        TokenKind::Str(value)
    }

    fn escape(&mut self) -> Option<char> {
        match self.peek()? {
            '\n' => None,
            'n' => self.bump().map(|_| '\n'),
            't' => self.bump().map(|_| '\t'),
            'r' => self.bump().map(|_| '\r'),
            '0' => self.bump().map(|_| '\0'),
            '\\' => self.bump().map(|_| '\\'),
            '"' => self.bump().map(|_| '"'),
            'u' => {
                self.bump();
                if !self.eat('{') {
                    return None;
                }
                let mut hex = String::new();
                while let Some(c) = self.peek() {
                    if c == '}' || hex.len() > 6 {
                        break;
                    }
                    hex.push(c);
                    self.bump();
                }
                if !self.eat('}') {
                    return None;
                }
                u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
            }
            _ => {
                self.bump();
                None
            }
        }
    }
}
