//! Syntax tree for connector scripts

use crate::diagnostics::Span;

/// Identifier with its location
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// A parsed script
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    /// `use` directives in declaration order
    pub fn uses(&self) -> impl Iterator<Item = &UseDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Use(u) => Some(u),
            _ => None,
        })
    }

    /// Top-level constants in declaration order
    pub fn constants(&self) -> impl Iterator<Item = &ConstDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Const(c) => Some(c),
            _ => None,
        })
    }

    /// Top-level functions in declaration order
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(f) => Some(f),
            _ => None,
        })
    }

    /// Connector declarations in declaration order
    pub fn connectors(&self) -> impl Iterator<Item = &ConnectorDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Connector(c) => Some(c),
            _ => None,
        })
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions().find(|f| f.name.name == name)
    }

    pub fn connector(&self, name: &str) -> Option<&ConnectorDecl> {
        self.connectors().find(|c| c.name.name == name)
    }

    /// First connector that can be instantiated
    pub fn first_concrete_connector(&self) -> Option<&ConnectorDecl> {
        self.connectors().find(|c| !c.is_abstract)
    }

    /// `connector` followed by its bases, stopping at unknown or repeated names
    pub fn connector_chain<'a>(&'a self, connector: &'a ConnectorDecl) -> Vec<&'a ConnectorDecl> {
        let mut chain = vec![connector];
        let mut current = connector;
        while let Some(base) = &current.base {
            match self.connector(&base.name) {
                Some(next) if !chain.iter().any(|c| c.name.name == next.name.name) => {
                    chain.push(next);
                    current = next;
                }
                _ => break,
            }
        }
        chain
    }

    /// Method `name` on `connector` or the nearest base declaring it
    pub fn find_method<'a>(&'a self, connector: &'a ConnectorDecl, name: &str) -> Option<&'a FunctionDecl> {
        self.connector_chain(connector)
            .into_iter()
            .find_map(|c| c.method(name))
    }

    /// Whether `connector` or one of its bases declares property `name`
    pub fn has_property(&self, connector: &ConnectorDecl, name: &str) -> bool {
        self.connector_chain(connector)
            .into_iter()
            .any(|c| c.property(name).is_some())
    }
}

/// Top-level item
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Use(UseDecl),
    Const(ConstDecl),
    Function(FunctionDecl),
    Connector(ConnectorDecl),
}

/// `use module;`
#[derive(Debug, Clone, PartialEq)]
pub struct UseDecl {
    pub module: Ident,
    pub span: Span,
}

/// `const NAME = expr;`
#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

/// `fn name(params) { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Block,
    pub span: Span,
}

/// `abstract? connector Name extends Base { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorDecl {
    pub name: Ident,
    pub is_abstract: bool,
    pub base: Option<Ident>,
    pub members: Vec<Member>,
    pub span: Span,
}

impl ConnectorDecl {
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Property(p) => Some(p),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(f) => Some(f),
            _ => None,
        })
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDecl> {
        self.properties().find(|p| p.name.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&FunctionDecl> {
        self.methods().find(|f| f.name.name == name)
    }
}

/// Connector member
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Property(PropertyDecl),
    Method(FunctionDecl),
}

impl Member {
    pub fn name(&self) -> &Ident {
        match self {
            Member::Property(p) => &p.name,
            Member::Method(f) => &f.name,
        }
    }
}

/// `name = expr;` inside a connector
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let {
        name: Ident,
        value: Expr,
    },
    Assign {
        target: AssignTarget,
        value: Expr,
    },
    /// `else if` chains are nested as a block holding a single `If`
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    For {
        var: Ident,
        iterable: Expr,
        body: Block,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Expr(Expr),
}

impl StmtKind {
    /// Whether control never falls through to the next statement
    pub fn diverges(&self) -> bool {
        matches!(
            self,
            StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Variable(Ident),
    SelfField(Ident),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    Ident(String),
    SelfRef,
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        name: Ident,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}
