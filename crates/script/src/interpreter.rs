//! Tree-walking interpreter for checked programs
//!
//! An [`Interpreter`] borrows a program and its reference surface for the
//! duration of one host call. Constants are evaluated once by
//! [`Interpreter::new`]; later calls reuse them through
//! [`Interpreter::resume`]. Connector state lives in an [`Instance`] owned
//! by the caller.

use std::borrow::Cow;
use std::collections::HashSet;
use std::mem;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::ast::*;
use crate::diagnostics::Span;
use crate::surface::{CallContext, NativeError, ReferenceSurface, ScriptHost};
use crate::value;

/// Call depth used when the host does not configure one
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// What went wrong while running a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    Failure,
    Cancelled,
    StackOverflow,
}

/// Error raised while executing script code
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}{}", location_suffix(.span))]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

fn location_suffix(span: &Option<Span>) -> String {
    match span {
        Some(span) => format!(
            " (line {}, column {})",
            span.start.line + 1,
            span.start.column + 1
        ),
        None => String::new(),
    }
}

impl RuntimeError {
    pub fn failure(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            kind: RuntimeErrorKind::Failure,
            message: message.into(),
            span,
        }
    }

    pub fn cancelled(span: Option<Span>) -> Self {
        Self {
            kind: RuntimeErrorKind::Cancelled,
            message: "Operation cancelled".to_string(),
            span,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == RuntimeErrorKind::Cancelled
    }
}

type RunResult<T> = Result<T, RuntimeError>;

/// State of one constructed connector
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    connector: String,
    fields: Map<String, Value>,
}

impl Instance {
    /// Name of the connector declaration this instance was built from
    pub fn connector(&self) -> &str {
        &self.connector
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

struct This<'a> {
    connector: &'a ConnectorDecl,
    fields: Map<String, Value>,
}

pub struct Interpreter<'a> {
    program: &'a Program,
    surface: &'a ReferenceSurface,
    host: &'a dyn ScriptHost,
    imports: HashSet<&'a str>,
    globals: Cow<'a, Map<String, Value>>,
    scopes: Vec<Vec<(String, Value)>>,
    this: Option<This<'a>>,
    depth: usize,
    max_depth: usize,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter and evaluate the program's constants in order
    pub fn new(
        program: &'a Program,
        surface: &'a ReferenceSurface,
        host: &'a dyn ScriptHost,
        max_depth: usize,
    ) -> RunResult<Self> {
        let mut interpreter = Self::with_globals(
            program,
            surface,
            host,
            Cow::Owned(Map::new()),
            max_depth,
        );
        for constant in program.constants() {
            let value = interpreter.eval(&constant.value)?;
            interpreter
                .globals
                .to_mut()
                .insert(constant.name.name.clone(), value);
        }
        Ok(interpreter)
    }

    /// Create an interpreter over constants computed by an earlier [`Interpreter::new`]
    pub fn resume(
        program: &'a Program,
        surface: &'a ReferenceSurface,
        host: &'a dyn ScriptHost,
        globals: &'a Map<String, Value>,
        max_depth: usize,
    ) -> Self {
        Self::with_globals(program, surface, host, Cow::Borrowed(globals), max_depth)
    }

    fn with_globals(
        program: &'a Program,
        surface: &'a ReferenceSurface,
        host: &'a dyn ScriptHost,
        globals: Cow<'a, Map<String, Value>>,
        max_depth: usize,
    ) -> Self {
        let mut imports: HashSet<&'a str> = program.uses().map(|u| u.module.name.as_str()).collect();
        imports.insert(ReferenceSurface::CORE);
        Self {
            program,
            surface,
            host,
            imports,
            globals,
            scopes: Vec::new(),
            this: None,
            depth: 0,
            max_depth,
        }
    }

    pub fn globals(&self) -> &Map<String, Value> {
        &self.globals
    }

    pub fn into_globals(self) -> Map<String, Value> {
        self.globals.into_owned()
    }

    /// Construct connector `name`, running property initialisers from the
    /// outermost base down so subclasses override inherited values
    pub fn instantiate(&mut self, name: &str) -> RunResult<Instance> {
        let program = self.program;
        let connector = program
            .connector(name)
            .ok_or_else(|| RuntimeError::failure(format!("Unknown connector '{}'", name), None))?;
        if connector.is_abstract {
            return Err(RuntimeError::failure(
                format!("Connector '{}' is abstract", name),
                Some(connector.name.span),
            ));
        }

        let mut fields = Map::new();
        for decl in program.connector_chain(connector).into_iter().rev() {
            for property in decl.properties() {
                let value = self.eval(&property.value)?;
                fields.insert(property.name.name.clone(), value);
            }
        }
        tracing::debug!(connector = name, fields = fields.len(), "instantiated connector");

        Ok(Instance {
            connector: name.to_string(),
            fields,
        })
    }

    /// Whether the instance's connector declares (or inherits) method `name`
    pub fn has_method(&self, instance: &Instance, name: &str) -> bool {
        self.program
            .connector(&instance.connector)
            .and_then(|c| self.program.find_method(c, name))
            .is_some()
    }

    /// Call method `name` on `instance`; `Ok(None)` when the method is not declared
    pub fn invoke(
        &mut self,
        instance: &mut Instance,
        name: &str,
        args: Vec<Value>,
    ) -> RunResult<Option<Value>> {
        let program = self.program;
        let connector = program.connector(&instance.connector).ok_or_else(|| {
            RuntimeError::failure(format!("Unknown connector '{}'", instance.connector), None)
        })?;
        let Some(method) = program.find_method(connector, name) else {
            return Ok(None);
        };

        let previous = self.this.replace(This {
            connector,
            fields: mem::take(&mut instance.fields),
        });
        let result = self.call_user(method, args, None);
        if let Some(this) = mem::replace(&mut self.this, previous) {
            instance.fields = this.fields;
        }
        result.map(Some)
    }

    /// Call a top-level function
    pub fn call_function(&mut self, name: &str, args: Vec<Value>) -> RunResult<Value> {
        let function = self
            .program
            .function(name)
            .ok_or_else(|| RuntimeError::failure(format!("Unknown function '{}'", name), None))?;
        self.call_user(function, args, None)
    }

    fn check_cancelled(&self, span: Span) -> RunResult<()> {
        if self.host.is_cancelled() {
            Err(RuntimeError::cancelled(Some(span)))
        } else {
            Ok(())
        }
    }

    fn call_user(&mut self, function: &'a FunctionDecl, args: Vec<Value>, span: Option<Span>) -> RunResult<Value> {
        let span = span.unwrap_or(function.name.span);
        self.check_cancelled(span)?;
        if args.len() != function.params.len() {
            return Err(RuntimeError::failure(
                format!(
                    "'{}' takes {} argument(s) but {} were supplied",
                    function.name.name,
                    function.params.len(),
                    args.len()
                ),
                Some(span),
            ));
        }
        if self.depth >= self.max_depth {
            return Err(RuntimeError {
                kind: RuntimeErrorKind::StackOverflow,
                message: format!(
                    "Maximum call depth of {} exceeded in '{}'",
                    self.max_depth, function.name.name
                ),
                span: Some(span),
            });
        }

        let params: Vec<(String, Value)> = function
            .params
            .iter()
            .map(|p| p.name.clone())
            .zip(args)
            .collect();
        let saved = mem::replace(&mut self.scopes, vec![params]);
        self.depth += 1;
        let flow = self.exec_stmts(&function.body.stmts);
        self.depth -= 1;
        self.scopes = saved;

        match flow? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Null),
        }
    }

    fn exec_block(&mut self, block: &'a Block) -> RunResult<Flow> {
        self.scopes.push(Vec::new());
        let flow = self.exec_stmts(&block.stmts);
        self.scopes.pop();
        flow
    }

    fn exec_stmts(&mut self, stmts: &'a [Stmt]) -> RunResult<Flow> {
        for stmt in stmts {
            match self.exec(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &'a Stmt) -> RunResult<Flow> {
        match &stmt.kind {
            StmtKind::Let { name, value } => {
                let value = self.eval(value)?;
                if let Some(scope) = self.scopes.last_mut() {
                    scope.push((name.name.clone(), value));
                }
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value)?;
                self.assign(target, value, stmt.span)?;
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                if value::is_truthy(&self.eval(cond)?) {
                    return self.exec_block(then_block);
                } else if let Some(else_block) = else_block {
                    return self.exec_block(else_block);
                }
            }
            StmtKind::While { cond, body } => loop {
                self.check_cancelled(stmt.span)?;
                if !value::is_truthy(&self.eval(cond)?) {
                    break;
                }
                match self.exec_block(body)? {
                    Flow::Break => break,
                    Flow::Return(value) => return Ok(Flow::Return(value)),
                    Flow::Normal | Flow::Continue => {}
                }
            },
            StmtKind::For {
                var,
                iterable,
                body,
            } => {
                let items = self.iteration_items(iterable)?;
                for item in items {
                    self.check_cancelled(stmt.span)?;
                    self.scopes.push(vec![(var.name.clone(), item)]);
                    let flow = self.exec_block(body);
                    self.scopes.pop();
                    match flow? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn iteration_items(&mut self, iterable: &'a Expr) -> RunResult<Vec<Value>> {
        match self.eval(iterable)? {
            Value::Array(items) => Ok(items),
            Value::Object(map) => Ok(map.into_iter().map(|(k, _)| Value::String(k)).collect()),
            Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            Value::Null => Ok(Vec::new()),
            other => Err(RuntimeError::failure(
                format!("Cannot iterate over {}", value::type_name(&other)),
                Some(iterable.span),
            )),
        }
    }

    fn assign(&mut self, target: &AssignTarget, value: Value, span: Span) -> RunResult<()> {
        match target {
            AssignTarget::Variable(name) => {
                for scope in self.scopes.iter_mut().rev() {
                    if let Some(slot) = scope.iter_mut().rev().find(|(n, _)| *n == name.name) {
                        slot.1 = value;
                        return Ok(());
                    }
                }
                Err(RuntimeError::failure(
                    format!("Unknown variable '{}'", name.name),
                    Some(span),
                ))
            }
            AssignTarget::SelfField(field) => match &mut self.this {
                Some(this) => {
                    this.fields.insert(field.name.clone(), value);
                    Ok(())
                }
                None => Err(RuntimeError::failure(
                    "'self' is not available here",
                    Some(span),
                )),
            },
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.iter().rev().find(|(n, _)| n == name).map(|(_, v)| v))
            .or_else(|| self.globals.get(name))
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.iter().any(|(n, _)| n == name))
    }

    fn eval(&mut self, expr: &'a Expr) -> RunResult<Value> {
        let span = Some(expr.span);
        match &expr.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Int(i) => Ok(Value::from(*i)),
            ExprKind::Float(f) => value::float(*f).map_err(|e| RuntimeError::failure(e, span)),
            ExprKind::Str(s) => Ok(Value::String(s.clone())),
            ExprKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::Array(values))
            }
            ExprKind::Map(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    let value = self.eval(value)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            ExprKind::Ident(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| RuntimeError::failure(format!("Unknown name '{}'", name), span)),
            ExprKind::SelfRef => match &self.this {
                Some(this) => Ok(Value::Object(this.fields.clone())),
                None => Err(RuntimeError::failure("'self' is not available here", span)),
            },
            ExprKind::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value::is_truthy(&operand))),
                    UnaryOp::Neg => value::negate(&operand).map_err(|e| RuntimeError::failure(e, span)),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                match op {
                    BinaryOp::And if !value::is_truthy(&lhs) => return Ok(Value::Bool(false)),
                    BinaryOp::Or if value::is_truthy(&lhs) => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let rhs = self.eval(rhs)?;
                value::binary(*op, &lhs, &rhs).map_err(|e| RuntimeError::failure(e, span))
            }
            ExprKind::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.call(callee, values, expr.span)
            }
            ExprKind::Member { object, name } => {
                if matches!(object.kind, ExprKind::SelfRef) {
                    return match &self.this {
                        Some(this) => Ok(this.fields.get(&name.name).cloned().unwrap_or(Value::Null)),
                        None => Err(RuntimeError::failure("'self' is not available here", span)),
                    };
                }
                match self.eval(object)? {
                    Value::Object(mut map) => Ok(map.remove(&name.name).unwrap_or(Value::Null)),
                    other => Err(RuntimeError::failure(
                        format!(
                            "Cannot read '{}' of {}",
                            name.name,
                            value::type_name(&other)
                        ),
                        Some(name.span),
                    )),
                }
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                value::index(&object, &index).map_err(|e| RuntimeError::failure(e, span))
            }
        }
    }

    fn call(&mut self, callee: &'a Expr, args: Vec<Value>, span: Span) -> RunResult<Value> {
        let program = self.program;
        match &callee.kind {
            ExprKind::Ident(name) => {
                if let Some(function) = program.function(name) {
                    return self.call_user(function, args, Some(span));
                }
                if self.surface.core_function(name).is_some() {
                    return self.call_native(ReferenceSurface::CORE, name, args, span);
                }
                Err(RuntimeError::failure(
                    format!("'{}' is not a function", name),
                    Some(callee.span),
                ))
            }
            ExprKind::Member { object, name } => match &object.kind {
                ExprKind::SelfRef => {
                    let method = self
                        .this
                        .as_ref()
                        .and_then(|this| program.find_method(this.connector, &name.name))
                        .ok_or_else(|| {
                            RuntimeError::failure(
                                format!("Unknown method '{}'", name.name),
                                Some(name.span),
                            )
                        })?;
                    self.call_user(method, args, Some(span))
                }
                ExprKind::Ident(module) if !self.is_local(module) && self.imports.contains(module.as_str()) => {
                    self.call_native(module, &name.name, args, span)
                }
                _ => Err(RuntimeError::failure(
                    format!("'{}' is not a function", name.name),
                    Some(name.span),
                )),
            },
            _ => Err(RuntimeError::failure("Expression is not callable", Some(callee.span))),
        }
    }

    fn call_native(&mut self, module: &str, name: &str, args: Vec<Value>, span: Span) -> RunResult<Value> {
        self.check_cancelled(span)?;
        let function = self
            .surface
            .module(module)
            .and_then(|m| m.function(name))
            .ok_or_else(|| {
                RuntimeError::failure(format!("Unknown function '{}.{}'", module, name), Some(span))
            })?;
        if !function.accepts(args.len()) {
            return Err(RuntimeError::failure(
                format!(
                    "'{}' takes {} argument(s) but {} were supplied",
                    name,
                    function.arity(),
                    args.len()
                ),
                Some(span),
            ));
        }
        (function.call)(&CallContext::new(self.host), &args).map_err(|e| match e {
            NativeError::Cancelled => RuntimeError::cancelled(Some(span)),
            NativeError::Failure(message) => RuntimeError::failure(message, Some(span)),
        })
    }
}
