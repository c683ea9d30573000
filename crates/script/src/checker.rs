//! Semantic checks against a reference surface
//!
//! The checker resolves every name a program uses. Module functions must be
//! listed by the [`ReferenceSurface`] and imported with `use`; everything
//! else must be declared in the script itself.

use std::collections::{HashMap, HashSet};

use crate::ast::*;
use crate::diagnostics::{codes, Diagnostic, Span};
use crate::surface::ReferenceSurface;

/// Check `program` and return semantic diagnostics ordered by position
pub fn check(program: &Program, surface: &ReferenceSurface) -> Vec<Diagnostic> {
    let mut checker = Checker::new(program, surface);
    checker.run();
    let mut diagnostics = checker.diagnostics;
    diagnostics.sort_by_key(|d| d.span.start);
    diagnostics
}

struct Import {
    span: Span,
    used: bool,
}

struct Local {
    name: String,
    span: Span,
    used: bool,
    warn_unused: bool,
}

struct Checker<'a> {
    program: &'a Program,
    surface: &'a ReferenceSurface,
    diagnostics: Vec<Diagnostic>,
    imports: HashMap<String, Import>,
    all_consts: HashSet<&'a str>,
    defined_consts: HashSet<&'a str>,
    scopes: Vec<Vec<Local>>,
    loop_depth: usize,
    connector: Option<&'a ConnectorDecl>,
}

impl<'a> Checker<'a> {
    fn new(program: &'a Program, surface: &'a ReferenceSurface) -> Self {
        Self {
            program,
            surface,
            diagnostics: Vec::new(),
            imports: HashMap::new(),
            all_consts: program.constants().map(|c| c.name.name.as_str()).collect(),
            defined_consts: HashSet::new(),
            scopes: Vec::new(),
            loop_depth: 0,
            connector: None,
        }
    }

    fn error(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::error(code, message, span));
    }

    fn warning(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::warning(code, message, span));
    }

    fn run(&mut self) {
        self.collect_imports();
        self.check_duplicate_items();

        let program = self.program;
        for constant in program.constants() {
            self.expr(&constant.value);
            self.defined_consts.insert(constant.name.name.as_str());
        }
        for function in program.functions() {
            self.function(function);
        }
        for connector in program.connectors() {
            self.connector(connector);
        }

        let mut unused: Vec<(&String, Span)> = self
            .imports
            .iter()
            .filter(|(name, import)| !import.used && name.as_str() != ReferenceSurface::CORE)
            .map(|(name, import)| (name, import.span))
            .collect();
        unused.sort_by_key(|(_, span)| span.start);
        let unused: Vec<Diagnostic> = unused
            .into_iter()
            .map(|(name, span)| {
                Diagnostic::info(
                    codes::UNUSED_IMPORT,
                    format!("Module '{}' is imported but never used", name),
                    span,
                )
            })
            .collect();
        self.diagnostics.extend(unused);
    }

    fn collect_imports(&mut self) {
        for decl in self.program.uses() {
            let name = &decl.module.name;
            if self.surface.module(name).is_none() {
                self.error(
                    codes::MODULE_NOT_AVAILABLE,
                    format!("Module '{}' is not available to connector scripts", name),
                    decl.module.span,
                );
                continue;
            }
            if self.imports.contains_key(name) {
                self.warning(
                    codes::DUPLICATE_IMPORT,
                    format!("Module '{}' is already imported", name),
                    decl.module.span,
                );
                continue;
            }
            self.imports.insert(
                name.clone(),
                Import {
                    span: decl.module.span,
                    used: false,
                },
            );
        }
    }

    fn check_duplicate_items(&mut self) {
        let mut seen: HashSet<&str> = HashSet::new();
        let program = self.program;
        for item in &program.items {
            let name = match item {
                Item::Use(_) => continue,
                Item::Const(c) => &c.name,
                Item::Function(f) => &f.name,
                Item::Connector(c) => &c.name,
            };
            if !seen.insert(name.name.as_str()) {
                self.error(
                    codes::DUPLICATE_DEFINITION,
                    format!("'{}' is defined more than once", name.name),
                    name.span,
                );
            }
        }
    }

    fn function(&mut self, function: &'a FunctionDecl) {
        let mut params: Vec<Local> = Vec::new();
        for param in &function.params {
            if params.iter().any(|p| p.name == param.name) {
                self.error(
                    codes::DUPLICATE_PARAMETER,
                    format!("Parameter '{}' is declared more than once", param.name),
                    param.span,
                );
                continue;
            }
            params.push(Local {
                name: param.name.clone(),
                span: param.span,
                used: false,
                warn_unused: false,
            });
        }

        self.scopes.push(params);
        self.loop_depth = 0;
        self.block_stmts(&function.body);
        self.pop_scope();
    }

    fn connector(&mut self, connector: &'a ConnectorDecl) {
        let mut seen: HashSet<&str> = HashSet::new();
        for member in &connector.members {
            let name = member.name();
            if !seen.insert(name.name.as_str()) {
                self.error(
                    codes::DUPLICATE_DEFINITION,
                    format!(
                        "Member '{}' is defined more than once in connector '{}'",
                        name.name, connector.name.name
                    ),
                    name.span,
                );
            }
        }

        self.check_base(connector);

        for property in connector.properties() {
            self.expr(&property.value);
        }

        let contract = self.surface.contract();
        for method in connector.methods() {
            if let Some(shape) = contract.method(&method.name.name) {
                if shape.params.len() != method.params.len() {
                    self.error(
                        codes::SIGNATURE_MISMATCH,
                        format!(
                            "Method '{}' must take {} parameter(s) ({}), found {}",
                            shape.name,
                            shape.params.len(),
                            shape.params.join(", "),
                            method.params.len()
                        ),
                        method.name.span,
                    );
                }
            }
        }

        if !connector.is_abstract {
            self.check_required_members(connector);
        }

        self.connector = Some(connector);
        for method in connector.methods() {
            self.function(method);
        }
        self.connector = None;
    }

    fn check_base(&mut self, connector: &'a ConnectorDecl) {
        let Some(base) = &connector.base else {
            return;
        };
        if self.program.connector(&base.name).is_none() {
            self.error(
                codes::UNKNOWN_BASE,
                format!("Unknown base connector '{}'", base.name),
                base.span,
            );
            return;
        }

        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(connector.name.name.as_str());
        let mut current = connector;
        while let Some(next) = current
            .base
            .as_ref()
            .and_then(|b| self.program.connector(&b.name))
        {
            if !visited.insert(next.name.name.as_str()) {
                if next.name.name == connector.name.name {
                    self.error(
                        codes::CYCLIC_BASE,
                        format!(
                            "Connector '{}' inherits from itself",
                            connector.name.name
                        ),
                        base.span,
                    );
                }
                return;
            }
            current = next;
        }
    }

    fn check_required_members(&mut self, connector: &'a ConnectorDecl) {
        let program = self.program;
        let contract = self.surface.contract();
        for property in &contract.required_properties {
            if !program.has_property(connector, property) {
                self.error(
                    codes::MISSING_MEMBER,
                    format!(
                        "Connector '{}' does not declare required property '{}'",
                        connector.name.name, property
                    ),
                    connector.name.span,
                );
            }
        }
        for method in contract.required_methods() {
            if program.find_method(connector, method.name).is_none() {
                self.error(
                    codes::MISSING_MEMBER,
                    format!(
                        "Connector '{}' does not implement required method '{}({})'",
                        connector.name.name,
                        method.name,
                        method.params.join(", ")
                    ),
                    connector.name.span,
                );
            }
        }
    }

    fn pop_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        for local in scope {
            if local.warn_unused && !local.used && !local.name.starts_with('_') {
                self.warning(
                    codes::UNUSED_VARIABLE,
                    format!("Variable '{}' is never used", local.name),
                    local.span,
                );
            }
        }
    }

    fn declare(&mut self, name: &Ident) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(Local {
                name: name.name.clone(),
                span: name.span,
                used: false,
                warn_unused: true,
            });
        }
    }

    /// Mark a local as used; false when no local has that name
    fn use_local(&mut self, name: &str) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(local) = scope.iter_mut().rev().find(|l| l.name == name) {
                local.used = true;
                return true;
            }
        }
        false
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.iter().any(|l| l.name == name))
    }

    fn block(&mut self, block: &'a Block) {
        self.scopes.push(Vec::new());
        self.block_stmts(block);
        self.pop_scope();
    }

    fn block_stmts(&mut self, block: &'a Block) {
        let mut diverged = false;
        for stmt in &block.stmts {
            if diverged {
                self.warning(codes::UNREACHABLE_CODE, "Unreachable code", stmt.span);
                diverged = false;
            }
            self.stmt(stmt);
            if stmt.kind.diverges() {
                diverged = true;
            }
        }
    }

    fn stmt(&mut self, stmt: &'a Stmt) {
        match &stmt.kind {
            StmtKind::Let { name, value } => {
                self.expr(value);
                self.declare(name);
            }
            StmtKind::Assign { target, value } => {
                self.expr(value);
                self.assign_target(target);
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.expr(cond);
                self.block(then_block);
                if let Some(else_block) = else_block {
                    self.block(else_block);
                }
            }
            StmtKind::While { cond, body } => {
                self.expr(cond);
                self.loop_depth += 1;
                self.block(body);
                self.loop_depth -= 1;
            }
            StmtKind::For {
                var,
                iterable,
                body,
            } => {
                self.expr(iterable);
                self.loop_depth += 1;
                self.scopes.push(Vec::new());
                self.declare(var);
                self.block(body);
                self.pop_scope();
                self.loop_depth -= 1;
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    let keyword = if matches!(stmt.kind, StmtKind::Break) {
                        "break"
                    } else {
                        "continue"
                    };
                    self.error(
                        codes::LOOP_CONTROL_OUTSIDE_LOOP,
                        format!("'{}' outside of a loop", keyword),
                        stmt.span,
                    );
                }
            }
            StmtKind::Expr(expr) => self.expr(expr),
        }
    }

    fn assign_target(&mut self, target: &AssignTarget) {
        match target {
            AssignTarget::Variable(name) => {
                if self.is_local(&name.name) {
                    return;
                }
                if self.all_consts.contains(name.name.as_str()) {
                    self.error(
                        codes::ASSIGN_TO_CONSTANT,
                        format!("Cannot assign to constant '{}'", name.name),
                        name.span,
                    );
                } else {
                    self.error(
                        codes::UNKNOWN_NAME,
                        format!(
                            "Assignment to undeclared variable '{}'; declare it with 'let'",
                            name.name
                        ),
                        name.span,
                    );
                }
            }
            AssignTarget::SelfField(field) => {
                let Some(connector) = self.connector else {
                    self.error(
                        codes::SELF_OUTSIDE_CONNECTOR,
                        "'self' is only available inside connector methods",
                        field.span,
                    );
                    return;
                };
                if self.program.find_method(connector, &field.name).is_some() {
                    self.error(
                        codes::UNKNOWN_MEMBER,
                        format!("Cannot assign to method '{}'", field.name),
                        field.span,
                    );
                } else if !self.known_property(connector, &field.name) {
                    self.error(
                        codes::UNKNOWN_MEMBER,
                        format!(
                            "Connector '{}' has no property '{}'; declare it as a member first",
                            connector.name.name, field.name
                        ),
                        field.span,
                    );
                }
            }
        }
    }

    /// Properties visible through `self`; abstract connectors may also use
    /// contract members their subclasses provide
    fn known_property(&self, connector: &ConnectorDecl, name: &str) -> bool {
        let contract = self.surface.contract();
        self.program.has_property(connector, name)
            || (connector.is_abstract
                && contract
                    .required_properties
                    .iter()
                    .chain(&contract.optional_properties)
                    .any(|p| *p == name))
    }

    fn known_method(&self, connector: &ConnectorDecl, name: &str) -> Option<usize> {
        if let Some(method) = self.program.find_method(connector, name) {
            return Some(method.params.len());
        }
        if connector.is_abstract {
            return self.surface.contract().method(name).map(|m| m.params.len());
        }
        None
    }

    fn expr(&mut self, expr: &'a Expr) {
        match &expr.kind {
            ExprKind::Null
            | ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_) => {}
            ExprKind::List(items) => {
                for item in items {
                    self.expr(item);
                }
            }
            ExprKind::Map(entries) => {
                for (_, value) in entries {
                    self.expr(value);
                }
            }
            ExprKind::Ident(name) => self.ident_value(name, expr.span),
            ExprKind::SelfRef => {
                if self.connector.is_none() {
                    self.error(
                        codes::SELF_OUTSIDE_CONNECTOR,
                        "'self' is only available inside connector methods",
                        expr.span,
                    );
                }
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Call { callee, args } => {
                for arg in args {
                    self.expr(arg);
                }
                self.call(callee, args.len(), expr.span);
            }
            ExprKind::Member { object, name } => self.member_value(object, name),
            ExprKind::Index { object, index } => {
                self.expr(object);
                self.expr(index);
            }
        }
    }

    fn module_name(&self, name: &str) -> bool {
        self.surface.module(name).is_some()
    }

    fn ident_value(&mut self, name: &str, span: Span) {
        if self.use_local(name) || self.defined_consts.contains(name) {
            return;
        }
        let message = if self.all_consts.contains(name) {
            format!("Constant '{}' is used before its declaration", name)
        } else if self.program.function(name).is_some() || self.surface.core_function(name).is_some() {
            format!("Function '{}' can only be called", name)
        } else if self.module_name(name) {
            format!("Module '{}' can only be used to call its functions", name)
        } else {
            format!("Unknown name '{}'", name)
        };
        self.error(codes::UNKNOWN_NAME, message, span);
    }

    fn member_value(&mut self, object: &'a Expr, name: &Ident) {
        match &object.kind {
            ExprKind::SelfRef => {
                self.expr(object);
                let Some(connector) = self.connector else {
                    return;
                };
                if self.known_property(connector, &name.name) {
                    return;
                }
                let message = if self.known_method(connector, &name.name).is_some() {
                    format!("Method '{}' can only be called", name.name)
                } else {
                    format!(
                        "Connector '{}' has no member '{}'",
                        connector.name.name, name.name
                    )
                };
                self.error(codes::UNKNOWN_MEMBER, message, name.span);
            }
            ExprKind::Ident(module)
                if !self.is_local(module)
                    && !self.all_consts.contains(module.as_str())
                    && self.module_name(module) =>
            {
                self.mark_import(module);
                self.error(
                    codes::NOT_CALLABLE,
                    format!("Module function '{}.{}' must be called", module, name.name),
                    name.span,
                );
            }
            _ => self.expr(object),
        }
    }

    fn mark_import(&mut self, module: &str) {
        if let Some(import) = self.imports.get_mut(module) {
            import.used = true;
        }
    }

    fn argument_count(&mut self, what: String, expected: String, found: usize, span: Span) {
        self.error(
            codes::ARGUMENT_COUNT,
            format!("{} takes {} argument(s) but {} were supplied", what, expected, found),
            span,
        );
    }

    fn call(&mut self, callee: &'a Expr, count: usize, span: Span) {
        match &callee.kind {
            ExprKind::Ident(name) => self.call_function(name, count, callee.span, span),
            ExprKind::Member { object, name } => match &object.kind {
                ExprKind::SelfRef => {
                    self.expr(object);
                    self.call_method(name, count, span);
                }
                ExprKind::Ident(module) if !self.is_local(module) && !self.all_consts.contains(module.as_str()) => {
                    self.call_module(module, name, count, object.span, span)
                }
                _ => {
                    self.expr(object);
                    self.error(
                        codes::NOT_CALLABLE,
                        format!("'{}' is not a function; values have no methods", name.name),
                        name.span,
                    );
                }
            },
            _ => {
                self.expr(callee);
                self.error(codes::NOT_CALLABLE, "Expression is not callable", callee.span);
            }
        }
    }

    fn call_function(&mut self, name: &str, count: usize, name_span: Span, span: Span) {
        if let Some(function) = self.program.function(name) {
            if function.params.len() != count {
                self.argument_count(
                    format!("Function '{}'", name),
                    function.params.len().to_string(),
                    count,
                    span,
                );
            }
            return;
        }
        if let Some(native) = self.surface.core_function(name) {
            if !native.accepts(count) {
                self.argument_count(format!("Function '{}'", name), native.arity(), count, span);
            }
            return;
        }
        if self.use_local(name) || self.all_consts.contains(name) {
            self.error(
                codes::NOT_CALLABLE,
                format!("'{}' is a value, not a function", name),
                name_span,
            );
            return;
        }
        self.error(
            codes::UNKNOWN_NAME,
            format!("Unknown function '{}'", name),
            name_span,
        );
    }

    fn call_module(&mut self, module: &str, name: &Ident, count: usize, module_span: Span, span: Span) {
        let Some(native_module) = self.surface.module(module) else {
            self.error(
                codes::UNKNOWN_NAME,
                format!("Unknown name '{}'", module),
                module_span,
            );
            return;
        };
        if module != ReferenceSurface::CORE && !self.imports.contains_key(module) {
            self.error(
                codes::MODULE_NOT_IMPORTED,
                format!("Module '{}' is used without 'use {};'", module, module),
                module_span,
            );
        }
        self.mark_import(module);

        match native_module.function(&name.name) {
            Some(function) => {
                if !function.accepts(count) {
                    self.argument_count(
                        format!("Function '{}.{}'", module, name.name),
                        function.arity(),
                        count,
                        span,
                    );
                }
            }
            None => self.error(
                codes::UNKNOWN_MODULE_MEMBER,
                format!("Module '{}' has no function '{}'", module, name.name),
                name.span,
            ),
        }
    }

    fn call_method(&mut self, name: &Ident, count: usize, span: Span) {
        let Some(connector) = self.connector else {
            return;
        };
        match self.known_method(connector, &name.name) {
            Some(params) if params != count => self.argument_count(
                format!("Method '{}'", name.name),
                params.to_string(),
                count,
                span,
            ),
            Some(_) => {}
            None if self.known_property(connector, &name.name) => self.error(
                codes::NOT_CALLABLE,
                format!("Property '{}' is not a method", name.name),
                name.span,
            ),
            None => self.error(
                codes::UNKNOWN_MEMBER,
                format!(
                    "Connector '{}' has no method '{}'",
                    connector.name.name, name.name
                ),
                name.span,
            ),
        }
    }
}
