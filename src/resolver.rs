//! Static resolution pass for the Lox interpreter.
//!
//! This module performs a single AST walk to:
//! 1. **Build lexical scopes**: maintains a stack of `HashMap<String, bool>`
//!    tracking declared (false) and fully defined (true) names in each nested
//!    block or function.  The empty stack is the global scope; globals are
//!    deliberately not tracked, which is what lets the REPL define names
//!    incrementally.
//! 2. **Enforce static rules**: redeclaration in the same local scope, reading
//!    a variable in its own initializer, `return` outside a function,
//!    returning a value from an initializer, and the `this`/`super` placement
//!    rules.
//! 3. **Record binding distances**: every variable occurrence (`Variable`,
//!    `Assign`, `This`, `Super`) is reported back to the interpreter with the
//!    number of enclosing frames to hop at runtime.  Unreported occurrences
//!    are globals.
//!
//! Class bodies manufacture two implicit scopes: one holding `"super"` (only
//! when the class has a superclass) and, inside it, one holding `"this"`.
//! The evaluator builds the matching environment frames when it declares the
//! class and binds its methods, so the distances recorded here line up
//! exactly.
//!
//! Resolution halts on the first static error.

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;

/// What kind of function body we are inside.  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'a, W: Write> {
    interpreter: &'a mut Interpreter<W>,
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'a, W: Write> Resolver<'a, W> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'a mut Interpreter<W>) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top‑level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<()> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s)?;
                }

                self.end_scope();
            }

            Stmt::Var {
                name,
                initializer,
                line,
            } => {
                // Declared first so the initializer can be caught reading the
                // half-born variable.
                self.declare(name, *line)?;

                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }

                self.define(name);
            }

            Stmt::Function(decl) => {
                // Declared and defined before the body so the function can
                // recurse by name.
                self.declare(&decl.name, decl.line)?;
                self.define(&decl.name);

                self.resolve_function(FunctionType::Function, decl)?;
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb)?;
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(body)?;
            }

            Stmt::Return { value, line } => {
                if self.current_function == FunctionType::None {
                    return Err(LoxError::resolve(
                        *line,
                        "Can't return from top-level code.",
                    ));
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        return Err(LoxError::resolve(
                            *line,
                            "Can't return a value from an initializer.",
                        ));
                    }

                    self.resolve_expr(expr)?;
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                line,
            } => self.resolve_class(name, superclass.as_ref(), methods, *line)?,
        }

        Ok(())
    }

    fn resolve_class(
        &mut self,
        name: &str,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
        line: usize,
    ) -> Result<()> {
        let enclosing_class: ClassType = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name, line)?;
        self.define(name);

        if let Some(super_expr) = superclass {
            if let Expr::Variable {
                name: super_name,
                line: super_line,
                ..
            } = super_expr
            {
                if super_name == name {
                    self.current_class = enclosing_class;

                    return Err(LoxError::resolve(
                        *super_line,
                        "A class can't inherit from itself.",
                    ));
                }
            }

            self.current_class = ClassType::Subclass;

            self.resolve_expr(super_expr)?;

            // Implicit scope holding `super` for every method closure.
            self.begin_scope();
            if let Some(scope) = self.scopes.last_mut() {
                scope.insert("super".to_string(), true);
            }
        }

        // Implicit scope holding `this`; method bodies sit inside it.
        self.begin_scope();
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert("this".to_string(), true);
        }

        for method in methods {
            let kind: FunctionType = if method.name == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            self.resolve_function(kind, method)?;
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner)?;
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right)?;
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Variable { id, name, line } => {
                // Reading a variable inside its own initializer is the one
                // case where "declared but not defined" is observable.
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name) == Some(&false) {
                        return Err(LoxError::resolve(
                            *line,
                            format!(
                                "Can't read local variable '{}' in its own initializer.",
                                name
                            ),
                        ));
                    }
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign {
                id, name, value, ..
            } => {
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;

                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
            }

            Expr::Get { object, .. } => {
                self.resolve_expr(object)?;
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object)?;
                self.resolve_expr(value)?;
            }

            Expr::This { id, line } => {
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        *line,
                        "Can't use 'this' outside of a class.",
                    ));
                }

                self.resolve_local(*id, "this");
            }

            Expr::Super { id, line, .. } => {
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        *line,
                        "Can't use 'super' outside of a class.",
                    ));
                }

                if self.current_class != ClassType::Subclass {
                    return Err(LoxError::resolve(
                        *line,
                        "Can't use 'super' in a class with no superclass.",
                    ));
                }

                self.resolve_local(*id, "super");
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function’s parameters + body.
    ///
    /// `kind` distinguishes plain functions, methods and initializers so that
    /// `return` checks see the right context.
    fn resolve_function(&mut self, kind: FunctionType, decl: &FunctionDecl) -> Result<()> {
        let enclosing: FunctionType = self.current_function;
        self.current_function = kind;

        self.begin_scope();

        for param in &decl.params {
            self.declare(param, decl.line)?;
            self.define(param);
        }

        for stmt in &decl.body {
            self.resolve_stmt(stmt)?;
        }

        self.end_scope();

        self.current_function = enclosing;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Mark `name` as declared (but not yet usable) in the innermost scope.
    /// No-op in the global scope, where redefinition is allowed.
    fn declare(&mut self, name: &str, line: usize) -> Result<()> {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name) {
                return Err(LoxError::resolve(
                    line,
                    "Already variable with this name in this scope.",
                ));
            }

            scope.insert(name.to_string(), false);
        }

        Ok(())
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at the depth where the name was
    /// found, innermost scope being depth 0.  Not found means global; globals
    /// are looked up by name at runtime and recorded nowhere.
    fn resolve_local(&mut self, id: ExprId, name: &str) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                debug!("Resolved '{}' at depth {}", name, depth);

                self.interpreter.note_local(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name);
    }
}
