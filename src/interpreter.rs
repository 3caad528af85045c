//! Tree-walking evaluator.
//!
//! Walks resolved statements against a chain of environments.  The
//! interpreter is stateful across calls to [`Interpreter::run`]: globals, the
//! resolver's binding-distance table and the expression-id watermark all
//! survive, which is what makes the REPL able to build on earlier lines.
//!
//! Output is written to a caller-supplied `Write` sink so tests can capture
//! exactly what `print` produced.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};
use std::mem;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::ast::{BinaryOp, Expr, ExprId, FunctionDecl, Literal, LogicalOp, Stmt, UnaryOp};
use crate::environment::Environment;
use crate::error::LoxError;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::value::{LoxClass, LoxFunction, LoxInstance, Value};

/// Non-local exits threaded through the walker.
///
/// `return` unwinds through any number of blocks up to the nearest function
/// call, where it is caught; runtime errors unwind all the way out.
pub(crate) enum Unwind {
    Return(Value),
    Error(LoxError),
}

impl From<LoxError> for Unwind {
    fn from(e: LoxError) -> Self {
        Unwind::Error(e)
    }
}

impl From<io::Error> for Unwind {
    fn from(e: io::Error) -> Self {
        Unwind::Error(LoxError::Io(e))
    }
}

pub struct Interpreter<W: Write> {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    /// Binding distances recorded by the resolver, keyed by expression id.
    /// Absence means the name resolves in globals.
    locals: HashMap<ExprId, usize>,
    /// Expression-id watermark handed to each parser so ids stay unique
    /// across REPL lines (stale `locals` entries must never be re-keyed).
    next_expr_id: ExprId,
    output: W,
}

impl<W: Write> Interpreter<W> {
    pub fn new(output: W) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        {
            let mut env = globals.borrow_mut();

            env.define(
                "clock",
                Value::NativeFunction {
                    name: "clock",
                    arity: 0,
                    func: native_clock,
                },
            );

            env.define(
                "char",
                Value::NativeFunction {
                    name: "char",
                    arity: 0,
                    func: native_char,
                },
            );

            env.define(
                "string",
                Value::NativeFunction {
                    name: "string",
                    arity: 0,
                    func: native_string,
                },
            );

            env.define(
                "number",
                Value::NativeFunction {
                    name: "number",
                    arity: 0,
                    func: native_number,
                },
            );
        }

        Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            next_expr_id: 0,
            output,
        }
    }

    /// Push one source unit through the whole pipeline:
    /// scan → parse → resolve → evaluate.
    ///
    /// Static failures come back as the full accumulated list; a runtime
    /// failure is always a single error.  Side effects that happened before a
    /// runtime failure are preserved.
    pub fn run(&mut self, source: &[u8]) -> Result<(), Vec<LoxError>> {
        let scanner: Scanner = Scanner::new(source.to_vec());
        let tokens = scanner.scan_tokens()?;

        let mut parser: Parser = Parser::new(tokens, self.next_expr_id);
        let statements = parser.parse()?;
        self.next_expr_id = parser.watermark();

        let mut resolver: Resolver<'_, W> = Resolver::new(self);
        resolver.resolve(&statements).map_err(|e| vec![e])?;

        self.interpret(&statements).map_err(|e| vec![e])
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), LoxError> {
        info!("Interpreting {} statement(s)", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}

                // The resolver rejects top-level `return`.
                Err(Unwind::Return(_)) => break,

                Err(Unwind::Error(e)) => return Err(e),
            }
        }

        Ok(())
    }

    /// Resolver callback: `id` binds at `depth` enclosing frames up.
    pub(crate) fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Noting local: id={}, depth={}", id, depth);

        self.locals.insert(id, depth);
    }

    /// Output sink accessor, mainly for tests that capture `print` output.
    pub fn output(&self) -> &W {
        &self.output
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Result<(), Unwind> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value)?;

                Ok(())
            }

            Stmt::Var {
                name, initializer, ..
            } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                self.environment.borrow_mut().define(name, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let child = Environment::with_enclosing(self.environment.clone());

                self.execute_block(statements, Rc::new(RefCell::new(child)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    self.execute(body)?;
                }

                Ok(())
            }

            Stmt::Function(decl) => {
                let function =
                    LoxFunction::new(decl.clone(), self.environment.clone(), false);

                self.environment
                    .borrow_mut()
                    .define(&decl.name, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Err(Unwind::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                line,
            } => self.execute_class(name, superclass.as_ref(), methods, *line),
        }
    }

    /// Run `statements` in `environment`, restoring the previous environment
    /// on every exit path, unwinding included.
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<(), Unwind> {
        let previous = mem::replace(&mut self.environment, environment);

        let result = statements.iter().try_for_each(|stmt| self.execute(stmt));

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &str,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
        line: usize,
    ) -> Result<(), Unwind> {
        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => {
                let superclass_line: usize = match expr {
                    Expr::Variable { line, .. } => *line,
                    _ => line,
                };

                match self.evaluate(expr)? {
                    Value::Class(class) => Some(class),

                    _ => {
                        return Err(LoxError::runtime(
                            superclass_line,
                            "Superclass must be a class.",
                        )
                        .into());
                    }
                }
            }

            None => None,
        };

        // Forward slot: the name exists (as nil) while methods are built, and
        // is only rebound once the class is complete.
        self.environment.borrow_mut().define(name, Value::Nil);

        let method_closure: Rc<RefCell<Environment>> = match &superclass {
            Some(class) => {
                let mut env = Environment::with_enclosing(self.environment.clone());
                env.define("super", Value::Class(class.clone()));

                Rc::new(RefCell::new(env))
            }

            None => self.environment.clone(),
        };

        let mut method_table: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for decl in methods {
            let is_initializer: bool = decl.name == "init";

            let function =
                LoxFunction::new(decl.clone(), method_closure.clone(), is_initializer);

            method_table.insert(decl.name.clone(), Rc::new(function));
        }

        let class = Rc::new(LoxClass {
            name: name.to_string(),
            superclass,
            methods: method_table,
        });

        if self
            .environment
            .borrow_mut()
            .assign(name, Value::Class(class))
            .is_none()
        {
            return Err(
                LoxError::runtime(line, format!("Undefined variable '{}'.", name)).into(),
            );
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, Unwind> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Nil => Value::Nil,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { op, right, line } => {
                let value: Value = self.evaluate(right)?;

                match op {
                    UnaryOp::Neg => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),

                        _ => Err(LoxError::runtime(*line, "Operand must be a number.").into()),
                    },

                    UnaryOp::Not => Ok(Value::Bool(!is_truthy(&value))),
                }
            }

            Expr::Binary {
                op,
                left,
                right,
                line,
            } => {
                let left_val: Value = self.evaluate(left)?;
                let right_val: Value = self.evaluate(right)?;

                self.binary_op(*op, left_val, right_val, *line)
            }

            Expr::Logical { op, left, right } => {
                let left_val: Value = self.evaluate(left)?;

                match op {
                    LogicalOp::Or => {
                        if is_truthy(&left_val) {
                            Ok(left_val)
                        } else {
                            self.evaluate(right)
                        }
                    }

                    LogicalOp::And => {
                        if !is_truthy(&left_val) {
                            Ok(left_val)
                        } else {
                            self.evaluate(right)
                        }
                    }
                }
            }

            Expr::Variable { id, name, line } => self.look_up_variable(*id, name, *line),

            Expr::Assign {
                id,
                name,
                value,
                line,
            } => {
                let value: Value = self.evaluate(value)?;

                let assigned: Option<()> = match self.locals.get(id) {
                    Some(&distance) => self
                        .environment
                        .borrow_mut()
                        .assign_at(distance, name, value.clone()),

                    None => self.globals.borrow_mut().assign(name, value.clone()),
                };

                match assigned {
                    Some(()) => Ok(value),

                    None => Err(LoxError::runtime(
                        *line,
                        format!("Undefined variable '{}'.", name),
                    )
                    .into()),
                }
            }

            Expr::This { id, line } => self.look_up_variable(*id, "this", *line),

            Expr::Call {
                callee,
                arguments,
                line,
            } => {
                let callee_val: Value = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call_value(callee_val, args, *line)
            }

            Expr::Get { object, name, line } => match self.evaluate(object)? {
                Value::Instance(instance) => match LoxInstance::get(&instance, name) {
                    Some(value) => Ok(value),

                    None => Err(LoxError::runtime(
                        *line,
                        format!("Undefined property '{}'.", name),
                    )
                    .into()),
                },

                _ => Err(LoxError::runtime(*line, "Only instances have properties.").into()),
            },

            Expr::Set {
                object,
                name,
                value,
                line,
            } => {
                let object: Value = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        let value: Value = self.evaluate(value)?;

                        instance.set(name, value.clone());

                        Ok(value)
                    }

                    _ => Err(LoxError::runtime(*line, "Only instances have fields.").into()),
                }
            }

            Expr::Super { id, method, line } => self.evaluate_super(*id, method, *line),
        }
    }

    fn binary_op(
        &mut self,
        op: BinaryOp,
        left: Value,
        right: Value,
        line: usize,
    ) -> Result<Value, Unwind> {
        match op {
            BinaryOp::Add => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                _ => Err(LoxError::runtime(
                    line,
                    "Operands must be two numbers or two strings.",
                )
                .into()),
            },

            BinaryOp::Eq => Ok(Value::Bool(left == right)),

            BinaryOp::Neq => Ok(Value::Bool(left != right)),

            BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => {
                let (a, b): (f64, f64) = match (left, right) {
                    (Value::Number(a), Value::Number(b)) => (a, b),

                    _ => {
                        return Err(LoxError::runtime(line, "Operands must be numbers.").into());
                    }
                };

                // Division follows IEEE-754: dividing by zero yields an
                // infinity or NaN, never a runtime error.
                Ok(match op {
                    BinaryOp::Sub => Value::Number(a - b),
                    BinaryOp::Mul => Value::Number(a * b),
                    BinaryOp::Div => Value::Number(a / b),
                    BinaryOp::Lt => Value::Bool(a < b),
                    BinaryOp::Le => Value::Bool(a <= b),
                    BinaryOp::Gt => Value::Bool(a > b),
                    BinaryOp::Ge => Value::Bool(a >= b),
                    _ => unreachable!("numeric operator group"),
                })
            }
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &str, line: usize) -> Result<Value, Unwind> {
        let value: Option<Value> = match self.locals.get(&id) {
            Some(&distance) => self.environment.borrow().get_at(distance, name),

            None => self.globals.borrow().get(name),
        };

        value.ok_or_else(|| {
            LoxError::runtime(line, format!("Undefined variable '{}'.", name)).into()
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Call dispatch
    // ─────────────────────────────────────────────────────────────────────────

    fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        line: usize,
    ) -> Result<Value, Unwind> {
        match callee {
            Value::NativeFunction { arity, func, name } => {
                if args.len() != arity {
                    return Err(arity_error(arity, args.len(), line));
                }

                debug!("Calling native function '{}'", name);

                func(&args).map_err(|msg| LoxError::runtime(line, msg).into())
            }

            Value::Function(function) => {
                if args.len() != function.arity() {
                    return Err(arity_error(function.arity(), args.len(), line));
                }

                self.call_function(&function, args)
            }

            Value::Class(class) => {
                if args.len() != class.arity() {
                    return Err(arity_error(class.arity(), args.len(), line));
                }

                let instance: Rc<LoxInstance> = LoxInstance::new(class.clone());

                if let Some(init) = class.find_method("init") {
                    let bound: LoxFunction = init.bind(instance.clone());

                    // The initializer's own result is ignored; calling a
                    // class always yields the fresh instance.
                    self.call_function(&Rc::new(bound), args)?;
                }

                Ok(Value::Instance(instance))
            }

            _ => Err(LoxError::runtime(line, "Can only call functions and classes.").into()),
        }
    }

    fn call_function(
        &mut self,
        function: &Rc<LoxFunction>,
        args: Vec<Value>,
    ) -> Result<Value, Unwind> {
        let mut env = Environment::with_enclosing(function.closure.clone());

        for (param, arg) in function.declaration.params.iter().zip(args) {
            env.define(param, arg);
        }

        let result = self.execute_block(&function.declaration.body, Rc::new(RefCell::new(env)));

        let returned: Value = match result {
            Ok(()) => Value::Nil,

            Err(Unwind::Return(value)) => value,

            Err(err) => return Err(err),
        };

        if function.is_initializer {
            // `init` always evaluates to its instance, even after a bare
            // `return;`.  The bound closure holds `this` in its own frame.
            return function.closure.borrow().get_at(0, "this").ok_or_else(|| {
                LoxError::runtime(
                    function.declaration.line,
                    "Undefined variable 'this'.".to_string(),
                )
                .into()
            });
        }

        Ok(returned)
    }

    fn evaluate_super(&mut self, id: ExprId, method: &str, line: usize) -> Result<Value, Unwind> {
        let distance: usize = match self.locals.get(&id) {
            Some(&distance) => distance,

            None => {
                return Err(
                    LoxError::runtime(line, "Undefined variable 'super'.".to_string()).into(),
                );
            }
        };

        let superclass: Rc<LoxClass> = match self.environment.borrow().get_at(distance, "super") {
            Some(Value::Class(class)) => class,

            _ => {
                return Err(
                    LoxError::runtime(line, "Undefined variable 'super'.".to_string()).into(),
                );
            }
        };

        // `this` lives one scope inside `super`.
        let instance: Rc<LoxInstance> =
            match self
                .environment
                .borrow()
                .get_at(distance.saturating_sub(1), "this")
            {
                Some(Value::Instance(instance)) => instance,

                _ => {
                    return Err(
                        LoxError::runtime(line, "Undefined variable 'this'.".to_string()).into(),
                    );
                }
            };

        match superclass.find_method(method) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),

            None => Err(LoxError::runtime(
                line,
                format!("Undefined property '{}'.", method),
            )
            .into()),
        }
    }
}

fn arity_error(expected: usize, got: usize, line: usize) -> Unwind {
    LoxError::runtime(
        line,
        format!("Expected {} arguments but got {}.", expected, got),
    )
    .into()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Natives
// ─────────────────────────────────────────────────────────────────────────────

fn native_clock(_args: &[Value]) -> Result<Value, String> {
    let timestamp: f64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}

fn native_char(_args: &[Value]) -> Result<Value, String> {
    let mut buf: [u8; 1] = [0u8; 1];

    match io::stdin().read(&mut buf) {
        Ok(0) => Ok(Value::Nil),

        Ok(_) => Ok(Value::String((buf[0] as char).to_string())),

        Err(e) => Err(format!("Failed to read from stdin: {}", e)),
    }
}

fn read_stdin_line() -> Result<Option<String>, String> {
    let mut line: String = String::new();

    match io::stdin().lock().read_line(&mut line) {
        Ok(0) => Ok(None),

        Ok(_) => {
            if line.ends_with('\n') {
                line.pop();

                if line.ends_with('\r') {
                    line.pop();
                }
            }

            Ok(Some(line))
        }

        Err(e) => Err(format!("Failed to read from stdin: {}", e)),
    }
}

fn native_string(_args: &[Value]) -> Result<Value, String> {
    Ok(read_stdin_line()?.map(Value::String).unwrap_or(Value::Nil))
}

fn native_number(_args: &[Value]) -> Result<Value, String> {
    Ok(read_stdin_line()?
        .and_then(|line| line.trim().parse::<f64>().ok())
        .map(Value::Number)
        .unwrap_or(Value::Nil))
}
