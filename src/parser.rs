//! Recursive-descent parser for Lox.
//!
//! One token of lookahead over the scanned token stream.  Each top-level
//! declaration is parsed independently: a syntax error abandons the current
//! declaration, panic-mode synchronization discards tokens to the next
//! statement boundary, and parsing resumes.  All collected errors are returned
//! together; a partial statement list is never handed to later stages.
//!
//! `for` loops do not survive parsing: they are lowered here into
//! `Block[init, While(cond, Block[body, increment])]`, so the resolver and
//! evaluator only ever see `while`.

use std::mem;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{BinaryOp, Expr, ExprId, FunctionDecl, Literal, LogicalOp, Stmt, UnaryOp};
use crate::error::{Location, LoxError};
use crate::token::{Token, TokenType};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    next_id: ExprId,
    errors: Vec<LoxError>,
}

impl Parser {
    /// `base_id` is the expression-id watermark; the driver threads it through
    /// so ids never repeat across REPL lines.
    pub fn new(tokens: Vec<Token>, base_id: ExprId) -> Self {
        Parser {
            tokens,
            current: 0,
            next_id: base_id,
            errors: Vec::new(),
        }
    }

    /// First id this parser has not handed out yet.
    pub fn watermark(&self) -> ExprId {
        self.next_id
    }

    pub fn parse(&mut self) -> Result<Vec<Stmt>, Vec<LoxError>> {
        info!("Beginning parse of {} token(s)", self.tokens.len());

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),

                Err(e) => {
                    debug!("Parse error, synchronizing: {}", e);

                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(statements)
        } else {
            Err(mem::take(&mut self.errors))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Declarations
    // ─────────────────────────────────────────────────────────────────────────

    fn declaration(&mut self) -> Result<Stmt, LoxError> {
        if self.match_tokens(&[TokenType::CLASS]) {
            return self.class_declaration();
        }

        if self.match_tokens(&[TokenType::FUN]) {
            let decl = self.function("function")?;
            return Ok(Stmt::Function(decl));
        }

        if self.match_tokens(&[TokenType::VAR]) {
            return self.var_declaration();
        }

        self.statement()
    }

    fn class_declaration(&mut self) -> Result<Stmt, LoxError> {
        let name_token: Token = self.consume_identifier("Expect class name.")?;

        let superclass: Option<Expr> = if self.match_tokens(&[TokenType::LESS]) {
            let super_token: Token = self.consume_identifier("Expect superclass name.")?;

            Some(Expr::Variable {
                id: self.new_id(),
                name: super_token.lexeme,
                line: super_token.line,
            })
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name: name_token.lexeme,
            superclass,
            methods,
            line: name_token.line,
        })
    }

    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>, LoxError> {
        let name_token: Token = self.consume_identifier(&format!("Expect {} name.", kind))?;

        self.consume(
            TokenType::LEFT_PAREN,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let mut params: Vec<String> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                let param: Token = self.consume_identifier("Expect parameter name.")?;
                params.push(param.lexeme);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;

        self.consume(
            TokenType::LEFT_BRACE,
            &format!("Expect '{{' before {} body.", kind),
        )?;

        let body: Vec<Stmt> = self.block()?;

        Ok(Rc::new(FunctionDecl {
            name: name_token.lexeme,
            params,
            body,
            line: name_token.line,
        }))
    }

    fn var_declaration(&mut self) -> Result<Stmt, LoxError> {
        let name_token: Token = self.consume_identifier("Expect variable name.")?;

        let initializer: Option<Expr> = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var {
            name: name_token.lexeme,
            initializer,
            line: name_token.line,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn statement(&mut self) -> Result<Stmt, LoxError> {
        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }

        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }

        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }

        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }

        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }

        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block()?));
        }

        self.expression_statement()
    }

    /// Lower `for (init; cond; inc) body` into nested `block`/`while`.
    fn for_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer: Option<Stmt> = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::VAR]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr> = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment: Option<Expr> = if !self.check(&TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body: Stmt = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition: Expr = condition.unwrap_or(Expr::Literal(Literal::Bool(true)));

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);

        let else_branch: Option<Box<Stmt>> = if self.match_tokens(&[TokenType::ELSE]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt, LoxError> {
        let value: Expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after value.")?;

        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> Result<Stmt, LoxError> {
        let line: usize = self.previous().line;

        let value: Option<Expr> = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { value, line })
    }

    fn while_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, LoxError> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt, LoxError> {
        let expr: Expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;

        Ok(Stmt::Expression(expr))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions (precedence ladder, lowest first)
    // ─────────────────────────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr, LoxError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, LoxError> {
        let expr: Expr = self.logic_or()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals_line: usize = self.previous().line;
            let value: Expr = self.assignment()?;

            match expr {
                Expr::Variable { name, line, .. } => {
                    return Ok(Expr::Assign {
                        id: self.new_id(),
                        name,
                        value: Box::new(value),
                        line,
                    });
                }

                Expr::Get { object, name, line } => {
                    return Ok(Expr::Set {
                        object,
                        name,
                        value: Box::new(value),
                        line,
                    });
                }

                _ => {
                    // Report, but keep the parsed expression; the parser is
                    // not in a broken state so no synchronization is needed.
                    self.errors.push(LoxError::parse(
                        Location::Line(equals_line),
                        "Invalid assignment target.",
                    ));
                }
            }
        }

        Ok(expr)
    }

    fn logic_or(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.logic_and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let right: Expr = self.logic_and()?;

            expr = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let right: Expr = self.equality()?;

            expr = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let operator: &Token = self.previous();
            let line: usize = operator.line;

            let op: BinaryOp = match operator.token_type {
                TokenType::BANG_EQUAL => BinaryOp::Neq,
                _ => BinaryOp::Eq,
            };

            let right: Expr = self.comparison()?;

            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                line,
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let operator: &Token = self.previous();
            let line: usize = operator.line;

            let op: BinaryOp = match operator.token_type {
                TokenType::GREATER => BinaryOp::Gt,
                TokenType::GREATER_EQUAL => BinaryOp::Ge,
                TokenType::LESS => BinaryOp::Lt,
                _ => BinaryOp::Le,
            };

            let right: Expr = self.term()?;

            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                line,
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let operator: &Token = self.previous();
            let line: usize = operator.line;

            let op: BinaryOp = match operator.token_type {
                TokenType::MINUS => BinaryOp::Sub,
                _ => BinaryOp::Add,
            };

            let right: Expr = self.factor()?;

            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                line,
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR]) {
            let operator: &Token = self.previous();
            let line: usize = operator.line;

            let op: BinaryOp = match operator.token_type {
                TokenType::SLASH => BinaryOp::Div,
                _ => BinaryOp::Mul,
            };

            let right: Expr = self.unary()?;

            expr = Expr::Binary {
                op,
                left: Box::new(expr),
                right: Box::new(right),
                line,
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, LoxError> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let operator: &Token = self.previous();
            let line: usize = operator.line;

            let op: UnaryOp = match operator.token_type {
                TokenType::BANG => UnaryOp::Not,
                _ => UnaryOp::Neg,
            };

            let right: Expr = self.unary()?;

            return Ok(Expr::Unary {
                op,
                right: Box::new(right),
                line,
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr, LoxError> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tokens(&[TokenType::DOT]) {
                let name_token: Token =
                    self.consume_identifier("Expect property name after '.'.")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name: name_token.lexeme,
                    line: name_token.line,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, LoxError> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                arguments.push(self.expression()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        let paren: Token = self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            arguments,
            line: paren.line,
        })
    }

    fn primary(&mut self) -> Result<Expr, LoxError> {
        let token: Token = self.peek().clone();

        match token.token_type {
            TokenType::FALSE => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }

            TokenType::TRUE => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }

            TokenType::NIL => {
                self.advance();
                Ok(Expr::Literal(Literal::Nil))
            }

            TokenType::NUMBER(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n)))
            }

            TokenType::STRING(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }

            TokenType::IDENTIFIER => {
                self.advance();

                Ok(Expr::Variable {
                    id: self.new_id(),
                    name: token.lexeme,
                    line: token.line,
                })
            }

            TokenType::THIS => {
                self.advance();

                Ok(Expr::This {
                    id: self.new_id(),
                    line: token.line,
                })
            }

            TokenType::SUPER => {
                self.advance();
                self.consume(TokenType::DOT, "Expect '.' after 'super'.")?;

                let method: Token = self.consume_identifier("Expect superclass method name.")?;

                Ok(Expr::Super {
                    id: self.new_id(),
                    method: method.lexeme,
                    line: token.line,
                })
            }

            TokenType::LEFT_PAREN => {
                self.advance();

                let expr: Expr = self.expression()?;
                self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;

                Ok(Expr::Grouping(Box::new(expr)))
            }

            _ => Err(self.error_at_peek("Expect expression.")),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token-stream helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        &self.peek().token_type == token_type
    }

    fn consume(&mut self, token_type: TokenType, msg: &str) -> Result<Token, LoxError> {
        if self.check(&token_type) {
            return Ok(self.advance().clone());
        }

        Err(self.error_at_peek(msg))
    }

    fn consume_identifier(&mut self, msg: &str) -> Result<Token, LoxError> {
        self.consume(TokenType::IDENTIFIER, msg)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn error_at_peek(&self, msg: &str) -> LoxError {
        let token: &Token = self.peek();

        let location: Location = if token.token_type == TokenType::EOF {
            Location::Eof
        } else {
            Location::Line(token.line)
        };

        LoxError::parse(location, msg)
    }

    fn new_id(&mut self) -> ExprId {
        let id: ExprId = self.next_id;
        self.next_id += 1;
        id
    }

    /// Panic-mode recovery: discard tokens until just past a `;` or just
    /// before a token that can begin a declaration.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            if matches!(
                self.peek().token_type,
                TokenType::CLASS
                    | TokenType::FUN
                    | TokenType::VAR
                    | TokenType::FOR
                    | TokenType::IF
                    | TokenType::WHILE
                    | TokenType::PRINT
                    | TokenType::RETURN
            ) {
                return;
            }

            self.advance();
        }
    }
}
