use crate::error::{Diagnostics, Error};
use crate::syntax::{Expr, LiteralValue, Stmt};
use crate::token::{Token, TokenType};

pub struct Parser<'t, 'd> {
    tokens: &'t [Token],
    current: usize,
    diagnostics: &'d Diagnostics,
}

macro_rules! matches {
    ( $sel:ident, $( $x:expr ),* ) => {
        {
            if $( $sel.check($x) )||* {
                $sel.advance();
                true
            } else {
                false
            }
        }
    };
}

impl<'t, 'd> Parser<'t, 'd> {
    pub fn new(tokens: &'t [Token], diagnostics: &'d Diagnostics) -> Self {
        Self {
            tokens,
            current: 0,
            diagnostics,
        }
    }

    // program        → declaration* EOF ;
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements: Vec<Stmt> = Vec::new();
        while !self.is_at_end() {
            statements.push(self.declaration());
        }
        statements
    }

    // declaration    → classDecl | funDecl | varDecl | statement ;
    fn declaration(&mut self) -> Stmt {
        let result = if matches!(self, TokenType::Var) {
            self.var_declaration()
        } else if matches!(self, TokenType::Class) {
            self.class_declaration()
        } else if matches!(self, TokenType::Fun) {
            self.function("function")
        } else {
            self.statement()
        };

        // catch the "exception thrown" when the parser begins error recovery
        match result {
            Err(Error::Parse) => {
                self.synchronize();
                Stmt::Null
            }
            Err(_) => Stmt::Null,
            Ok(stmt) => stmt,
        }
    }

    // classDecl      → "class" IDENTIFIER ( "<" IDENTIFIER )? "{" function* "}" ;
    fn class_declaration(&mut self) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;
        let superclass = if matches!(self, TokenType::Less) {
            self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(Expr::variable(self.previous().clone()))
        } else {
            None
        };
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods: Vec<Stmt> = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    // Like most dynamically typed languages, fields are not explicitly listed
    // in the class declaration. Instances are loose bags of data and you can
    // freely add fields to them as you see fit using normal imperative code.

    // funDecl        → "fun" function ;
    // function       → IDENTIFIER "(" parameters? ")" block ;
    // parameters     → IDENTIFIER ( "," IDENTIFIER )* ;
    fn function(&mut self, kind: &str) -> Result<Stmt, Error> {
        let name = self.consume(
            TokenType::Identifier,
            format!("Expect {kind} name.").as_str(),
        )?;

        self.consume(
            TokenType::LeftParen,
            format!("Expect '(' after {kind} name.").as_str(),
        )?;
        let mut params: Vec<Token> = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= 255 {
                    self.error(self.peek(), "Can't have more than 255 parameters.");
                }

                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);

                if !matches!(self, TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        self.consume(
            TokenType::LeftBrace,
            format!("Expect '{{' before {kind} body.").as_str(),
        )?;
        let body = self.block();
        Ok(Stmt::Function { name, params, body })
    }

    // statement      → exprStmt | printStmt | ifStmt | block | returnStmt | whileStmt | forStmt ;
    fn statement(&mut self) -> Result<Stmt, Error> {
        if matches!(self, TokenType::For) {
            self.for_statement()
        } else if matches!(self, TokenType::If) {
            self.if_statement()
        } else if matches!(self, TokenType::Print) {
            self.print_statement()
        } else if matches!(self, TokenType::Return) {
            self.return_statement()
        } else if matches!(self, TokenType::While) {
            self.while_statement()
        } else if matches!(self, TokenType::LeftBrace) {
            Ok(Stmt::Block {
                statements: self.block(),
            })
        } else {
            self.expression_statement()
        }
    }

    // returnStmt     → "return" expression? ";" ;
    fn return_statement(&mut self) -> Result<Stmt, Error> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    // the else is bound to the nearest if that precedes it
    // ifStmt         → "if" "(" expression ")" statement ( "else" statement )? ;
    fn if_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if matches!(self, TokenType::Else) {
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

    // block          → "{" declaration* "}" ;
    fn block(&mut self) -> Vec<Stmt> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration());
        }

        if let Err(err) = self.consume(TokenType::RightBrace, "Expect '}' after block.") {
            // consume() already reported the error; stop collecting but
            // don't bubble a Result up through block()'s infallible shape.
            let _ = err;
        }
        statements
    }

    // whileStmt      → "while" "(" expression ")" statement ;
    fn while_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;

        Ok(Stmt::While {
            condition,
            body: Box::new(body),
        })
    }

    // forStmt        → "for" "(" ( varDecl | exprStmt | ";" ) expression? ";" expression? ")" statement ;
    // Desugars to a `while`: the increment (if present) is appended inside
    // the body block, and the whole thing is wrapped in a block if there's
    // an initializer.
    fn for_statement(&mut self) -> Result<Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if matches!(self, TokenType::Semicolon) {
            None
        } else if matches!(self, TokenType::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(incr) = increment {
            body = Stmt::Block {
                statements: vec![body, Stmt::Expression { expression: incr }],
            }
        }

        body = Stmt::While {
            condition: condition.unwrap_or_else(|| Expr::literal(LiteralValue::Boolean(true))),
            body: Box::new(body),
        };

        if let Some(init) = initializer {
            body = Stmt::Block {
                statements: vec![init, body],
            };
        }

        Ok(body)
    }

    // varDecl        → "var" IDENTIFIER ( "=" expression )? ";" ;
    fn var_declaration(&mut self) -> Result<Stmt, Error> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if matches!(self, TokenType::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // expression     → assignment ;
    fn expression(&mut self) -> Result<Expr, Error> {
        self.assignment()
    }

    // assignment     → ( call "." )? IDENTIFIER "=" assignment | logic_or ;
    //
    // The trick: parse the left side as if it were a normal expression
    // (r-value), then convert it to an assignment target (l-value) if an
    // `=` sign follows. Works because every valid assignment target also
    // happens to be valid syntax as a plain expression.
    fn assignment(&mut self) -> Result<Expr, Error> {
        let expr = self.logic_or()?;

        if matches!(self, TokenType::Equal) {
            let equals = self.previous().clone();
            // assignment is right-associative: recurse rather than loop
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::assign(name, value)),
                Expr::Get { object, name, .. } => Ok(Expr::set(object, name, value)),
                _ => {
                    // not in a confused parser state, so just report and
                    // keep going rather than entering panic-mode recovery
                    self.error(&equals, "Invalid assignment target.");
                    Ok(expr)
                }
            };
        }

        Ok(expr)
    }

    // logic_or       → logic_and ( "or" logic_and )* ;
    fn logic_or(&mut self) -> Result<Expr, Error> {
        let mut expr = self.logic_and()?;

        while matches!(self, TokenType::Or) {
            let operator = self.previous().clone();
            let right = self.logic_and()?;
            expr = Expr::logical(Box::new(expr), operator, Box::new(right));
        }

        Ok(expr)
    }

    // logic_and      → equality ( "and" equality )* ;
    fn logic_and(&mut self) -> Result<Expr, Error> {
        let mut expr = self.equality()?;

        while matches!(self, TokenType::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::logical(Box::new(expr), operator, Box::new(right));
        }

        Ok(expr)
    }

    // equality       → comparison ( ( "!=" | "==" ) comparison )* ;
    fn equality(&mut self) -> Result<Expr, Error> {
        let mut expr = self.comparison()?;

        while matches!(self, TokenType::BangEqual, TokenType::EqualEqual) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::binary(Box::new(expr), operator, Box::new(right));
        }
        Ok(expr)
    }

    // comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
    fn comparison(&mut self) -> Result<Expr, Error> {
        let mut expr = self.term()?;

        while matches!(
            self,
            TokenType::GreaterEqual,
            TokenType::Greater,
            TokenType::LessEqual,
            TokenType::Less
        ) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::binary(Box::new(expr), operator, Box::new(right));
        }

        Ok(expr)
    }

    // term           → factor ( ( "-" | "+" ) factor )* ;
    fn term(&mut self) -> Result<Expr, Error> {
        let mut expr = self.factor()?;

        while matches!(self, TokenType::Minus, TokenType::Plus) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::binary(Box::new(expr), operator, Box::new(right));
        }
        Ok(expr)
    }

    // factor         → unary ( ( "/" | "*" ) unary )* ;
    fn factor(&mut self) -> Result<Expr, Error> {
        let mut expr = self.unary()?;

        while matches!(self, TokenType::Slash, TokenType::Star) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::binary(Box::new(expr), operator, Box::new(right));
        }

        Ok(expr)
    }

    // unary          → ( "!" | "-" ) unary | call ;
    fn unary(&mut self) -> Result<Expr, Error> {
        if matches!(self, TokenType::Bang, TokenType::Minus) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::unary(operator, Box::new(right)));
        }

        self.call()
    }

    // call           → primary ( "(" arguments? ")" | "." IDENTIFIER )* ;
    // Left-associative and chaining: `a.b(1).c` parses as `(((a).b)(1)).c`.
    fn call(&mut self) -> Result<Expr, Error> {
        let mut expr = self.primary()?;

        loop {
            if matches!(self, TokenType::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if matches!(self, TokenType::Dot) {
                let name = self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Expr::get(Box::new(expr), name);
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, Error> {
        let mut arguments: Vec<Expr> = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    self.error(self.peek(), "Can't have more than 255 arguments.");
                }

                arguments.push(self.expression()?);

                if !matches!(self, TokenType::Comma) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;

        Ok(Expr::call(Box::new(callee), paren, arguments))
    }

    // primary        → NUMBER | STRING | "true" | "false" | "nil"
    //                | "(" expression ")" | IDENTIFIER | "this"
    //                | "super" "." IDENTIFIER ;
    fn primary(&mut self) -> Result<Expr, Error> {
        if matches!(self, TokenType::False) {
            return Ok(Expr::literal(LiteralValue::Boolean(false)));
        }
        if matches!(self, TokenType::True) {
            return Ok(Expr::literal(LiteralValue::Boolean(true)));
        }
        if matches!(self, TokenType::Nil) {
            return Ok(Expr::literal(LiteralValue::Nil));
        }
        if let TokenType::Number { literal } = self.peek().token_type.clone() {
            self.advance();
            return Ok(Expr::literal(LiteralValue::Number(literal)));
        }
        if let TokenType::String { literal } = self.peek().token_type.clone() {
            self.advance();
            return Ok(Expr::literal(LiteralValue::String(literal)));
        }
        if matches!(self, TokenType::Super) {
            let keyword = self.previous().clone();
            self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenType::Identifier, "Expect superclass method name.")?;
            return Ok(Expr::super_(keyword, method));
        }
        if matches!(self, TokenType::This) {
            return Ok(Expr::this(self.previous().clone()));
        }
        if matches!(self, TokenType::Identifier) {
            return Ok(Expr::variable(self.previous().clone()));
        }
        if matches!(self, TokenType::LeftParen) {
            let expr = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::grouping(Box::new(expr)));
        }

        Err(self.error(self.peek(), "Expect expression."))
    }

    // printStmt      → "print" expression ";" ;
    fn print_statement(&mut self) -> Result<Stmt, Error> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print { expression: value })
    }

    // exprStmt       → expression ";" ;
    fn expression_statement(&mut self) -> Result<Stmt, Error> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression { expression: value })
    }

    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return
                | TokenType::Class => return,
                _ => {
                    self.advance();
                }
            };
        }
    }

    // returns true if the current token is of the given type. Unlike
    // advance(), it never consumes the token, it only looks at it.
    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.current)
            .expect("peek past end of token stream")
    }

    fn previous(&self) -> &Token {
        self.tokens
            .get(self.current - 1)
            .expect("previous before start of token stream")
    }

    fn consume(&mut self, token_type: TokenType, msg: &str) -> Result<Token, Error> {
        if self.check(token_type) {
            Ok(self.advance().clone())
        } else {
            Err(self.error(self.peek(), msg))
        }
    }

    fn error(&self, token: &Token, msg: &str) -> Error {
        self.diagnostics.token_error(token, msg);
        Error::Parse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostics;
    use crate::scanner::Scanner;
    use crate::syntax::AstPrinter;

    fn parse(source: &str) -> (Vec<Stmt>, Diagnostics) {
        let diagnostics = Diagnostics::new(source.to_string());
        let tokens = Scanner::new(source.to_string(), &diagnostics).scan_tokens();
        let statements = Parser::new(&tokens, &diagnostics).parse();
        (statements, diagnostics)
    }

    #[test]
    fn precedence_groups_tighter_operators_first() {
        let (statements, diagnostics) = parse("1 + 2 * 3;");
        assert!(!diagnostics.had_error());
        let mut printer = AstPrinter;
        match &statements[0] {
            Stmt::Expression { expression } => {
                assert_eq!(printer.print_expr(expression), "(+ 1 (* 2 3))");
            }
            _ => panic!("expected expression statement"),
        }
    }

    #[test]
    fn precedence_respects_explicit_left_grouping() {
        let (statements, diagnostics) = parse("1 * 2 + 3;");
        assert!(!diagnostics.had_error());
        let mut printer = AstPrinter;
        match &statements[0] {
            Stmt::Expression { expression } => {
                assert_eq!(printer.print_expr(expression), "(+ (* 1 2) 3)");
            }
            _ => panic!("expected expression statement"),
        }
    }

    #[test]
    fn for_loop_desugars_to_while_in_a_block() {
        let (statements, diagnostics) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(!diagnostics.had_error());
        match &statements[0] {
            Stmt::Block { statements } => {
                assert_eq!(statements.len(), 2);
                assert!(matches!(statements[0], Stmt::Var { .. }));
                match &statements[1] {
                    Stmt::While { condition, body } => {
                        let mut printer = AstPrinter;
                        assert_eq!(printer.print_expr(condition), "(< i 3)");
                        match body.as_ref() {
                            Stmt::Block { statements } => assert_eq!(statements.len(), 2),
                            _ => panic!("expected desugared body block"),
                        }
                    }
                    _ => panic!("expected while loop"),
                }
            }
            _ => panic!("expected enclosing block"),
        }
    }

    #[test]
    fn omitted_for_condition_becomes_true() {
        let (statements, diagnostics) = parse("for (;;) print 1;");
        assert!(!diagnostics.had_error());
        match &statements[0] {
            Stmt::While { condition, .. } => {
                let mut printer = AstPrinter;
                assert_eq!(printer.print_expr(condition), "true");
            }
            _ => panic!("expected a bare while loop (no initializer)"),
        }
    }

    #[test]
    fn call_and_property_access_chain_left_associatively() {
        let (statements, diagnostics) = parse("a.b(1).c;");
        assert!(!diagnostics.had_error());
        let mut printer = AstPrinter;
        match &statements[0] {
            Stmt::Expression { expression } => {
                assert_eq!(printer.print_expr(expression), "(. c (call (. b a) 1))");
            }
            _ => panic!("expected expression statement"),
        }
    }

    #[test]
    fn invalid_assignment_target_is_a_parse_error() {
        let (_, diagnostics) = parse("1 = 2;");
        assert!(diagnostics.had_error());
    }
}
