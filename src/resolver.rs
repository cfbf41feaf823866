// Static resolution pass. Walks the same tree the interpreter will later
// walk, but only to compute how many environment frames separate each
// variable reference from the scope that declares it. That number gets
// stashed on the interpreter, keyed by the referring expression's
// `NodeId`, and read back during evaluation instead of being re-derived
// by walking the chain at runtime.

use std::collections::HashMap;

use crate::error::{Diagnostics, Error};
use crate::interpreter::Interpreter;
use crate::syntax::{expr, stmt, Expr, LiteralValue, NodeId, Stmt};
use crate::token::Token;

#[derive(Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver<'i, 'd> {
    interpreter: &'i mut Interpreter,
    diagnostics: &'d Diagnostics,

    // Only local block scopes live here. A name absent from every frame on
    // this stack is assumed global and resolved dynamically at runtime
    // instead.
    scopes: Vec<HashMap<String, bool>>,

    current_function: FunctionType,
    current_class: ClassType,
}

impl<'i, 'd> Resolver<'i, 'd> {
    pub fn new(interpreter: &'i mut Interpreter, diagnostics: &'d Diagnostics) -> Self {
        Resolver {
            interpreter,
            diagnostics,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    fn resolve_stmt(&mut self, statement: &Stmt) {
        let _ = statement.accept(self);
    }

    pub fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    fn resolve_expr(&mut self, expression: &Expr) {
        let _ = expression.accept(self);
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    // Binds the name to `false` ("declared but not yet defined") so that a
    // reference to the variable inside its own initializer can be caught
    // (`var a = a;`).
    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.diagnostics
                    .token_error(name, "Already a variable with this name in this scope.");
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn resolve_local(&mut self, id: NodeId, name: &Token) {
        for (i, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.interpreter.resolve(id, i);
                return;
            }
        }
        // not found in any scope: left unresolved, treated as a global at
        // runtime
    }

    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], kind: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(body);
        self.end_scope();

        self.current_function = enclosing_function;
    }
}

impl<'i, 'd> expr::Visitor<()> for Resolver<'i, 'd> {
    fn visit_literal_expr(&mut self, _value: &LiteralValue) -> Result<(), Error> {
        Ok(())
    }

    fn visit_variable_expr(&mut self, id: NodeId, name: &Token) -> Result<(), Error> {
        if let Some(scope) = self.scopes.last() {
            if scope.get(&name.lexeme) == Some(&false) {
                self.diagnostics
                    .token_error(name, "Can't read local variable in its own initializer.");
            }
        }
        self.resolve_local(id, name);
        Ok(())
    }

    fn visit_assign_expr(&mut self, id: NodeId, name: &Token, value: &Expr) -> Result<(), Error> {
        self.resolve_expr(value);
        self.resolve_local(id, name);
        Ok(())
    }

    fn visit_unary_expr(&mut self, _operator: &Token, right: &Expr) -> Result<(), Error> {
        self.resolve_expr(right);
        Ok(())
    }

    fn visit_binary_expr(&mut self, left: &Expr, _operator: &Token, right: &Expr) -> Result<(), Error> {
        self.resolve_expr(left);
        self.resolve_expr(right);
        Ok(())
    }

    fn visit_logical_expr(&mut self, left: &Expr, _operator: &Token, right: &Expr) -> Result<(), Error> {
        self.resolve_expr(left);
        self.resolve_expr(right);
        Ok(())
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<(), Error> {
        self.resolve_expr(expression);
        Ok(())
    }

    fn visit_call_expr(
        &mut self,
        callee: &Expr,
        _paren: &Token,
        arguments: &[Expr],
    ) -> Result<(), Error> {
        self.resolve_expr(callee);
        for argument in arguments {
            self.resolve_expr(argument);
        }
        Ok(())
    }

    // The property name is resolved dynamically at call time, so only the
    // object expression needs a static pass here.
    fn visit_get_expr(&mut self, object: &Expr, _name: &Token) -> Result<(), Error> {
        self.resolve_expr(object);
        Ok(())
    }

    fn visit_set_expr(&mut self, object: &Expr, _name: &Token, value: &Expr) -> Result<(), Error> {
        self.resolve_expr(value);
        self.resolve_expr(object);
        Ok(())
    }

    fn visit_this_expr(&mut self, id: NodeId, keyword: &Token) -> Result<(), Error> {
        if self.current_class == ClassType::None {
            self.diagnostics
                .token_error(keyword, "Can't use 'this' outside of a class.");
            return Ok(());
        }
        self.resolve_local(id, keyword);
        Ok(())
    }

    fn visit_super_expr(&mut self, id: NodeId, keyword: &Token, _method: &Token) -> Result<(), Error> {
        match self.current_class {
            ClassType::None => {
                self.diagnostics
                    .token_error(keyword, "Can't use 'super' outside of a class.");
            }
            ClassType::Class => {
                self.diagnostics
                    .token_error(keyword, "Can't use 'super' in a class with no superclass.");
            }
            ClassType::Subclass => {
                self.resolve_local(id, keyword);
            }
        }
        Ok(())
    }
}

impl<'i, 'd> stmt::Visitor<()> for Resolver<'i, 'd> {
    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        self.begin_scope();
        self.resolve_stmts(statements);
        self.end_scope();
        Ok(())
    }

    fn visit_class_stmt(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Stmt],
    ) -> Result<(), Error> {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(Expr::Variable { name: super_name, .. }) = superclass {
            if super_name.lexeme == name.lexeme {
                self.diagnostics
                    .token_error(super_name, "A class can't inherit from itself.");
            }
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass.expect("checked above"));
        }

        if superclass.is_some() {
            // `super` resolves to a "local variable" in an implicit scope
            // wrapping the method bodies, exactly one hop outside `this`'s
            // scope.
            self.begin_scope();
            self.scopes
                .last_mut()
                .expect("scope just pushed")
                .insert("super".to_string(), true);
        }

        self.begin_scope();
        self.scopes
            .last_mut()
            .expect("scope just pushed")
            .insert("this".to_string(), true);

        for method in methods {
            if let Stmt::Function { name, params, body } = method {
                let kind = if name.lexeme == "init" {
                    FunctionType::Initializer
                } else {
                    FunctionType::Method
                };
                self.resolve_function(params, body, kind);
            }
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
        Ok(())
    }

    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        self.resolve_expr(expression);
        Ok(())
    }

    fn visit_if_stmt(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<(), Error> {
        self.resolve_expr(condition);
        self.resolve_stmt(then_branch);
        if let Some(else_stmt) = else_branch {
            self.resolve_stmt(else_stmt);
        }
        Ok(())
    }

    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        self.resolve_expr(expression);
        Ok(())
    }

    fn visit_return_stmt(&mut self, keyword: &Token, value: &Option<Expr>) -> Result<(), Error> {
        if self.current_function == FunctionType::None {
            self.diagnostics
                .token_error(keyword, "Can't return from top-level code.");
        }

        if let Some(return_value) = value {
            if self.current_function == FunctionType::Initializer {
                self.diagnostics
                    .token_error(keyword, "Can't return a value from an initializer.");
            }
            self.resolve_expr(return_value);
        }
        Ok(())
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<(), Error> {
        self.resolve_expr(condition);
        self.resolve_stmt(body);
        Ok(())
    }

    fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>) -> Result<(), Error> {
        self.declare(name);
        if let Some(init) = initializer {
            self.resolve_expr(init);
        }
        self.define(name);
        Ok(())
    }

    fn visit_function_stmt(
        &mut self,
        name: &Token,
        params: &[Token],
        body: &[Stmt],
    ) -> Result<(), Error> {
        // Defined eagerly, before the body is resolved, so the function can
        // recurse into itself.
        self.declare(name);
        self.define(name);
        self.resolve_function(params, body, FunctionType::Function);
        Ok(())
    }

    fn visit_null_stmt(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostics;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve(source: &str) -> (Interpreter, Diagnostics) {
        let diagnostics = Diagnostics::new(source.to_string());
        let tokens = Scanner::new(source.to_string(), &diagnostics).scan_tokens();
        let statements = Parser::new(&tokens, &diagnostics).parse();
        let mut interpreter = Interpreter::new();
        Resolver::new(&mut interpreter, &diagnostics).resolve_stmts(&statements);
        (interpreter, diagnostics)
    }

    #[test]
    fn flags_self_referencing_initializer() {
        let (_, diagnostics) = resolve("{ var a = a; }");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn flags_duplicate_local_declaration() {
        let (_, diagnostics) = resolve("{ var a = 1; var a = 2; }");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn flags_this_outside_class() {
        let (_, diagnostics) = resolve("print this;");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn flags_return_value_from_initializer() {
        let source = "class A { init() { return 1; } }";
        let (_, diagnostics) = resolve(source);
        assert!(diagnostics.had_error());
    }

    #[test]
    fn flags_self_inheriting_class() {
        let (_, diagnostics) = resolve("class A < A {}");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn flags_super_without_superclass() {
        let source = "class A { foo() { super.foo(); } }";
        let (_, diagnostics) = resolve(source);
        assert!(diagnostics.had_error());
    }

    #[test]
    fn accepts_well_formed_subclass() {
        let source = "class A { foo() {} } class B < A { bar() { super.foo(); } }";
        let (_, diagnostics) = resolve(source);
        assert!(!diagnostics.had_error());
    }
}
