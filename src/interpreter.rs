// Tree-walking evaluator. One `Interpreter` lives for the whole run (REPL
// session or script) so that globals, and the locals map the resolver
// fills in, persist across top-level statements.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::{Diagnostics, Error};
use crate::function::{Function, LoxFunctionData};
use crate::object::Object;
use crate::syntax::{expr, stmt, Expr, LiteralValue, NodeId, Stmt};
use crate::token::{Token, TokenType};

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    // Side-map filled in by the resolver: how many environment frames to
    // walk for each variable reference, keyed by the referring
    // expression's identity rather than its lexeme.
    locals: HashMap<NodeId, usize>,
    // Where `print` writes. Real runs go to stdout; tests swap in a
    // buffer so they can assert on what actually got printed.
    stdout: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_stdout(Box::new(io::stdout()))
    }

    pub fn with_stdout(stdout: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock",
            Object::Callable(Function::native("clock", 0, |_args| {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .expect("system clock before the epoch")
                    .as_secs_f64();
                Object::Number(now)
            })),
        );

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            stdout,
        }
    }

    pub fn resolve(&mut self, id: NodeId, depth: usize) {
        self.locals.insert(id, depth);
    }

    pub fn interpret(&mut self, statements: &[Stmt], diagnostics: &Diagnostics) {
        for statement in statements {
            if let Err(err) = self.execute(statement) {
                if let Error::Runtime { token, message } = &err {
                    diagnostics.runtime_error(token, message);
                }
                return;
            }
        }
    }

    fn execute(&mut self, statement: &Stmt) -> Result<(), Error> {
        statement.accept(self)
    }

    // Used both for `{ ... }` blocks and for function-call activations,
    // which is why it takes the environment to run in rather than always
    // pushing one relative to `self.environment`.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<(), Error> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let result = (|| {
            for statement in statements {
                self.execute(statement)?;
            }
            Ok(())
        })();

        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expression: &Expr) -> Result<Object, Error> {
        expression.accept(self)
    }

    fn lookup_variable(&mut self, id: NodeId, name: &Token) -> Result<Object, Error> {
        match self.locals.get(&id) {
            Some(&depth) => Environment::get_at(&self.environment, depth, &name.lexeme).ok_or_else(|| {
                Error::Runtime {
                    token: name.clone(),
                    message: format!("Undefined variable '{}'.", name.lexeme),
                }
            }),
            None => self.globals.borrow().get(name),
        }
    }

    fn check_number_operand(&self, operator: &Token, operand: &Object) -> Result<f64, Error> {
        match operand {
            Object::Number(n) => Ok(*n),
            _ => Err(Error::Runtime {
                token: operator.clone(),
                message: "Operand must be a number.".to_string(),
            }),
        }
    }

    fn check_number_operands(
        &self,
        operator: &Token,
        left: &Object,
        right: &Object,
    ) -> Result<(f64, f64), Error> {
        match (left, right) {
            (Object::Number(l), Object::Number(r)) => Ok((*l, *r)),
            _ => Err(Error::Runtime {
                token: operator.clone(),
                message: "Operands must be numbers.".to_string(),
            }),
        }
    }
}

impl expr::Visitor<Object> for Interpreter {
    fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<Object, Error> {
        Ok(match value {
            LiteralValue::Nil => Object::Nil,
            LiteralValue::Boolean(b) => Object::Boolean(*b),
            LiteralValue::Number(n) => Object::Number(*n),
            LiteralValue::String(s) => Object::String(s.clone()),
        })
    }

    fn visit_variable_expr(&mut self, id: NodeId, name: &Token) -> Result<Object, Error> {
        self.lookup_variable(id, name)
    }

    fn visit_assign_expr(&mut self, id: NodeId, name: &Token, value: &Expr) -> Result<Object, Error> {
        let value = self.evaluate(value)?;

        match self.locals.get(&id) {
            Some(&depth) => Environment::assign_at(&self.environment, depth, name, value.clone())?,
            None => self.globals.borrow_mut().assign(name, value.clone())?,
        }

        Ok(value)
    }

    fn visit_unary_expr(&mut self, operator: &Token, right: &Expr) -> Result<Object, Error> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => Ok(Object::Number(-self.check_number_operand(operator, &right)?)),
            TokenType::Bang => Ok(Object::Boolean(!right.is_truthy())),
            _ => unreachable!("parser never produces other unary operators"),
        }
    }

    fn visit_binary_expr(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Object, Error> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Number(l - r))
            }
            TokenType::Slash => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Number(l / r))
            }
            TokenType::Star => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Number(l * r))
            }
            TokenType::Plus => match (&left, &right) {
                (Object::Number(l), Object::Number(r)) => Ok(Object::Number(l + r)),
                (Object::String(l), Object::String(r)) => Ok(Object::String(format!("{l}{r}"))),
                _ => Err(Error::Runtime {
                    token: operator.clone(),
                    message: "Operands must be two numbers or two strings.".to_string(),
                }),
            },
            TokenType::Greater => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Boolean(l > r))
            }
            TokenType::GreaterEqual => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Boolean(l >= r))
            }
            TokenType::Less => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Boolean(l < r))
            }
            TokenType::LessEqual => {
                let (l, r) = self.check_number_operands(operator, &left, &right)?;
                Ok(Object::Boolean(l <= r))
            }
            TokenType::BangEqual => Ok(Object::Boolean(!left.equals(&right))),
            TokenType::EqualEqual => Ok(Object::Boolean(left.equals(&right))),
            _ => unreachable!("parser never produces other binary operators"),
        }
    }

    fn visit_logical_expr(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Object, Error> {
        let left = self.evaluate(left)?;

        // short-circuit: `or` returns the left operand if it's truthy,
        // `and` returns it if it's falsy, without evaluating `right`
        if operator.token_type == TokenType::Or {
            if left.is_truthy() {
                return Ok(left);
            }
        } else if !left.is_truthy() {
            return Ok(left);
        }

        self.evaluate(right)
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<Object, Error> {
        self.evaluate(expression)
    }

    fn visit_call_expr(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Object, Error> {
        let callee = self.evaluate(callee)?;

        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.evaluate(argument)?);
        }

        match callee {
            Object::Callable(function) => {
                if args.len() != function.arity() {
                    return Err(Error::Runtime {
                        token: paren.clone(),
                        message: format!(
                            "Expected {} arguments but got {}.",
                            function.arity(),
                            args.len()
                        ),
                    });
                }
                function.call(self, &args)
            }
            Object::Class(class) => {
                let arity = class
                    .borrow()
                    .find_method("init")
                    .map(|init| init.arity())
                    .unwrap_or(0);
                if args.len() != arity {
                    return Err(Error::Runtime {
                        token: paren.clone(),
                        message: format!("Expected {arity} arguments but got {}.", args.len()),
                    });
                }

                let instance = LoxInstance::new(&class);
                if let Some(initializer) = class.borrow().find_method("init") {
                    initializer.bind(instance.clone()).call(self, &args)?;
                }
                Ok(instance)
            }
            _ => Err(Error::Runtime {
                token: paren.clone(),
                message: "Can only call functions and classes.".to_string(),
            }),
        }
    }

    fn visit_get_expr(&mut self, object: &Expr, name: &Token) -> Result<Object, Error> {
        let object = self.evaluate(object)?;
        match &object {
            Object::Instance(instance) => instance.borrow().get(name, &object),
            _ => Err(Error::Runtime {
                token: name.clone(),
                message: "Only instances have properties.".to_string(),
            }),
        }
    }

    fn visit_set_expr(&mut self, object: &Expr, name: &Token, value: &Expr) -> Result<Object, Error> {
        let object = self.evaluate(object)?;

        let instance = match &object {
            Object::Instance(instance) => instance,
            _ => {
                return Err(Error::Runtime {
                    token: name.clone(),
                    message: "Only instances have fields.".to_string(),
                })
            }
        };

        let value = self.evaluate(value)?;
        instance.borrow_mut().set(name, value.clone());
        Ok(value)
    }

    fn visit_this_expr(&mut self, id: NodeId, keyword: &Token) -> Result<Object, Error> {
        self.lookup_variable(id, keyword)
    }

    fn visit_super_expr(&mut self, id: NodeId, keyword: &Token, method: &Token) -> Result<Object, Error> {
        let depth = *self
            .locals
            .get(&id)
            .expect("resolver always records a depth for 'super'");

        let superclass = Environment::get_at(&self.environment, depth, "super")
            .expect("'super' is always bound where it resolves");
        // `this` lives exactly one frame closer than `super`: the implicit
        // scope holding `super` wraps the one holding `this`.
        let instance = Environment::get_at(&self.environment, depth - 1, "this")
            .expect("'this' is always bound one frame inside 'super'");

        let class = match superclass {
            Object::Class(class) => class,
            _ => unreachable!("resolver only ever binds 'super' to a class"),
        };

        let found = class.borrow().find_method(&method.lexeme);
        match found {
            Some(method_fn) => Ok(Object::Callable(method_fn.bind(instance))),
            None => Err(Error::Runtime {
                token: method.clone(),
                message: format!("Undefined property '{}'.", method.lexeme),
            }),
        }
    }
}

impl stmt::Visitor<()> for Interpreter {
    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        self.evaluate(expression)?;
        Ok(())
    }

    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        let value = self.evaluate(expression)?;
        writeln!(self.stdout, "{value}")?;
        Ok(())
    }

    fn visit_if_stmt(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<(), Error> {
        if self.evaluate(condition)?.is_truthy() {
            self.execute(then_branch)
        } else if let Some(else_branch) = else_branch {
            self.execute(else_branch)
        } else {
            Ok(())
        }
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<(), Error> {
        while self.evaluate(condition)?.is_truthy() {
            self.execute(body)?;
        }
        Ok(())
    }

    fn visit_return_stmt(&mut self, _keyword: &Token, value: &Option<Expr>) -> Result<(), Error> {
        let value = match value {
            Some(expr) => self.evaluate(expr)?,
            None => Object::Nil,
        };
        Err(Error::Return { value })
    }

    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        let environment = Rc::new(RefCell::new(Environment::with_enclosing(&self.environment)));
        self.execute_block(statements, environment)
    }

    fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>) -> Result<(), Error> {
        let value = match initializer {
            Some(expr) => self.evaluate(expr)?,
            None => Object::Nil,
        };
        self.environment.borrow_mut().define(name.lexeme.clone(), value);
        Ok(())
    }

    fn visit_function_stmt(&mut self, name: &Token, params: &[Token], body: &[Stmt]) -> Result<(), Error> {
        let declaration = Rc::new(LoxFunctionData {
            name: name.clone(),
            params: params.to_vec(),
            body: body.to_vec(),
            is_initializer: false,
        });
        let function = Function::user(declaration, Rc::clone(&self.environment));
        self.environment
            .borrow_mut()
            .define(name.lexeme.clone(), Object::Callable(function));
        Ok(())
    }

    fn visit_class_stmt(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Stmt],
    ) -> Result<(), Error> {
        let superclass_class = match superclass {
            Some(sc_expr @ Expr::Variable { name: super_name, .. }) => match self.evaluate(sc_expr)? {
                Object::Class(class) => Some(class),
                _ => {
                    return Err(Error::Runtime {
                        token: super_name.clone(),
                        message: "Superclass must be a class.".to_string(),
                    });
                }
            },
            Some(_) => unreachable!("parser only ever produces a Variable superclass expression"),
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(name.lexeme.clone(), Object::Nil);

        // If there's a superclass, methods close over a frame binding
        // `super`, nested between the class's declaring scope and the
        // method's own `this` frame.
        let previous_environment = if let Some(ref superclass_class) = superclass_class {
            let environment = Rc::new(RefCell::new(Environment::with_enclosing(&self.environment)));
            environment
                .borrow_mut()
                .define("super", Object::Class(Rc::clone(superclass_class)));
            Some(std::mem::replace(&mut self.environment, environment))
        } else {
            None
        };

        let mut class_methods: HashMap<String, Function> = HashMap::new();
        for method in methods {
            if let Stmt::Function { name: method_name, params, body } = method {
                let declaration = Rc::new(LoxFunctionData {
                    name: method_name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    is_initializer: method_name.lexeme == "init",
                });
                let function = Function::user(declaration, Rc::clone(&self.environment));
                class_methods.insert(method_name.lexeme.clone(), function);
            }
        }

        let class = Rc::new(RefCell::new(LoxClass {
            name: name.lexeme.clone(),
            superclass: superclass_class,
            methods: class_methods,
        }));

        if let Some(previous_environment) = previous_environment {
            self.environment = previous_environment;
        }

        self.environment
            .borrow_mut()
            .assign(name, Object::Class(class))?;
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
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    // Hands the interpreter a `Write` backed by a `Vec<u8>` it shares with
    // the caller, so a test can inspect what `print` actually wrote after
    // the run completes.
    #[derive(Clone, Default)]
    struct Sink(Rc<RefCell<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    // Runs a program to completion and returns everything it printed,
    // one entry per `print` statement, alongside the diagnostics.
    fn run(source: &str) -> (Vec<String>, Diagnostics) {
        let diagnostics = Diagnostics::new(source.to_string());
        let tokens = Scanner::new(source.to_string(), &diagnostics).scan_tokens();
        let statements = Parser::new(&tokens, &diagnostics).parse();
        let sink = Sink::default();
        let mut interpreter = Interpreter::with_stdout(Box::new(sink.clone()));
        Resolver::new(&mut interpreter, &diagnostics).resolve_stmts(&statements);
        if !diagnostics.had_error() {
            interpreter.interpret(&statements, &diagnostics);
        }
        let output = String::from_utf8(sink.0.borrow().clone()).expect("printed output is valid utf8");
        let lines = output.lines().map(str::to_string).collect();
        (lines, diagnostics)
    }

    #[test]
    fn arithmetic_respects_precedence() {
        let (printed, diagnostics) = run("print 1 + 2 * 3;");
        assert!(!diagnostics.had_error());
        assert_eq!(printed, vec!["7"]);
    }

    #[test]
    fn string_concatenation_with_plus() {
        let (printed, diagnostics) = run(r#"print "a" + "b";"#);
        assert!(!diagnostics.had_error());
        assert_eq!(printed, vec!["ab"]);
    }

    #[test]
    fn adding_number_and_string_is_a_runtime_error() {
        let (printed, diagnostics) = run(r#"print 1 + "a";"#);
        assert!(diagnostics.had_error());
        assert!(printed.is_empty());
    }

    #[test]
    fn closures_capture_their_declaring_environment() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun counter() {
                    i = i + 1;
                    return i;
                }
                return counter;
            }
            var counter = makeCounter();
            print counter();
            print counter();
        "#;
        let (printed, diagnostics) = run(source);
        assert!(!diagnostics.had_error());
        assert_eq!(printed, vec!["1", "2"]);
    }

    #[test]
    fn class_instances_store_and_retrieve_fields() {
        let source = r#"
            class Bagel {}
            var bagel = Bagel();
            bagel.flavor = "plain";
            print bagel.flavor;
        "#;
        let (printed, diagnostics) = run(source);
        assert!(!diagnostics.had_error());
        assert_eq!(printed, vec!["plain"]);
    }

    #[test]
    fn init_always_returns_bound_this() {
        let source = r#"
            class Thing {
                init(value) {
                    this.value = value;
                }
            }
            var t = Thing(42);
            print t.value;
        "#;
        let (printed, diagnostics) = run(source);
        assert!(!diagnostics.had_error());
        assert_eq!(printed, vec!["42"]);
    }

    #[test]
    fn superclass_methods_are_inherited_and_overridable() {
        let source = r#"
            class Animal {
                speak() { return "animal noise"; }
            }
            class Dog < Animal {
                speak() {
                    return super.speak();
                }
            }
            print Dog().speak();
        "#;
        let (printed, diagnostics) = run(source);
        assert!(!diagnostics.had_error());
        assert_eq!(printed, vec!["animal noise"]);
    }

    #[test]
    fn subclass_override_runs_instead_of_superclass_method() {
        let source = r#"
            class Animal {
                speak() { return "..."; }
            }
            class Dog < Animal {
                speak() { return "Woof"; }
            }
            print Dog().speak();
        "#;
        let (printed, diagnostics) = run(source);
        assert!(!diagnostics.had_error());
        assert_eq!(printed, vec!["Woof"]);
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        let (printed, diagnostics) = run("var x = 1; x();");
        assert!(diagnostics.had_error());
        assert!(printed.is_empty());
    }

    #[test]
    fn undefined_global_read_is_a_runtime_error() {
        let (printed, diagnostics) = run("print undeclared;");
        assert!(diagnostics.had_error());
        assert!(printed.is_empty());
    }
}
