use crate::environment::Environment;
use crate::error::Error;
use crate::interpreter::Interpreter;
use crate::object::Object;
use crate::syntax::Stmt;
use crate::token::Token;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// The immutable parts of a user-defined function or method: shared via
/// `Rc` so that `bind()` can produce a new `Function::User` with a
/// different closure without cloning the body.
pub struct LoxFunctionData {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
    pub is_initializer: bool,
}

#[derive(Clone)]
pub enum Function {
    // Exposed to user code but implemented in the host language. The book
    // calls these "native functions" / foreign functions; we only need
    // this hook for the handful of host-provided globals, `clock` being
    // the one the book itself carries.
    Native {
        name: &'static str,
        arity: usize,
        body: fn(&[Object]) -> Object,
    },

    // LoxFunction in the book.
    User {
        declaration: Rc<LoxFunctionData>,
        closure: Rc<RefCell<Environment>>,
    },
}

impl Function {
    pub fn native(name: &'static str, arity: usize, body: fn(&[Object]) -> Object) -> Self {
        Function::Native { name, arity, body }
    }

    pub fn user(declaration: Rc<LoxFunctionData>, closure: Rc<RefCell<Environment>>) -> Self {
        Function::User { declaration, closure }
    }

    // We pass in the interpreter in case the call needs to recurse back
    // into evaluation (it always does, for user functions). We also give it
    // the list of already-evaluated argument values.
    pub fn call(&self, interpreter: &mut Interpreter, arguments: &[Object]) -> Result<Object, Error> {
        match self {
            Function::Native { body, .. } => Ok(body(arguments)),
            Function::User {
                declaration,
                closure,
            } => {
                // Each call gets its own environment nested under the
                // function's *captured* environment, not the caller's
                // current one — this is what makes recursion and multiple
                // concurrent activations of the same function independent.
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(closure)));
                for (param, argument) in declaration.params.iter().zip(arguments.iter()) {
                    environment
                        .borrow_mut()
                        .define(param.lexeme.clone(), argument.clone());
                }

                let result = interpreter.execute_block(&declaration.body, environment.clone());

                if declaration.is_initializer {
                    // `init()` always yields the instance, regardless of
                    // whether the body hit an explicit bare `return;` or
                    // ran off the end.
                    return Ok(Environment::get_at(closure, 0, "this")
                        .expect("initializer closure always has 'this' bound"));
                }

                match result {
                    Err(Error::Return { value }) => Ok(value),
                    Err(other) => Err(other),
                    Ok(()) => Ok(Object::Nil),
                }
            }
        }
    }

    /// Nests a fresh frame inside the method's original closure, binding
    /// `this` to `instance` in it — a closure-within-a-closure that
    /// produces a bound method.
    pub fn bind(&self, instance: Object) -> Self {
        match self {
            Function::Native { .. } => unreachable!("native functions are never methods"),
            Function::User {
                declaration,
                closure,
            } => {
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(closure)));
                environment.borrow_mut().define("this", instance);
                Function::User {
                    declaration: Rc::clone(declaration),
                    closure: environment,
                }
            }
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Native { arity, .. } => *arity,
            Function::User { declaration, .. } => declaration.params.len(),
        }
    }

    pub fn is_same(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Native { body: a, .. }, Function::Native { body: b, .. }) => {
                std::ptr::eq(*a as *const (), *b as *const ())
            }
            (
                Function::User {
                    declaration: a,
                    closure: ca,
                },
                Function::User {
                    declaration: b,
                    closure: cb,
                },
            ) => Rc::ptr_eq(a, b) && Rc::ptr_eq(ca, cb),
            _ => false,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Native { name, .. } => write!(f, "<native fn {name}>"),
            Function::User { declaration, .. } => write!(f, "<fn {}>", declaration.name.lexeme),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
