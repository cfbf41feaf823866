use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::{error::Error, object::Object, token::Token};

/// A single frame in the environment chain. Frames are shared: a function
/// value's `closure` field is a handle to the frame that was
/// current when the function was declared, and calling the function pushes
/// a fresh frame on top of that handle rather than on top of the caller's
/// current chain.
pub struct Environment {
    values: HashMap<String, Object>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: &Rc<RefCell<Environment>>) -> Self {
        Self {
            values: HashMap::new(),
            enclosing: Some(Rc::clone(enclosing)),
        }
    }

    pub fn define(&mut self, name: impl Into<String>, value: Object) {
        self.values.insert(name.into(), value);
    }

    /// Chain-walking lookup, used only for the globals frame (no resolver
    /// depth is ever recorded for a global).
    pub fn get(&self, name: &Token) -> Result<Object, Error> {
        let key = &*name.lexeme;
        if let Some(value) = self.values.get(key) {
            Ok(value.clone())
        } else if let Some(ref enclosing) = self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: format!("Undefined variable '{key}'."),
            })
        }
    }

    pub fn assign(&mut self, name: &Token, value: Object) -> Result<(), Error> {
        let key = &*name.lexeme;
        if self.values.contains_key(key) {
            self.values.insert(name.lexeme.clone(), value);
            Ok(())
        } else if let Some(ref enclosing) = self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: format!("Undefined variable '{key}'."),
            })
        }
    }

    /// Walk `depth` enclosing links from `env` and return the frame handle
    /// found there. `depth` is the value the resolver recorded for the
    /// reference being looked up.
    pub fn ancestor(env: &Rc<RefCell<Environment>>, depth: usize) -> Rc<RefCell<Environment>> {
        let mut frame = Rc::clone(env);
        for _ in 0..depth {
            let next = frame
                .borrow()
                .enclosing
                .as_ref()
                .expect("resolver depth exceeds environment chain length")
                .clone();
            frame = next;
        }
        frame
    }

    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        depth: usize,
        name: &str,
    ) -> Option<Object> {
        Environment::ancestor(env, depth)
            .borrow()
            .values
            .get(name)
            .cloned()
    }

    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        depth: usize,
        name: &Token,
        value: Object,
    ) -> Result<(), Error> {
        Environment::ancestor(env, depth)
            .borrow_mut()
            .values
            .insert(name.lexeme.clone(), value);
        Ok(())
    }
}
