use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One frame of the scope chain.
///
/// Frames are shared (`Rc`) and interior-mutable (`RefCell`) because closures
/// keep their defining frame alive past block exit; the chain is a DAG, not a
/// stack.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Bind `name` in this frame, overwriting any existing binding.
    ///
    /// Overwriting is how `var x; var x;` works at the global scope.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            Some(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            None
        }
    }

    pub fn assign(&mut self, name: &str, value: Value) -> Option<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Some(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            None
        }
    }

    /// Read `name` from the frame exactly `distance` hops up the chain.
    ///
    /// No further walking happens in that frame; the resolver guarantees the
    /// binding is there.
    pub fn get_at(&self, distance: usize, name: &str) -> Option<Value> {
        if distance == 0 {
            self.values.get(name).cloned()
        } else {
            self.enclosing
                .as_ref()?
                .borrow()
                .get_at(distance - 1, name)
        }
    }

    /// Write `name` in the frame exactly `distance` hops up the chain.
    pub fn assign_at(&mut self, distance: usize, name: &str, value: Value) -> Option<()> {
        if distance == 0 {
            if self.values.contains_key(name) {
                self.values.insert(name.to_string(), value);
                Some(())
            } else {
                None
            }
        } else {
            self.enclosing
                .as_ref()?
                .borrow_mut()
                .assign_at(distance - 1, name, value)
        }
    }
}
