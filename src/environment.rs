use crate::{
    evaluate::{RuntimeError, Value},
    lexer::Token,
};
use std::collections::HashMap;

/// The single global scope. Statute bodies read and write it directly.
#[derive(Debug, Default)]
pub struct Environment {
    map: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            map: HashMap::new(),
        }
    }

    pub fn define(&mut self, name: String, value: Value) {
        self.map.insert(name, value);
    }

    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        match self.map.get(&name.lexeme) {
            Some(val) => Ok(val.clone()),
            None => Err(RuntimeError::Name {
                message: format!("Undefined variable '{}'.", name.lexeme),
                line: name.line,
                column: name.column,
            }),
        }
    }

    /// Adds one to every numeric variable. Text is left as it is.
    pub fn sentence_all(&mut self) {
        for value in self.map.values_mut() {
            if let Value::Number(n) = value {
                *n += 1.0;
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.map.get(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
