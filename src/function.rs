use crate::{
    evaluate::{Evaluate, Flow, RuntimeError},
    lexer::Token,
    parse::Stmt,
};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

/// A user-defined routine. No parameters, no return value, no frame of its
/// own: the body runs against the caller's environment.
pub struct Statute {
    name: Token,
    body: Rc<[Stmt]>,
}

impl Statute {
    pub fn new(name: Token, body: Rc<[Stmt]>) -> Self {
        Statute { name, body }
    }

    pub fn name(&self) -> &str {
        &self.name.lexeme
    }

    pub fn line(&self) -> usize {
        self.name.line
    }

    pub fn call<W: Write>(&self, interpreter: &mut Evaluate<W>) -> Result<Flow, RuntimeError> {
        interpreter.execute_block(&self.body)
    }
}

impl fmt::Display for Statute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<statute {}>", self.name.lexeme)
    }
}

#[derive(Default)]
pub struct StatuteRegistry {
    statutes: HashMap<String, Rc<Statute>>,
}

impl StatuteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a statute. A name can only ever be enacted once.
    pub fn define(&mut self, name: &Token, body: Rc<[Stmt]>) -> Result<(), RuntimeError> {
        if let Some(existing) = self.statutes.get(&name.lexeme) {
            return Err(RuntimeError::Redefinition {
                name: name.lexeme.clone(),
                line: name.line,
                column: name.column,
                first_line: existing.line(),
            });
        }
        self.statutes.insert(
            name.lexeme.clone(),
            Rc::new(Statute::new(name.clone(), body)),
        );
        Ok(())
    }

    pub fn get(&self, name: &Token) -> Result<Rc<Statute>, RuntimeError> {
        self.statutes
            .get(&name.lexeme)
            .cloned()
            .ok_or_else(|| RuntimeError::Name {
                message: format!("Statute '{}' has not been defined.", name.lexeme),
                line: name.line,
                column: name.column,
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.statutes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.statutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statutes.is_empty()
    }
}
