//! An interpreter for a small legal-themed scripting language.
//!
//! Programs are wrapped in `BEGIN_LICENSE_AGREEMENT` / `END_LICENSE_AGREEMENT`
//! and run top to bottom against a single global environment:
//!
//! ```text
//! BEGIN_LICENSE_AGREEMENT
//! SUMMON defendant
//! defendant = 3 * 2 + 1
//! DELIVER VERDICT Value is (defendant)
//! END_LICENSE_AGREEMENT
//! ```
//!
//! Source goes through [`lexer`], then [`parse`], then [`evaluate`]; the
//! [`run`] module strings the phases together.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod environment;
pub mod evaluate;
pub mod function;
pub mod lexer;
pub mod parse;
pub mod run;
mod stack;
pub mod verdict;

pub use evaluate::{Evaluate, Flow, RuntimeError, Value};
pub use lexer::LexError;
pub use parse::ParseError;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory that evidence and verdict file names are resolved against.
    pub base_dir: PathBuf,
    /// Passes a legal loophole may make before it is cut off.
    pub max_loop_iterations: usize,
    /// How deeply statutes may invoke one another.
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_dir: PathBuf::from("."),
            max_loop_iterations: 10_000,
            max_call_depth: 256,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("IOError: Could not read source file '{path}': {source}")]
    Source { path: String, source: io::Error },
}

impl Error {
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Lex(_) => "LexError",
            Error::Parse(_) => "ParseError",
            Error::Runtime(error) => error.kind(),
            Error::Source { .. } => "IOError",
        }
    }

    /// 65 for malformed source, 74 for I/O failures, 70 for everything that
    /// goes wrong while running.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            "LexError" | "ParseError" => 65,
            "IOError" => 74,
            _ => 70,
        }
    }
}
