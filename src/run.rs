use crate::evaluate::{Evaluate, Flow};
use crate::lexer::{tokenize, TokenType};
use crate::parse::{parse, Program};
use crate::{Config, Error};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SOURCE_EXTENSION: &str = "lspl";

/// Falls back to `<path>.lspl` when `path` itself does not exist.
pub fn locate(path: &Path) -> PathBuf {
    if path.exists() {
        return path.to_path_buf();
    }
    let mut with_extension = path.as_os_str().to_os_string();
    with_extension.push(".");
    with_extension.push(SOURCE_EXTENSION);
    let with_extension = PathBuf::from(with_extension);
    if with_extension.exists() {
        with_extension
    } else {
        path.to_path_buf()
    }
}

pub fn read_source(path: &Path) -> Result<(PathBuf, String), Error> {
    let path = locate(path);
    match fs::read_to_string(&path) {
        Ok(contents) => Ok((path, contents)),
        Err(source) => Err(Error::Source {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Lexes and parses a whole program. Nothing runs until this succeeds.
pub fn compile(source: &str) -> Result<Program, Error> {
    let tokens = tokenize(source)?;
    Ok(parse(tokens)?)
}

pub fn run_source<W: Write>(source: &str, config: Config, out: W) -> Result<Evaluate<W>, Error> {
    let program = compile(source)?;
    let mut evaluate = Evaluate::with_output(config, out);
    let flow = evaluate.run(&program)?;
    debug!(?flow, "program finished");
    Ok(evaluate)
}

pub fn run_file(path: &Path, config: Config) -> Result<Flow, Error> {
    let evaluate = Evaluate::new(config);
    let (flow, _) = run_file_with(path, evaluate)?;
    Ok(flow)
}

/// Runs the program at `path`. The file itself counts as evidence being
/// read, so a program cannot read itself back in.
pub fn run_file_with<W: Write>(
    path: &Path,
    mut evaluate: Evaluate<W>,
) -> Result<(Flow, Evaluate<W>), Error> {
    let (path, source) = read_source(path)?;
    debug!(path = %path.display(), "running program");
    let program = compile(&source)?;
    evaluate.enter_source(&path);
    let flow = evaluate.run(&program)?;
    Ok((flow, evaluate))
}

/// One line per token: kind, lexeme, and position.
pub fn dump_tokens(source: &str) -> Result<String, Error> {
    let mut out = String::new();
    for token in tokenize(source)? {
        let line = match token.token_type {
            TokenType::STRING(ref s) => format!("STRING {:?}", s),
            TokenType::NUMBER(n) => format!("NUMBER {} {:?}", token.lexeme, n),
            TokenType::IDENTIFIER(ref name) => format!("IDENTIFIER {}", name),
            TokenType::VERDICT(_) => format!("VERDICT {:?}", token.lexeme),
            TokenType::PATH(ref path) => format!("PATH {}", path),
            TokenType::Eof => "EOF".to_string(),
            ref other => format!("{:?} {}", other, token.lexeme),
        };
        out.push_str(&format!("{} @{}:{}\n", line, token.line, token.column));
    }
    Ok(out)
}

pub fn dump_ast(source: &str) -> Result<String, Error> {
    Ok(compile(source)?.ast_print())
}
