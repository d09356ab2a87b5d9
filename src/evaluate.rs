use crate::environment::Environment;
use crate::function::StatuteRegistry;
use crate::lexer::{is_identifier, Fragment, Token, TokenType};
use crate::parse::{Expr, Literal, ParseError, Program, Stmt};
use crate::run::{compile, locate};
use crate::stack::ensure_sufficient_stack;
use crate::verdict::{close_sentence, VerdictBuffer};
use crate::Config;
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(value) => write!(f, "{}", format_number(*value)),
            Value::String(value) => write!(f, "{}", value),
        }
    }
}

/// Renders a number for a verdict: integral values without a fraction,
/// everything else rounded to at most two decimals.
pub fn format_number(n: f64) -> String {
    let fixed = format!("{:.2}", n);
    let trimmed = if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.')
    } else {
        fixed.as_str()
    };
    match trimmed {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

impl Value {
    pub fn to_number(&self, operator: &Token) -> Result<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::String(s) => parse_number(s).ok_or_else(|| RuntimeError::Type {
                message: format!(
                    "Cannot use '{}' as a number with '{}'.",
                    s, operator.lexeme
                ),
                line: operator.line,
                column: operator.column,
            }),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
        }
    }

    /// Reads a value from an evidence data file: numbers when they parse,
    /// otherwise text with surrounding double quotes removed.
    pub fn from_data(raw: &str) -> Value {
        let raw = raw.trim();
        if let Some(n) = parse_number(raw) {
            return Value::Number(n);
        }
        let unquoted = raw
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap_or(raw);
        Value::String(unquoted.to_string())
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("[line {line}:{column}] NameError: {message}")]
    Name {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("[line {line}:{column}] TypeError: {message}")]
    Type {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("[line {line}:{column}] ArithmeticError: {message}")]
    Arithmetic {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("[line {line}:{column}] RedefinitionError: Statute '{name}' is already defined at line {first_line}.")]
    Redefinition {
        name: String,
        line: usize,
        column: usize,
        first_line: usize,
    },

    #[error("[line {line}:{column}] LoopLimitError: Legal loophole did not close within {limit} iterations.")]
    LoopLimit {
        limit: usize,
        line: usize,
        column: usize,
    },

    #[error("[line {line}:{column}] RecursionError: Statute '{name}' nested deeper than {limit} invocations.")]
    Recursion {
        name: String,
        limit: usize,
        line: usize,
        column: usize,
    },

    #[error("[line {line}:{column}] IOError: Could not {action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: String,
        line: usize,
        column: usize,
        source: io::Error,
    },

    #[error("[line {line}:{column}] IOError: Evidence file '{path}' is already being read.")]
    CircularEvidence {
        path: String,
        line: usize,
        column: usize,
    },

    #[error("{source} (in evidence file '{path}')")]
    Evidence {
        path: String,
        source: Box<crate::Error>,
    },
}

impl RuntimeError {
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::Name { .. } => "NameError",
            RuntimeError::Type { .. } => "TypeError",
            RuntimeError::Arithmetic { .. } => "ArithmeticError",
            RuntimeError::Redefinition { .. } => "RedefinitionError",
            RuntimeError::LoopLimit { .. } => "LoopLimitError",
            RuntimeError::Recursion { .. } => "RecursionError",
            RuntimeError::Io { .. } | RuntimeError::CircularEvidence { .. } => "IOError",
            RuntimeError::Evidence { source, .. } => source.kind(),
        }
    }

    fn in_evidence(path: &str, error: impl Into<crate::Error>) -> Self {
        RuntimeError::Evidence {
            path: path.to_string(),
            source: Box::new(error.into()),
        }
    }
}

type Result<T> = std::result::Result<T, RuntimeError>;

/// Whether execution should carry on after a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Proceed,
    Dismissed,
}

pub struct Evaluate<W: Write> {
    environment: Environment,
    statutes: StatuteRegistry,
    verdicts: VerdictBuffer,
    config: Config,
    out: W,
    // Evidence files currently being read, outermost first.
    evidence: Vec<PathBuf>,
    depth: usize,
}

impl Evaluate<io::Stdout> {
    pub fn new(config: Config) -> Self {
        Self::with_output(config, io::stdout())
    }
}

impl<W: Write> Evaluate<W> {
    pub fn with_output(config: Config, out: W) -> Self {
        Evaluate {
            environment: Environment::new(),
            statutes: StatuteRegistry::new(),
            verdicts: VerdictBuffer::new(),
            config,
            out,
            evidence: Vec::new(),
            depth: 0,
        }
    }

    /// Marks `path` as already being read, so evidence that leads back to it
    /// is rejected as circular.
    pub fn enter_source(&mut self, path: &Path) {
        let identity = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.evidence.push(identity);
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn statutes(&self) -> &StatuteRegistry {
        &self.statutes
    }

    pub fn verdicts(&self) -> &VerdictBuffer {
        &self.verdicts
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn run(&mut self, program: &Program) -> Result<Flow> {
        self.execute_block(&program.statements)
    }

    pub(crate) fn execute_block(&mut self, statements: &[Stmt]) -> Result<Flow> {
        ensure_sufficient_stack(|| -> Result<Flow> {
            for stmt in statements {
                if self.execute(stmt)? == Flow::Dismissed {
                    return Ok(Flow::Dismissed);
                }
            }
            Ok(Flow::Proceed)
        })
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Summon { name } => self
                .environment
                .define(name.lexeme.clone(), Value::Number(0.0)),
            Stmt::Swear { name, value } | Stmt::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.environment.define(name.lexeme.clone(), value);
            }
            Stmt::Sentence { name: None } => self.environment.sentence_all(),
            Stmt::Sentence { name: Some(name) } => {
                let current = self.environment.get(name)?.to_number(name)?;
                self.environment
                    .define(name.lexeme.clone(), Value::Number(current + 1.0));
            }
            Stmt::Verdict { keyword, template } => self.visit_verdict_stmt(keyword, template)?,
            Stmt::ReadEvidence { keyword, path } => return self.visit_evidence_stmt(keyword, path),
            Stmt::WriteVerdict { keyword, path } => self.visit_write_stmt(keyword, path)?,
            Stmt::Statute { name, body } => {
                self.statutes.define(name, Rc::clone(body))?;
                debug!(statute = %name.lexeme, line = name.line, "statute enacted");
            }
            Stmt::Invoke { name } => return self.visit_invoke_stmt(name),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let branch = if self.evaluate(condition)?.is_truthy() {
                    then_branch
                } else {
                    else_branch
                };
                return self.execute_block(branch);
            }
            Stmt::Loophole {
                keyword,
                until,
                body,
            } => return self.visit_loophole_stmt(keyword, until.as_ref(), body),
            Stmt::Proceedings => trace!("court is in session"),
            Stmt::CaseDismissed { keyword } => {
                debug!(line = keyword.line, "case dismissed");
                return Ok(Flow::Dismissed);
            }
        }
        Ok(Flow::Proceed)
    }

    fn visit_verdict_stmt(&mut self, keyword: &Token, template: &[Fragment]) -> Result<()> {
        let mut line = String::new();
        for fragment in template {
            match fragment {
                Fragment::Text(text) => line.push_str(text),
                Fragment::Placeholder(name) => {
                    let value = self.environment.lookup(name).ok_or_else(|| RuntimeError::Name {
                        message: format!("Variable '{}' in verdict was never summoned.", name),
                        line: keyword.line,
                        column: keyword.column,
                    })?;
                    line.push_str(&value.to_string());
                }
            }
        }

        let line = close_sentence(line);
        writeln!(self.out, "{}", line).map_err(|source| RuntimeError::Io {
            action: "deliver verdict to",
            path: "standard output".to_string(),
            line: keyword.line,
            column: keyword.column,
            source,
        })?;
        self.verdicts.push(line);
        Ok(())
    }

    fn visit_write_stmt(&mut self, keyword: &Token, path: &str) -> Result<()> {
        let target = self.config.base_dir.join(path);
        self.verdicts
            .write_to(&target)
            .map_err(|source| RuntimeError::Io {
                action: "write verdict to",
                path: target.display().to_string(),
                line: keyword.line,
                column: keyword.column,
                source,
            })?;
        debug!(path = %target.display(), lines = self.verdicts.len(), "verdict written");
        Ok(())
    }

    /// Evidence is either another program, parsed in full before any of it
    /// runs, or a data file of `name = value` lines.
    fn visit_evidence_stmt(&mut self, keyword: &Token, path: &str) -> Result<Flow> {
        let resolved = locate(&self.config.base_dir.join(path));
        let shown = resolved.display().to_string();
        let source = fs::read_to_string(&resolved).map_err(|source| RuntimeError::Io {
            action: "read evidence file",
            path: shown.clone(),
            line: keyword.line,
            column: keyword.column,
            source,
        })?;

        let identity = resolved.canonicalize().unwrap_or_else(|_| resolved.clone());
        if self.evidence.contains(&identity) {
            return Err(RuntimeError::CircularEvidence {
                path: shown,
                line: keyword.line,
                column: keyword.column,
            });
        }

        if !is_program(&source) {
            debug!(path = %shown, "loading evidence data");
            self.load_evidence_data(&shown, &source)?;
            return Ok(Flow::Proceed);
        }

        debug!(path = %shown, "reading evidence program");
        let program = compile(&source).map_err(|error| RuntimeError::in_evidence(&shown, error))?;

        self.evidence.push(identity);
        let flow = self.run(&program);
        self.evidence.pop();
        flow.map_err(|error| RuntimeError::in_evidence(&shown, error))
    }

    fn load_evidence_data(&mut self, shown: &str, source: &str) -> Result<()> {
        for (index, raw) in source.lines().enumerate() {
            let entry = raw.trim();
            if entry.is_empty() {
                continue;
            }
            let malformed = |message: String| {
                RuntimeError::in_evidence(
                    shown,
                    ParseError {
                        message,
                        line: index + 1,
                        column: 1,
                    },
                )
            };

            let (name, value) = entry.split_once('=').ok_or_else(|| {
                malformed(format!("Expect 'name = value' in evidence data, found '{}'.", entry))
            })?;
            let name = name.trim();
            if !is_identifier(name) {
                return Err(malformed(format!(
                    "Invalid variable name '{}' in evidence data.",
                    name
                )));
            }
            self.environment
                .define(name.to_string(), Value::from_data(value));
        }
        Ok(())
    }

    fn visit_invoke_stmt(&mut self, name: &Token) -> Result<Flow> {
        let statute = self.statutes.get(name)?;
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::Recursion {
                name: name.lexeme.clone(),
                limit: self.config.max_call_depth,
                line: name.line,
                column: name.column,
            });
        }

        trace!(statute = %statute, depth = self.depth, "invoking");
        self.depth += 1;
        let flow = statute.call(self);
        self.depth -= 1;
        flow
    }

    /// Post-condition loop: the body always runs once, `UNTIL` is checked
    /// after every full pass.
    fn visit_loophole_stmt(
        &mut self,
        keyword: &Token,
        until: Option<&Expr>,
        body: &[Stmt],
    ) -> Result<Flow> {
        let limit = self.config.max_loop_iterations;
        for iteration in 1..=limit {
            if self.execute_block(body)? == Flow::Dismissed {
                return Ok(Flow::Dismissed);
            }
            if let Some(condition) = until {
                if self.evaluate(condition)?.is_truthy() {
                    debug!(line = keyword.line, iterations = iteration, "legal loophole closed");
                    return Ok(Flow::Proceed);
                }
            }
        }
        Err(RuntimeError::LoopLimit {
            limit,
            line: keyword.line,
            column: keyword.column,
        })
    }

    fn evaluate(&self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| -> Result<Value> {
            match expr {
                Expr::Literal { value } => match value {
                    Literal::Number(n) => Ok(Value::Number(*n)),
                    Literal::String(s) => Ok(Value::String(s.clone())),
                },
                Expr::Grouping { expression } => self.evaluate(expression),
                Expr::Variable { name } => self.environment.get(name),
                Expr::Unary { operator, right } => {
                    let right = self.evaluate(right)?;
                    match operator.token_type {
                        TokenType::MINUS => Ok(Value::Number(-right.to_number(operator)?)),
                        _ => Err(RuntimeError::Type {
                            message: format!("Invalid unary operator '{}'.", operator.lexeme),
                            line: operator.line,
                            column: operator.column,
                        }),
                    }
                }
                Expr::Call { callee, arguments } => {
                    let arguments = arguments
                        .iter()
                        .map(|argument| self.evaluate(argument))
                        .collect::<Result<Vec<Value>>>()?;
                    self.call_builtin(callee, &arguments)
                }
                Expr::Binary {
                    left,
                    operator,
                    right,
                } => {
                    let left = self.evaluate(left)?;
                    let right = self.evaluate(right)?;

                    match operator.token_type {
                        TokenType::PLUS => self.number_operation(&left, &right, |a, b| a + b, operator),
                        TokenType::MINUS => {
                            self.number_operation(&left, &right, |a, b| a - b, operator)
                        }
                        TokenType::STAR => self.number_operation(&left, &right, |a, b| a * b, operator),
                        TokenType::SLASH => {
                            if right.to_number(operator)? == 0.0 {
                                return Err(RuntimeError::Arithmetic {
                                    message: "Division by zero.".to_string(),
                                    line: operator.line,
                                    column: operator.column,
                                });
                            }
                            self.number_operation(&left, &right, |a, b| a / b, operator)
                        }
                        TokenType::GREATER
                        | TokenType::GREATER_EQUAL
                        | TokenType::LESS
                        | TokenType::LESS_EQUAL
                        | TokenType::EQUAL_EQUAL
                        | TokenType::BANG_EQUAL => self.compare(&left, &right, operator),
                        _ => Err(RuntimeError::Type {
                            message: format!("Invalid binary operator '{}'.", operator.lexeme),
                            line: operator.line,
                            column: operator.column,
                        }),
                    }
                }
            }
        })
    }

    fn number_operation<F>(&self, left: &Value, right: &Value, op: F, operator: &Token) -> Result<Value>
    where
        F: Fn(f64, f64) -> f64,
    {
        let a = left.to_number(operator)?;
        let b = right.to_number(operator)?;
        Ok(op(a, b).into())
    }

    /// Two strings compare lexicographically; anything else numerically.
    fn compare(&self, left: &Value, right: &Value, operator: &Token) -> Result<Value> {
        let ordering = match (left, right) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => {
                let a = left.to_number(operator)?;
                let b = right.to_number(operator)?;
                a.partial_cmp(&b).ok_or_else(|| RuntimeError::Type {
                    message: format!("Cannot compare {} and {}.", a, b),
                    line: operator.line,
                    column: operator.column,
                })?
            }
        };

        let verdict = match operator.token_type {
            TokenType::GREATER => ordering == Ordering::Greater,
            TokenType::GREATER_EQUAL => ordering != Ordering::Less,
            TokenType::LESS => ordering == Ordering::Less,
            TokenType::LESS_EQUAL => ordering != Ordering::Greater,
            TokenType::EQUAL_EQUAL => ordering == Ordering::Equal,
            _ => ordering != Ordering::Equal,
        };
        Ok(verdict.into())
    }

    fn call_builtin(&self, callee: &Token, arguments: &[Value]) -> Result<Value> {
        let name = callee.lexeme.as_str();
        if !matches!(name, "abs" | "min" | "max") {
            return Err(RuntimeError::Name {
                message: format!("Unknown function '{}'.", name),
                line: callee.line,
                column: callee.column,
            });
        }

        let numbers = arguments
            .iter()
            .map(|argument| argument.to_number(callee))
            .collect::<Result<Vec<f64>>>()?;

        match (name, numbers.as_slice()) {
            ("abs", [n]) => Ok(Value::Number(n.abs())),
            ("min", [first, rest @ ..]) => Ok(Value::Number(
                rest.iter().fold(*first, |acc, n| acc.min(*n)),
            )),
            ("max", [first, rest @ ..]) => Ok(Value::Number(
                rest.iter().fold(*first, |acc, n| acc.max(*n)),
            )),
            _ => Err(RuntimeError::Type {
                message: format!(
                    "Wrong number of arguments to '{}': got {}.",
                    name,
                    numbers.len()
                ),
                line: callee.line,
                column: callee.column,
            }),
        }
    }
}

/// Evidence that opens with the license wrapper is a program.
fn is_program(source: &str) -> bool {
    source
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .is_some_and(|line| line.starts_with("BEGIN_LICENSE_AGREEMENT"))
}
