use crate::lexer::{Fragment, Token, TokenType};
use crate::stack::ensure_sufficient_stack;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Call {
        callee: Token,
        arguments: Vec<Expr>,
    },
    Grouping {
        expression: Box<Expr>,
    },
    Literal {
        value: Literal,
    },
    Unary {
        operator: Token,
        right: Box<Expr>,
    },
    Variable {
        name: Token,
    },
}

impl Expr {
    pub fn ast_print(&self) -> String {
        match self {
            Expr::Binary {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                left.ast_print(),
                right.ast_print()
            ),
            Expr::Call { callee, arguments } => {
                let arguments: Vec<String> = arguments.iter().map(Expr::ast_print).collect();
                format!("(call {} {})", callee.lexeme, arguments.join(" "))
            }
            Expr::Grouping { expression } => format!("(group {})", expression.ast_print()),
            Expr::Literal { value } => match value {
                Literal::Number(n) => format!("{:?}", n),
                Literal::String(s) => format!("{:?}", s),
            },
            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, right.ast_print())
            }
            Expr::Variable { name } => name.lexeme.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Summon {
        name: Token,
    },
    Swear {
        name: Token,
        value: Expr,
    },
    Assign {
        name: Token,
        value: Expr,
    },
    /// Without a name, every numeric variable is sentenced.
    Sentence {
        name: Option<Token>,
    },
    Verdict {
        keyword: Token,
        template: Vec<Fragment>,
    },
    ReadEvidence {
        keyword: Token,
        path: String,
    },
    WriteVerdict {
        keyword: Token,
        path: String,
    },
    Statute {
        name: Token,
        body: Rc<[Stmt]>,
    },
    Invoke {
        name: Token,
    },
    If {
        keyword: Token,
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    Loophole {
        keyword: Token,
        until: Option<Expr>,
        body: Vec<Stmt>,
    },
    Proceedings,
    CaseDismissed {
        keyword: Token,
    },
}

impl Stmt {
    fn ast_print(&self, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let line = match self {
            Stmt::Summon { name } => format!("(summon {})", name.lexeme),
            Stmt::Swear { name, value } => format!("(swear {} {})", name.lexeme, value.ast_print()),
            Stmt::Assign { name, value } => format!("(= {} {})", name.lexeme, value.ast_print()),
            Stmt::Sentence { name: Some(name) } => format!("(sentence {})", name.lexeme),
            Stmt::Sentence { name: None } => "(sentence *)".to_string(),
            Stmt::Verdict { template, .. } => {
                let parts: Vec<String> = template
                    .iter()
                    .map(|fragment| match fragment {
                        Fragment::Text(text) => format!("{:?}", text),
                        Fragment::Placeholder(name) => format!("({})", name),
                    })
                    .collect();
                format!("(verdict {})", parts.join(" "))
            }
            Stmt::ReadEvidence { path, .. } => format!("(read-evidence {})", path),
            Stmt::WriteVerdict { path, .. } => format!("(write-verdict {})", path),
            Stmt::Statute { name, body } => {
                out.push_str(&format!("{}(statute {}\n", indent, name.lexeme));
                body.iter().for_each(|stmt| stmt.ast_print(depth + 1, out));
                ")".to_string()
            }
            Stmt::Invoke { name } => format!("(invoke {})", name.lexeme),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                out.push_str(&format!("{}(if {}\n", indent, condition.ast_print()));
                then_branch.iter().for_each(|stmt| stmt.ast_print(depth + 1, out));
                if !else_branch.is_empty() {
                    out.push_str(&format!("{}else\n", indent));
                    else_branch.iter().for_each(|stmt| stmt.ast_print(depth + 1, out));
                }
                ")".to_string()
            }
            Stmt::Loophole { until, body, .. } => {
                let until = until
                    .as_ref()
                    .map_or_else(|| "forever".to_string(), |c| format!("until {}", c.ast_print()));
                out.push_str(&format!("{}(loophole {}\n", indent, until));
                body.iter().for_each(|stmt| stmt.ast_print(depth + 1, out));
                ")".to_string()
            }
            Stmt::Proceedings => "(proceedings)".to_string(),
            Stmt::CaseDismissed { .. } => "(case-dismissed)".to_string(),
        };
        out.push_str(&indent);
        out.push_str(&line);
        out.push('\n');
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn ast_print(&self) -> String {
        let mut out = String::new();
        for stmt in &self.statements {
            stmt.ast_print(0, &mut out);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}:{column}] ParseError: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

type Result<T> = std::result::Result<T, ParseError>;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    // Line of the statement being parsed. Statements never span lines.
    line: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| &t.token_type) != Some(&TokenType::Eof) {
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
            tokens.push(Token {
                token_type: TokenType::Eof,
                lexeme: String::new(),
                line,
                column,
            });
        }
        Parser {
            tokens,
            current: 0,
            line: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Program> {
        let begin = self.peek().clone();
        if begin.token_type != TokenType::BEGIN_LICENSE_AGREEMENT {
            return Err(self.error(&begin, "Program must begin with BEGIN_LICENSE_AGREEMENT."));
        }

        let last = &self.tokens[self.tokens.len().saturating_sub(2)];
        if self.tokens.len() < 3 || last.token_type != TokenType::END_LICENSE_AGREEMENT {
            return Err(self.error(last, "Program must end with END_LICENSE_AGREEMENT."));
        }

        self.terminator()?;
        let statements = self.block(&[TokenType::END_LICENSE_AGREEMENT], &begin)?;
        self.terminator()?;

        let trailing = self.peek().clone();
        if trailing.token_type != TokenType::Eof {
            return Err(self.error(
                &trailing,
                &format!("Unexpected '{}' after END_LICENSE_AGREEMENT.", trailing.lexeme),
            ));
        }

        Ok(Program { statements })
    }

    fn block(&mut self, terminators: &[TokenType], opener: &Token) -> Result<Vec<Stmt>> {
        let mut statements = Vec::new();
        loop {
            let token = self.peek().clone();
            if terminators.contains(&token.token_type) {
                return Ok(statements);
            }
            match token.token_type {
                TokenType::Eof | TokenType::END_LICENSE_AGREEMENT => {
                    return Err(self.error(
                        &token,
                        &format!(
                            "Unterminated '{}' opened at line {}.",
                            opener.lexeme, opener.line
                        ),
                    ))
                }
                _ => statements.push(ensure_sufficient_stack(|| self.statement())?),
            }
        }
    }

    fn statement(&mut self) -> Result<Stmt> {
        let token = self.advance();
        self.line = token.line;

        let stmt = match token.token_type.clone() {
            TokenType::SUMMON => Stmt::Summon {
                name: self.identifier("Expect variable name after SUMMON.")?,
            },
            TokenType::SWEAR => {
                let name = self.identifier("Expect variable name after SWEAR.")?;
                self.consume(TokenType::TO, "Expect 'TO' after sworn variable name.")?;
                Stmt::Swear {
                    name,
                    value: self.expression()?,
                }
            }
            TokenType::SENTENCE => Stmt::Sentence {
                name: if self.on_line().is_some() {
                    Some(self.identifier("Expect variable name after SENTENCE.")?)
                } else {
                    None
                },
            },
            TokenType::DELIVER_VERDICT => {
                let template = match self.on_line().map(|t| t.token_type.clone()) {
                    Some(TokenType::VERDICT(fragments)) => {
                        self.advance();
                        fragments
                    }
                    _ => Vec::new(),
                };
                Stmt::Verdict {
                    keyword: token,
                    template,
                }
            }
            TokenType::READ_EVIDENCE => Stmt::ReadEvidence {
                path: self.path("Expect evidence file name after READ_EVIDENCE.")?,
                keyword: token,
            },
            TokenType::WRITE_VERDICT => Stmt::WriteVerdict {
                path: self.path("Expect verdict file name after WRITE_VERDICT.")?,
                keyword: token,
            },
            TokenType::INVOKE => Stmt::Invoke {
                name: self.identifier("Expect statute name after INVOKE.")?,
            },
            TokenType::DEFINE_STATUTE => {
                let name = self.identifier("Expect statute name after DEFINE STATUTE.")?;
                self.end_of_line()?;
                let body = self.block(&[TokenType::END_STATUTE], &token)?;
                self.terminator()?;
                return Ok(Stmt::Statute {
                    name,
                    body: body.into(),
                });
            }
            TokenType::IF => {
                let condition = self.condition()?;
                self.end_of_line()?;
                let then_branch = self.block(&[TokenType::ELSE, TokenType::END_IF], &token)?;
                let else_branch = if self.peek().token_type == TokenType::ELSE {
                    self.terminator()?;
                    self.block(&[TokenType::END_IF], &token)?
                } else {
                    Vec::new()
                };
                self.terminator()?;
                return Ok(Stmt::If {
                    keyword: token,
                    condition,
                    then_branch,
                    else_branch,
                });
            }
            TokenType::COMMENCE_LEGAL_LOOPHOLE => {
                let until = match self.match_token(&[TokenType::UNTIL]) {
                    Some(_) => Some(self.condition()?),
                    None => None,
                };
                self.end_of_line()?;
                let body = self.block(&[TokenType::END_LEGAL_LOOPHOLE], &token)?;
                self.terminator()?;
                return Ok(Stmt::Loophole {
                    keyword: token,
                    until,
                    body,
                });
            }
            TokenType::CASE_DISMISSED => Stmt::CaseDismissed { keyword: token },
            TokenType::COMMENCE_LEGAL_PROCEEDINGS => Stmt::Proceedings,
            TokenType::IDENTIFIER(_) => {
                if self.match_token(&[TokenType::EQUAL]).is_some() {
                    Stmt::Assign {
                        name: token,
                        value: self.expression()?,
                    }
                } else {
                    Stmt::Invoke { name: token }
                }
            }
            TokenType::ELSE
            | TokenType::END_IF
            | TokenType::END_STATUTE
            | TokenType::END_LEGAL_LOOPHOLE => {
                return Err(self.error(
                    &token,
                    &format!("'{}' without a matching opener.", token.lexeme),
                ))
            }
            _ => {
                return Err(self.error(
                    &token,
                    &format!("Unexpected '{}' at start of statement.", token.lexeme),
                ))
            }
        };

        self.end_of_line()?;
        Ok(stmt)
    }

    fn condition(&mut self) -> Result<Expr> {
        let left = self.expression()?;
        if let Some(op) = self.match_token(&[
            TokenType::EQUAL_EQUAL,
            TokenType::BANG_EQUAL,
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let right = self.expression()?;
            return Ok(Expr::Binary {
                left: Box::new(left),
                operator: op,
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn expression(&mut self) -> Result<Expr> {
        ensure_sufficient_stack(|| self.term())
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;
        while let Some(op) = self.match_token(&[TokenType::MINUS, TokenType::PLUS]) {
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator: op,
                right: Box::new(right),
            }
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;
        while let Some(op) = self.match_token(&[TokenType::SLASH, TokenType::STAR]) {
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator: op,
                right: Box::new(right),
            }
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if let Some(op) = self.match_token(&[TokenType::MINUS]) {
            let right = ensure_sufficient_stack(|| self.unary())?;
            return Ok(Expr::Unary {
                operator: op,
                right: Box::new(right),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = match self.on_line() {
            Some(token) => token.clone(),
            None => {
                let previous = self.previous().clone();
                return Err(self.error(
                    &previous,
                    &format!("Expect expression after '{}'.", previous.lexeme),
                ));
            }
        };

        match token.token_type {
            TokenType::NUMBER(n) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::Number(n),
                })
            }
            TokenType::STRING(ref s) => {
                self.advance();
                Ok(Expr::Literal {
                    value: Literal::String(s.clone()),
                })
            }
            TokenType::IDENTIFIER(_) => {
                self.advance();
                if self.match_token(&[TokenType::LEFT_PAREN]).is_some() {
                    return self.finish_call(token);
                }
                Ok(Expr::Variable { name: token })
            }
            TokenType::LEFT_PAREN => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;
                Ok(Expr::Grouping {
                    expression: Box::new(expr),
                })
            }
            _ => Err(self.error(&token, "Expected expression.")),
        }
    }

    fn finish_call(&mut self, callee: Token) -> Result<Expr> {
        let mut arguments = Vec::new();
        if self.match_token(&[TokenType::RIGHT_PAREN]).is_some() {
            return Ok(Expr::Call { callee, arguments });
        }
        loop {
            arguments.push(self.expression()?);
            if self.match_token(&[TokenType::COMMA]).is_none() {
                break;
            }
        }
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;
        Ok(Expr::Call { callee, arguments })
    }

    fn identifier(&mut self, message: &str) -> Result<Token> {
        match self.on_line().cloned() {
            Some(token) if matches!(token.token_type, TokenType::IDENTIFIER(_)) => {
                Ok(self.advance())
            }
            Some(token) => Err(self.error(&token, message)),
            None => Err(self.error(self.previous(), message)),
        }
    }

    fn path(&mut self, message: &str) -> Result<String> {
        match self.on_line().map(|t| t.token_type.clone()) {
            Some(TokenType::PATH(path)) => {
                self.advance();
                Ok(path)
            }
            _ => Err(self.error(self.previous(), message)),
        }
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<Token> {
        if let Some(token) = self.match_token(&[token_type]) {
            return Ok(token);
        }
        match self.on_line() {
            Some(token) => Err(self.error(token, message)),
            None => Err(self.error(self.previous(), message)),
        }
    }

    /// Consumes a block keyword (`ELSE`, `END IF`, ...) that must stand alone
    /// on its line.
    fn terminator(&mut self) -> Result<Token> {
        let token = self.advance();
        self.line = token.line;
        self.end_of_line()?;
        Ok(token)
    }

    fn end_of_line(&self) -> Result<()> {
        match self.on_line() {
            Some(token) => Err(self.error(
                token,
                &format!("Unexpected '{}' after end of statement.", token.lexeme),
            )),
            None => Ok(()),
        }
    }

    fn match_token(&mut self, token_types: &[TokenType]) -> Option<Token> {
        let matched = self
            .on_line()
            .is_some_and(|token| token_types.contains(&token.token_type));
        matched.then(|| self.advance())
    }

    /// The next token, if it continues the current statement's line.
    fn on_line(&self) -> Option<&Token> {
        let token = self.peek();
        (token.token_type != TokenType::Eof && token.line == self.line).then_some(token)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.current].clone();
        if token.token_type != TokenType::Eof {
            self.current += 1;
        }
        token
    }

    fn error(&self, token: &Token, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            line: token.line,
            column: token.column,
        }
    }
}

pub fn parse(tokens: Vec<Token>) -> Result<Program> {
    Parser::new(tokens).parse()
}
