use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

#[allow(non_camel_case_types)]
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // Grouping tokens
    LEFT_PAREN,
    RIGHT_PAREN,
    COMMA,

    // Single-character tokens
    STAR,
    PLUS,
    MINUS,
    SLASH,

    // One or two character tokens
    EQUAL,
    EQUAL_EQUAL,
    BANG_EQUAL,
    LESS,
    LESS_EQUAL,
    GREATER,
    GREATER_EQUAL,

    // Literals
    STRING(String),
    NUMBER(f64),
    IDENTIFIER(String),

    // Rest-of-line payloads
    VERDICT(Vec<Fragment>),
    PATH(String),

    // Keywords
    BEGIN_LICENSE_AGREEMENT,
    END_LICENSE_AGREEMENT,
    COMMENCE_LEGAL_PROCEEDINGS,
    SUMMON,
    SWEAR,
    TO,
    SENTENCE,
    DELIVER_VERDICT,
    READ_EVIDENCE,
    WRITE_VERDICT,
    DEFINE_STATUTE,
    END_STATUTE,
    INVOKE,
    COMMENCE_LEGAL_LOOPHOLE,
    UNTIL,
    END_LEGAL_LOOPHOLE,
    IF,
    ELSE,
    END_IF,
    CASE_DISMISSED,

    Eof,
}

/// A piece of verdict text. Placeholders are resolved when the verdict is
/// delivered, never while lexing.
#[derive(Debug, PartialEq, Clone)]
pub enum Fragment {
    Text(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}:{column}] LexError: {message}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

fn keywords(key: &str) -> Option<TokenType> {
    match key {
        "BEGIN_LICENSE_AGREEMENT" => Some(TokenType::BEGIN_LICENSE_AGREEMENT),
        "END_LICENSE_AGREEMENT" => Some(TokenType::END_LICENSE_AGREEMENT),
        "COMMENCE_LEGAL_PROCEEDINGS" => Some(TokenType::COMMENCE_LEGAL_PROCEEDINGS),
        "SUMMON" => Some(TokenType::SUMMON),
        "SWEAR" => Some(TokenType::SWEAR),
        "TO" => Some(TokenType::TO),
        "SENTENCE" => Some(TokenType::SENTENCE),
        "READ_EVIDENCE" => Some(TokenType::READ_EVIDENCE),
        "WRITE_VERDICT" => Some(TokenType::WRITE_VERDICT),
        "INVOKE" => Some(TokenType::INVOKE),
        "UNTIL" => Some(TokenType::UNTIL),
        "IF" => Some(TokenType::IF),
        "ELSE" => Some(TokenType::ELSE),
        "CASE_DISMISSED" => Some(TokenType::CASE_DISMISSED),
        _ => None,
    }
}

/// Two-word keywords. These win over the single-word reading of `first`.
fn compound_keywords(first: &str, second: &str) -> Option<TokenType> {
    match (first, second) {
        ("DELIVER", "VERDICT") => Some(TokenType::DELIVER_VERDICT),
        ("DEFINE", "STATUTE") => Some(TokenType::DEFINE_STATUTE),
        ("END", "STATUTE") => Some(TokenType::END_STATUTE),
        ("END", "LEGAL_LOOPHOLE") => Some(TokenType::END_LEGAL_LOOPHOLE),
        ("END", "IF") => Some(TokenType::END_IF),
        ("COMMENCE", "LEGAL_LOOPHOLE") => Some(TokenType::COMMENCE_LEGAL_LOOPHOLE),
        _ => None,
    }
}

pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {
            chars.all(|ch| ch == '_' || ch.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

/// Splits verdict text into literal runs and `(identifier)` placeholders.
/// Parenthesized text that is not a bare identifier stays literal.
pub fn split_template(text: &str) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        match after.find(')') {
            Some(close) if is_identifier(&after[..close]) => {
                literal.push_str(&rest[..open]);
                if !literal.is_empty() {
                    fragments.push(Fragment::Text(std::mem::take(&mut literal)));
                }
                fragments.push(Fragment::Placeholder(after[..close].to_string()));
                rest = &after[close + 1..];
            }
            _ => {
                literal.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        fragments.push(Fragment::Text(literal));
    }
    fragments
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    pub fn lex(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens: Vec<Token> = Vec::new();

        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                self.advance();
                continue;
            }

            let (line, column) = (self.line, self.column);
            self.advance();
            let token = self.scan_token(ch, line, column)?;
            let rest_of_line = matches!(
                token.token_type,
                TokenType::DELIVER_VERDICT | TokenType::READ_EVIDENCE | TokenType::WRITE_VERDICT
            );
            let wants_verdict = token.token_type == TokenType::DELIVER_VERDICT;
            tokens.push(token);

            if rest_of_line {
                if let Some((text, line, column)) = self.rest_of_line() {
                    let token_type = if wants_verdict {
                        TokenType::VERDICT(split_template(&text))
                    } else {
                        TokenType::PATH(text.clone())
                    };
                    tokens.push(self.make_token(token_type, &text, line, column));
                }
            }
        }

        tokens.push(self.make_token(TokenType::Eof, "", self.line, self.column));
        Ok(tokens)
    }

    fn scan_token(&mut self, ch: char, line: usize, column: usize) -> Result<Token, LexError> {
        let single = match ch {
            '(' => Some(TokenType::LEFT_PAREN),
            ')' => Some(TokenType::RIGHT_PAREN),
            ',' => Some(TokenType::COMMA),
            '*' => Some(TokenType::STAR),
            '+' => Some(TokenType::PLUS),
            '-' => Some(TokenType::MINUS),
            '/' => Some(TokenType::SLASH),
            _ => None,
        };
        if let Some(token_type) = single {
            return Ok(self.make_token(token_type, &ch.to_string(), line, column));
        }

        match ch {
            // Two-character tokens
            '=' => Ok(self.match_next(ch, '=', TokenType::EQUAL_EQUAL, TokenType::EQUAL, line, column)),
            '<' => Ok(self.match_next(ch, '=', TokenType::LESS_EQUAL, TokenType::LESS, line, column)),
            '>' => Ok(self.match_next(ch, '=', TokenType::GREATER_EQUAL, TokenType::GREATER, line, column)),
            '!' => {
                if self.chars.peek() == Some(&'=') {
                    self.advance();
                    Ok(self.make_token(TokenType::BANG_EQUAL, "!=", line, column))
                } else {
                    Err(self.error(line, column, "Unexpected character: '!'"))
                }
            }

            '"' => self.scan_string(line, column),
            '0'..='9' => Ok(self.scan_num(ch, line, column)),
            id if id == '_' || id.is_ascii_alphabetic() => Ok(self.scan_identifier(id, line, column)),

            _ => Err(self.error(line, column, &format!("Unexpected character: '{}'", ch))),
        }
    }

    fn scan_string(&mut self, line: usize, column: usize) -> Result<Token, LexError> {
        let mut value = String::new();
        while let Some(&ch) = self.chars.peek() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(self.make_token(
                        TokenType::STRING(value.clone()),
                        &format!("\"{}\"", value),
                        line,
                        column,
                    ));
                }
                '\n' => break,
                _ => {
                    value.push(ch);
                    self.advance();
                }
            }
        }
        Err(self.error(line, column, "Unterminated string."))
    }

    fn scan_num(&mut self, first: char, line: usize, column: usize) -> Token {
        let mut lexeme = String::from(first);
        self.take_digits(&mut lexeme);

        // A '.' only belongs to the number when a digit follows it.
        let mut probe = self.chars.clone();
        if probe.next() == Some('.') && probe.peek().is_some_and(char::is_ascii_digit) {
            self.advance();
            lexeme.push('.');
            self.take_digits(&mut lexeme);
        }

        // Digits with at most one interior '.' always parse.
        let value = lexeme.parse::<f64>().unwrap_or_default();
        self.make_token(TokenType::NUMBER(value), &lexeme, line, column)
    }

    fn take_digits(&mut self, lexeme: &mut String) {
        while let Some(&ch) = self.chars.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            lexeme.push(ch);
            self.advance();
        }
    }

    fn scan_word(&mut self, first: char) -> String {
        let mut word = String::from(first);
        while let Some(&ch) = self.chars.peek() {
            if ch != '_' && !ch.is_ascii_alphanumeric() {
                break;
            }
            word.push(ch);
            self.advance();
        }
        word
    }

    fn scan_identifier(&mut self, first: char, line: usize, column: usize) -> Token {
        let word = self.scan_word(first);

        if let Some((second, consumed)) = self.peek_next_word() {
            if let Some(reserved) = compound_keywords(&word, &second) {
                for _ in 0..consumed {
                    self.advance();
                }
                return self.make_token(reserved, &format!("{} {}", word, second), line, column);
            }
        }

        match keywords(&word) {
            Some(reserved) => self.make_token(reserved, &word, line, column),
            None => self.make_token(TokenType::IDENTIFIER(word.clone()), &word, line, column),
        }
    }

    /// Looks past spaces and tabs on the current line for the next word.
    /// Returns the word and how many characters reaching its end would consume.
    fn peek_next_word(&self) -> Option<(String, usize)> {
        let mut probe = self.chars.clone();
        let mut consumed = 0;
        while let Some(&ch) = probe.peek() {
            if ch != ' ' && ch != '\t' {
                break;
            }
            probe.next();
            consumed += 1;
        }
        if consumed == 0 {
            return None;
        }

        let mut word = String::new();
        while let Some(&ch) = probe.peek() {
            if ch != '_' && !ch.is_ascii_alphanumeric() {
                break;
            }
            word.push(ch);
            probe.next();
            consumed += 1;
        }
        if word.is_empty() {
            None
        } else {
            Some((word, consumed))
        }
    }

    /// Consumes the remainder of the current line, returning it trimmed along
    /// with the position of its first character. Blank remainders yield `None`.
    fn rest_of_line(&mut self) -> Option<(String, usize, usize)> {
        while let Some(&ch) = self.chars.peek() {
            if ch == '\n' || !ch.is_whitespace() {
                break;
            }
            self.advance();
        }
        let (line, column) = (self.line, self.column);

        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch == '\n' {
                break;
            }
            text.push(ch);
            self.advance();
        }

        let text = text.trim_end().to_string();
        if text.is_empty() {
            None
        } else {
            Some((text, line, column))
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn match_next(
        &mut self,
        current: char,
        expected: char,
        double_type: TokenType,
        single_type: TokenType,
        line: usize,
        column: usize,
    ) -> Token {
        let (token_type, lexeme) = if self.chars.peek() == Some(&expected) {
            self.advance();
            (double_type, format!("{}{}", current, expected))
        } else {
            (single_type, current.to_string())
        };

        self.make_token(token_type, &lexeme, line, column)
    }

    fn make_token(&self, token_type: TokenType, lexeme: &str, line: usize, column: usize) -> Token {
        Token {
            token_type,
            lexeme: String::from(lexeme),
            line,
            column,
        }
    }

    fn error(&self, line: usize, column: usize, message: &str) -> LexError {
        LexError {
            message: message.to_string(),
            line,
            column,
        }
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).lex()
}
