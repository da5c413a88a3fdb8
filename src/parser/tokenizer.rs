//! Lexer for RQL clauses.
//!
//! ```text
//! or(state=ga,name='O\,Brien')&sort(-id)
//! ─┬ ──┬── ───┬─── ──────┬──── ┬
//!  │   │      │          │     └── Amp (clause separator)
//!  │   │      │          └── Word with quote '\''
//!  │   │      └── Word, Equals, Word
//!  │   └── Open("or")
//! ```

use crate::error::{RqlError, RqlResult};

const QUOTES: &[char] = &['\'', '"', '`'];
const BOUNDARIES: &[char] = &['(', ')', ',', '=', '&'];
const ESCAPABLE: &[char] = &[',', '=', '\\'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A name immediately followed by `(`.
    Open(String),
    Close,
    Comma,
    Equals,
    Amp,
    /// A literal, identifier or structural argument.
    Word { text: String, quote: Option<char> },
}

impl Token {
    pub fn word(text: impl Into<String>) -> Self {
        Token::Word {
            text: text.into(),
            quote: None,
        }
    }
}

/// Pull-based tokenizer over a single clause or query string.
pub struct Tokenizer<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    /// Tokenize the whole input.
    pub fn tokenize(input: &'a str) -> RqlResult<Vec<Token>> {
        let mut tokenizer = Self::new(input);
        let mut tokens = Vec::new();
        while let Some(token) = tokenizer.next()? {
            tokens.push(token);
        }
        tracing::trace!(input, count = tokens.len(), "tokenized clause");
        Ok(tokens)
    }

    fn error(&self, message: impl Into<String>) -> RqlError {
        RqlError::syntax(self.input, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Produce the next token, or `None` at end of input.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> RqlResult<Option<Token>> {
        self.skip_whitespace();
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '(' => return Err(self.error(format!("'(' without a function name at {}", self.pos))),
            ')' => {
                self.pos += 1;
                Token::Close
            }
            ',' => {
                self.pos += 1;
                Token::Comma
            }
            '=' => {
                self.pos += 1;
                Token::Equals
            }
            '&' => {
                self.pos += 1;
                Token::Amp
            }
            q if QUOTES.contains(&q) => self.quoted(q)?,
            _ => self.bare()?,
        };
        Ok(Some(token))
    }

    /// Read the character after a backslash.
    fn escape(&mut self, extra: Option<char>) -> RqlResult<char> {
        let start = self.pos;
        self.pos += 1;
        match self.peek() {
            Some(c) if ESCAPABLE.contains(&c) || Some(c) == extra => {
                self.pos += 1;
                Ok(c)
            }
            Some(c) => Err(self.error(format!("invalid escape '\\{}' at {}", c, start))),
            None => Err(self.error(format!("dangling escape at {}", start))),
        }
    }

    fn quoted(&mut self, quote: char) -> RqlResult<Token> {
        let start = self.pos;
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(self.error(format!("unterminated {} quote at {}", quote, start)));
                }
                Some('\\') => text.push(self.escape(Some(quote))?),
                Some(c) if c == quote => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }

        self.skip_whitespace();
        match self.peek() {
            None => {}
            Some(c) if BOUNDARIES.contains(&c) && c != '(' => {}
            Some(c) => {
                return Err(self.error(format!(
                    "unexpected '{}' after closing quote at {}",
                    c, self.pos
                )));
            }
        }
        Ok(Token::Word {
            text,
            quote: Some(quote),
        })
    }

    fn bare(&mut self) -> RqlResult<Token> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if BOUNDARIES.contains(&c) {
                break;
            }
            if c == '\\' {
                text.push(self.escape(None)?);
            } else {
                text.push(c);
                self.pos += 1;
            }
        }
        let text = text.trim().to_string();

        if self.peek() == Some('(') {
            self.pos += 1;
            return Ok(Token::Open(text));
        }
        Ok(Token::Word { text, quote: None })
    }
}
