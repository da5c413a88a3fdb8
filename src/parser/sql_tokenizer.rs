//! Splits a base SELECT statement into its clauses.
//!
//! Collections may declare a hand-written `select_sql`. The relational
//! compiler merges generated predicates, joins, ordering and paging into it,
//! so the statement is cut into `select / from / where / group / order /
//! limit` pieces here. Quoted literals and parenthesized groups are kept
//! whole, so keywords inside sub-selects never start a clause.

use crate::error::{RqlError, RqlResult};

const KEYWORDS: &[&str] = &["select", "from", "where", "group", "order", "limit", "delete"];
const QUOTES: &[char] = &['\'', '"', '`'];

pub struct SqlTokenizer<'a> {
    input: &'a str,
    chars: Vec<char>,
    head: usize,
    pending: Option<String>,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '$' | '*')
}

fn is_keyword(token: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(token))
}

impl<'a> SqlTokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            head: 0,
            pending: None,
        }
    }

    fn error(&self, message: impl Into<String>) -> RqlError {
        RqlError::syntax(self.input, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.head).copied()
    }

    /// Next SQL token, or `None` at end of input.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> RqlResult<Option<String>> {
        if let Some(token) = self.pending.take() {
            return Ok(Some(token));
        }
        while self.peek().is_some_and(char::is_whitespace) {
            self.head += 1;
        }
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let start = self.head;

        match c {
            q if QUOTES.contains(&q) => self.skip_quoted(q)?,
            '(' => self.skip_group()?,
            ')' => return Err(self.error(format!("unmatched ')' at {}", start))),
            ',' => self.head += 1,
            c if is_word_char(c) => {
                while self.peek().is_some_and(is_word_char) {
                    self.head += 1;
                }
                if self.peek() == Some('(') {
                    self.skip_group()?;
                }
            }
            _ => {
                while self.peek().is_some_and(|c| {
                    !is_word_char(c)
                        && !c.is_whitespace()
                        && !QUOTES.contains(&c)
                        && !matches!(c, '(' | ')' | ',')
                }) {
                    self.head += 1;
                }
            }
        }
        Ok(Some(self.chars[start..self.head].iter().collect()))
    }

    fn skip_quoted(&mut self, quote: char) -> RqlResult<()> {
        let start = self.head;
        self.head += 1;
        let mut escaped = false;
        loop {
            match self.peek() {
                None => return Err(self.error(format!("unterminated {} quote at {}", quote, start))),
                Some(c) => {
                    self.head += 1;
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == quote {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn skip_group(&mut self) -> RqlResult<()> {
        let start = self.head;
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                q if QUOTES.contains(&q) => {
                    self.skip_quoted(q)?;
                    continue;
                }
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        self.head += 1;
                        return Ok(());
                    }
                }
                _ => {}
            }
            self.head += 1;
        }
        Err(self.error(format!("unmatched '(' at {}", start)))
    }

    /// Tokens of the next clause. A clause starts with a keyword and runs
    /// until the next keyword outside quotes and parentheses.
    pub fn next_clause(&mut self) -> RqlResult<Option<Vec<String>>> {
        let Some(first) = self.next()? else {
            return Ok(None);
        };
        let mut clause = vec![first];
        while let Some(token) = self.next()? {
            if is_keyword(&token) {
                self.pending = Some(token);
                break;
            }
            clause.push(token);
        }
        Ok(Some(clause))
    }
}

/// Join tokens back into SQL text.
pub fn join_tokens(tokens: &[String]) -> String {
    let mut sql = String::new();
    for token in tokens {
        if !sql.is_empty() && token != "," {
            sql.push(' ');
        }
        sql.push_str(token);
    }
    sql
}

/// The clause bodies of a SELECT statement, keywords removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlClauses {
    pub select: String,
    pub from: String,
    pub where_: Option<String>,
    pub group: Option<String>,
    pub order: Option<String>,
    pub limit: Option<String>,
}

impl SqlClauses {
    pub fn parse(sql: &str) -> RqlResult<Self> {
        let mut tokenizer = SqlTokenizer::new(sql);
        let mut clauses = SqlClauses::default();

        while let Some(tokens) = tokenizer.next_clause()? {
            let keyword = tokens[0].to_ascii_lowercase();
            let mut body = &tokens[1..];
            if matches!(keyword.as_str(), "group" | "order")
                && body.first().is_some_and(|t| t.eq_ignore_ascii_case("by"))
            {
                body = &body[1..];
            }
            let text = join_tokens(body);
            match keyword.as_str() {
                "select" => clauses.select = text,
                "from" => clauses.from = text,
                "where" => clauses.where_ = Some(text),
                "group" => clauses.group = Some(text),
                "order" => clauses.order = Some(text),
                "limit" => clauses.limit = Some(text),
                "delete" => {
                    return Err(RqlError::syntax(sql, "DELETE cannot be used as a base query"));
                }
                _ => {
                    return Err(RqlError::syntax(
                        sql,
                        format!("expected a SQL keyword, found '{}'", tokens[0]),
                    ));
                }
            }
        }

        if clauses.select.is_empty() || clauses.from.is_empty() {
            return Err(RqlError::syntax(sql, "base query needs SELECT and FROM"));
        }
        Ok(clauses)
    }
}
