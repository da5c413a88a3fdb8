//! RQL parser.
//!
//! Turns URL query clauses into [`Term`] trees.
//!
//! # Syntax Overview
//!
//! ```text
//! eq(orderid,10257)          function form
//! shipcity=Paris             shorthand, eq(shipcity,Paris)
//! freight=gt=30              operator shorthand, gt(freight,30)
//! or(state=ga,state=sc)      shorthand inside and/or/not
//! sort=-orderid              structural shorthand, sort(-orderid)
//! eq(a,1)&sort(b)            clauses joined with '&'
//! ```

pub mod normalize;
pub mod sql_tokenizer;
pub mod tokenizer;


use std::iter::Peekable;
use std::vec::IntoIter;

use crate::ast::functions::{self, COMPARISON, LOGICAL};
use crate::ast::Term;
use crate::error::{RqlError, RqlResult};
pub use normalize::normalize;
pub use sql_tokenizer::{SqlClauses, SqlTokenizer};
pub use tokenizer::{Token, Tokenizer};

/// An argument as written: one or more parts joined by `=`.
type Segment = Vec<Term>;

/// Parse a single clause into a normalized term.
pub fn parse(clause: &str) -> RqlResult<Term> {
    let mut terms = parse_all(clause)?;
    match terms.len() {
        1 => Ok(terms.remove(0)),
        0 => Err(RqlError::syntax(clause, "empty clause")),
        _ => Err(RqlError::syntax(clause, "expected one clause, found '&'")),
    }
}

/// Parse a query string of `&` separated clauses.
pub fn parse_all(input: &str) -> RqlResult<Vec<Term>> {
    let tokens = Tokenizer::tokenize(input)?;
    let mut terms = Vec::new();
    for group in split_clauses(input, tokens)? {
        let mut parser = TermParser {
            clause: input,
            tokens: group.into_iter().peekable(),
        };
        let term = normalize(parser.parse_root()?);
        tracing::debug!(clause = input, term = %term, "parsed clause");
        terms.push(term);
    }
    Ok(terms)
}

/// Parse one query-string parameter. An empty value means the key is a
/// complete clause (`?eq(a,b)`), otherwise `key=value` is parsed.
pub fn parse_param(key: &str, value: &str) -> RqlResult<Term> {
    if value.is_empty() {
        parse(key)
    } else {
        parse(&format!("{}={}", key, value))
    }
}

fn split_clauses(input: &str, tokens: Vec<Token>) -> RqlResult<Vec<Vec<Token>>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;
    for token in tokens {
        match token {
            Token::Amp if depth == 0 => {
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
                continue;
            }
            Token::Amp => {
                return Err(RqlError::syntax(input, "'&' inside a function call"));
            }
            Token::Open(_) => depth += 1,
            Token::Close => depth = depth.saturating_sub(1),
            _ => {}
        }
        current.push(token);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    Ok(groups)
}

struct TermParser<'a> {
    clause: &'a str,
    tokens: Peekable<IntoIter<Token>>,
}

impl TermParser<'_> {
    fn error(&self, message: impl Into<String>) -> RqlError {
        RqlError::syntax(self.clause, message)
    }

    fn parse_root(&mut self) -> RqlResult<Term> {
        let segments = self.parse_segments(None)?;
        let mut segments = segments.into_iter();
        let Some(first) = segments.next() else {
            return Err(self.error("empty clause"));
        };
        let rest: Vec<Segment> = segments.collect();

        if first.len() == 1 && rest.is_empty() {
            return match first.into_iter().next() {
                Some(term @ Term::Function { .. }) => Ok(term),
                Some(Term::Leaf { token, quote: None })
                    if functions::is_known(&functions::canonical(&token)) =>
                {
                    Ok(Term::func(token, []))
                }
                Some(leaf) => Err(self.error(format!("unrecognized function '{}'", leaf))),
                None => Err(self.error("empty clause")),
            };
        }
        if first.len() == 1 {
            return Err(self.error("unexpected ','"));
        }

        let mut extra = Vec::with_capacity(rest.len());
        for segment in rest {
            match <[Term; 1]>::try_from(segment) {
                Ok([value]) => extra.push(value),
                Err(_) => return Err(self.error("unexpected '=' in value list")),
            }
        }
        self.root_shorthand(first, extra)
    }

    /// `key=value[,more]`, `key=op=value[,more]`.
    fn root_shorthand(&self, segment: Segment, extra: Vec<Term>) -> RqlResult<Term> {
        let mut parts = segment.into_iter();
        let key = match parts.next() {
            Some(key @ Term::Leaf { .. }) => key,
            Some(other) => return Err(self.error(format!("'{}' cannot be a shorthand key", other))),
            None => return Err(self.error("empty clause")),
        };
        let parts: Vec<Term> = parts.collect();
        let name = functions::canonical(key.token());

        if parts.len() == 1 && key.quote().is_none() && functions::is_structural(&name) {
            let mut args = parts;
            args.extend(extra);
            return Ok(Term::func(name, args));
        }
        if key.quote().is_none() && functions::is_known(&name) {
            return Err(RqlError::validation(
                key.token(),
                "reserved function name used as a property",
            ));
        }

        let (op, value) = self.operator(parts)?;
        let mut args = vec![key, value];
        args.extend(extra);
        Ok(Term::func(op, args))
    }

    /// Split the parts after the key into an operator and a value.
    fn operator(&self, parts: Vec<Term>) -> RqlResult<(String, Term)> {
        let mut parts = parts.into_iter();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(value), None, None) => Ok(("eq".to_string(), value)),
            (Some(Term::Leaf { token, quote: None }), Some(value), None) => {
                let op = functions::canonical(&token);
                if COMPARISON.contains(&op.as_str()) {
                    Ok((op, value))
                } else {
                    Err(self.error(format!("'{}' is not a comparison operator", token)))
                }
            }
            _ => Err(self.error("malformed shorthand")),
        }
    }

    /// Shorthand is only meaningful inside boolean composition.
    fn nested_argument(&self, parent: &str, segment: Segment) -> RqlResult<Term> {
        if segment.len() == 1 {
            return segment
                .into_iter()
                .next()
                .ok_or_else(|| self.error("empty argument"));
        }
        if !LOGICAL.contains(&parent) {
            return Err(self.error(format!("'=' is not allowed inside {}()", parent)));
        }
        let mut parts = segment.into_iter();
        let key = match parts.next() {
            Some(key @ Term::Leaf { .. }) => key,
            _ => return Err(self.error("malformed shorthand")),
        };
        let (op, value) = self.operator(parts.collect())?;
        Ok(Term::func(op, [key, value]))
    }

    /// Read comma separated segments until `)` (inside a call) or the end.
    fn parse_segments(&mut self, parent: Option<&str>) -> RqlResult<Vec<Segment>> {
        let mut segments = Vec::new();

        if parent.is_some() && self.tokens.peek() == Some(&Token::Close) {
            self.tokens.next();
            return Ok(segments);
        }

        loop {
            let mut segment = vec![self.parse_part()?];
            while self.tokens.peek() == Some(&Token::Equals) {
                self.tokens.next();
                segment.push(self.parse_part()?);
            }
            segments.push(segment);

            match (self.tokens.next(), parent) {
                (Some(Token::Comma), _) => continue,
                (Some(Token::Close), Some(_)) => return Ok(segments),
                (None, None) => return Ok(segments),
                (None, Some(name)) => {
                    return Err(self.error(format!("unmatched '(' after '{}'", name)));
                }
                (Some(Token::Close), None) => return Err(self.error("unmatched ')'")),
                (Some(token), _) => {
                    return Err(self.error(format!("unexpected token {:?}", token)));
                }
            }
        }
    }

    fn parse_part(&mut self) -> RqlResult<Term> {
        match self.tokens.next() {
            Some(Token::Open(name)) => {
                let name = functions::canonical(&name);
                if !functions::is_known(&name) {
                    return Err(self.error(format!("unrecognized function '{}'", name)));
                }
                let mut args = Vec::new();
                for segment in self.parse_segments(Some(&name))? {
                    args.push(self.nested_argument(&name, segment)?);
                }
                Ok(Term::func(name, args))
            }
            Some(Token::Word { text, quote }) => {
                if text.is_empty() && quote.is_none() {
                    return Err(self.error("empty argument"));
                }
                Ok(Term::Leaf { token: text, quote })
            }
            Some(Token::Comma) | Some(Token::Close) => Err(self.error("empty argument")),
            Some(Token::Equals) => Err(self.error("unexpected '='")),
            Some(Token::Amp) => Err(self.error("unexpected '&'")),
            None => Err(self.error("unexpected end of clause")),
        }
    }
}
