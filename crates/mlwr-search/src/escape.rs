//! Query value escaping and wildcard patterns.
//!
//! Term values arrive escaped: `\*`, `\?` and `\\` stand for literal
//! characters, while bare `*` and `?` are wildcards.

use std::fmt;

/// Remove query escaping. A trailing lone backslash is kept as is.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next().unwrap_or('\\'));
        } else {
            out.push(c);
        }
    }
    out
}

/// Escape a literal so that it round-trips through [`unescape`] and is
/// never read as a pattern.
pub fn escape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Whether an escaped value contains an unescaped wildcard.
pub fn is_pattern(value: &str) -> bool {
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '*' | '?' => return true,
            _ => {}
        }
    }
    false
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token {
    Literal(char),
    /// `?`
    AnyChar,
    /// `*`
    AnyRun,
}

/// A wildcard pattern over text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    tokens: Vec<Token>,
}

impl Pattern {
    /// Parse an escaped query value.
    pub fn parse(escaped: &str) -> Self {
        let mut tokens = Vec::with_capacity(escaped.len());
        let mut chars = escaped.chars();
        while let Some(c) = chars.next() {
            tokens.push(match c {
                '\\' => Token::Literal(chars.next().unwrap_or('\\')),
                '*' => Token::AnyRun,
                '?' => Token::AnyChar,
                other => Token::Literal(other),
            });
        }
        Self { tokens }
    }

    /// A pattern matching exactly `text`.
    pub fn literal(text: &str) -> Self {
        Self {
            tokens: text.chars().map(Token::Literal).collect(),
        }
    }

    /// Surround with `*` so the pattern matches anywhere in the text.
    pub fn contains(mut self) -> Self {
        if self.tokens.first() != Some(&Token::AnyRun) {
            self.tokens.insert(0, Token::AnyRun);
        }
        if self.tokens.last() != Some(&Token::AnyRun) {
            self.tokens.push(Token::AnyRun);
        }
        self
    }

    /// Surround with literal double quotes.
    pub fn quoted(mut self) -> Self {
        self.tokens.insert(0, Token::Literal('"'));
        self.tokens.push(Token::Literal('"'));
        self
    }

    /// Rewrite literals the way they appear inside a serialized JSON
    /// string, so the pattern can be matched against document text.
    pub fn json_escaped(self) -> Self {
        let mut tokens = Vec::with_capacity(self.tokens.len());
        for token in self.tokens {
            match token {
                Token::Literal(c) => {
                    let encoded = serde_json::Value::String(c.to_string()).to_string();
                    let inner = &encoded[1..encoded.len() - 1];
                    tokens.extend(inner.chars().map(Token::Literal));
                }
                other => tokens.push(other),
            }
        }
        Self { tokens }
    }

    /// Whether the pattern has any wildcard token.
    pub fn has_wildcards(&self) -> bool {
        self.tokens.iter().any(|t| !matches!(t, Token::Literal(_)))
    }

    /// Match the whole of `text`.
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let (mut t, mut p) = (0, 0);
        // Position of the last `*` and the text index it was tried at.
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            match self.tokens.get(p) {
                Some(Token::AnyRun) => {
                    backtrack = Some((p, t));
                    p += 1;
                }
                Some(Token::AnyChar) => {
                    t += 1;
                    p += 1;
                }
                Some(Token::Literal(c)) if *c == text[t] => {
                    t += 1;
                    p += 1;
                }
                _ => match backtrack {
                    Some((star, tried)) => {
                        p = star + 1;
                        t = tried + 1;
                        backtrack = Some((star, tried + 1));
                    }
                    None => return false,
                },
            }
        }
        self.tokens[p..].iter().all(|t| *t == Token::AnyRun)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            match token {
                Token::Literal(c) if matches!(c, '*' | '?' | '\\') => write!(f, "\\{c}")?,
                Token::Literal(c) => write!(f, "{c}")?,
                Token::AnyChar => f.write_str("?")?,
                Token::AnyRun => f.write_str("*")?,
            }
        }
        Ok(())
    }
}
