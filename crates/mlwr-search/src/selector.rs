//! Field path parser.
//!
//! A path such as `cfg.urls[*].host` or `attribute.origin` is split into
//! segments on unescaped dots. Each segment has a name step and any
//! number of bracket accessors:
//!
//! | syntax        | step                         |
//! |---------------|------------------------------|
//! | `name`        | [`Step::Key`]                |
//! | `*`           | [`Step::AnyKey`] (one level) |
//! | `**`          | [`Step::Descend`] (any depth)|
//! | `[*]`         | [`Step::AnyElement`]         |
//! | `[3]`         | [`Step::Index`]              |
//! | `["k"]`/`[k]` | [`Step::Key`]                |
//!
//! A backslash escapes the next character, so `a\.b` is one key and `\*`
//! is a literal star.

use std::fmt;
use std::str::FromStr;

use crate::error::SelectorError;

/// One navigation step into a JSON value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    Key(String),
    AnyKey,
    Descend,
    AnyElement,
    Index(usize),
}

impl Step {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::AnyKey | Self::Descend | Self::AnyElement)
    }
}

/// A dot-separated path segment: a name plus its bracket accessors.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Segment {
    name: Step,
    accessors: Vec<Step>,
}

impl Segment {
    pub fn name(&self) -> &Step {
        &self.name
    }

    /// The literal key naming this segment, if it is not a wildcard.
    pub fn key(&self) -> Option<&str> {
        match &self.name {
            Step::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn accessors(&self) -> &[Step] {
        &self.accessors
    }

    pub fn wildcard_count(&self) -> usize {
        usize::from(self.name.is_wildcard())
            + self.accessors.iter().filter(|a| a.is_wildcard()).count()
    }

    /// The name followed by the accessors.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        std::iter::once(&self.name).chain(self.accessors.iter())
    }

    /// A plain key with no accessors.
    pub fn is_plain(&self) -> bool {
        self.key().is_some() && self.accessors.is_empty()
    }
}

/// A parsed field path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathSelector {
    segments: Vec<Segment>,
}

impl PathSelector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        Parser::new(input).parse()
    }

    pub(crate) fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn wildcard_count(&self) -> usize {
        self.segments.iter().map(Segment::wildcard_count).sum()
    }
}

impl FromStr for PathSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Escape a key so it parses back as a single literal segment name.
pub fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if matches!(c, '.' | '[' | ']' | '*' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn write_step(f: &mut fmt::Formatter<'_>, step: &Step, as_name: bool) -> fmt::Result {
    match (step, as_name) {
        (Step::Key(k), true) => f.write_str(&escape_key(k)),
        (Step::Key(k), false) => write!(f, "[\"{}\"]", k.replace('\\', "\\\\").replace(']', "\\]")),
        (Step::AnyKey, _) => f.write_str("*"),
        (Step::Descend, _) => f.write_str("**"),
        (Step::AnyElement, _) => f.write_str("[*]"),
        (Step::Index(i), _) => write!(f, "[{i}]"),
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_step(f, &self.name, true)?;
        for accessor in &self.accessors {
            write_step(f, accessor, false)?;
        }
        Ok(())
    }
}

impl fmt::Display for PathSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    len: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            len: input.len(),
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.len, |(i, _)| *i)
    }

    fn parse(mut self) -> Result<PathSelector, SelectorError> {
        let mut segments = Vec::new();
        loop {
            segments.push(self.segment()?);
            match self.chars.next() {
                None => break,
                Some((_, '.')) => continue,
                Some((offset, found)) => {
                    return Err(SelectorError::UnexpectedText { offset, found })
                }
            }
        }
        Ok(PathSelector { segments })
    }

    fn segment(&mut self) -> Result<Segment, SelectorError> {
        let start = self.offset();
        let mut name = String::new();
        let mut escaped = false;
        while let Some(&(offset, c)) = self.chars.peek() {
            match c {
                '.' | '[' => break,
                ']' => return Err(SelectorError::UnbalancedBracket(offset)),
                '\\' => {
                    self.chars.next();
                    let (_, next) = self.chars.next().ok_or(SelectorError::TrailingEscape)?;
                    name.push(next);
                    escaped = true;
                }
                _ => {
                    self.chars.next();
                    name.push(c);
                }
            }
        }
        if name.is_empty() {
            return Err(SelectorError::EmptySegment(start));
        }
        let name = match (name.as_str(), escaped) {
            ("*", false) => Step::AnyKey,
            ("**", false) => Step::Descend,
            _ => Step::Key(name),
        };

        let mut accessors = Vec::new();
        while let Some(&(offset, '[')) = self.chars.peek() {
            self.chars.next();
            accessors.push(self.bracket(offset)?);
            match self.chars.peek() {
                None | Some((_, '.')) | Some((_, '[')) => {}
                Some(&(offset, found)) => {
                    return Err(SelectorError::UnexpectedText { offset, found })
                }
            }
        }
        Ok(Segment { name, accessors })
    }

    /// Parse the inside of `[...]`; the opening bracket is consumed.
    fn bracket(&mut self, open: usize) -> Result<Step, SelectorError> {
        let mut content = String::new();
        let mut escaped = false;
        loop {
            match self.chars.next() {
                None => return Err(SelectorError::UnbalancedBracket(open)),
                Some((_, ']')) => break,
                Some((offset, '[')) => return Err(SelectorError::UnbalancedBracket(offset)),
                Some((_, '\\')) => {
                    let (_, next) = self.chars.next().ok_or(SelectorError::TrailingEscape)?;
                    content.push(next);
                    escaped = true;
                }
                Some((_, c)) => content.push(c),
            }
        }
        if content.is_empty() {
            return Err(SelectorError::EmptyBrackets(open));
        }
        if content == "*" && !escaped {
            return Ok(Step::AnyElement);
        }
        if content.len() >= 2 && content.starts_with('"') && content.ends_with('"') {
            return Ok(Step::Key(content[1..content.len() - 1].to_string()));
        }
        if !escaped && content.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = content.parse() {
                return Ok(Step::Index(index));
            }
        }
        Ok(Step::Key(content))
    }
}
