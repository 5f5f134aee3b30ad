//! Backend-independent predicates produced by field handlers.

use std::fmt;
use std::ops::Bound;

use chrono::{DateTime, Utc};
use mlwr_types::ObjectKind;

use crate::escape::Pattern;
use crate::selector::Step;

/// A single-valued textual attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextAttr {
    Dhash,
    FileName,
    FileType,
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Ssdeep,
    Crc32,
    ConfigType,
    Family,
    BlobName,
    BlobType,
    Content,
}

/// A numeric attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumberAttr {
    FileSize,
    BlobSize,
    UploadCount,
}

/// A timestamp attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeAttr {
    UploadTime,
    LastSeen,
}

/// A multi-valued attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListAttr {
    Tag,
    Comment,
    CommentAuthor,
    SharedGroup,
    Sharer,
    Uploader,
    AltName,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    Parent,
    Child,
}

/// Where a JSON document comes from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DocSource {
    /// The `cfg` of a config.
    Cfg,
    /// Every value stored under an attribute key.
    Attribute(String),
}

/// Exact or wildcard match over a string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextMatch {
    Exact(String),
    Pattern(Pattern),
}

impl TextMatch {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Exact(value) => value == text,
            Self::Pattern(pattern) => pattern.matches(text),
        }
    }
}

/// An interval with independent lower and upper bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds<T> {
    pub low: Bound<T>,
    pub high: Bound<T>,
}

impl<T: PartialOrd> Bounds<T> {
    pub fn new(low: Bound<T>, high: Bound<T>) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: &T) -> bool {
        let above = match &self.low {
            Bound::Included(low) => value >= low,
            Bound::Excluded(low) => value > low,
            Bound::Unbounded => true,
        };
        let below = match &self.high {
            Bound::Included(high) => value <= high,
            Bound::Excluded(high) => value < high,
            Bound::Unbounded => true,
        };
        above && below
    }
}

/// Condition on the values selected inside a document.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueMatch {
    /// Strings compare as text; numeric values also compare to `number`.
    Equals {
        text: TextMatch,
        number: Option<f64>,
    },
    Range(Bounds<f64>),
}

/// Condition on a JSON document.
#[derive(Clone, Debug, PartialEq)]
pub enum DocCondition {
    /// Pattern over the serialized document text.
    Text(Pattern),
    /// Values selected by `path` (wildcards allowed).
    At { path: Vec<Step>, value: ValueMatch },
}

/// A translated query condition.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Const(bool),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    KindIs(ObjectKind),
    Text {
        attr: TextAttr,
        matcher: TextMatch,
    },
    Number {
        attr: NumberAttr,
        bounds: Bounds<u64>,
    },
    Time {
        attr: TimeAttr,
        bounds: Bounds<DateTime<Utc>>,
    },
    /// At least one element of the list matches.
    AnyOf {
        list: ListAttr,
        matcher: TextMatch,
    },
    /// At least one related object satisfies the inner predicate.
    Related {
        relation: Relation,
        inner: Box<Predicate>,
    },
    Document {
        source: DocSource,
        condition: DocCondition,
    },
}

impl Predicate {
    /// Conjoin `self` with a kind filter.
    pub fn scoped(self, kind: ObjectKind) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.insert(0, Self::KindIs(kind));
                Self::And(parts)
            }
            other => Self::And(vec![Self::KindIs(kind), other]),
        }
    }
}

fn write_bound<T: fmt::Display>(f: &mut fmt::Formatter<'_>, bounds: &Bounds<T>) -> fmt::Result {
    match &bounds.low {
        Bound::Included(v) => write!(f, "[{v}")?,
        Bound::Excluded(v) => write!(f, "{{{v}")?,
        Bound::Unbounded => f.write_str("{*")?,
    }
    f.write_str(" TO ")?;
    match &bounds.high {
        Bound::Included(v) => write!(f, "{v}]"),
        Bound::Excluded(v) => write!(f, "{v}}}"),
        Bound::Unbounded => f.write_str("*}"),
    }
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v:?}"),
            Self::Pattern(p) => write!(f, "~{p}"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Predicate], op: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        write!(f, "{part}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(b) => write!(f, "{b}"),
            Self::And(parts) => write_joined(f, parts, "AND"),
            Self::Or(parts) => write_joined(f, parts, "OR"),
            Self::Not(inner) => write!(f, "NOT {inner}"),
            Self::KindIs(kind) => write!(f, "kind={kind}"),
            Self::Text { attr, matcher } => write!(f, "{attr:?}={matcher}"),
            Self::Number { attr, bounds } => {
                write!(f, "{attr:?}=")?;
                write_bound(f, bounds)
            }
            Self::Time { attr, bounds } => {
                write!(f, "{attr:?}=")?;
                write_bound(f, bounds)
            }
            Self::AnyOf { list, matcher } => write!(f, "any({list:?})={matcher}"),
            Self::Related { relation, inner } => write!(f, "{relation:?}({inner})"),
            Self::Document { source, condition } => {
                match source {
                    DocSource::Cfg => f.write_str("cfg")?,
                    DocSource::Attribute(key) => write!(f, "attribute[{key:?}]")?,
                }
                match condition {
                    DocCondition::Text(p) => write!(f, "~{p}"),
                    DocCondition::At { path, value } => {
                        write!(f, "{path:?}=")?;
                        match value {
                            ValueMatch::Equals { text, .. } => write!(f, "{text}"),
                            ValueMatch::Range(bounds) => write_bound(f, bounds),
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_contains() {
        let b = Bounds::new(Bound::Included(10u64), Bound::Excluded(20));
        assert!(b.contains(&10));
        assert!(b.contains(&19));
        assert!(!b.contains(&20));
        assert!(!b.contains(&9));

        let open = Bounds::<u64>::new(Bound::Unbounded, Bound::Unbounded);
        assert!(open.contains(&0));
        assert!(open.contains(&u64::MAX));
    }

    #[test]
    fn scoped_prepends_kind() {
        let inner = Predicate::Const(true);
        assert_eq!(
            inner.scoped(ObjectKind::File),
            Predicate::And(vec![Predicate::KindIs(ObjectKind::File), Predicate::Const(true)])
        );
    }

    #[test]
    fn display_is_readable() {
        let p = Predicate::And(vec![
            Predicate::KindIs(ObjectKind::Config),
            Predicate::Number {
                attr: NumberAttr::FileSize,
                bounds: Bounds::new(Bound::Included(1024), Bound::Unbounded),
            },
        ]);
        assert_eq!(p.to_string(), "(kind=config AND FileSize=[1024 TO *})");
    }
}
