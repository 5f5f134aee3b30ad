//! Field handlers: translate one `field:value` term into a [`Predicate`].
//!
//! Handlers are stateless. They receive the unconsumed path starting with
//! their own segment, so wildcard markers and sub-paths are visible to the
//! handlers that accept them (documents, attributes, relations) and
//! rejected by the others.

use std::ops::Bound;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use mlwr_types::ObjectKind;

use crate::ast::{Comparison, TermValue};
use crate::error::{SearchError, SearchResult};
use crate::escape::{escape, is_pattern, unescape, Pattern};
use crate::predicate::{
    Bounds, DocCondition, DocSource, ListAttr, NumberAttr, Predicate, Relation, TextAttr,
    TextMatch, TimeAttr, ValueMatch,
};
use crate::registry::FieldRegistry;
use crate::selector::{Segment, Step};

/// The closed set of field handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    /// Exact or wildcard match on a text attribute.
    String(TextAttr),
    /// Hash or content shorthand for one object kind.
    Multi(ObjectKind),
    /// Byte size with units and ranges.
    Size(NumberAttr),
    UploadCount,
    Datetime(TimeAttr),
    /// At least one list element matches.
    List(ListAttr),
    /// File name or any alternate name.
    AltName,
    Relation(Relation),
    /// `attribute.<key>` JSON values.
    Attribute,
    /// Config `cfg` document.
    Document,
}

impl Field {
    /// Build the predicate for `value`. `path` starts with the field's own
    /// segment.
    pub fn get_condition(
        &self,
        registry: &FieldRegistry,
        value: &TermValue,
        path: &[Segment],
    ) -> SearchResult<Predicate> {
        let name = path_name(path);
        match *self {
            Self::String(attr) => {
                require_plain(path, &name)?;
                Ok(Predicate::Text {
                    attr,
                    matcher: text_match(value, &name)?,
                })
            }
            Self::List(list) => {
                require_plain(path, &name)?;
                Ok(Predicate::AnyOf {
                    list,
                    matcher: text_match(value, &name)?,
                })
            }
            Self::AltName => {
                require_plain(path, &name)?;
                let matcher = text_match(value, &name)?;
                Ok(Predicate::Or(vec![
                    Predicate::Text {
                        attr: TextAttr::FileName,
                        matcher: matcher.clone(),
                    },
                    Predicate::AnyOf {
                        list: ListAttr::AltName,
                        matcher,
                    },
                ]))
            }
            Self::Multi(kind) => {
                require_plain(path, &name)?;
                multi_condition(kind, value, &name)
            }
            Self::Size(attr) => {
                require_plain(path, &name)?;
                Ok(Predicate::Number {
                    attr,
                    bounds: bounds_for(&name, value, parse_size)?,
                })
            }
            Self::UploadCount => {
                require_plain(path, &name)?;
                Ok(Predicate::Number {
                    attr: NumberAttr::UploadCount,
                    bounds: bounds_for(&name, value, |raw| raw.trim().parse().ok().map(Span::point))?,
                })
            }
            Self::Datetime(attr) => {
                require_plain(path, &name)?;
                Ok(Predicate::Time {
                    attr,
                    bounds: bounds_for(&name, value, parse_datetime)?,
                })
            }
            Self::Relation(relation) => {
                require_plain(&path[..1], &name)?;
                let inner = if path.len() == 1 {
                    Predicate::Text {
                        attr: TextAttr::Dhash,
                        matcher: text_match(value, &name)?,
                    }
                } else {
                    registry.related_condition(&path[1..], value)?
                };
                Ok(Predicate::Related {
                    relation,
                    inner: Box::new(inner),
                })
            }
            Self::Attribute => {
                require_plain(&path[..1], &name)?;
                let key_segment = path.get(1).ok_or_else(|| {
                    SearchError::FieldNotQueryable(format!("{name}: attribute key is required"))
                })?;
                let key = key_segment.key().ok_or_else(|| {
                    SearchError::FieldNotQueryable(format!("{name}: attribute key must be literal"))
                })?;
                let steps = key_segment
                    .accessors()
                    .iter()
                    .chain(path[2..].iter().flat_map(Segment::steps))
                    .cloned()
                    .collect();
                document_condition(DocSource::Attribute(key.to_string()), steps, value, &name)
            }
            Self::Document => {
                let steps = path[0]
                    .accessors()
                    .iter()
                    .chain(path[1..].iter().flat_map(Segment::steps))
                    .cloned()
                    .collect();
                document_condition(DocSource::Cfg, steps, value, &name)
            }
        }
    }

    /// Short description for field listings.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::String(_) => "string (exact or wildcard)",
            Self::Multi(ObjectKind::File) => "multi (crc32/md5/sha1/sha256/sha512 by length)",
            Self::Multi(_) => "multi (dhash or content substring)",
            Self::Size(_) => "size (B/kB/MB/GB, ranges)",
            Self::UploadCount => "number (ranges)",
            Self::Datetime(_) => "datetime (ranges)",
            Self::List(_) => "list (any element matches)",
            Self::AltName => "file name or alternate name",
            Self::Relation(_) => "relation (dhash or nested field)",
            Self::Attribute => "attribute.<key> (JSON)",
            Self::Document => "JSON document (path selectors)",
        }
    }
}

fn path_name(path: &[Segment]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

fn require_plain(path: &[Segment], name: &str) -> SearchResult<()> {
    if path.len() == 1 && path[0].is_plain() {
        Ok(())
    } else {
        Err(SearchError::FieldNotQueryable(format!(
            "{name}: field does not accept a sub-path"
        )))
    }
}

fn unsupported_range(name: &str) -> SearchError {
    SearchError::UnsupportedOperation(format!("range query on field {name}"))
}

fn text_match(value: &TermValue, name: &str) -> SearchResult<TextMatch> {
    match value {
        TermValue::Term { value } if is_pattern(value) => Ok(TextMatch::Pattern(Pattern::parse(value))),
        TermValue::Term { value } => Ok(TextMatch::Exact(unescape(value))),
        TermValue::Phrase { value } => Ok(TextMatch::Exact(value.clone())),
        TermValue::Range { .. } => Err(unsupported_range(name)),
    }
}

fn multi_condition(kind: ObjectKind, value: &TermValue, name: &str) -> SearchResult<Predicate> {
    let escaped = match value {
        TermValue::Term { value } => value.clone(),
        TermValue::Phrase { value } => escape(value),
        TermValue::Range { .. } => return Err(unsupported_range(name)),
    };
    // Whitespace-separated values are alternatives.
    let mut alternatives = escaped
        .split_whitespace()
        .map(|part| multi_single(kind, part, name))
        .collect::<SearchResult<Vec<_>>>()?;
    match alternatives.len() {
        0 => Err(SearchError::invalid_value(name, escaped)),
        1 => Ok(alternatives.remove(0)),
        _ => Ok(Predicate::Or(alternatives)),
    }
}

fn multi_single(kind: ObjectKind, escaped: &str, name: &str) -> SearchResult<Predicate> {
    let literal = unescape(escaped);
    let is_hex = literal.bytes().all(|b| b.is_ascii_hexdigit());
    let hash = |attr| Predicate::Text {
        attr,
        matcher: TextMatch::Exact(literal.to_ascii_lowercase()),
    };
    match kind {
        ObjectKind::File => {
            let attr = match literal.len() {
                8 => TextAttr::Crc32,
                32 => TextAttr::Md5,
                40 => TextAttr::Sha1,
                64 => TextAttr::Sha256,
                128 => TextAttr::Sha512,
                _ => return Err(SearchError::invalid_value(name, literal)),
            };
            if !is_hex {
                return Err(SearchError::invalid_value(name, literal));
            }
            Ok(hash(attr))
        }
        _ if is_hex && literal.len() == 64 => Ok(hash(TextAttr::Dhash)),
        ObjectKind::Config => Ok(Predicate::Document {
            source: DocSource::Cfg,
            condition: DocCondition::Text(Pattern::parse(escaped).json_escaped().contains()),
        }),
        ObjectKind::TextBlob => Ok(Predicate::Text {
            attr: TextAttr::Content,
            matcher: TextMatch::Pattern(Pattern::parse(escaped).contains()),
        }),
    }
}

fn document_condition(
    source: DocSource,
    path: Vec<Step>,
    value: &TermValue,
    name: &str,
) -> SearchResult<Predicate> {
    if path.is_empty() {
        let pattern = match value {
            TermValue::Term { value } => Pattern::parse(value),
            TermValue::Phrase { value } => Pattern::literal(value),
            TermValue::Range { .. } => return Err(unsupported_range(name)),
        };
        return Ok(Predicate::Document {
            source,
            condition: DocCondition::Text(pattern.json_escaped().quoted().contains()),
        });
    }

    let numeric_comparison = value
        .comparison()
        .is_some_and(|(_, rest)| parse_number(rest).is_some());
    let matcher = match value {
        TermValue::Range { .. } => ValueMatch::Range(bounds_for(name, value, parse_number)?),
        _ if numeric_comparison => ValueMatch::Range(bounds_for(name, value, parse_number)?),
        TermValue::Term { value } if is_pattern(value) => ValueMatch::Equals {
            text: TextMatch::Pattern(Pattern::parse(value)),
            number: None,
        },
        TermValue::Term { value } => literal_value_match(unescape(value)),
        TermValue::Phrase { value } => literal_value_match(value.clone()),
    };
    Ok(Predicate::Document {
        source,
        condition: DocCondition::At {
            path,
            value: matcher,
        },
    })
}

fn literal_value_match(literal: String) -> ValueMatch {
    let number = literal
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite());
    ValueMatch::Equals {
        text: TextMatch::Exact(literal),
        number,
    }
}

/// A parsed bound value. Values with a granularity (a whole day, a whole
/// minute) cover `[start, end)`; points have no `end`.
struct Span<T> {
    start: T,
    end: Option<T>,
}

impl<T> Span<T> {
    fn point(start: T) -> Self {
        Self { start, end: None }
    }

    fn lower(self, inclusive: bool) -> Bound<T> {
        match (self.end, inclusive) {
            (None, true) => Bound::Included(self.start),
            (None, false) => Bound::Excluded(self.start),
            (Some(_), true) => Bound::Included(self.start),
            (Some(end), false) => Bound::Included(end),
        }
    }

    fn upper(self, inclusive: bool) -> Bound<T> {
        match (self.end, inclusive) {
            (None, true) => Bound::Included(self.start),
            (None, false) => Bound::Excluded(self.start),
            (Some(end), true) => Bound::Excluded(end),
            (Some(_), false) => Bound::Excluded(self.start),
        }
    }
}

impl<T: Clone> Span<T> {
    fn exact(self) -> Bounds<T> {
        match self.end {
            None => Bounds {
                low: Bound::Included(self.start.clone()),
                high: Bound::Included(self.start),
            },
            Some(end) => Bounds {
                low: Bound::Included(self.start),
                high: Bound::Excluded(end),
            },
        }
    }
}

fn bounds_for<T: Clone>(
    name: &str,
    value: &TermValue,
    parse: impl Fn(&str) -> Option<Span<T>>,
) -> SearchResult<Bounds<T>> {
    let parse = |raw: &str| parse(raw).ok_or_else(|| SearchError::invalid_value(name, raw));
    if let TermValue::Range {
        low,
        high,
        include_low,
        include_high,
    } = value
    {
        let low = match low {
            Some(raw) => parse(raw)?.lower(*include_low),
            None => Bound::Unbounded,
        };
        let high = match high {
            Some(raw) => parse(raw)?.upper(*include_high),
            None => Bound::Unbounded,
        };
        return Ok(Bounds { low, high });
    }
    if let Some((op, rest)) = value.comparison() {
        let span = parse(rest)?;
        let (low, high) = match op {
            Comparison::Gt => (span.lower(false), Bound::Unbounded),
            Comparison::Ge => (span.lower(true), Bound::Unbounded),
            Comparison::Lt => (Bound::Unbounded, span.upper(false)),
            Comparison::Le => (Bound::Unbounded, span.upper(true)),
        };
        return Ok(Bounds { low, high });
    }
    let raw = match value {
        TermValue::Term { value } => unescape(value),
        TermValue::Phrase { value } => value.clone(),
        TermValue::Range { .. } => unreachable!("ranges handled above"),
    };
    Ok(parse(&raw)?.exact())
}

fn parse_number(raw: &str) -> Option<Span<f64>> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(Span::point)
}

/// `1024`, `10kB`, `1.5 MB`, `2GB` (base 1024, case-insensitive units).
fn parse_size(raw: &str) -> Option<Span<u64>> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" => 1 << 10,
        "mb" => 1 << 20,
        "gb" => 1 << 30,
        _ => return None,
    };
    let number = number.trim();
    if let Ok(n) = number.parse::<u64>() {
        return n.checked_mul(multiplier).map(Span::point);
    }
    let n: f64 = number.parse().ok()?;
    if !n.is_finite() || n < 0.0 {
        return None;
    }
    Some(Span::point((n * multiplier as f64) as u64))
}

/// RFC 3339 instants, `YYYY-MM-DD HH:MM[:SS]` (UTC, minute or second
/// granularity) and `YYYY-MM-DD` (whole day).
fn parse_datetime(raw: &str) -> Option<Span<DateTime<Utc>>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(Span::point(instant.with_timezone(&Utc)));
    }
    for (format, step) in [
        ("%Y-%m-%d %H:%M:%S", Duration::seconds(1)),
        ("%Y-%m-%d %H:%M", Duration::minutes(1)),
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            let start = Utc.from_utc_datetime(&naive);
            return Some(Span {
                start,
                end: Some(start + step),
            });
        }
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    Some(Span {
        start,
        end: Some(start + Duration::days(1)),
    })
}
