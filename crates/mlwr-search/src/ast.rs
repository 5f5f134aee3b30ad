//! Query AST accepted by the translator.
//!
//! The tree is produced by an external query-language parser; this crate
//! only consumes it. Term values keep the query language's escaping
//! (`\*`, `\?`, `\\`), which field handlers interpret.

use serde::{Deserialize, Serialize};

/// A node of the boolean query tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QueryNode {
    And { children: Vec<QueryNode> },
    Or { children: Vec<QueryNode> },
    Not { child: Box<QueryNode> },
    Term { field: String, value: TermValue },
}

impl QueryNode {
    /// `field:value` with an escaped term value.
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Term {
            field: field.into(),
            value: TermValue::Term {
                value: value.into(),
            },
        }
    }

    /// `field:"value"`.
    pub fn phrase(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Term {
            field: field.into(),
            value: TermValue::Phrase {
                value: value.into(),
            },
        }
    }

    /// `field:[low TO high]`, `None` standing for `*`.
    pub fn range(
        field: impl Into<String>,
        low: Option<&str>,
        high: Option<&str>,
        include_low: bool,
        include_high: bool,
    ) -> Self {
        Self::Term {
            field: field.into(),
            value: TermValue::Range {
                low: low.map(str::to_string),
                high: high.map(str::to_string),
                include_low,
                include_high,
            },
        }
    }

    pub fn and(children: Vec<QueryNode>) -> Self {
        Self::And { children }
    }

    pub fn or(children: Vec<QueryNode>) -> Self {
        Self::Or { children }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: QueryNode) -> Self {
        Self::Not {
            child: Box::new(child),
        }
    }
}

/// Value side of a term.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TermValue {
    /// Unquoted value, escaped; may contain `*`/`?` wildcards and a
    /// comparison prefix.
    Term { value: String },
    /// Quoted value, taken literally.
    Phrase { value: String },
    Range {
        low: Option<String>,
        high: Option<String>,
        include_low: bool,
        include_high: bool,
    },
}

impl TermValue {
    /// Human-readable rendering, used in error messages.
    pub fn display(&self) -> String {
        match self {
            Self::Term { value } => value.clone(),
            Self::Phrase { value } => format!("\"{value}\""),
            Self::Range {
                low,
                high,
                include_low,
                include_high,
            } => format!(
                "{}{} TO {}{}",
                if *include_low { '[' } else { '{' },
                low.as_deref().unwrap_or("*"),
                high.as_deref().unwrap_or("*"),
                if *include_high { ']' } else { '}' },
            ),
        }
    }

    /// Split a leading comparison operator off an unquoted term.
    pub(crate) fn comparison(&self) -> Option<(Comparison, &str)> {
        let Self::Term { value } = self else {
            return None;
        };
        // Longest prefix first.
        for (prefix, op) in [
            (">=", Comparison::Ge),
            ("<=", Comparison::Le),
            (">", Comparison::Gt),
            ("<", Comparison::Lt),
        ] {
            if let Some(rest) = value.strip_prefix(prefix) {
                return Some((op, rest));
            }
        }
        None
    }
}

/// Comparison prefix of an unquoted term.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
}
