use mlwr_store::StoreError;
use thiserror::Error;

/// Errors raised while parsing a field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty segment at offset {0}")]
    EmptySegment(usize),

    #[error("empty brackets at offset {0}")]
    EmptyBrackets(usize),

    #[error("unbalanced bracket at offset {0}")]
    UnbalancedBracket(usize),

    #[error("unexpected character {found:?} at offset {offset}, expected '.' or '['")]
    UnexpectedText { offset: usize, found: char },

    #[error("trailing escape character")]
    TrailingEscape,
}

/// Errors raised while resolving or evaluating a query.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("field is not queryable: {0}")]
    FieldNotQueryable(String),

    #[error("invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("invalid field path: {0}")]
    Selector(#[from] SelectorError),

    #[error("repository error: {0}")]
    Store(#[from] StoreError),
}

impl SearchError {
    pub(crate) fn invalid_value(field: &str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

/// Convenience alias for search results.
pub type SearchResult<T> = Result<T, SearchError>;
