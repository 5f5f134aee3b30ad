//! Query field resolution for MLWR.
//!
//! Maps a generic query AST onto backend-independent predicates across the
//! heterogeneous object schemas, including path selectors into embedded
//! JSON documents.
//!
//! # Key Types
//!
//! - [`FieldRegistry`] -- frozen type-name and field-name tables, built by [`RegistryBuilder`]
//! - [`PathSelector`] -- parsed field path with wildcards and accessors
//! - [`Field`] -- the closed set of field handlers
//! - [`Predicate`] -- translated condition
//! - [`QueryTranslator`] -- AST to predicate
//! - [`search`] -- evaluate a query against an [`ObjectRepository`](mlwr_store::ObjectRepository)

pub mod ast;
pub mod error;
pub mod escape;
pub mod eval;
pub mod fields;
pub mod predicate;
pub mod query;
pub mod registry;
pub mod selector;

pub use ast::{QueryNode, TermValue};
pub use error::{SearchError, SearchResult, SelectorError};
pub use eval::{search, Evaluator};
pub use fields::Field;
pub use predicate::Predicate;
pub use query::QueryTranslator;
pub use registry::{FieldRegistry, ObjectType, RegistryBuilder, ResolvedField};
pub use selector::{PathSelector, Segment, Step};
