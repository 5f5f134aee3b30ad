use crate::ast::QueryNode;
use crate::error::SearchResult;
use crate::predicate::Predicate;
use crate::registry::{FieldRegistry, ObjectType};
use crate::selector::PathSelector;

/// Translates a query AST into a [`Predicate`] for one queried type.
#[derive(Clone, Copy, Debug)]
pub struct QueryTranslator<'r> {
    registry: &'r FieldRegistry,
}

impl<'r> QueryTranslator<'r> {
    pub fn new(registry: &'r FieldRegistry) -> Self {
        Self { registry }
    }

    /// Resolve every field reference of `node` and conjoin the kind filter
    /// of `queried` (none for the abstract object type).
    pub fn translate(&self, queried: ObjectType, node: &QueryNode) -> SearchResult<Predicate> {
        let predicate = self.node(queried, node)?;
        let predicate = match queried.kind() {
            Some(kind) => predicate.scoped(kind),
            None => predicate,
        };
        tracing::debug!(queried = %queried, predicate = %predicate, "query translated");
        Ok(predicate)
    }

    fn node(&self, queried: ObjectType, node: &QueryNode) -> SearchResult<Predicate> {
        match node {
            QueryNode::And { children } => Ok(Predicate::And(self.children(queried, children)?)),
            QueryNode::Or { children } => Ok(Predicate::Or(self.children(queried, children)?)),
            QueryNode::Not { child } => Ok(Predicate::Not(Box::new(self.node(queried, child)?))),
            QueryNode::Term { field, value } => {
                let path = PathSelector::parse(field)?;
                self.registry.condition(queried, path.segments(), value)
            }
        }
    }

    fn children(&self, queried: ObjectType, children: &[QueryNode]) -> SearchResult<Vec<Predicate>> {
        children.iter().map(|child| self.node(queried, child)).collect()
    }
}
