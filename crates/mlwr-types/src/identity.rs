use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;

/// An authenticated caller.
///
/// `groups` always contains the private group named after `login`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub login: String,
    pub groups: Vec<String>,
    pub capabilities: BTreeSet<Capability>,
}

impl Identity {
    pub fn new(
        login: impl Into<String>,
        groups: impl IntoIterator<Item = String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        let login = login.into();
        let mut all = vec![login.clone()];
        for group in groups {
            if !all.contains(&group) {
                all.push(group);
            }
        }
        Self {
            login,
            groups: all,
            capabilities: capabilities.into_iter().collect(),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn is_member(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_group_is_implicit() {
        let id = Identity::new("alice", vec!["public".to_string(), "alice".to_string()], []);
        assert_eq!(id.groups, vec!["alice", "public"]);
        assert!(id.is_member("alice"));
        assert!(!id.is_member("bob"));
    }

    #[test]
    fn capability_lookup() {
        let id = Identity::new("alice", Vec::new(), [Capability::AddingBlobs]);
        assert!(id.has(Capability::AddingBlobs));
        assert!(!id.has(Capability::AccessRemotes));
    }
}
