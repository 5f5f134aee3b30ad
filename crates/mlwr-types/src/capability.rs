use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A privileged operation an identity may be granted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    AddingFiles,
    AddingConfigs,
    AddingBlobs,
    /// Pull from and push to configured remotes.
    AccessRemotes,
    /// Share uploads with groups the identity is not a member of.
    SharingWithAll,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddingFiles => "adding_files",
            Self::AddingConfigs => "adding_configs",
            Self::AddingBlobs => "adding_blobs",
            Self::AccessRemotes => "access_remotes",
            Self::SharingWithAll => "sharing_with_all",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adding_files" => Ok(Self::AddingFiles),
            "adding_configs" => Ok(Self::AddingConfigs),
            "adding_blobs" => Ok(Self::AddingBlobs),
            "access_remotes" => Ok(Self::AccessRemotes),
            "sharing_with_all" => Ok(Self::SharingWithAll),
            other => Err(TypeError::UnknownCapability(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serde() {
        for cap in [
            Capability::AddingFiles,
            Capability::AddingConfigs,
            Capability::AddingBlobs,
            Capability::AccessRemotes,
            Capability::SharingWithAll,
        ] {
            let json = serde_json::to_string(&cap).unwrap();
            assert_eq!(json, format!("\"{cap}\""));
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
    }

    #[test]
    fn unknown_capability() {
        assert_eq!(
            "manage_users".parse::<Capability>(),
            Err(TypeError::UnknownCapability("manage_users".into()))
        );
    }
}
