use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The concrete kind of a repository object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Binary sample with derived hashes.
    File,
    /// Semi-structured malware configuration.
    Config,
    /// Textual blob, usually referenced from configs.
    #[serde(rename = "text_blob")]
    TextBlob,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 3] = [Self::File, Self::Config, Self::TextBlob];

    /// Path segment used by the HTTP API (`file`, `config`, `blob`).
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Config => "config",
            Self::TextBlob => "blob",
        }
    }

    /// Type name used by field mappings and item representations.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Config => "Config",
            Self::TextBlob => "TextBlob",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Config => write!(f, "config"),
            Self::TextBlob => write!(f, "text_blob"),
        }
    }
}

impl FromStr for ObjectKind {
    type Err = TypeError;

    /// Accepts the endpoint names and the serialized names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "config" => Ok(Self::Config),
            "blob" | "text_blob" => Ok(Self::TextBlob),
            other => Err(TypeError::UnknownKind(other.to_string())),
        }
    }
}
