//! Error types

use std::path::PathBuf;
use thiserror::Error;

use crate::attributes::Attribute;
use crate::labels::Label;

/// Problems found while wiring an ability to its owner.
#[derive(Debug, Error, PartialEq)]
pub enum AbilityError {
    #[error("ability {0} is already initialized")]
    AlreadyInitialized(Label),
    #[error("ability {ability} uses attribute {attribute} which its attribute set does not define")]
    MissingAttribute { ability: Label, attribute: Attribute },
    #[error("ability {0} has an attribute cost without any modifier")]
    EmptyAttributeCost(Label),
    #[error("ability {0} is already registered on this owner")]
    DuplicateAbility(Label),
    #[error("no ability named {0}")]
    UnknownAbility(Label),
}

/// Problems loading ability definitions.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid ability definitions: {}", .0.join("; "))]
    Invalid(Vec<String>),
}
