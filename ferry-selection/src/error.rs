use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("No available slave: {reason}")]
    /// Every candidate was eliminated by the filter chain.
    NoAvailableSlave { reason: String },
}

impl SelectionError {
    pub(crate) fn no_available_slave(reason: impl Into<String>) -> Self {
        Self::NoAvailableSlave {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
/// A malformed filter chain definition.
pub enum ConfigError {
    #[error("Unknown filter {0:?}")]
    UnknownFilter(String),

    #[error("Unknown filter chain {0:?}")]
    UnknownPurpose(String),

    #[error("Filter {filter} is missing required parameter {param:?}")]
    MissingParam { filter: String, param: String },

    #[error("Filter {filter} has an invalid value for {param:?}: {reason}")]
    InvalidParam {
        filter: String,
        param: String,
        reason: String,
    },

    #[error("Filter {filter} names unknown slave {slave:?}")]
    UnknownSlave { filter: String, slave: String },

    #[error("Invalid multiplier expression {expr:?}: {reason}")]
    InvalidMultiplier { expr: String, reason: String },

    #[error("Failed to parse filter configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to read filter configuration: {0}")]
    Io(#[from] std::io::Error),
}
