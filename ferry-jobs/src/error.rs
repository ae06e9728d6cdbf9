use ferry_node::VirtualPath;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("A job needs at least one destination slave")]
    NoDestinations,

    #[error("Cannot require {required} copies on {destinations} destination slaves")]
    /// The required copy count must be between one and the number of
    /// destination slaves.
    InvalidRequiredCopies { required: u32, destinations: usize },

    #[error("Unknown destination slave: {0}")]
    UnknownSlave(String),

    #[error("File not found: {0}")]
    FileNotFound(VirtualPath),

    #[error("Invalid job index range: {0:?}")]
    InvalidRange(String),

    #[error("Invalid job manager config: {0}")]
    Config(#[from] toml::de::Error),
}
