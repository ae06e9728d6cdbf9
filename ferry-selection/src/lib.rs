//! # Ferry Selection
//!
//! Picks the slave a transfer should use by running a configurable chain of
//! scoring filters over the candidates. Each placement purpose (user uploads,
//! user downloads, job sources and job destinations) has its own chain.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ferry_node::{SlaveManager, SlaveRegistry};
//! use ferry_node::test_utils::MemoryVfs;
//! use ferry_selection::{SelectionConfig, SlaveSelectionManager};
//!
//! let config = SelectionConfig::from_toml_str(r#"
//!     [[upload]]
//!     filter = "bandwidth"
//!     multiplier = 1
//! "#).unwrap();
//!
//! let registry: Arc<dyn SlaveRegistry> = Arc::new(SlaveManager::new());
//! let manager = SlaveSelectionManager::new(registry, Arc::new(MemoryVfs::default()), &config)
//!     .unwrap();
//! # drop(manager);
//! ```

#[macro_use]
extern crate tracing;

mod chain;
mod config;
mod error;
mod filter;
pub mod filters;
mod manager;
mod multiplier;
mod score;

pub use chain::FilterChain;
pub use config::{FilterConfig, ParamValue, Purpose, SelectionConfig};
pub use error::{ConfigError, SelectionError};
pub use filter::{Filter, FilterContext, Requester, TransferCounts};
pub use manager::SlaveSelectionManager;
pub use multiplier::parse_multiplier;
pub use score::{ScoreChart, SlaveScore};
