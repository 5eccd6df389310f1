//! Intent resolution core for the voice query assistant.
//!
//! Turns a free-form utterance into a [`ValidatedCommand`] or a
//! [`Rejection`](vq_protocol::Rejection) carrying a clarification prompt.
//! Parsing is tiered: deterministic patterns, keyword scoring against the
//! entity catalog, then an external semantic model. Whatever tier wins, the
//! candidate goes through the [`EntityValidator`] before anything leaves
//! this crate.

pub mod catalog;
pub mod config;
pub mod error;
pub mod inference;
pub mod inventory;
pub mod mock;
pub mod normalize;
pub mod pipeline;
pub mod time_range;
pub mod validator;

// Re-export key types for convenience
pub use catalog::{CatalogSnapshot, EntityCatalog, Lookup};
pub use config::{IntentFloors, InventoryConfig, ResolverConfig, SemanticConfig};
pub use error::{CatalogError, ConfigError, SemanticError, TimeRangeError};
pub use inference::semantic::{SemanticGuess, SemanticParser};
pub use inventory::{HttpInventorySource, Inventory, InventorySource, StaticInventory};
pub use pipeline::{Outcome, Resolution, Resolver};
pub use time_range::{Clock, FixedClock, SystemClock, TimeRangeParser};
pub use validator::{EntityValidator, ValidatedCommand};
