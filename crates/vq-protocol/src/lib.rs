//! Shared types for the voice query intent core.
//!
//! Everything that crosses a crate boundary lives here: the intent schema,
//! the candidate every parsing tier produces, canonical entity values, and
//! the rejection shape handed to the dialogue layer.

pub mod intent;
pub mod outcome;
pub mod time;

pub use intent::*;
pub use outcome::*;
pub use time::*;
