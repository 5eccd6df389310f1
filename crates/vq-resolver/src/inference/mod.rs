//! Intent inference tiers.
//!
//! - **Tier 1** (`rules`): anchored patterns, high confidence, no I/O.
//! - **Tier 2** (`keywords`): weighted keyword scoring against the catalog.
//! - **Tier 3** (`semantic`): external model behind [`semantic::SemanticParser`].
//!
//! Every tier emits an unvalidated `IntentCandidate`; nothing here consults
//! the whitelist beyond recognising mentions.

pub mod keywords;
pub mod rules;
pub mod semantic;

pub use keywords::KeywordMatcher;
pub use rules::PatternRouter;
pub use semantic::{SemanticGuess, SemanticParser};
