//! Scripted collaborators for tests.
//!
//! The semantic model and the inventory source are external; these stand-ins
//! let the pipeline and catalog be exercised without a network, including
//! the slow and failing paths.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CatalogError, SemanticError};
use crate::inference::semantic::{SemanticGuess, SemanticParser};
use crate::inventory::{Inventory, InventorySource};

/// What the mock parser does on each call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Guess(SemanticGuess),
    NoMatch,
    Fail,
    /// Sleep, then answer with the guess.
    Slow(Duration, SemanticGuess),
}

/// Semantic parser with a fixed reply and a record of the utterances it saw.
#[derive(Debug)]
pub struct MockSemanticParser {
    reply: MockReply,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl MockSemanticParser {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn guessing(guess: SemanticGuess) -> Self {
        Self::new(MockReply::Guess(guess))
    }

    pub fn failing() -> Self {
        Self::new(MockReply::Fail)
    }

    pub fn slow(delay: Duration, guess: SemanticGuess) -> Self {
        Self::new(MockReply::Slow(delay, guess))
    }

    /// Number of `parse` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Utterances passed to `parse`, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SemanticParser for MockSemanticParser {
    async fn parse(&self, text: &str, _schema: &str) -> Result<Option<SemanticGuess>, SemanticError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(text.to_string());
        }

        match &self.reply {
            MockReply::Guess(guess) => Ok(Some(guess.clone())),
            MockReply::NoMatch => Ok(None),
            MockReply::Fail => Err(SemanticError::Transport("connection refused".into())),
            MockReply::Slow(delay, guess) => {
                tokio::time::sleep(*delay).await;
                Ok(Some(guess.clone()))
            }
        }
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

/// Inventory source that always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingInventory;

#[async_trait]
impl InventorySource for FailingInventory {
    async fn fetch(&self) -> Result<Inventory, CatalogError> {
        Err(CatalogError::Source("registry unreachable".into()))
    }

    fn source_name(&self) -> &str {
        "failing"
    }
}

/// Inventory source whose contents can be swapped between fetches.
#[derive(Debug, Default)]
pub struct ScriptedInventory {
    next: Mutex<Inventory>,
}

impl ScriptedInventory {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            next: Mutex::new(inventory),
        }
    }

    pub fn set(&self, inventory: Inventory) {
        if let Ok(mut next) = self.next.lock() {
            *next = inventory;
        }
    }
}

#[async_trait]
impl InventorySource for ScriptedInventory {
    async fn fetch(&self) -> Result<Inventory, CatalogError> {
        self.next
            .lock()
            .map(|inv| inv.clone())
            .map_err(|_| CatalogError::Source("scripted inventory poisoned".into()))
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_parser_records_calls() {
        let parser = MockSemanticParser::guessing(SemanticGuess::new("overview_query", 0.9));
        let guess = parser.parse("how's the plant", "").await.unwrap().unwrap();
        assert_eq!(guess.intent.as_deref(), Some("overview_query"));
        assert_eq!(parser.calls(), 1);
        assert_eq!(parser.seen(), vec!["how's the plant"]);
    }

    #[tokio::test]
    async fn mock_parser_failure() {
        let parser = MockSemanticParser::failing();
        assert!(parser.parse("anything", "").await.is_err());
    }

    #[tokio::test]
    async fn scripted_inventory_swaps() {
        let source = ScriptedInventory::new(Inventory::new(["A-1"], ["power"]));
        assert_eq!(source.fetch().await.unwrap().entities, vec!["A-1"]);
        source.set(Inventory::new(["B-2"], Vec::<String>::new()));
        assert_eq!(source.fetch().await.unwrap().entities, vec!["B-2"]);
    }
}
