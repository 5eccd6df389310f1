//! Inventory sources feeding the entity catalog.
//!
//! The catalog pulls from a source on startup and on refresh triggers; it
//! never pushes. A source returns the complete current list or an error,
//! never a partial one.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Complete list of valid machine names and metric tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub entities: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
}

impl Inventory {
    pub fn new<E, M>(
        entities: impl IntoIterator<Item = E>,
        metrics: impl IntoIterator<Item = M>,
    ) -> Self
    where
        E: Into<String>,
        M: Into<String>,
    {
        Self {
            entities: entities.into_iter().map(Into::into).collect(),
            metrics: metrics.into_iter().map(Into::into).collect(),
        }
    }
}

/// Anything that can produce a full inventory.
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn fetch(&self) -> Result<Inventory, CatalogError>;

    /// Name of this source (for logging).
    fn source_name(&self) -> &str;
}

/// Fixed inventory, typically from the config file.
#[derive(Debug, Clone)]
pub struct StaticInventory {
    inventory: Inventory,
}

impl StaticInventory {
    pub fn new(inventory: Inventory) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl InventorySource for StaticInventory {
    async fn fetch(&self) -> Result<Inventory, CatalogError> {
        Ok(self.inventory.clone())
    }

    fn source_name(&self) -> &str {
        "static"
    }
}

/// Inventory served as JSON (`{"entities": [...], "metrics": [...]}`) by an
/// HTTP endpoint, usually the asset registry of the monitoring backend.
pub struct HttpInventorySource {
    client: reqwest::Client,
    url: String,
}

impl HttpInventorySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Source(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl InventorySource for HttpInventorySource {
    async fn fetch(&self) -> Result<Inventory, CatalogError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CatalogError::Source(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CatalogError::Source(format!(
                "inventory endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<Inventory>()
            .await
            .map_err(|e| CatalogError::Malformed(e.to_string()))
    }

    fn source_name(&self) -> &str {
        "http"
    }
}
