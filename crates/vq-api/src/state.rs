//! Shared application state for the Axum server.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::RwLock;
use vq_resolver::{
    EntityCatalog, Inventory, InventorySource, Resolution, Resolver, ResolverConfig,
    StaticInventory,
};

/// How many past resolutions the history endpoint keeps.
pub const HISTORY_LIMIT: usize = 200;

/// Shared application state, cheap to clone into handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    /// Same catalog the resolver reads; refreshed through `inventory`.
    pub catalog: Arc<EntityCatalog>,
    pub inventory: Arc<dyn InventorySource>,
    /// Most recent resolutions, newest last.
    pub history: Arc<RwLock<VecDeque<Resolution>>>,
}

impl AppState {
    pub fn new(resolver: Arc<Resolver>, inventory: Arc<dyn InventorySource>) -> Self {
        Self {
            catalog: resolver.catalog().clone(),
            resolver,
            inventory,
            history: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    /// Build everything from resolver config: semantic backend, catalog,
    /// inventory source. An HTTP inventory is pulled once before serving.
    pub async fn from_config(config: &ResolverConfig) -> anyhow::Result<Self> {
        let seed = config.inventory.seed();
        let catalog = Arc::new(if seed.entities.is_empty() {
            EntityCatalog::empty()
        } else {
            EntityCatalog::new(seed)
        });

        let inventory = config.inventory.source()?;
        if config.inventory.url.is_some() {
            // Failure is logged by the catalog; serve with what we have.
            let _ = catalog.refresh(inventory.as_ref()).await;
        }
        if catalog.snapshot().entities().is_empty() {
            tracing::warn!("entity catalog is empty, every machine name will be rejected");
        }

        let semantic = config.semantic.build().await?;
        match &semantic {
            Some(parser) => tracing::info!(backend = parser.backend_name(), "semantic tier enabled"),
            None => tracing::info!("semantic tier disabled"),
        }

        let resolver = Resolver::from_config(config, catalog, semantic)?;
        Ok(Self::new(Arc::new(resolver), inventory))
    }

    /// Sample plant for development and tests.
    pub fn with_sample_data() -> Self {
        let inventory = Inventory::new(
            ["Compressor-1", "Compressor-2", "HVAC", "Boiler-1", "Main Pump"],
            ["power", "energy", "temperature", "pressure"],
        );
        let catalog = Arc::new(EntityCatalog::new(inventory.clone()));
        Self::new(
            Arc::new(Resolver::new(catalog)),
            Arc::new(StaticInventory::new(inventory)),
        )
    }

    /// Append to the bounded history.
    pub async fn record(&self, resolution: Resolution) {
        let mut history = self.history.write().await;
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(resolution);
    }
}
