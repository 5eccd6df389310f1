//! Resolver configuration, loaded once at startup from TOML.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;
use vq_protocol::IntentKind;

use crate::error::{CatalogError, ConfigError};
use crate::inference::semantic::{
    BedrockConfig, BedrockParser, OllamaConfig, OllamaParser, SemanticParser,
};
use crate::inventory::{HttpInventorySource, Inventory, InventorySource, StaticInventory};

/// Per-intent confidence floors with a fallback for unlisted intents.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentFloors {
    default: f64,
    overrides: BTreeMap<IntentKind, f64>,
}

impl IntentFloors {
    pub fn uniform(floor: f64) -> Self {
        Self {
            default: floor,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with(mut self, intent: IntentKind, floor: f64) -> Self {
        self.overrides.insert(intent, floor);
        self
    }

    pub fn get(&self, intent: IntentKind) -> f64 {
        self.overrides.get(&intent).copied().unwrap_or(self.default)
    }

    /// Tier 2 acceptance: 0.5 for every intent.
    pub fn keyword_defaults() -> Self {
        Self::uniform(0.5)
    }

    /// Validator: data queries 0.6, ranking and overview 0.4.
    pub fn validator_defaults() -> Self {
        Self::uniform(0.6)
            .with(IntentKind::RankingQuery, 0.4)
            .with(IntentKind::OverviewQuery, 0.4)
    }

    fn merged(mut self, overrides: &BTreeMap<IntentKind, f64>) -> Self {
        self.overrides.extend(overrides.iter().map(|(k, v)| (*k, *v)));
        self
    }

    fn all_within_unit(&self) -> bool {
        IntentKind::ALL
            .iter()
            .all(|i| (0.0..=1.0).contains(&self.get(*i)))
    }
}

/// `[floors]` section. Intent tables only list overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct FloorsConfig {
    #[serde(default)]
    pub keyword: BTreeMap<IntentKind, f64>,
    #[serde(default = "default_semantic_floor")]
    pub semantic: f64,
    #[serde(default)]
    pub validator: BTreeMap<IntentKind, f64>,
}

fn default_semantic_floor() -> f64 {
    0.6
}

impl Default for FloorsConfig {
    fn default() -> Self {
        Self {
            keyword: BTreeMap::new(),
            semantic: default_semantic_floor(),
            validator: BTreeMap::new(),
        }
    }
}

impl FloorsConfig {
    pub fn keyword_floors(&self) -> IntentFloors {
        IntentFloors::keyword_defaults().merged(&self.keyword)
    }

    pub fn validator_floors(&self) -> IntentFloors {
        IntentFloors::validator_defaults().merged(&self.validator)
    }
}

/// `[semantic]` section: which Tier 3 backend to use, if any.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum SemanticConfig {
    #[default]
    Disabled,
    Ollama(OllamaConfig),
    Bedrock(BedrockConfig),
}

impl SemanticConfig {
    /// Build the configured parser. `Disabled` yields `None`.
    pub async fn build(&self) -> Result<Option<Arc<dyn SemanticParser>>, ConfigError> {
        match self {
            SemanticConfig::Disabled => Ok(None),
            SemanticConfig::Ollama(cfg) => {
                let parser = OllamaParser::new(cfg.clone()).map_err(|e| ConfigError::Invalid {
                    field: "semantic",
                    message: e.to_string(),
                })?;
                Ok(Some(Arc::new(parser)))
            }
            SemanticConfig::Bedrock(cfg) => {
                Ok(Some(Arc::new(BedrockParser::from_env(cfg.clone()).await)))
            }
        }
    }
}

/// `[inventory]` section: a static seed list and an optional HTTP source.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
    /// When set, refreshes pull from this URL instead of the static lists.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_inventory_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_inventory_timeout_secs() -> u64 {
    10
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            metrics: Vec::new(),
            url: None,
            timeout_secs: default_inventory_timeout_secs(),
        }
    }
}

impl InventoryConfig {
    /// The static lists as an inventory.
    pub fn seed(&self) -> Inventory {
        Inventory::new(self.entities.iter().cloned(), self.metrics.iter().cloned())
    }

    pub fn source(&self) -> Result<Arc<dyn InventorySource>, CatalogError> {
        match &self.url {
            Some(url) => Ok(Arc::new(HttpInventorySource::new(
                url.clone(),
                Duration::from_secs(self.timeout_secs),
            )?)),
            None => Ok(Arc::new(StaticInventory::new(self.seed()))),
        }
    }
}

/// Top-level resolver configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub floors: FloorsConfig,
    /// Hard deadline for one Tier 3 call.
    #[serde(default = "default_semantic_timeout_ms")]
    pub semantic_timeout_ms: u64,
    /// Fuzzy-match edit-distance threshold.
    #[serde(default = "default_max_edit_distance")]
    pub max_edit_distance: usize,
    /// Catalog refresh interval. 0 disables periodic refresh.
    #[serde(default = "default_catalog_refresh_secs")]
    pub catalog_refresh_secs: u64,
    /// Offset used for calendar boundaries ("today", "this month").
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
}

fn default_semantic_timeout_ms() -> u64 {
    5_000
}
fn default_max_edit_distance() -> usize {
    2
}
fn default_catalog_refresh_secs() -> u64 {
    300
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            floors: FloorsConfig::default(),
            semantic_timeout_ms: default_semantic_timeout_ms(),
            max_edit_distance: default_max_edit_distance(),
            catalog_refresh_secs: default_catalog_refresh_secs(),
            utc_offset_minutes: 0,
            semantic: SemanticConfig::default(),
            inventory: InventoryConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let floors = &self.floors;
        if !floors.keyword_floors().all_within_unit() {
            return Err(invalid("floors.keyword", "floors must be within [0, 1]"));
        }
        if !floors.validator_floors().all_within_unit() {
            return Err(invalid("floors.validator", "floors must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&floors.semantic) {
            return Err(invalid("floors.semantic", "floor must be within [0, 1]"));
        }
        if self.semantic_timeout_ms == 0 {
            return Err(invalid("semantic_timeout_ms", "must be positive"));
        }
        self.utc_offset()?;
        Ok(())
    }

    pub fn semantic_timeout(&self) -> Duration {
        Duration::from_millis(self.semantic_timeout_ms)
    }

    /// `None` when periodic refresh is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.catalog_refresh_secs > 0).then(|| Duration::from_secs(self.catalog_refresh_secs))
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or_else(|| invalid("utc_offset_minutes", "offset out of range"))
    }
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.to_string(),
    }
}
