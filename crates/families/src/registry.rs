//! Family id to bridge resolution.

use crate::bitcoin::BitcoinBridge;
use crate::bridge::AccountBridge;
use crate::cosmos::CosmosBridge;
use crate::error::RegistryError;
use crate::evm::EvmBridge;
use crate::source::ChainDataSource;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use walletsync_cache::CacheConfig;
use walletsync_domain::enums::Family;

/// Read-only table of bridges, built once at startup.
#[derive(Clone)]
pub struct BridgeRegistry {
    bridges: BTreeMap<Family, Arc<dyn AccountBridge>>,
}

impl BridgeRegistry {
    /// Builds a registry from a table of bridges, keyed by their family.
    ///
    /// A later bridge for an already listed family replaces the earlier one.
    pub fn from_table(table: impl IntoIterator<Item = Arc<dyn AccountBridge>>) -> Self {
        let bridges: BTreeMap<Family, Arc<dyn AccountBridge>> = table
            .into_iter()
            .map(|bridge| (bridge.family(), bridge))
            .collect();
        info!(families = bridges.len(), "Bridge registry initialized");
        Self { bridges }
    }

    /// Registry of every family implemented in this crate, sharing one data source.
    pub fn standard(source: Arc<dyn ChainDataSource>, cache_config: CacheConfig) -> Self {
        Self::from_table([
            Arc::new(BitcoinBridge::new(source.clone(), cache_config.clone()))
                as Arc<dyn AccountBridge>,
            Arc::new(EvmBridge::new(source.clone(), cache_config.clone())),
            Arc::new(CosmosBridge::new(source, cache_config)),
        ])
    }

    /// Returns the bridge of `family`.
    ///
    /// # Errors
    /// Returns `UnknownFamily` if no bridge is registered for it.
    pub fn resolve(&self, family: Family) -> Result<Arc<dyn AccountBridge>, RegistryError> {
        self.bridges
            .get(&family)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownFamily(family.to_string()))
    }

    /// Returns the bridge of the family with id `family_id`.
    ///
    /// # Errors
    /// Returns `UnknownFamily` if the id is not a family or has no bridge.
    pub fn resolve_id(&self, family_id: &str) -> Result<Arc<dyn AccountBridge>, RegistryError> {
        let family: Family = family_id
            .parse()
            .map_err(|_| RegistryError::UnknownFamily(family_id.to_string()))?;
        self.resolve(family)
    }

    /// Families with a registered bridge.
    pub fn families(&self) -> Vec<Family> {
        self.bridges.keys().copied().collect()
    }

    pub fn supports(&self, family: Family) -> bool {
        self.bridges.contains_key(&family)
    }
}
