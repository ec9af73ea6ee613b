//! # Adapter Registry
//!
//! Maps service-type keys to adapters. The process-wide registry is populated
//! once at startup; tests build their own instance or swap entries in place.

use crate::adapter::Adapter;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

static GLOBAL_REGISTRY: LazyLock<Arc<AdapterRegistry>> =
    LazyLock::new(|| Arc::new(AdapterRegistry::new()));

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn Adapter>>>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("service_types", &self.service_types())
            .finish()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by the running controller
    pub fn global() -> Arc<AdapterRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Register an adapter under its own service type, returning any adapter it replaced
    pub fn register(&self, adapter: Arc<dyn Adapter>) -> Option<Arc<dyn Adapter>> {
        let key = adapter.service_type().to_ascii_lowercase();
        self.adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, adapter)
    }

    pub fn get(&self, service_type: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&service_type.to_ascii_lowercase())
            .cloned()
    }

    pub fn service_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    /// Install `adapter` under `service_type` regardless of what it reports
    pub fn replace_for_tests(&self, service_type: &str, adapter: Arc<dyn Adapter>) {
        self.adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service_type.to_ascii_lowercase(), adapter);
    }

    pub fn clear_for_tests(&self) {
        self.adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
