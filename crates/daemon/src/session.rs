// Handle Cache: session-lifetime map from workspace id to a live capability.
// Owned by the registry and passed by reference; never global.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::capability::SharedCapability;

#[derive(Debug, Default)]
pub struct HandleCache {
    handles: RwLock<HashMap<String, SharedCapability>>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<SharedCapability> {
        self.handles
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(id)
            .cloned()
    }

    pub fn insert(&self, id: &str, handle: SharedCapability) {
        self.handles
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id.to_string(), handle);
    }

    pub fn remove(&self, id: &str) -> Option<SharedCapability> {
        self.handles
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handles
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .handles
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.handles.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
