//! Child registry collaborator.
//!
//! Children and guardians are owned by another system. The engine only asks
//! whether they exist and for the redacted child details it may publish.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use flare_common::AppResult;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Registered child as seen by the alert engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSummary {
    pub child_id: String,
    pub guardian_id: String,
    pub first_name: String,
    pub age: Option<u8>,
    /// Blurred photo variant. The unblurred photo never reaches this crate.
    pub blurred_photo_url: Option<String>,
}

#[async_trait]
pub trait ChildRegistry: Send + Sync {
    async fn child_summary(&self, child_id: &str) -> AppResult<Option<ChildSummary>>;

    async fn guardian_exists(&self, guardian_id: &str) -> AppResult<bool>;
}

/// Shared registry handle.
pub type ChildRegistryRef = Arc<dyn ChildRegistry>;

/// Registry kept in process memory.
#[derive(Default)]
pub struct InMemoryChildRegistry {
    guardians: RwLock<HashSet<String>>,
    children: RwLock<HashMap<String, ChildSummary>>,
}

impl InMemoryChildRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_guardian(&self, guardian_id: impl Into<String>) {
        self.guardians.write().await.insert(guardian_id.into());
    }

    /// Register a child and its guardian.
    pub async fn register_child(&self, child: ChildSummary) {
        self.register_guardian(child.guardian_id.clone()).await;
        self.children
            .write()
            .await
            .insert(child.child_id.clone(), child);
    }
}

#[async_trait]
impl ChildRegistry for InMemoryChildRegistry {
    async fn child_summary(&self, child_id: &str) -> AppResult<Option<ChildSummary>> {
        Ok(self.children.read().await.get(child_id).cloned())
    }

    async fn guardian_exists(&self, guardian_id: &str) -> AppResult<bool> {
        Ok(self.guardians.read().await.contains(guardian_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_child_registers_guardian() {
        let registry = InMemoryChildRegistry::new();
        registry
            .register_child(ChildSummary {
                child_id: "c1".to_string(),
                guardian_id: "g1".to_string(),
                first_name: "Leo".to_string(),
                age: Some(9),
                blurred_photo_url: None,
            })
            .await;

        assert!(registry.guardian_exists("g1").await.unwrap());
        assert!(!registry.guardian_exists("g2").await.unwrap());
        assert_eq!(
            registry.child_summary("c1").await.unwrap().unwrap().first_name,
            "Leo"
        );
        assert!(registry.child_summary("c2").await.unwrap().is_none());
    }
}
