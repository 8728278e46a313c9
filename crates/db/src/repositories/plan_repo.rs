//! Hosting plan storage.

use std::collections::HashMap;

use npanel_core::types::EntityId;
use tokio::sync::RwLock;

use crate::models::HostingPlan;

#[derive(Default)]
pub struct PlanRepo {
    inner: RwLock<HashMap<EntityId, HostingPlan>>,
}

impl PlanRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, plan: HostingPlan) -> HostingPlan {
        let mut map = self.inner.write().await;
        map.insert(plan.id, plan.clone());
        plan
    }

    pub async fn find(&self, id: EntityId) -> Option<HostingPlan> {
        self.inner.read().await.get(&id).cloned()
    }

    pub async fn find_by_name(&self, name: &str) -> Option<HostingPlan> {
        self.inner
            .read()
            .await
            .values()
            .find(|p| p.name == name)
            .cloned()
    }

    pub async fn list(&self) -> Vec<HostingPlan> {
        let mut plans: Vec<HostingPlan> = self.inner.read().await.values().cloned().collect();
        plans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        plans
    }

    pub async fn delete(&self, id: EntityId) -> bool {
        self.inner.write().await.remove(&id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }
}
