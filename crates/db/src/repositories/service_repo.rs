//! Hosting service storage.

use std::collections::HashMap;

use npanel_core::types::EntityId;
use tokio::sync::RwLock;

use crate::models::{HostingService, ServiceStatus};

#[derive(Default)]
pub struct ServiceRepo {
    inner: RwLock<HashMap<EntityId, HostingService>>,
}

impl ServiceRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, service: HostingService) -> HostingService {
        let mut map = self.inner.write().await;
        map.insert(service.id, service.clone());
        service
    }

    pub async fn find(&self, id: EntityId) -> Option<HostingService> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Find a non-terminated service by primary domain.
    pub async fn find_live_by_domain(&self, domain: &str) -> Option<HostingService> {
        self.inner
            .read()
            .await
            .values()
            .find(|s| s.primary_domain == domain && s.status != ServiceStatus::Terminated)
            .cloned()
    }

    /// Find a non-terminated service by system username.
    pub async fn find_live_by_username(&self, username: &str) -> Option<HostingService> {
        self.inner
            .read()
            .await
            .values()
            .find(|s| s.system_username == username && s.status != ServiceStatus::Terminated)
            .cloned()
    }

    pub async fn list(&self) -> Vec<HostingService> {
        let mut services: Vec<HostingService> =
            self.inner.read().await.values().cloned().collect();
        services.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        services
    }

    /// Number of non-terminated services on a plan.
    pub async fn count_live_on_plan(&self, plan_id: EntityId) -> usize {
        self.inner
            .read()
            .await
            .values()
            .filter(|s| s.plan_id == plan_id && s.status != ServiceStatus::Terminated)
            .count()
    }
}
