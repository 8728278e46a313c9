//! Append-only audit log storage, scoped per service.

use std::collections::HashMap;

use npanel_core::types::EntityId;
use tokio::sync::RwLock;

use crate::models::HostingLogEntry;

#[derive(Default)]
pub struct HostingLogRepo {
    inner: RwLock<HashMap<EntityId, Vec<HostingLogEntry>>>,
}

impl HostingLogRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, entry: HostingLogEntry) {
        let mut map = self.inner.write().await;
        map.entry(entry.service_id).or_default().push(entry);
    }

    /// Entries for a service in append order.
    pub async fn list_for_service(&self, service_id: EntityId) -> Vec<HostingLogEntry> {
        self.inner
            .read()
            .await
            .get(&service_id)
            .cloned()
            .unwrap_or_default()
    }
}
