//! Customer storage.

use std::collections::HashMap;

use npanel_core::types::EntityId;
use tokio::sync::RwLock;

use crate::models::Customer;

#[derive(Default)]
pub struct CustomerRepo {
    inner: RwLock<HashMap<EntityId, Customer>>,
}

impl CustomerRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, customer: Customer) -> Customer {
        let mut map = self.inner.write().await;
        map.insert(customer.id, customer.clone());
        customer
    }

    pub async fn find(&self, id: EntityId) -> Option<Customer> {
        self.inner.read().await.get(&id).cloned()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<Customer> {
        self.inner
            .read()
            .await
            .values()
            .find(|c| c.email.eq_ignore_ascii_case(email))
            .cloned()
    }
}
