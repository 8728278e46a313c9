//! Customer entity.

use npanel_core::types::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};

/// An account owner. Hosting services and migration targets reference
/// customers; the panel only needs identity here, not billing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub created_at: Timestamp,
}

impl Customer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            created_at: chrono::Utc::now(),
        }
    }
}
