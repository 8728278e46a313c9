//! Migration job, account, step, and log storage.

use std::collections::HashMap;

use npanel_core::types::EntityId;
use tokio::sync::RwLock;

use crate::models::{MigrationAccount, MigrationJob, MigrationLogEntry, MigrationStep};

#[derive(Default)]
pub struct JobRepo {
    inner: RwLock<HashMap<EntityId, MigrationJob>>,
}

impl JobRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, job: MigrationJob) -> MigrationJob {
        let mut map = self.inner.write().await;
        map.insert(job.id, job.clone());
        job
    }

    pub async fn find(&self, id: EntityId) -> Option<MigrationJob> {
        self.inner.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<MigrationJob> {
        let mut jobs: Vec<MigrationJob> = self.inner.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }
}

/// Accounts are stored per job in insertion order; planning walks them in
/// the order they were added.
#[derive(Default)]
pub struct AccountRepo {
    inner: RwLock<HashMap<EntityId, Vec<MigrationAccount>>>,
}

impl AccountRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, account: MigrationAccount) -> MigrationAccount {
        let mut map = self.inner.write().await;
        let accounts = map.entry(account.job_id).or_default();
        match accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => *existing = account.clone(),
            None => accounts.push(account.clone()),
        }
        account
    }

    pub async fn find(&self, id: EntityId) -> Option<MigrationAccount> {
        self.inner
            .read()
            .await
            .values()
            .flatten()
            .find(|a| a.id == id)
            .cloned()
    }

    pub async fn list_for_job(&self, job_id: EntityId) -> Vec<MigrationAccount> {
        self.inner
            .read()
            .await
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Steps are stored per job; listing is ordered by `position`.
#[derive(Default)]
pub struct StepRepo {
    inner: RwLock<HashMap<EntityId, Vec<MigrationStep>>>,
}

impl StepRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, step: MigrationStep) -> MigrationStep {
        let mut map = self.inner.write().await;
        let steps = map.entry(step.job_id).or_default();
        match steps.iter_mut().find(|s| s.id == step.id) {
            Some(existing) => *existing = step.clone(),
            None => steps.push(step.clone()),
        }
        step
    }

    pub async fn list_for_job(&self, job_id: EntityId) -> Vec<MigrationStep> {
        let mut steps = self
            .inner
            .read()
            .await
            .get(&job_id)
            .cloned()
            .unwrap_or_default();
        steps.sort_by_key(|s| s.position);
        steps
    }

    pub async fn any_for_job(&self, job_id: EntityId) -> bool {
        self.inner
            .read()
            .await
            .get(&job_id)
            .is_some_and(|steps| !steps.is_empty())
    }
}

#[derive(Default)]
pub struct MigrationLogRepo {
    inner: RwLock<HashMap<EntityId, Vec<MigrationLogEntry>>>,
}

impl MigrationLogRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, entry: MigrationLogEntry) {
        let mut map = self.inner.write().await;
        map.entry(entry.job_id).or_default().push(entry);
    }

    pub async fn list_for_job(&self, job_id: EntityId) -> Vec<MigrationLogEntry> {
        self.inner
            .read()
            .await
            .get(&job_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StepName, StepStatus};

    fn step(job_id: EntityId, position: i64) -> MigrationStep {
        MigrationStep {
            id: uuid::Uuid::new_v4(),
            job_id,
            account_id: None,
            name: StepName::ValidateSourceHost,
            status: StepStatus::Pending,
            payload: serde_json::Value::Null,
            last_error: None,
            position,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn steps_list_in_position_order() {
        let repo = StepRepo::new();
        let job_id = uuid::Uuid::new_v4();
        repo.save(step(job_id, 2)).await;
        repo.save(step(job_id, 0)).await;
        repo.save(step(job_id, 1)).await;

        let positions: Vec<i64> = repo
            .list_for_job(job_id)
            .await
            .iter()
            .map(|s| s.position)
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn step_save_replaces_by_id() {
        let repo = StepRepo::new();
        let job_id = uuid::Uuid::new_v4();
        let mut s = step(job_id, 0);
        repo.save(s.clone()).await;
        s.status = StepStatus::Completed;
        repo.save(s).await;

        let steps = repo.list_for_job(job_id).await;
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].status, StepStatus::Completed);
    }
}
