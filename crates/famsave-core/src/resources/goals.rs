use std::sync::Arc;

use tracing::debug;

use crate::api::{ApiClient, Result};
use crate::cache::{QueryCache, QueryKey, Resource};
use crate::models::{Goal, GoalAnalytics, GoalUpdate, NewGoal, SharePermission};

#[derive(Clone)]
pub struct Goals {
    client: ApiClient,
    cache: Arc<QueryCache>,
}

impl Goals {
    pub fn new(client: ApiClient, cache: Arc<QueryCache>) -> Self {
        Self { client, cache }
    }

    /// The user's goals, served from cache for up to 5 minutes.
    pub async fn list(&self, force: bool) -> Result<Vec<Goal>> {
        self.cache
            .fetch_with(QueryKey::Goals, force, || self.client.list_goals())
            .await
    }

    pub async fn get(&self, goal_id: &str) -> Result<Goal> {
        self.client.get_goal(goal_id).await
    }

    pub async fn analytics(&self, goal_id: &str) -> Result<GoalAnalytics> {
        self.client.goal_analytics(goal_id).await
    }

    pub async fn create(&self, goal: &NewGoal) -> Result<Goal> {
        let created = self.client.create_goal(goal).await?;
        debug!(goal_id = %created.id, "Goal created");
        self.cache.invalidate(&[Resource::Goals]);
        Ok(created)
    }

    pub async fn update(&self, goal_id: &str, update: &GoalUpdate) -> Result<Goal> {
        let updated = self.client.update_goal(goal_id, update).await?;
        self.cache.invalidate(&[Resource::Goals]);
        Ok(updated)
    }

    pub async fn delete(&self, goal_id: &str) -> Result<()> {
        self.client.delete_goal(goal_id).await?;
        debug!(goal_id, "Goal deleted");
        self.cache.invalidate(&[Resource::Goals]);
        Ok(())
    }

    /// Share doesn't change the owner's goal list, so nothing is invalidated.
    pub async fn share(
        &self,
        goal_id: &str,
        email: &str,
        permission: SharePermission,
    ) -> Result<()> {
        self.client.share_goal(goal_id, email, permission).await
    }
}
