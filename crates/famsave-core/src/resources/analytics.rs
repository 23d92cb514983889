use std::sync::Arc;

use crate::api::{ApiClient, Result, DEFAULT_SPENDING_PERIOD_DAYS};
use crate::cache::{QueryCache, QueryKey};
use crate::models::{FamilyComparison, GoalProgress, SavingsOverview, SpendingPatterns};

/// Read-only analytics. Nothing invalidates these; they expire by age.
#[derive(Clone)]
pub struct Analytics {
    client: ApiClient,
    cache: Arc<QueryCache>,
}

impl Analytics {
    pub fn new(client: ApiClient, cache: Arc<QueryCache>) -> Self {
        Self { client, cache }
    }

    pub async fn savings_overview(&self, force: bool) -> Result<SavingsOverview> {
        self.cache
            .fetch_with(QueryKey::SavingsOverview, force, || {
                self.client.savings_overview()
            })
            .await
    }

    pub async fn goal_progress(&self, force: bool) -> Result<Vec<GoalProgress>> {
        self.cache
            .fetch_with(QueryKey::GoalProgress, force, || self.client.goal_progress())
            .await
    }

    /// Spending patterns over the last `period_days` (30 when `None`). Each
    /// period is cached separately.
    pub async fn spending_patterns(
        &self,
        period_days: Option<u32>,
        force: bool,
    ) -> Result<SpendingPatterns> {
        let period_days = period_days.unwrap_or(DEFAULT_SPENDING_PERIOD_DAYS);
        self.cache
            .fetch_with(QueryKey::SpendingPatterns { period_days }, force, || {
                self.client.spending_patterns(period_days)
            })
            .await
    }

    pub async fn family_comparison(&self, force: bool) -> Result<FamilyComparison> {
        self.cache
            .fetch_with(QueryKey::FamilyComparison, force, || {
                self.client.family_comparison()
            })
            .await
    }
}
