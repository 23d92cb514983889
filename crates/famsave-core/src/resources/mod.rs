//! Cached, invalidation-aware access to server resources.
//!
//! Reads go through the shared [`QueryCache`]: a fresh entry is returned
//! without touching the network, anything else is refetched first. Writes go
//! straight to the [`ApiClient`] and, only once they succeed, invalidate
//! every cached query that depends on what they changed:
//!
//! | Mutation                    | Invalidates          |
//! |-----------------------------|----------------------|
//! | create/update/delete goal   | goals                |
//! | create transaction          | transactions, goals  |
//! | initiate M-Pesa payment     | transactions, goals  |
//!
//! Deposits move a goal's `current_amount`, hence transaction writes also
//! invalidate the goal list. Analytics are read-only and expire by age.

use std::sync::Arc;

use tracing::info;

use crate::api::{ApiClient, Result};
use crate::cache::QueryCache;
use crate::models::{Goal, SavingsOverview, Transaction};

pub mod analytics;
pub mod goals;
pub mod transactions;

pub use analytics::Analytics;
pub use goals::Goals;
pub use transactions::Transactions;

/// Snapshot backing the summary screen.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub goals: Vec<Goal>,
    pub transactions: Vec<Transaction>,
    pub overview: SavingsOverview,
}

/// All resource handles over one client and one cache.
#[derive(Clone)]
pub struct Resources {
    pub goals: Goals,
    pub transactions: Transactions,
    pub analytics: Analytics,
    client: ApiClient,
    cache: Arc<QueryCache>,
}

impl Resources {
    pub fn new(client: ApiClient, cache: Arc<QueryCache>) -> Self {
        Self {
            goals: Goals::new(client.clone(), cache.clone()),
            transactions: Transactions::new(client.clone(), cache.clone()),
            analytics: Analytics::new(client.clone(), cache.clone()),
            client,
            cache,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Load goals, transactions and the savings overview concurrently.
    /// Fails if any of the three fails.
    pub async fn dashboard(&self, force: bool) -> Result<Dashboard> {
        let (goals, transactions, overview) = futures::try_join!(
            self.goals.list(force),
            self.transactions.list(force),
            self.analytics.savings_overview(force),
        )?;
        Ok(Dashboard {
            goals,
            transactions,
            overview,
        })
    }

    /// Log out and drop the signed-out user's cached data. The cache is
    /// cleared even if the local session could not be torn down.
    pub async fn logout(&self) -> Result<()> {
        let result = self.client.logout().await;
        self.cache.clear();
        info!("Cleared query cache after logout");
        result
    }
}
