use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{ApiClient, Result};
use crate::cache::{QueryCache, QueryKey, Resource};
use crate::models::{MpesaPaymentRequest, NewTransaction, PaymentInitiated, Transaction};

/// Transaction writes change goal balances too.
const AFFECTED_BY_TRANSACTION: [Resource; 2] = [Resource::Transactions, Resource::Goals];

#[derive(Clone)]
pub struct Transactions {
    client: ApiClient,
    cache: Arc<QueryCache>,
}

impl Transactions {
    pub fn new(client: ApiClient, cache: Arc<QueryCache>) -> Self {
        Self { client, cache }
    }

    /// The user's transactions, served from cache for up to 2 minutes.
    pub async fn list(&self, force: bool) -> Result<Vec<Transaction>> {
        self.cache
            .fetch_with(QueryKey::Transactions, force, || {
                self.client.list_transactions()
            })
            .await
    }

    pub async fn get(&self, transaction_id: &str) -> Result<Transaction> {
        self.client.get_transaction(transaction_id).await
    }

    pub async fn create(&self, transaction: &NewTransaction) -> Result<Transaction> {
        let created = self.client.create_transaction(transaction).await?;
        debug!(
            transaction_id = %created.id,
            goal_id = %created.goal_id,
            amount = created.amount,
            "Transaction created"
        );
        self.cache.invalidate(&AFFECTED_BY_TRANSACTION);
        Ok(created)
    }

    pub async fn initiate_mpesa_payment(
        &self,
        payment: &MpesaPaymentRequest,
    ) -> Result<PaymentInitiated> {
        let initiated = self.client.initiate_mpesa_payment(payment).await?;
        info!(
            transaction_id = %initiated.transaction_id,
            goal_id = %payment.goal_id,
            "M-Pesa payment initiated"
        );
        self.cache.invalidate(&AFFECTED_BY_TRANSACTION);
        Ok(initiated)
    }
}
