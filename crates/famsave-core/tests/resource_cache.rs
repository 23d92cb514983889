//! Resource reads, writes and cache invalidation against a mock backend.

use std::sync::Arc;

use famsave_core::api::{ApiClient, ApiError};
use famsave_core::auth::{CredentialPair, MemoryTokenStore, Session, TokenStore};
use famsave_core::cache::{QueryCache, QueryKey};
use famsave_core::models::{
    MpesaPaymentRequest, NewTransaction, TransactionMethod, TransactionType, User,
};
use famsave_core::resources::Resources;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};

async fn setup() -> (ServerGuard, Resources) {
    let server = Server::new_async().await;
    let store = Arc::new(MemoryTokenStore::with_pair(CredentialPair::new("A1", "R1")));
    let session = Arc::new(Session::init(store).expect("session init"));
    let client = ApiClient::new(format!("{}/api", server.url()), session).expect("client builds");
    let resources = Resources::new(client, Arc::new(QueryCache::in_memory()));
    (server, resources)
}

fn goal_json(current_amount: f64) -> Value {
    json!({
        "id": "g-1",
        "user_id": "u-1",
        "title": "New bicycle",
        "description": null,
        "target_amount": "20000.00",
        "current_amount": current_amount,
        "target_date": "2030-12-31T00:00:00",
        "category": "toys",
        "priority": "high",
        "status": "active",
        "progress_percentage": current_amount / 200.0,
        "days_remaining": 365,
        "created_at": "2024-01-01T08:00:00",
        "updated_at": "2024-01-01T08:00:00",
        "completed_at": null
    })
}

fn deposit_json() -> Value {
    json!({
        "id": "t-1",
        "user_id": "u-1",
        "goal_id": "g-1",
        "amount": "5000.00",
        "transaction_type": "deposit",
        "method": "cash",
        "status": "completed",
        "description": "Birthday money",
        "reference_number": "TXN123",
        "mpesa_reference": null,
        "phone_number": null,
        "transaction_fee": 0,
        "created_at": "2024-06-01T10:00:00",
        "processed_at": "2024-06-01T10:00:01"
    })
}

#[tokio::test]
async fn fresh_reads_do_not_touch_the_network() {
    let (mut server, resources) = setup().await;

    let goals = server
        .mock("GET", "/api/goals")
        .with_status(200)
        .with_body(json!([goal_json(0.0)]).to_string())
        .expect(1)
        .create_async()
        .await;

    let first = resources.goals.list(false).await.expect("first read");
    let second = resources.goals.list(false).await.expect("cached read");
    assert_eq!(first, second);
    goals.assert_async().await;
}

#[tokio::test]
async fn forced_reads_bypass_the_cache() {
    let (mut server, resources) = setup().await;

    let goals = server
        .mock("GET", "/api/goals")
        .with_status(200)
        .with_body("[]")
        .expect(2)
        .create_async()
        .await;

    resources.goals.list(false).await.expect("first read");
    resources.goals.list(true).await.expect("forced read");
    goals.assert_async().await;
}

#[tokio::test]
async fn deposit_invalidates_goal_list() {
    let (mut server, resources) = setup().await;

    let before = server
        .mock("GET", "/api/goals")
        .with_status(200)
        .with_body(json!([goal_json(0.0)]).to_string())
        .expect(1)
        .create_async()
        .await;
    let goals = resources.goals.list(false).await.expect("initial read");
    assert_eq!(goals[0].current_amount, 0.0);
    before.assert_async().await;
    before.remove_async().await;

    let create = server
        .mock("POST", "/api/transactions")
        .match_header("authorization", "Bearer A1")
        .match_body(Matcher::PartialJson(json!({
            "goal_id": "g-1",
            "amount": 5000.0,
            "transaction_type": "deposit"
        })))
        .with_status(200)
        .with_body(deposit_json().to_string())
        .expect(1)
        .create_async()
        .await;
    let after = server
        .mock("GET", "/api/goals")
        .with_status(200)
        .with_body(json!([goal_json(5000.0)]).to_string())
        .expect(1)
        .create_async()
        .await;

    let deposit = NewTransaction::new(
        "g-1",
        5000.0,
        TransactionType::Deposit,
        TransactionMethod::Cash,
    );
    let created = resources
        .transactions
        .create(&deposit)
        .await
        .expect("deposit accepted");
    assert_eq!(created.amount, 5000.0);

    let cache = resources.cache();
    assert!(cache.is_stale(&QueryKey::Goals));

    let goals = resources.goals.list(false).await.expect("refetched read");
    assert_eq!(goals[0].current_amount, 5000.0);
    create.assert_async().await;
    after.assert_async().await;
}

#[tokio::test]
async fn mpesa_payment_invalidates_transactions_and_goals() {
    let (mut server, resources) = setup().await;

    let _transactions = server
        .mock("GET", "/api/transactions")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let _goals = server
        .mock("GET", "/api/goals")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let _overview = server
        .mock("GET", "/api/analytics/savings-overview")
        .with_status(200)
        .with_body(
            json!({
                "total_savings": 0,
                "total_target": 0,
                "overall_progress": 0,
                "active_goals": 0,
                "completed_goals": 0,
                "monthly_savings_rate": 0,
                "monthly_trends": [],
                "category_breakdown": []
            })
            .to_string(),
        )
        .create_async()
        .await;
    let payment = server
        .mock("POST", "/api/transactions/mpesa/payment")
        .match_body(Matcher::PartialJson(json!({
            "phone_number": "254712345678",
            "paybill_number": "522522"
        })))
        .with_status(200)
        .with_body(
            json!({
                "message": "Payment initiated. Please complete on your phone.",
                "transaction_id": "t-9",
                "checkout_request_id": "ws_CO_123"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    resources.dashboard(false).await.expect("dashboard loads");

    let request = MpesaPaymentRequest::new("g-1", 1500.0, "254712345678", "FAM-001");
    let initiated = resources
        .transactions
        .initiate_mpesa_payment(&request)
        .await
        .expect("payment initiated");
    assert_eq!(initiated.transaction_id, "t-9");

    let cache = resources.cache();
    assert!(cache.is_stale(&QueryKey::Transactions));
    assert!(cache.is_stale(&QueryKey::Goals));
    // Analytics are only refreshed by age
    assert!(!cache.is_stale(&QueryKey::SavingsOverview));
    payment.assert_async().await;
}

#[tokio::test]
async fn failed_mutation_leaves_cache_untouched() {
    let (mut server, resources) = setup().await;

    let goals = server
        .mock("GET", "/api/goals")
        .with_status(200)
        .with_body(json!([goal_json(0.0)]).to_string())
        .expect(1)
        .create_async()
        .await;
    let _failing_create = server
        .mock("POST", "/api/transactions")
        .with_status(500)
        .with_body(json!({"detail": "Database unavailable"}).to_string())
        .create_async()
        .await;

    resources.goals.list(false).await.expect("initial read");

    let deposit = NewTransaction::new(
        "g-1",
        5000.0,
        TransactionType::Deposit,
        TransactionMethod::Cash,
    );
    let err = resources.transactions.create(&deposit).await.unwrap_err();
    assert!(matches!(err, ApiError::ServerError(_)));

    assert!(!resources.cache().is_stale(&QueryKey::Goals));
    resources.goals.list(false).await.expect("still cached");
    goals.assert_async().await;
}

#[tokio::test]
async fn refetch_failure_is_not_masked_by_stale_data() {
    let (mut server, resources) = setup().await;

    let ok = server
        .mock("GET", "/api/goals")
        .with_status(200)
        .with_body(json!([goal_json(0.0)]).to_string())
        .create_async()
        .await;
    resources.goals.list(false).await.expect("initial read");
    ok.remove_async().await;

    let _unavailable = server
        .mock("GET", "/api/goals")
        .with_status(503)
        .create_async()
        .await;

    let err = resources.goals.list(true).await.unwrap_err();
    assert!(matches!(err, ApiError::ServerError(_)));
}

#[tokio::test]
async fn spending_patterns_are_cached_per_period() {
    let (mut server, resources) = setup().await;

    let patterns = |days: u32| {
        json!({
            "period_days": days,
            "total_deposits": 1000,
            "total_withdrawals": 0,
            "net_savings": 1000,
            "average_transaction_size": 500,
            "transaction_count": 2,
            "method_breakdown": {"mpesa": {"count": 2, "total": 1000}},
            "peak_saving_day": 5
        })
        .to_string()
    };
    let thirty = server
        .mock("GET", "/api/analytics/spending-patterns")
        .match_query(Matcher::UrlEncoded("period_days".into(), "30".into()))
        .with_status(200)
        .with_body(patterns(30))
        .expect(1)
        .create_async()
        .await;
    let ninety = server
        .mock("GET", "/api/analytics/spending-patterns")
        .match_query(Matcher::UrlEncoded("period_days".into(), "90".into()))
        .with_status(200)
        .with_body(patterns(90))
        .expect(1)
        .create_async()
        .await;

    let default_period = resources
        .analytics
        .spending_patterns(None, false)
        .await
        .expect("30 day patterns");
    assert_eq!(default_period.period_days, 30);
    resources
        .analytics
        .spending_patterns(Some(30), false)
        .await
        .expect("cached 30 day patterns");
    let quarter = resources
        .analytics
        .spending_patterns(Some(90), false)
        .await
        .expect("90 day patterns");
    assert_eq!(quarter.period_days, 90);

    thirty.assert_async().await;
    ninety.assert_async().await;
}

#[tokio::test]
async fn logout_drops_cached_data() {
    let (mut server, resources) = setup().await;

    let _goals = server
        .mock("GET", "/api/goals")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let _logout = server
        .mock("POST", "/api/auth/logout")
        .with_status(200)
        .with_body(json!({"message": "Successfully logged out"}).to_string())
        .create_async()
        .await;

    resources.goals.list(false).await.expect("read");
    resources.logout().await.expect("logout");

    assert!(resources
        .cache()
        .get::<Value>(&QueryKey::Goals)
        .is_none());
    assert!(!resources.client().session().is_authenticated());
}

/// Token store whose `clear` always fails, e.g. a locked keychain.
struct StuckTokenStore(MemoryTokenStore);

impl TokenStore for StuckTokenStore {
    fn save(&self, pair: &CredentialPair) -> anyhow::Result<()> {
        self.0.save(pair)
    }

    fn load(&self) -> anyhow::Result<Option<CredentialPair>> {
        self.0.load()
    }

    fn clear(&self) -> anyhow::Result<()> {
        anyhow::bail!("keychain is locked")
    }

    fn save_user(&self, user: &User) -> anyhow::Result<()> {
        self.0.save_user(user)
    }

    fn load_user(&self) -> anyhow::Result<Option<User>> {
        self.0.load_user()
    }

    fn clear_user(&self) -> anyhow::Result<()> {
        self.0.clear_user()
    }
}

#[tokio::test]
async fn logout_drops_cached_data_when_credentials_cannot_be_cleared() {
    let mut server = Server::new_async().await;
    let store = Arc::new(StuckTokenStore(MemoryTokenStore::with_pair(
        CredentialPair::new("A1", "R1"),
    )));
    let session = Arc::new(Session::init(store).expect("session init"));
    let client = ApiClient::new(format!("{}/api", server.url()), session).expect("client builds");
    let resources = Resources::new(client, Arc::new(QueryCache::in_memory()));

    let _goals = server
        .mock("GET", "/api/goals")
        .with_status(200)
        .with_body(json!([goal_json(0.0)]).to_string())
        .create_async()
        .await;
    let _logout = server
        .mock("POST", "/api/auth/logout")
        .with_status(200)
        .create_async()
        .await;

    resources.goals.list(false).await.expect("read");

    let err = resources.logout().await.unwrap_err();
    assert!(matches!(err, ApiError::Storage(_)));
    assert!(resources
        .cache()
        .get::<Value>(&QueryKey::Goals)
        .is_none());
}
