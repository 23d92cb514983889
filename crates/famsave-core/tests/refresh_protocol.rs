//! Session and refresh-on-401 behavior against a mock backend.

use std::sync::Arc;

use famsave_core::api::{ApiClient, ApiError};
use famsave_core::auth::{
    AuthState, CredentialPair, MemoryTokenStore, Session, SignOutReason, TokenStore,
};
use famsave_core::models::{RegisterRequest, UserRole};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

struct Harness {
    server: ServerGuard,
    store: Arc<MemoryTokenStore>,
    session: Arc<Session>,
    client: ApiClient,
}

async fn harness(pair: Option<CredentialPair>) -> Harness {
    let server = Server::new_async().await;
    let store = Arc::new(match pair {
        Some(pair) => MemoryTokenStore::with_pair(pair),
        None => MemoryTokenStore::new(),
    });
    let session = Arc::new(Session::init(store.clone()).expect("session init"));
    let client = ApiClient::new(format!("{}/api", server.url()), session.clone())
        .expect("client builds");
    Harness {
        server,
        store,
        session,
        client,
    }
}

fn tokens(access: &str, refresh: &str) -> String {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer"
    })
    .to_string()
}

fn user_json(email: &str, two_factor_enabled: bool) -> String {
    json!({
        "id": "u-1",
        "email": email,
        "name": "Amani Otieno",
        "role": "parent",
        "phone_number": "254712345678",
        "is_active": true,
        "is_verified": false,
        "two_factor_enabled": two_factor_enabled,
        "created_at": "2024-01-15T08:00:00"
    })
    .to_string()
}

fn registration(email: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Amani Otieno".into(),
        email: email.into(),
        password: "s3cret".into(),
        role: UserRole::Parent,
        phone_number: Some("254712345678".into()),
    }
}

fn bearer(token: &str) -> Matcher {
    Matcher::Exact(format!("Bearer {}", token))
}

#[tokio::test]
async fn login_stores_tokens_and_next_request_carries_them() {
    let mut h = harness(None).await;

    let login = h
        .server
        .mock("POST", "/api/auth/login")
        .match_body(Matcher::PartialJson(json!({
            "email": "amani@example.com",
            "password": "s3cret"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(tokens("A1", "R1"))
        .create_async()
        .await;
    let goals = h
        .server
        .mock("GET", "/api/goals")
        .match_header("authorization", bearer("A1"))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let mut states = h.session.subscribe();
    h.client
        .login("amani@example.com", "s3cret", None)
        .await
        .expect("login succeeds");

    assert!(states.has_changed().unwrap());
    assert!(states.borrow_and_update().is_signed_in());
    assert_eq!(
        h.store.load().unwrap(),
        Some(CredentialPair::new("A1", "R1"))
    );

    let list = h.client.list_goals().await.expect("goals load");
    assert!(list.is_empty());

    login.assert_async().await;
    goals.assert_async().await;
}

#[tokio::test]
async fn login_reports_two_factor_requirement() {
    let mut h = harness(None).await;

    let challenge = h
        .server
        .mock("POST", "/api/auth/login")
        .match_body(Matcher::PartialJson(json!({"password": "s3cret"})))
        .with_status(200)
        .with_header("X-Require-2FA", "true")
        .with_body(json!({"detail": "2FA code required"}).to_string())
        .create_async()
        .await;

    let err = h
        .client
        .login("amani@example.com", "s3cret", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::TwoFactorRequired));
    assert!(h.store.load().unwrap().is_none());
    challenge.assert_async().await;
}

#[tokio::test]
async fn login_with_two_factor_code_succeeds() {
    let mut h = harness(None).await;

    let login = h
        .server
        .mock("POST", "/api/auth/login")
        .match_body(Matcher::PartialJson(json!({"two_factor_code": "123456"})))
        .with_status(200)
        .with_body(tokens("A1", "R1"))
        .create_async()
        .await;

    h.client
        .login("amani@example.com", "s3cret", Some("123456"))
        .await
        .expect("login succeeds");
    assert!(h.session.is_authenticated());
    login.assert_async().await;
}

#[tokio::test]
async fn login_rejection_surfaces_server_detail() {
    let mut h = harness(None).await;

    let _rejected = h.server
        .mock("POST", "/api/auth/login")
        .with_status(401)
        .with_body(json!({"detail": "Incorrect email or password"}).to_string())
        .create_async()
        .await;

    match h.client.login("amani@example.com", "wrong", None).await {
        Err(ApiError::InvalidCredentials(detail)) => {
            assert_eq!(detail, "Incorrect email or password")
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn unauthorized_refreshes_once_and_retries_with_new_token() {
    let mut h = harness(Some(CredentialPair::new("A1", "R1"))).await;

    let rejected = h
        .server
        .mock("GET", "/api/goals")
        .match_header("authorization", bearer("A1"))
        .with_status(401)
        .with_body(json!({"detail": "Token expired"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/auth/refresh")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Json(json!({"refresh_token": "R1"})))
        .with_status(200)
        .with_body(tokens("A2", "R2"))
        .expect(1)
        .create_async()
        .await;
    let retried = h
        .server
        .mock("GET", "/api/goals")
        .match_header("authorization", bearer("A2"))
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    h.client.list_goals().await.expect("retry succeeds");

    assert_eq!(
        h.store.load().unwrap(),
        Some(CredentialPair::new("A2", "R2"))
    );
    assert!(h.session.state().is_signed_in());
    rejected.assert_async().await;
    refresh.assert_async().await;
    retried.assert_async().await;
}

#[tokio::test]
async fn second_unauthorized_fails_without_another_refresh() {
    let mut h = harness(Some(CredentialPair::new("A1", "R1"))).await;

    let _expired = h.server
        .mock("GET", "/api/transactions")
        .match_header("authorization", bearer("A1"))
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/auth/refresh")
        .with_status(200)
        .with_body(tokens("A2", "R2"))
        .expect(1)
        .create_async()
        .await;
    let retried = h
        .server
        .mock("GET", "/api/transactions")
        .match_header("authorization", bearer("A2"))
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let err = h.client.list_transactions().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));

    refresh.assert_async().await;
    retried.assert_async().await;
}

#[tokio::test]
async fn failed_refresh_clears_every_token() {
    let mut h = harness(Some(CredentialPair::new("A1", "R1"))).await;

    let _expired = h.server
        .mock("GET", "/api/analytics/savings-overview")
        .match_header("authorization", bearer("A1"))
        .with_status(401)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/auth/refresh")
        .with_status(401)
        .with_body(json!({"detail": "Invalid refresh token"}).to_string())
        .expect(1)
        .create_async()
        .await;

    let mut states = h.session.subscribe();
    let err = h.client.savings_overview().await.unwrap_err();

    assert!(matches!(err, ApiError::SessionExpired));
    assert!(err.requires_login());
    assert!(h.store.load().unwrap().is_none());
    assert!(h.store.load_user().unwrap().is_none());
    assert!(states.has_changed().unwrap());
    assert_eq!(
        *states.borrow_and_update(),
        AuthState::SignedOut {
            reason: SignOutReason::Expired
        }
    );
    refresh.assert_async().await;
}

#[tokio::test]
async fn unauthorized_without_credentials_skips_refresh() {
    let mut h = harness(None).await;

    let _anonymous = h.server
        .mock("GET", "/api/goals")
        .match_header("authorization", Matcher::Missing)
        .with_status(401)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/auth/refresh")
        .expect(0)
        .create_async()
        .await;

    let err = h.client.list_goals().await.unwrap_err();
    assert!(matches!(err, ApiError::NotAuthenticated));
    refresh.assert_async().await;
}

#[tokio::test]
async fn non_auth_errors_are_not_retried() {
    let mut h = harness(Some(CredentialPair::new("A1", "R1"))).await;

    let missing = h
        .server
        .mock("GET", "/api/goals/g-404")
        .with_status(404)
        .with_body(json!({"detail": "Goal not found"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/auth/refresh")
        .expect(0)
        .create_async()
        .await;

    match h.client.get_goal("g-404").await {
        Err(ApiError::NotFound(detail)) => assert_eq!(detail, "Goal not found"),
        other => panic!("unexpected result: {:?}", other),
    }
    missing.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let mut h = harness(Some(CredentialPair::new("A1", "R1"))).await;

    let _expired = h.server
        .mock("GET", "/api/goals")
        .match_header("authorization", bearer("A1"))
        .with_status(401)
        .expect_at_least(1)
        .create_async()
        .await;
    let refresh = h
        .server
        .mock("POST", "/api/auth/refresh")
        .match_body(Matcher::Json(json!({"refresh_token": "R1"})))
        .with_status(200)
        .with_body(tokens("A2", "R2"))
        .expect(1)
        .create_async()
        .await;
    let retried = h
        .server
        .mock("GET", "/api/goals")
        .match_header("authorization", bearer("A2"))
        .with_status(200)
        .with_body("[]")
        .expect(5)
        .create_async()
        .await;

    let results =
        futures::future::join_all((0..5).map(|_| h.client.list_goals())).await;
    for result in results {
        result.expect("every request ends up authorized");
    }

    assert_eq!(
        h.store.load().unwrap(),
        Some(CredentialPair::new("A2", "R2"))
    );
    refresh.assert_async().await;
    retried.assert_async().await;
}

#[tokio::test]
async fn logout_clears_credentials_even_when_server_fails() {
    let mut h = harness(Some(CredentialPair::new("A1", "R1"))).await;

    let logout = h
        .server
        .mock("POST", "/api/auth/logout")
        .match_header("authorization", bearer("A1"))
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    h.client.logout().await.expect("logout never fails on the server's account");

    assert!(h.store.load().unwrap().is_none());
    assert_eq!(
        h.session.state(),
        AuthState::SignedOut {
            reason: SignOutReason::LoggedOut
        }
    );
    logout.assert_async().await;
}

#[tokio::test]
async fn registered_identity_survives_login() {
    let mut h = harness(None).await;

    let register = h
        .server
        .mock("POST", "/api/auth/register")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::PartialJson(json!({
            "email": "amani@example.com",
            "role": "parent"
        })))
        .with_status(200)
        .with_body(user_json("amani@example.com", false))
        .expect(1)
        .create_async()
        .await;
    let _login = h
        .server
        .mock("POST", "/api/auth/login")
        .with_status(200)
        .with_body(tokens("A1", "R1"))
        .create_async()
        .await;

    let user = h
        .client
        .register(&registration("amani@example.com"))
        .await
        .expect("registration succeeds");
    assert_eq!(user.id, "u-1");
    assert!(!h.session.is_authenticated());

    h.client
        .login("amani@example.com", "s3cret", None)
        .await
        .expect("login succeeds");

    let cached = h.session.user().unwrap().expect("identity cached");
    assert_eq!(cached.email, "amani@example.com");
    match h.session.state() {
        AuthState::SignedIn { user: Some(user) } => assert_eq!(user.id, "u-1"),
        other => panic!("unexpected state: {:?}", other),
    }
    register.assert_async().await;
}

#[tokio::test]
async fn login_as_another_account_drops_registered_identity() {
    let mut h = harness(None).await;

    let _register = h
        .server
        .mock("POST", "/api/auth/register")
        .with_status(200)
        .with_body(user_json("amani@example.com", false))
        .create_async()
        .await;
    let _login = h
        .server
        .mock("POST", "/api/auth/login")
        .with_status(200)
        .with_body(tokens("A1", "R1"))
        .create_async()
        .await;

    h.client
        .register(&registration("amani@example.com"))
        .await
        .expect("registration succeeds");
    h.client
        .login("baraka@example.com", "pa55", None)
        .await
        .expect("login succeeds");

    assert!(h.session.user().unwrap().is_none());
    assert_eq!(h.session.state(), AuthState::SignedIn { user: None });
}

#[tokio::test]
async fn registering_while_signed_in_keeps_current_identity() {
    let mut h = harness(Some(CredentialPair::new("A1", "R1"))).await;

    let _register = h
        .server
        .mock("POST", "/api/auth/register")
        .with_status(200)
        .with_body(user_json("child@example.com", false))
        .create_async()
        .await;

    h.client
        .register(&registration("child@example.com"))
        .await
        .expect("registration succeeds");
    assert!(h.store.load_user().unwrap().is_none());
}

#[tokio::test]
async fn two_factor_setup_then_verify() {
    let mut h = harness(Some(CredentialPair::new("A1", "R1"))).await;

    let enable = h
        .server
        .mock("POST", "/api/auth/enable-2fa")
        .match_header("authorization", bearer("A1"))
        .with_status(200)
        .with_body(
            json!({
                "secret": "JBSWY3DPEHPK3PXP",
                "qr_code": "data:image/png;base64,iVBORw0KGgo=",
                "backup_codes": []
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let verify = h
        .server
        .mock("POST", "/api/auth/verify-2fa")
        .match_header("authorization", bearer("A1"))
        .match_query(Matcher::UrlEncoded("code".into(), "123456".into()))
        .with_status(200)
        .with_body(json!({"message": "2FA enabled successfully"}).to_string())
        .expect(1)
        .create_async()
        .await;

    // Cached identity from before; verification should flip its flag
    h.session
        .set_user(&serde_json::from_str(&user_json("amani@example.com", false)).unwrap())
        .unwrap();

    let setup = h.client.enable_two_factor().await.expect("setup starts");
    assert_eq!(setup.secret, "JBSWY3DPEHPK3PXP");
    assert!(setup.backup_codes.is_empty());

    h.client
        .verify_two_factor(" 123456 ")
        .await
        .expect("code accepted");
    assert!(h.session.user().unwrap().unwrap().two_factor_enabled);

    enable.assert_async().await;
    verify.assert_async().await;
}

#[tokio::test]
async fn rejected_two_factor_code_surfaces_detail() {
    let mut h = harness(Some(CredentialPair::new("A1", "R1"))).await;

    let _verify = h
        .server
        .mock("POST", "/api/auth/verify-2fa")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(json!({"detail": "Invalid 2FA code"}).to_string())
        .create_async()
        .await;

    match h.client.verify_two_factor("000000").await {
        Err(ApiError::Validation(detail)) => assert_eq!(detail, "Invalid 2FA code"),
        other => panic!("unexpected result: {:?}", other),
    }
}
