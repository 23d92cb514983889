//! API client for the family savings REST service.
//!
//! Every request except login, register and refresh carries the current
//! access token, read from the session at send time. A 401 triggers one
//! token refresh and one retry; see [`super::request`] for the lifecycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{CredentialPair, Session, SignOutReason};
use crate::models::{
    FamilyComparison, Goal, GoalAnalytics, GoalProgress, GoalUpdate, LoginRequest,
    MpesaPaymentRequest, NewGoal, NewTransaction, PaymentInitiated, RegisterRequest,
    SavingsOverview, SharePermission, SpendingPatterns, Transaction, TwoFactorSetup, User,
};
use crate::models::is_valid_two_factor_code;

use super::request::{PendingRequest, RequestPhase};
use super::{ApiError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Base URL of a locally running backend.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Spending analytics look-back window used when none is given.
pub const DEFAULT_SPENDING_PERIOD_DAYS: u32 = 30;

/// Longest look-back window the analytics endpoint accepts.
const MAX_SPENDING_PERIOD_DAYS: u32 = 365;

/// Header the login endpoint sets when a two-factor code is needed.
const TWO_FACTOR_HEADER: &str = "x-require-2fa";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

impl From<TokenResponse> for CredentialPair {
    fn from(tokens: TokenResponse) -> Self {
        CredentialPair::new(tokens.access_token, tokens.refresh_token)
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// API client for the savings backend.
/// Clone is cheap - the connection pool, session and refresh lock are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<Session>,
    /// Held for the duration of a refresh so concurrent 401s share one call.
    refresh_lock: Arc<Mutex<()>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Arc<Session>) -> Result<Self> {
        Self::with_timeout(
            base_url,
            session,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        session: Arc<Session>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            session,
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Authentication =====

    /// Log in and store the issued token pair.
    ///
    /// Returns `TwoFactorRequired` when the account has 2FA enabled and no
    /// code was supplied; call again with the code.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        two_factor_code: Option<&str>,
    ) -> Result<CredentialPair> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            two_factor_code: two_factor_code.map(str::to_string),
        };

        let response = self
            .client
            .post(self.url("/auth/login"))
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        if requires_two_factor(response.headers()) {
            debug!(email, "Login requires a two-factor code");
            return Err(ApiError::TwoFactorRequired);
        }

        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::InvalidCredentials(super::error::detail(&body)));
        }

        let response = Self::check_response(response).await?;
        let pair: CredentialPair = Self::decode::<TokenResponse>(response).await?.into();

        self.session.establish(&pair, email)?;
        info!(email, "Logged in");
        Ok(pair)
    }

    /// Create an account. Does not log in.
    ///
    /// The returned identity is cached so a following login as the same
    /// email has it, unless this client is already signed in as someone.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User> {
        if request.name.trim().is_empty() || request.email.trim().is_empty() {
            return Err(ApiError::Validation("Name and email are required".to_string()));
        }
        if request.password.is_empty() {
            return Err(ApiError::Validation("Password is required".to_string()));
        }

        let response = self
            .client
            .post(self.url("/auth/register"))
            .header(header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let user: User = Self::decode(response).await?;
        info!(user_id = %user.id, "Registered account");

        if self.session.is_authenticated() {
            debug!("Already signed in, not caching the registered identity");
        } else {
            self.session.set_user(&user)?;
        }
        Ok(user)
    }

    /// Tell the server we are leaving, then clear local credentials.
    ///
    /// The server call is best effort: its failure is logged and the local
    /// session is cleared regardless.
    pub async fn logout(&self) -> Result<()> {
        if let Some(token) = self.session.access_token()? {
            let result = self
                .client
                .post(self.url("/auth/logout"))
                .bearer_auth(&token)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!("Server acknowledged logout");
                }
                Ok(response) => {
                    warn!(status = %response.status(), "Logout request rejected, clearing local session anyway");
                }
                Err(e) => {
                    warn!(error = %e, "Logout request failed, clearing local session anyway");
                }
            }
        }

        self.session.end(SignOutReason::LoggedOut)?;
        info!("Logged out");
        Ok(())
    }

    /// Start two-factor setup. The server holds the new secret but keeps
    /// 2FA off until [`ApiClient::verify_two_factor`] confirms a code.
    pub async fn enable_two_factor(&self) -> Result<TwoFactorSetup> {
        let request = PendingRequest::new(Method::POST, self.url("/auth/enable-2fa"));
        let setup = self.send_json(request).await?;
        info!("Two-factor setup started");
        Ok(setup)
    }

    /// Confirm a code from the authenticator app, turning 2FA on.
    pub async fn verify_two_factor(&self, code: &str) -> Result<()> {
        let code = code.trim();
        if !is_valid_two_factor_code(code) {
            return Err(ApiError::Validation("Code must be 6 digits".to_string()));
        }
        let request =
            PendingRequest::new(Method::POST, self.url("/auth/verify-2fa")).query("code", code);
        self.send_discarding_body(request).await?;

        if let Some(mut user) = self.session.user()? {
            user.two_factor_enabled = true;
            self.session.set_user(&user)?;
        }
        info!("Two-factor authentication enabled");
        Ok(())
    }

    /// Exchange a refresh token for a new pair. Never carries a bearer token
    /// and is never itself retried.
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<CredentialPair> {
        let response = self
            .client
            .post(self.url("/auth/refresh"))
            .header(header::ACCEPT, "application/json")
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Ok(Self::decode::<TokenResponse>(response).await?.into())
    }

    /// Obtain a usable access token after a request sent with `sent_with`
    /// was rejected.
    ///
    /// Refreshes are serialized. If the stored token no longer matches the
    /// one the request used, another request already refreshed and its
    /// token is returned without a second refresh call. A failed refresh
    /// ends the session.
    async fn refresh_after_unauthorized(&self, sent_with: Option<&str>) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        let Some(pair) = self.session.credentials()? else {
            // Either never logged in, or a concurrent refresh already failed
            return Err(if sent_with.is_some() {
                ApiError::SessionExpired
            } else {
                ApiError::NotAuthenticated
            });
        };

        if sent_with != Some(pair.access_token.as_str()) {
            debug!("Access token already replaced, reusing it");
            return Ok(pair.access_token);
        }

        match self.refresh_tokens(&pair.refresh_token).await {
            Ok(new_pair) => {
                self.session.replace(&new_pair)?;
                info!("Access token refreshed");
                Ok(new_pair.access_token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.session.end(SignOutReason::Expired)?;
                Err(ApiError::SessionExpired)
            }
        }
    }

    // ===== Request plumbing =====

    async fn dispatch(
        &self,
        request: &PendingRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .header(header::ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        debug!(
            method = %request.method,
            url = %request.url,
            status = %response.status(),
            retried = request.was_retried(),
            "Response received"
        );
        Ok(response)
    }

    /// Run a request through the refresh-and-retry lifecycle. The returned
    /// response may still be a non-success status other than 401.
    async fn execute(&self, mut request: PendingRequest) -> Result<reqwest::Response> {
        let sent_with = self.session.access_token()?;
        let response = self.dispatch(&request, sent_with.as_deref()).await?;

        if request.on_response(response.status()) != RequestPhase::AwaitingRefresh {
            return Ok(response);
        }

        let token = match self.refresh_after_unauthorized(sent_with.as_deref()).await {
            Ok(token) => {
                request.on_refresh(true);
                token
            }
            Err(e) => {
                request.on_refresh(false);
                return Err(e);
            }
        };

        let response = self.dispatch(&request, Some(&token)).await?;
        if request.on_response(response.status()) == RequestPhase::Failed {
            warn!(url = %request.url, "Request rejected again after token refresh");
            return Err(ApiError::Unauthorized);
        }
        Ok(response)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: PendingRequest) -> Result<T> {
        let response = self.execute(request).await?;
        let response = Self::check_response(response).await?;
        Self::decode(response).await
    }

    /// For endpoints whose response body carries nothing we need.
    async fn send_discarding_body(&self, request: PendingRequest) -> Result<()> {
        let response = self.execute(request).await?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(PendingRequest::new(Method::GET, self.url(path)))
            .await
    }

    // ===== Goals =====

    pub async fn list_goals(&self) -> Result<Vec<Goal>> {
        self.get("/goals").await
    }

    pub async fn get_goal(&self, goal_id: &str) -> Result<Goal> {
        self.get(&format!("/goals/{}", goal_id)).await
    }

    pub async fn create_goal(&self, goal: &NewGoal) -> Result<Goal> {
        goal.validate(Utc::now()).map_err(ApiError::Validation)?;
        let request = PendingRequest::new(Method::POST, self.url("/goals")).json(goal)?;
        self.send_json(request).await
    }

    pub async fn update_goal(&self, goal_id: &str, update: &GoalUpdate) -> Result<Goal> {
        update.validate().map_err(ApiError::Validation)?;
        let request =
            PendingRequest::new(Method::PUT, self.url(&format!("/goals/{}", goal_id))).json(update)?;
        self.send_json(request).await
    }

    pub async fn delete_goal(&self, goal_id: &str) -> Result<()> {
        let request = PendingRequest::new(Method::DELETE, self.url(&format!("/goals/{}", goal_id)));
        self.send_discarding_body(request).await
    }

    pub async fn goal_analytics(&self, goal_id: &str) -> Result<GoalAnalytics> {
        self.get(&format!("/goals/{}/analytics", goal_id)).await
    }

    pub async fn share_goal(
        &self,
        goal_id: &str,
        email: &str,
        permission: SharePermission,
    ) -> Result<()> {
        if email.trim().is_empty() {
            return Err(ApiError::Validation("Email is required".to_string()));
        }
        let request = PendingRequest::new(Method::POST, self.url(&format!("/goals/{}/share", goal_id)))
            .query("shared_with_email", email)
            .query("permission_level", permission.as_str());
        self.send_discarding_body(request).await
    }

    // ===== Transactions =====

    pub async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.get("/transactions").await
    }

    pub async fn get_transaction(&self, transaction_id: &str) -> Result<Transaction> {
        self.get(&format!("/transactions/{}", transaction_id)).await
    }

    pub async fn create_transaction(&self, transaction: &NewTransaction) -> Result<Transaction> {
        transaction.validate().map_err(ApiError::Validation)?;
        let request = PendingRequest::new(Method::POST, self.url("/transactions")).json(transaction)?;
        self.send_json(request).await
    }

    /// Start an M-Pesa STK push. Settlement happens on the provider's side;
    /// the transaction shows up as pending until the backend hears back.
    pub async fn initiate_mpesa_payment(
        &self,
        payment: &MpesaPaymentRequest,
    ) -> Result<PaymentInitiated> {
        payment.validate().map_err(ApiError::Validation)?;
        let request =
            PendingRequest::new(Method::POST, self.url("/transactions/mpesa/payment")).json(payment)?;
        self.send_json(request).await
    }

    // ===== Analytics =====

    pub async fn savings_overview(&self) -> Result<SavingsOverview> {
        self.get("/analytics/savings-overview").await
    }

    pub async fn goal_progress(&self) -> Result<Vec<GoalProgress>> {
        self.get("/analytics/goal-progress").await
    }

    pub async fn spending_patterns(&self, period_days: u32) -> Result<SpendingPatterns> {
        if !(1..=MAX_SPENDING_PERIOD_DAYS).contains(&period_days) {
            return Err(ApiError::Validation(format!(
                "Period must be between 1 and {} days",
                MAX_SPENDING_PERIOD_DAYS
            )));
        }
        let request = PendingRequest::new(Method::GET, self.url("/analytics/spending-patterns"))
            .query("period_days", period_days);
        self.send_json(request).await
    }

    pub async fn family_comparison(&self) -> Result<FamilyComparison> {
        self.get("/analytics/family-comparison").await
    }
}

fn requires_two_factor(headers: &header::HeaderMap) -> bool {
    headers
        .get(TWO_FACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
