//! Account models and the authentication payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wire;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Parent,
    Child,
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Parent => write!(f, "Parent"),
            UserRole::Child => write!(f, "Child"),
            UserRole::Admin => write!(f, "Admin"),
        }
    }
}

/// The identity record cached next to the tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    pub phone_number: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(deserialize_with = "wire::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub two_factor_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Material for adding the account to an authenticator app. Two-factor
/// login is only active once a code from the app has been verified.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct TwoFactorSetup {
    /// Base32 TOTP secret
    pub secret: String,
    /// PNG data URI of the provisioning QR code
    pub qr_code: String,
    #[serde(default)]
    pub backup_codes: Vec<String>,
}

impl std::fmt::Debug for TwoFactorSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoFactorSetup")
            .field("secret", &"<redacted>")
            .field("backup_codes", &self.backup_codes.len())
            .finish()
    }
}

/// Whether `code` looks like an authenticator code: six ASCII digits.
pub fn is_valid_two_factor_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}
