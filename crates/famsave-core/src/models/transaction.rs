//! Deposit, withdrawal and M-Pesa payment models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wire;

/// Default business number used for M-Pesa paybill payments.
pub const DEFAULT_PAYBILL_NUMBER: &str = "522522";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Deposit => write!(f, "Deposit"),
            TransactionType::Withdrawal => write!(f, "Withdrawal"),
            TransactionType::Transfer => write!(f, "Transfer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum TransactionMethod {
    Mpesa,
    Bank,
    Cash,
    Card,
}

impl std::fmt::Display for TransactionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionMethod::Mpesa => write!(f, "M-Pesa"),
            TransactionMethod::Bank => write!(f, "Bank"),
            TransactionMethod::Cash => write!(f, "Cash"),
            TransactionMethod::Card => write!(f, "Card"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "Pending"),
            TransactionStatus::Completed => write!(f, "Completed"),
            TransactionStatus::Failed => write!(f, "Failed"),
            TransactionStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub goal_id: String,
    #[serde(deserialize_with = "wire::amount::deserialize")]
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub method: TransactionMethod,
    #[serde(default)]
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub reference_number: Option<String>,
    pub mpesa_reference: Option<String>,
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "wire::amount::deserialize")]
    pub transaction_fee: f64,
    #[serde(deserialize_with = "wire::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "wire::timestamp::deserialize_option")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Payload for `POST /transactions`.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct NewTransaction {
    pub goal_id: String,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub method: TransactionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paybill_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
}

impl NewTransaction {
    pub fn new(
        goal_id: impl Into<String>,
        amount: f64,
        transaction_type: TransactionType,
        method: TransactionMethod,
    ) -> Self {
        Self {
            goal_id: goal_id.into(),
            amount,
            transaction_type,
            method,
            description: None,
            phone_number: None,
            paybill_number: None,
            account_number: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.goal_id.trim().is_empty() {
            return Err("A goal must be selected".to_string());
        }
        if !wire::is_positive_amount(self.amount) {
            return Err("Amount must be positive".to_string());
        }
        Ok(())
    }
}

/// Payload for `POST /transactions/mpesa/payment` (STK push).
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct MpesaPaymentRequest {
    pub goal_id: String,
    pub amount: f64,
    pub phone_number: String,
    pub paybill_number: String,
    pub account_number: String,
}

impl MpesaPaymentRequest {
    pub fn new(
        goal_id: impl Into<String>,
        amount: f64,
        phone_number: impl Into<String>,
        account_number: impl Into<String>,
    ) -> Self {
        Self {
            goal_id: goal_id.into(),
            amount,
            phone_number: phone_number.into(),
            paybill_number: DEFAULT_PAYBILL_NUMBER.to_string(),
            account_number: account_number.into(),
        }
    }

    /// Phone numbers must be in international form: `254` followed by nine digits.
    pub fn validate(&self) -> Result<(), String> {
        if self.goal_id.trim().is_empty() {
            return Err("A goal must be selected".to_string());
        }
        if !wire::is_positive_amount(self.amount) {
            return Err("Amount must be positive".to_string());
        }
        if !is_valid_phone_number(&self.phone_number) {
            return Err("Invalid phone number format. Use 254XXXXXXXXX".to_string());
        }
        if self.account_number.trim().is_empty() {
            return Err("Account number is required".to_string());
        }
        Ok(())
    }
}

pub fn is_valid_phone_number(phone: &str) -> bool {
    phone.len() == 12 && phone.starts_with("254") && phone.chars().all(|c| c.is_ascii_digit())
}

/// Response to an M-Pesa payment initiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct PaymentInitiated {
    #[serde(default)]
    pub message: String,
    pub transaction_id: String,
    pub checkout_request_id: Option<String>,
}
