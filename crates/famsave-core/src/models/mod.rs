//! Data models for the family savings service.
//!
//! - `User`, `UserRole`: account identity and registration payloads
//! - `Goal` and its create/update payloads
//! - `Transaction`, `NewTransaction`, `MpesaPaymentRequest`
//! - Analytics records: `SavingsOverview`, `GoalProgress`, `SpendingPatterns`,
//!   `FamilyComparison`

pub mod analytics;
pub mod goal;
pub mod transaction;
pub mod user;
pub mod wire;

pub use analytics::{
    CategoryBreakdown, FamilyComparison, FamilyMemberSavings, GoalProgress, MethodSummary,
    MonthlyTrend, SavingsOverview, SpendingPatterns, VelocityTrend,
};
pub use goal::{
    Goal, GoalAnalytics, GoalCategory, GoalPriority, GoalStatus, GoalUpdate, NewGoal,
    SharePermission,
};
pub use transaction::{
    is_valid_phone_number, MpesaPaymentRequest, NewTransaction, PaymentInitiated, Transaction,
    TransactionMethod, TransactionStatus, TransactionType, DEFAULT_PAYBILL_NUMBER,
};
pub use user::{
    is_valid_two_factor_code, LoginRequest, RegisterRequest, TwoFactorSetup, User, UserRole,
};
