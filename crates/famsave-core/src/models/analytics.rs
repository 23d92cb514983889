//! Read-only analytics records served under `/analytics`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wire;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct MonthlyTrend {
    pub month: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct CategoryBreakdown {
    pub category: String,
    pub current_amount: f64,
    pub target_amount: f64,
    pub percentage: f64,
}

/// `GET /analytics/savings-overview`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct SavingsOverview {
    pub total_savings: f64,
    pub total_target: f64,
    pub overall_progress: f64,
    pub active_goals: u32,
    pub completed_goals: u32,
    pub monthly_savings_rate: f64,
    #[serde(default)]
    pub monthly_trends: Vec<MonthlyTrend>,
    #[serde(default)]
    pub category_breakdown: Vec<CategoryBreakdown>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum VelocityTrend {
    Increasing,
    Decreasing,
}

/// One entry of `GET /analytics/goal-progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct GoalProgress {
    pub goal_id: String,
    pub goal_title: String,
    pub current_amount: f64,
    pub target_amount: f64,
    pub progress_percentage: f64,
    pub days_remaining: i64,
    pub daily_required_savings: f64,
    pub daily_average_savings: f64,
    #[serde(deserialize_with = "wire::timestamp::deserialize")]
    pub predicted_completion_date: DateTime<Utc>,
    pub is_on_track: bool,
    pub velocity_trend: VelocityTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct MethodSummary {
    pub count: u64,
    pub total: f64,
}

/// `GET /analytics/spending-patterns?period_days=N`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct SpendingPatterns {
    pub period_days: u32,
    pub total_deposits: f64,
    pub total_withdrawals: f64,
    pub net_savings: f64,
    pub average_transaction_size: f64,
    pub transaction_count: u64,
    #[serde(default)]
    pub method_breakdown: BTreeMap<String, MethodSummary>,
    /// Day of week with the highest saved total, 0 = Sunday.
    #[serde(default)]
    pub peak_saving_day: u8,
}

impl SpendingPatterns {
    pub fn peak_saving_day_name(&self) -> &'static str {
        match self.peak_saving_day {
            0 => "Sunday",
            1 => "Monday",
            2 => "Tuesday",
            3 => "Wednesday",
            4 => "Thursday",
            5 => "Friday",
            6 => "Saturday",
            _ => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct FamilyMemberSavings {
    pub user_id: String,
    pub name: String,
    pub total_savings: f64,
    pub active_goals: u32,
}

/// `GET /analytics/family-comparison`, sorted by total savings, highest first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct FamilyComparison {
    #[serde(default)]
    pub family_comparison: Vec<FamilyMemberSavings>,
}
