//! Savings goal models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::wire;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum GoalCategory {
    Education,
    Vacation,
    Emergency,
    Toys,
    Electronics,
    Other,
}

impl GoalCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            GoalCategory::Education => "Education",
            GoalCategory::Vacation => "Vacation",
            GoalCategory::Emergency => "Emergency",
            GoalCategory::Toys => "Toys",
            GoalCategory::Electronics => "Electronics",
            GoalCategory::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum GoalPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Active,
    Completed,
    Paused,
    Cancelled,
}

impl GoalStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            GoalStatus::Active => "Active",
            GoalStatus::Completed => "Completed",
            GoalStatus::Paused => "Paused",
            GoalStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "wire::amount::deserialize")]
    pub target_amount: f64,
    #[serde(default, deserialize_with = "wire::amount::deserialize")]
    pub current_amount: f64,
    #[serde(deserialize_with = "wire::timestamp::deserialize")]
    pub target_date: DateTime<Utc>,
    pub category: GoalCategory,
    #[serde(default)]
    pub priority: GoalPriority,
    #[serde(default)]
    pub status: GoalStatus,
    #[serde(default)]
    pub progress_percentage: f64,
    #[serde(default)]
    pub days_remaining: i64,
    #[serde(deserialize_with = "wire::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "wire::timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "wire::timestamp::deserialize_option")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Goal {
    /// Amount still needed to reach the target, never negative.
    pub fn remaining_amount(&self) -> f64 {
        (self.target_amount - self.current_amount).max(0.0)
    }

    pub fn is_active(&self) -> bool {
        self.status == GoalStatus::Active
    }
}

/// Payload for `POST /goals`.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct NewGoal {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub target_amount: f64,
    pub target_date: DateTime<Utc>,
    pub category: GoalCategory,
    pub priority: GoalPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_save_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_save_frequency: Option<String>,
}

impl NewGoal {
    pub fn new(
        title: impl Into<String>,
        target_amount: f64,
        target_date: DateTime<Utc>,
        category: GoalCategory,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            target_amount,
            target_date,
            category,
            priority: GoalPriority::default(),
            auto_save_amount: None,
            auto_save_frequency: None,
        }
    }

    /// Checks the backend's own constraints before anything is sent.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        if !wire::is_positive_amount(self.target_amount) {
            return Err("Target amount must be positive".to_string());
        }
        if self.target_date <= now {
            return Err("Target date must be in the future".to_string());
        }
        Ok(())
    }
}

/// Payload for `PUT /goals/{id}`. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct GoalUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<GoalCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<GoalPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<GoalStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_save_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_save_frequency: Option<String>,
}

impl GoalUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(amount) = self.target_amount {
            if !wire::is_positive_amount(amount) {
                return Err("Target amount must be positive".to_string());
            }
        }
        Ok(())
    }
}

/// Per-goal insight record from `GET /goals/{id}/analytics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct GoalAnalytics {
    pub goal_id: String,
    pub progress_percentage: f64,
    pub days_remaining: i64,
    pub daily_required_savings: f64,
    pub monthly_average_savings: f64,
    #[serde(deserialize_with = "wire::timestamp::deserialize")]
    pub projected_completion_date: DateTime<Utc>,
    pub is_on_track: bool,
}

/// Access level granted when sharing a goal with a family member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum SharePermission {
    #[default]
    View,
    Contribute,
    Manage,
}

impl SharePermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharePermission::View => "view",
            SharePermission::Contribute => "contribute",
            SharePermission::Manage => "manage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const GOAL_JSON: &str = r#"{"id":"g-1","user_id":"u-1","title":"School fees","description":null,"target_amount":"50000.00","current_amount":"12500.00","target_date":"2025-01-10T00:00:00","category":"education","priority":"high","status":"active","progress_percentage":25.0,"days_remaining":120,"created_at":"2024-01-01T00:00:00","updated_at":"2024-02-01T00:00:00","completed_at":null}"#;

    #[test]
    fn test_parse_goal_response() {
        let goal: Goal = serde_json::from_str(GOAL_JSON).expect("Failed to parse goal test JSON");
        assert_eq!(goal.title, "School fees");
        assert_eq!(goal.target_amount, 50000.0);
        assert_eq!(goal.current_amount, 12500.0);
        assert_eq!(goal.category, GoalCategory::Education);
        assert_eq!(goal.priority, GoalPriority::High);
        assert!(goal.is_active());
        assert_eq!(goal.remaining_amount(), 37500.0);
    }

    #[test]
    fn test_new_goal_validation() {
        let now = Utc::now();
        let ok = NewGoal::new("Bike", 8000.0, now + Duration::days(30), GoalCategory::Toys);
        assert!(ok.validate(now).is_ok());

        let zero = NewGoal::new("Bike", 0.0, now + Duration::days(30), GoalCategory::Toys);
        assert!(zero.validate(now).is_err());

        let infinite = NewGoal::new("Bike", f64::INFINITY, now + Duration::days(30), GoalCategory::Toys);
        assert!(infinite.validate(now).is_err());

        let past = NewGoal::new("Bike", 10.0, now - Duration::days(1), GoalCategory::Toys);
        assert!(past.validate(now).is_err());

        let untitled = NewGoal::new("  ", 10.0, now + Duration::days(1), GoalCategory::Toys);
        assert!(untitled.validate(now).is_err());
    }

    #[test]
    fn test_goal_update_rejects_non_finite_target() {
        let update = GoalUpdate {
            target_amount: Some(f64::INFINITY),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        assert!(GoalUpdate::default().validate().is_ok());
    }

    #[test]
    fn test_goal_update_sends_only_set_fields() {
        let update = GoalUpdate {
            status: Some(GoalStatus::Paused),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"status": "paused"}));
    }
}
