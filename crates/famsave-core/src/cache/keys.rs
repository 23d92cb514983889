use std::fmt;

use chrono::Duration;

/// Server resource a cached query is derived from. Mutations invalidate by
/// resource rather than by individual key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Goals,
    Transactions,
    Analytics,
}

/// One cacheable read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Goals,
    Transactions,
    SavingsOverview,
    GoalProgress,
    SpendingPatterns { period_days: u32 },
    FamilyComparison,
}

const SPENDING_PATTERNS_PREFIX: &str = "analytics_spending_patterns_";

impl QueryKey {
    /// How long a cached result is served without refetching.
    pub fn stale_after(&self) -> Duration {
        match self {
            QueryKey::Goals => Duration::minutes(5),
            QueryKey::Transactions => Duration::minutes(2),
            QueryKey::SavingsOverview => Duration::minutes(10),
            QueryKey::GoalProgress => Duration::minutes(5),
            QueryKey::SpendingPatterns { .. } => Duration::minutes(15),
            QueryKey::FamilyComparison => Duration::minutes(10),
        }
    }

    pub fn resource(&self) -> Resource {
        match self {
            QueryKey::Goals => Resource::Goals,
            QueryKey::Transactions => Resource::Transactions,
            QueryKey::SavingsOverview
            | QueryKey::GoalProgress
            | QueryKey::SpendingPatterns { .. }
            | QueryKey::FamilyComparison => Resource::Analytics,
        }
    }

    /// Stable name, also used as the cache file stem.
    pub fn name(&self) -> String {
        match self {
            QueryKey::Goals => "goals".to_string(),
            QueryKey::Transactions => "transactions".to_string(),
            QueryKey::SavingsOverview => "analytics_savings_overview".to_string(),
            QueryKey::GoalProgress => "analytics_goal_progress".to_string(),
            QueryKey::SpendingPatterns { period_days } => {
                format!("{}{}", SPENDING_PATTERNS_PREFIX, period_days)
            }
            QueryKey::FamilyComparison => "analytics_family_comparison".to_string(),
        }
    }

    pub fn parse(name: &str) -> Option<QueryKey> {
        match name {
            "goals" => Some(QueryKey::Goals),
            "transactions" => Some(QueryKey::Transactions),
            "analytics_savings_overview" => Some(QueryKey::SavingsOverview),
            "analytics_goal_progress" => Some(QueryKey::GoalProgress),
            "analytics_family_comparison" => Some(QueryKey::FamilyComparison),
            other => other
                .strip_prefix(SPENDING_PATTERNS_PREFIX)
                .and_then(|days| days.parse().ok())
                .map(|period_days| QueryKey::SpendingPatterns { period_days }),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
