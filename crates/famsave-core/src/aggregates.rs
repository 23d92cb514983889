//! Derived views over cached goal and transaction lists.
//!
//! Everything here is a pure function of its inputs: no network access, no
//! cache access, no hidden state. Time-dependent views take `now` explicitly.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{
    Goal, GoalCategory, GoalProgress, GoalStatus, Transaction, TransactionMethod,
    TransactionStatus, TransactionType, VelocityTrend,
};

/// Look-back window for the per-goal savings velocity.
const VELOCITY_WINDOW_DAYS: i64 = 30;

// ============================================================================
// Transactions
// ============================================================================

/// Conjunctive transaction filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub method: Option<TransactionMethod>,
    pub goal_id: Option<String>,
}

impl TransactionFilter {
    pub fn completed(transaction_type: TransactionType) -> Self {
        Self {
            transaction_type: Some(transaction_type),
            status: Some(TransactionStatus::Completed),
            ..Default::default()
        }
    }

    pub fn with_goal(mut self, goal_id: impl Into<String>) -> Self {
        self.goal_id = Some(goal_id.into());
        self
    }

    pub fn with_method(mut self, method: TransactionMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.transaction_type
            .map_or(true, |t| transaction.transaction_type == t)
            && self.status.map_or(true, |s| transaction.status == s)
            && self.method.map_or(true, |m| transaction.method == m)
            && self
                .goal_id
                .as_deref()
                .map_or(true, |g| transaction.goal_id == g)
    }

    /// Sum of `amount` over matching transactions.
    pub fn total(&self, transactions: &[Transaction]) -> f64 {
        transactions
            .iter()
            .filter(|t| self.matches(t))
            .map(|t| t.amount)
            .sum()
    }
}

/// Completed deposits only; pending and failed money never arrived.
pub fn total_deposits(transactions: &[Transaction]) -> f64 {
    TransactionFilter::completed(TransactionType::Deposit).total(transactions)
}

pub fn total_withdrawals(transactions: &[Transaction]) -> f64 {
    TransactionFilter::completed(TransactionType::Withdrawal).total(transactions)
}

/// Amount totals keyed by (type, status). Combinations with no
/// transactions are absent.
pub fn totals_by_type_and_status(
    transactions: &[Transaction],
) -> BTreeMap<(TransactionType, TransactionStatus), f64> {
    let mut totals = BTreeMap::new();
    for t in transactions {
        *totals.entry((t.transaction_type, t.status)).or_insert(0.0) += t.amount;
    }
    totals
}

/// The `n` most recent transactions, newest first. Equal timestamps are
/// ordered by id so the result is stable.
pub fn recent_transactions(transactions: &[Transaction], n: usize) -> Vec<&Transaction> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    sorted.truncate(n);
    sorted
}

pub fn transactions_with_status(
    transactions: &[Transaction],
    status: TransactionStatus,
) -> Vec<&Transaction> {
    transactions.iter().filter(|t| t.status == status).collect()
}

// ============================================================================
// Goals
// ============================================================================

pub fn find_goal<'a>(goals: &'a [Goal], goal_id: &str) -> Option<&'a Goal> {
    goals.iter().find(|g| g.id == goal_id)
}

pub fn goals_with_status(goals: &[Goal], status: GoalStatus) -> Vec<&Goal> {
    goals.iter().filter(|g| g.status == status).collect()
}

pub fn goals_in_category(goals: &[Goal], category: GoalCategory) -> Vec<&Goal> {
    goals.iter().filter(|g| g.category == category).collect()
}

/// Totals across all goals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsSummary {
    pub total_saved: f64,
    pub total_target: f64,
    /// Percent of the combined target saved; 0 when there is no target.
    pub overall_progress: f64,
    pub active_goals: usize,
    pub completed_goals: usize,
}

pub fn savings_summary(goals: &[Goal]) -> SavingsSummary {
    let total_saved: f64 = goals.iter().map(|g| g.current_amount).sum();
    let total_target: f64 = goals.iter().map(|g| g.target_amount).sum();
    let overall_progress = if total_target > 0.0 {
        total_saved / total_target * 100.0
    } else {
        0.0
    };

    SavingsSummary {
        total_saved,
        total_target,
        overall_progress,
        active_goals: goals_with_status(goals, GoalStatus::Active).len(),
        completed_goals: goals_with_status(goals, GoalStatus::Completed).len(),
    }
}

/// Progress of one goal as of `now`, computed from its recent deposits.
///
/// Uses the same formulas as the server's goal-progress analytics, so it can
/// stand in for them when only the cached lists are at hand.
pub fn goal_progress(goal: &Goal, transactions: &[Transaction], now: DateTime<Utc>) -> GoalProgress {
    let days_remaining = (goal.target_date - now).num_days();
    let remaining = goal.remaining_amount();

    let daily_required = if days_remaining > 0 {
        remaining / days_remaining as f64
    } else {
        0.0
    };

    let window_start = now - Duration::days(VELOCITY_WINDOW_DAYS);
    let deposits = TransactionFilter::completed(TransactionType::Deposit).with_goal(goal.id.as_str());
    let recent_deposits: f64 = transactions
        .iter()
        .filter(|t| t.created_at >= window_start && deposits.matches(t))
        .map(|t| t.amount)
        .sum();
    let daily_average = recent_deposits / VELOCITY_WINDOW_DAYS as f64;

    let predicted_completion_date = if daily_average > 0.0 {
        let days_to_complete = (remaining / daily_average).ceil() as i64;
        now + Duration::days(days_to_complete)
    } else {
        goal.target_date
    };

    let progress_percentage = if goal.target_amount > 0.0 {
        (goal.current_amount / goal.target_amount * 100.0).min(100.0)
    } else {
        0.0
    };

    GoalProgress {
        goal_id: goal.id.clone(),
        goal_title: goal.title.clone(),
        current_amount: goal.current_amount,
        target_amount: goal.target_amount,
        progress_percentage,
        days_remaining,
        daily_required_savings: daily_required,
        daily_average_savings: daily_average,
        predicted_completion_date,
        is_on_track: if daily_required > 0.0 {
            daily_average >= daily_required
        } else {
            true
        },
        velocity_trend: if daily_average > daily_required {
            VelocityTrend::Increasing
        } else {
            VelocityTrend::Decreasing
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
