//! Plain-text rendering for command results.

use anyhow::Result;
use serde::Serialize;

use famsave_core::aggregates::SavingsSummary;
use famsave_core::auth::{AuthState, SignOutReason};
use famsave_core::models::{
    FamilyComparison, Goal, GoalProgress, PaymentInitiated, SavingsOverview, SpendingPatterns,
    Transaction, TwoFactorSetup, User,
};
use famsave_core::utils::{format_amount, format_date, format_percent, format_phone, truncate_string};

/// Widest goal title shown in tables
const TITLE_WIDTH: usize = 24;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_registered(user: &User, json: bool) -> Result<()> {
    if json {
        return print_json(user);
    }
    println!("Registered {} <{}> as {}", user.name, user.email, user.role);
    println!("Run `famsave login` to sign in.");
    Ok(())
}

pub fn print_payment(initiated: &PaymentInitiated, json: bool) -> Result<()> {
    if json {
        return print_json(initiated);
    }
    println!("{}", initiated.message);
    println!("Transaction {} is pending until the payment completes.", initiated.transaction_id);
    Ok(())
}

pub fn print_two_factor_setup(setup: &TwoFactorSetup, json: bool) -> Result<()> {
    if json {
        return print_json(setup);
    }
    println!("Add this secret to your authenticator app:");
    println!();
    println!("    {}", setup.secret);
    println!();
    if !setup.backup_codes.is_empty() {
        println!("Backup codes (store them somewhere safe):");
        for code in &setup.backup_codes {
            println!("    {}", code);
        }
        println!();
    }
    println!("Then run `famsave 2fa verify <code>` to turn it on.");
    Ok(())
}

pub fn print_status(
    api_url: &str,
    state: &AuthState,
    user: Option<&User>,
    cache_ages: &[(String, Option<String>)],
) {
    println!("API:     {}", api_url);
    match state {
        AuthState::SignedIn { .. } => match user {
            Some(user) => println!("Session: signed in as {} <{}>", user.name, user.email),
            None => println!("Session: signed in"),
        },
        AuthState::SignedOut { reason } => {
            let why = match reason {
                SignOutReason::NeverSignedIn => "not logged in",
                SignOutReason::LoggedOut => "logged out",
                SignOutReason::Expired => "expired, log in again",
            };
            println!("Session: {}", why);
        }
    }

    println!();
    println!("Cache:");
    for (name, age) in cache_ages {
        println!("  {:<28} {}", name, age.as_deref().unwrap_or("empty"));
    }
}

pub fn print_summary(summary: &SavingsSummary) {
    println!(
        "Saved {} of {} ({})",
        format_amount(summary.total_saved),
        format_amount(summary.total_target),
        format_percent(summary.overall_progress)
    );
    println!(
        "{} active goals, {} completed",
        summary.active_goals, summary.completed_goals
    );
}

pub fn print_goals(goals: &[&Goal]) {
    if goals.is_empty() {
        println!("No goals");
        return;
    }
    println!(
        "{:<38} {:<width$} {:>16} {:>16} {:>7} {:<10} {:<12}",
        "ID",
        "TITLE",
        "SAVED",
        "TARGET",
        "DONE",
        "STATUS",
        "DUE",
        width = TITLE_WIDTH
    );
    for goal in goals {
        println!(
            "{:<38} {:<width$} {:>16} {:>16} {:>7} {:<10} {:<12}",
            goal.id,
            truncate_string(&goal.title, TITLE_WIDTH),
            format_amount(goal.current_amount),
            format_amount(goal.target_amount),
            format_percent(goal.progress_percentage),
            goal.status.display_name(),
            format_date(&goal.target_date),
            width = TITLE_WIDTH
        );
    }
}

pub fn print_goal_detail(goal: &Goal, progress: &GoalProgress) {
    println!("{} ({})", goal.title, goal.category.display_name());
    if let Some(ref description) = goal.description {
        println!("{}", description);
    }
    println!();
    println!(
        "Saved:      {} of {} ({})",
        format_amount(goal.current_amount),
        format_amount(goal.target_amount),
        format_percent(progress.progress_percentage)
    );
    println!("Status:     {}", goal.status.display_name());
    println!(
        "Due:        {} ({} days left)",
        format_date(&goal.target_date),
        progress.days_remaining.max(0)
    );
    println!(
        "Pace:       {} per day needed, {} per day lately",
        format_amount(progress.daily_required_savings),
        format_amount(progress.daily_average_savings)
    );
    println!(
        "Forecast:   {} ({})",
        format_date(&progress.predicted_completion_date),
        if progress.is_on_track { "on track" } else { "behind" }
    );
}

pub fn print_transactions(transactions: &[&Transaction]) {
    if transactions.is_empty() {
        println!("No transactions");
        return;
    }
    println!(
        "{:<12} {:<10} {:>16} {:<8} {:<10} {:<18}",
        "DATE", "TYPE", "AMOUNT", "METHOD", "STATUS", "PHONE"
    );
    for t in transactions {
        println!(
            "{:<12} {:<10} {:>16} {:<8} {:<10} {:<18}",
            format_date(&t.created_at),
            t.transaction_type.to_string(),
            format_amount(t.amount),
            t.method.to_string(),
            t.status.to_string(),
            t.phone_number.as_deref().map(format_phone).unwrap_or_default()
        );
    }
}

pub fn print_overview(overview: &SavingsOverview) {
    println!(
        "Saved {} of {} ({})",
        format_amount(overview.total_savings),
        format_amount(overview.total_target),
        format_percent(overview.overall_progress)
    );
    println!(
        "{} active goals, {} completed, saving {} per month",
        overview.active_goals,
        overview.completed_goals,
        format_amount(overview.monthly_savings_rate)
    );

    if !overview.monthly_trends.is_empty() {
        println!();
        println!("Monthly deposits:");
        for trend in &overview.monthly_trends {
            println!("  {}  {:>16}", trend.month, format_amount(trend.amount));
        }
    }

    if !overview.category_breakdown.is_empty() {
        println!();
        println!("By category:");
        for category in &overview.category_breakdown {
            println!(
                "  {:<12} {:>16} of {:>16} ({})",
                category.category,
                format_amount(category.current_amount),
                format_amount(category.target_amount),
                format_percent(category.percentage)
            );
        }
    }
}

pub fn print_progress(progress: &[GoalProgress]) {
    if progress.is_empty() {
        println!("No goals");
        return;
    }
    println!(
        "{:<width$} {:>7} {:>16} {:>16} {:<9}",
        "GOAL",
        "DONE",
        "NEED/DAY",
        "AVG/DAY",
        "PACE",
        width = TITLE_WIDTH
    );
    for p in progress {
        println!(
            "{:<width$} {:>7} {:>16} {:>16} {:<9}",
            truncate_string(&p.goal_title, TITLE_WIDTH),
            format_percent(p.progress_percentage),
            format_amount(p.daily_required_savings),
            format_amount(p.daily_average_savings),
            if p.is_on_track { "on track" } else { "behind" },
            width = TITLE_WIDTH
        );
    }
}

pub fn print_spending(patterns: &SpendingPatterns) {
    println!("Last {} days", patterns.period_days);
    println!("  Deposits:     {}", format_amount(patterns.total_deposits));
    println!("  Withdrawals:  {}", format_amount(patterns.total_withdrawals));
    println!("  Net savings:  {}", format_amount(patterns.net_savings));
    println!(
        "  {} transactions, {} on average",
        patterns.transaction_count,
        format_amount(patterns.average_transaction_size)
    );
    println!("  Best day:     {}", patterns.peak_saving_day_name());

    if !patterns.method_breakdown.is_empty() {
        println!();
        println!("By method:");
        for (method, summary) in &patterns.method_breakdown {
            println!(
                "  {:<8} {:>4} x {:>16}",
                method,
                summary.count,
                format_amount(summary.total)
            );
        }
    }
}

pub fn print_family(comparison: &FamilyComparison) {
    if comparison.family_comparison.is_empty() {
        println!("No family members");
        return;
    }
    for member in &comparison.family_comparison {
        println!(
            "{:<24} {:>16}  {} active goals",
            member.name,
            format_amount(member.total_savings),
            member.active_goals
        );
    }
}
