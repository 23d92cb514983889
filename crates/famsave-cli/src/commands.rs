//! Command handlers. Each one talks to the core library and hands the
//! result to [`crate::output`].

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{debug, warn};

use famsave_core::aggregates::{self, TransactionFilter};
use famsave_core::api::ApiError;
use famsave_core::cache::QueryKey;
use famsave_core::models::{
    GoalUpdate, MpesaPaymentRequest, NewGoal, NewTransaction, RegisterRequest,
};
use famsave_core::{Config, Resources};

use crate::output;
use crate::{AnalyticsCommands, Commands, GoalCommands, TransactionCommands, TwoFactorCommands};

/// Rows shown by the dashboard's recent activity list
const DASHBOARD_RECENT_COUNT: usize = 5;

pub struct App {
    pub resources: Resources,
    pub config: Config,
    pub json: bool,
}

pub async fn run(app: &mut App, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email } => login(app, email).await,
        Commands::Logout => logout(app).await,
        Commands::Register {
            name,
            email,
            role,
            phone,
        } => {
            let password = prompt_password()?;
            let request = RegisterRequest {
                name,
                email,
                password,
                role,
                phone_number: phone,
            };
            let user = app
                .resources
                .client()
                .register(&request)
                .await
                .context("Registration failed")?;
            output::print_registered(&user, app.json)
        }
        Commands::Status => status(app),
        Commands::TwoFactor { command } => two_factor(app, command).await,
        Commands::Dashboard { refresh } => dashboard(app, refresh).await,
        Commands::Goals { command } => goals(app, command).await,
        Commands::Transactions { command } => transactions(app, command).await,
        Commands::Pay {
            goal,
            amount,
            phone,
            account,
        } => {
            let account = account.unwrap_or_else(|| goal.clone());
            let request = MpesaPaymentRequest::new(goal, amount, phone, account);
            let initiated = app
                .resources
                .transactions
                .initiate_mpesa_payment(&request)
                .await
                .context("Could not start M-Pesa payment")?;
            output::print_payment(&initiated, app.json)
        }
        Commands::Analytics { command, refresh } => analytics(app, command, refresh).await,
    }
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}

async fn login(app: &mut App, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| app.config.last_email.clone()) {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    if email.is_empty() {
        bail!("Email is required");
    }
    let password = prompt_password()?;

    let client = app.resources.client();
    match client.login(&email, &password, None).await {
        Ok(_) => {}
        Err(ApiError::TwoFactorRequired) => {
            let code = prompt_line("Two-factor code: ")?;
            client
                .login(&email, &password, Some(&code))
                .await
                .context("Login failed")?;
        }
        Err(e) => return Err(e).context("Login failed"),
    }

    // Another account's data may be cached
    app.resources.cache().clear();

    app.config.last_email = Some(email.clone());
    if let Err(e) = app.config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Logged in as {}", email);
    Ok(())
}

async fn logout(app: &App) -> Result<()> {
    app.resources.logout().await.context("Logout failed")?;
    println!("Logged out");
    Ok(())
}

async fn two_factor(app: &App, command: TwoFactorCommands) -> Result<()> {
    let client = app.resources.client();
    match command {
        TwoFactorCommands::Enable => {
            let setup = client
                .enable_two_factor()
                .await
                .context("Could not start two-factor setup")?;
            output::print_two_factor_setup(&setup, app.json)
        }
        TwoFactorCommands::Verify { code } => {
            client
                .verify_two_factor(&code)
                .await
                .context("Two-factor verification failed")?;
            println!("Two-factor authentication is on. Logins will ask for a code.");
            Ok(())
        }
    }
}

fn status(app: &App) -> Result<()> {
    let session = app.resources.client().session();
    let cache = app.resources.cache();
    let ages: Vec<(String, Option<String>)> = [
        QueryKey::Goals,
        QueryKey::Transactions,
        QueryKey::SavingsOverview,
        QueryKey::GoalProgress,
        QueryKey::FamilyComparison,
    ]
    .iter()
    .map(|key| (key.name(), cache.age_display(key)))
    .collect();

    output::print_status(
        app.resources.client().base_url(),
        &session.state(),
        session.user().ok().flatten().as_ref(),
        &ages,
    );
    Ok(())
}

async fn dashboard(app: &App, refresh: bool) -> Result<()> {
    let data = app
        .resources
        .dashboard(refresh)
        .await
        .context("Failed to load dashboard")?;

    if app.json {
        return output::print_json(&serde_json::json!({
            "overview": data.overview,
            "summary": aggregates::savings_summary(&data.goals),
            "total_deposits": aggregates::total_deposits(&data.transactions),
            "total_withdrawals": aggregates::total_withdrawals(&data.transactions),
            "recent": aggregates::recent_transactions(&data.transactions, DASHBOARD_RECENT_COUNT),
        }));
    }

    output::print_summary(&aggregates::savings_summary(&data.goals));
    println!(
        "Deposited {}   Withdrawn {}",
        famsave_core::utils::format_amount(aggregates::total_deposits(&data.transactions)),
        famsave_core::utils::format_amount(aggregates::total_withdrawals(&data.transactions)),
    );
    println!();
    let active: Vec<_> = data.goals.iter().filter(|g| g.is_active()).collect();
    output::print_goals(&active);
    println!();
    output::print_transactions(&aggregates::recent_transactions(
        &data.transactions,
        DASHBOARD_RECENT_COUNT,
    ));
    Ok(())
}

async fn goals(app: &App, command: GoalCommands) -> Result<()> {
    let goals = &app.resources.goals;
    match command {
        GoalCommands::List {
            status,
            category,
            refresh,
        } => {
            let all = goals.list(refresh).await.context("Failed to load goals")?;
            let shown: Vec<_> = all
                .iter()
                .filter(|g| status.map_or(true, |s| g.status == s))
                .filter(|g| category.map_or(true, |c| g.category == c))
                .collect();
            if app.json {
                return output::print_json(&shown);
            }
            output::print_goals(&shown);
            Ok(())
        }
        GoalCommands::Show { id } => {
            let goal = goals.get(&id).await.context("Failed to load goal")?;
            let transactions = app
                .resources
                .transactions
                .list(false)
                .await
                .context("Failed to load transactions")?;
            let progress = aggregates::goal_progress(&goal, &transactions, Utc::now());
            let for_goal = TransactionFilter::default().with_goal(id.as_str());
            let goal_transactions: Vec<_> = transactions
                .iter()
                .filter(|t| for_goal.matches(t))
                .cloned()
                .collect();
            let recent = aggregates::recent_transactions(&goal_transactions, DASHBOARD_RECENT_COUNT);
            if app.json {
                return output::print_json(&serde_json::json!({
                    "goal": goal,
                    "progress": progress,
                    "recent": recent,
                }));
            }
            output::print_goal_detail(&goal, &progress);
            println!();
            output::print_transactions(&recent);
            Ok(())
        }
        GoalCommands::Create {
            title,
            target,
            date,
            category,
            priority,
            description,
        } => {
            let mut goal = NewGoal::new(title, target, date, category);
            goal.description = description;
            if let Some(priority) = priority {
                goal.priority = priority;
            }
            let created = goals.create(&goal).await.context("Failed to create goal")?;
            debug!(goal_id = %created.id, "Created goal");
            if app.json {
                return output::print_json(&created);
            }
            println!("Created goal {} ({})", created.title, created.id);
            Ok(())
        }
        GoalCommands::Update {
            id,
            title,
            target,
            date,
            status,
            priority,
            description,
        } => {
            let update = GoalUpdate {
                title,
                description,
                target_amount: target,
                target_date: date,
                status,
                priority,
                ..Default::default()
            };
            let updated = goals
                .update(&id, &update)
                .await
                .context("Failed to update goal")?;
            if app.json {
                return output::print_json(&updated);
            }
            println!("Updated goal {}", updated.title);
            Ok(())
        }
        GoalCommands::Delete { id } => {
            goals.delete(&id).await.context("Failed to delete goal")?;
            println!("Deleted goal {}", id);
            Ok(())
        }
        GoalCommands::Share {
            id,
            email,
            permission,
        } => {
            goals
                .share(&id, &email, permission)
                .await
                .context("Failed to share goal")?;
            println!("Shared goal {} with {} ({})", id, email, permission.as_str());
            Ok(())
        }
    }
}

async fn transactions(app: &App, command: TransactionCommands) -> Result<()> {
    let transactions = &app.resources.transactions;
    match command {
        TransactionCommands::List {
            status,
            goal,
            limit,
            refresh,
        } => {
            let all = transactions
                .list(refresh)
                .await
                .context("Failed to load transactions")?;
            let filter = TransactionFilter {
                status,
                goal_id: goal,
                ..Default::default()
            };
            let matching: Vec<_> = all.into_iter().filter(|t| filter.matches(t)).collect();
            let shown = aggregates::recent_transactions(&matching, limit);
            if app.json {
                return output::print_json(&shown);
            }
            output::print_transactions(&shown);
            println!();
            println!(
                "{} shown, total {}",
                shown.len(),
                famsave_core::utils::format_amount(filter.total(&matching))
            );
            Ok(())
        }
        TransactionCommands::Show { id } => {
            let transaction = transactions
                .get(&id)
                .await
                .context("Failed to load transaction")?;
            if app.json {
                return output::print_json(&transaction);
            }
            output::print_transactions(&[&transaction]);
            Ok(())
        }
        TransactionCommands::Add {
            goal,
            amount,
            transaction_type,
            method,
            description,
            phone,
        } => {
            let mut request = NewTransaction::new(goal, amount, transaction_type, method);
            request.description = description;
            request.phone_number = phone;
            let created = transactions
                .create(&request)
                .await
                .context("Failed to record transaction")?;
            if app.json {
                return output::print_json(&created);
            }
            println!(
                "Recorded {} of {} ({})",
                created.transaction_type,
                famsave_core::utils::format_amount(created.amount),
                created.status
            );
            Ok(())
        }
    }
}

async fn analytics(app: &App, command: AnalyticsCommands, refresh: bool) -> Result<()> {
    let analytics = &app.resources.analytics;
    match command {
        AnalyticsCommands::Overview => {
            let overview = analytics
                .savings_overview(refresh)
                .await
                .context("Failed to load savings overview")?;
            if app.json {
                return output::print_json(&overview);
            }
            output::print_overview(&overview);
        }
        AnalyticsCommands::Progress => {
            let progress = analytics
                .goal_progress(refresh)
                .await
                .context("Failed to load goal progress")?;
            if app.json {
                return output::print_json(&progress);
            }
            output::print_progress(&progress);
        }
        AnalyticsCommands::Spending { days } => {
            let patterns = analytics
                .spending_patterns(days, refresh)
                .await
                .context("Failed to load spending patterns")?;
            if app.json {
                return output::print_json(&patterns);
            }
            output::print_spending(&patterns);
        }
        AnalyticsCommands::Family => {
            let comparison = analytics
                .family_comparison(refresh)
                .await
                .context("Failed to load family comparison")?;
            if app.json {
                return output::print_json(&comparison);
            }
            output::print_family(&comparison);
        }
    }
    Ok(())
}
