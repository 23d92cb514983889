//! famsave - command line client for the family savings service.
//!
//! Manage savings goals, record deposits and withdrawals, start M-Pesa
//! payments and read household analytics from the terminal.

mod commands;
mod output;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use famsave_core::auth::{AuthState, SignOutReason};
use famsave_core::models::{
    GoalCategory, GoalPriority, GoalStatus, SharePermission, TransactionMethod,
    TransactionStatus, TransactionType, UserRole,
};
use famsave_core::{ApiClient, Config, QueryCache, Resources, Session};

use commands::App;

// ============================================================================
// Constants
// ============================================================================

/// Log file prefix inside `--log-dir`; a date suffix is appended daily
const LOG_FILE_PREFIX: &str = "famsave.log";

/// Family savings from the command line.
#[derive(Parser)]
#[command(name = "famsave")]
#[command(about = "Track family savings goals, deposits and M-Pesa payments")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL (overrides config and FAMSAVE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Ignore the on-disk cache for this run
    #[arg(long, global = true)]
    no_cache: bool,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long, global = true, env = "FAMSAVE_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        /// Account email (defaults to the last one used)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Log out and clear stored credentials
    Logout,

    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "parent", value_parser = parse_wire_enum::<UserRole>)]
        role: UserRole,
        /// M-Pesa number, 2547XXXXXXXX
        #[arg(long)]
        phone: Option<String>,
    },

    /// Show who is logged in and how old the cached data is
    Status,

    /// Two-factor authentication setup
    #[command(name = "2fa")]
    TwoFactor {
        #[command(subcommand)]
        command: TwoFactorCommands,
    },

    /// Goals, totals and recent activity at a glance
    Dashboard {
        /// Refetch everything
        #[arg(short, long)]
        refresh: bool,
    },

    /// Manage savings goals
    Goals {
        #[command(subcommand)]
        command: GoalCommands,
    },

    /// Record and list transactions
    Transactions {
        #[command(subcommand)]
        command: TransactionCommands,
    },

    /// Start an M-Pesa STK push towards a goal
    Pay {
        /// Goal ID
        #[arg(long)]
        goal: String,
        #[arg(long)]
        amount: f64,
        /// Paying phone number, 2547XXXXXXXX
        #[arg(long)]
        phone: String,
        /// Paybill account number (defaults to the goal ID)
        #[arg(long)]
        account: Option<String>,
    },

    /// Savings analytics
    Analytics {
        #[command(subcommand)]
        command: AnalyticsCommands,

        /// Refetch instead of using cached results
        #[arg(short, long, global = true)]
        refresh: bool,
    },
}

#[derive(Subcommand)]
enum TwoFactorCommands {
    /// Get a secret for your authenticator app
    Enable,
    /// Turn 2FA on with a code from the app
    Verify {
        /// Six digit code
        code: String,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// List goals
    List {
        #[arg(long, value_parser = parse_wire_enum::<GoalStatus>)]
        status: Option<GoalStatus>,
        #[arg(long, value_parser = parse_wire_enum::<GoalCategory>)]
        category: Option<GoalCategory>,
        #[arg(short, long)]
        refresh: bool,
    },
    /// Show one goal with its progress
    Show {
        /// Goal ID
        id: String,
    },
    /// Create a goal
    Create {
        #[arg(long)]
        title: String,
        /// Target amount in KES
        #[arg(long)]
        target: f64,
        /// Target date, YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        date: DateTime<Utc>,
        #[arg(long, value_parser = parse_wire_enum::<GoalCategory>)]
        category: GoalCategory,
        #[arg(long, value_parser = parse_wire_enum::<GoalPriority>)]
        priority: Option<GoalPriority>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change fields of a goal
    Update {
        /// Goal ID
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        target: Option<f64>,
        #[arg(long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_wire_enum::<GoalStatus>)]
        status: Option<GoalStatus>,
        #[arg(long, value_parser = parse_wire_enum::<GoalPriority>)]
        priority: Option<GoalPriority>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a goal
    Delete {
        /// Goal ID
        id: String,
    },
    /// Share a goal with another family member
    Share {
        /// Goal ID
        id: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "view", value_parser = parse_wire_enum::<SharePermission>)]
        permission: SharePermission,
    },
}

#[derive(Subcommand)]
enum TransactionCommands {
    /// List transactions, newest first
    List {
        #[arg(long, value_parser = parse_wire_enum::<TransactionStatus>)]
        status: Option<TransactionStatus>,
        /// Only transactions for this goal
        #[arg(long)]
        goal: Option<String>,
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        #[arg(short, long)]
        refresh: bool,
    },
    /// Show one transaction
    Show {
        /// Transaction ID
        id: String,
    },
    /// Record a deposit, withdrawal or transfer
    Add {
        /// Goal ID
        #[arg(long)]
        goal: String,
        #[arg(long)]
        amount: f64,
        #[arg(long = "type", default_value = "deposit", value_parser = parse_wire_enum::<TransactionType>)]
        transaction_type: TransactionType,
        #[arg(long, default_value = "cash", value_parser = parse_wire_enum::<TransactionMethod>)]
        method: TransactionMethod,
        #[arg(long)]
        description: Option<String>,
        /// Required for M-Pesa transactions
        #[arg(long)]
        phone: Option<String>,
    },
}

#[derive(Subcommand)]
enum AnalyticsCommands {
    /// Totals, monthly trend and category breakdown
    Overview,
    /// Per-goal progress and pace
    Progress,
    /// Deposits and withdrawals over a period
    Spending {
        /// Look-back window in days (1-365)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Savings per family member
    Family,
}

/// Parse a lowercase wire name (`"toys"`, `"mpesa"`) into a model enum.
fn parse_wire_enum<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
        .map_err(|_| format!("unrecognized value '{}'", s))
}

fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| format!("expected YYYY-MM-DD, got '{}'", s))
}

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=famsave_core=debug).
/// The returned guard flushes the log file and must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref())?;
    info!(version = env!("CARGO_PKG_VERSION"), "famsave starting");

    let config = Config::load().context("Failed to load config")?;
    let api_url = cli
        .api_url
        .clone()
        .unwrap_or_else(|| config.api_base_url().to_string());

    let store = config.token_store()?;
    let session =
        Arc::new(Session::init(store).context("Failed to read stored credentials")?);
    let client = ApiClient::with_timeout(&api_url, session.clone(), config.request_timeout())
        .context("Failed to build HTTP client")?;

    let cache = if cli.no_cache {
        QueryCache::in_memory()
    } else {
        QueryCache::persistent(config.cache_dir()?).context("Failed to open cache")?
    };

    let mut auth_changes = session.subscribe();
    let mut app = App {
        resources: Resources::new(client, Arc::new(cache)),
        config,
        json: cli.json,
    };

    let result = commands::run(&mut app, cli.command).await;

    if auth_changes.has_changed().unwrap_or(false) {
        let expired = matches!(
            *auth_changes.borrow_and_update(),
            AuthState::SignedOut {
                reason: SignOutReason::Expired
            }
        );
        if expired {
            // The refresh token was rejected; cached data belongs to that session
            app.resources.cache().clear();
            eprintln!("Your session has expired. Run `famsave login` to sign in again.");
        }
    }

    result
}
