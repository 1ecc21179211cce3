//! Quantofy CLI - Operator tools for the storefront data directory.
//!
//! # Usage
//!
//! ```bash
//! # Create the default admin account
//! qf-cli admin bootstrap --password 'a-strong-password'
//!
//! # Store-wide figures
//! qf-cli admin stats
//!
//! # Export everything to quantofy_all_<date>.json
//! qf-cli export all
//!
//! # Look up a gateway charge
//! qf-cli payments get pay_123
//!
//! # Re-apply a saved webhook delivery
//! qf-cli webhook replay notification.json --token "$ASAAS_WEBHOOK_TOKEN"
//! ```
//!
//! # Commands
//!
//! - `admin` - Bootstrap the admin account, reports, purchase status
//! - `export` - Export users, purchases or stats as JSON
//! - `clear-data` - Delete all accounts, products and purchases
//! - `payments` - Charges and payment links on the gateway
//! - `webhook replay` - Apply a saved notification
//! - `catalog` - List products
//!
//! Configuration is read from the environment (see
//! `quantofy_storefront::config`). Only `payments` requires `ASAAS_API_KEY`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quantofy_core::BillingType;
use quantofy_storefront::asaas::types::PaymentFilters;
use quantofy_storefront::services::admin::ExportKind;
use quantofy_storefront::{AppState, StorefrontConfig};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CommandError;

#[derive(Parser)]
#[command(name = "qf-cli")]
#[command(author, version, about = "Quantofy CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage accounts and purchases
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Export data as JSON
    Export {
        /// What to export (`users`, `purchases`, `stats`, `all`)
        #[arg(default_value = "all")]
        kind: ExportKind,

        /// Output file (defaults to `quantofy_<kind>_<date>.json`)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Delete every account, the saved product list and all purchases
    ClearData {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Query the payment gateway
    Payments {
        #[command(subcommand)]
        action: PaymentsAction,
    },
    /// Payment notifications
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },
    /// List catalog products
    Catalog {
        /// Free-text filter over title, description, category and technologies
        #[arg(short, long)]
        search: Option<String>,

        /// Only this category
        #[arg(short, long)]
        category: Option<String>,
    },
}

impl Commands {
    /// Whether the command calls the payment gateway and so needs an API key.
    const fn needs_gateway(&self) -> bool {
        matches!(self, Self::Payments { .. })
    }
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create the default admin account if no admin exists
    Bootstrap {
        /// Password for the admin account
        #[arg(short, long, default_value = "admin123")]
        password: String,
    },
    /// List customer accounts
    Users,
    /// List customer purchases, newest first
    Purchases,
    /// Show store-wide figures
    Stats,
    /// Set a purchase's status
    SetStatus {
        /// Purchase ID
        id: String,

        /// New status (`pending`, `completed`)
        status: String,
    },
}

#[derive(Subcommand)]
enum PaymentsAction {
    /// Show a charge
    Get {
        /// Gateway payment ID
        id: String,
    },
    /// List charges
    List {
        /// Gateway status (e.g. `pending`, `received`, `overdue`)
        #[arg(long)]
        status: Option<String>,

        /// Gateway customer ID
        #[arg(long)]
        customer: Option<String>,

        /// Billing type (`pix`, `boleto`, `credit_card`)
        #[arg(long)]
        billing_type: Option<BillingType>,

        #[arg(long)]
        offset: Option<u32>,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Create a hosted payment link
    Link {
        /// Link name shown to the buyer
        name: String,

        /// Fixed value in reais; the buyer chooses when omitted
        #[arg(long)]
        value: Option<String>,

        /// Only accept this billing type
        #[arg(long)]
        billing_type: Option<BillingType>,
    },
}

#[derive(Subcommand)]
enum WebhookAction {
    /// Apply a notification saved as JSON
    Replay {
        /// File holding the notification body
        file: PathBuf,

        /// Access token, as sent in the `asaas-access-token` header
        #[arg(long)]
        token: Option<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quantofy_storefront=info,quantofy_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = if cli.command.needs_gateway() {
        StorefrontConfig::from_env()
    } else {
        StorefrontConfig::from_env_offline()
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    let sentry_guard = init_sentry(&config);

    let code = match run(cli, config).await {
        Ok(()) => 0,
        Err(e) => {
            if let CommandError::App(err) = &e {
                err.report();
            }
            tracing::error!("Command failed: {e}");
            1
        }
    };

    drop(sentry_guard);
    std::process::exit(code);
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), CommandError> {
    let state = AppState::new(config)?;
    let mut stdout = std::io::stdout().lock();
    let out = &mut stdout;

    match cli.command {
        Commands::Admin { action } => match action {
            AdminAction::Bootstrap { password } => {
                commands::admin::bootstrap(&state, &password, out)?;
            }
            AdminAction::Users => commands::admin::users(&state, out)?,
            AdminAction::Purchases => commands::admin::purchases(&state, out)?,
            AdminAction::Stats => commands::admin::stats(&state, out)?,
            AdminAction::SetStatus { id, status } => {
                commands::admin::set_status(&state, &id, &status, out)?;
            }
        },
        Commands::Export { kind, out: path } => commands::data::export(&state, kind, path, out)?,
        Commands::ClearData { yes } => commands::data::clear(&state, yes, out)?,
        Commands::Payments { action } => match action {
            PaymentsAction::Get { id } => commands::payments::get(&state, &id, out).await?,
            PaymentsAction::List {
                status,
                customer,
                billing_type,
                offset,
                limit,
            } => {
                let filters = PaymentFilters {
                    customer,
                    status: status
                        .as_deref()
                        .map(commands::payments::parse_status)
                        .transpose()?,
                    billing_type,
                    external_reference: None,
                    offset,
                    limit: Some(limit),
                };
                commands::payments::list(&state, &filters, out).await?;
            }
            PaymentsAction::Link {
                name,
                value,
                billing_type,
            } => {
                commands::payments::link(&state, &name, value.as_deref(), billing_type, out).await?;
            }
        },
        Commands::Webhook { action } => match action {
            WebhookAction::Replay { file, token } => {
                commands::webhook::replay(&state, &file, token.as_deref(), out)?;
            }
        },
        Commands::Catalog { search, category } => {
            commands::catalog::list(&state, search.as_deref(), category.as_deref(), out)?;
        }
    }

    out.flush()?;
    Ok(())
}
