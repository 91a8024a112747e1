use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{
    Language, LedgerConfig, LedgerService, TransactionFilter, MAX_TREND_MONTHS,
};
use crate::domain::{
    even_ratios, format_cents, format_compact, parse_cents, total_balance, Passbook,
    PassbookUpdate, RatioSetting, TransactionCategory, TransactionKind, TransactionUpdate,
    COMPACT_THRESHOLD_UNITS, PASSBOOK_COLORS,
};
use crate::storage::SqliteStore;

/// Finora - Passbook Ledger
#[derive(Parser)]
#[command(name = "finora")]
#[command(about = "A local-first personal finance tool that keeps money in passbooks")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "finora.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Language for generated descriptions: en, zh-tw
    #[arg(long, default_value = "en", value_parser = parse_language, global = true)]
    pub language: Language,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database with the default passbooks
    Init,

    /// Passbook management commands
    #[command(subcommand)]
    Passbook(PassbookCommands),

    /// Record income or an expense on a passbook
    Add {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Passbook name or ID
        #[arg(short, long)]
        passbook: String,

        /// Record as income (default is expense)
        #[arg(long)]
        income: bool,

        /// Description of the transaction
        #[arg(short, long)]
        description: Option<String>,

        /// Category (e.g., "groceries", "salary")
        #[arg(short, long)]
        category: Option<String>,

        /// Date of the transaction (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Edit a recorded transaction
    Edit {
        /// Transaction ID
        id: String,

        /// New amount
        #[arg(short, long)]
        amount: Option<String>,

        /// Move the transaction to another passbook (name or ID)
        #[arg(short, long)]
        passbook: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New category
        #[arg(short, long)]
        category: Option<String>,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete a transaction and reverse its effect on the balance
    Delete {
        /// Transaction ID
        id: String,
    },

    /// Split an income across passbooks by their ratios
    Allocate {
        /// Total amount to allocate
        amount: String,

        /// Passbooks to allocate to, in order (defaults to every active passbook with a ratio)
        #[arg(long = "to", num_args = 1..)]
        passbooks: Vec<String>,

        /// Description for every created transaction
        #[arg(short, long)]
        description: Option<String>,

        /// Date of the allocation (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List transactions, newest first
    Transactions {
        /// Filter by passbook name or ID
        #[arg(short, long)]
        passbook: Option<String>,

        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,

        /// Only income
        #[arg(long, conflicts_with = "expense")]
        income: bool,

        /// Only expenses
        #[arg(long)]
        expense: bool,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to_date: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show detailed transaction information
    Show {
        /// Transaction ID
        id: String,
    },

    /// Per-passbook income and expense for a month
    Summary {
        /// Month (YYYY-MM, defaults to the current month)
        #[arg(long)]
        month: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Income and expense for the last months
    Trend {
        /// Number of months
        #[arg(
            short,
            long,
            default_value = "6",
            value_parser = clap::value_parser!(u16).range(1..=MAX_TREND_MONTHS as i64)
        )]
        months: u16,

        /// Restrict to one passbook (name or ID)
        #[arg(short, long)]
        passbook: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Category breakdown for a period
    Categories {
        /// Start date (YYYY-MM-DD, defaults to start of current month)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD, inclusive, defaults to now)
        #[arg(long)]
        to: Option<String>,

        /// Break down income instead of expenses
        #[arg(long)]
        income: bool,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show or change the needs/wants/savings split
    Settings {
        /// Needs fraction (e.g., 0.5)
        #[arg(long, requires_all = ["wants", "savings"])]
        needs: Option<f64>,

        /// Wants fraction
        #[arg(long)]
        wants: Option<f64>,

        /// Savings fraction
        #[arg(long)]
        savings: Option<f64>,
    },

    /// Verify stored balances against the transaction log
    Check,

    /// Recompute every balance from the transaction log
    Repair,

    /// Delete all transactions and zero every balance
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Export data to CSV or JSON
    Export {
        /// What to export: transactions, balances, full
        export_type: String,

        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PassbookCommands {
    /// Create a new passbook
    Create {
        /// Passbook name
        name: String,

        /// Display color (hex, e.g., "#7B68EE")
        #[arg(long)]
        color: Option<String>,

        /// Photo URI
        #[arg(long)]
        photo: Option<String>,
    },

    /// List passbooks with their balances
    List {
        /// Include inactive passbooks
        #[arg(short, long)]
        all: bool,
    },

    /// Show passbook details
    Show {
        /// Passbook name or ID
        passbook: String,
    },

    /// Update passbook attributes
    Update {
        /// Passbook name or ID
        passbook: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New color
        #[arg(long)]
        color: Option<String>,

        /// New photo URI
        #[arg(long)]
        photo: Option<String>,

        /// Whether the passbook is selectable for new transactions
        #[arg(long)]
        active: Option<bool>,

        /// Allocation ratio in percent (0-100)
        #[arg(long)]
        ratio: Option<u8>,

        /// Overwrite the stored balance
        #[arg(long)]
        balance: Option<String>,
    },

    /// Delete a passbook and all of its transactions
    Delete {
        /// Passbook name or ID
        passbook: String,
    },

    /// Set allocation ratios, e.g. `ratios Needs=50 Wants=30 Savings=20`
    Ratios {
        /// NAME=PERCENT pairs; the percents must add up to 100
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Split 100% evenly across passbooks
    EvenRatios {
        /// Passbook names or IDs (defaults to every active passbook)
        passbooks: Vec<String>,
    },
}

impl Cli {
    async fn open(&self) -> Result<LedgerService> {
        let db_url = format!("sqlite:{}?mode=rwc", self.database);
        let store = SqliteStore::init(&db_url).await?;
        let config = LedgerConfig::default().with_language(self.language);
        Ok(LedgerService::with_config(store, config))
    }

    pub async fn run(self) -> Result<()> {
        let service = self.open().await?;
        tracing::debug!("Opened ledger at {}", self.database);

        match self.command {
            Commands::Init => {
                let passbooks = service.list_passbooks().await?;
                println!(
                    "Database initialized: {} ({} passbooks)",
                    self.database,
                    passbooks.len()
                );
            }

            Commands::Passbook(cmd) => {
                run_passbook_command(&service, cmd).await?;
            }

            Commands::Add {
                amount,
                passbook,
                income,
                description,
                category,
                date,
            } => {
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let passbook = resolve_passbook(&service, &passbook).await?;
                let category = category.as_deref().map(parse_category).transpose()?;
                let date = parse_optional_date(date)?.unwrap_or_else(Utc::now);
                let kind = TransactionKind::from_is_income(income);

                let tx = service
                    .create_transaction(passbook.id, amount_cents, kind, date, description, category)
                    .await?;
                let updated = service.get_passbook(passbook.id).await?;

                println!(
                    "Recorded {}: {} on {} ({})",
                    kind,
                    format_cents(tx.amount_cents),
                    tx.passbook_name,
                    tx.id
                );
                println!("Balance: {}", format_cents(updated.balance));
            }

            Commands::Edit {
                id,
                amount,
                passbook,
                description,
                category,
                date,
            } => {
                let id = parse_id(&id)?;
                let passbook_id = match passbook {
                    Some(key) => Some(resolve_passbook(&service, &key).await?.id),
                    None => None,
                };
                let update = TransactionUpdate {
                    amount_cents: amount
                        .map(|a| parse_cents(&a))
                        .transpose()
                        .context("Invalid amount format")?,
                    description,
                    passbook_id,
                    date: parse_optional_date(date)?,
                    category: category.as_deref().map(parse_category).transpose()?,
                };

                let tx = service.update_transaction(id, update).await?;
                println!(
                    "Updated transaction {}: {} {} on {}",
                    tx.id,
                    tx.kind(),
                    format_cents(tx.amount_cents),
                    tx.passbook_name
                );
            }

            Commands::Delete { id } => {
                let tx = service.delete_transaction(parse_id(&id)?).await?;
                println!(
                    "Deleted {} of {} from {}",
                    tx.kind(),
                    format_cents(tx.amount_cents),
                    tx.passbook_name
                );
            }

            Commands::Allocate {
                amount,
                passbooks,
                description,
                date,
            } => {
                let total =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let date = parse_optional_date(date)?.unwrap_or_else(Utc::now);

                let created = if passbooks.is_empty() {
                    service
                        .distribute_income_by_ratio(total, description, date)
                        .await?
                } else {
                    let mut ids = Vec::with_capacity(passbooks.len());
                    for key in &passbooks {
                        ids.push(resolve_passbook(&service, key).await?.id);
                    }
                    service
                        .distribute_income(total, &ids, description, date)
                        .await?
                };

                println!("Allocated {}:", format_cents(total));
                for tx in &created {
                    println!(
                        "  {:<20} {:>12}",
                        truncate(&tx.passbook_name, 20),
                        format_cents(tx.amount_cents)
                    );
                }
            }

            Commands::Transactions {
                passbook,
                category,
                income,
                expense,
                from_date,
                to_date,
                limit,
            } => {
                let kind = match (income, expense) {
                    (true, _) => Some(TransactionKind::Income),
                    (_, true) => Some(TransactionKind::Expense),
                    _ => None,
                };
                let passbook_id = match passbook {
                    Some(key) => Some(resolve_passbook(&service, &key).await?.id),
                    None => None,
                };
                let filter = TransactionFilter {
                    passbook_id,
                    category: category.as_deref().map(parse_category).transpose()?,
                    kind,
                    from_date: parse_optional_date(from_date).context("Invalid from-date")?,
                    to_date: to_date
                        .map(|s| parse_end_date(&s))
                        .transpose()
                        .context("Invalid to-date")?,
                    limit,
                };
                run_transactions_command(&service, &filter).await?;
            }

            Commands::Show { id } => {
                run_show_command(&service, parse_id(&id)?).await?;
            }

            Commands::Summary { month, format } => {
                let (year, month) = match month {
                    Some(s) => parse_month(&s)?,
                    None => {
                        let now = Utc::now();
                        (now.year(), now.month())
                    }
                };
                run_summary_command(&service, year, month, &format).await?;
            }

            Commands::Trend {
                months,
                passbook,
                format,
            } => {
                let passbook_id = match passbook {
                    Some(key) => Some(resolve_passbook(&service, &key).await?.id),
                    None => None,
                };
                let trend = service
                    .monthly_trend(passbook_id, usize::from(months), Utc::now())
                    .await?;

                if format == "json" {
                    println!("{}", serde_json::to_string_pretty(&trend)?);
                } else {
                    println!(
                        "{:<8} {:>12} {:>12} {:>12}",
                        "MONTH", "INCOME", "EXPENSE", "NET"
                    );
                    println!("{}", "-".repeat(47));
                    for m in &trend {
                        println!(
                            "{:<8} {:>12} {:>12} {:>12}",
                            m.label(),
                            format_compact(m.income, COMPACT_THRESHOLD_UNITS),
                            format_compact(m.expense, COMPACT_THRESHOLD_UNITS),
                            format_compact(m.net, COMPACT_THRESHOLD_UNITS)
                        );
                    }
                }
            }

            Commands::Categories {
                from,
                to,
                income,
                format,
            } => {
                let (from_date, to_date) = parse_date_range(from, to)?;
                let kind = TransactionKind::from_is_income(income);
                let report = service
                    .category_breakdown(from_date, to_date, kind)
                    .await?;

                if format == "json" {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    println!(
                        "{} by category, {} to {}",
                        if income { "Income" } else { "Spending" },
                        from_date.format("%Y-%m-%d"),
                        to_date.format("%Y-%m-%d")
                    );
                    println!();
                    println!(
                        "{:<18} {:<8} {:>12} {:>6} {:>8}",
                        "CATEGORY", "BUCKET", "TOTAL", "COUNT", "PERCENT"
                    );
                    println!("{}", "-".repeat(56));
                    for cat in &report {
                        println!(
                            "{:<18} {:<8} {:>12} {:>6} {:>7.1}%",
                            cat.label(),
                            cat.category.map(|c| c.bucket().as_str()).unwrap_or("-"),
                            format_cents(cat.total),
                            cat.count,
                            cat.percentage
                        );
                    }
                }
            }

            Commands::Settings {
                needs,
                wants,
                savings,
            } => {
                let settings = match (needs, wants, savings) {
                    (Some(n), Some(w), Some(s)) => {
                        let mut current = service.get_ratio_settings().await?;
                        current.needs_ratio = n;
                        current.wants_ratio = w;
                        current.savings_ratio = s;
                        service.save_ratio_settings(current).await?
                    }
                    _ => service.get_ratio_settings().await?,
                };
                print_ratio_settings(&settings);
            }

            Commands::Check => {
                run_check_command(&service).await?;
            }

            Commands::Repair => {
                let corrected = service.rebuild_balances().await?;
                if corrected.is_empty() {
                    println!("All balances already match the transaction log.");
                } else {
                    for drift in &corrected {
                        println!(
                            "{}: {} -> {}",
                            drift.passbook_name,
                            format_cents(drift.stored),
                            format_cents(drift.replayed)
                        );
                    }
                    println!("Repaired {} passbook balance(s).", corrected.len());
                }
            }

            Commands::Reset { yes } => {
                if !yes {
                    anyhow::bail!("Reset deletes every transaction. Re-run with --yes to confirm");
                }
                service.reset_all_data().await?;
                println!("All transactions deleted; passbook balances are now 0.00");
            }

            Commands::Export {
                export_type,
                output,
            } => {
                run_export_command(&service, &export_type, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

async fn run_passbook_command(service: &LedgerService, cmd: PassbookCommands) -> Result<()> {
    match cmd {
        PassbookCommands::Create { name, color, photo } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                anyhow::bail!("Passbook name cannot be empty");
            }
            let color = match color {
                Some(c) => c,
                None => {
                    let count = service.list_passbooks().await?.len();
                    PASSBOOK_COLORS[count % PASSBOOK_COLORS.len()].to_string()
                }
            };

            let passbook = service.create_passbook(name, color, photo).await?;
            println!("Created passbook: {} ({})", passbook.name, passbook.id);
        }

        PassbookCommands::List { all } => {
            let passbooks = if all {
                service.list_passbooks().await?
            } else {
                service.list_active_passbooks().await?
            };

            if passbooks.is_empty() {
                println!("No passbooks found.");
            } else {
                println!(
                    "{:<20} {:>12} {:>6} {:<8} {:<6}",
                    "NAME", "BALANCE", "RATIO", "COLOR", "ACTIVE"
                );
                println!("{}", "-".repeat(56));
                for p in &passbooks {
                    println!(
                        "{:<20} {:>12} {:>6} {:<8} {:<6}",
                        truncate(&p.name, 20),
                        format_compact(p.balance, COMPACT_THRESHOLD_UNITS),
                        p.ratio.map(|r| format!("{}%", r)).unwrap_or_default(),
                        p.color,
                        if p.is_active { "yes" } else { "no" }
                    );
                }
                let total = total_balance(&passbooks);
                println!("{}", "-".repeat(56));
                println!("{:<20} {:>12}", "TOTAL", format_cents(total));
            }
        }

        PassbookCommands::Show { passbook } => {
            let passbook = resolve_passbook(service, &passbook).await?;
            let count = service
                .list_transactions(&TransactionFilter::for_passbook(passbook.id))
                .await?
                .len();

            println!("Passbook: {}", passbook.name);
            println!("  ID:           {}", passbook.id);
            println!("  Color:        {}", passbook.color);
            if let Some(uri) = &passbook.photo_uri {
                println!("  Photo:        {}", uri);
            }
            println!("  Active:       {}", if passbook.is_active { "yes" } else { "no" });
            if let Some(ratio) = passbook.ratio {
                println!("  Ratio:        {}%", ratio);
            }
            println!("  Balance:      {}", format_cents(passbook.balance));
            println!("  Transactions: {}", count);
            println!(
                "  Created:      {}",
                passbook.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!(
                "  Updated:      {}",
                passbook.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        PassbookCommands::Update {
            passbook,
            name,
            color,
            photo,
            active,
            ratio,
            balance,
        } => {
            let passbook = resolve_passbook(service, &passbook).await?;
            if name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                anyhow::bail!("Passbook name cannot be empty");
            }
            let update = PassbookUpdate {
                name: name.map(|n| n.trim().to_string()),
                color,
                photo_uri: photo,
                is_active: active,
                ratio,
                balance: balance
                    .map(|b| parse_cents(&b))
                    .transpose()
                    .context("Invalid balance format")?,
            };

            let updated = service.update_passbook(passbook.id, update).await?;
            println!("Updated passbook: {}", updated.name);
        }

        PassbookCommands::Delete { passbook } => {
            let passbook = resolve_passbook(service, &passbook).await?;
            let deleted = service.delete_passbook(passbook.id).await?;
            println!(
                "Deleted passbook {} and {} transaction(s)",
                deleted.passbook.name, deleted.removed_transactions
            );
        }

        PassbookCommands::Ratios { assignments } => {
            let mut ratios = Vec::with_capacity(assignments.len());
            for assignment in &assignments {
                let (key, percent) = assignment
                    .rsplit_once('=')
                    .with_context(|| format!("Expected NAME=PERCENT, got '{}'", assignment))?;
                let percent: u8 = percent
                    .trim()
                    .trim_end_matches('%')
                    .parse()
                    .with_context(|| format!("Invalid percent '{}'", percent))?;
                let passbook = resolve_passbook(service, key.trim()).await?;
                ratios.push((passbook.id, percent));
            }

            service.set_ratios(&ratios).await?;
            print_ratios(&service.allocation_candidates().await?);
        }

        PassbookCommands::EvenRatios { passbooks } => {
            let selected = if passbooks.is_empty() {
                service.list_active_passbooks().await?
            } else {
                let mut selected = Vec::with_capacity(passbooks.len());
                for key in &passbooks {
                    selected.push(resolve_passbook(service, key).await?);
                }
                selected
            };
            if selected.is_empty() {
                anyhow::bail!("No passbooks to split across");
            }

            let ratios: Vec<_> = selected
                .iter()
                .zip(even_ratios(selected.len()))
                .map(|(p, r)| (p.id, r))
                .collect();
            service.set_ratios(&ratios).await?;
            print_ratios(&service.allocation_candidates().await?);
        }
    }
    Ok(())
}

fn print_ratios(passbooks: &[Passbook]) {
    println!("{:<20} {:>6}", "PASSBOOK", "RATIO");
    println!("{}", "-".repeat(27));
    for p in passbooks {
        println!(
            "{:<20} {:>5}%",
            truncate(&p.name, 20),
            p.ratio.unwrap_or_default()
        );
    }
}

fn print_ratio_settings(settings: &RatioSetting) {
    println!("Needs:   {:>5.1}%", settings.needs_ratio * 100.0);
    println!("Wants:   {:>5.1}%", settings.wants_ratio * 100.0);
    println!("Savings: {:>5.1}%", settings.savings_ratio * 100.0);
}

async fn run_transactions_command(
    service: &LedgerService,
    filter: &TransactionFilter,
) -> Result<()> {
    let transactions = service.list_transactions(filter).await?;

    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:<12} {:>12} {:<16} {:<14} DESCRIPTION",
        "DATE", "AMOUNT", "PASSBOOK", "CATEGORY"
    );
    println!("{}", "-".repeat(80));
    for tx in &transactions {
        println!(
            "{:<12} {:>12} {:<16} {:<14} {}",
            tx.date.format("%Y-%m-%d"),
            format_cents(tx.signed_amount()),
            truncate(&tx.passbook_name, 16),
            tx.category.map(|c| c.as_str()).unwrap_or(""),
            truncate(&tx.description, 30)
        );
    }

    let totals = crate::application::totals(&transactions, &TransactionFilter::default());
    println!("{}", "-".repeat(80));
    println!(
        "{} transaction(s): income {}, expense {}, net {}",
        totals.count,
        format_cents(totals.income),
        format_cents(totals.expense),
        format_cents(totals.net)
    );
    Ok(())
}

async fn run_show_command(service: &LedgerService, id: Uuid) -> Result<()> {
    let tx = service.get_transaction(id).await?;

    println!("Transaction: {}", tx.id);
    println!("  Type:        {}", tx.kind());
    println!("  Amount:      {}", format_cents(tx.amount_cents));
    println!("  Date:        {}", tx.date.format("%Y-%m-%d %H:%M:%S"));
    println!("  Passbook:    {}", tx.passbook_name);
    if let Some(category) = tx.category {
        println!("  Category:    {} ({})", category, category.bucket().as_str());
    }
    if !tx.description.is_empty() {
        println!("  Description: {}", tx.description);
    }
    println!(
        "  Recorded at: {}",
        tx.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if tx.updated_at != tx.created_at {
        println!(
            "  Updated at:  {}",
            tx.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

async fn run_summary_command(
    service: &LedgerService,
    year: i32,
    month: u32,
    format: &str,
) -> Result<()> {
    let summaries = service.passbook_month_summaries(year, month).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!("Summary for {:04}-{:02}", year, month);
    println!();
    println!(
        "{:<20} {:>12} {:>12} {:>12} {:>12}",
        "PASSBOOK", "INCOME", "EXPENSE", "NET", "BALANCE"
    );
    println!("{}", "-".repeat(72));
    for s in &summaries {
        println!(
            "{:<20} {:>12} {:>12} {:>12} {:>12}",
            truncate(&s.name, 20),
            format_compact(s.income, COMPACT_THRESHOLD_UNITS),
            format_compact(s.expense, COMPACT_THRESHOLD_UNITS),
            format_compact(s.net, COMPACT_THRESHOLD_UNITS),
            format_compact(s.balance, COMPACT_THRESHOLD_UNITS)
        );
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Passbooks:     {}", report.passbook_count);
    println!("Transactions:  {}", report.transaction_count);
    println!("Total balance: {}", format_cents(report.total_balance));
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        if !report.drifts.is_empty() {
            println!();
            println!("Run `finora repair` to recompute balances from the transaction log.");
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "transactions" => {
            let count = exporter
                .export_transactions_csv(writer, &TransactionFilter::default())
                .await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        "balances" => {
            let count = exporter.export_balances_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} passbook balances", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full ledger: {} passbooks, {} transactions",
                    snapshot.passbooks.len(),
                    snapshot.transactions.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: transactions, balances, full",
                export_type
            );
        }
    }

    Ok(())
}

/// Look a passbook up by ID, falling back to its name.
async fn resolve_passbook(service: &LedgerService, key: &str) -> Result<Passbook> {
    let passbook = match Uuid::parse_str(key) {
        Ok(id) => service.get_passbook(id).await?,
        Err(_) => service.find_passbook(key).await?,
    };
    Ok(passbook)
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).context("Invalid transaction ID format (expected UUID)")
}

fn parse_category(s: &str) -> Result<TransactionCategory> {
    TransactionCategory::from_str(s).ok_or_else(|| {
        let valid: Vec<_> = TransactionCategory::ALL.iter().map(|c| c.as_str()).collect();
        anyhow::anyhow!("Unknown category '{}'. Valid: {}", s, valid.join(", "))
    })
}

fn parse_language(s: &str) -> std::result::Result<Language, String> {
    Language::from_str(s).ok_or_else(|| format!("Unknown language '{}'. Valid: en, zh-tw", s))
}

fn parse_month(s: &str) -> Result<(i32, u32)> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
        .with_context(|| format!("Invalid month '{}'. Use YYYY-MM", s))?;
    Ok((date.year(), date.month()))
}

fn parse_date_range(
    from: Option<String>,
    to: Option<String>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let now = Utc::now();

    let to_date = match to {
        Some(date_str) => parse_end_date(&date_str)?,
        None => now,
    };

    // Default from_date is start of current month
    let from_date = match from {
        Some(date_str) => parse_date(&date_str)?,
        None => NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| anyhow::anyhow!("Invalid date"))?
            .and_utc(),
    };

    Ok((from_date, to_date))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn parse_optional_date(date: Option<String>) -> Result<Option<DateTime<Utc>>> {
    date.map(|s| {
        parse_date(&s).with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", s))
    })
    .transpose()
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Parse YYYY-MM-DD format
    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")?;

    // Convert to UTC datetime at midnight
    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(naive_datetime.and_utc())
}

/// Like `parse_date`, but a bare day means the end of that day.
fn parse_end_date(date_str: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")?;
    let naive_datetime = naive_date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(naive_datetime.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("Savings", 20), "Savings");
        assert_eq!(truncate("A very long passbook name", 10), "A very ...");
        assert_eq!(truncate("旅遊基金旅遊基金", 5), "旅遊...");
    }

    #[test]
    fn test_parse_end_date_is_inclusive() -> Result<()> {
        let start = parse_date("2024-03-31")?;
        let end = parse_end_date("2024-03-31")?;
        assert_eq!(start.format("%H:%M:%S").to_string(), "00:00:00");
        assert_eq!(end.format("%H:%M:%S").to_string(), "23:59:59");
        Ok(())
    }

    #[test]
    fn test_parse_month_and_category() -> Result<()> {
        assert_eq!(parse_month("2024-02")?, (2024, 2));
        assert!(parse_month("2024-13").is_err());
        assert_eq!(parse_category("Dining")?, TransactionCategory::Dining);
        assert!(parse_category("lottery").is_err());
        Ok(())
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_allocation() {
        let cli = Cli::parse_from([
            "finora",
            "--language",
            "zh-tw",
            "allocate",
            "1000",
            "--to",
            "Needs",
            "Savings",
        ]);
        assert_eq!(cli.language, Language::TraditionalChinese);
        match cli.command {
            Commands::Allocate { passbooks, .. } => assert_eq!(passbooks, ["Needs", "Savings"]),
            _ => panic!("expected allocate"),
        }
    }
}
