//! CLI module for the labtrack command-line interface.
//!
//! Every subcommand operates on the lab snapshot file:
//! - `init` - Seed the data file with the default inventory
//! - `status` - Show dashboard counts
//! - `login` / `logout` - Record a user's login session
//! - `components`, `requests`, `notifications`, `sessions` - Manage records
//! - `report preview|export` - Review or write the lab report
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::report::derive::{format_percent, utilization_percent, StockStatus};
use crate::report::{ExportFormat, ReportGenerator, Table};
use crate::stats::{device_breakdown, sessions_in_window, SessionWindow, StatusBreakdown, SystemStats};
use crate::store::{
    format_timestamp, parse_timestamp, FileSlot, NewBorrowRequest, NewComponent, RequestStatus,
    Store, User,
};
use crate::validation::{validate_email, validate_new_component, validate_new_request};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "labtrack")]
#[command(author, version, about = "Component inventory and borrow requests for a robotics lab", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "LABTRACK_CONFIG", default_value = "labtrack.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Override the data file from the configuration
    #[arg(long, env = "LABTRACK_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data file with the default inventory
    Init {
        /// Overwrite an existing data file
        #[arg(long)]
        force: bool,
    },

    /// Show dashboard counts
    Status,

    /// Log a user in (students on the lab domain are registered on first login)
    Login {
        email: String,
        #[arg(short, long, env = "LABTRACK_PASSWORD")]
        password: String,
        /// Browser user agent, used to classify the device
        #[arg(long)]
        user_agent: Option<String>,
    },

    /// Log a user out and close their sessions
    Logout { email: String },

    /// Component inventory commands
    #[command(subcommand)]
    Components(ComponentsCommands),

    /// Borrow request commands
    #[command(subcommand)]
    Requests(RequestsCommands),

    /// Notification commands
    #[command(subcommand)]
    Notifications(NotificationsCommands),

    /// Login session commands
    #[command(subcommand)]
    Sessions(SessionsCommands),

    /// Report commands
    #[command(subcommand)]
    Report(ReportCommands),

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ComponentsCommands {
    /// List the inventory
    List,
    /// Add a component to the inventory
    Add {
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        quantity: u32,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum RequestsCommands {
    /// List requests
    List {
        /// Only show requests in this status
        #[arg(long)]
        status: Option<RequestStatus>,
        /// Only show requests filed by this email
        #[arg(long)]
        email: Option<String>,
        /// Only show overdue requests
        #[arg(long)]
        overdue: bool,
    },
    /// File a borrow request for a registered student
    Create {
        /// Student email
        #[arg(long)]
        email: String,
        #[arg(long)]
        roll_no: String,
        #[arg(long)]
        mobile: String,
        /// Component name as listed in the inventory
        #[arg(long)]
        component: String,
        #[arg(long, default_value = "1")]
        quantity: u32,
        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long, conflicts_with = "days")]
        due: Option<String>,
        /// Due this many days from now
        #[arg(long, default_value = "7")]
        days: i64,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Approve a pending request
    Approve {
        id: String,
        /// Administrator email (defaults to the configured admin)
        #[arg(long)]
        by: Option<String>,
    },
    /// Reject a pending request
    Reject {
        id: String,
        #[arg(long)]
        by: Option<String>,
    },
    /// Record the return of an approved request
    Return { id: String },
}

#[derive(Subcommand, Debug)]
pub enum NotificationsCommands {
    /// List notifications for a user
    List {
        email: String,
        #[arg(long)]
        unread: bool,
    },
    /// Mark a notification as read
    Read { id: String },
}

#[derive(Subcommand, Debug)]
pub enum SessionsCommands {
    /// List login sessions
    List {
        /// today, week, month or all
        #[arg(long, default_value = "all")]
        window: SessionWindow,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    /// Show a row-limited preview of the report
    Preview,
    /// Write the report to disk
    Export {
        /// xlsx or csv (defaults to the configured format)
        #[arg(long)]
        format: Option<ExportFormat>,
        /// Output directory (defaults to the configured directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only export this sheet (csv only)
        #[arg(long)]
        sheet: Option<String>,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// Run a CLI command against the configured data file
pub fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    if let Commands::Config(ConfigCommands::Check) = &cli.command {
        return cmd_config_check(cli);
    }

    let slot = FileSlot::new(&config.storage.data_file);
    let mut store = Store::open(Box::new(slot), &config.auth.admin_email);
    execute(&cli.command, &mut store, config, Utc::now())
}

/// Dispatch a command against an open store
pub fn execute(
    command: &Commands,
    store: &mut Store,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<()> {
    match command {
        Commands::Init { force } => cmd_init(store, config, *force, now),
        Commands::Status => cmd_status(store, now),
        Commands::Login {
            email,
            password,
            user_agent,
        } => cmd_login(store, config, email, password, user_agent.as_deref(), now),
        Commands::Logout { email } => cmd_logout(store, config, email, now),
        Commands::Components(ComponentsCommands::List) => cmd_components_list(store),
        Commands::Components(ComponentsCommands::Add {
            name,
            category,
            quantity,
            description,
        }) => cmd_components_add(store, name, category, *quantity, description.clone()),
        Commands::Requests(RequestsCommands::List {
            status,
            email,
            overdue,
        }) => cmd_requests_list(store, *status, email.as_deref(), *overdue, now),
        Commands::Requests(RequestsCommands::Create {
            email,
            roll_no,
            mobile,
            component,
            quantity,
            due,
            days,
            notes,
        }) => {
            let due_date = match due {
                Some(raw) => parse_timestamp(raw)
                    .map_err(|e| anyhow::anyhow!("Invalid due date: {}", e))?,
                None => Duration::try_days(*days)
                    .and_then(|offset| now.checked_add_signed(offset))
                    .ok_or_else(|| anyhow::anyhow!("Invalid --days: {}", days))?,
            };
            let student = find_user(store, email)?;
            let request = NewBorrowRequest {
                student_id: student.id,
                student_name: student.name,
                roll_no: roll_no.trim().to_string(),
                mobile: mobile.trim().to_string(),
                component_name: component.trim().to_string(),
                quantity: *quantity,
                due_date,
                notes: notes.clone(),
            };
            cmd_requests_create(store, request, now)
        }
        Commands::Requests(RequestsCommands::Approve { id, by }) => {
            let approver = find_admin(store, config, by.as_deref())?;
            let req = store
                .approve_request(id, &approver.name, now)
                .with_context(|| format!("Failed to approve request {}", id))?;
            println!(
                "[OK] Approved {}: {} x {} for {} (due {})",
                req.id,
                req.quantity,
                req.component_name,
                req.student_name,
                req.due_date.format("%Y-%m-%d")
            );
            Ok(())
        }
        Commands::Requests(RequestsCommands::Reject { id, by }) => {
            let approver = find_admin(store, config, by.as_deref())?;
            let req = store
                .reject_request(id, &approver.name, now)
                .with_context(|| format!("Failed to reject request {}", id))?;
            println!("[OK] Rejected {} from {}", req.id, req.student_name);
            Ok(())
        }
        Commands::Requests(RequestsCommands::Return { id }) => {
            let req = store
                .return_request(id, now)
                .with_context(|| format!("Failed to record return of {}", id))?;
            println!(
                "[OK] Returned {} x {} ({})",
                req.quantity, req.component_name, req.id
            );
            Ok(())
        }
        Commands::Notifications(NotificationsCommands::List { email, unread }) => {
            cmd_notifications_list(store, email, *unread)
        }
        Commands::Notifications(NotificationsCommands::Read { id }) => {
            store
                .mark_notification_read(id)
                .with_context(|| format!("Failed to mark notification {} as read", id))?;
            println!("[OK] Marked {} as read", id);
            Ok(())
        }
        Commands::Sessions(SessionsCommands::List { window }) => {
            cmd_sessions_list(store, *window, now)
        }
        Commands::Report(ReportCommands::Preview) => cmd_report_preview(store, config, now),
        Commands::Report(ReportCommands::Export {
            format,
            output,
            sheet,
        }) => cmd_report_export(store, config, *format, output.clone(), sheet.as_deref(), now),
        Commands::Config(ConfigCommands::Check) => {
            anyhow::bail!("config check does not use the data file")
        }
    }
}

fn cmd_init(store: &mut Store, config: &Config, force: bool, now: DateTime<Utc>) -> Result<()> {
    let path = &config.storage.data_file;
    if path.exists() && !force {
        println!("[!!] Data file already exists: {}", path.display());
        println!("Use --force to overwrite it with the default inventory.");
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    store.reset(now).context("Failed to write data file")?;
    println!("[OK] Initialized {}", path.display());
    println!(
        "  {} components, admin account {}",
        store.components().len(),
        config.auth.admin_email
    );
    Ok(())
}

fn cmd_status(store: &Store, now: DateTime<Utc>) -> Result<()> {
    let stats = SystemStats::compute(store.snapshot(), now);
    let breakdown = StatusBreakdown::compute(store.snapshot());

    println!("=== Lab Status ===");
    println!();
    println!("Users:");
    println!("  Total:        {}", stats.total_users);
    println!("  Active:       {}", stats.active_users);
    println!("  Online:       {}", stats.online_users);
    println!("  Total Logins: {}", stats.total_logins);
    println!();
    println!("Inventory:");
    println!("  Components:   {}", stats.total_components);
    println!();
    println!("Requests:");
    println!("  Total:        {}", stats.total_requests);
    for status in RequestStatus::ALL {
        println!(
            "  {:<13} {} ({})",
            format!("{}:", capitalize(status.as_str())),
            breakdown.count(status),
            format_percent(breakdown.share(status))
        );
    }
    let overdue_icon = if stats.overdue_items == 0 { "[OK]" } else { "[!!]" };
    println!("  {} Overdue:  {}", overdue_icon, stats.overdue_items);
    println!();
    Ok(())
}

fn cmd_login(
    store: &mut Store,
    config: &Config,
    email: &str,
    password: &str,
    user_agent: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    validate_email(email.trim()).map_err(anyhow::Error::msg)?;
    let auth = Authenticator::new(&config.auth);
    let user = auth
        .authenticate(store, email, password, user_agent, now)
        .context("Login failed")?;

    println!("[OK] Logged in as {} ({})", user.name, user.role);
    println!("  Logins:       {}", user.login_count);
    let unread = store.unread_count(&user.id);
    if unread > 0 {
        println!("  Unread:       {} notification(s)", unread);
    }
    Ok(())
}

fn cmd_logout(store: &mut Store, config: &Config, email: &str, now: DateTime<Utc>) -> Result<()> {
    let auth = Authenticator::new(&config.auth);
    let closed = auth.logout(store, email, now).context("Logout failed")?;
    println!("[OK] Logged out {} ({} session(s) closed)", email.trim(), closed);
    Ok(())
}

fn cmd_components_list(store: &Store) -> Result<()> {
    if store.components().is_empty() {
        println!("No components found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<28}  {:<16}  {:>9}  {:>7}  {:<12}",
        "NAME", "CATEGORY", "AVAILABLE", "UTIL", "STOCK"
    );
    println!("{}", "-".repeat(82));

    for c in store.components() {
        println!(
            "{:<28}  {:<16}  {:>9}  {:>7}  {:<12}",
            truncate(&c.name, 28),
            truncate(&c.category, 16),
            format!("{}/{}", c.available_quantity, c.total_quantity),
            format_percent(utilization_percent(
                c.total_quantity.into(),
                c.available_quantity.into(),
            )),
            StockStatus::classify(c.total_quantity, c.available_quantity).label()
        );
    }

    println!();
    Ok(())
}

fn cmd_components_add(
    store: &mut Store,
    name: &str,
    category: &str,
    quantity: u32,
    description: Option<String>,
) -> Result<()> {
    let new = NewComponent {
        name: name.trim().to_string(),
        category: category.trim().to_string(),
        total_quantity: quantity,
        description,
    };
    validate_new_component(&new, store.snapshot())?;

    let component = store.add_component(new.into_component())?;
    println!(
        "[OK] Added {} ({}), {} in stock",
        component.name, component.category, component.total_quantity
    );
    Ok(())
}

fn cmd_requests_list(
    store: &Store,
    status: Option<RequestStatus>,
    email: Option<&str>,
    overdue_only: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let student_id = match email {
        Some(email) => Some(find_user(store, email)?.id),
        None => None,
    };

    let requests: Vec<_> = store
        .requests()
        .iter()
        .filter(|r| status.map_or(true, |s| r.status == s))
        .filter(|r| student_id.as_ref().map_or(true, |id| &r.student_id == id))
        .filter(|r| !overdue_only || r.is_overdue(now))
        .collect();

    if requests.is_empty() {
        println!("No requests found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<40}  {:<20}  {:<24}  {:>3}  {:<9}  {:<10}",
        "ID", "STUDENT", "COMPONENT", "QTY", "STATUS", "DUE"
    );
    println!("{}", "-".repeat(118));

    for r in requests {
        let flag = if r.is_overdue(now) { "  OVERDUE" } else { "" };
        println!(
            "{:<40}  {:<20}  {:<24}  {:>3}  {:<9}  {:<10}{}",
            r.id,
            truncate(&r.student_name, 20),
            truncate(&r.component_name, 24),
            r.quantity,
            r.status.as_str(),
            r.due_date.format("%Y-%m-%d").to_string(),
            flag
        );
    }

    println!();
    Ok(())
}

fn cmd_requests_create(store: &mut Store, new: NewBorrowRequest, now: DateTime<Utc>) -> Result<()> {
    validate_new_request(&new, store.snapshot(), now)?;

    let req = store.add_request(new.into_request(now))?;
    println!("[OK] Request filed: {}", req.id);
    println!("  Component:    {} x {}", req.quantity, req.component_name);
    println!("  Due:          {}", req.due_date.format("%Y-%m-%d"));
    println!("  Status:       {}", req.status);
    Ok(())
}

fn cmd_notifications_list(store: &Store, email: &str, unread_only: bool) -> Result<()> {
    let user = find_user(store, email)?;
    let notifications: Vec<_> = store
        .user_notifications(&user.id)
        .into_iter()
        .filter(|n| !unread_only || !n.read)
        .collect();

    if notifications.is_empty() {
        println!("No notifications.");
        return Ok(());
    }

    println!();
    for n in notifications.iter().rev() {
        let marker = if n.read { " " } else { "*" };
        let when = n
            .created_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{} [{}] {}  {}", marker, n.kind, n.title, when);
        println!("    {}", n.message);
        println!("    id: {}", n.id);
    }
    println!();
    println!("{} unread", store.unread_count(&user.id));
    Ok(())
}

fn cmd_sessions_list(store: &Store, window: SessionWindow, now: DateTime<Utc>) -> Result<()> {
    let sessions = sessions_in_window(store.login_sessions(), window, now);

    println!("=== Login Sessions ({}) ===", window);
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<20}  {:<28}  {:<16}  {:<10}  {:<14}",
        "USER", "EMAIL", "LOGIN", "DURATION", "DEVICE"
    );
    println!("{}", "-".repeat(96));

    for s in &sessions {
        let duration = match (s.is_active, s.session_duration) {
            (true, _) => "active".to_string(),
            (false, Some(ms)) => format_duration((ms / 1000).max(0) as u64),
            (false, None) => "-".to_string(),
        };
        println!(
            "{:<20}  {:<28}  {:<16}  {:<10}  {:<14}",
            truncate(&s.user_name, 20),
            truncate(&s.user_email, 28),
            s.login_time.format("%Y-%m-%d %H:%M").to_string(),
            duration,
            s.device_info.as_deref().unwrap_or("Unknown")
        );
    }

    println!();
    println!("Devices:");
    for (device, count) in device_breakdown(sessions.iter().copied()) {
        println!("  {:<14} {}", device, count);
    }
    println!();
    Ok(())
}

fn cmd_report_preview(store: &Store, config: &Config, now: DateTime<Utc>) -> Result<()> {
    let generator = ReportGenerator::new(&config.report);
    let preview = generator.preview(store.snapshot(), now);

    println!("=== {} Report Preview ===", config.report.title);
    println!("Generated at {}", format_timestamp(&preview.generated_at));
    println!();
    println!("Users:        {} ({} online)", preview.stats.total_users, preview.stats.online_users);
    println!("Requests:     {} ({} pending)", preview.stats.total_requests, preview.stats.pending_requests);
    println!("Components:   {}", preview.stats.total_components);
    println!("Overdue:      {}", preview.stats.overdue_items);

    for (title, table, columns) in [
        ("Components", &preview.components, &[1usize, 2, 4, 6, 7][..]),
        ("Recent Requests", &preview.recent_requests, &[1, 4, 6, 7, 9, 16][..]),
        ("Category Performance", &preview.categories, &[0, 1, 2, 5, 6, 7][..]),
        ("Top Users", &preview.top_users, &[1, 2, 6, 10][..]),
    ] {
        println!();
        println!("=== {} ===", title);
        print_table(table, columns);
    }
    println!();
    Ok(())
}

fn cmd_report_export(
    store: &Store,
    config: &Config,
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
    sheet: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let format = match format {
        Some(format) => format,
        None => config
            .report
            .format
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Invalid report.format in configuration")?,
    };
    if sheet.is_some() && format == ExportFormat::Xlsx {
        anyhow::bail!("--sheet is only supported for csv exports");
    }

    let dir = output.unwrap_or_else(|| config.report.output_dir.clone());
    let generator = ReportGenerator::new(&config.report);
    let report = generator.generate(store.snapshot(), now);
    let path = generator
        .export(&report, format, &dir, sheet)
        .context("Failed to export report")?;

    println!("[OK] Report written to {}", path.display());
    for table in &report.sheets {
        if sheet.map_or(true, |s| table.name.eq_ignore_ascii_case(s)) {
            println!("  {:<16} {} rows", table.name, table.len());
        }
    }
    Ok(())
}

/// Validate configuration file
fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("The default configuration will be used.");
        println!("To create a custom configuration, copy labtrack.example.toml to labtrack.toml");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            let problems = config.validate();
            if problems.is_empty() {
                println!("[OK] Configuration file is valid!");
            } else {
                println!("[!!] Configuration has {} problem(s):", problems.len());
                for problem in &problems {
                    println!("  - {}", problem);
                }
            }
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Storage:");
            println!("  Data File:    {}", config.storage.data_file.display());
            println!();
            println!("Auth:");
            println!("  Domain:       {}", config.auth.domain);
            println!("  Admin:        {}", config.auth.admin_email);
            println!();
            println!("Report:");
            println!("  Organization: {}", config.report.org_name);
            println!("  Output Dir:   {}", config.report.output_dir.display());
            println!("  Format:       {}", config.report.format);
            println!(
                "  Preview:      {} requests, {} users, {} components",
                config.report.preview_requests,
                config.report.preview_users,
                config.report.preview_components
            );
            println!();
            println!("Logging:");
            println!("  Level:        {}", config.logging.level);

            if !problems.is_empty() {
                anyhow::bail!("Configuration is invalid");
            }
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            anyhow::bail!("Configuration is invalid");
        }
    }

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn find_user(store: &Store, email: &str) -> Result<User> {
    store
        .find_user_by_email(&email.trim().to_lowercase())
        .cloned()
        .with_context(|| format!("No user with email {} (log in first to register)", email))
}

/// The acting administrator: `--by` if given, otherwise the configured admin
fn find_admin(store: &Store, config: &Config, by: Option<&str>) -> Result<User> {
    let email = by.unwrap_or(config.auth.admin_email.as_str());
    let user = find_user(store, email)?;
    if !user.is_admin() {
        anyhow::bail!("{} is not an administrator", user.email);
    }
    Ok(user)
}

/// Print selected columns of a table, widths fitted to the content
fn print_table(table: &Table, columns: &[usize]) {
    if table.is_empty() {
        println!("(none)");
        return;
    }

    const MAX_WIDTH: usize = 28;
    let columns: Vec<usize> = columns
        .iter()
        .copied()
        .filter(|&c| c < table.headers.len())
        .collect();

    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|&c| truncate(&row.get(c).map(|cell| cell.to_string()).unwrap_or_default(), MAX_WIDTH))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(table.headers[c].chars().count().min(MAX_WIDTH)))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(&c, &w)| format!("{:<w$}", truncate(&table.headers[c], MAX_WIDTH).to_uppercase(), w = w))
        .collect();
    println!("{}", header.join("  "));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));

    for row in cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<w$}", cell, w = w))
            .collect();
        println!("{}", line.join("  "));
    }
}

/// Format duration to human-readable string
fn format_duration(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySlot;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn run(store: &mut Store, config: &Config, args: &[&str]) -> Result<()> {
        let cli = Cli::try_parse_from(std::iter::once("labtrack").chain(args.iter().copied()))?;
        execute(&cli.command, store, config, now())
    }

    fn setup() -> (Store, Config, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_file = dir.path().join("data").join("lab.json");
        config.report.output_dir = dir.path().join("reports");
        let store = Store::open(Box::new(MemorySlot::new()), &config.auth.admin_email);
        (store, config, dir)
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Ultrasonic Sensor HC-SR04", 12), "Ultrasoni...");
        assert_eq!(truncate("résumé résumé", 8), "résum...");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(3_900), "1h 5m 0s");
        assert_eq!(format_duration(90_000), "1d 1h 0m");
    }

    #[test]
    fn test_parse_nested_subcommands() {
        let cli = Cli::try_parse_from([
            "labtrack",
            "--data-file",
            "/tmp/lab.json",
            "requests",
            "list",
            "--status",
            "approved",
        ])
        .unwrap();
        assert_eq!(cli.data_file, Some(PathBuf::from("/tmp/lab.json")));
        assert!(matches!(
            cli.command,
            Commands::Requests(RequestsCommands::List {
                status: Some(RequestStatus::Approved),
                ..
            })
        ));

        assert!(Cli::try_parse_from(["labtrack", "sessions", "list", "--window", "year"]).is_err());
        assert!(Cli::try_parse_from(["labtrack", "report", "export", "--format", "pdf"]).is_err());
    }

    #[test]
    fn test_borrow_flow_end_to_end() {
        let (mut store, config, _dir) = setup();

        run(&mut store, &config, &["login", "ada.lovelace@issacasimov.in", "-p", "issacasimov"]).unwrap();
        run(
            &mut store,
            &config,
            &[
                "requests", "create",
                "--email", "ada.lovelace@issacasimov.in",
                "--roll-no", "RA2011003",
                "--mobile", "9876543210",
                "--component", "ESP32 Development Board",
                "--quantity", "3",
                "--days", "5",
            ],
        )
        .unwrap();

        let id = store.requests()[0].id.clone();
        run(&mut store, &config, &["requests", "approve", &id]).unwrap();
        assert_eq!(
            store.find_component_by_name("ESP32 Development Board").unwrap().available_quantity,
            9
        );
        assert_eq!(store.requests()[0].approved_by.as_deref(), Some("Administrator"));

        run(&mut store, &config, &["requests", "return", &id]).unwrap();
        assert_eq!(store.requests()[0].status, RequestStatus::Returned);
        assert_eq!(
            store.find_component_by_name("ESP32 Development Board").unwrap().available_quantity,
            12
        );

        run(&mut store, &config, &["logout", "ada.lovelace@issacasimov.in"]).unwrap();
        assert!(store.login_sessions().iter().all(|s| !s.is_active));
    }

    #[test]
    fn test_create_rejects_invalid_input() {
        let (mut store, config, _dir) = setup();
        run(&mut store, &config, &["login", "ada@issacasimov.in", "-p", "issacasimov"]).unwrap();

        let err = run(
            &mut store,
            &config,
            &[
                "requests", "create",
                "--email", "ada@issacasimov.in",
                "--roll-no", "RA1",
                "--mobile", "12",
                "--component", "Arduino Uno R3",
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Mobile number"));
        assert!(store.requests().is_empty());

        // Unregistered students cannot file requests
        assert!(run(
            &mut store,
            &config,
            &[
                "requests", "create",
                "--email", "bob@issacasimov.in",
                "--roll-no", "RA2",
                "--mobile", "9876543210",
                "--component", "Arduino Uno R3",
            ],
        )
        .is_err());
    }

    #[test]
    fn test_create_rejects_out_of_range_days() {
        let (mut store, config, _dir) = setup();
        run(&mut store, &config, &["login", "ada@issacasimov.in", "-p", "issacasimov"]).unwrap();

        for days in ["100000000", "9223372036854775807"] {
            let err = run(
                &mut store,
                &config,
                &[
                    "requests", "create",
                    "--email", "ada@issacasimov.in",
                    "--roll-no", "RA1",
                    "--mobile", "9876543210",
                    "--component", "Arduino Uno R3",
                    "--days", days,
                ],
            )
            .unwrap_err();
            assert!(err.to_string().contains("Invalid --days"), "{}", err);
        }
        assert!(store.requests().is_empty());
    }

    #[test]
    fn test_only_admins_approve() {
        let (mut store, config, _dir) = setup();
        run(&mut store, &config, &["login", "ada@issacasimov.in", "-p", "issacasimov"]).unwrap();
        run(
            &mut store,
            &config,
            &[
                "requests", "create",
                "--email", "ada@issacasimov.in",
                "--roll-no", "RA1",
                "--mobile", "9876543210",
                "--component", "Servo Motor SG90",
            ],
        )
        .unwrap();
        let id = store.requests()[0].id.clone();

        assert!(run(&mut store, &config, &["requests", "approve", &id, "--by", "ada@issacasimov.in"]).is_err());
        assert_eq!(store.requests()[0].status, RequestStatus::Pending);

        run(&mut store, &config, &["requests", "reject", &id]).unwrap();
        assert_eq!(store.requests()[0].status, RequestStatus::Rejected);
    }

    #[test]
    fn test_components_add_validates() {
        let (mut store, config, _dir) = setup();
        run(
            &mut store,
            &config,
            &["components", "add", "Raspberry Pi 4", "--category", "SBC", "--quantity", "6"],
        )
        .unwrap();
        assert_eq!(store.components().len(), 6);
        assert_eq!(store.find_component_by_name("Raspberry Pi 4").unwrap().available_quantity, 6);

        assert!(run(
            &mut store,
            &config,
            &["components", "add", "Raspberry Pi 4", "--category", "SBC", "--quantity", "2"],
        )
        .is_err());
    }

    #[test]
    fn test_report_export_writes_files() {
        let (mut store, config, dir) = setup();
        run(&mut store, &config, &["report", "export"]).unwrap();
        assert!(dir
            .path()
            .join("reports")
            .join("Isaac-Asimov-Lab-Report-2024-06-10.xlsx")
            .exists());

        run(&mut store, &config, &["report", "export", "--format", "csv", "--sheet", "users"]).unwrap();
        let csv = std::fs::read_to_string(
            dir.path().join("reports").join("Isaac-Asimov-Lab-Report-2024-06-10.csv"),
        )
        .unwrap();
        assert!(csv.starts_with("Users\r\n"));

        assert!(run(&mut store, &config, &["report", "export", "--sheet", "users"]).is_err());
        run(&mut store, &config, &["report", "preview"]).unwrap();
    }

    #[test]
    fn test_init_writes_then_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_file = dir.path().join("nested").join("lab.json");
        let mut store = Store::open(
            Box::new(FileSlot::new(&config.storage.data_file)),
            &config.auth.admin_email,
        );

        run(&mut store, &config, &["init"]).unwrap();
        assert!(config.storage.data_file.exists());

        let mut seeded = store.components()[0].clone();
        seeded.available_quantity -= 1;
        store.update_component(seeded).unwrap();

        run(&mut store, &config, &["init"]).unwrap();
        assert_eq!(store.components()[0].available_quantity, 24);

        run(&mut store, &config, &["init", "--force"]).unwrap();
        assert_eq!(store.components()[0].available_quantity, 25);
    }
}
