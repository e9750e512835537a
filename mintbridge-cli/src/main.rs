//! mintbridge: copies DSCO orders and catalog items into Mintsoft.
//!
//! Usage:
//!   mintbridge orders --hours 6
//!   mintbridge products --since 2024-01-01T00:00:00Z --until 2024-01-02T00:00:00Z
//!   mintbridge order PO-1001
//!
//! Credentials come from flags or the environment; a `.env` file in the
//! working directory is loaded first when present.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};
use mintbridge_sync::{
    DateField, DestinationConfig, ListFilters, MappingConfig, SourceAuthMode, SourceConfig,
    SyncConfig, SyncOrchestrator, default_window,
};
use mintbridge_types::{EntityKind, SyncOutcome, TimeWindow};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mintbridge")]
#[command(about = "Sync DSCO orders and catalog items into Mintsoft")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    dsco: DscoArgs,

    #[command(flatten)]
    mintsoft: MintsoftArgs,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync every order in a time window
    Orders(WindowArgs),
    /// Sync every catalog item in a time window
    Products(WindowArgs),
    /// Sync a single order by order number
    Order { order_number: String },
    /// Sync a single product by SKU
    Product { sku: String },
}

#[derive(Args, Debug)]
struct WindowArgs {
    /// Window start (RFC 3339)
    #[arg(long)]
    since: Option<DateTime<Utc>>,

    /// Window end (RFC 3339), defaults to now
    #[arg(long, requires = "since")]
    until: Option<DateTime<Utc>>,

    /// Trailing window length in hours, ending now
    #[arg(long, conflicts_with_all = ["since", "until"])]
    hours: Option<i64>,

    /// Which timestamp the window applies to
    #[arg(long, default_value = "created", value_parser = parse_date_field)]
    date_field: DateField,

    /// Upstream lifecycle status filter
    #[arg(long)]
    status: Option<String>,
}

#[derive(Args, Debug)]
struct DscoArgs {
    #[arg(long, env = "DSCO_API_URL", default_value = "https://api.dsco.io/api/v3", global = true)]
    dsco_api_url: String,

    #[arg(long, env = "DSCO_AUTH_URL", global = true)]
    dsco_auth_url: Option<String>,

    /// oauth, basic or api-key
    #[arg(long, env = "DSCO_AUTH_MODE", default_value = "oauth", value_parser = parse_auth_mode, global = true)]
    dsco_auth_mode: SourceAuthMode,

    #[arg(long, env = "DSCO_CLIENT_ID", default_value = "", hide_env_values = true, global = true)]
    dsco_client_id: String,

    #[arg(long, env = "DSCO_CLIENT_SECRET", default_value = "", hide_env_values = true, global = true)]
    dsco_client_secret: String,

    #[arg(long, env = "DSCO_API_KEY", hide_env_values = true, global = true)]
    dsco_api_key: Option<String>,

    #[arg(long, env = "DSCO_PAGE_SIZE", default_value = "100", global = true)]
    dsco_page_size: u32,
}

#[derive(Args, Debug)]
struct MintsoftArgs {
    #[arg(long, env = "MINTSOFT_API_URL", default_value = "https://api.mintsoft.co.uk", global = true)]
    mintsoft_api_url: String,

    #[arg(long, env = "MINTSOFT_USERNAME", default_value = "", global = true)]
    mintsoft_username: String,

    #[arg(long, env = "MINTSOFT_PASSWORD", default_value = "", hide_env_values = true, global = true)]
    mintsoft_password: String,

    #[arg(long, env = "MINTSOFT_CLIENT_ID", default_value = "1", global = true)]
    mintsoft_client_id: i64,

    #[arg(long, env = "MINTSOFT_WAREHOUSE_ID", default_value = "1", global = true)]
    mintsoft_warehouse_id: i64,

    #[arg(long, env = "MINTSOFT_DEFAULT_COURIER_ID", default_value = "1006", global = true)]
    mintsoft_default_courier_id: i64,

    /// Scan the destination listing on every lookup instead of indexing it once
    #[arg(long, env = "MINTSOFT_SCAN_LOOKUPS", global = true)]
    mintsoft_scan_lookups: bool,
}

fn parse_date_field(value: &str) -> Result<DateField, String> {
    value.parse().map_err(|e: mintbridge_sync::SyncError| e.to_string())
}

fn parse_auth_mode(value: &str) -> Result<SourceAuthMode, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "oauth" | "oauth2" => Ok(SourceAuthMode::OAuth),
        "basic" => Ok(SourceAuthMode::Basic),
        "api-key" | "api_key" | "apikey" => Ok(SourceAuthMode::ApiKey),
        other => Err(format!("unknown auth mode: {other}")),
    }
}

impl Cli {
    fn sync_config(&self) -> SyncConfig {
        let defaults = SourceConfig::default();
        let source = SourceConfig {
            auth_url: self
                .dsco
                .dsco_auth_url
                .clone()
                .unwrap_or_else(|| format!("{}/oauth2/token", self.dsco.dsco_api_url.trim_end_matches('/'))),
            api_base_url: self.dsco.dsco_api_url.clone(),
            auth_mode: self.dsco.dsco_auth_mode,
            client_id: self.dsco.dsco_client_id.clone(),
            client_secret: self.dsco.dsco_client_secret.clone(),
            api_key: self.dsco.dsco_api_key.clone(),
            page_size: self.dsco.dsco_page_size,
            ..defaults
        };
        let destination = DestinationConfig {
            api_base_url: self.mintsoft.mintsoft_api_url.clone(),
            username: self.mintsoft.mintsoft_username.clone(),
            password: self.mintsoft.mintsoft_password.clone(),
            client_id: self.mintsoft.mintsoft_client_id,
            index_lookups: !self.mintsoft.mintsoft_scan_lookups,
            ..Default::default()
        };
        let mapping = MappingConfig {
            warehouse_id: self.mintsoft.mintsoft_warehouse_id,
            client_id: self.mintsoft.mintsoft_client_id,
            default_courier_service_id: self.mintsoft.mintsoft_default_courier_id,
            ..Default::default()
        };
        SyncConfig {
            source,
            destination,
            mapping,
            ..Default::default()
        }
    }
}

impl WindowArgs {
    fn window(&self, config: &SyncConfig, now: DateTime<Utc>) -> Result<TimeWindow> {
        let window = match (self.since, self.hours) {
            (Some(since), _) => TimeWindow::new(since, self.until.unwrap_or(now))?,
            (None, Some(hours)) => {
                let Some(span) = Duration::try_hours(hours) else {
                    bail!("--hours out of range: {hours}");
                };
                TimeWindow::trailing(now, span)?
            }
            (None, None) => default_window(config, now)?,
        };
        Ok(window)
    }

    fn filters(&self) -> ListFilters {
        let filters = ListFilters::default().with_date_field(self.date_field);
        match &self.status {
            Some(status) => filters.with_status(status.as_str()),
            None => filters,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.sync_config();
    let kind = match &cli.command {
        Command::Orders(_) | Command::Order { .. } => EntityKind::Order,
        Command::Products(_) | Command::Product { .. } => EntityKind::Product,
    };
    let orchestrator =
        SyncOrchestrator::from_config(kind, &config).context("invalid configuration")?;

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current record");
            cancel.cancel();
        }
    });

    match &cli.command {
        Command::Orders(args) | Command::Products(args) => {
            let window = args.window(&config, Utc::now())?;
            let report = orchestrator.run(window, &args.filters()).await;
            println!("{}", report.summary);
            if let Some(e) = report.aborted {
                bail!("{kind} sync stopped early: {e}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Order { order_number: key } | Command::Product { sku: key } => {
            let outcome = orchestrator.sync_one(key).await;
            match outcome {
                SyncOutcome::Success(id) => {
                    info!(%kind, natural_key = key.as_str(), %id, "Done");
                    Ok(ExitCode::SUCCESS)
                }
                other => {
                    println!("{kind} {key}: {other}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mintbridge").chain(args.iter().copied())).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn orders_with_explicit_window() {
        let cli = parse(&[
            "orders",
            "--since",
            "2024-01-01T00:00:00Z",
            "--until",
            "2024-01-02T00:00:00Z",
            "--date-field",
            "updated",
            "--status",
            "released",
        ]);
        let Command::Orders(args) = &cli.command else {
            panic!("expected orders command");
        };
        let window = args.window(&cli.sync_config(), now()).unwrap();
        assert_eq!(window.span(), Duration::days(1));
        assert_eq!(args.filters(), ListFilters::default()
            .with_date_field(DateField::Updated)
            .with_status("released"));
    }

    #[test]
    fn since_without_until_ends_now() {
        let cli = parse(&["products", "--since", "2024-03-01T09:00:00Z"]);
        let Command::Products(args) = &cli.command else {
            panic!("expected products command");
        };
        let window = args.window(&cli.sync_config(), now()).unwrap();
        assert_eq!(window.until(), now());
        assert_eq!(window.span(), Duration::hours(3));
    }

    #[test]
    fn default_window_is_one_hour() {
        let cli = parse(&["orders"]);
        let Command::Orders(args) = &cli.command else {
            panic!("expected orders command");
        };
        let window = args.window(&cli.sync_config(), now()).unwrap();
        assert_eq!(window.span(), Duration::hours(1));
    }

    #[test]
    fn oversized_hours_is_an_error() {
        for hours in ["10000000000", "9223372036854775807"] {
            let cli = parse(&["orders", "--hours", hours]);
            let Command::Orders(args) = &cli.command else {
                panic!("expected orders command");
            };
            assert!(args.window(&cli.sync_config(), now()).is_err());
        }
    }

    #[test]
    fn hours_conflicts_with_since() {
        let result = Cli::try_parse_from([
            "mintbridge",
            "orders",
            "--hours",
            "2",
            "--since",
            "2024-01-01T00:00:00Z",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn inverted_window_is_rejected() {
        let cli = parse(&[
            "orders",
            "--since",
            "2024-01-02T00:00:00Z",
            "--until",
            "2024-01-01T00:00:00Z",
        ]);
        let Command::Orders(args) = &cli.command else {
            panic!("expected orders command");
        };
        assert!(args.window(&cli.sync_config(), now()).is_err());
    }

    #[test]
    fn flags_fill_sync_config() {
        let cli = parse(&[
            "order",
            "PO-1",
            "--dsco-auth-mode",
            "api-key",
            "--dsco-api-key",
            "k",
            "--mintsoft-username",
            "user",
            "--mintsoft-password",
            "pass",
            "--mintsoft-warehouse-id",
            "3",
            "--mintsoft-scan-lookups",
        ]);
        let config = cli.sync_config();

        assert_eq!(config.source.auth_mode, SourceAuthMode::ApiKey);
        assert_eq!(config.source.auth_url, "https://api.dsco.io/api/v3/oauth2/token");
        assert_eq!(config.mapping.warehouse_id, 3);
        assert!(!config.destination.index_lookups);
        config.validate().unwrap();
    }

    #[test]
    fn unknown_date_field_is_rejected() {
        let result = Cli::try_parse_from(["mintbridge", "orders", "--date-field", "shipped"]);
        assert!(result.is_err());
    }
}
