//! Vigil CLI - one-shot health checks over the configured probe catalog

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tabled::{Table, Tabled};

use vigil_core::application::{HealthExecutor, RegistrationTable};
use vigil_core::domain::{HealthStatus, Predicate, RegistrationFilter, Report};
use vigil_core::CancellationToken;
use vigil_infra_system::{Catalog, ProbeKind, ProbeSpec, Settings};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil health check CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML/JSON/YAML)
    #[arg(long, global = true, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured probes once and print the report
    Check {
        /// Only probes having any of these tags (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,

        /// Only probes with these names (repeatable, case-insensitive)
        #[arg(short, long)]
        name: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Abort the whole run after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// List the configured probes
    List,
}

#[derive(Tabled)]
struct CheckRow {
    name: String,
    status: String,
    elapsed_ms: u64,
    description: String,
    tags: String,
}

#[derive(Tabled)]
struct ProbeRow {
    name: String,
    kind: &'static str,
    timeout_ms: u64,
    severity: String,
    tags: String,
}

fn kind_name(kind: &ProbeKind) -> &'static str {
    match kind {
        ProbeKind::Tcp { .. } => "tcp",
        ProbeKind::Http { .. } => "http",
        ProbeKind::Command { .. } => "command",
        ProbeKind::Cpu { .. } => "cpu",
        ProbeKind::Memory { .. } => "memory",
        ProbeKind::Disk { .. } => "disk",
    }
}

fn colored_status(status: HealthStatus) -> colored::ColoredString {
    match status {
        HealthStatus::Healthy => status.to_string().green().bold(),
        HealthStatus::Degraded => status.to_string().yellow().bold(),
        HealthStatus::Unhealthy => status.to_string().red().bold(),
    }
}

fn build_predicate(tags: Vec<String>, names: Vec<String>) -> Option<Predicate> {
    match (tags.is_empty(), names.is_empty()) {
        (true, true) => None,
        (false, true) => Some(RegistrationFilter::with_any_tag(tags)),
        (true, false) => Some(RegistrationFilter::named(names)),
        (false, false) => Some(RegistrationFilter::and(
            RegistrationFilter::with_any_tag(tags),
            RegistrationFilter::named(names),
        )),
    }
}

async fn run_check(
    table: &RegistrationTable,
    predicate: Option<&Predicate>,
    timeout: Option<Duration>,
) -> Result<Report> {
    let executor = HealthExecutor::default();
    let cancel = CancellationToken::new();

    if let Some(timeout) = timeout {
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            token.cancel();
        });
    }

    match executor.check(table, predicate, &cancel).await {
        Ok(report) => Ok(report),
        Err(e) if e.is_cancelled() => anyhow::bail!("Health check aborted after the run timeout"),
        Err(e) => Err(e).context("Health check failed"),
    }
}

fn print_report(report: &Report) {
    let rows: Vec<CheckRow> = report
        .entries()
        .iter()
        .map(|(name, entry)| CheckRow {
            name: name.clone(),
            status: entry.status().to_string(),
            elapsed_ms: entry.outcome.elapsed.as_millis() as u64,
            description: entry.outcome.description.clone(),
            tags: entry.tags.iter().cloned().collect::<Vec<_>>().join(","),
        })
        .collect();

    println!(
        "{} {}",
        "Overall:".bold(),
        colored_status(report.status())
    );
    println!(
        "  {} {}  {} {}ms",
        "Run:".bold(),
        report.run_id(),
        "Elapsed:".bold(),
        report.total_elapsed().as_millis()
    );
    println!();

    if rows.is_empty() {
        println!("{}", "No probes selected".yellow());
    } else {
        println!("{}", Table::new(rows));
    }
}

fn print_catalog(specs: &[ProbeSpec]) {
    if specs.is_empty() {
        println!("{}", "No probes configured".yellow());
        return;
    }

    let rows: Vec<ProbeRow> = specs
        .iter()
        .map(|spec| ProbeRow {
            name: spec.name.clone(),
            kind: kind_name(&spec.kind),
            timeout_ms: spec.timeout_ms,
            severity: format!("{:?}", spec.failure_severity).to_lowercase(),
            tags: spec.tags.join(","),
        })
        .collect();

    println!("{}", format!("{} probe(s) configured", specs.len()).cyan().bold());
    println!();
    println!("{}", Table::new(rows));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Commands::Check {
            tag,
            name,
            json,
            timeout_ms,
        } => {
            let table = Catalog::new()
                .build_registry(&settings.probes)
                .context("Failed to build probe registry")?;
            let predicate = build_predicate(tag, name);

            let report = run_check(&table, predicate.as_ref(), timeout_ms.map(Duration::from_millis)).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }

            if report.status() == HealthStatus::Unhealthy {
                std::process::exit(1);
            }
        }

        Commands::List => print_catalog(&settings.probes),
    }

    Ok(())
}
