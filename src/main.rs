use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use futures::FutureExt;
use serde_json::json;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use upstream_scan::config::{ScanConfig, data_dir, load_config, log_file_name};
use upstream_scan::package::Package;
use upstream_scan::scan::{
    Dispatcher, HandlerRegistry, ScanReport, ScanRequest, create_default_registry,
    scan_packages_with_cancel,
};
use upstream_scan::version::error::ScanError;
use upstream_scan::version::fetcher::HttpFetcher;
use upstream_scan::version::options::ScanOptions;

#[derive(Parser)]
#[command(name = "upstream-scan")]
#[command(version, about = "Find upstream releases newer than the packaged version")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Also write JSON logs into the data directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan packages for newer upstream releases
    Scan {
        /// Packages as category/name-version[-rN]
        #[arg(required = true)]
        packages: Vec<String>,

        /// Known source URL of the packages (repeatable)
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Run only this handler, bypassing automatic selection
        #[arg(long)]
        handler: Option<String>,

        /// Handler-specific data, e.g. the upstream project name
        #[arg(long)]
        data: Option<String>,

        /// Version mangling rule (repeatable)
        #[arg(long = "version-mangle")]
        version_mangle: Vec<String>,

        /// Download URL mangling rule (repeatable)
        #[arg(long = "url-mangle")]
        url_mangle: Vec<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List handlers in scan order
    Handlers,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log_file)?;

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ScanConfig::default(),
    };

    let fetcher = Arc::new(
        HttpFetcher::new(&config.fetch.user_agent).context("Failed to build HTTP client")?,
    );
    let registry = Arc::new(create_default_registry(&config, fetcher)?);

    match cli.command {
        Command::Handlers => {
            print_handlers(&registry);
            Ok(())
        }
        Command::Scan {
            packages,
            urls,
            handler,
            data,
            version_mangle,
            url_mangle,
            format,
        } => {
            let options = ScanOptions::new(data, &version_mangle, &url_mangle)
                .map_err(ScanError::from)?;
            let requests = packages
                .iter()
                .map(|cpv| -> anyhow::Result<ScanRequest> {
                    let package = Package::from_cpv(cpv)?.with_urls(urls.iter().cloned());
                    let request = ScanRequest::new(package, options.clone());
                    Ok(match &handler {
                        Some(name) => request.forced(name.as_str()),
                        None => request,
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let dispatcher = Dispatcher::from_config(registry, &config);

            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(run_scan(&dispatcher, &requests, format))
        }
    }
}

fn init_logging(verbose: u8, log_file: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = match verbose {
        0 => "upstream_scan=warn",
        1 => "upstream_scan=info",
        _ => "upstream_scan=debug",
    };

    let (file_layer, guard) = if log_file {
        let dir = data_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {:?}", dir))?;
        let appender = tracing_appender::rolling::never(&dir, log_file_name());
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(fmt::layer().json().with_writer(writer)), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn run_scan(
    dispatcher: &Dispatcher,
    requests: &[ScanRequest],
    format: OutputFormat,
) -> anyhow::Result<()> {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        warn!("Interrupted, reporting partial results");
    }
    .shared();

    let results = scan_packages_with_cancel(dispatcher, requests, interrupt.clone()).await;

    let failed = results.iter().filter(|r| r.is_err()).count();

    match format {
        OutputFormat::Text => {
            for (request, result) in requests.iter().zip(&results) {
                print_text(&request.package, result);
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = requests
                .iter()
                .zip(&results)
                .map(|(request, result)| to_json(&request.package, result))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if interrupt.peek().is_some() {
        anyhow::bail!("Scan interrupted");
    }
    if failed > 0 {
        anyhow::bail!("{} of {} packages could not be scanned", failed, requests.len());
    }
    Ok(())
}

fn print_text(package: &Package, result: &Result<ScanReport, ScanError>) {
    println!("{}:", package);
    match result {
        Ok(report) => {
            if report.candidates.is_empty() {
                println!("  no newer upstream release");
            }
            for candidate in &report.candidates {
                println!(
                    "  {} [{} {}] {}",
                    candidate.version, candidate.handler, candidate.confidence, candidate.url
                );
            }
            for failure in &report.failures {
                println!("  ! {}: {}", failure.handler, failure.error);
            }
        }
        Err(e) => println!("  error: {}", e),
    }
}

fn to_json(package: &Package, result: &Result<ScanReport, ScanError>) -> serde_json::Value {
    match result {
        Ok(report) => json!({
            "package": package.to_string(),
            "candidates": report.candidates,
            "failures": report
                .failures
                .iter()
                .map(|f| json!({ "handler": f.handler, "error": f.error.to_string() }))
                .collect::<Vec<_>>(),
        }),
        Err(e) => json!({
            "package": package.to_string(),
            "error": e.to_string(),
        }),
    }
}

fn print_handlers(registry: &HandlerRegistry) {
    for handler in registry.handlers() {
        let descriptor = handler.descriptor();
        let mut modes = Vec::new();
        if descriptor.capabilities.by_url {
            modes.push("url");
        }
        if descriptor.capabilities.by_package {
            modes.push("package");
        }
        println!(
            "{:<10} priority={:<4} confidence={:<4} scans by {}",
            descriptor.name,
            descriptor.priority,
            descriptor.confidence,
            modes.join(", ")
        );
    }
}
