//! `aftermath` command-line entry point

use aftermath_analysis::CommandAnalyzer;
use aftermath_gateway::{http, AnalysisGateway, GatewayConfig};
use aftermath_session::{Reaper, SessionManager};
use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn cli() -> Command {
    let config = Arg::new("config")
        .long("config")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file");
    let storage_root = Arg::new("storage-root")
        .long("storage-root")
        .value_name("DIR")
        .value_parser(value_parser!(PathBuf))
        .help("Directory holding temporary artifacts");

    Command::new("aftermath")
        .version(aftermath_session::VERSION)
        .about("Before/after disaster damage analysis gateway")
        .subcommand_required(true)
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format"),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP gateway")
                .arg(config.clone())
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .value_name("ADDR")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Listen address"),
                )
                .arg(storage_root.clone()),
        )
        .subcommand(
            Command::new("purge")
                .about("Remove every artifact left in the storage root")
                .arg(config)
                .arg(storage_root),
        )
}

fn init_logging(format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
    .context("failed to install tracing subscriber")
}

/// File values first, then command-line overrides
fn load_config(args: &ArgMatches) -> Result<GatewayConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    if let Some(root) = args.get_one::<PathBuf>("storage-root") {
        config = config.with_storage_root(root.clone());
    }
    if let Ok(Some(bind)) = args.try_get_one::<SocketAddr>("bind") {
        config = config.with_bind(*bind);
    }
    Ok(config)
}

async fn serve(config: GatewayConfig) -> Result<()> {
    let sessions = SessionManager::open(&config.storage_root)
        .await
        .with_context(|| format!("failed to open {}", config.storage_root.display()))?;

    let leftovers = sessions.purge().await.context("startup purge failed")?;
    if leftovers > 0 {
        tracing::warn!(removed = leftovers, "removed artifacts left by a previous run");
    }

    let reaper = config.result_ttl().map(|ttl| {
        tracing::info!(ttl_secs = ttl.as_secs(), "result retention enabled");
        Reaper::new(sessions.clone(), ttl, config.sweep_interval()).spawn()
    });

    let analyzer = CommandAnalyzer::new(&config.analyzer.program)
        .with_args(config.analyzer.args.iter().cloned())
        .with_timeout(config.analyzer.timeout());
    tracing::info!(program = %analyzer.program().display(), "using external analyzer");

    let gateway = AnalysisGateway::new(sessions, Arc::new(analyzer));
    let routes = http::routes(gateway, &config);

    let (addr, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(config.bind, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for shutdown signal");
            }
        })
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(%addr, root = %config.storage_root.display(), "aftermath gateway listening");
    server.await;
    tracing::info!("shutting down");

    if let Some(reaper) = reaper {
        reaper.abort();
    }
    Ok(())
}

async fn purge(config: GatewayConfig) -> Result<()> {
    let sessions = SessionManager::open(&config.storage_root)
        .await
        .with_context(|| format!("failed to open {}", config.storage_root.display()))?;
    let removed = sessions.purge().await.context("purge failed")?;
    println!("removed {removed} artifact(s) from {}", config.storage_root.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let format = matches
        .get_one::<String>("log-format")
        .map_or("text", String::as_str);
    init_logging(format)?;

    match matches.subcommand() {
        Some(("serve", args)) => serve(load_config(args)?).await,
        Some(("purge", args)) => purge(load_config(args)?).await,
        _ => unreachable!("subcommand_required"),
    }
}
