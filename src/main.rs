//! Babycare KPI CLI
//!
//! Derives dashboard KPIs from an infant-care event log.

use babycare_kpi::{
    config::Config,
    core::{KpiEngine, KpiPayload},
    diagnostics::{create_shared_log, SharedSourceLog},
    source::{CachedSource, EventSource, MemorySource, RestEventSource},
    PROMPT_GUIDANCE, VERSION,
};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser)]
#[command(name = "babycare-kpi")]
#[command(version = VERSION)]
#[command(about = "KPI snapshots for an infant-care log", long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Settings that override the config file for one run.
#[derive(Args)]
struct Overrides {
    /// Event store base URL
    #[arg(long, global = true)]
    store_url: Option<String>,

    /// Event store API key
    #[arg(long, global = true, env = "BABYCARE_API_KEY")]
    api_key: Option<String>,

    /// Display timezone (IANA name)
    #[arg(long, global = true)]
    timezone: Option<String>,

    /// Use generated sample data instead of the event store
    #[arg(long, global = true)]
    demo: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one KPI snapshot as JSON
    Snapshot {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,

        /// Append prompt guidance after the payload
        #[arg(long)]
        with_guidance: bool,
    },

    /// Rebuild the snapshot periodically until Ctrl+C
    Watch {
        /// Refresh interval in seconds
        #[arg(long, default_value = "60")]
        interval: u64,
    },

    /// Show the latest logged events
    Recent,

    /// Test the event store connection
    Check,

    /// Show configuration
    Config,

    /// Serve KPIs over HTTP (requires server feature)
    Serve {
        /// Port to bind (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli.overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    let demo = cli.overrides.demo;
    let result = runtime.block_on(async move {
        match cli.command {
            Commands::Snapshot {
                pretty,
                with_guidance,
            } => cmd_snapshot(&config, demo, pretty, with_guidance).await,
            Commands::Watch { interval } => cmd_watch(&config, demo, interval).await,
            Commands::Recent => cmd_recent(&config, demo).await,
            Commands::Check => cmd_check(&config).await,
            Commands::Config => {
                cmd_config(&config);
                Ok(())
            }
            Commands::Serve { port } => cmd_serve(&config, demo, port).await,
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(overrides: &Overrides) -> anyhow::Result<Config> {
    let mut config = Config::load()?;

    if let Some(url) = &overrides.store_url {
        config.store.base_url = url.clone();
    }
    if let Some(key) = &overrides.api_key {
        config.store.api_key = key.clone();
    }
    if let Some(tz) = &overrides.timezone {
        config.timezone = tz.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Build an engine over the configured store, or over sample data.
fn build_engine(config: &Config, demo: bool) -> anyhow::Result<(KpiEngine, SharedSourceLog)> {
    let settings = config.engine_settings()?;
    let log = create_shared_log();

    let source: Arc<dyn EventSource> = if demo {
        let sample = MemorySource::sample(Utc::now(), settings.timezone);
        tracing::info!(events = sample.events().len(), "using sample data");
        Arc::new(CachedSource::new(sample, config.cache_ttl()).with_log(log.clone()))
    } else {
        let rest = RestEventSource::new(config.store.clone())?;
        Arc::new(CachedSource::new(rest, config.cache_ttl()).with_log(log.clone()))
    };

    let engine = KpiEngine::new(source, settings).with_log(log.clone());
    Ok((engine, log))
}

fn render(payload: &KpiPayload, pretty: bool) -> anyhow::Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(payload)?
    } else {
        serde_json::to_string(payload)?
    })
}

async fn cmd_snapshot(
    config: &Config,
    demo: bool,
    pretty: bool,
    with_guidance: bool,
) -> anyhow::Result<()> {
    let (engine, log) = build_engine(config, demo)?;
    let payload = engine.snapshot().await;

    println!("{}", render(&payload, pretty)?);
    if with_guidance {
        println!();
        println!("{PROMPT_GUIDANCE}");
    }

    let stats = log.stats();
    if stats.failures > 0 {
        eprintln!();
        eprintln!("{}", log.summary());
    }
    Ok(())
}

async fn cmd_watch(config: &Config, demo: bool, interval: u64) -> anyhow::Result<()> {
    let (engine, log) = build_engine(config, demo)?;

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    println!("Babycare KPI v{VERSION}");
    println!("Refreshing every {}s. Press Ctrl+C to stop", interval.max(1));
    println!();

    while running.load(Ordering::SeqCst) {
        let payload = engine.snapshot().await;
        print_dashboard(&payload);

        // Sleep in short steps so Ctrl+C is noticed promptly
        let mut waited = Duration::ZERO;
        let target = Duration::from_secs(interval.max(1));
        while waited < target && running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(200)).await;
            waited += Duration::from_millis(200);
        }
    }

    println!();
    println!("{}", log.summary());
    Ok(())
}

fn print_dashboard(payload: &KpiPayload) {
    println!("[{}] {} ({})", Utc::now().format("%H:%M:%S"), payload.as_of, payload.timezone);

    for (name, kpi) in [
        ("おむつ", &payload.elapsed.diaper),
        ("授乳", &payload.elapsed.feeding),
    ] {
        if kpi.has_data {
            println!("  {name}: {}分前 ({})", kpi.minutes, kpi.bucket.as_str());
        } else {
            println!("  {name}: 記録なし");
        }
    }

    for (name, metric) in [
        ("睡眠", &payload.sleep),
        ("授乳量", &payload.feeding),
        ("おむつ替え", &payload.diaper_changes),
    ] {
        println!(
            "  {name}: 今週平均 {:.1}{} / 先週平均 {:.1}{} / {} / {}",
            metric.this_week_average,
            metric.label_unit,
            metric.previous_week_average,
            metric.label_unit,
            metric.qualitative.variability,
            metric.qualitative.trend,
        );
    }
    println!();
}

async fn cmd_recent(config: &Config, demo: bool) -> anyhow::Result<()> {
    let (engine, log) = build_engine(config, demo)?;
    let entries = engine.recent_log().await;

    if entries.is_empty() {
        println!("No events logged.");
    }
    for entry in &entries {
        println!("{}  {}", entry.time, entry.action);
    }

    if log.stats().failures > 0 {
        eprintln!();
        eprintln!("{}", log.summary());
    }
    Ok(())
}

async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    println!("Event store: {}", config.store.rest_url());
    println!("Table: {}", config.store.table);

    let client = RestEventSource::new(config.store.clone())?;
    match client.test_connection().await {
        Ok(true) => println!("Connection: OK"),
        Ok(false) => {
            println!("Connection: store answered with an error status");
            std::process::exit(2);
        }
        Err(e) => {
            println!("Connection: failed ({e})");
            std::process::exit(2);
        }
    }
    Ok(())
}

fn cmd_config(config: &Config) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();

    // Never echo the API key
    let mut shown = config.clone();
    if !shown.store.api_key.is_empty() {
        shown.store.api_key = "********".to_string();
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&shown).unwrap_or_else(|_| "Error".to_string())
    );
}

#[cfg(feature = "server")]
async fn cmd_serve(config: &Config, demo: bool, port: Option<u16>) -> anyhow::Result<()> {
    use babycare_kpi::server::{self, ServerConfig};

    let (engine, log) = build_engine(config, demo)?;
    let server_config = ServerConfig::new(port.unwrap_or(config.server_port));
    let (addr, shutdown) = server::run(server_config, Arc::new(engine)).await?;

    println!("Serving KPIs on http://{addr}");
    println!("Press Ctrl+C to stop");

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let _ = shutdown.send(());
    println!();
    println!("{}", log.summary());
    Ok(())
}

#[cfg(not(feature = "server"))]
async fn cmd_serve(_config: &Config, _demo: bool, _port: Option<u16>) -> anyhow::Result<()> {
    anyhow::bail!("serve requires the server feature (rebuild with --features server)")
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: could not set Ctrl+C handler: {e}");
    }
}
