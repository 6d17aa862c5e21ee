use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use backend_locator::config::{load_config, LocatorConfig};
use backend_locator::hint::{extract_hint, load_metadata, EnvironmentMetadata};
use backend_locator::locator::Locator;
use backend_locator::probe::HttpProber;
use backend_locator::session::{Route, Session};
use backend_locator::types::SubnetPrefix;
use backend_locator::{cache, server};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// backend-locator: find the study-coach backend on the local network.
#[derive(Debug, Parser)]
#[command(name = "backend-locator", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve the backend base URL from hints, probes and subnet scans.
    Locate(LocateArgs),
    /// Run a stand-in backend that answers GET /health.
    ServeHealth {
        /// Address to bind.
        #[arg(long, default_value = "0.0.0.0:8000")]
        bind: String,
        /// Service name reported by /health.
        #[arg(long, default_value = "study-coach")]
        service: String,
    },
}

#[derive(Debug, Args)]
struct LocateArgs {
    /// JSON file with the runtime's connection metadata (scriptURL, expoConfig.hostUri, ...).
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// A single URL the app was served from, e.g. http://192.168.1.55:8081. Overrides --metadata.
    #[arg(long = "hint-url")]
    hint_url: Option<String>,

    /// Skip discovery and use this base URL (must start with http:// or https://).
    #[arg(long = "override")]
    override_url: Option<String>,

    /// TOML config file with discovery settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend port probed at every candidate.
    #[arg(long)]
    port: Option<u16>,

    /// Per-probe timeout in milliseconds.
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// Concurrent probes per batch.
    #[arg(long = "batch-size")]
    batch_size: Option<usize>,

    /// Extra /24 prefix (a.b.c) to try during a blind scan; repeatable, tried in order.
    #[arg(long = "prefix")]
    prefixes: Vec<SubnetPrefix>,

    /// Scan this host's own interface subnets before the common ones.
    #[arg(long = "include-local-subnets", default_value_t = false)]
    include_local_subnets: bool,

    /// Remember the resolved URL here and reuse it while it stays healthy.
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Print the result as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl LocateArgs {
    fn apply_to(&self, cfg: &mut LocatorConfig) {
        if let Some(p) = self.port {
            cfg.port = p;
        }
        if let Some(t) = self.timeout_ms {
            cfg.probe_timeout_ms = t;
        }
        if let Some(b) = self.batch_size {
            cfg.batch_size = b;
        }
        if !self.prefixes.is_empty() {
            let mut merged = self.prefixes.clone();
            merged.extend(cfg.common_prefixes.iter().filter(|p| !self.prefixes.contains(p)));
            cfg.common_prefixes = merged;
        }
        if self.include_local_subnets {
            cfg.include_local_subnets = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Locate(args) => locate(args).await,
        Command::ServeHealth { bind, service } => {
            tokio::select! {
                res = server::spawn_server(&bind, &service) => res?,
                _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn locate(args: LocateArgs) -> Result<ExitCode> {
    let mut cfg = load_config(args.config.as_deref())?;
    args.apply_to(&mut cfg);
    cfg.validate()?;

    let mut session = Session::new();

    if let Some(raw) = args.override_url.as_deref() {
        session.set_override(raw)?;
        report(&session, &args, None);
        return Ok(ExitCode::SUCCESS);
    }

    let prober = HttpProber::from_config(&cfg)?;

    if let Some(path) = args.cache.as_deref() {
        if let Some(cached) = cache::load(path) {
            if prober.check_url(&cached.base_url).await {
                tracing::info!(url = %cached.base_url, "cached backend is healthy; skipping discovery");
                session.restore(cached.base_url);
                report(&session, &args, None);
                return Ok(ExitCode::SUCCESS);
            }
            tracing::info!(url = %cached.base_url, "cached backend unreachable; rediscovering");
        }
    }

    let meta = match (&args.hint_url, &args.metadata) {
        (Some(url), _) => EnvironmentMetadata::from_script_url(url.clone()),
        (None, Some(path)) => load_metadata(path)?,
        (None, None) => EnvironmentMetadata::default(),
    };
    let hint = extract_hint(&meta);

    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    let locator = Locator::new(Arc::new(prober), cfg.clone()).with_cancel(cancel);
    tracing::debug!(
        worst_case_ms = cfg.worst_case(locator.blind_prefixes().len()).as_millis() as u64,
        "discovery budget"
    );

    match locator.resolve(&meta).await {
        Some(resolution) => {
            let url = session.apply(&resolution, cfg.port).clone();
            if let Some(path) = args.cache.as_deref() {
                if resolution.strategy.is_verified() {
                    if let Err(e) = cache::store(path, &url) {
                        tracing::warn!(error = %e, "failed to write backend cache");
                    }
                }
            }
            report(&session, &args, hint.map(|h| h.to_string()));
            Ok(ExitCode::SUCCESS)
        }
        None => {
            if args.json {
                println!("{}", serde_json::json!({ "resolved": false }));
            } else {
                eprintln!("Backend not found. Enter the server URL manually with --override http://<host>:<port>.");
            }
            Ok(ExitCode::from(2))
        }
    }
}

fn report(session: &Session, args: &LocateArgs, hint: Option<String>) {
    let Some(url) = session.base_url() else {
        return;
    };
    if args.json {
        let out = serde_json::json!({
            "resolved": true,
            "base_url": url,
            "source": session.source(),
            "verified": session.is_verified(),
            "hint": hint,
        });
        println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
        return;
    }

    println!("backend      : {url}");
    if let Some(source) = session.source() {
        println!("source       : {}", serde_json::to_string(&source).unwrap_or_default());
    }
    println!("hint         : {}", hint.as_deref().unwrap_or("<none>"));
    if !session.is_verified() {
        println!("warning      : health probe never succeeded; this address is a best guess");
    }
    for route in [Route::Scan, Route::GenerateQuiz, Route::Summary, Route::GenerateFlashcards] {
        println!("  {}", url.join(route));
    }
}
