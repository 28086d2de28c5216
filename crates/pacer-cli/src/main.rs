use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use clap::Parser;
use serde::Serialize;
use tokio::time::{Duration, Instant, sleep};
use tracing::{error, info};

use pacer_core::{
    Action, CacheStats, CachedFetcher, ComputeCache, ComputeError, InMemoryCacheStore,
    PacerConfig, RunReport, Scheduler, TaskContext, TaskError, Transport,
};

/// Run a paced, cached batch of calls against a simulated rate-limited API.
#[derive(Debug, Parser)]
#[command(name = "pacer", version)]
struct Cli {
    /// Calls per pass.
    #[arg(long, default_value_t = 5)]
    tasks: u32,

    /// Inter-task delay in milliseconds; overrides the config file.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// JSON config file (see `PacerConfig`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Transient failures the simulated API returns before it starts answering.
    #[arg(long, default_value_t = 2)]
    failures: u32,

    /// Simulated latency of one remote call, in milliseconds.
    #[arg(long, default_value_t = 40)]
    latency_ms: u64,
}

/// Stand-in for a rate-limited HTTP API.
struct SimulatedApi {
    latency: Duration,
    remaining_failures: AtomicU32,
    calls: AtomicU32,
}

impl SimulatedApi {
    fn new(latency: Duration, failures: u32) -> Self {
        Self {
            latency,
            remaining_failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    async fn answer(&self, url: &str) -> Result<Option<String>, ComputeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        sleep(self.latency).await;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(std::io::Error::other(format!("connection reset (left={left})")).into());
        }

        let height = url.rsplit('/').next().unwrap_or_default();
        Ok(Some(format!(r#"{{"height":"{height}","status":"0x1"}}"#)))
    }
}

#[async_trait]
impl Transport for SimulatedApi {
    async fn get(&self, url: &str) -> Result<Option<String>, ComputeError> {
        self.answer(url).await
    }

    async fn post(&self, url: &str, _body: &str) -> Result<Option<String>, ComputeError> {
        self.answer(url).await
    }
}

#[derive(Debug, Serialize)]
struct PassSummary {
    pass: u32,
    elapsed_ms: u64,
    report: RunReport,
}

#[derive(Debug, Serialize)]
struct Summary {
    passes: Vec<PassSummary>,
    cache: CacheStats,
    remote_calls: u32,
}

async fn run_pass(
    pass: u32,
    cli: &Cli,
    config: &PacerConfig,
    fetcher: &Arc<CachedFetcher<SimulatedApi>>,
) -> Result<PassSummary, pacer_core::SchedulerError> {
    let ctx = Arc::new(TaskContext::new(pass));
    let mut scheduler = Scheduler::with_context(config.scheduler.clone(), Arc::clone(&ctx));
    scheduler.add_track(format!("pass-{pass}"));

    for height in 0..cli.tasks {
        let fetcher = Arc::clone(fetcher);
        let url = format!("https://api.example/blocks/{height}");
        scheduler.add_fn(move |ctx: Arc<TaskContext<u32>>| async move {
            let envelope = fetcher.get(&url).await?;
            info!(
                pass = *ctx.data(),
                index = ctx.index(),
                size = ctx.size(),
                cache_hit = envelope.is_cache_hit(),
                "fetched {url}"
            );
            Ok::<Action, TaskError>(envelope.hint())
        });
    }

    let started = Instant::now();
    let report = scheduler.run().await?;
    Ok(PassSummary {
        pass,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        report,
    })
}

async fn run(cli: Cli) -> Result<Summary, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PacerConfig::from_path(path)?,
        None => PacerConfig::default(),
    };
    if let Some(delay_ms) = cli.delay_ms {
        config.scheduler.task_delay_ms = delay_ms;
    }

    let store = Arc::new(InMemoryCacheStore::new());
    let cache = Arc::new(ComputeCache::new(store, config.cache.clone()));
    let api = SimulatedApi::new(Duration::from_millis(cli.latency_ms), cli.failures);
    let fetcher = Arc::new(CachedFetcher::new(Arc::clone(&cache), api));

    // second pass is served from the cache and runs unpaced
    let mut passes = Vec::with_capacity(2);
    for pass in 1..=2 {
        passes.push(run_pass(pass, &cli, &config, &fetcher).await?);
    }

    Ok(Summary {
        passes,
        cache: cache.stats(),
        remote_calls: fetcher.transport().calls.load(Ordering::Relaxed),
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(?cli, "starting pacer demo");

    match run(cli).await {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!(error = %e, "failed to render summary");
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!(error = %e, "pacer run failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
