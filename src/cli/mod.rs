//! CLI entry points for the process roles.
//!
//! Each role (API, scheduler, workers) is a subcommand of the one binary,
//! sharing the store and queue through the database URL. `all` runs every
//! role in a single process for demos and local development.

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Settings;
use crate::fetch::{ContentFetcher, DemoFetcher, FetchRouter, ScraperClient};
use crate::mail::{AlertMailer, MailClient, RecordingMailer};
use crate::pdf::{ParserClient, PdfParser, StubPdfParser};
use crate::queue::{JobQueue, WorkerPool};
use crate::repository::DbContext;
use crate::scheduler::Scheduler;
use crate::server::{self, AppState};
use crate::services::{
    AlertService, CrawlService, CrawlWorkerHandler, EvidenceService, EvidenceWorkerHandler,
};

#[derive(Parser)]
#[command(name = "trustwatch")]
#[command(about = "Vendor trust-page monitoring: crawl, diff, alert")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and exit
    Init,

    /// Run the API server
    Api {
        /// Bind host (overrides API_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides API_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run the periodic scheduler
    Scheduler,

    /// Force one scheduler pass, bypassing the cron cadence (not the lock)
    Tick,

    /// Run a worker process
    Worker {
        /// Worker class to run
        #[arg(long, value_enum, default_value_t = WorkerKind::Crawl)]
        kind: WorkerKind,
        /// Concurrent jobs (overrides the per-class default)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Run every role in one process
    All {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WorkerKind {
    /// Fetch, diff, and alert (consumes crawl_target + send_alert_email)
    Crawl,
    /// Parse PDF artefacts (consumes process_evidence)
    Evidence,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env();

    let ctx = DbContext::new(&settings.database_path());
    // Schema creation is idempotent; every role ensures it on startup.
    ctx.init_schema().await?;

    match cli.command {
        Commands::Init => {
            info!(database = %settings.database_url, "schema initialized");
            Ok(())
        }
        Commands::Api { host, port } => {
            let state = AppState::new(&ctx);
            let host = host.unwrap_or_else(|| settings.api_host.clone());
            let port = port.unwrap_or(settings.api_port);
            server::serve(state, &host, port).await
        }
        Commands::Scheduler => {
            let scheduler = build_scheduler(&ctx);
            scheduler
                .run(&settings.crawl_schedule, shutdown_token())
                .await
        }
        Commands::Tick => {
            let scheduler = build_scheduler(&ctx);
            if scheduler.tick_once().await? {
                info!("tick complete");
            } else {
                info!("tick skipped: another replica holds the lock");
            }
            Ok(())
        }
        Commands::Worker { kind, concurrency } => {
            let pool = match kind {
                WorkerKind::Crawl => build_crawl_pool(&settings, &ctx, concurrency),
                WorkerKind::Evidence => build_evidence_pool(&settings, &ctx, concurrency),
            };
            pool.run(shutdown_token()).await
        }
        Commands::All { host, port } => {
            let shutdown = shutdown_token();
            let state = AppState::new(&ctx);
            let host = host.unwrap_or_else(|| settings.api_host.clone());
            let port = port.unwrap_or(settings.api_port);

            let scheduler = build_scheduler(&ctx);
            let schedule = settings.crawl_schedule.clone();
            let crawl_pool = build_crawl_pool(&settings, &ctx, None);
            let evidence_pool = build_evidence_pool(&settings, &ctx, None);

            tokio::select! {
                result = server::serve(state, &host, port) => result,
                result = scheduler.run(&schedule, shutdown.clone()) => result,
                result = crawl_pool.run(shutdown.clone()) => result,
                result = evidence_pool.run(shutdown.clone()) => result,
            }
        }
    }
}

fn build_scheduler(ctx: &DbContext) -> Scheduler {
    Scheduler::new(
        ctx.companies(),
        ctx.crawl(),
        ctx.locks(),
        JobQueue::new(ctx.pool().clone()),
    )
}

fn build_fetcher(settings: &Settings) -> Arc<dyn ContentFetcher> {
    let real = Arc::new(ScraperClient::new(&settings.scraper_url));
    let demo = settings
        .demo_mode
        .then(|| Arc::new(DemoFetcher::with_builtin_site()));
    Arc::new(FetchRouter::new(real, demo))
}

fn build_mailer(settings: &Settings) -> Arc<dyn AlertMailer> {
    if settings.demo_mode {
        Arc::new(RecordingMailer::new())
    } else {
        Arc::new(MailClient::new(
            &settings.mail_api_url,
            &settings.mail_api_key,
            &settings.mail_from,
        ))
    }
}

fn build_pdf_parser(settings: &Settings) -> Arc<dyn PdfParser> {
    if settings.demo_mode {
        Arc::new(StubPdfParser::new())
    } else {
        Arc::new(ParserClient::new(&settings.pdf_parser_url))
    }
}

fn build_crawl_pool(settings: &Settings, ctx: &DbContext, concurrency: Option<usize>) -> WorkerPool {
    let queue = JobQueue::new(ctx.pool().clone());
    let crawl = Arc::new(CrawlService::new(
        ctx.companies(),
        ctx.crawl(),
        ctx.claims(),
        ctx.events(),
        ctx.evidence(),
        queue.clone(),
        build_fetcher(settings),
    ));
    let alerts = Arc::new(AlertService::new(
        ctx.events(),
        ctx.companies(),
        build_mailer(settings),
    ));
    WorkerPool::new(
        queue,
        Arc::new(CrawlWorkerHandler::new(crawl, alerts)),
        concurrency.unwrap_or(settings.crawl_concurrency),
    )
}

fn build_evidence_pool(
    settings: &Settings,
    ctx: &DbContext,
    concurrency: Option<usize>,
) -> WorkerPool {
    let queue = JobQueue::new(ctx.pool().clone());
    let service = Arc::new(EvidenceService::new(
        ctx.evidence(),
        build_pdf_parser(settings),
    ));
    WorkerPool::new(
        queue,
        Arc::new(EvidenceWorkerHandler::new(service)),
        concurrency.unwrap_or(settings.evidence_concurrency),
    )
}

/// Token cancelled on SIGINT/SIGTERM. Workers stop claiming and let
/// in-flight jobs finish.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        info!("shutdown signal received");
        trigger.cancel();
    });
    token
}
