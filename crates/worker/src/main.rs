//! Batch image generation from a JSON-lines file.

mod input;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use imagegen_core::types::Credits;
use imagegen_core::{Archetype, ImageGenerator, SessionContext};
use imagegen_events::{EventBus, EventEnvelope, GenerationEvent};
use imagegen_pipeline::{CreditBudget, ImagePipeline, PipelineConfig};
use imagegen_store::{
    DynHistoryStore, DynRecordStore, JsonFileHistoryStore, MemoryHistoryStore, RecordStore,
    RestRecordStore, RestStoreConfig,
};
use imagegen_webhook::{WebhookClient, WebhookConfig};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Generate blog featured images or infographics for every item in a
/// JSON-lines file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON-lines file, one `{"title", "content", "style", "colour"}` per line
    #[arg(short, long)]
    input: PathBuf,

    /// Image archetype: featured-image or infographic
    #[arg(short, long, default_value = "featured-image")]
    archetype: Archetype,

    /// Maximum requests in flight (overrides BATCH_CONCURRENCY)
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Spend at most this many credits
    #[arg(short, long)]
    budget: Option<Credits>,

    /// Directory generated images are written to
    #[arg(short, long, default_value = "generated")]
    out: PathBuf,

    /// JSON file to keep generation history in (in-memory when omitted)
    #[arg(long)]
    history: Option<PathBuf>,

    /// Backend user to charge; requires SUPABASE_URL and SUPABASE_ANON_KEY
    #[arg(long, env = "IMAGEGEN_USER_ID")]
    user_id: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "imagegen_worker=info,imagegen_pipeline=info".into());
    if args.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // -- Configuration --

    let webhook_config = WebhookConfig::from_env().context("webhook configuration")?;
    let mut pipeline_config = PipelineConfig::from_env().context("pipeline configuration")?;
    if let Some(concurrency) = args.concurrency {
        pipeline_config = pipeline_config.with_concurrency(concurrency);
    }
    pipeline_config = pipeline_config.with_call_timeout(webhook_config.timeout);

    // -- Collaborators --

    let generator: Arc<dyn ImageGenerator> = Arc::new(WebhookClient::new(webhook_config)?);

    let records: Option<DynRecordStore> = match RestStoreConfig::from_env()? {
        Some(config) => Some(Arc::new(RestRecordStore::new(config)?)),
        None => None,
    };

    let history: DynHistoryStore = match &args.history {
        Some(path) => Arc::new(JsonFileHistoryStore::open(path).await?),
        None => Arc::new(MemoryHistoryStore::new()),
    };

    let ctx = resolve_session(args.user_id.as_deref(), records.as_deref()).await?;

    let events = Arc::new(EventBus::default());
    let pipeline = ImagePipeline::new(
        generator,
        records,
        history,
        Arc::clone(&events),
        pipeline_config,
    );

    // -- Batch --

    let items = input::read_items(&args.input, args.archetype).await?;
    let mut budget = CreditBudget::for_session(&ctx);
    if let Some(cap) = args.budget {
        budget = budget.capped(cap);
    }

    tracing::info!(
        items = items.len(),
        archetype = %args.archetype,
        concurrency = pipeline.config().concurrency,
        budget = ?budget.remaining(),
        metered = ctx.is_metered(),
        "Starting batch",
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    tokio::spawn(log_progress(events.subscribe()));

    let job = pipeline.run_batch(&ctx, items, budget, &cancel).await?;

    // -- Output --

    let history = match pipeline.history().await {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read history; using generated filenames");
            Vec::new()
        }
    };
    let written = output::write_images(&job, &history, &args.out).await?;

    tracing::info!(
        batch_id = %job.id,
        "{}/{} completed, {} succeeded, {} failed{}",
        job.completed,
        job.total,
        job.succeeded(),
        job.failed(),
        if job.cancelled { " (cancelled)" } else { "" },
    );
    for (kind, count) in job.failure_counts() {
        tracing::info!(kind, count, "Failures");
    }
    if job.credits_spent() > 0 {
        tracing::info!(credits_spent = job.credits_spent(), "Credits charged");
    }
    tracing::info!(files = written.len(), out = %args.out.display(), "Images written");

    Ok(())
}

/// Metered session for `user_id` when a backend is configured, anonymous
/// otherwise.
async fn resolve_session(
    user_id: Option<&str>,
    records: Option<&dyn RecordStore>,
) -> anyhow::Result<SessionContext> {
    match (user_id, records) {
        (Some(user_id), Some(store)) => {
            let credits = store
                .get_credits(user_id)
                .await
                .with_context(|| format!("loading credits for {user_id}"))?;
            tracing::info!(user_id, credits, "Signed in");
            Ok(SessionContext::authenticated(user_id, credits))
        }
        (Some(user_id), None) => {
            tracing::warn!(user_id, "No backend configured; running unmetered");
            Ok(SessionContext::Anonymous)
        }
        (None, _) => Ok(SessionContext::Anonymous),
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("Received SIGINT (Ctrl-C), cancelling batch"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install Ctrl-C handler");
                    return;
                }
            }
            cancel.cancel();
        }
        () = cancel.cancelled() => {}
    }
}

async fn log_progress(mut rx: broadcast::Receiver<EventEnvelope>) {
    loop {
        let envelope = match rx.recv().await {
            Ok(envelope) => envelope,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress logger lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if let GenerationEvent::ItemCompleted {
            index,
            completed,
            total,
            failure,
            ..
        } = envelope.event
        {
            match failure {
                None => tracing::info!(index, "Progress {completed}/{total}"),
                Some(kind) => {
                    tracing::warn!(index, kind = kind.label(), "Progress {completed}/{total}")
                }
            }
        }
    }
}
