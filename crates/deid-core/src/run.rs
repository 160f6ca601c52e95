//! One orchestrator run over a folder range.
//!
//! Order: parse and validate everything, build work items, dispatch, note
//! the summary, optionally collect results, flush the recorder. Nothing is
//! submitted if any input is invalid.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;

use crate::config::DeidConfig;
use crate::dispatcher::{DispatchMode, DispatchOptions, DispatchSummary, Dispatcher};
use crate::error::DeidError;
use crate::job::{HandleGenerator, OutcomeRecord, StorageLayout, WorkItem};
use crate::logging;
use crate::range::FolderRange;
use crate::recorder::{LogNames, OutcomeRecorder};
use crate::service::{DeidClient, JobService};
use crate::sink::{BlobSink, FileSink, LogSink, SinkKind};
use crate::storage::{BlobStore, ObjectStore};
use crate::transfer::{self, TransferReport};

/// Per-run inputs; `None` fields fall back to the config file.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub range: String,
    pub mode: Option<DispatchMode>,
    pub concurrency: Option<usize>,
    pub poll_interval: Option<Duration>,
    pub max_wait: Option<Duration>,
    /// Download succeeded folders here after dispatch.
    pub collect_to: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub range: FolderRange,
    pub records: Vec<OutcomeRecord>,
    pub summary: DispatchSummary,
    /// Most jobs observed in flight at once.
    pub peak_in_flight: usize,
    pub collected: Option<TransferReport>,
}

/// External collaborators of a run.
pub struct RunContext {
    pub service: Arc<dyn JobService>,
    pub sink: Arc<dyn LogSink>,
    /// Target container, used when collecting results.
    pub target_store: Arc<dyn ObjectStore>,
    pub handles: HandleGenerator,
}

impl RunContext {
    /// Curl-backed service, sink and target store from config and environment.
    pub fn from_config(cfg: &DeidConfig) -> Result<Self, DeidError> {
        let target_store: Arc<dyn ObjectStore> = Arc::new(
            BlobStore::from_env(&cfg.storage.target_url, &cfg.storage.sas_env)
                .map_err(|e| DeidError::Configuration(format!("{e:#}")))?,
        );
        let sink: Arc<dyn LogSink> = match cfg.sink.kind {
            SinkKind::File => {
                let dir = match &cfg.sink.dir {
                    Some(dir) => dir.clone(),
                    None => logging::state_dir()
                        .map_err(|e| DeidError::Configuration(format!("{e:#}")))?,
                };
                Arc::new(FileSink::new(dir))
            }
            SinkKind::Blob => Arc::new(BlobSink::new(
                Arc::clone(&target_store),
                &cfg.sink.blob_prefix,
            )),
        };
        Ok(Self {
            service: Arc::new(DeidClient::from_config(&cfg.service)),
            sink,
            target_store,
            handles: HandleGenerator::new(),
        })
    }
}

fn options_for(cfg: &DeidConfig, req: &RunRequest) -> Result<DispatchOptions, DeidError> {
    let mut opts = DispatchOptions::from_config(&cfg.dispatch, &cfg.service.operation);
    if let Some(mode) = req.mode {
        opts.mode = mode;
    }
    if let Some(n) = req.concurrency {
        opts.concurrency = n;
    }
    if let Some(d) = req.poll_interval {
        opts.poll_interval = d;
    }
    if let Some(d) = req.max_wait {
        opts.max_wait = d;
    }
    if opts.concurrency == 0 {
        return Err(DeidError::Configuration("concurrency must be at least 1".into()));
    }
    if opts.poll_interval.is_zero() || opts.max_wait.is_zero() {
        return Err(DeidError::Configuration(
            "poll interval and max wait must be greater than zero".into(),
        ));
    }
    Ok(opts)
}

/// Runs `req` against the configured service, interrupted by Ctrl-C.
pub async fn run_range(
    cfg: &DeidConfig,
    req: RunRequest,
    events: Option<mpsc::Sender<OutcomeRecord>>,
) -> Result<RunReport, DeidError> {
    let range: FolderRange = req.range.parse()?;
    range.ensure_within(cfg.dispatch.max_folders)?;
    cfg.validate()
        .map_err(|e| DeidError::Configuration(format!("{e:#}")))?;
    let ctx = RunContext::from_config(cfg)?;
    tracing::info!(range = %range, endpoint = %cfg.service.endpoint, "run starting");

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler: never interrupt.
            std::future::pending::<()>().await;
        }
    };
    run_with(cfg, req, ctx, events, shutdown).await
}

/// Same as [`run_range`] with injected collaborators and shutdown signal.
pub async fn run_with<S>(
    cfg: &DeidConfig,
    req: RunRequest,
    ctx: RunContext,
    events: Option<mpsc::Sender<OutcomeRecord>>,
    shutdown: S,
) -> Result<RunReport, DeidError>
where
    S: Future<Output = ()>,
{
    let range: FolderRange = req.range.parse()?;
    range.ensure_within(cfg.dispatch.max_folders)?;
    let opts = options_for(cfg, &req)?;
    let layout = StorageLayout::from(&cfg.storage);
    let items: Vec<WorkItem> = range.items().map(|id| WorkItem::new(id, &layout)).collect();
    let total = items.len();
    let names = LogNames {
        event_log: cfg.sink.event_log_name.clone(),
        tracking_log: cfg.sink.tracking_log_name.clone(),
    };

    let recorder = Arc::new(OutcomeRecorder::new());
    recorder.note(format!("run {range} started ({total} folder(s))"));
    let dispatcher =
        Dispatcher::with_handles(Arc::clone(&ctx.service), Arc::clone(&recorder), opts, ctx.handles);

    let records = tokio::select! {
        records = dispatcher.dispatch(items, events) => records,
        _ = shutdown => {
            let recorded = recorder.len();
            tracing::warn!(recorded, total, "interrupted; flushing recorded outcomes");
            recorder.note(format!("run {range} interrupted after {recorded} of {total} outcome(s)"));
            if let Err(e) = recorder.flush(ctx.sink.as_ref(), &names).await {
                tracing::error!("flush after interrupt failed: {:#}", e);
            }
            return Err(DeidError::Interrupted { recorded, total });
        }
    };

    let summary = DispatchSummary::from_records(&records);
    recorder.note(format!("run {range} finished: {summary}"));
    tracing::info!(summary = %summary, peak = dispatcher.limiter().peak(), "run finished");

    let collected = match &req.collect_to {
        Some(out_dir) => {
            let succeeded = transfer::succeeded_items(&records);
            Some(
                transfer::collect_results(
                    ctx.target_store.as_ref(),
                    &succeeded,
                    out_dir,
                    false,
                    &recorder,
                )
                .await,
            )
        }
        None => None,
    };

    recorder
        .flush(ctx.sink.as_ref(), &names)
        .await
        .context("write event and tracking logs")?;

    Ok(RunReport {
        range,
        peak_in_flight: dispatcher.limiter().peak(),
        records,
        summary,
        collected,
    })
}
