//! Stage 2: bounded CPU pool resuming save-file shards, with per-number
//! cancellation of sibling shards.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cancel::CancellationRegistry;
use crate::ecm::report::{last_run_output_or_note, STAGE2_BANNER};
use crate::ecm::{EcmTool, Stage2Exit};
use crate::work::{Stage2Item, Stage2Receiver};

/// What happened to one shard.
#[derive(Debug, Clone, Serialize)]
pub struct Stage2Outcome {
    pub identifier: String,
    pub shard: PathBuf,
    pub pid: Option<u32>,
    #[serde(flatten)]
    pub status: Stage2Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Stage2Status {
    /// The resume run exited on its own. `code` is `None` if a signal
    /// from outside the pipeline ended it.
    Exited {
        code: Option<i32>,
        factor_found: bool,
        cofactor_prp: bool,
    },
    /// A sibling shard resolved the number. `killed` is false when the shard
    /// was skipped before its process was started.
    Cancelled { killed: bool },
    Failed { error: String },
}

/// Result of a full stage-2 run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stage2Summary {
    pub outcomes: Vec<Stage2Outcome>,
    /// Highest number of resume processes alive at the same time.
    pub peak_concurrency: usize,
}

/// CPU worker pool bounded to `slots` concurrent resume processes.
pub struct Stage2Pool {
    tool: EcmTool,
    slots: usize,
    registry: Arc<CancellationRegistry>,
    running: Arc<RunningCounter>,
}

impl Stage2Pool {
    pub fn new(tool: EcmTool, slots: usize) -> Self {
        Self {
            tool,
            slots: slots.max(1),
            registry: Arc::new(CancellationRegistry::new()),
            running: Arc::new(RunningCounter::default()),
        }
    }

    pub fn registry(&self) -> &Arc<CancellationRegistry> {
        &self.registry
    }

    /// Dispatch every item from `queue` until it is closed, then wait for
    /// all dispatched workers.
    ///
    /// A slot is acquired before each worker is spawned, so a full pool
    /// holds back dispatch rather than piling up waiting tasks.
    pub async fn run(&self, mut queue: Stage2Receiver) -> Stage2Summary {
        info!(slots = self.slots, "stage 2 starting");
        let semaphore = Arc::new(Semaphore::new(self.slots));
        let mut workers = JoinSet::new();

        while let Some(item) = queue.recv().await {
            let token = self.registry.token_for(&item.identifier);
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                warn!("stage-2 semaphore closed, stopping dispatch");
                break;
            };

            let worker = ShardWorker {
                tool: self.tool.clone(),
                registry: self.registry.clone(),
                running: self.running.clone(),
            };
            workers.spawn(async move {
                let _permit = permit;
                worker.run(item, token).await
            });
        }
        debug!("stage-2 stream closed, waiting for workers");

        let mut summary = Stage2Summary::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => summary.outcomes.push(outcome),
                Err(e) => error!(error = %e, "stage-2 worker panicked"),
            }
        }
        summary.peak_concurrency = self.running.peak();

        info!(
            shards = summary.outcomes.len(),
            peak = summary.peak_concurrency,
            "stage 2 complete"
        );
        summary
    }
}

struct ShardWorker {
    tool: EcmTool,
    registry: Arc<CancellationRegistry>,
    running: Arc<RunningCounter>,
}

impl ShardWorker {
    async fn run(self, mut item: Stage2Item, token: CancellationToken) -> Stage2Outcome {
        if token.is_cancelled() {
            debug!(item = %item, "number already resolved, skipping shard");
            return outcome(item, Stage2Status::Cancelled { killed: false });
        }

        let args = self.tool.stage2_args(&item);
        let mut child = match self.tool.spawn(&args, &item.output_file()) {
            Ok(child) => child,
            Err(e) => {
                error!(item = %item, error = %e, "failed to start stage 2");
                return outcome(item, Stage2Status::Failed { error: e.to_string() });
            }
        };
        item.pid = child.id();
        let _running = self.running.enter();

        let status = tokio::select! {
            waited = child.wait() => match waited {
                Ok(status) => status,
                Err(e) => {
                    error!(pid = ?item.pid, error = %e, "failed to wait for stage-2 process");
                    return outcome(item, Stage2Status::Failed { error: e.to_string() });
                }
            },
            _ = token.cancelled() => {
                debug!(pid = ?item.pid, "killing process");
                if let Err(e) = child.kill().await {
                    warn!(pid = ?item.pid, error = %e, "failed to kill stage-2 process");
                }
                info!(id = %item.identifier, shard = %item.save_file_part.display(), "shard cancelled");
                return outcome(item, Stage2Status::Cancelled { killed: true });
            }
        };

        item.exit_code = status.code();
        debug!(pid = ?item.pid, exit_code = ?item.exit_code, "stage-2 process exited");

        let Some(code) = item.exit_code else {
            warn!(pid = ?item.pid, "stage-2 process terminated by signal");
            return outcome(
                item,
                Stage2Status::Exited {
                    code: None,
                    factor_found: false,
                    cofactor_prp: false,
                },
            );
        };

        let exit = Stage2Exit::new(code);
        if exit.cofactor_prp() {
            self.registry.cancel(&item.identifier);
        }
        if exit.factor_found() {
            let report = last_run_output_or_note(&item.output_file(), STAGE2_BANNER);
            info!(id = %item.identifier, "Factor found in step 2:\n{}", report);
        }

        let status = Stage2Status::Exited {
            code: Some(code),
            factor_found: exit.factor_found(),
            cofactor_prp: exit.cofactor_prp(),
        };
        outcome(item, status)
    }
}

fn outcome(item: Stage2Item, status: Stage2Status) -> Stage2Outcome {
    Stage2Outcome {
        identifier: item.identifier,
        shard: item.save_file_part,
        pid: item.pid,
        status,
    }
}

/// Live/peak count of running resume processes.
#[derive(Debug, Default)]
struct RunningCounter {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl RunningCounter {
    fn enter(self: &Arc<Self>) -> RunningGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        RunningGuard {
            counter: self.clone(),
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct RunningGuard {
    counter: Arc<RunningCounter>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.counter.current.fetch_sub(1, Ordering::SeqCst);
    }
}
