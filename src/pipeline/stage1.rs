//! Stage 1: one worker per GPU device draining the pre-seeded queue.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::ecm::report::{last_run_output_or_note, STAGE1_BANNER};
use crate::ecm::{EcmTool, Stage1Exit};
use crate::error::{PipelineError, Result};
use crate::split::split_file;
use crate::work::{Stage1Item, Stage1Queue, Stage2Sender};

/// What happened to one stage-1 item.
#[derive(Debug, Clone, Serialize)]
pub struct Stage1Outcome {
    pub identifier: String,
    pub device: u32,
    #[serde(flatten)]
    pub result: Stage1Result,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Stage1Result {
    /// The tool ran to completion; `shards` stage-2 items were produced.
    Exited { exit: Stage1Exit, shards: usize },
    /// The item could not be run or its save file could not be split.
    Failed { error: String },
}

/// GPU worker pool. Each device runs at most one item at a time.
pub struct Stage1Pool {
    tool: EcmTool,
    devices: Vec<u32>,
    stage2_slots: usize,
    echo_reports: bool,
}

impl Stage1Pool {
    pub fn new(tool: EcmTool, devices: Vec<u32>, stage2_slots: usize, echo_reports: bool) -> Self {
        Self {
            tool,
            devices,
            stage2_slots,
            echo_reports,
        }
    }

    /// Run every queued item, then close the stage-2 stream.
    ///
    /// Workers stop as soon as the queue is empty, so a device can go idle
    /// while others are still busy. The stream is closed exactly once, after
    /// all devices have finished.
    pub async fn run(&self, queue: Arc<Stage1Queue>, stage2: Stage2Sender) -> Vec<Stage1Outcome> {
        info!(devices = ?self.devices, pending = queue.len(), "stage 1 starting");

        let mut workers = JoinSet::new();
        for &device in &self.devices {
            let worker = DeviceWorker {
                tool: self.tool.clone(),
                device,
                stage2_slots: self.stage2_slots,
                echo_reports: self.echo_reports,
            };
            let queue = queue.clone();
            let stage2 = stage2.clone();
            workers.spawn(async move { worker.drain(&queue, &stage2).await });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(mut device_outcomes) => outcomes.append(&mut device_outcomes),
                Err(e) => error!(error = %e, "stage-1 device worker panicked"),
            }
        }

        stage2.close();
        info!(processed = outcomes.len(), "stage 1 complete");
        outcomes
    }
}

struct DeviceWorker {
    tool: EcmTool,
    device: u32,
    stage2_slots: usize,
    echo_reports: bool,
}

impl DeviceWorker {
    async fn drain(&self, queue: &Stage1Queue, stage2: &Stage2Sender) -> Vec<Stage1Outcome> {
        let mut outcomes = Vec::new();
        while let Some(item) = queue.try_pop() {
            debug!(device = self.device, item = %item, "running on device");
            let result = match self.run_item(&item, stage2).await {
                Ok(result) => result,
                Err(e) => {
                    error!(device = self.device, id = %item.identifier, error = %e, "stage-1 item failed");
                    Stage1Result::Failed {
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(Stage1Outcome {
                identifier: item.identifier,
                device: self.device,
                result,
            });
        }
        debug!(device = self.device, "stage-1 queue empty, device idle");
        outcomes
    }

    async fn run_item(&self, item: &Stage1Item, stage2: &Stage2Sender) -> Result<Stage1Result> {
        let log_file = item.log_file();
        let args = self.tool.stage1_args(item, self.device);
        let mut child = self.tool.spawn(&args, &log_file)?;
        let pid = child.id();

        let status = child
            .wait()
            .await
            .map_err(|e| PipelineError::io(&log_file, e))?;
        debug!(?pid, exit_code = ?status.code(), "stage-1 process exited");

        let exit = Stage1Exit::from_code(status.code());
        if !exit.fans_out() {
            let report = last_run_output_or_note(&log_file, STAGE1_BANNER);
            info!(id = %item.identifier, "{}", exit.headline());
            debug!("\n{}", report);
            if self.echo_reports {
                print!("{}", report);
            }
            return Ok(Stage1Result::Exited { exit, shards: 0 });
        }

        // Some failures still exit 0 and leave an empty save file.
        let save_file = item.save_file();
        if !has_content(&save_file) {
            info!(path = %save_file.display(), "save file does not exist or is empty");
            return Ok(Stage1Result::Exited { exit, shards: 0 });
        }

        let slots = self.stage2_slots;
        let split_path = save_file.clone();
        let shards = tokio::task::spawn_blocking(move || split_file(&split_path, slots))
            .await
            .map_err(|e| PipelineError::io(&save_file, std::io::Error::other(e)))?
            .map_err(|e| PipelineError::io(&save_file, e))?;

        let stage2_items = item.fan_out(shards);
        let count = stage2_items.len();
        for stage2_item in stage2_items {
            if !stage2.push(stage2_item) {
                warn!(id = %item.identifier, "stage-2 consumer gone, dropping shard");
            }
        }
        info!(id = %item.identifier, shards = count, "stage 1 done, shards queued for stage 2");

        Ok(Stage1Result::Exited { exit, shards: count })
    }
}

fn has_content(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}
