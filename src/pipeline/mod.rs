//! Pipeline driver: seed stage 1, run it to completion, then drain stage 2.

pub mod cancel;
pub mod stage1;
pub mod stage2;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::GfaktConfig;
use crate::ecm::EcmTool;
use crate::error::{PipelineError, Result};
use crate::work::{stage2_queue, InputItem, Stage1Item, Stage1Queue};

pub use cancel::CancellationRegistry;
pub use stage1::{Stage1Outcome, Stage1Pool, Stage1Result};
pub use stage2::{Stage2Outcome, Stage2Pool, Stage2Status, Stage2Summary};

/// Everything a pipeline run needs, validated.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub ecm: EcmTool,
    pub work_dir: PathBuf,
    pub devices: Vec<u32>,
    pub stage2_slots: usize,
    pub curves: Option<u32>,
    pub b1: String,
    /// Print stage-1 factor/error reports to stdout in addition to the log.
    pub echo_reports: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &GfaktConfig) -> Result<Self> {
        config.validate()?;
        let b1 = config.pipeline.b1.as_deref().unwrap_or_default().trim();
        Ok(Self {
            ecm: EcmTool::new(&config.ecm.path),
            work_dir: config.pipeline.work_dir.clone(),
            devices: config.pipeline.devices.clone(),
            stage2_slots: config.pipeline.stage2_slots,
            curves: config.pipeline.curves,
            b1: b1.to_string(),
            echo_reports: !config.logging.verbose,
        })
    }
}

/// Summary of one run, suitable for `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub inputs: Vec<InputItem>,
    pub stage1: Vec<Stage1Outcome>,
    pub stage2: Stage2Summary,
}

pub struct Pipeline {
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }

    /// Parse raw inputs, rejecting any identifier used twice.
    pub fn parse_inputs(raw: &[String]) -> Result<Vec<InputItem>> {
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut items = Vec::with_capacity(raw.len());
        for r in raw {
            let item = InputItem::parse(r)?;
            if let Some(first) = seen.get(&item.identifier) {
                return Err(PipelineError::DuplicateIdentifier {
                    id: item.identifier.clone(),
                    first: first.clone(),
                    second: item.raw.clone(),
                });
            }
            debug!(id = %item.identifier, n = %item.payload, "got number");
            seen.insert(item.identifier.clone(), item.raw.clone());
            items.push(item);
        }
        Ok(items)
    }

    /// Write each input file and queue the stage-1 work.
    pub fn seed(&self, inputs: &[InputItem]) -> Result<Stage1Queue> {
        let work_dir = &self.settings.work_dir;
        std::fs::create_dir_all(work_dir).map_err(|e| PipelineError::io(work_dir, e))?;

        let queue = Stage1Queue::new();
        for input in inputs {
            let item = Stage1Item::new(input, self.settings.curves, &self.settings.b1, work_dir);
            let path = item.input_file();
            std::fs::write(&path, item.payload.as_bytes()).map_err(|e| PipelineError::io(&path, e))?;
            queue.push(item);
        }
        Ok(queue)
    }

    /// Run both stages over `raw_inputs` and wait for everything to drain.
    ///
    /// Only input validation and seeding can fail the run; failures of
    /// individual items are recorded in the report.
    pub async fn run(&self, raw_inputs: &[String]) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, numbers = raw_inputs.len(), b1 = %self.settings.b1, "pipeline starting");

        let inputs = Self::parse_inputs(raw_inputs)?;
        let queue = Arc::new(self.seed(&inputs)?);

        let (stage2_tx, stage2_rx) = stage2_queue();
        let stage1_pool = Stage1Pool::new(
            self.settings.ecm.clone(),
            self.settings.devices.clone(),
            self.settings.stage2_slots,
            self.settings.echo_reports,
        );
        let stage1 = stage1_pool.run(queue, stage2_tx).await;

        let stage2_pool = Stage2Pool::new(self.settings.ecm.clone(), self.settings.stage2_slots);
        let stage2 = stage2_pool.run(stage2_rx).await;

        let finished_at = Utc::now();
        info!(
            %run_id,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "pipeline finished"
        );

        Ok(PipelineReport {
            run_id,
            started_at,
            finished_at,
            inputs,
            stage1,
            stage2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn settings(dir: &std::path::Path) -> PipelineSettings {
        let mut config = GfaktConfig::default();
        config.pipeline.work_dir = dir.to_path_buf();
        config.pipeline.b1 = Some("11000".to_string());
        PipelineSettings::from_config(&config).unwrap()
    }

    #[test]
    fn test_duplicate_explicit_identifier_rejected() {
        let err = Pipeline::parse_inputs(&raw(&["a:15", "a:21"])).unwrap_err();
        match err {
            PipelineError::DuplicateIdentifier { id, first, second } => {
                assert_eq!(id, "a");
                assert_eq!(first, "a:15");
                assert_eq!(second, "a:21");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_duplicate_derived_identifier_rejected() {
        let err = Pipeline::parse_inputs(&raw(&["91", "91"])).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateIdentifier { .. }));
    }

    #[test]
    fn test_seed_writes_input_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let pipeline = Pipeline::new(settings(&dir.path().join("work")));
        let inputs = Pipeline::parse_inputs(&raw(&["x:1001", "2^67-1"])).unwrap();

        let queue = pipeline.seed(&inputs).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("work").join("x.in")).unwrap(),
            "1001"
        );
        let derived = &inputs[1].identifier;
        assert_eq!(
            std::fs::read_to_string(dir.path().join("work").join(format!("{}.in", derived))).unwrap(),
            "2^67-1"
        );
    }

    #[test]
    fn test_empty_b1_rejected() {
        let mut config = GfaktConfig::default();
        let err = PipelineSettings::from_config(&config).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));

        config.pipeline.b1 = Some("  ".to_string());
        let err = PipelineSettings::from_config(&config).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_b1_taken_from_config() {
        let mut config = GfaktConfig::default();
        config.pipeline.b1 = Some(" 43000000 ".to_string());
        let settings = PipelineSettings::from_config(&config).unwrap();
        assert_eq!(settings.b1, "43000000");
    }

    #[tokio::test]
    async fn test_duplicate_fails_before_any_work() {
        let dir = tempfile::TempDir::new().unwrap();
        let pipeline = Pipeline::new(settings(dir.path()));
        assert!(pipeline.run(&raw(&["a:1", "a:2"])).await.is_err());
        assert!(!dir.path().join("a.in").exists());
    }
}
