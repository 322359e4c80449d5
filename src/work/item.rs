//! Work items flowing through the pipeline and their on-disk artifacts.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha224};

use crate::error::{PipelineError, Result};

/// A number to factor, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputItem {
    pub identifier: String,
    pub payload: String,
    /// The exact string the item was parsed from.
    pub raw: String,
}

impl InputItem {
    /// Parse `id:payload` or a bare `payload`.
    ///
    /// The identifier ends at the first `:`. Bare payloads get an identifier
    /// derived from the raw string exactly as given, surrounding whitespace
    /// included (see [`derive_identifier`]).
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(PipelineError::MalformedInput {
                input: raw.to_string(),
                reason: "empty input".to_string(),
            });
        }

        let (identifier, payload) = match raw.split_once(':') {
            Some((id, payload)) => {
                if id.is_empty() {
                    return Err(PipelineError::MalformedInput {
                        input: raw.to_string(),
                        reason: "empty identifier before ':'".to_string(),
                    });
                }
                (id.to_string(), payload.to_string())
            }
            None => (derive_identifier(raw), raw.to_string()),
        };

        if payload.is_empty() {
            return Err(PipelineError::MalformedInput {
                input: raw.to_string(),
                reason: "empty number".to_string(),
            });
        }

        Ok(Self {
            identifier,
            payload,
            raw: raw.to_string(),
        })
    }
}

/// Last 8 lowercase hex characters of the SHA-224 digest of `raw`.
pub fn derive_identifier(raw: &str) -> String {
    let hex = format!("{:x}", Sha224::digest(raw.as_bytes()));
    hex[hex.len() - 8..].to_string()
}

/// A stage-1 (GPU) job: one input number, run once on one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage1Item {
    pub identifier: String,
    pub payload: String,
    /// Curve count passed to `-gpucurves`/`-c`; `None` lets the tool decide.
    pub curves: Option<u32>,
    pub b1: String,
    work_dir: PathBuf,
}

impl Stage1Item {
    pub fn new(input: &InputItem, curves: Option<u32>, b1: &str, work_dir: &Path) -> Self {
        Self {
            identifier: input.identifier.clone(),
            payload: input.payload.clone(),
            curves,
            b1: b1.to_string(),
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// `<id>.in`
    pub fn input_file(&self) -> PathBuf {
        self.work_dir.join(format!("{}.in", self.identifier))
    }

    /// `<id>_<B1>.save`
    pub fn save_file(&self) -> PathBuf {
        self.work_dir.join(format!("{}.save", self.stem()))
    }

    /// `<id>_<B1>.chkpnt`
    pub fn checkpoint_file(&self) -> PathBuf {
        self.work_dir.join(format!("{}.chkpnt", self.stem()))
    }

    /// `<id>_<B1>.log`
    pub fn log_file(&self) -> PathBuf {
        self.work_dir.join(format!("{}.log", self.stem()))
    }

    fn stem(&self) -> String {
        format!("{}_{}", self.identifier, self.b1)
    }

    /// One stage-2 item per save-file shard.
    pub fn fan_out(&self, shards: Vec<PathBuf>) -> Vec<Stage2Item> {
        shards
            .into_iter()
            .map(|shard| Stage2Item::new(&self.identifier, &self.payload, &self.b1, shard))
            .collect()
    }
}

impl fmt::Display for Stage1Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let curves = self
            .curves
            .map(|c| c.to_string())
            .unwrap_or_else(|| "default".to_string());
        write!(
            f,
            "{{id={}, N={}, curves={}, B1={}}}",
            self.identifier, self.payload, curves, self.b1
        )
    }
}

/// A stage-2 (CPU) job: resume one shard of a stage-1 save file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage2Item {
    pub identifier: String,
    pub payload: String,
    pub b1: String,
    pub save_file_part: PathBuf,
    /// Exit code of the resume run; `None` until it exits normally.
    pub exit_code: Option<i32>,
    /// PID of the resume run once spawned.
    pub pid: Option<u32>,
}

impl Stage2Item {
    pub fn new(identifier: &str, payload: &str, b1: &str, save_file_part: PathBuf) -> Self {
        Self {
            identifier: identifier.to_string(),
            payload: payload.to_string(),
            b1: b1.to_string(),
            save_file_part,
            exit_code: None,
            pid: None,
        }
    }

    /// `<shard>.out`
    pub fn output_file(&self) -> PathBuf {
        let mut name = self.save_file_part.as_os_str().to_owned();
        name.push(".out");
        PathBuf::from(name)
    }
}

impl fmt::Display for Stage2Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{id={}, shard={}, B1={}}}",
            self.identifier,
            self.save_file_part.display(),
            self.b1
        )
    }
}
