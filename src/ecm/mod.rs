//! GMP-ECM process wrapper -- build command lines, spawn with output
//! appended to a per-item file.

pub mod exit;
pub mod report;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::work::{Stage1Item, Stage2Item};

pub use exit::{Stage1Exit, Stage2Exit};

/// Handle on the external `gpu_ecm` executable.
#[derive(Debug, Clone)]
pub struct EcmTool {
    program: PathBuf,
}

impl EcmTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Stage-1 arguments: GPU run on `device`, stop at the first factor,
    /// write a save file for stage 2. B2 is pinned to `0`.
    pub fn stage1_args(&self, item: &Stage1Item, device: u32) -> Vec<String> {
        let mut args = vec![
            "-v".to_string(),
            "-gpu".to_string(),
            "-gpudevice".to_string(),
            device.to_string(),
        ];
        if let Some(curves) = item.curves {
            args.push("-gpucurves".to_string());
            args.push(curves.to_string());
            args.push("-c".to_string());
            args.push(curves.to_string());
        }
        args.push("-one".to_string());
        args.push("-inp".to_string());
        args.push(item.input_file().display().to_string());
        args.push("-save".to_string());
        args.push(item.save_file().display().to_string());
        args.push("-chkpnt".to_string());
        args.push(item.checkpoint_file().display().to_string());
        args.push(item.b1.clone());
        args.push("0".to_string());
        args
    }

    /// Stage-2 arguments: resume one save-file shard on the CPU.
    pub fn stage2_args(&self, item: &Stage2Item) -> Vec<String> {
        vec![
            "-v".to_string(),
            "-resume".to_string(),
            item.save_file_part.display().to_string(),
            item.b1.clone(),
        ]
    }

    /// Spawn the tool with stdout and stderr appended to `output`.
    ///
    /// The child is killed if its handle is dropped before it exits.
    pub fn spawn(&self, args: &[String], output: &Path) -> Result<Child> {
        let out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output)
            .map_err(|e| PipelineError::io(output, e))?;
        let err = out.try_clone().map_err(|e| PipelineError::io(output, e))?;

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(err))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::Spawn {
                program: self.program.display().to_string(),
                source: e,
            })?;

        debug!(
            pid = ?child.id(),
            cmd = %self.command_line(args),
            "spawned GMP-ECM"
        );
        Ok(child)
    }

    /// Human-readable command line for logs.
    pub fn command_line(&self, args: &[String]) -> String {
        let mut line = self.program.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}
