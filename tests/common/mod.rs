//! Fake `gpu_ecm` for driving the pipeline in tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use gfakt::{GfaktConfig, PipelineSettings};

/// Shell snippets for the two stages. `$save` holds the stage-1 save path,
/// `$shard` the stage-2 shard path.
pub struct FakeEcm {
    pub stage1: String,
    pub stage2: String,
}

impl FakeEcm {
    /// Stage 1 writes `lines` save-file lines and exits with `code`; stage 2
    /// exits 0.
    pub fn with_save_lines(lines: usize, code: i32) -> Self {
        let mut write = String::new();
        for i in 0..lines {
            write.push_str(&format!("echo 'METHOD=ECM; SIGMA={}; B1=11000' >> \"$save\"\n", 1000 + i));
        }
        Self {
            stage1: format!("{}exit {}\n", write, code),
            stage2: "exit 0\n".to_string(),
        }
    }

    pub fn stage2(mut self, body: &str) -> Self {
        self.stage2 = body.to_string();
        self
    }

    pub fn stage1(mut self, body: &str) -> Self {
        self.stage1 = body.to_string();
        self
    }

    /// Write the script into `dir` and return its path. Every invocation is
    /// appended to `dir/calls.log` as `<stage> <args...>`.
    pub fn install(&self, dir: &Path) -> PathBuf {
        let path = dir.join("fake_gpu_ecm");
        let calls = dir.join("calls.log");
        let script = format!(
            r#"#!/bin/sh
mode=stage2
save=""
shard=""
prev=""
for a in "$@"; do
  case "$prev" in
    -save) save="$a" ;;
    -resume) shard="$a" ;;
  esac
  [ "$a" = "-gpu" ] && mode=stage1
  prev="$a"
done
echo "$mode $*" >> "{calls}"
if [ "$mode" = stage1 ]; then
  echo "GMP-ECM 7.0.5-fake [configured with GMP 6.3.0] [ECM]"
  echo "Input number is $*"
{stage1}
fi
echo "Resuming ECM residue saved by fake"
{stage2}
"#,
            calls = calls.display(),
            stage1 = self.stage1,
            stage2 = self.stage2,
        );
        std::fs::write(&path, script).unwrap();
        make_executable(&path);
        path
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

/// Invocations recorded by the fake tool, one per line.
pub fn calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn settings(ecm: &Path, work_dir: &Path, devices: Vec<u32>, slots: usize) -> PipelineSettings {
    let mut config = GfaktConfig::default();
    config.ecm.path = ecm.to_path_buf();
    config.pipeline.work_dir = work_dir.to_path_buf();
    config.pipeline.devices = devices;
    config.pipeline.stage2_slots = slots;
    config.pipeline.b1 = Some("11000".to_string());
    config.logging.verbose = true;
    PipelineSettings::from_config(&config).unwrap()
}

pub fn numbers(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
