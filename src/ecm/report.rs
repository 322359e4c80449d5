//! Extract the last run's output from an append-only GMP-ECM log.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Banner GMP-ECM prints at the start of every stage-1 run.
pub const STAGE1_BANNER: &str = "GMP-ECM ";

/// Line GMP-ECM prints when resuming from a save file.
pub const STAGE2_BANNER: &str = "Resuming ";

/// Everything from the last line starting with `banner` to the end of the
/// file. If no line matches, the whole file is returned.
pub fn last_run_output(path: &Path, banner: &str) -> io::Result<String> {
    let reader = BufReader::new(File::open(path)?);
    let mut report = String::new();
    for line in reader.lines() {
        let line = line?;
        if line.starts_with(banner) {
            report.clear();
        }
        report.push_str(&line);
        report.push('\n');
    }
    Ok(report)
}

/// Like [`last_run_output`], but never fails; used where the report is only
/// informational.
pub fn last_run_output_or_note(path: &Path, banner: &str) -> String {
    match last_run_output(path, banner) {
        Ok(report) => report,
        Err(e) => format!("(no output available from {}: {})\n", path.display(), e),
    }
}
