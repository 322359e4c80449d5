//! Line-aligned file splitting for fanning a stage-1 save file out to
//! stage-2 workers.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Path of the `index`-th part of `path`: `<path>.000`, `<path>.001`, ...
pub fn part_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{:03}", index));
    PathBuf::from(name)
}

/// Split `path` into at most `n` contiguous parts without breaking lines.
///
/// A new part starts when the current one is empty or has grown past
/// `total_size / n` bytes, so uneven line lengths can yield fewer than `n`
/// parts. With `n <= 1` the source path is returned as-is and nothing is
/// written. The source file is never modified or removed.
pub fn split_file(path: &Path, n: usize) -> io::Result<Vec<PathBuf>> {
    debug!(path = %path.display(), parts = n, "splitting file");

    if n <= 1 {
        return Ok(vec![path.to_path_buf()]);
    }

    let source = File::open(path)?;
    let total_size = source.metadata()?.len();
    let mut reader = BufReader::new(source);

    let mut parts = Vec::new();
    let mut writer: Option<BufWriter<File>> = None;
    let mut written: u64 = 0;
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }

        // written > total_size / n, compared without truncating the quotient
        if writer.is_none() || written.saturating_mul(n as u64) > total_size {
            if let Some(mut w) = writer.take() {
                w.flush()?;
            }
            let part = part_path(path, parts.len());
            writer = Some(BufWriter::new(File::create(&part)?));
            parts.push(part);
            written = 0;
        }

        if let Some(w) = writer.as_mut() {
            w.write_all(&line)?;
        }
        written += line.len() as u64;
    }

    if let Some(mut w) = writer {
        w.flush()?;
    }

    debug!(path = %path.display(), produced = parts.len(), "split complete");
    Ok(parts)
}
