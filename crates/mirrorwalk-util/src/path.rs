//! Output path selection.

use std::path::{Path, PathBuf};

/// Pick `<dir>/<base>.<ext>`, or `<dir>/<base>-<n>.<ext>` with the
/// smallest `n` that makes the name unique on disk. Prior runs are never
/// overwritten.
pub fn unique_path(dir: &Path, base: &str, ext: &str) -> PathBuf {
    let plain = dir.join(format!("{base}.{ext}"));
    if !plain.exists() {
        return plain;
    }
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{base}-{n}.{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
