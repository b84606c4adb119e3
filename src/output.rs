use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Writes `data` next to `target` and renames it into place, so a failed run
/// never leaves a truncated file behind. Missing parent directories are created.
pub fn write_atomic(target: &Path, data: &[u8]) -> Result<()> {
    let parent = match target.parent() {
        Some(x) if !x.as_os_str().is_empty() => x.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).with_context(|| format!("create dir {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(&parent).context("create temp file")?;
    tmp.write_all(data)
        .with_context(|| format!("write {}", target.display()))?;
    tmp.as_file().sync_all().ok();
    tmp.persist(target)
        .with_context(|| format!("rename to {}", target.display()))?;
    Ok(())
}
