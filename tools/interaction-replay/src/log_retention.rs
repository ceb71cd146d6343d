use crate::errors::ReplayError;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Delete the oldest `<stem>*.jsonl` run logs in `dir` until they fit `budget_bytes`.
///
/// Files outside the stem family (recordings included) are never touched, nor
/// is anything listed in `keep`. Returns the deleted paths, oldest first.
pub fn enforce_total_budget(
    dir: &Path,
    stem: &str,
    budget_bytes: u64,
    keep: &[PathBuf],
) -> Result<Vec<PathBuf>, ReplayError> {
    let io = |e: std::io::Error| ReplayError::Io(format!("{}: {e}", dir.display()));

    let mut family = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io)?.flatten() {
        let path = entry.path();
        let in_family = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(stem) && name.ends_with(".jsonl"));
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if in_family && meta.is_file() {
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            family.push((modified, meta.len(), path));
        }
    }

    let mut total: u64 = family.iter().map(|(_, len, _)| len).sum();
    family.sort();

    let mut deleted = Vec::new();
    for (_, len, path) in family {
        if total <= budget_bytes {
            break;
        }
        if keep.contains(&path) {
            continue;
        }
        std::fs::remove_file(&path).map_err(io)?;
        total = total.saturating_sub(len);
        deleted.push(path);
    }
    Ok(deleted)
}
