//! Reading interaction logs from disk.
//!
//! A log is a JSONL file where each non-blank line is one `InteractionStep`.

use crate::config::DiscoveryConfig;
use crate::errors::ReplayError;
use crate::replay::step::InteractionStep;
use crate::runtime::FileSystem;
use std::path::{Path, PathBuf};

/// Parse every non-blank line of `path`, in file order.
pub fn read_log(fs: &dyn FileSystem, path: &Path) -> Result<Vec<InteractionStep>, ReplayError> {
    if !fs.exists(path) {
        return Err(ReplayError::NotFound(path.to_path_buf()));
    }
    let raw = fs.read_to_string(path)?;
    parse_log(&raw).map_err(|err| match err {
        ReplayError::MalformedRecord { line, message } => ReplayError::MalformedRecord {
            line,
            message: format!("{message} at {}:{line}", path.display()),
        },
        other => other,
    })
}

pub fn parse_log(raw: &str) -> Result<Vec<InteractionStep>, ReplayError> {
    let mut steps = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let payload = line.trim_start_matches('\u{feff}').trim();
        if payload.is_empty() {
            continue;
        }
        steps.push(InteractionStep::parse_line(payload, steps.len() + 1, idx + 1)?);
    }
    Ok(steps)
}

/// Most recently modified `<prefix>*.<extension>` file directly under `dir`.
pub fn find_latest_log(
    fs: &dyn FileSystem,
    dir: &Path,
    discovery: &DiscoveryConfig,
) -> Option<PathBuf> {
    let suffix = format!(".{}", discovery.file_extension.trim_start_matches('.'));
    fs.list_files(dir)
        .ok()?
        .into_iter()
        .filter(|(path, _)| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| {
                    name.starts_with(&discovery.file_prefix) && name.ends_with(&suffix)
                })
        })
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
        .map(|(path, _)| path)
}

/// Partition steps into sessions wherever `seq` decreases.
///
/// Analysis only; replay always walks the whole file in order.
pub fn split_sessions(steps: &[InteractionStep]) -> Vec<Vec<InteractionStep>> {
    let mut sessions = Vec::new();
    let mut current: Vec<InteractionStep> = Vec::new();
    let mut last_seq: Option<i64> = None;

    for step in steps {
        if let (Some(seq), Some(last)) = (step.seq, last_seq) {
            if seq < last && !current.is_empty() {
                sessions.push(std::mem::take(&mut current));
            }
        }
        current.push(step.clone());
        if step.seq.is_some() {
            last_seq = step.seq;
        }
    }

    if !current.is_empty() {
        sessions.push(current);
    }
    sessions
}
