//! Process-level ports: time, files, console output and the session connector.

use crate::driver::{SessionConnector, UnlinkedConnector};
use crate::errors::ReplayError;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, ReplayError>;
    fn exists(&self, path: &Path) -> bool;
    /// Regular files directly inside `dir`, with their modification times.
    fn list_files(&self, dir: &Path) -> Result<Vec<(PathBuf, SystemTime)>, ReplayError>;
}

pub trait Terminal: Send + Sync {
    fn write_line(&self, line: &str) -> Result<(), ReplayError>;
    fn write_error_line(&self, line: &str) -> Result<(), ReplayError>;
}

pub struct ProductionClock;

impl Clock for ProductionClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, ReplayError> {
        std::fs::read_to_string(path).map_err(|e| ReplayError::Io(format!("{}: {e}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<(PathBuf, SystemTime)>, ReplayError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| ReplayError::Io(format!("{}: {e}", dir.display())))?;
        Ok(entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                if !meta.is_file() {
                    return None;
                }
                Some((entry.path(), meta.modified().ok()?))
            })
            .collect())
    }
}

pub struct ProductionTerminal;

impl Terminal for ProductionTerminal {
    fn write_line(&self, line: &str) -> Result<(), ReplayError> {
        writeln!(std::io::stdout().lock(), "{line}").map_err(|e| ReplayError::Io(e.to_string()))
    }

    fn write_error_line(&self, line: &str) -> Result<(), ReplayError> {
        writeln!(std::io::stderr().lock(), "{line}").map_err(|e| ReplayError::Io(e.to_string()))
    }
}

pub struct Runtime {
    pub clock: Arc<dyn Clock>,
    pub file_system: Arc<dyn FileSystem>,
    pub terminal: Arc<dyn Terminal>,
    pub connector: Arc<dyn SessionConnector>,
}

impl Runtime {
    /// Real clock, disk and console. Replays fail at connect until a browser backend is linked.
    pub fn production() -> Self {
        Self {
            clock: Arc::new(ProductionClock),
            file_system: Arc::new(ProductionFileSystem),
            terminal: Arc::new(ProductionTerminal),
            connector: Arc::new(UnlinkedConnector),
        }
    }
}

/// Virtual time: `sleep` advances `now` instantly and records the duration.
#[derive(Clone)]
pub struct FakeClock {
    origin: Instant,
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl FakeClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().expect("clock lock").clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            slept: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.slept.lock().expect("clock lock").push(duration);
    }
}

#[derive(Debug, Clone)]
struct FakeFile {
    contents: String,
    modified: SystemTime,
}

/// In-memory files keyed by absolute path.
#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<BTreeMap<PathBuf, FakeFile>>>,
    fail_next: Arc<Mutex<Option<ReplayError>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let fs = Self::default();
        fs.add_file(path, contents, SystemTime::UNIX_EPOCH);
        fs
    }

    pub fn add_file(
        &self,
        path: impl Into<PathBuf>,
        contents: impl Into<String>,
        modified: SystemTime,
    ) {
        self.files.lock().expect("files lock").insert(
            path.into(),
            FakeFile {
                contents: contents.into(),
                modified,
            },
        );
    }

    /// The next read fails with `error`.
    pub fn set_fail_next(&self, error: ReplayError) {
        *self.fail_next.lock().expect("fail lock") = Some(error);
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, ReplayError> {
        if let Some(err) = self.fail_next.lock().expect("fail lock").take() {
            return Err(err);
        }
        self.files
            .lock()
            .expect("files lock")
            .get(path)
            .map(|file| file.contents.clone())
            .ok_or_else(|| ReplayError::Io(format!("{}: no such file", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("files lock").contains_key(path)
    }

    fn list_files(&self, dir: &Path) -> Result<Vec<(PathBuf, SystemTime)>, ReplayError> {
        Ok(self
            .files
            .lock()
            .expect("files lock")
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .map(|(path, file)| (path.clone(), file.modified))
            .collect())
    }
}

#[derive(Debug, Default)]
struct Captured {
    stdout: Vec<String>,
    stderr: Vec<String>,
}

/// Captures console output for assertions.
#[derive(Default, Clone)]
pub struct FakeTerminal {
    captured: Arc<Mutex<Captured>>,
}

impl FakeTerminal {
    pub fn written_lines(&self) -> Vec<String> {
        self.captured.lock().expect("terminal lock").stdout.clone()
    }

    pub fn error_lines(&self) -> Vec<String> {
        self.captured.lock().expect("terminal lock").stderr.clone()
    }
}

impl Terminal for FakeTerminal {
    fn write_line(&self, line: &str) -> Result<(), ReplayError> {
        self.captured
            .lock()
            .expect("terminal lock")
            .stdout
            .push(line.to_string());
        Ok(())
    }

    fn write_error_line(&self, line: &str) -> Result<(), ReplayError> {
        self.captured
            .lock()
            .expect("terminal lock")
            .stderr
            .push(line.to_string());
        Ok(())
    }
}
