pub mod config;
pub mod driver;
pub mod errors;
pub mod log_retention;
pub mod logging;
pub mod replay;
pub mod runtime;
pub mod types;
pub mod wait;

use clap::{error::ErrorKind, Parser, ValueEnum};
use config::{load_config, CliOverrides};
use errors::ReplayError;
use logging::JsonlLogger;
use replay::log_reader::{find_latest_log, read_log, split_sessions};
use replay::replayer::Replayer;
use runtime::Runtime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use types::{ErrorPolicy, ReplayOptions, ReplayProfile};

pub const EXIT_OK: i32 = 0;
pub const EXIT_REPLAY_FAILED: i32 = 2;

#[derive(Debug, Clone, Parser)]
#[command(name = "interaction-replay")]
#[command(about = "Replay recorded interaction logs against a running application")]
pub struct Cli {
    /// Interaction log to replay. Defaults to the newest interaction-log-*.jsonl in the working directory.
    #[arg(long)]
    pub log: Option<PathBuf>,
    /// Remote debugger address of the application under test.
    #[arg(long)]
    pub debugger_address: Option<String>,
    /// Skip opening the plugin home before replay.
    #[arg(long, default_value_t = false)]
    pub no_prepare: bool,
    /// Parse the log and print a summary without attaching to the application.
    #[arg(long, default_value_t = false)]
    pub dry_parse: bool,
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long, value_enum)]
    pub profile: Option<CliProfile>,
    #[arg(long, hide = true, default_value_t = false)]
    pub all_sessions: bool,
    #[arg(long, hide = true, default_value_t = false)]
    pub continue_on_error: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliProfile {
    Full,
    Simple,
}

impl From<CliProfile> for ReplayProfile {
    fn from(value: CliProfile) -> Self {
        match value {
            CliProfile::Full => ReplayProfile::Full,
            CliProfile::Simple => ReplayProfile::Simple,
        }
    }
}

pub fn run() -> Result<i32, ReplayError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| ReplayError::Io(e.to_string()))?;
    let runtime = Runtime::production();
    run_with_runtime(&args, &cwd, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    cwd: &Path,
    runtime: &Runtime,
) -> Result<i32, ReplayError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(EXIT_OK);
            }
            _ => {
                runtime
                    .terminal
                    .write_error_line(error.to_string().trim_end())?;
                return Ok(error.exit_code());
            }
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.as_deref().map(|p| absolutize_path(cwd, p)),
        debugger_address: cli.debugger_address.clone(),
        profile: cli.profile.map(Into::into),
        no_prepare: cli.no_prepare,
    };
    let cfg = load_config(&overrides, runtime.file_system.as_ref())?;
    let skip_rules = cfg.skip_rules()?;

    let log_path = match cli.log.as_deref() {
        Some(path) => absolutize_path(cwd, path),
        None => match find_latest_log(runtime.file_system.as_ref(), cwd, &cfg.discovery) {
            Some(path) => path,
            None => {
                runtime.terminal.write_error_line(&format!(
                    "[log] no {}*.{} found in {}; pass --log",
                    cfg.discovery.file_prefix,
                    cfg.discovery.file_extension.trim_start_matches('.'),
                    cwd.display()
                ))?;
                return Ok(EXIT_REPLAY_FAILED);
            }
        },
    };

    let steps = match read_log(runtime.file_system.as_ref(), &log_path) {
        Ok(steps) => steps,
        Err(ReplayError::NotFound(path)) => {
            runtime
                .terminal
                .write_error_line(&format!("[log] file not found: {}", path.display()))?;
            return Ok(EXIT_REPLAY_FAILED);
        }
        Err(error) => {
            runtime
                .terminal
                .write_line(&format!("[replay] failed: {error}"))?;
            return Ok(EXIT_REPLAY_FAILED);
        }
    };
    runtime.terminal.write_line(&format!(
        "[log] file={} lines={}",
        log_path.display(),
        steps.len()
    ))?;

    if cli.dry_parse {
        runtime.terminal.write_line(&format!(
            "[dry-parse] sessions={}",
            split_sessions(&steps).len()
        ))?;
        return Ok(EXIT_OK);
    }

    if cli.continue_on_error {
        runtime
            .terminal
            .write_line("[warn] --continue-on-error is ignored; fail-fast is always used")?;
    }
    if cli.all_sessions {
        runtime
            .terminal
            .write_line("[warn] --all-sessions is ignored; full file order is already used")?;
    }

    let session = match runtime.connector.connect(&cfg.driver.debugger_address) {
        Ok(session) => session,
        Err(error) => {
            runtime
                .terminal
                .write_line(&format!("[replay] failed: {error}"))?;
            return Ok(EXIT_REPLAY_FAILED);
        }
    };

    let logger = JsonlLogger::from_config(&cfg.logging, cwd);
    let mut replayer = Replayer::new(
        session,
        Arc::clone(&runtime.clock),
        cfg.replay.profile,
        cfg.replay_timeouts(),
    )
    .with_skip_rules(skip_rules)
    .with_logger(logger);

    let options = ReplayOptions {
        prepare_home: cfg.replay.prepare_home,
        use_last_session: false,
        policy: ErrorPolicy::FailFast,
    };
    let result = replayer.replay_file(runtime.file_system.as_ref(), &log_path, options);
    replayer.close();

    match result {
        Ok(_) => {
            runtime
                .terminal
                .write_line("[replay] completed successfully")?;
            Ok(EXIT_OK)
        }
        Err(error) => {
            runtime
                .terminal
                .write_line(&format!("[replay] failed: {error}"))?;
            Ok(EXIT_REPLAY_FAILED)
        }
    }
}

fn absolutize_path(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{run_with_runtime, EXIT_OK, EXIT_REPLAY_FAILED};
    use crate::driver::fake::{FakeBrowser, FakeConnector};
    use crate::runtime::{FakeClock, FakeFileSystem, FakeTerminal, Runtime};
    use std::ffi::OsString;
    use std::path::Path;
    use std::sync::Arc;

    const LOG: &str = "{\"seq\":2,\"event\":\"click\",\"action\":\"activate\",\"testId\":\"main-sql-mode\"}\n{\"seq\":1,\"event\":\"click\",\"action\":\"activate\",\"testId\":\"main-about\"}\n";

    fn args(list: &[&str]) -> Vec<OsString> {
        std::iter::once("interaction-replay")
            .chain(list.iter().copied())
            .map(OsString::from)
            .collect()
    }

    fn runtime(fs: FakeFileSystem, terminal: &FakeTerminal, connector: FakeConnector) -> Runtime {
        Runtime {
            clock: Arc::new(FakeClock::default()),
            file_system: Arc::new(fs),
            terminal: Arc::new(terminal.clone()),
            connector: Arc::new(connector),
        }
    }

    #[test]
    fn dry_parse_reports_counts_without_connecting() {
        let terminal = FakeTerminal::default();
        let connector = FakeConnector::refusing();
        let rt = runtime(
            FakeFileSystem::with_file("/work/interaction-log-1.jsonl", LOG),
            &terminal,
            connector.clone(),
        );
        let code = run_with_runtime(
            &args(&["--log", "interaction-log-1.jsonl", "--dry-parse"]),
            Path::new("/work"),
            &rt,
        )
        .expect("run");
        assert_eq!(code, EXIT_OK);
        assert_eq!(
            terminal.written_lines(),
            vec![
                "[log] file=/work/interaction-log-1.jsonl lines=2".to_string(),
                "[dry-parse] sessions=2".to_string(),
            ]
        );
        assert!(connector.addresses().is_empty());
    }

    #[test]
    fn successful_replay_prints_summary_and_releases_driver() {
        let terminal = FakeTerminal::default();
        let browser = FakeBrowser::new();
        let connector = FakeConnector::new(browser.clone());
        let rt = runtime(
            FakeFileSystem::with_file("/work/a.jsonl", LOG),
            &terminal,
            connector.clone(),
        );
        let code = run_with_runtime(
            &args(&[
                "--log",
                "/work/a.jsonl",
                "--debugger-address",
                "127.0.0.1:9333",
                "--continue-on-error",
            ]),
            Path::new("/work"),
            &rt,
        )
        .expect("run");
        assert_eq!(code, EXIT_OK);
        assert_eq!(connector.addresses(), vec!["127.0.0.1:9333".to_string()]);
        assert_eq!(
            browser.calls(),
            vec![
                "prepare-home".to_string(),
                "invoke:sql-mode".to_string(),
                "invoke:about".to_string(),
                "quit".to_string(),
            ]
        );
        let lines = terminal.written_lines();
        assert!(lines.iter().any(|l| l.starts_with("[warn] --continue-on-error")));
        assert_eq!(lines.last().map(String::as_str), Some("[replay] completed successfully"));
    }

    #[test]
    fn failing_step_exits_two_and_still_releases_driver() {
        let terminal = FakeTerminal::default();
        let browser = FakeBrowser::new();
        browser.fail_on("about");
        let rt = runtime(
            FakeFileSystem::with_file("/work/a.jsonl", LOG),
            &terminal,
            FakeConnector::new(browser.clone()),
        );
        let code = run_with_runtime(
            &args(&["--log", "/work/a.jsonl", "--no-prepare"]),
            Path::new("/work"),
            &rt,
        )
        .expect("run");
        assert_eq!(code, EXIT_REPLAY_FAILED);
        assert_eq!(
            browser.calls(),
            vec!["invoke:sql-mode".to_string(), "quit".to_string()]
        );
        let last = terminal.written_lines().pop().expect("line");
        assert!(last.starts_with("[replay] failed: replay failed on step=2 line=2"));
    }

    #[test]
    fn missing_log_exits_two_with_a_diagnostic() {
        let terminal = FakeTerminal::default();
        let rt = runtime(FakeFileSystem::default(), &terminal, FakeConnector::refusing());
        let code = run_with_runtime(&args(&["--log", "/work/none.jsonl"]), Path::new("/work"), &rt)
            .expect("run");
        assert_eq!(code, EXIT_REPLAY_FAILED);
        assert!(terminal.error_lines()[0].contains("file not found"));
    }

    #[test]
    fn usage_errors_use_the_parser_exit_code() {
        let terminal = FakeTerminal::default();
        let rt = runtime(FakeFileSystem::default(), &terminal, FakeConnector::refusing());
        let code = run_with_runtime(&args(&["--profile", "turbo"]), Path::new("/work"), &rt)
            .expect("run");
        assert_eq!(code, 2);
        assert!(!terminal.error_lines().is_empty());
    }

    #[test]
    fn connector_failure_is_a_replay_failure() {
        let terminal = FakeTerminal::default();
        let rt = runtime(
            FakeFileSystem::with_file("/work/a.jsonl", LOG),
            &terminal,
            FakeConnector::refusing(),
        );
        let code = run_with_runtime(&args(&["--log", "/work/a.jsonl"]), Path::new("/work"), &rt)
            .expect("run");
        assert_eq!(code, EXIT_REPLAY_FAILED);
        let last = terminal.written_lines().pop().expect("line");
        assert!(last.contains("cannot reach debugger at 127.0.0.1:9222"));
    }
}
