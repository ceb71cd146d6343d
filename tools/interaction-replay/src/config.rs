use crate::errors::ReplayError;
use crate::logging::{DEFAULT_DISK_BUDGET_BYTES, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::replay::rules::{default_rules, SkipRule, SkipRuleSpec};
use crate::runtime::FileSystem;
use crate::types::{ReplayProfile, ReplayTimeouts};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DEBUGGER_ADDRESS: &str = "127.0.0.1:9222";
pub const MAX_TIMEOUT_SECONDS: u64 = 24 * 60 * 60;
pub const MAX_POLL_INTERVAL_MILLIS: u64 = MAX_TIMEOUT_SECONDS * 1000;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub debugger_address: Option<String>,
    pub profile: Option<ReplayProfile>,
    pub no_prepare: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub replay: ReplaySection,
    pub driver: DriverConfig,
    pub timeouts: TimeoutsConfig,
    pub discovery: DiscoveryConfig,
    pub logging: LoggingConfig,
    pub skip_rules: Vec<SkipRuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplaySection {
    pub profile: ReplayProfile,
    pub prepare_home: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriverConfig {
    pub debugger_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutsConfig {
    pub preview_seconds: u64,
    pub export_seconds: u64,
    pub success_seconds: u64,
    pub locate_seconds: u64,
    pub connections_seconds: u64,
    pub poll_interval_millis: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub file_prefix: String,
    pub file_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub run_log: Option<PathBuf>,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            file_prefix: "interaction-log-".to_string(),
            file_extension: "jsonl".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let timeouts = ReplayTimeouts::default();
        Self {
            replay: ReplaySection {
                profile: ReplayProfile::Full,
                prepare_home: true,
            },
            driver: DriverConfig {
                debugger_address: DEFAULT_DEBUGGER_ADDRESS.to_string(),
            },
            timeouts: TimeoutsConfig {
                preview_seconds: timeouts.preview.as_secs(),
                export_seconds: timeouts.export.as_secs(),
                success_seconds: timeouts.success.as_secs(),
                locate_seconds: timeouts.locate.as_secs(),
                connections_seconds: timeouts.connections.as_secs(),
                poll_interval_millis: timeouts.poll_interval.as_millis() as u64,
            },
            discovery: DiscoveryConfig::default(),
            logging: LoggingConfig {
                run_log: None,
                max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
                budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
            },
            skip_rules: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn replay_timeouts(&self) -> ReplayTimeouts {
        ReplayTimeouts {
            preview: Duration::from_secs(self.timeouts.preview_seconds),
            export: Duration::from_secs(self.timeouts.export_seconds),
            success: Duration::from_secs(self.timeouts.success_seconds),
            locate: Duration::from_secs(self.timeouts.locate_seconds),
            connections: Duration::from_secs(self.timeouts.connections_seconds),
            poll_interval: Duration::from_millis(self.timeouts.poll_interval_millis),
        }
    }

    /// Profile defaults followed by configured rules.
    pub fn skip_rules(&self) -> Result<Vec<SkipRule>, ReplayError> {
        let mut rules = default_rules(self.replay.profile);
        for spec in &self.skip_rules {
            rules.push(SkipRule::from_spec(spec)?);
        }
        Ok(rules)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialAppConfig {
    replay: Option<PartialReplaySection>,
    driver: Option<PartialDriverConfig>,
    timeouts: Option<PartialTimeoutsConfig>,
    discovery: Option<PartialDiscoveryConfig>,
    logging: Option<PartialLoggingConfig>,
    skip_rules: Option<Vec<SkipRuleSpec>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialReplaySection {
    profile: Option<ReplayProfile>,
    prepare_home: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialDriverConfig {
    debugger_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialTimeoutsConfig {
    preview_seconds: Option<u64>,
    export_seconds: Option<u64>,
    success_seconds: Option<u64>,
    locate_seconds: Option<u64>,
    connections_seconds: Option<u64>,
    poll_interval_millis: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialDiscoveryConfig {
    file_prefix: Option<String>,
    file_extension: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLoggingConfig {
    run_log: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
    budget_bytes: Option<u64>,
}

pub fn load_config(
    overrides: &CliOverrides,
    fs: &dyn FileSystem,
) -> Result<AppConfig, ReplayError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let file_contents = fs.read_to_string(path)?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| ReplayError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(replay) = partial.replay {
        if let Some(profile) = replay.profile {
            cfg.replay.profile = profile;
        }
        if let Some(prepare_home) = replay.prepare_home {
            cfg.replay.prepare_home = prepare_home;
        }
    }

    if let Some(driver) = partial.driver {
        if let Some(address) = driver.debugger_address {
            cfg.driver.debugger_address = address;
        }
    }

    if let Some(timeouts) = partial.timeouts {
        if let Some(value) = timeouts.preview_seconds {
            cfg.timeouts.preview_seconds = value;
        }
        if let Some(value) = timeouts.export_seconds {
            cfg.timeouts.export_seconds = value;
        }
        if let Some(value) = timeouts.success_seconds {
            cfg.timeouts.success_seconds = value;
        }
        if let Some(value) = timeouts.locate_seconds {
            cfg.timeouts.locate_seconds = value;
        }
        if let Some(value) = timeouts.connections_seconds {
            cfg.timeouts.connections_seconds = value;
        }
        if let Some(value) = timeouts.poll_interval_millis {
            cfg.timeouts.poll_interval_millis = value;
        }
    }

    if let Some(discovery) = partial.discovery {
        if let Some(value) = discovery.file_prefix {
            cfg.discovery.file_prefix = value;
        }
        if let Some(value) = discovery.file_extension {
            cfg.discovery.file_extension = value;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(value) = logging.run_log {
            cfg.logging.run_log = Some(value);
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
        if let Some(value) = logging.budget_bytes {
            cfg.logging.budget_bytes = value;
        }
    }

    if let Some(rules) = partial.skip_rules {
        cfg.skip_rules = rules;
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(address) = &overrides.debugger_address {
        cfg.driver.debugger_address = address.clone();
    }
    if let Some(profile) = overrides.profile {
        cfg.replay.profile = profile;
    }
    if overrides.no_prepare {
        cfg.replay.prepare_home = false;
    }
}

fn validate_config(cfg: &AppConfig) -> Result<(), ReplayError> {
    if cfg.driver.debugger_address.trim().is_empty() {
        return Err(ReplayError::InvalidConfig(
            "driver.debugger_address must not be empty".to_string(),
        ));
    }

    if cfg.timeouts.poll_interval_millis == 0 {
        return Err(ReplayError::InvalidConfig(
            "timeouts.poll_interval_millis must be greater than zero".to_string(),
        ));
    }

    if cfg.timeouts.poll_interval_millis > MAX_POLL_INTERVAL_MILLIS {
        return Err(ReplayError::InvalidConfig(format!(
            "timeouts.poll_interval_millis must be at most {MAX_POLL_INTERVAL_MILLIS}"
        )));
    }

    let zero_timeouts = [
        ("preview_seconds", cfg.timeouts.preview_seconds),
        ("export_seconds", cfg.timeouts.export_seconds),
        ("success_seconds", cfg.timeouts.success_seconds),
        ("connections_seconds", cfg.timeouts.connections_seconds),
    ];
    if let Some((name, _)) = zero_timeouts.iter().find(|(_, value)| *value == 0) {
        return Err(ReplayError::InvalidConfig(format!(
            "timeouts.{name} must be greater than zero"
        )));
    }

    let all_timeouts = zero_timeouts
        .iter()
        .copied()
        .chain(std::iter::once(("locate_seconds", cfg.timeouts.locate_seconds)));
    for (name, value) in all_timeouts {
        if value > MAX_TIMEOUT_SECONDS {
            return Err(ReplayError::InvalidConfig(format!(
                "timeouts.{name} must be at most {MAX_TIMEOUT_SECONDS}"
            )));
        }
    }

    if cfg.discovery.file_prefix.trim().is_empty()
        || cfg.discovery.file_extension.trim_start_matches('.').is_empty()
    {
        return Err(ReplayError::InvalidConfig(
            "discovery.file_prefix and discovery.file_extension must not be empty".to_string(),
        ));
    }

    if cfg.logging.max_payload_bytes < 16 {
        return Err(ReplayError::InvalidConfig(
            "logging.max_payload_bytes must be at least 16".to_string(),
        ));
    }

    for spec in &cfg.skip_rules {
        SkipRule::from_spec(spec)?;
    }

    Ok(())
}
