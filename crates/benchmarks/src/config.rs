//! Audit configuration.
//!
//! The exhaustive and gentle suites are the same state machine run with
//! different [`BenchmarkProfile`] values. Configuration is layered with the
//! `config` crate:
//!
//! 1. built-in defaults ([`AuditConfig::default`])
//! 2. an optional TOML file
//! 3. `LOADSCOPE__*` environment variables (`__` separates nesting levels,
//!    e.g. `LOADSCOPE__OVERRIDES__SETTLE_DELAY_MS=1000`)
//!
//! Command-line flags are applied by the caller on top of the result.

use crate::target::Operation;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default base URL of the audited service.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "LOADSCOPE";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration source could not be read or merged.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The requested profile does not exist.
    #[error("Unknown profile '{0}' (expected 'exhaustive' or 'gentle')")]
    UnknownProfile(String),

    /// A profile could not be rendered.
    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Built-in profile presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileName {
    /// Full sample counts, short pacing.
    #[default]
    Exhaustive,
    /// Fewer samples and longer pacing to stay under target rate limits.
    Gentle,
}

impl ProfileName {
    /// Every preset, in display order.
    pub const ALL: [ProfileName; 2] = [ProfileName::Exhaustive, ProfileName::Gentle];

    /// Preset name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileName::Exhaustive => "exhaustive",
            ProfileName::Gentle => "gentle",
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exhaustive" | "full" => Ok(ProfileName::Exhaustive),
            "gentle" | "light" => Ok(ProfileName::Gentle),
            _ => Err(ConfigError::UnknownProfile(s.to_string())),
        }
    }
}

/// Sample counts and pacing for one audit run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkProfile {
    /// Samples per catalogued endpoint in the serial phases.
    pub iterations_per_endpoint: u32,
    /// Samples in the baseline phase.
    pub baseline_iterations: u32,
    /// Burst sizes for the concurrency-scaling phase, in run order.
    pub concurrency_levels: Vec<usize>,
    /// Pause inserted after every `pace_every`-th serial call.
    pub pacing_delay_ms: u64,
    /// Pacing period, in calls.
    pub pace_every: u32,
    /// Pause before the final memory snapshot.
    pub settle_delay_ms: u64,
    /// Burst size used to load the target during the memory phase.
    pub memory_burst_size: usize,
    /// Samples in the rate-limit overhead phase.
    pub rate_limit_iterations: u32,
    /// Per-call timeout for baseline and health calls.
    pub baseline_timeout_ms: u64,
    /// Per-call timeout for every other call.
    pub request_timeout_ms: u64,
}

impl BenchmarkProfile {
    /// Full suite.
    pub fn exhaustive() -> Self {
        Self {
            iterations_per_endpoint: 20,
            baseline_iterations: 10,
            concurrency_levels: vec![10, 25, 50, 100],
            pacing_delay_ms: 100,
            pace_every: 10,
            settle_delay_ms: 5_000,
            memory_burst_size: 100,
            rate_limit_iterations: 20,
            baseline_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
        }
    }

    /// Rate-limit respecting suite.
    pub fn gentle() -> Self {
        Self {
            iterations_per_endpoint: 5,
            baseline_iterations: 5,
            concurrency_levels: vec![5, 10, 20],
            pacing_delay_ms: 1_000,
            pace_every: 2,
            settle_delay_ms: 3_000,
            memory_burst_size: 20,
            rate_limit_iterations: 10,
            baseline_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
        }
    }

    /// Preset by name.
    pub fn preset(name: ProfileName) -> Self {
        match name {
            ProfileName::Exhaustive => Self::exhaustive(),
            ProfileName::Gentle => Self::gentle(),
        }
    }

    /// Pacing pause.
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    /// Settle pause.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Timeout for baseline and health calls.
    pub fn baseline_timeout(&self) -> Duration {
        Duration::from_millis(self.baseline_timeout_ms)
    }

    /// Timeout for heavier calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reject values that would make a phase meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.iterations_per_endpoint == 0 {
            return invalid("iterations_per_endpoint must be greater than 0");
        }
        if self.baseline_iterations == 0 {
            return invalid("baseline_iterations must be greater than 0");
        }
        if self.concurrency_levels.is_empty() {
            return invalid("concurrency_levels must not be empty");
        }
        if self.concurrency_levels.contains(&0) {
            return invalid("concurrency_levels must all be greater than 0");
        }
        if self.pace_every == 0 {
            return invalid("pace_every must be greater than 0");
        }
        if self.memory_burst_size == 0 {
            return invalid("memory_burst_size must be greater than 0");
        }
        if self.rate_limit_iterations == 0 {
            return invalid("rate_limit_iterations must be greater than 0");
        }
        if self.baseline_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return invalid("timeouts must be greater than 0");
        }
        Ok(())
    }

    /// Render the profile as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Per-field overrides applied on top of a preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverrides {
    /// See [`BenchmarkProfile::iterations_per_endpoint`].
    pub iterations_per_endpoint: Option<u32>,
    /// See [`BenchmarkProfile::baseline_iterations`].
    pub baseline_iterations: Option<u32>,
    /// See [`BenchmarkProfile::concurrency_levels`].
    pub concurrency_levels: Option<Vec<usize>>,
    /// See [`BenchmarkProfile::pacing_delay_ms`].
    pub pacing_delay_ms: Option<u64>,
    /// See [`BenchmarkProfile::pace_every`].
    pub pace_every: Option<u32>,
    /// See [`BenchmarkProfile::settle_delay_ms`].
    pub settle_delay_ms: Option<u64>,
    /// See [`BenchmarkProfile::memory_burst_size`].
    pub memory_burst_size: Option<usize>,
    /// See [`BenchmarkProfile::rate_limit_iterations`].
    pub rate_limit_iterations: Option<u32>,
    /// See [`BenchmarkProfile::baseline_timeout_ms`].
    pub baseline_timeout_ms: Option<u64>,
    /// See [`BenchmarkProfile::request_timeout_ms`].
    pub request_timeout_ms: Option<u64>,
}

impl ProfileOverrides {
    /// Apply the overrides to `profile`.
    pub fn apply(&self, mut profile: BenchmarkProfile) -> BenchmarkProfile {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field.clone() {
                    profile.$field = value;
                })*
            };
        }
        take!(
            iterations_per_endpoint,
            baseline_iterations,
            concurrency_levels,
            pacing_delay_ms,
            pace_every,
            settle_delay_ms,
            memory_burst_size,
            rate_limit_iterations,
            baseline_timeout_ms,
            request_timeout_ms
        );
        profile
    }
}

/// Which operations each phase drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationCatalog {
    /// Health operation; also the reachability probe and baseline.
    pub health: Operation,
    /// Endpoints measured one by one in the per-operation phase.
    pub endpoints: Vec<Operation>,
    /// Database-heavy endpoints.
    pub data_heavy: Vec<Operation>,
    /// Cache-sensitive endpoints probed cold then warm.
    pub cache_probes: Vec<Operation>,
    /// Operation routed through the rate limiter.
    pub rate_limited: Operation,
    /// Operation launched in concurrent bursts.
    pub burst: Operation,
}

impl Default for OperationCatalog {
    fn default() -> Self {
        let analytics_summary =
            Operation::get("analytics_summary", "/api/analytics/summary").with_timeout_ms(10_000);
        let list_posts = Operation::get("list_posts", "/api/posts");
        Self {
            health: Operation::get("health", "/health"),
            endpoints: vec![
                Operation::get("api_root", "/api"),
                Operation::get("list_users", "/api/users"),
                Operation::get("user_detail", "/api/users/1"),
                list_posts.clone(),
                Operation::get("search", "/api/search?q=benchmark"),
                Operation::post(
                    "login",
                    "/api/auth/login",
                    json!({"email": "benchmark@example.com", "password": "benchmark"}),
                ),
            ],
            data_heavy: vec![
                analytics_summary.clone(),
                Operation::get("analytics_trends", "/api/analytics/trends?period=30d")
                    .with_timeout_ms(10_000),
                Operation::get("reports_dashboard", "/api/reports/dashboard")
                    .with_timeout_ms(10_000),
            ],
            cache_probes: vec![analytics_summary, list_posts],
            rate_limited: Operation::get("rate_limited_ping", "/api/ping"),
            burst: Operation::get("health", "/health"),
        }
    }
}

/// Everything needed to run one audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Base URL of the service under audit.
    pub base_url: String,
    /// Preset to start from.
    pub profile: ProfileName,
    /// Per-field changes to the preset.
    pub overrides: ProfileOverrides,
    /// Operation catalogue.
    pub operations: OperationCatalog,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            profile: ProfileName::default(),
            overrides: ProfileOverrides::default(),
            operations: OperationCatalog::default(),
        }
    }
}

impl AuditConfig {
    /// Load defaults, then `path` (if any), then `LOADSCOPE__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize::<AuditConfig>()?;

        tracing::debug!(
            base_url = %config.base_url,
            profile = %config.profile,
            file = ?path,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Preset with overrides applied.
    pub fn resolved_profile(&self) -> BenchmarkProfile {
        self.overrides.apply(BenchmarkProfile::preset(self.profile))
    }

    /// Validate the base URL, the resolved profile and the catalogue.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        self.resolved_profile().validate()?;

        let catalog = &self.operations;
        let all = std::iter::once(&catalog.health)
            .chain(&catalog.endpoints)
            .chain(&catalog.data_heavy)
            .chain(&catalog.cache_probes)
            .chain([&catalog.rate_limited, &catalog.burst]);
        for op in all {
            if op.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "operation with path '{}' has an empty name",
                    op.path
                )));
            }
            if !op.path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "operation '{}' path must start with '/'",
                    op.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_presets_differ_only_in_counts_and_pacing() {
        let exhaustive = BenchmarkProfile::exhaustive();
        let gentle = BenchmarkProfile::gentle();
        assert_eq!(exhaustive.concurrency_levels, vec![10, 25, 50, 100]);
        assert!(gentle.iterations_per_endpoint < exhaustive.iterations_per_endpoint);
        assert!(gentle.pacing_delay_ms > exhaustive.pacing_delay_ms);
        assert_eq!(gentle.baseline_timeout_ms, exhaustive.baseline_timeout_ms);
        assert!(exhaustive.validate().is_ok());
        assert!(gentle.validate().is_ok());
    }

    #[test]
    fn test_profile_name_parsing() {
        assert_eq!("gentle".parse::<ProfileName>().unwrap(), ProfileName::Gentle);
        assert_eq!(
            "EXHAUSTIVE".parse::<ProfileName>().unwrap(),
            ProfileName::Exhaustive
        );
        assert!(matches!(
            "turbo".parse::<ProfileName>(),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn test_validation_rejects_degenerate_profiles() {
        let mut profile = BenchmarkProfile::gentle();
        profile.concurrency_levels = vec![];
        assert!(profile.validate().is_err());

        let mut profile = BenchmarkProfile::gentle();
        profile.concurrency_levels = vec![5, 0];
        assert!(profile.validate().is_err());

        let mut profile = BenchmarkProfile::gentle();
        profile.pace_every = 0;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_overrides_apply_on_top_of_preset() {
        let overrides = ProfileOverrides {
            settle_delay_ms: Some(10),
            concurrency_levels: Some(vec![2, 4]),
            ..ProfileOverrides::default()
        };
        let profile = overrides.apply(BenchmarkProfile::exhaustive());
        assert_eq!(profile.settle_delay_ms, 10);
        assert_eq!(profile.concurrency_levels, vec![2, 4]);
        assert_eq!(profile.iterations_per_endpoint, 20);
    }

    #[test]
    fn test_config_validation() {
        let mut config = AuditConfig::default();
        assert!(config.validate().is_ok());

        config.base_url = "localhost:3000".to_string();
        assert!(config.validate().is_err());

        let mut config = AuditConfig::default();
        config.operations.endpoints.push(Operation::get("bad", "api/x"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = temp_config_file("loadscope-config-test.toml");
        writeln!(
            file.1,
            r#"
base_url = "http://127.0.0.1:8080"
profile = "gentle"

[overrides]
settle_delay_ms = 250
concurrency_levels = [3, 6]

[operations]
endpoints = [{{ name = "items", path = "/items" }}]
"#
        )
        .unwrap();
        drop(file.1);

        let config = AuditConfig::load(Some(&file.0)).unwrap();
        std::fs::remove_file(&file.0).ok();

        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.profile, ProfileName::Gentle);
        assert_eq!(config.operations.endpoints.len(), 1);
        assert_eq!(config.operations.endpoints[0].name, "items");
        assert_eq!(config.operations.health.path, "/health");

        let profile = config.resolved_profile();
        assert_eq!(profile.settle_delay_ms, 250);
        assert_eq!(profile.concurrency_levels, vec![3, 6]);
        assert_eq!(profile.iterations_per_endpoint, 5);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let path = std::env::temp_dir().join("loadscope-definitely-missing.toml");
        assert!(matches!(
            AuditConfig::load(Some(&path)),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_profile_renders_as_toml() {
        let rendered = BenchmarkProfile::gentle().to_toml().unwrap();
        assert!(rendered.contains("iterations_per_endpoint = 5"));
        assert!(rendered.contains("settle_delay_ms = 3000"));
    }

    fn temp_config_file(name: &str) -> (std::path::PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        let file = std::fs::File::create(&path).unwrap();
        (path, file)
    }
}
