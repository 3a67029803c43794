//! # Server Configuration
//!
//! Everything tunable, loaded once at startup from TOML.
//!
//! ```toml
//! role = "authority"
//!
//! [history]
//! window_seconds = 1.0
//! capture_hz = 60.0
//!
//! [rewind]
//! global_max_ms = 400.0
//!
//! [rate_limit]
//! rate = 20.0
//! burst = 30.0
//!
//! [validation]
//! forgiveness = 0.05
//! part_forgiveness = { Head = 0.0 }
//! friendly_fire = false
//!
//! [clock]
//! policy = "median"
//!
//! [[weapons]]
//! id = "rifle"
//! max_distance = 300.0
//! ```
//!
//! Every section and every field is optional. Mistakes here are fatal and
//! reported as [`ConfigError`]; nothing in this module runs per request.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use rewind_core::{HistoryConfig, HistoryError, PoseRegistry, TimeSource};
use rewind_security::{RateLimit, RateLimitError, ValidationContext};
use rewind_shared::constants::{
    DEFAULT_CLOCK_ALPHA, DEFAULT_CLOCK_BURST_SAMPLES, DEFAULT_CLOCK_INTERVAL_SECONDS,
    DEFAULT_CLOCK_SAMPLE_TIMEOUT_SECONDS, DEFAULT_DEDUP_WINDOW_SECONDS, DEFAULT_HEAD_PART, DEFAULT_MAX_RAY_DISTANCE,
    DEFAULT_MEDIAN_MIN_SAMPLES, DEFAULT_MEDIAN_WINDOW, DEFAULT_ORIGIN_MARGIN, DEFAULT_RATE_BURST,
    DEFAULT_RATE_PER_SECOND, GLOBAL_MAX_REWIND_MS,
};
use rewind_shared::{HitEvent, PartName};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{ClockConfigError, ClockSyncConfig, SmoothingPolicy};
use crate::server::{
    CompensatorSettings, LagCompensator, Role, TelemetrySink, WeaponError, WeaponProfile,
    DEFAULT_TELEMETRY_CAPACITY,
};

/// Fatal configuration mistake.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Not valid TOML, or wrong field types.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Bad history sizing.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Bad rate limit.
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    /// Bad clock tuning.
    #[error(transparent)]
    Clock(#[from] ClockConfigError),

    /// Bad weapon profile.
    #[error(transparent)]
    Weapon(#[from] WeaponError),

    /// Any other out-of-range value.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// `[rewind]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewindSection {
    /// Hard cap on rewind for every weapon.
    pub global_max_ms: f64,
}

impl Default for RewindSection {
    fn default() -> Self {
        Self { global_max_ms: GLOBAL_MAX_REWIND_MS }
    }
}

/// `[rate_limit]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    /// Tokens per second.
    pub rate: f64,
    /// Bucket size.
    pub burst: f64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self { rate: DEFAULT_RATE_PER_SECOND, burst: DEFAULT_RATE_BURST }
    }
}

/// `[dedup]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSection {
    /// Seconds a shot id is remembered.
    pub window_seconds: f64,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self { window_seconds: DEFAULT_DEDUP_WINDOW_SECONDS }
    }
}

/// How ray hits are refined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetraceKind {
    /// Keep the analytic contact.
    #[default]
    Analytic,
    /// Re-cast against ghost geometry in the host scene.
    Ghost,
}

/// `[validation]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    /// Absolute ray travel limit.
    pub max_ray_distance: f32,
    /// Margin on every part.
    pub forgiveness: f32,
    /// Per-part margins replacing `forgiveness`.
    pub part_forgiveness: BTreeMap<PartName, f32>,
    /// Whether the head part can be hit at all.
    pub allow_headshots: bool,
    /// Name of the head part.
    pub head_part: PartName,
    /// Slack on the origin sanity check.
    pub origin_margin: f32,
    /// Whether same-team hits land.
    pub friendly_fire: bool,
    /// Hit refinement strategy.
    pub retrace: RetraceKind,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            max_ray_distance: DEFAULT_MAX_RAY_DISTANCE,
            forgiveness: 0.0,
            part_forgiveness: BTreeMap::new(),
            allow_headshots: true,
            head_part: DEFAULT_HEAD_PART.to_string(),
            origin_margin: DEFAULT_ORIGIN_MARGIN,
            friendly_fire: false,
            retrace: RetraceKind::Analytic,
        }
    }
}

/// Smoothing policy name in `[clock]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Lowest-RTT sample per burst through an EMA.
    MinRtt,
    /// Every sample through an EMA.
    EverySample,
    /// Median of a rolling window.
    #[default]
    Median,
}

/// `[clock]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSection {
    /// Seconds between bursts.
    pub interval_seconds: f64,
    /// Round trips per burst.
    pub burst_samples: usize,
    /// Seconds before a round trip is abandoned.
    pub sample_timeout_seconds: f64,
    /// Smoothing policy.
    pub policy: PolicyKind,
    /// EMA factor for the EMA policies.
    pub alpha: f64,
    /// Window of the median policy.
    pub median_window: usize,
    /// Samples before the median policy locks.
    pub median_min_samples: usize,
}

impl Default for ClockSection {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_CLOCK_INTERVAL_SECONDS,
            burst_samples: DEFAULT_CLOCK_BURST_SAMPLES,
            sample_timeout_seconds: DEFAULT_CLOCK_SAMPLE_TIMEOUT_SECONDS,
            policy: PolicyKind::Median,
            alpha: DEFAULT_CLOCK_ALPHA,
            median_window: DEFAULT_MEDIAN_WINDOW,
            median_min_samples: DEFAULT_MEDIAN_MIN_SAMPLES,
        }
    }
}

/// `[telemetry]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    /// Publish events at all.
    pub enabled: bool,
    /// Channel depth.
    pub capacity: usize,
    /// Attach rewound pose and query geometry.
    pub verbose: bool,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self { enabled: true, capacity: DEFAULT_TELEMETRY_CAPACITY, verbose: false }
    }
}

/// Whole server configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewindConfig {
    /// Authority or replica.
    pub role: Role,
    /// Pose history sizing.
    pub history: HistoryConfig,
    /// Rewind caps.
    pub rewind: RewindSection,
    /// Per-caller request budget.
    pub rate_limit: RateLimitSection,
    /// Duplicate suppression.
    pub dedup: DedupSection,
    /// Validator tuning.
    pub validation: ValidationSection,
    /// Clock reconciliation.
    pub clock: ClockSection,
    /// Telemetry channel.
    pub telemetry: TelemetrySection,
    /// Weapon profiles defined at startup.
    pub weapons: Vec<WeaponProfile>,
}

impl RewindConfig {
    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Parse or validation failure.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// I/O, parse or validation failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), weapons = config.weapons.len(), "config loaded");
        Ok(config)
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// The first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.history.validate()?;
        RateLimit::new(self.rate_limit.rate, self.rate_limit.burst)?;
        self.clock_sync_config()?.validate()?;

        non_negative("rewind.global_max_ms", self.rewind.global_max_ms)?;
        non_negative("dedup.window_seconds", self.dedup.window_seconds)?;
        non_negative("validation.max_ray_distance", f64::from(self.validation.max_ray_distance))?;
        non_negative("validation.forgiveness", f64::from(self.validation.forgiveness))?;
        non_negative("validation.origin_margin", f64::from(self.validation.origin_margin))?;
        for margin in self.validation.part_forgiveness.values() {
            non_negative("validation.part_forgiveness", f64::from(*margin))?;
        }

        let mut seen = std::collections::HashSet::new();
        for weapon in &self.weapons {
            weapon.validate()?;
            if !seen.insert(weapon.id.as_str()) {
                tracing::warn!(weapon = %weapon.id, "weapon defined twice, last definition wins");
            }
        }
        if self.telemetry.enabled && self.telemetry.capacity == 0 {
            tracing::warn!("telemetry capacity is zero, using one slot");
        }
        Ok(())
    }

    /// Orchestrator tuning.
    ///
    /// # Errors
    ///
    /// Invalid rate limit.
    pub fn settings(&self) -> Result<CompensatorSettings, ConfigError> {
        Ok(CompensatorSettings {
            role: self.role,
            global_max_rewind_ms: self.rewind.global_max_ms,
            rate_limit: RateLimit::new(self.rate_limit.rate, self.rate_limit.burst)?,
            dedup_window: self.dedup.window_seconds,
            origin_margin: self.validation.origin_margin,
            friendly_fire: self.validation.friendly_fire,
            validation: ValidationContext {
                max_ray_distance: self.validation.max_ray_distance,
                forgiveness: self.validation.forgiveness,
                part_forgiveness: self.validation.part_forgiveness.clone(),
                allow_headshots: self.validation.allow_headshots,
                head_part: self.validation.head_part.clone(),
            },
        })
    }

    /// Clock task tuning.
    ///
    /// # Errors
    ///
    /// Non-positive or non-finite durations.
    pub fn clock_sync_config(&self) -> Result<ClockSyncConfig, ConfigError> {
        let clock = &self.clock;
        let policy = match clock.policy {
            PolicyKind::MinRtt => SmoothingPolicy::MinRtt { alpha: clock.alpha },
            PolicyKind::EverySample => SmoothingPolicy::EverySample { alpha: clock.alpha },
            PolicyKind::Median => {
                SmoothingPolicy::Median { window: clock.median_window, min_samples: clock.median_min_samples }
            }
        };
        Ok(ClockSyncConfig {
            interval: seconds("clock.interval_seconds", clock.interval_seconds)?,
            burst_samples: clock.burst_samples,
            sample_timeout: seconds("clock.sample_timeout_seconds", clock.sample_timeout_seconds)?,
            policy,
        })
    }

    /// Builds a registry and an orchestrator with every configured weapon.
    ///
    /// Returns the telemetry receiver when telemetry is enabled.
    ///
    /// # Errors
    ///
    /// Any invalid section.
    pub fn build(
        &self,
        clock: Arc<dyn TimeSource>,
    ) -> Result<(LagCompensator, Option<Receiver<HitEvent>>), ConfigError> {
        let registry = PoseRegistry::new(self.history.clone())?.into_shared();
        let (telemetry, events) = if self.telemetry.enabled {
            let (sink, rx) = TelemetrySink::bounded(self.telemetry.capacity, self.telemetry.verbose);
            (sink, Some(rx))
        } else {
            (TelemetrySink::disabled(), None)
        };
        let server = LagCompensator::new(self.settings()?, registry, clock).with_telemetry(telemetry);
        for weapon in &self.weapons {
            server.define_weapon(weapon.clone())?;
        }
        Ok((server, events))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason: format!("must be finite and non-negative, got {value}") })
    }
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(Duration::from_secs_f64(value))
    } else {
        Err(ConfigError::Invalid { field, reason: format!("must be a positive number of seconds, got {value}") })
    }
}
