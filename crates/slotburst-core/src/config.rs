//! slotburst.toml configuration parser.
//!
//! The file format ([`BurstConfig`]) keeps every field optional so the
//! daemon can layer CLI flags and environment variables on top. Once
//! merged, [`BurstConfig::validate`] produces the immutable [`Settings`]
//! that the controller is built from.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{CapacityError, CapacityResult};
use crate::types::Scope;

/// Region used when a request does not name one.
pub const DEFAULT_REGION: &str = "US";

/// Reversal delay used when a request does not name one.
pub const DEFAULT_REVERSAL_DELAY: Duration = Duration::from_secs(60);

/// Longest delay a deferred-task service will typically accept.
pub const MAX_REVERSAL_DELAY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

// ── File format ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BurstConfig {
    pub budget: Option<BudgetConfig>,
    pub ledger: Option<BackendConfig>,
    pub tasks: Option<TasksConfig>,
    pub callback: Option<CallbackConfig>,
    pub timeouts: Option<TimeoutsConfig>,
    pub timers: Option<Vec<TimerConfig>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Ceiling on aggregate outstanding slots.
    pub max_slots: Option<i64>,
    /// Administrative domain requests default to.
    pub domain: Option<String>,
    pub default_region: Option<String>,
    pub default_reversal_delay: Option<String>,
    pub max_reversal_delay: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// `memory` or an `http(s)://` base URL.
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasksConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub queue_id: Option<String>,
    pub queue_location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Canonical externally-reachable address of this service.
    pub public_base_url: Option<String>,
    /// Scheme used when the address is taken from the inbound `Host`.
    pub scheme: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Upper bound on a single remote call.
    pub call: Option<String>,
    /// Upper bound on one whole trigger.
    pub request: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    pub every: String,
    pub domain: Option<String>,
    pub region: Option<String>,
    pub requested_increment: i64,
    pub reversal_delay: Option<String>,
}

impl BurstConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn budget_mut(&mut self) -> &mut BudgetConfig {
        self.budget.get_or_insert_with(Default::default)
    }

    pub fn ledger_mut(&mut self) -> &mut BackendConfig {
        self.ledger.get_or_insert_with(Default::default)
    }

    pub fn tasks_mut(&mut self) -> &mut TasksConfig {
        self.tasks.get_or_insert_with(Default::default)
    }

    pub fn callback_mut(&mut self) -> &mut CallbackConfig {
        self.callback.get_or_insert_with(Default::default)
    }

    /// Check every setting and resolve defaults.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let budget = self.budget.clone().unwrap_or_default();

        let ceiling = budget.max_slots.ok_or(ConfigError::Missing("budget.max_slots"))?;
        if ceiling <= 0 {
            return Err(invalid(
                "budget.max_slots",
                format!("must be greater than zero, got {ceiling}"),
            ));
        }

        let domain = non_empty(budget.domain).ok_or(ConfigError::Missing("budget.domain"))?;
        let default_region =
            non_empty(budget.default_region).unwrap_or_else(|| DEFAULT_REGION.to_string());

        let default_delay = match budget.default_reversal_delay {
            Some(s) => parse_duration("budget.default_reversal_delay", &s)?,
            None => DEFAULT_REVERSAL_DELAY,
        };
        let max_delay = match budget.max_reversal_delay {
            Some(s) => parse_duration("budget.max_reversal_delay", &s)?,
            None => MAX_REVERSAL_DELAY,
        };
        if default_delay > max_delay {
            return Err(invalid(
                "budget.default_reversal_delay",
                format!("{default_delay:?} exceeds max_reversal_delay {max_delay:?}"),
            ));
        }
        let delay = DelayPolicy {
            default: default_delay,
            max: max_delay,
        };

        let ledger_cfg = self.ledger.clone().unwrap_or_default();
        let ledger = Backend::parse("ledger.url", ledger_cfg.url, ledger_cfg.token)?;

        let tasks_cfg = self.tasks.clone().unwrap_or_default();
        let tasks = TaskSettings {
            backend: Backend::parse("tasks.url", tasks_cfg.url, tasks_cfg.token)?,
            queue_id: non_empty(tasks_cfg.queue_id).ok_or(ConfigError::Missing("tasks.queue_id"))?,
            queue_location: non_empty(tasks_cfg.queue_location)
                .ok_or(ConfigError::Missing("tasks.queue_location"))?,
        };

        let callback_cfg = self.callback.clone().unwrap_or_default();
        let public_base_url = match non_empty(callback_cfg.public_base_url) {
            Some(url) => {
                if !is_http_url(&url) {
                    return Err(invalid(
                        "callback.public_base_url",
                        format!("expected an http(s) URL, got {url:?}"),
                    ));
                }
                Some(url.trim_end_matches('/').to_string())
            }
            None => None,
        };
        let scheme = non_empty(callback_cfg.scheme).unwrap_or_else(|| "https".to_string());
        if scheme != "http" && scheme != "https" {
            return Err(invalid("callback.scheme", format!("unsupported scheme {scheme:?}")));
        }
        let callback = CallbackSettings {
            public_base_url,
            scheme,
        };

        let timeouts_cfg = self.timeouts.clone().unwrap_or_default();
        let call_timeout = match timeouts_cfg.call {
            Some(s) => parse_duration("timeouts.call", &s)?,
            None => Duration::from_secs(10),
        };
        let request_timeout = match timeouts_cfg.request {
            Some(s) => parse_duration("timeouts.request", &s)?,
            None => Duration::from_secs(30),
        };
        if call_timeout.is_zero() {
            return Err(invalid("timeouts.call", "must be greater than zero"));
        }
        if request_timeout.is_zero() {
            return Err(invalid("timeouts.request", "must be greater than zero"));
        }

        let mut timers = Vec::new();
        for timer in self.timers.iter().flatten() {
            if callback.public_base_url.is_none() {
                return Err(invalid(
                    "timers",
                    "timer triggers need callback.public_base_url to address the release callback",
                ));
            }
            let every = parse_duration("timers.every", &timer.every)?;
            if every.is_zero() {
                return Err(invalid("timers.every", "must be greater than zero"));
            }
            if timer.requested_increment <= 0 {
                return Err(invalid(
                    "timers.requested_increment",
                    format!("must be greater than zero, got {}", timer.requested_increment),
                ));
            }
            let scope = Scope::new(
                timer.domain.clone().unwrap_or_else(|| domain.clone()),
                timer.region.clone().unwrap_or_else(|| default_region.clone()),
            )
            .map_err(|e| invalid("timers", e.to_string()))?;
            let reversal_delay = match &timer.reversal_delay {
                Some(s) => parse_duration("timers.reversal_delay", s)?,
                None => delay.default,
            };
            delay
                .resolve(Some(reversal_delay))
                .map_err(|e| invalid("timers.reversal_delay", e.to_string()))?;
            timers.push(TimerSpec {
                every,
                scope,
                requested_increment: timer.requested_increment,
                reversal_delay,
            });
        }

        Ok(Settings {
            ceiling,
            domain,
            default_region,
            ledger,
            tasks,
            callback,
            call_timeout,
            request_timeout,
            delay,
            timers,
        })
    }
}

// ── Validated settings ─────────────────────────────────────────────

/// Immutable, validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub ceiling: i64,
    pub domain: String,
    pub default_region: String,
    pub ledger: Backend,
    pub tasks: TaskSettings,
    pub callback: CallbackSettings,
    pub call_timeout: Duration,
    pub request_timeout: Duration,
    pub delay: DelayPolicy,
    pub timers: Vec<TimerSpec>,
}

/// Where a remote collaborator lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// In-process implementation, for local runs.
    Memory,
    Http {
        base_url: String,
        token: Option<String>,
    },
}

impl Backend {
    fn parse(
        field: &'static str,
        url: Option<String>,
        token: Option<String>,
    ) -> Result<Self, ConfigError> {
        let url = non_empty(url).ok_or(ConfigError::Missing(field))?;
        if url == "memory" {
            return Ok(Backend::Memory);
        }
        if !is_http_url(&url) {
            return Err(invalid(
                field,
                format!("expected \"memory\" or an http(s) URL, got {url:?}"),
            ));
        }
        Ok(Backend::Http {
            base_url: url.trim_end_matches('/').to_string(),
            token: non_empty(token),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSettings {
    pub backend: Backend,
    pub queue_id: String,
    pub queue_location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackSettings {
    pub public_base_url: Option<String>,
    pub scheme: String,
}

/// Default and upper bound for reversal delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    pub default: Duration,
    pub max: Duration,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            default: DEFAULT_REVERSAL_DELAY,
            max: MAX_REVERSAL_DELAY,
        }
    }
}

impl DelayPolicy {
    /// Apply the default and check bounds.
    pub fn resolve(&self, requested: Option<Duration>) -> CapacityResult<Duration> {
        let delay = requested.unwrap_or(self.default);
        if delay.is_zero() {
            return Err(CapacityError::InvalidInput(
                "reversal delay must be positive".into(),
            ));
        }
        if delay > self.max {
            return Err(CapacityError::InvalidInput(format!(
                "reversal delay {}s exceeds maximum {}s",
                delay.as_secs(),
                self.max.as_secs()
            )));
        }
        Ok(delay)
    }
}

/// A periodic add-capacity trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSpec {
    pub every: Duration,
    pub scope: Scope,
    pub requested_increment: i64,
    pub reversal_delay: Duration,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Parse a duration string like "500ms", "30s", "5m", "2h", "1d".
///
/// A bare number is read as seconds.
pub fn parse_duration(field: &'static str, s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let bad = || invalid(field, format!("unparseable duration {s:?}"));
    let (digits, unit_secs, millis) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 0, true)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1, false)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60, false)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 60 * 60, false)
    } else if let Some(days) = s.strip_suffix('d') {
        (days, 24 * 60 * 60, false)
    } else {
        (s, 1, false)
    };
    let n: u64 = digits.trim().parse().map_err(|_| bad())?;
    if millis {
        return Ok(Duration::from_millis(n));
    }
    n.checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(bad)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[budget]
max_slots = 500
domain = "analytics-admin"
default_region = "EU"
default_reversal_delay = "5m"

[ledger]
url = "https://ledger.internal/"
token = "s3cret"

[tasks]
url = "memory"
queue_id = "slot-reversals"
queue_location = "us-central1"

[callback]
public_base_url = "https://burst.example.com/"

[timeouts]
call = "5s"
request = "20s"

[[timers]]
every = "1h"
requested_increment = 100
reversal_delay = "30m"
"#;

    fn minimal() -> BurstConfig {
        BurstConfig::from_toml_str(
            r#"
[budget]
max_slots = 500
domain = "analytics-admin"

[ledger]
url = "memory"

[tasks]
url = "memory"
queue_id = "q"
queue_location = "us-central1"
"#,
        )
        .unwrap()
    }

    #[test]
    fn parse_full_config() {
        let settings = BurstConfig::from_toml_str(FULL).unwrap().validate().unwrap();
        assert_eq!(settings.ceiling, 500);
        assert_eq!(settings.default_region, "EU");
        assert_eq!(settings.delay.default, Duration::from_secs(300));
        assert_eq!(
            settings.ledger,
            Backend::Http {
                base_url: "https://ledger.internal".into(),
                token: Some("s3cret".into()),
            }
        );
        assert_eq!(settings.tasks.backend, Backend::Memory);
        assert_eq!(
            settings.callback.public_base_url.as_deref(),
            Some("https://burst.example.com")
        );
        assert_eq!(settings.call_timeout, Duration::from_secs(5));
        assert_eq!(settings.timers.len(), 1);
        assert_eq!(settings.timers[0].scope, Scope::new("analytics-admin", "EU").unwrap());
        assert_eq!(settings.timers[0].reversal_delay, Duration::from_secs(1800));
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let settings = minimal().validate().unwrap();
        assert_eq!(settings.default_region, DEFAULT_REGION);
        assert_eq!(settings.delay, DelayPolicy::default());
        assert_eq!(settings.callback.scheme, "https");
        assert!(settings.callback.public_base_url.is_none());
        assert!(settings.timers.is_empty());
    }

    #[test]
    fn ceiling_must_be_positive() {
        let mut cfg = minimal();
        cfg.budget_mut().max_slots = Some(0);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "budget.max_slots", .. })
        ));
        cfg.budget_mut().max_slots = None;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Missing("budget.max_slots"))
        ));
    }

    #[test]
    fn queue_is_required() {
        let mut cfg = minimal();
        cfg.tasks_mut().queue_id = Some("  ".into());
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Missing("tasks.queue_id"))
        ));
    }

    #[test]
    fn backend_url_must_be_http_or_memory() {
        let mut cfg = minimal();
        cfg.ledger_mut().url = Some("ftp://ledger".into());
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "ledger.url", .. })
        ));
    }

    #[test]
    fn timers_need_public_base_url() {
        let mut cfg = minimal();
        cfg.timers = Some(vec![TimerConfig {
            every: "10m".into(),
            domain: None,
            region: None,
            requested_increment: 50,
            reversal_delay: None,
        }]);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "timers", .. })
        ));
        cfg.callback_mut().public_base_url = Some("https://burst.example.com".into());
        assert_eq!(cfg.validate().unwrap().timers.len(), 1);
    }

    #[test]
    fn delay_policy_bounds() {
        let policy = DelayPolicy {
            default: Duration::from_secs(60),
            max: Duration::from_secs(3600),
        };
        assert_eq!(policy.resolve(None).unwrap(), Duration::from_secs(60));
        assert_eq!(
            policy.resolve(Some(Duration::from_secs(120))).unwrap(),
            Duration::from_secs(120)
        );
        assert!(policy.resolve(Some(Duration::ZERO)).is_err());
        assert!(policy.resolve(Some(Duration::from_secs(3601))).is_err());
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("t", "500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("t", "30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("t", "5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("t", "2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("t", "1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("t", "10").unwrap(), Duration::from_secs(10));
        assert!(parse_duration("t", "soon").is_err());
    }
}
