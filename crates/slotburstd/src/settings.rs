//! Startup configuration: config file, then flags and environment.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use slotburst_core::config::{Backend, BurstConfig, Settings};

/// Settings shared by every subcommand. Flags override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Path to slotburst.toml.
    #[arg(long, env = "SLOTBURST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Ceiling on aggregate outstanding slots.
    #[arg(long, env = "MAX_SLOTS")]
    pub max_slots: Option<i64>,

    /// Administrative domain; falls back to GOOGLE_CLOUD_PROJECT.
    #[arg(long, env = "DOMAIN")]
    pub domain: Option<String>,

    #[arg(long, env = "DEFAULT_REGION")]
    pub default_region: Option<String>,

    /// Ledger base URL, or `memory`.
    #[arg(long, env = "LEDGER_URL")]
    pub ledger_url: Option<String>,

    #[arg(long, env = "LEDGER_TOKEN", hide_env_values = true)]
    pub ledger_token: Option<String>,

    /// Deferred-task service base URL, or `memory`.
    #[arg(long, env = "TASKS_URL")]
    pub tasks_url: Option<String>,

    #[arg(long, env = "TASKS_TOKEN", hide_env_values = true)]
    pub tasks_token: Option<String>,

    #[arg(long, env = "QUEUE_ID")]
    pub queue_id: Option<String>,

    #[arg(long, env = "QUEUE_LOCATION")]
    pub queue_location: Option<String>,

    /// Canonical external address of this service.
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,
}

impl SettingsArgs {
    /// Load, merge, and validate.
    pub fn load(&self) -> anyhow::Result<Settings> {
        let mut config = match &self.config {
            Some(path) => BurstConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => BurstConfig::default(),
        };
        self.apply(&mut config, std::env::var("GOOGLE_CLOUD_PROJECT").ok());
        config.validate().context("invalid configuration")
    }

    /// Layer flags over `config`.
    pub fn apply(&self, config: &mut BurstConfig, project_fallback: Option<String>) {
        let budget = config.budget_mut();
        if self.max_slots.is_some() {
            budget.max_slots = self.max_slots;
        }
        if self.domain.is_some() {
            budget.domain = self.domain.clone();
        }
        if budget.domain.is_none() {
            budget.domain = project_fallback;
        }
        if self.default_region.is_some() {
            budget.default_region = self.default_region.clone();
        }

        let ledger = config.ledger_mut();
        if self.ledger_url.is_some() {
            ledger.url = self.ledger_url.clone();
        }
        if self.ledger_token.is_some() {
            ledger.token = self.ledger_token.clone();
        }

        let tasks = config.tasks_mut();
        if self.tasks_url.is_some() {
            tasks.url = self.tasks_url.clone();
        }
        if self.tasks_token.is_some() {
            tasks.token = self.tasks_token.clone();
        }
        if self.queue_id.is_some() {
            tasks.queue_id = self.queue_id.clone();
        }
        if self.queue_location.is_some() {
            tasks.queue_location = self.queue_location.clone();
        }

        if self.public_base_url.is_some() {
            config.callback_mut().public_base_url = self.public_base_url.clone();
        }
    }
}

/// Printable view of the settings, without credentials.
pub fn summary(settings: &Settings) -> serde_json::Value {
    fn backend(b: &Backend) -> serde_json::Value {
        match b {
            Backend::Memory => serde_json::json!("memory"),
            Backend::Http { base_url, token } => serde_json::json!({
                "url": base_url,
                "authenticated": token.is_some(),
            }),
        }
    }

    serde_json::json!({
        "ceiling": settings.ceiling,
        "domain": settings.domain,
        "default_region": settings.default_region,
        "ledger": backend(&settings.ledger),
        "tasks": {
            "backend": backend(&settings.tasks.backend),
            "queue_id": settings.tasks.queue_id,
            "queue_location": settings.tasks.queue_location,
        },
        "callback": {
            "public_base_url": settings.callback.public_base_url,
            "scheme": settings.callback.scheme,
        },
        "call_timeout_secs": settings.call_timeout.as_secs_f64(),
        "request_timeout_secs": settings.request_timeout.as_secs_f64(),
        "default_reversal_delay_secs": settings.delay.default.as_secs(),
        "max_reversal_delay_secs": settings.delay.max.as_secs(),
        "timers": settings.timers.len(),
    })
}
