//! Sync and remote store configuration.
//!
//! [`SyncConfig`] carries the engine and scheduler tunables with builder-style
//! setters. [`SyncSettings`] is its serializable form (plain seconds) used by
//! client config files. [`RemoteConfig`] locates the shared document
//! collection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 120;
const DEFAULT_FULL_SYNC_EVERY: u32 = 15;
const DEFAULT_INCREMENTAL_WINDOW_SECS: u64 = 5 * 60;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PHASE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_IN_FLIGHT_GRACE_SECS: u64 = 3;
const DEFAULT_PROGRESS_RESET_MS: u64 = 1_000;
const DEFAULT_FULL_SYNC_TOLERANCE_SECS: u64 = 60;
const DEFAULT_COLLECTION: &str = "records";

/// Tunables for the reconciliation engine and scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Period between scheduler ticks
    pub sync_interval: Duration,
    /// Every n-th tick runs a full sync instead of an incremental one (0 disables)
    pub full_sync_every: u32,
    /// How far back an incremental pass looks for modified documents
    pub incremental_window: Duration,
    /// Deadline for each individual store call
    pub call_timeout: Duration,
    /// Deadline for a whole pull or push phase
    pub phase_timeout: Duration,
    /// How long a content key stays in flight after it was applied
    pub in_flight_grace: Duration,
    /// Delay before progress drops back to 0 after a full sync
    pub progress_reset_delay: Duration,
    /// Content-match tolerance on `occurred_at` during full sync
    pub full_sync_tolerance: Duration,
    /// Content-match tolerance on `occurred_at` during incremental sync
    pub incremental_tolerance: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            full_sync_every: DEFAULT_FULL_SYNC_EVERY,
            incremental_window: Duration::from_secs(DEFAULT_INCREMENTAL_WINDOW_SECS),
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            phase_timeout: Duration::from_secs(DEFAULT_PHASE_TIMEOUT_SECS),
            in_flight_grace: Duration::from_secs(DEFAULT_IN_FLIGHT_GRACE_SECS),
            progress_reset_delay: Duration::from_millis(DEFAULT_PROGRESS_RESET_MS),
            full_sync_tolerance: Duration::from_secs(DEFAULT_FULL_SYNC_TOLERANCE_SECS),
            incremental_tolerance: Duration::ZERO,
        }
    }
}

impl SyncConfig {
    /// Set the scheduler period
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Run a full sync every `ticks` scheduler ticks
    #[must_use]
    pub const fn with_full_sync_every(mut self, ticks: u32) -> Self {
        self.full_sync_every = ticks;
        self
    }

    /// Set the incremental look-back window
    #[must_use]
    pub const fn with_incremental_window(mut self, window: Duration) -> Self {
        self.incremental_window = window;
        self
    }

    /// Set the per-call deadline
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the per-phase deadline
    #[must_use]
    pub const fn with_phase_timeout(mut self, timeout: Duration) -> Self {
        self.phase_timeout = timeout;
        self
    }

    /// Set the in-flight grace delay
    #[must_use]
    pub const fn with_in_flight_grace(mut self, grace: Duration) -> Self {
        self.in_flight_grace = grace;
        self
    }

    /// Set the progress reset delay
    #[must_use]
    pub const fn with_progress_reset_delay(mut self, delay: Duration) -> Self {
        self.progress_reset_delay = delay;
        self
    }

    /// Set both content-match tolerances
    #[must_use]
    pub const fn with_match_tolerances(mut self, full: Duration, incremental: Duration) -> Self {
        self.full_sync_tolerance = full;
        self.incremental_tolerance = incremental;
        self
    }
}

/// Serializable form of [`SyncConfig`]; absent fields keep their defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_sync_every: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental_window_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_sync_tolerance_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental_tolerance_secs: Option<u64>,
}

impl SyncSettings {
    /// Resolve into a [`SyncConfig`], rejecting zero periods
    pub fn to_config(&self) -> Result<SyncConfig, String> {
        let defaults = SyncConfig::default();
        let mut config = defaults.clone();

        if let Some(secs) = self.sync_interval_secs {
            config.sync_interval = non_zero_secs(secs, "sync_interval_secs")?;
        }
        if let Some(ticks) = self.full_sync_every {
            config.full_sync_every = ticks;
        }
        if let Some(secs) = self.incremental_window_secs {
            config.incremental_window = non_zero_secs(secs, "incremental_window_secs")?;
        }
        if let Some(secs) = self.call_timeout_secs {
            config.call_timeout = non_zero_secs(secs, "call_timeout_secs")?;
        }
        config.full_sync_tolerance = self
            .full_sync_tolerance_secs
            .map_or(defaults.full_sync_tolerance, Duration::from_secs);
        config.incremental_tolerance = self
            .incremental_tolerance_secs
            .map_or(defaults.incremental_tolerance, Duration::from_secs);

        Ok(config)
    }
}

fn non_zero_secs(secs: u64, field: &str) -> Result<Duration, String> {
    if secs == 0 {
        Err(format!("sync setting '{field}' must be greater than zero"))
    } else {
        Ok(Duration::from_secs(secs))
    }
}

/// Location and credentials of the shared document collection
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    /// REST endpoint root, e.g. `https://project.supabase.co/rest/v1`
    pub base_url: String,
    /// API key sent as `apikey` and bearer token
    pub api_key: String,
    /// Collection (table) holding record documents
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("collection", &self.collection)
            .finish()
    }
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            collection: default_collection(),
        }
    }

    /// Read `LEDGER_REMOTE_URL`, `LEDGER_REMOTE_API_KEY` and the optional
    /// `LEDGER_REMOTE_COLLECTION`. Returns `None` unless both required
    /// variables are set.
    pub fn from_env() -> Option<Self> {
        let base_url = normalize_text_option(std::env::var("LEDGER_REMOTE_URL").ok())?;
        let api_key = normalize_text_option(std::env::var("LEDGER_REMOTE_API_KEY").ok())?;
        let collection = normalize_text_option(std::env::var("LEDGER_REMOTE_COLLECTION").ok())
            .unwrap_or_else(default_collection);
        Some(Self {
            base_url,
            api_key,
            collection,
        })
    }

    /// Check the endpoint scheme and that key and collection are present
    pub fn validate(&self) -> Result<(), String> {
        if !is_http_url(self.base_url.trim()) {
            return Err("base_url must include http:// or https://".to_string());
        }
        if self.api_key.trim().is_empty() {
            return Err("api_key must not be empty".to_string());
        }
        if self.collection.trim().is_empty() {
            return Err("collection must not be empty".to_string());
        }
        Ok(())
    }
}
