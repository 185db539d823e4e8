use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::dispatch::{Dispatcher, PassthroughDispatcher, StickyDispatcher};
use crate::error::DbError;
use crate::events::{AcquisitionListener, LoggingListener};
use crate::metadata;
use crate::worker::HandoutOrder;

pub const DEFAULT_POOL_SIZE: usize = 10;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Operator-facing dispatcher configuration.
///
/// Unset sizing fields are derived from the backing connection pool when one
/// is supplied to [`DispatcherSettings::resolve_with_pool`], and fall back to
/// the defaults otherwise. Listeners cannot come from configuration files;
/// attach them through the builder.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    /// Disabled dispatchers degrade to the pass-through variant.
    pub enabled: bool,
    pub pool_size: Option<usize>,
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Option<Duration>,
    /// Soft latency bound; exceeding it emits a `ThresholdExceeded` event.
    /// Unset disables threshold events entirely.
    #[serde(with = "humantime_serde")]
    pub acquire_threshold: Option<Duration>,
    pub handout_order: HandoutOrder,
    #[serde(skip)]
    pub listeners: Vec<Arc<dyn AcquisitionListener>>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            pool_size: None,
            idle_timeout: None,
            acquire_timeout: None,
            acquire_threshold: None,
            handout_order: HandoutOrder::default(),
            listeners: Vec::new(),
        }
    }
}

impl fmt::Debug for DispatcherSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherSettings")
            .field("enabled", &self.enabled)
            .field("pool_size", &self.pool_size)
            .field("idle_timeout", &self.idle_timeout)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("acquire_threshold", &self.acquire_threshold)
            .field("handout_order", &self.handout_order)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl DispatcherSettings {
    #[must_use]
    pub fn builder() -> DispatcherSettingsBuilder {
        DispatcherSettingsBuilder {
            settings: Self::default(),
        }
    }

    /// Resolve with defaults for any unset field.
    #[must_use]
    pub fn resolve(&self) -> ResolvedSettings {
        self.resolved(
            self.pool_size.unwrap_or(DEFAULT_POOL_SIZE),
            self.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT),
            self.acquire_timeout.unwrap_or(DEFAULT_ACQUIRE_TIMEOUT),
        )
    }

    /// Resolve, deriving unset sizing fields from the backing pool.
    ///
    /// The pool-metadata registry is only consulted when at least one of
    /// pool_size / idle_timeout / acquire_timeout was left unset.
    ///
    /// # Errors
    /// Returns `DbError::UnknownPoolType` when derivation is needed and the
    /// pool object is not recognized.
    pub fn resolve_with_pool(
        &self,
        pool: &dyn Any,
        pool_type_name: &str,
    ) -> Result<ResolvedSettings, DbError> {
        if self.pool_size.is_some() && self.idle_timeout.is_some() && self.acquire_timeout.is_some()
        {
            return Ok(self.resolve());
        }
        let capacities =
            metadata::PoolIntrospection::with_defaults().derive(pool, pool_type_name)?;
        Ok(self.resolved(
            self.pool_size.unwrap_or(capacities.pool_size),
            self.idle_timeout.unwrap_or(capacities.idle_timeout),
            self.acquire_timeout.unwrap_or(capacities.acquire_timeout),
        ))
    }

    fn resolved(
        &self,
        pool_size: usize,
        idle_timeout: Duration,
        acquire_timeout: Duration,
    ) -> ResolvedSettings {
        let mut listeners = self.listeners.clone();
        if self.acquire_threshold.is_some() && listeners.is_empty() {
            listeners.push(Arc::new(LoggingListener));
        }
        ResolvedSettings {
            pool_size,
            idle_timeout,
            acquire_timeout,
            acquire_threshold: self.acquire_threshold,
            handout_order: self.handout_order,
            listeners,
        }
    }

    /// Build a dispatcher named `name`, using defaults for unset fields.
    #[must_use]
    pub fn build_dispatcher(&self, name: &str) -> Dispatcher {
        if !self.enabled {
            return Dispatcher::Passthrough(PassthroughDispatcher::new());
        }
        Dispatcher::Sticky(StickyDispatcher::new(name, self.resolve()))
    }

    /// Build a dispatcher, deriving unset sizing fields from `pool`.
    ///
    /// # Errors
    /// Returns `DbError::UnknownPoolType` when derivation is needed and the
    /// pool object is not recognized.
    pub fn build_dispatcher_with_pool<P: Any>(
        &self,
        name: &str,
        pool: &P,
    ) -> Result<Dispatcher, DbError> {
        if !self.enabled {
            return Ok(Dispatcher::Passthrough(PassthroughDispatcher::new()));
        }
        let resolved = self.resolve_with_pool(pool, std::any::type_name::<P>())?;
        Ok(Dispatcher::Sticky(StickyDispatcher::new(name, resolved)))
    }
}

/// Fluent builder in the options-builder style used throughout the crate.
#[derive(Clone)]
pub struct DispatcherSettingsBuilder {
    settings: DispatcherSettings,
}

impl DispatcherSettingsBuilder {
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.settings.enabled = enabled;
        self
    }

    #[must_use]
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.settings.pool_size = Some(pool_size);
        self
    }

    #[must_use]
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.settings.idle_timeout = Some(idle_timeout);
        self
    }

    #[must_use]
    pub fn acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.settings.acquire_timeout = Some(acquire_timeout);
        self
    }

    #[must_use]
    pub fn acquire_threshold(mut self, acquire_threshold: Duration) -> Self {
        self.settings.acquire_threshold = Some(acquire_threshold);
        self
    }

    #[must_use]
    pub fn handout_order(mut self, handout_order: HandoutOrder) -> Self {
        self.settings.handout_order = handout_order;
        self
    }

    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn AcquisitionListener>) -> Self {
        self.settings.listeners.push(listener);
        self
    }

    #[must_use]
    pub fn finish(self) -> DispatcherSettings {
        self.settings
    }
}

/// Settings with every field decided, ready to build a dispatcher.
#[derive(Clone)]
pub struct ResolvedSettings {
    pub pool_size: usize,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
    pub acquire_threshold: Option<Duration>,
    pub handout_order: HandoutOrder,
    pub listeners: Vec<Arc<dyn AcquisitionListener>>,
}

impl fmt::Debug for ResolvedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSettings")
            .field("pool_size", &self.pool_size)
            .field("idle_timeout", &self.idle_timeout)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("acquire_threshold", &self.acquire_threshold)
            .field("handout_order", &self.handout_order)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_surface() {
        let settings = DispatcherSettings::default();
        assert!(settings.enabled);
        let resolved = settings.resolve();
        assert_eq!(resolved.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(resolved.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        assert_eq!(resolved.acquire_timeout, DEFAULT_ACQUIRE_TIMEOUT);
        assert!(resolved.acquire_threshold.is_none());
        assert!(resolved.listeners.is_empty());
    }

    #[test]
    fn threshold_without_listeners_installs_the_logging_listener() {
        let settings = DispatcherSettings::builder()
            .acquire_threshold(Duration::from_millis(50))
            .finish();
        let resolved = settings.resolve();
        assert_eq!(resolved.listeners.len(), 1);
    }

    #[test]
    fn unset_fields_derive_from_the_pool_only_when_needed() {
        let mut pool_config = deadpool::managed::PoolConfig::new(4);
        pool_config.timeouts.wait = Some(Duration::from_secs(2));
        pool_config.timeouts.recycle = Some(Duration::from_secs(45));

        let settings = DispatcherSettings::builder().pool_size(32).finish();
        let resolved = settings
            .resolve_with_pool(&pool_config, "deadpool::managed::PoolConfig")
            .unwrap();
        // Explicit setting wins; the rest comes from the pool.
        assert_eq!(resolved.pool_size, 32);
        assert_eq!(resolved.idle_timeout, Duration::from_secs(45));
        assert_eq!(resolved.acquire_timeout, Duration::from_secs(2));

        // Fully explicit settings never touch the registry, so even an
        // unrecognized pool object resolves fine.
        let explicit = DispatcherSettings::builder()
            .pool_size(2)
            .idle_timeout(Duration::from_secs(1))
            .acquire_timeout(Duration::from_secs(1))
            .finish();
        assert!(explicit.resolve_with_pool(&"bogus", "bogus").is_ok());
    }

    #[test]
    fn settings_deserialize_with_humantime_durations() {
        let settings: DispatcherSettings = serde_json::from_str(
            r#"{
                "pool_size": 5,
                "idle_timeout": "90s",
                "acquire_timeout": "2s",
                "acquire_threshold": "250ms",
                "handout_order": "fifo"
            }"#,
        )
        .unwrap();
        assert_eq!(settings.pool_size, Some(5));
        assert_eq!(settings.idle_timeout, Some(Duration::from_secs(90)));
        assert_eq!(settings.acquire_threshold, Some(Duration::from_millis(250)));
        assert_eq!(settings.handout_order, HandoutOrder::Fifo);
        assert!(settings.enabled);
    }

    #[test]
    fn disabled_settings_build_a_passthrough_dispatcher() {
        let dispatcher = DispatcherSettings::builder()
            .enabled(false)
            .finish()
            .build_dispatcher("db");
        assert!(!dispatcher.is_sticky());
    }
}
