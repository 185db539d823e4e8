//! Derivation of dispatcher capacities from heterogeneous connection pools.
//!
//! Deployments hand the dispatcher whatever pool object backs their SQL
//! source. Each recognized shape gets its own probe with exactly the
//! accessors it can answer; an unrecognized object fails with the type name.
//! The registry is consulted lazily, only when the operator left one of the
//! sizing fields unset (see [`crate::config::DispatcherSettings`]).

use std::any::Any;
use std::time::Duration;

use crate::error::DbError;

/// Sizing facts derived from a connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCapacities {
    pub pool_size: usize,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

/// Used when a pool shape cannot answer a question.
pub const FALLBACK_POOL_SIZE: usize = 10;
pub const FALLBACK_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
pub const FALLBACK_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder knobs of a bb8 pool, recorded by whoever constructed it (bb8 does
/// not expose its configuration back).
#[derive(Debug, Clone, Copy)]
pub struct Bb8PoolFacts {
    pub max_size: u32,
    pub idle_timeout: Option<Duration>,
    pub connection_timeout: Duration,
}

/// Builder knobs of an r2d2 pool, recorded by whoever constructed it.
#[derive(Debug, Clone, Copy)]
pub struct R2d2PoolFacts {
    pub max_size: u32,
    pub idle_timeout: Option<Duration>,
    pub connection_timeout: Duration,
}

/// `PoolOptions` knobs of an sqlx pool.
#[derive(Debug, Clone, Copy)]
pub struct SqlxPoolFacts {
    pub max_connections: u32,
    pub idle_timeout: Option<Duration>,
    pub acquire_timeout: Duration,
}

/// A pool hidden behind a decorating proxy; only the login timeout is
/// knowable, everything else falls back to defaults.
#[derive(Debug, Clone, Copy)]
pub struct ProxiedPoolFacts {
    pub login_timeout: Duration,
}

type Probe = fn(&dyn Any) -> Option<PoolCapacities>;

/// Registry of pool-shape probes, tried in registration order.
pub struct PoolIntrospection {
    probes: Vec<(&'static str, Probe)>,
}

impl PoolIntrospection {
    /// Registry recognizing the deadpool, bb8, r2d2, sqlx, and proxied
    /// shapes.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self { probes: Vec::new() };
        registry.register("deadpool", probe_deadpool);
        registry.register("bb8", probe_bb8);
        registry.register("r2d2", probe_r2d2);
        registry.register("sqlx", probe_sqlx);
        registry.register("proxied", probe_proxied);
        registry
    }

    pub fn register(&mut self, name: &'static str, probe: Probe) {
        self.probes.push((name, probe));
    }

    /// Try each probe in order.
    ///
    /// # Errors
    /// Returns `DbError::UnknownPoolType` carrying `type_name` when no probe
    /// recognizes the object.
    pub fn derive(&self, pool: &dyn Any, type_name: &str) -> Result<PoolCapacities, DbError> {
        for (_, probe) in &self.probes {
            if let Some(capacities) = probe(pool) {
                return Ok(capacities);
            }
        }
        Err(DbError::UnknownPoolType(type_name.to_string()))
    }
}

impl Default for PoolIntrospection {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Derive capacities from a pool object using the default registry.
///
/// # Errors
/// Returns `DbError::UnknownPoolType` for unrecognized pool types.
pub fn derive_capacities<P: Any>(pool: &P) -> Result<PoolCapacities, DbError> {
    PoolIntrospection::with_defaults().derive(pool, std::any::type_name::<P>())
}

fn probe_deadpool(pool: &dyn Any) -> Option<PoolCapacities> {
    let config = pool.downcast_ref::<deadpool::managed::PoolConfig>()?;
    Some(PoolCapacities {
        pool_size: config.max_size,
        idle_timeout: config.timeouts.recycle.unwrap_or(FALLBACK_IDLE_TIMEOUT),
        acquire_timeout: config.timeouts.wait.unwrap_or(FALLBACK_ACQUIRE_TIMEOUT),
    })
}

fn probe_bb8(pool: &dyn Any) -> Option<PoolCapacities> {
    let facts = pool.downcast_ref::<Bb8PoolFacts>()?;
    Some(PoolCapacities {
        pool_size: facts.max_size as usize,
        idle_timeout: facts.idle_timeout.unwrap_or(FALLBACK_IDLE_TIMEOUT),
        acquire_timeout: facts.connection_timeout,
    })
}

fn probe_r2d2(pool: &dyn Any) -> Option<PoolCapacities> {
    let facts = pool.downcast_ref::<R2d2PoolFacts>()?;
    Some(PoolCapacities {
        pool_size: facts.max_size as usize,
        idle_timeout: facts.idle_timeout.unwrap_or(FALLBACK_IDLE_TIMEOUT),
        acquire_timeout: facts.connection_timeout,
    })
}

fn probe_sqlx(pool: &dyn Any) -> Option<PoolCapacities> {
    let facts = pool.downcast_ref::<SqlxPoolFacts>()?;
    Some(PoolCapacities {
        pool_size: facts.max_connections as usize,
        idle_timeout: facts.idle_timeout.unwrap_or(FALLBACK_IDLE_TIMEOUT),
        acquire_timeout: facts.acquire_timeout,
    })
}

fn probe_proxied(pool: &dyn Any) -> Option<PoolCapacities> {
    let facts = pool.downcast_ref::<ProxiedPoolFacts>()?;
    Some(PoolCapacities {
        pool_size: FALLBACK_POOL_SIZE,
        idle_timeout: FALLBACK_IDLE_TIMEOUT,
        acquire_timeout: facts.login_timeout,
    })
}
