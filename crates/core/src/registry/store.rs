//! Cached, read-only access to the registry file.

use super::{REGISTRY_VERSION, Registry};
use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Time source for cache expiry.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }
}

impl ManualClock {
    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct CachedRegistry {
    snapshot: Arc<Registry>,
    loaded_at: Instant,
}

/// Loads the registry and keeps the last snapshot for a bounded time.
///
/// There is no file locking: an installer writing concurrently may leave this
/// store with a stale snapshot until the next forced load or expiry.
pub struct RegistryStore {
    path: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    cache: Option<CachedRegistry>,
}

impl fmt::Debug for RegistryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryStore")
            .field("path", &self.path)
            .field("ttl", &self.ttl)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl RegistryStore {
    /// Store reading `path` with the given cache lifetime.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self::with_clock(path, ttl, Arc::new(SystemClock))
    }

    /// Store with an injected clock.
    #[must_use]
    pub fn with_clock(path: impl Into<PathBuf>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            ttl,
            clock,
            cache: None,
        }
    }

    /// Registry file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the registry, reading it from disk when the cached snapshot is
    /// missing, expired, or `force` is set.
    pub fn load(&mut self, force: bool) -> Result<Arc<Registry>> {
        let now = self.clock.now();

        if !force
            && let Some(cached) = &self.cache
            && now.duration_since(cached.loaded_at) < self.ttl
        {
            debug!(path = %self.path.display(), "Using cached registry snapshot");
            return Ok(Arc::clone(&cached.snapshot));
        }

        let registry = Arc::new(read_registry(&self.path)?);
        self.cache = Some(CachedRegistry {
            snapshot: Arc::clone(&registry),
            loaded_at: now,
        });
        Ok(registry)
    }

}

/// Read and check a registry file without caching.
pub fn read_registry(path: &Path) -> Result<Registry> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::RegistryNotFound { path: path.into() });
        }
        Err(e) => return Err(Error::io(e, path, "read")),
    };

    let document: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| Error::registry_parse(path, e.to_string()))?;

    for key in ["installations", "aliases"] {
        match document.get(key) {
            Some(serde_json::Value::Object(_)) => {}
            Some(_) => {
                return Err(Error::registry_parse(
                    path,
                    format!("`{key}` must be an object"),
                ));
            }
            None => {
                return Err(Error::registry_parse(
                    path,
                    format!("missing required `{key}` mapping"),
                ));
            }
        }
    }

    let registry: Registry =
        serde_json::from_value(document).map_err(|e| Error::registry_parse(path, e.to_string()))?;

    match registry.registry_version.as_deref() {
        Some(REGISTRY_VERSION) => {}
        other => warn!(
            expected = REGISTRY_VERSION,
            found = other.unwrap_or("unknown"),
            "Registry version mismatch"
        ),
    }

    debug!(
        path = %path.display(),
        installations = registry.installations.len(),
        aliases = registry.aliases.len(),
        "Loaded registry"
    );
    Ok(registry)
}
