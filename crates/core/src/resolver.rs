//! Installation resolution.
//!
//! Precedence, first applicable rule wins:
//!
//! 1. explicit alias (never falls through)
//! 2. explicit id, exact or an unambiguous prefix of at least
//!    [`MIN_PARTIAL_ID_LEN`] characters
//! 3. local pin, tried as alias, exact id, then prefix
//! 4. registry default
//!
//! Rules 3 and 4 only apply when `use_priority` is set and no explicit
//! reference was given.

use crate::registry::{Installation, Registry};
use crate::{Error, Result};
use std::fmt;
use tracing::{debug, warn};

/// Shortest id prefix accepted as a partial id.
pub const MIN_PARTIAL_ID_LEN: usize = 8;

/// What the caller asked for.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveRequest<'a> {
    /// Explicit installation id or id prefix
    pub id: Option<&'a str>,
    /// Explicit alias
    pub alias: Option<&'a str>,
    /// Value of the working directory's pin file
    pub local_pin: Option<&'a str>,
    /// Whether pin and default may be consulted
    pub use_priority: bool,
}

impl<'a> ResolveRequest<'a> {
    /// Request that consults pin and default.
    #[must_use]
    pub fn with_priority(local_pin: Option<&'a str>) -> Self {
        Self {
            local_pin,
            use_priority: true,
            ..Self::default()
        }
    }

    /// Request for an explicit id.
    #[must_use]
    pub fn by_id(id: &'a str) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Request for an explicit alias.
    #[must_use]
    pub fn by_alias(alias: &'a str) -> Self {
        Self {
            alias: Some(alias),
            ..Self::default()
        }
    }
}

/// Which rule produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Explicit alias
    Alias,
    /// Explicit id
    Id,
    /// Working directory pin
    LocalPin,
    /// Registry default
    Default,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Alias => "alias",
            Self::Id => "id",
            Self::LocalPin => "local pin",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

/// A resolved installation and the rule that selected it.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'r> {
    /// The selected record
    pub installation: &'r Installation,
    /// Rule that selected it
    pub source: ResolutionSource,
}

/// Resolve a request against a registry snapshot.
pub fn resolve<'r>(registry: &'r Registry, request: &ResolveRequest<'_>) -> Result<Resolved<'r>> {
    if let Some(alias) = request.alias {
        let installation = resolve_alias(registry, alias)?;
        return Ok(found(installation, ResolutionSource::Alias));
    }

    if let Some(id) = request.id {
        return match match_id(registry, id)? {
            Some(installation) => Ok(found(installation, ResolutionSource::Id)),
            None => Err(id_not_found(id)),
        };
    }

    if !request.use_priority {
        return Err(Error::installation_not_found_with_hint(
            "<none>",
            "Pass an installation id or alias",
        ));
    }

    if let Some(pin) = request.local_pin {
        if let Some(installation) = registry.installation_for_alias(pin) {
            return Ok(found(installation, ResolutionSource::LocalPin));
        }
        if let Some(installation) = match_id(registry, pin)? {
            return Ok(found(installation, ResolutionSource::LocalPin));
        }
        warn!(pin, "Local pin does not match any installation, using default");
    }

    if let Some(installation) = registry.default_record() {
        return Ok(found(installation, ResolutionSource::Default));
    }

    if let Some(dangling) = &registry.default_installation {
        warn!(id = %dangling, "Default installation is not in the registry");
    }

    Err(Error::installation_not_found_with_hint(
        request.local_pin.unwrap_or("<default>"),
        "No default installation is set; pass `--id`/`--alias` or run `luaenv local <alias>`",
    ))
}

fn found(installation: &Installation, source: ResolutionSource) -> Resolved<'_> {
    debug!(id = %installation.id, %source, "Resolved installation");
    Resolved {
        installation,
        source,
    }
}

fn resolve_alias<'r>(registry: &'r Registry, alias: &str) -> Result<&'r Installation> {
    match registry.aliases.get(alias) {
        Some(id) => registry.installation(id).ok_or_else(|| {
            Error::installation_not_found_with_hint(
                alias,
                format!("Alias '{alias}' points at '{id}', which is no longer installed"),
            )
        }),
        None => Err(Error::installation_not_found(alias)),
    }
}

/// Exact id, else a unique prefix of at least [`MIN_PARTIAL_ID_LEN`] chars.
///
/// A shorter prefix never selects anything, but one that collides is still
/// reported as ambiguous.
fn match_id<'r>(registry: &'r Registry, reference: &str) -> Result<Option<&'r Installation>> {
    if let Some(installation) = registry.installation(reference) {
        return Ok(Some(installation));
    }
    if reference.is_empty() {
        return Ok(None);
    }

    let long_enough = reference.chars().count() >= MIN_PARTIAL_ID_LEN;
    match registry.ids_with_prefix(reference).as_slice() {
        [] => Ok(None),
        [single] if long_enough => Ok(registry.installation(single)),
        [_] => Ok(None),
        many => Err(Error::ambiguous(
            reference,
            many.iter().map(ToString::to_string).collect(),
        )),
    }
}

fn id_not_found(id: &str) -> Error {
    if id.chars().count() < MIN_PARTIAL_ID_LEN {
        Error::installation_not_found_with_hint(
            id,
            format!("Partial ids need at least {MIN_PARTIAL_ID_LEN} characters"),
        )
    } else {
        Error::installation_not_found(id)
    }
}
