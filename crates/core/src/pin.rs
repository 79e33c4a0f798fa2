//! Per-directory installation pin (`.lua-version`).

use crate::paths::pin_file;
use crate::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The pin file for one working directory.
#[derive(Debug, Clone)]
pub struct LocalPin {
    dir: PathBuf,
}

impl LocalPin {
    /// Pin for `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Location of the pin file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        pin_file(&self.dir)
    }

    /// Directory this pin belongs to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current pin value, trimmed. `None` when the file is absent or blank.
    pub fn read(&self) -> Result<Option<String>> {
        let path = self.path();
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let value = content.trim();
                if value.is_empty() {
                    debug!(path = %path.display(), "Pin file is empty");
                    Ok(None)
                } else {
                    Ok(Some(value.to_string()))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound || path.is_dir() => Ok(None),
            Err(e) => Err(Error::io(e, &path, "read")),
        }
    }

    /// Pin this directory to an alias or (partial) id.
    ///
    /// Written as one line with no trailing newline.
    pub fn write(&self, reference: &str) -> Result<PathBuf> {
        let value = reference.trim();
        if value.is_empty() {
            return Err(Error::invalid_pin("value is empty"));
        }
        if value.contains(['\n', '\r']) {
            return Err(Error::invalid_pin("value must be a single line"));
        }

        let path = self.path();
        std::fs::write(&path, value.as_bytes()).map_err(|e| Error::io(e, &path, "write"))?;
        debug!(path = %path.display(), pin = value, "Wrote local pin");
        Ok(path)
    }

    /// Delete the pin file. Returns whether one existed.
    pub fn remove(&self) -> Result<bool> {
        let path = self.path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(e, &path, "remove")),
        }
    }
}
