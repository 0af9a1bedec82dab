use std::fmt;

use serde::Serialize;

use crate::manifest::Manifest;

/// First line of the most recently accepted manifest. Empty means nothing has
/// been loaded yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(manifest: &Manifest) -> Self {
        Self(manifest.first().unwrap_or_default().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub changed: bool,
    pub fingerprint: Fingerprint,
}

pub fn has_changed(manifest: &Manifest, stored: &Fingerprint) -> Change {
    let fingerprint = Fingerprint::of(manifest);
    Change {
        changed: fingerprint != *stored,
        fingerprint,
    }
}
