//! Validation findings.
//!
//! Everything validation discovers about an object is data, not an
//! error: a [`Check`] pairs a location with a stable key and optional
//! parameters and is either a warning or a reject. Rejects stop descent
//! into the subtree below the object they refer to but never abort
//! validation of siblings.
//!
//! The external crypto library reports its findings into a per-location
//! [`ValidationResult`] which translates them into checks.

use std::borrow::Cow;
use std::fmt;
use serde::Serialize;
use crate::uri;


//------------ ValidationLocation --------------------------------------------

/// The place a validation finding applies to.
///
/// In practice this is the URI of the object being validated, or the
/// issuer's location when no more specific object applies.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ValidationLocation(String);

impl ValidationLocation {
    pub fn new(value: impl Into<String>) -> Self {
        ValidationLocation(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'_ str> for ValidationLocation {
    fn from(value: &str) -> Self {
        ValidationLocation(value.into())
    }
}

impl From<String> for ValidationLocation {
    fn from(value: String) -> Self {
        ValidationLocation(value)
    }
}

impl From<&'_ uri::Rsync> for ValidationLocation {
    fn from(uri: &uri::Rsync) -> Self {
        ValidationLocation(uri.as_str().into())
    }
}

impl From<&'_ uri::Https> for ValidationLocation {
    fn from(uri: &uri::Https) -> Self {
        ValidationLocation(uri.as_str().into())
    }
}

impl fmt::Display for ValidationLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}


//------------ Key -----------------------------------------------------------

/// The stable key of a validation finding.
///
/// Keys are identifiers, not messages; turning them into human readable
/// text is a UI concern. The named variants are the catalogue used by
/// the walker itself. Everything the external crypto library reports
/// arrives through [`Key::other`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Key {
    CrlRequired,
    CaShouldHaveManifest,
    ManifestLocationMismatch,
    ManifestFileNotFoundByAki,
    ManifestDoesNotContainFile,
    ManifestCrlUriMismatch,
    ManifestHashMismatch,

    /// A key from outside the catalogue.
    Other(Cow<'static, str>),
}

impl Key {
    /// Creates a key from outside the catalogue.
    pub fn other(key: impl Into<Cow<'static, str>>) -> Self {
        Key::Other(key.into())
    }

    /// Returns the key's stable string form.
    pub fn as_str(&self) -> &str {
        match *self {
            Key::CrlRequired => "CRL_REQUIRED",
            Key::CaShouldHaveManifest => {
                "VALIDATOR_CA_SHOULD_HAVE_MANIFEST"
            }
            Key::ManifestLocationMismatch => {
                "VALIDATOR_MANIFEST_LOCATION_MISMATCH"
            }
            Key::ManifestFileNotFoundByAki => {
                "VALIDATOR_MANIFEST_FILE_NOT_FOUND_BY_AKI"
            }
            Key::ManifestDoesNotContainFile => {
                "VALIDATOR_MANIFEST_DOES_NOT_CONTAIN_FILE"
            }
            Key::ManifestCrlUriMismatch => {
                "VALIDATOR_MANIFEST_CRL_URI_MISMATCH"
            }
            Key::ManifestHashMismatch => {
                "VALIDATOR_MANIFEST_HASH_MISMATCH"
            }
            Key::Other(ref key) => key,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Key {
    fn serialize<S: serde::Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}


//------------ Check ---------------------------------------------------------

/// A single validation finding.
///
/// Checks are immutable value objects. A reject means the object failed
/// validation and nothing below it is descended into; a warning is
/// reported but does not disqualify anything.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Check {
    Reject {
        location: ValidationLocation,
        key: Key,
        params: Vec<String>,
    },
    Warning {
        location: ValidationLocation,
        key: Key,
        params: Vec<String>,
    },
}

impl Check {
    /// Creates a reject finding.
    pub fn reject(
        location: impl Into<ValidationLocation>,
        key: Key,
        params: Vec<String>,
    ) -> Self {
        Check::Reject { location: location.into(), key, params }
    }

    /// Creates a warning finding.
    pub fn warning(
        location: impl Into<ValidationLocation>,
        key: Key,
        params: Vec<String>,
    ) -> Self {
        Check::Warning { location: location.into(), key, params }
    }

    /// Returns whether the finding is a reject.
    pub fn is_reject(&self) -> bool {
        matches!(*self, Check::Reject { .. })
    }

    /// Returns the location the finding applies to.
    pub fn location(&self) -> &ValidationLocation {
        match *self {
            Check::Reject { ref location, .. } => location,
            Check::Warning { ref location, .. } => location,
        }
    }

    /// Returns the finding's key.
    pub fn key(&self) -> &Key {
        match *self {
            Check::Reject { ref key, .. } => key,
            Check::Warning { ref key, .. } => key,
        }
    }

    /// Returns the finding's parameters.
    pub fn params(&self) -> &[String] {
        match *self {
            Check::Reject { ref params, .. } => params,
            Check::Warning { ref params, .. } => params,
        }
    }
}


//------------ ValidationResult ----------------------------------------------

/// The findings about a single location.
///
/// A value of this type is handed to the external crypto library as the
/// sink for everything it has to say about one object. Failures become
/// rejects and warnings become warnings, preserving key and parameters
/// and the order in which they were reported.
#[derive(Clone, Debug)]
pub struct ValidationResult {
    location: ValidationLocation,
    checks: Vec<Check>,
    failures: usize,
}

impl ValidationResult {
    /// Creates an empty result for the given location.
    pub fn new(location: impl Into<ValidationLocation>) -> Self {
        ValidationResult {
            location: location.into(),
            checks: Vec::new(),
            failures: 0,
        }
    }

    /// Returns the location the result is about.
    pub fn location(&self) -> &ValidationLocation {
        &self.location
    }

    /// Records a warning.
    pub fn warn(&mut self, key: Key, params: Vec<String>) {
        self.checks.push(
            Check::warning(self.location.clone(), key, params)
        );
    }

    /// Records a failure.
    pub fn reject(&mut self, key: Key, params: Vec<String>) {
        self.failures += 1;
        self.checks.push(
            Check::reject(self.location.clone(), key, params)
        );
    }

    /// Returns whether any failures were recorded.
    ///
    /// Warnings alone leave the object eligible; only failures
    /// disqualify it.
    pub fn has_failures(&self) -> bool {
        self.failures > 0
    }

    /// Returns whether nothing at all was recorded.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Converts the result into the recorded checks.
    pub fn into_checks(self) -> Vec<Check> {
        self.checks
    }
}


//============ Testing =======================================================
