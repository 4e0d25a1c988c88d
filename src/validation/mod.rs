//! Top-down validation of the RPKI tree.
//!
//! Validation starts at a trust anchor certificate and walks down the
//! tree of certification authorities. For every CA the walker selects
//! the current CRL and manifest issued by it, cross-checks the manifest
//! against the object store and validates everything the manifest
//! lists, recursing into subordinate CAs. See [`Walker`] for the entry
//! point.
//!
//! Cryptographic verification of the individual objects happens in an
//! external library hooked in through the [`CryptoValidator`] trait.

pub use self::walker::{WalkReport, Walker};

pub mod crosscheck;
pub mod select;
pub mod walker;

use crate::check::ValidationResult;
use crate::object::{CertificateContext, CrlObject};
use crate::uri;


//------------ CryptoValidator -----------------------------------------------

/// The external cryptographic validator.
///
/// Given the URI of an object, the issuer context to validate against,
/// and the CRL to check revocation with, an implementation verifies the
/// object and reports everything it finds into `result`. Failures make
/// the object invalid; warnings are merely reported.
///
/// The walker owns deciding what to do with the outcome. The validator
/// must not panic on missing or malformed objects; those, too, are just
/// findings.
pub trait CryptoValidator {
    fn validate(
        &self,
        uri: &uri::Rsync,
        issuer: &CertificateContext,
        crl: Option<&CrlObject>,
        options: &ValidationOptions,
        result: &mut ValidationResult,
    );
}


//------------ ValidationOptions ---------------------------------------------

/// Options steering cryptographic validation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValidationOptions {
    /// Apply the RPKI profile strictly.
    ///
    /// In lenient mode, deviations that are common in the wild and
    /// harmless are accepted silently.
    pub strict: bool,
}
