//! Choosing the current CRL and manifest of a CA.
//!
//! A publication point routinely holds several CRLs or manifests issued
//! by the same key: the current one and leftovers of earlier
//! generations that were never cleaned up. The selector orders the
//! candidates by their number, highest first, validates each one, and
//! picks the highest-numbered candidate without validation failures.
//!
//! Every candidate is validated exactly once and all findings are kept,
//! so operators get to see every bad CRL or manifest at a publication
//! point, not only the chosen one. Warnings do not disqualify a
//! candidate; only failures do.

use crate::check::{Check, ValidationResult};
use crate::object::{
    CertificateContext, CrlContent, CrlObject, ManifestContent,
    ManifestObject, RepositoryObject,
};
use super::{CryptoValidator, ValidationOptions};


//------------ Numbered ------------------------------------------------------

/// Content that carries a monotonically increasing number.
///
/// CRL numbers and manifest numbers both serve the same purpose: a
/// higher number supersedes a lower one.
pub trait Numbered {
    fn number(&self) -> u128;
}

impl Numbered for CrlContent {
    fn number(&self) -> u128 {
        self.crl_number()
    }
}

impl Numbered for ManifestContent {
    fn number(&self) -> u128 {
        self.manifest_number()
    }
}


//------------ Selection -----------------------------------------------------

/// The outcome of selecting among candidates.
#[derive(Clone, Debug)]
pub struct Selection<T> {
    /// The chosen candidate, if any passed validation.
    pub current: Option<RepositoryObject<T>>,

    /// The findings for all candidates, chosen or not.
    pub checks: Vec<Check>,
}


//------------ select_current ------------------------------------------------

/// Selects the best current candidate.
///
/// Candidates are ordered by number descending; the sort is stable so
/// candidates with equal numbers keep their store order. The first
/// candidate whose validation produces no failures wins.
pub fn select_current<T: Numbered>(
    mut candidates: Vec<RepositoryObject<T>>,
    issuer: &CertificateContext,
    crl: Option<&CrlObject>,
    validator: &impl CryptoValidator,
    options: &ValidationOptions,
) -> Selection<T> {
    candidates.sort_by(|left, right| {
        right.content().number().cmp(&left.content().number())
    });
    let mut checks = Vec::new();
    let mut current = None;
    for candidate in candidates {
        let mut result = ValidationResult::new(candidate.uri());
        validator.validate(
            candidate.uri(), issuer, crl, options, &mut result
        );
        let passed = !result.has_failures();
        checks.extend(result.into_checks());
        if passed && current.is_none() {
            current = Some(candidate);
        }
    }
    Selection { current, checks }
}

/// Selects the current CRL of the issuer.
pub fn current_crl(
    candidates: Vec<CrlObject>,
    issuer: &CertificateContext,
    validator: &impl CryptoValidator,
    options: &ValidationOptions,
) -> Selection<CrlContent> {
    select_current(candidates, issuer, None, validator, options)
}

/// Selects the current manifest of the issuer.
///
/// Manifest candidates are validated using the already chosen CRL as
/// the revocation check.
pub fn current_manifest(
    candidates: Vec<ManifestObject>,
    issuer: &CertificateContext,
    crl: &CrlObject,
    validator: &impl CryptoValidator,
    options: &ValidationOptions,
) -> Selection<ManifestContent> {
    select_current(candidates, issuer, Some(crl), validator, options)
}


//============ Testing =======================================================

#[cfg(test)]
mod test {
    use std::str::FromStr;
    use crate::check::Key;
    use crate::crypto::{KeyIdentifier, ObjectDigest};
    use crate::object::ResourceCertificate;
    use crate::uri;
    use super::*;

    /// A validator that fails the URIs it was told to fail and warns on
    /// the URIs it was told to warn about.
    #[derive(Default)]
    struct ScriptedValidator {
        fail: Vec<String>,
        warn: Vec<String>,
    }

    impl CryptoValidator for ScriptedValidator {
        fn validate(
            &self,
            uri: &uri::Rsync,
            _issuer: &CertificateContext,
            _crl: Option<&CrlObject>,
            _options: &ValidationOptions,
            result: &mut ValidationResult,
        ) {
            if self.fail.iter().any(|item| item == uri.as_str()) {
                result.reject(
                    Key::other("cert.signature.invalid"), Vec::new()
                );
            }
            if self.warn.iter().any(|item| item == uri.as_str()) {
                result.warn(
                    Key::other("crl.next.update.soon"), Vec::new()
                );
            }
        }
    }

    fn ski(fill: u8) -> KeyIdentifier {
        KeyIdentifier::from([fill; 20])
    }

    fn uri(s: &str) -> uri::Rsync {
        uri::Rsync::from_str(s).unwrap()
    }

    fn issuer() -> CertificateContext {
        CertificateContext::new(
            "rsync://host/mod/ca.cer",
            ResourceCertificate::new(
                ski(1), None,
                Some(uri("rsync://host/mod/ca/")),
                Some(uri("rsync://host/mod/ca/ca.mft")),
                None,
            )
        )
    }

    fn crl_candidate(path: &str, number: u128) -> CrlObject {
        RepositoryObject::new(
            uri(path),
            ObjectDigest::from([number as u8; 32]),
            CrlContent::new(ski(1), number),
        )
    }

    #[test]
    fn highest_number_wins() {
        let selection = current_crl(
            vec![
                crl_candidate("rsync://host/mod/ca/old.crl", 3),
                crl_candidate("rsync://host/mod/ca/new.crl", 7),
            ],
            &issuer(),
            &ScriptedValidator::default(),
            &ValidationOptions::default(),
        );
        assert_eq!(
            selection.current.unwrap().uri().as_str(),
            "rsync://host/mod/ca/new.crl"
        );
        assert!(selection.checks.is_empty());
    }

    #[test]
    fn failures_disqualify_but_warnings_do_not() {
        let validator = ScriptedValidator {
            fail: vec!["rsync://host/mod/ca/new.crl".into()],
            warn: vec!["rsync://host/mod/ca/old.crl".into()],
        };
        let selection = current_crl(
            vec![
                crl_candidate("rsync://host/mod/ca/old.crl", 3),
                crl_candidate("rsync://host/mod/ca/new.crl", 7),
            ],
            &issuer(),
            &validator,
            &ValidationOptions::default(),
        );
        // The highest-numbered candidate failed, so the warned-about
        // older one is chosen.
        assert_eq!(
            selection.current.unwrap().uri().as_str(),
            "rsync://host/mod/ca/old.crl"
        );
        // Findings for both candidates are reported.
        assert_eq!(selection.checks.len(), 2);
        assert!(selection.checks[0].is_reject());
        assert!(!selection.checks[1].is_reject());
    }

    #[test]
    fn no_valid_candidate_selects_none() {
        let validator = ScriptedValidator {
            fail: vec![
                "rsync://host/mod/ca/a.crl".into(),
                "rsync://host/mod/ca/b.crl".into(),
            ],
            warn: Vec::new(),
        };
        let selection = current_crl(
            vec![
                crl_candidate("rsync://host/mod/ca/a.crl", 1),
                crl_candidate("rsync://host/mod/ca/b.crl", 2),
            ],
            &issuer(),
            &validator,
            &ValidationOptions::default(),
        );
        assert!(selection.current.is_none());
        assert_eq!(selection.checks.len(), 2);
    }

    #[test]
    fn empty_candidate_list() {
        let selection = current_crl(
            Vec::new(),
            &issuer(),
            &ScriptedValidator::default(),
            &ValidationOptions::default(),
        );
        assert!(selection.current.is_none());
        assert!(selection.checks.is_empty());
    }
}
