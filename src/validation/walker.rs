//! The top-down validation walk.
//!
//! A [`Walker`] descends the certificate tree from a trust anchor. For
//! every certification authority it prefetches the publication point,
//! selects the current CRL and manifest issued by the CA, cross-checks
//! the manifest against the store, validates everything the manifest
//! lists and recurses into subordinate CAs. Validated ROAs and terminal
//! end-entity objects end up in the returned map; intermediate CAs are
//! recursed through.
//!
//! A reject stops the descent below the object it refers to but never
//! aborts sibling subtrees. The walk terminates on any input: a set of
//! already visited subject key identifiers guards against loops in a
//! malformed tree.

use std::collections::{HashMap, HashSet};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use crate::check::{Check, Key, ValidationResult};
use crate::fetch::{RepoFetcher, RepoService};
use crate::object::{
    CertificateContext, CertObject, CrlObject, ObjectContent, RoaObject,
    ValidatedObject,
};
use crate::payload::RouteOrigin;
use crate::store::Storage;
use crate::uri;
use super::crosscheck::crosscheck_manifest;
use super::select;
use super::{CryptoValidator, ValidationOptions};


//------------ Walker --------------------------------------------------------

/// The top-down walker for one trust anchor.
///
/// A walker borrows its collaborators and is cheap to create, one per
/// trust anchor walk. Distinct trust anchors may be walked on parallel
/// threads as long as they share nothing but the fetch service.
pub struct Walker<'a, S, F, V> {
    /// The object store to resolve objects from.
    store: &'a S,

    /// The fetch deduplication service.
    repos: &'a RepoService<F>,

    /// The external cryptographic validator.
    validator: &'a V,

    /// Options passed down to the validator.
    options: ValidationOptions,

    /// The wall-clock time the validation run started at.
    ///
    /// Doubles as the reference time for fetch freshness.
    validation_start: DateTime<Utc>,
}

impl<'a, S, F, V> Walker<'a, S, F, V>
where S: Storage, F: RepoFetcher, V: CryptoValidator {
    /// Creates a new walker.
    pub fn new(
        store: &'a S,
        repos: &'a RepoService<F>,
        validator: &'a V,
        options: ValidationOptions,
        validation_start: DateTime<Utc>,
    ) -> Self {
        Walker { store, repos, validator, options, validation_start }
    }

    /// Walks the tree rooted in the given issuer context.
    ///
    /// Returns the validated objects keyed by URI together with all
    /// checks produced along the way.
    ///
    /// # Panics
    ///
    /// The certificate of `context` must be an object-issuing CA
    /// certificate. Handing anything else to the walker is a programmer
    /// error.
    pub fn walk(&self, context: CertificateContext) -> WalkReport {
        let mut seen = HashSet::new();
        let mut report = WalkReport::default();
        self.step(context, &mut seen, &mut report);
        report
    }

    /// Validates one publication point and recurses below it.
    fn step(
        &self,
        context: CertificateContext,
        seen: &mut HashSet<String>,
        report: &mut WalkReport,
    ) {
        assert!(
            context.certificate().is_object_issuing_ca(),
            "walker entered a non-issuing certificate"
        );
        let ski_hex = context.subject_key_identifier().to_hex_string();
        assert!(
            seen.insert(ski_hex.clone()),
            "walker entered CA {} twice", ski_hex
        );
        debug!(
            "[{}] validating publication point {}",
            ski_hex, context.repository_uri()
        );

        if let Err(err) = self.repos.visit_repo(
            false, self.validation_start, context.prefetch_uri()
        ) {
            report.checks.push(Check::warning(
                context.location().clone(),
                Key::other("repository.fetch.failure"),
                vec![context.prefetch_uri().into(), err.to_string()],
            ));
        }

        let selection = select::current_crl(
            self.store.crls_by_aki(context.subject_key_identifier()),
            &context, self.validator, &self.options,
        );
        report.checks.extend(selection.checks);
        let crl = match selection.current {
            Some(crl) => crl,
            None => {
                debug!("[{}] no valid CRL, rejecting", ski_hex);
                report.checks.push(Check::reject(
                    context.location().clone(),
                    Key::CrlRequired,
                    Vec::new(),
                ));
                return
            }
        };

        let selection = select::current_manifest(
            self.store.manifests_by_aki(
                context.subject_key_identifier()
            ),
            &context, &crl, self.validator, &self.options,
        );
        report.checks.extend(selection.checks);
        let manifest = match selection.current {
            Some(manifest) => manifest,
            None => {
                debug!("[{}] no valid manifest, giving up", ski_hex);
                report.checks.push(Check::warning(
                    context.location().clone(),
                    Key::CaShouldHaveManifest,
                    Vec::new(),
                ));
                return
            }
        };

        let (classified, checks) = crosscheck_manifest(
            &manifest, &crl, &context, self.store
        );
        report.checks.extend(checks);

        for roa in classified.roas {
            self.validate_roa(&context, &crl, roa, report);
        }
        for child in classified.child_certificates {
            self.validate_child(&context, &crl, child, seen, report);
        }
    }

    /// Validates a single ROA and records its verdict.
    fn validate_roa(
        &self,
        context: &CertificateContext,
        crl: &CrlObject,
        roa: RoaObject,
        report: &mut WalkReport,
    ) {
        let mut result = ValidationResult::new(roa.uri());
        self.validator.validate(
            roa.uri(), context, Some(crl), &self.options, &mut result
        );
        let failed = result.has_failures();
        let checks = result.into_checks();
        let verdict = if failed {
            ValidatedObject::invalid(checks)
        }
        else {
            ValidatedObject::valid(
                ObjectContent::Roa(roa.content().clone()), checks
            )
        };
        report.objects.insert(roa.uri().clone(), verdict);
    }

    /// Validates a child certificate, recursing if it is a CA.
    fn validate_child(
        &self,
        context: &CertificateContext,
        crl: &CrlObject,
        child: CertObject,
        seen: &mut HashSet<String>,
        report: &mut WalkReport,
    ) {
        let mut result = ValidationResult::new(child.uri());
        self.validator.validate(
            child.uri(), context, Some(crl), &self.options, &mut result
        );
        let failed = result.has_failures();
        let checks = result.into_checks();
        if failed {
            report.objects.insert(
                child.uri().clone(), ValidatedObject::invalid(checks)
            );
            return
        }

        if !child.content().is_object_issuing_ca() {
            // A terminal end-entity certificate. Record it and stop.
            report.objects.insert(
                child.uri().clone(),
                ValidatedObject::valid(
                    ObjectContent::Certificate(child.content().clone()),
                    checks,
                ),
            );
            return
        }
        report.checks.extend(checks);

        let child_ski = child.content()
            .subject_key_identifier().to_hex_string();
        if seen.contains(&child_ski) {
            warn!(
                "[{}] certificate chain loop at {}, skipping",
                child_ski, child.uri()
            );
            return
        }
        let child_uri = child.uri().clone();
        let child_context = CertificateContext::new(
            &child_uri, child.into_content()
        );
        self.step(child_context, seen, report);
    }
}


//------------ WalkReport ----------------------------------------------------

/// The outcome of walking one trust anchor.
#[derive(Clone, Debug, Default, Serialize)]
pub struct WalkReport {
    /// The verdicts for all terminal objects, keyed by URI.
    pub objects: HashMap<uri::Rsync, ValidatedObject>,

    /// All checks produced during the walk, in walk order.
    pub checks: Vec<Check>,
}

impl WalkReport {
    /// Returns the route origins of all validated ROAs.
    ///
    /// The origins are sorted and deduplicated. This is the payload set
    /// the RTR side serves.
    pub fn route_origins(&self) -> Vec<RouteOrigin> {
        let mut res: Vec<_> = self.objects.values().filter_map(
            |object| {
                object.content().and_then(ObjectContent::as_roa)
            }
        ).flat_map(|roa| {
            roa.origins().iter().copied()
        }).collect();
        res.sort();
        res.dedup();
        res
    }

    /// Returns whether any check is a reject.
    pub fn has_rejects(&self) -> bool {
        self.checks.iter().any(Check::is_reject)
            || self.objects.values().any(|object| {
                object.checks().iter().any(Check::is_reject)
            })
    }
}


//============ Testing =======================================================

#[cfg(test)]
mod test {
    use std::str::FromStr;
    use chrono::TimeZone;
    use crate::crypto::{KeyIdentifier, ObjectDigest};
    use crate::fetch::FetchError;
    use crate::object::{
        CrlContent, FileAndHash, ManifestContent, RepositoryObject,
        ResourceCertificate, RoaContent,
    };
    use crate::payload::{Asn, MaxLenPrefix};
    use crate::store::MemoryStorage;
    use super::*;

    //-------- Test collaborators -------------------------------------

    /// A fetcher that always succeeds.
    struct NullFetcher;

    impl RepoFetcher for NullFetcher {
        fn fetch_repo(&self, _uri: &str) -> Result<(), FetchError> {
            Ok(())
        }

        fn fetch_trust_anchor_certificate(
            &self, _uri: &str
        ) -> Result<(), FetchError> {
            Ok(())
        }
    }

    /// A validator that fails exactly the listed URIs.
    #[derive(Default)]
    struct ScriptedValidator {
        fail: Vec<String>,
    }

    impl CryptoValidator for ScriptedValidator {
        fn validate(
            &self,
            uri: &uri::Rsync,
            _issuer: &CertificateContext,
            _crl: Option<&crate::object::CrlObject>,
            _options: &ValidationOptions,
            result: &mut ValidationResult,
        ) {
            if self.fail.iter().any(|item| item == uri.as_str()) {
                result.reject(
                    Key::other("cert.signature.invalid"), Vec::new()
                );
            }
        }
    }

    //-------- Tree building helpers ----------------------------------

    fn ski(fill: u8) -> KeyIdentifier {
        KeyIdentifier::from([fill; 20])
    }

    fn digest(fill: u8) -> ObjectDigest {
        ObjectDigest::from([fill; 32])
    }

    fn uri(s: &str) -> uri::Rsync {
        uri::Rsync::from_str(s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn ca_cert(own: u8, parent: Option<u8>, name: &str)
        -> ResourceCertificate
    {
        ResourceCertificate::new(
            ski(own), parent.map(ski),
            Some(uri(&format!("rsync://host/mod/{}/", name))),
            Some(uri(&format!("rsync://host/mod/{}/ca.mft", name))),
            None,
        )
    }

    /// Publishes a full publication point for a CA into the store.
    ///
    /// The point consists of a CRL, a manifest listing the CRL and the
    /// given extra files, and the extra objects themselves.
    fn publish_point(
        store: &MemoryStorage,
        own: u8,
        name: &str,
        extra: Vec<(&str, u8, ObjectContent)>,
    ) {
        let base = format!("rsync://host/mod/{}", name);
        store.insert(RepositoryObject::new(
            uri(&format!("{}/ca.crl", base)),
            digest(own),
            ObjectContent::Crl(CrlContent::new(ski(own), 1)),
        ));
        let mut files = vec![FileAndHash::new("ca.crl", digest(own))];
        for (file, fill, content) in extra {
            files.push(FileAndHash::new(file, digest(fill)));
            store.insert(RepositoryObject::new(
                uri(&format!("{}/{}", base, file)),
                digest(fill),
                content,
            ));
        }
        store.insert(RepositoryObject::new(
            uri(&format!("{}/ca.mft", base)),
            digest(own.wrapping_add(100)),
            ObjectContent::Manifest(
                ManifestContent::new(ski(own), 1, files)
            ),
        ));
    }

    fn origin(s: &str, asn: u32) -> RouteOrigin {
        RouteOrigin::new(
            MaxLenPrefix::from_str(s).unwrap(), Asn::from_u32(asn)
        )
    }

    fn walk_with(
        store: &MemoryStorage, validator: &ScriptedValidator
    ) -> WalkReport {
        let repos = RepoService::new(
            NullFetcher, chrono::Duration::minutes(10)
        );
        let walker = Walker::new(
            store, &repos, validator,
            ValidationOptions::default(), now(),
        );
        walker.walk(CertificateContext::new(
            "rsync://host/mod/ta.cer", ca_cert(1, None, "ta")
        ))
    }

    //-------- Tests --------------------------------------------------

    #[test]
    fn missing_crl_rejects_with_crl_required() {
        let store = MemoryStorage::new();
        let report = walk_with(&store, &ScriptedValidator::default());

        assert!(report.objects.is_empty());
        assert_eq!(report.checks.len(), 1);
        assert!(report.checks[0].is_reject());
        assert_eq!(report.checks[0].key(), &Key::CrlRequired);
        assert_eq!(
            report.checks[0].location().as_str(),
            "rsync://host/mod/ta.cer"
        );
    }

    #[test]
    fn missing_manifest_warns_should_have_manifest() {
        let store = MemoryStorage::new();
        store.insert(RepositoryObject::new(
            uri("rsync://host/mod/ta/ca.crl"),
            digest(1),
            ObjectContent::Crl(CrlContent::new(ski(1), 1)),
        ));
        let report = walk_with(&store, &ScriptedValidator::default());

        assert!(report.objects.is_empty());
        assert_eq!(report.checks.len(), 1);
        assert!(!report.checks[0].is_reject());
        assert_eq!(
            report.checks[0].key(), &Key::CaShouldHaveManifest
        );
    }

    #[test]
    fn roas_of_a_valid_point_end_up_in_the_map() {
        let store = MemoryStorage::new();
        publish_point(&store, 1, "ta", vec![
            (
                "a.roa", 11,
                ObjectContent::Roa(RoaContent::new(
                    ski(1), vec![origin("10.0.0.0/16-24", 65000)]
                ))
            ),
        ]);
        let report = walk_with(&store, &ScriptedValidator::default());

        assert!(report.checks.is_empty());
        assert_eq!(report.objects.len(), 1);
        let verdict = &report.objects[
            &uri("rsync://host/mod/ta/a.roa")
        ];
        assert!(verdict.is_valid());
        assert_eq!(
            report.route_origins(),
            [origin("10.0.0.0/16-24", 65000)]
        );
    }

    #[test]
    fn child_ca_is_recursed_into() {
        let store = MemoryStorage::new();
        publish_point(&store, 1, "ta", vec![
            (
                "child.cer", 2,
                ObjectContent::Certificate(
                    ca_cert(2, Some(1), "child")
                )
            ),
        ]);
        publish_point(&store, 2, "child", vec![
            (
                "b.roa", 22,
                ObjectContent::Roa(RoaContent::new(
                    ski(2), vec![origin("192.0.2.0/24", 65001)]
                ))
            ),
        ]);
        let report = walk_with(&store, &ScriptedValidator::default());

        assert!(report.checks.is_empty());
        // Only the ROA is terminal; the child CA is recursed through.
        assert_eq!(report.objects.len(), 1);
        assert_eq!(
            report.route_origins(), [origin("192.0.2.0/24", 65001)]
        );
    }

    #[test]
    fn failed_child_does_not_stop_siblings() {
        let store = MemoryStorage::new();
        publish_point(&store, 1, "ta", vec![
            (
                "bad.roa", 11,
                ObjectContent::Roa(RoaContent::new(
                    ski(1), vec![origin("10.0.0.0/8", 64999)]
                ))
            ),
            (
                "good.roa", 12,
                ObjectContent::Roa(RoaContent::new(
                    ski(1), vec![origin("192.0.2.0/24", 65001)]
                ))
            ),
        ]);
        let validator = ScriptedValidator {
            fail: vec!["rsync://host/mod/ta/bad.roa".into()],
        };
        let report = walk_with(&store, &validator);

        assert_eq!(report.objects.len(), 2);
        assert!(!report.objects[
            &uri("rsync://host/mod/ta/bad.roa")
        ].is_valid());
        assert!(report.objects[
            &uri("rsync://host/mod/ta/good.roa")
        ].is_valid());
        // Only the good ROA contributes origins.
        assert_eq!(
            report.route_origins(), [origin("192.0.2.0/24", 65001)]
        );
        assert!(report.has_rejects());
    }

    #[test]
    fn certificate_loop_is_skipped() {
        let store = MemoryStorage::new();
        // The child lists its parent's certificate again.
        publish_point(&store, 1, "ta", vec![
            (
                "child.cer", 2,
                ObjectContent::Certificate(
                    ca_cert(2, Some(1), "child")
                )
            ),
        ]);
        publish_point(&store, 2, "child", vec![
            (
                "loop.cer", 1,
                ObjectContent::Certificate(ca_cert(1, Some(2), "ta"))
            ),
        ]);
        let report = walk_with(&store, &ScriptedValidator::default());

        // The walk terminates and reports no loop-related checks.
        assert!(report.checks.is_empty());
    }

    #[test]
    fn rejected_subtree_keeps_its_candidate_checks() {
        let store = MemoryStorage::new();
        publish_point(&store, 1, "ta", vec![]);
        // Make the only CRL fail validation.
        let validator = ScriptedValidator {
            fail: vec!["rsync://host/mod/ta/ca.crl".into()],
        };
        let report = walk_with(&store, &validator);

        assert!(report.objects.is_empty());
        // The candidate's failure plus the CRL_REQUIRED reject.
        assert_eq!(report.checks.len(), 2);
        assert_eq!(
            report.checks[0].key().as_str(), "cert.signature.invalid"
        );
        assert_eq!(report.checks[1].key(), &Key::CrlRequired);
    }

    #[test]
    fn terminal_ee_certificate_is_recorded() {
        let store = MemoryStorage::new();
        publish_point(&store, 1, "ta", vec![
            (
                "ee.cer", 3,
                ObjectContent::Certificate(ResourceCertificate::new(
                    ski(3), Some(ski(1)), None, None, None
                ))
            ),
        ]);
        let report = walk_with(&store, &ScriptedValidator::default());

        assert_eq!(report.objects.len(), 1);
        assert!(report.objects[
            &uri("rsync://host/mod/ta/ee.cer")
        ].is_valid());
    }
}
