//! Cross-checking a manifest against the store.
//!
//! The chosen manifest declares the files of the publication point with
//! their expected digests. The cross-check resolves every entry against
//! the store, excludes entries that are missing or whose stored content
//! does not match the declared digest, classifies the survivors by kind
//! and verifies that the manifest agrees with the chosen CRL and with
//! the location the issuer claims for it.
//!
//! All problems become warnings. A publication point with a questionable
//! manifest is still walked with whatever could be cross-checked.

use crate::check::{Check, Key, ValidationLocation};
use crate::object::{
    ClassifiedObjects, CrlObject, CertificateContext, ManifestObject,
    ObjectContent, RepositoryObject,
};
use crate::store::Storage;


//------------ crosscheck_manifest -------------------------------------------

/// Resolves and classifies the entries of the chosen manifest.
///
/// Returns the classified objects together with the warnings produced
/// along the way.
pub fn crosscheck_manifest(
    manifest: &ManifestObject,
    crl: &CrlObject,
    issuer: &CertificateContext,
    store: &impl Storage,
) -> (ClassifiedObjects, Vec<Check>) {
    let location = ValidationLocation::from(manifest.uri());
    let ski_hex = issuer.subject_key_identifier().to_hex_string();
    let mut checks = Vec::new();
    let mut classified = ClassifiedObjects::default();

    for (uri, expected) in manifest.content().iter_uris(
        issuer.repository_uri()
    ) {
        let stored = match store.object(&uri) {
            Some(stored) => stored,
            None => {
                checks.push(Check::warning(
                    location.clone(),
                    Key::ManifestFileNotFoundByAki,
                    vec![uri.as_str().into(), ski_hex.clone()],
                ));
                continue
            }
        };
        if stored.digest() != expected {
            checks.push(Check::warning(
                location.clone(),
                Key::ManifestLocationMismatch,
                vec![uri.as_str().into(), ski_hex.clone()],
            ));
            continue
        }
        let digest = stored.digest();
        let uri = stored.uri().clone();
        match stored.into_content() {
            ObjectContent::Roa(content) => {
                classified.roas.push(
                    RepositoryObject::new(
                        uri, digest, content
                    )
                );
            }
            ObjectContent::Certificate(content) => {
                classified.child_certificates.push(
                    RepositoryObject::new(
                        uri, digest, content
                    )
                );
            }
            ObjectContent::Crl(content) => {
                classified.crls.push(
                    RepositoryObject::new(
                        uri, digest, content
                    )
                );
            }
            ObjectContent::Manifest(_) => { }
        }
    }

    checks.extend(check_crl_entry(&classified, crl, &location));

    // The manifest must live where the issuer certificate says it does.
    if let Some(declared) = issuer.manifest_uri() {
        if !declared.eq_ignore_case(manifest.uri()) {
            checks.push(Check::warning(
                location,
                Key::ManifestLocationMismatch,
                Vec::new(),
            ));
        }
    }

    (classified, checks)
}

/// Checks that the manifest lists exactly the chosen CRL.
fn check_crl_entry(
    classified: &ClassifiedObjects,
    crl: &CrlObject,
    location: &ValidationLocation,
) -> Option<Check> {
    let entry = match classified.crls.as_slice() {
        [] => {
            return Some(Check::warning(
                location.clone(),
                Key::ManifestDoesNotContainFile,
                vec!["*.obj".into()],
            ))
        }
        [entry] => entry,
        _ => {
            let uris = classified.crls.iter().map(|item| {
                item.uri().as_str()
            }).collect::<Vec<_>>().join(", ");
            return Some(Check::warning(
                location.clone(),
                Key::ManifestDoesNotContainFile,
                vec![format!("Single CRL expected, found: {}", uris)],
            ))
        }
    };
    if entry.uri() != crl.uri() {
        Some(Check::warning(
            location.clone(),
            Key::ManifestCrlUriMismatch,
            Vec::new(),
        ))
    }
    else if entry.digest() != crl.digest() {
        Some(Check::warning(
            location.clone(),
            Key::ManifestHashMismatch,
            Vec::new(),
        ))
    }
    else {
        None
    }
}


//============ Testing =======================================================

#[cfg(test)]
mod test {
    use std::str::FromStr;
    use crate::crypto::{KeyIdentifier, ObjectDigest};
    use crate::object::{
        CrlContent, FileAndHash, ManifestContent, RepositoryObject,
        ResourceCertificate, RoaContent,
    };
    use crate::store::MemoryStorage;
    use crate::uri;
    use super::*;

    fn ski(fill: u8) -> KeyIdentifier {
        KeyIdentifier::from([fill; 20])
    }

    fn digest(fill: u8) -> ObjectDigest {
        ObjectDigest::from([fill; 32])
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

    fn manifest(entries: Vec<FileAndHash>) -> ManifestObject {
        RepositoryObject::new(
            uri("rsync://host/mod/ca/ca.mft"),
            digest(0x4d),
            ManifestContent::new(ski(1), 1, entries),
        )
    }

    fn chosen_crl() -> CrlObject {
        RepositoryObject::new(
            uri("rsync://host/mod/ca/ca.crl"),
            digest(5),
            CrlContent::new(ski(1), 1),
        )
    }

    fn store_with_crl() -> MemoryStorage {
        let store = MemoryStorage::new();
        store.insert(RepositoryObject::new(
            uri("rsync://host/mod/ca/ca.crl"),
            digest(5),
            ObjectContent::Crl(CrlContent::new(ski(1), 1)),
        ));
        store
    }

    #[test]
    fn complete_manifest_classifies_cleanly() {
        let store = store_with_crl();
        store.insert(RepositoryObject::new(
            uri("rsync://host/mod/ca/a.roa"),
            digest(6),
            ObjectContent::Roa(RoaContent::new(ski(1), Vec::new())),
        ));

        let (classified, checks) = crosscheck_manifest(
            &manifest(vec![
                FileAndHash::new("ca.crl", digest(5)),
                FileAndHash::new("a.roa", digest(6)),
            ]),
            &chosen_crl(),
            &issuer(),
            &store,
        );
        assert!(checks.is_empty());
        assert_eq!(classified.crls.len(), 1);
        assert_eq!(classified.roas.len(), 1);
        assert!(classified.child_certificates.is_empty());
    }

    #[test]
    fn missing_file_warns_by_aki() {
        let (classified, checks) = crosscheck_manifest(
            &manifest(vec![
                FileAndHash::new("ca.crl", digest(5)),
                FileAndHash::new("gone.roa", digest(7)),
            ]),
            &chosen_crl(),
            &issuer(),
            &store_with_crl(),
        );
        assert!(classified.roas.is_empty());
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].key(), &Key::ManifestFileNotFoundByAki);
        assert_eq!(
            checks[0].params()[0], "rsync://host/mod/ca/gone.roa"
        );
        assert_eq!(checks[0].params()[1], ski(1).to_hex_string());
    }

    #[test]
    fn hash_mismatch_excludes_and_warns() {
        let store = store_with_crl();
        store.insert(RepositoryObject::new(
            uri("rsync://host/mod/ca/a.roa"),
            digest(9),
            ObjectContent::Roa(RoaContent::new(ski(1), Vec::new())),
        ));

        let (classified, checks) = crosscheck_manifest(
            &manifest(vec![
                FileAndHash::new("ca.crl", digest(5)),
                FileAndHash::new("a.roa", digest(6)),
            ]),
            &chosen_crl(),
            &issuer(),
            &store,
        );
        assert!(classified.roas.is_empty());
        assert_eq!(checks.len(), 1);
        // The hash mismatch reuses the location mismatch key.
        assert_eq!(checks[0].key(), &Key::ManifestLocationMismatch);
    }

    #[test]
    fn no_crl_on_manifest_warns() {
        let (_, checks) = crosscheck_manifest(
            &manifest(Vec::new()),
            &chosen_crl(),
            &issuer(),
            &store_with_crl(),
        );
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].key(), &Key::ManifestDoesNotContainFile);
        assert_eq!(checks[0].params(), ["*.obj".to_owned()]);
    }

    #[test]
    fn two_crls_on_manifest_warns_with_both_uris() {
        let store = store_with_crl();
        store.insert(RepositoryObject::new(
            uri("rsync://host/mod/ca/extra.crl"),
            digest(8),
            ObjectContent::Crl(CrlContent::new(ski(1), 2)),
        ));

        let (_, checks) = crosscheck_manifest(
            &manifest(vec![
                FileAndHash::new("ca.crl", digest(5)),
                FileAndHash::new("extra.crl", digest(8)),
            ]),
            &chosen_crl(),
            &issuer(),
            &store,
        );
        assert_eq!(checks.len(), 1);
        let param = &checks[0].params()[0];
        assert!(param.starts_with("Single CRL expected, found:"));
        assert!(param.contains("rsync://host/mod/ca/ca.crl"));
        assert!(param.contains("rsync://host/mod/ca/extra.crl"));
    }

    #[test]
    fn crl_uri_mismatch_warns() {
        let store = MemoryStorage::new();
        store.insert(RepositoryObject::new(
            uri("rsync://host/mod/ca/other.crl"),
            digest(5),
            ObjectContent::Crl(CrlContent::new(ski(1), 1)),
        ));

        let (_, checks) = crosscheck_manifest(
            &manifest(vec![
                FileAndHash::new("other.crl", digest(5)),
            ]),
            &chosen_crl(),
            &issuer(),
            &store,
        );
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].key(), &Key::ManifestCrlUriMismatch);
    }

    #[test]
    fn crl_hash_mismatch_warns() {
        let store = MemoryStorage::new();
        store.insert(RepositoryObject::new(
            uri("rsync://host/mod/ca/ca.crl"),
            digest(6),
            ObjectContent::Crl(CrlContent::new(ski(1), 1)),
        ));

        let (_, checks) = crosscheck_manifest(
            &manifest(vec![
                FileAndHash::new("ca.crl", digest(6)),
            ]),
            &chosen_crl(),
            &issuer(),
            &store,
        );
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].key(), &Key::ManifestHashMismatch);
    }

    #[test]
    fn manifest_location_mismatch_is_case_insensitive() {
        let store = store_with_crl();

        // Same URI with different case passes.
        let issuer_mixed_case = CertificateContext::new(
            "rsync://host/mod/ca.cer",
            ResourceCertificate::new(
                ski(1), None,
                Some(uri("rsync://host/mod/ca/")),
                Some(uri("rsync://host/mod/ca/CA.MFT")),
                None,
            )
        );
        let (_, checks) = crosscheck_manifest(
            &manifest(vec![FileAndHash::new("ca.crl", digest(5))]),
            &chosen_crl(),
            &issuer_mixed_case,
            &store,
        );
        assert!(checks.is_empty());

        // A genuinely different URI warns.
        let issuer_elsewhere = CertificateContext::new(
            "rsync://host/mod/ca.cer",
            ResourceCertificate::new(
                ski(1), None,
                Some(uri("rsync://host/mod/ca/")),
                Some(uri("rsync://host/mod/ca/elsewhere.mft")),
                None,
            )
        );
        let (_, checks) = crosscheck_manifest(
            &manifest(vec![FileAndHash::new("ca.crl", digest(5))]),
            &chosen_crl(),
            &issuer_elsewhere,
            &store,
        );
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].key(), &Key::ManifestLocationMismatch);
    }
}
