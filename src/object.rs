//! Repository objects as validation sees them.
//!
//! The store hands out decoded objects paired with the URI they were
//! published at and the digest over their raw content. Decoding and
//! signature checking happen in the external crypto library; the views
//! in this module only expose the fields the walker needs to steer the
//! descent: key identifiers, numbers, the manifest file list, the
//! subject information access URIs of a CA certificate, and the route
//! origins of a ROA.

use std::fmt;
use serde::Serialize;
use crate::check::{Check, ValidationLocation};
use crate::crypto::{KeyIdentifier, ObjectDigest};
use crate::payload::RouteOrigin;
use crate::uri;


//------------ RepositoryObject ----------------------------------------------

/// An object retrieved from the repository store.
///
/// This pairs a decoded object with the URI it was published at and the
/// digest over its raw content. Two repository objects are equal if both
/// URI and digest agree; the decoded content never enters the
/// comparison.
#[derive(Clone, Debug)]
pub struct RepositoryObject<T> {
    uri: uri::Rsync,
    digest: ObjectDigest,
    content: T,
}

impl<T> RepositoryObject<T> {
    /// Creates a new repository object.
    pub fn new(uri: uri::Rsync, digest: ObjectDigest, content: T) -> Self {
        RepositoryObject { uri, digest, content }
    }

    /// Returns the URI the object was published at.
    pub fn uri(&self) -> &uri::Rsync {
        &self.uri
    }

    /// Returns the digest over the object's raw content.
    pub fn digest(&self) -> ObjectDigest {
        self.digest
    }

    /// Returns a reference to the decoded content.
    pub fn content(&self) -> &T {
        &self.content
    }

    /// Converts the object into its decoded content.
    pub fn into_content(self) -> T {
        self.content
    }

    /// Maps the decoded content, keeping URI and digest.
    pub fn map<U>(self, op: impl FnOnce(T) -> U) -> RepositoryObject<U> {
        RepositoryObject {
            uri: self.uri,
            digest: self.digest,
            content: op(self.content),
        }
    }
}

impl<T> PartialEq for RepositoryObject<T> {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri && self.digest == other.digest
    }
}

impl<T> Eq for RepositoryObject<T> { }


//------------ Type Aliases --------------------------------------------------

pub type CertObject = RepositoryObject<ResourceCertificate>;
pub type CrlObject = RepositoryObject<CrlContent>;
pub type ManifestObject = RepositoryObject<ManifestContent>;
pub type RoaObject = RepositoryObject<RoaContent>;
pub type StoredObject = RepositoryObject<ObjectContent>;


//------------ ResourceCertificate -------------------------------------------

/// The decoded view of an RPKI resource certificate.
///
/// Only the fields that steer the walk are exposed: the key identifiers
/// and the subject information access URIs.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ResourceCertificate {
    /// The identifier of the certificate's subject key.
    subject_key_identifier: KeyIdentifier,

    /// The identifier of the issuing key.
    ///
    /// Absent on a self-signed trust anchor certificate.
    authority_key_identifier: Option<KeyIdentifier>,

    /// The rsync URI of the CA's publication point.
    ///
    /// Present exactly when this is an object-issuing CA certificate.
    ca_repository: Option<uri::Rsync>,

    /// The rsync URI at which the CA publishes its manifest.
    rpki_manifest: Option<uri::Rsync>,

    /// The HTTPS URI of the CA's RRDP notification file.
    rpki_notify: Option<uri::Https>,
}

impl ResourceCertificate {
    /// Creates a new certificate view.
    pub fn new(
        subject_key_identifier: KeyIdentifier,
        authority_key_identifier: Option<KeyIdentifier>,
        ca_repository: Option<uri::Rsync>,
        rpki_manifest: Option<uri::Rsync>,
        rpki_notify: Option<uri::Https>,
    ) -> Self {
        ResourceCertificate {
            subject_key_identifier,
            authority_key_identifier,
            ca_repository,
            rpki_manifest,
            rpki_notify,
        }
    }

    pub fn subject_key_identifier(&self) -> KeyIdentifier {
        self.subject_key_identifier
    }

    pub fn authority_key_identifier(&self) -> Option<KeyIdentifier> {
        self.authority_key_identifier
    }

    pub fn ca_repository(&self) -> Option<&uri::Rsync> {
        self.ca_repository.as_ref()
    }

    pub fn rpki_manifest(&self) -> Option<&uri::Rsync> {
        self.rpki_manifest.as_ref()
    }

    pub fn rpki_notify(&self) -> Option<&uri::Https> {
        self.rpki_notify.as_ref()
    }

    /// Returns whether this is an object-issuing CA certificate.
    ///
    /// Such a certificate names the publication point it issues into and
    /// the manifest it maintains there.
    pub fn is_object_issuing_ca(&self) -> bool {
        self.ca_repository.is_some() && self.rpki_manifest.is_some()
    }
}


//------------ CrlContent ----------------------------------------------------

/// The decoded view of a certificate revocation list.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CrlContent {
    /// The identifier of the issuing key.
    authority_key_identifier: KeyIdentifier,

    /// The CRL number.
    crl_number: u128,
}

impl CrlContent {
    pub fn new(
        authority_key_identifier: KeyIdentifier, crl_number: u128
    ) -> Self {
        CrlContent { authority_key_identifier, crl_number }
    }

    pub fn authority_key_identifier(&self) -> KeyIdentifier {
        self.authority_key_identifier
    }

    pub fn crl_number(&self) -> u128 {
        self.crl_number
    }
}


//------------ ManifestContent -----------------------------------------------

/// The decoded content of a manifest.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ManifestContent {
    /// The identifier of the issuing key.
    authority_key_identifier: KeyIdentifier,

    /// The manifest number.
    manifest_number: u128,

    /// The files of the publication point with their expected digests.
    ///
    /// The list keeps the order in which the manifest declared its
    /// entries so that reported checks come out in a stable order.
    file_list: Vec<FileAndHash>,
}

impl ManifestContent {
    pub fn new(
        authority_key_identifier: KeyIdentifier,
        manifest_number: u128,
        file_list: Vec<FileAndHash>,
    ) -> Self {
        ManifestContent {
            authority_key_identifier, manifest_number, file_list
        }
    }

    pub fn authority_key_identifier(&self) -> KeyIdentifier {
        self.authority_key_identifier
    }

    pub fn manifest_number(&self) -> u128 {
        self.manifest_number
    }

    /// Returns an iterator over the files in the manifest.
    pub fn iter(&self) -> impl Iterator<Item = &FileAndHash> {
        self.file_list.iter()
    }

    /// Returns an iterator over the file URIs and their expected
    /// digests.
    ///
    /// Since the manifest only contains file names, resolving them needs
    /// a base URI. It is taken from `base`, the publication point of the
    /// issuing certificate.
    pub fn iter_uris<'a>(
        &'a self, base: &'a uri::Rsync
    ) -> impl Iterator<Item = (uri::Rsync, ObjectDigest)> + 'a {
        self.file_list.iter().map(move |item| {
            (base.join(&item.file), item.hash)
        })
    }

    /// Returns the number of entries in the file list.
    pub fn len(&self) -> usize {
        self.file_list.len()
    }

    /// Returns whether the file list is empty.
    pub fn is_empty(&self) -> bool {
        self.file_list.is_empty()
    }
}


//------------ FileAndHash ---------------------------------------------------

/// A single manifest entry: a file name and its expected digest.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FileAndHash {
    pub file: String,
    pub hash: ObjectDigest,
}

impl FileAndHash {
    pub fn new(file: impl Into<String>, hash: ObjectDigest) -> Self {
        FileAndHash { file: file.into(), hash }
    }
}


//------------ RoaContent ----------------------------------------------------

/// The decoded content of a route origin authorization.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RoaContent {
    /// The identifier of the issuing key.
    authority_key_identifier: KeyIdentifier,

    /// The route origins the ROA authorizes.
    origins: Vec<RouteOrigin>,
}

impl RoaContent {
    pub fn new(
        authority_key_identifier: KeyIdentifier,
        origins: Vec<RouteOrigin>,
    ) -> Self {
        RoaContent { authority_key_identifier, origins }
    }

    pub fn authority_key_identifier(&self) -> KeyIdentifier {
        self.authority_key_identifier
    }

    pub fn origins(&self) -> &[RouteOrigin] {
        &self.origins
    }
}


//------------ ObjectContent -------------------------------------------------

/// The decoded content of any repository object.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum ObjectContent {
    Certificate(ResourceCertificate),
    Crl(CrlContent),
    Manifest(ManifestContent),
    Roa(RoaContent),
}

impl ObjectContent {
    /// Returns the certificate view if this is a certificate.
    pub fn as_certificate(&self) -> Option<&ResourceCertificate> {
        match *self {
            ObjectContent::Certificate(ref inner) => Some(inner),
            _ => None
        }
    }

    /// Returns the CRL view if this is a CRL.
    pub fn as_crl(&self) -> Option<&CrlContent> {
        match *self {
            ObjectContent::Crl(ref inner) => Some(inner),
            _ => None
        }
    }

    /// Returns the manifest view if this is a manifest.
    pub fn as_manifest(&self) -> Option<&ManifestContent> {
        match *self {
            ObjectContent::Manifest(ref inner) => Some(inner),
            _ => None
        }
    }

    /// Returns the ROA view if this is a ROA.
    pub fn as_roa(&self) -> Option<&RoaContent> {
        match *self {
            ObjectContent::Roa(ref inner) => Some(inner),
            _ => None
        }
    }
}


//------------ CertificateContext --------------------------------------------

/// The issuer view used when validating the children of a CA.
///
/// The context bundles the issuing certificate with the places its
/// publication point can be found at.
#[derive(Clone, Debug)]
pub struct CertificateContext {
    /// The location the issuer was validated at.
    location: ValidationLocation,

    /// The issuing certificate.
    certificate: ResourceCertificate,

    /// The rsync URI of the issuer's publication point.
    repository_uri: uri::Rsync,

    /// The HTTPS URI of the issuer's RRDP notification file, if any.
    rpki_notify_uri: Option<uri::Https>,

    /// The rsync URI the issuer claims its manifest lives at.
    manifest_uri: Option<uri::Rsync>,
}

impl CertificateContext {
    /// Creates the issuer context for a CA certificate.
    ///
    /// # Panics
    ///
    /// The certificate must be an object-issuing CA certificate, i.e.
    /// it must carry a CA repository URI. Anything else is a programmer
    /// error: callers check before they descend.
    pub fn new(
        location: impl Into<ValidationLocation>,
        certificate: ResourceCertificate,
    ) -> Self {
        let repository_uri = certificate.ca_repository().expect(
            "issuer context built from non-issuing certificate"
        ).clone();
        let rpki_notify_uri = certificate.rpki_notify().cloned();
        let manifest_uri = certificate.rpki_manifest().cloned();
        CertificateContext {
            location: location.into(),
            certificate,
            repository_uri,
            rpki_notify_uri,
            manifest_uri,
        }
    }

    /// Returns the location the issuer was validated at.
    pub fn location(&self) -> &ValidationLocation {
        &self.location
    }

    /// Returns the issuing certificate.
    pub fn certificate(&self) -> &ResourceCertificate {
        &self.certificate
    }

    /// Returns the identifier of the issuer's subject key.
    ///
    /// Children of this issuer carry this value as their authority key
    /// identifier.
    pub fn subject_key_identifier(&self) -> KeyIdentifier {
        self.certificate.subject_key_identifier()
    }

    /// Returns the rsync URI of the issuer's publication point.
    pub fn repository_uri(&self) -> &uri::Rsync {
        &self.repository_uri
    }

    /// Returns the issuer's RRDP notification URI, if any.
    pub fn rpki_notify_uri(&self) -> Option<&uri::Https> {
        self.rpki_notify_uri.as_ref()
    }

    /// Returns the URI the issuer claims its manifest lives at.
    pub fn manifest_uri(&self) -> Option<&uri::Rsync> {
        self.manifest_uri.as_ref()
    }

    /// Returns the URI to prefetch before walking this issuer.
    ///
    /// The RRDP notification URI takes precedence over the plain
    /// publication point.
    pub fn prefetch_uri(&self) -> &str {
        match self.rpki_notify_uri {
            Some(ref uri) => uri.as_str(),
            None => self.repository_uri.as_str()
        }
    }
}


//------------ ValidatedObject -----------------------------------------------

/// The verdict attached to a single object URI.
///
/// Carries the checks produced while validating the object and, if it
/// validated, the decoded content.
#[derive(Clone, Debug, Serialize)]
pub struct ValidatedObject {
    checks: Vec<Check>,
    content: Option<ObjectContent>,
}

impl ValidatedObject {
    /// Creates the verdict for an object that validated.
    pub fn valid(content: ObjectContent, checks: Vec<Check>) -> Self {
        ValidatedObject { checks, content: Some(content) }
    }

    /// Creates the verdict for an object that did not validate.
    pub fn invalid(checks: Vec<Check>) -> Self {
        ValidatedObject { checks, content: None }
    }

    /// Returns whether the object validated.
    pub fn is_valid(&self) -> bool {
        self.content.is_some()
    }

    /// Returns the decoded content if the object validated.
    pub fn content(&self) -> Option<&ObjectContent> {
        self.content.as_ref()
    }

    /// Returns the checks recorded for the object.
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }
}

impl fmt::Display for ValidatedObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_valid() {
            f.write_str("valid")
        }
        else {
            f.write_str("invalid")
        }
    }
}


//------------ ClassifiedObjects ---------------------------------------------

/// The objects of a publication point sorted by kind.
///
/// Produced by the manifest cross-check from the entries of the chosen
/// manifest. Objects of unknown kind are dropped during classification.
#[derive(Clone, Debug, Default)]
pub struct ClassifiedObjects {
    /// The route origin authorizations listed on the manifest.
    pub roas: Vec<RoaObject>,

    /// The subordinate CA certificates listed on the manifest.
    pub child_certificates: Vec<CertObject>,

    /// The CRLs listed on the manifest.
    pub crls: Vec<CrlObject>,
}


//============ Testing =======================================================

#[cfg(test)]
mod test {
    use std::str::FromStr;
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

    #[test]
    fn equality_is_by_uri_and_digest() {
        let left = RepositoryObject::new(
            uri("rsync://host/mod/a.crl"), digest(1),
            CrlContent::new(ski(1), 10)
        );
        let same_place = RepositoryObject::new(
            uri("rsync://host/mod/a.crl"), digest(1),
            CrlContent::new(ski(2), 99)
        );
        let other_digest = RepositoryObject::new(
            uri("rsync://host/mod/a.crl"), digest(2),
            CrlContent::new(ski(1), 10)
        );
        assert_eq!(left, same_place);
        assert_ne!(left, other_digest);
    }

    #[test]
    fn manifest_uris_resolve_against_base() {
        let content = ManifestContent::new(
            ski(1), 1,
            vec![
                FileAndHash::new("a.roa", digest(1)),
                FileAndHash::new("b.cer", digest(2)),
            ]
        );
        let base = uri("rsync://host/mod/ca");
        let uris: Vec<_> = content.iter_uris(&base).collect();
        assert_eq!(uris[0].0.as_str(), "rsync://host/mod/ca/a.roa");
        assert_eq!(uris[1].0.as_str(), "rsync://host/mod/ca/b.cer");
        assert_eq!(uris[0].1, digest(1));
    }

    #[test]
    fn context_prefetch_prefers_notify() {
        let cert = ResourceCertificate::new(
            ski(1), None,
            Some(uri("rsync://host/mod/ca/")),
            Some(uri("rsync://host/mod/ca/ca.mft")),
            Some(uri::Https::from_str("https://host/notify.xml").unwrap()),
        );
        let ctx = CertificateContext::new("rsync://host/mod/ca.cer", cert);
        assert_eq!(ctx.prefetch_uri(), "https://host/notify.xml");

        let cert = ResourceCertificate::new(
            ski(1), None,
            Some(uri("rsync://host/mod/ca/")),
            Some(uri("rsync://host/mod/ca/ca.mft")),
            None,
        );
        let ctx = CertificateContext::new("rsync://host/mod/ca.cer", cert);
        assert_eq!(ctx.prefetch_uri(), "rsync://host/mod/ca/");
    }

    #[test]
    #[should_panic]
    fn context_requires_issuing_ca() {
        let cert = ResourceCertificate::new(
            ski(1), Some(ski(2)), None, None, None
        );
        let _ = CertificateContext::new("rsync://host/mod/ee.cer", cert);
    }
}
