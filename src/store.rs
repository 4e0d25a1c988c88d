//! The object store boundary.
//!
//! Validation never talks to the network or the file system directly.
//! It queries a [`Storage`] for the objects a previous fetch pass has
//! deposited: all CRLs or manifests issued by a given key, or the one
//! object published at a given URI. Every query returns an immutable
//! snapshot; the store is expected to keep reads consistent under a
//! concurrent ingest pass.
//!
//! [`MemoryStorage`] is a simple insertion-ordered implementation that
//! is good enough for tests and small embedders.

use std::collections::HashMap;
use std::sync::Mutex;
use crate::crypto::KeyIdentifier;
use crate::object::{
    CrlObject, ManifestObject, RepositoryObject, StoredObject
};
use crate::uri;


//------------ Storage -------------------------------------------------------

/// Read access to the repository object store.
pub trait Storage {
    /// Returns all stored CRLs issued by the key identified by `aki`.
    fn crls_by_aki(&self, aki: KeyIdentifier) -> Vec<CrlObject>;

    /// Returns all stored manifests issued by the key identified by
    /// `aki`.
    fn manifests_by_aki(&self, aki: KeyIdentifier) -> Vec<ManifestObject>;

    /// Returns the object stored at `uri`, if any.
    fn object(&self, uri: &uri::Rsync) -> Option<StoredObject>;
}


//------------ MemoryStorage -------------------------------------------------

/// An in-memory object store.
///
/// Objects are kept in insertion order, which makes the order of
/// candidate lists and therefore of reported checks deterministic.
/// Inserting an object at a URI that is already present replaces the
/// stored object in place.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// The objects in insertion order.
    objects: Vec<StoredObject>,

    /// Position of each URI in `objects`.
    index: HashMap<String, usize>,
}

impl MemoryStorage {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object, replacing any object already at its URI.
    pub fn insert(&self, object: StoredObject) {
        let mut inner = self.inner.lock().expect("poisoned store");
        let inner = &mut *inner;
        match inner.index.get(object.uri().as_str()) {
            Some(&pos) => {
                inner.objects[pos] = object;
            }
            None => {
                let pos = inner.objects.len();
                inner.index.insert(object.uri().as_str().into(), pos);
                inner.objects.push(object);
            }
        }
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("poisoned store").objects.len()
    }

    /// Returns whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn crls_by_aki(&self, aki: KeyIdentifier) -> Vec<CrlObject> {
        let inner = self.inner.lock().expect("poisoned store");
        inner.objects.iter().filter_map(|object| {
            let crl = object.content().as_crl()?;
            if crl.authority_key_identifier() != aki {
                return None
            }
            Some(RepositoryObject::new(
                object.uri().clone(), object.digest(), crl.clone()
            ))
        }).collect()
    }

    fn manifests_by_aki(
        &self, aki: KeyIdentifier
    ) -> Vec<ManifestObject> {
        let inner = self.inner.lock().expect("poisoned store");
        inner.objects.iter().filter_map(|object| {
            let manifest = object.content().as_manifest()?;
            if manifest.authority_key_identifier() != aki {
                return None
            }
            Some(RepositoryObject::new(
                object.uri().clone(), object.digest(), manifest.clone()
            ))
        }).collect()
    }

    fn object(&self, uri: &uri::Rsync) -> Option<StoredObject> {
        let inner = self.inner.lock().expect("poisoned store");
        inner.index.get(uri.as_str()).map(|&pos| {
            inner.objects[pos].clone()
        })
    }
}


//============ Testing =======================================================

#[cfg(test)]
mod test {
    use std::str::FromStr;
    use crate::crypto::ObjectDigest;
    use crate::object::{CrlContent, ManifestContent, ObjectContent};
    use super::*;

    fn ski(fill: u8) -> KeyIdentifier {
        KeyIdentifier::from([fill; 20])
    }

    fn uri(s: &str) -> uri::Rsync {
        uri::Rsync::from_str(s).unwrap()
    }

    fn crl(path: &str, aki: u8, number: u128) -> StoredObject {
        RepositoryObject::new(
            uri(path),
            ObjectDigest::from([number as u8; 32]),
            ObjectContent::Crl(CrlContent::new(ski(aki), number)),
        )
    }

    #[test]
    fn crls_by_aki_filters_and_keeps_order() {
        let store = MemoryStorage::new();
        store.insert(crl("rsync://host/mod/b.crl", 1, 2));
        store.insert(crl("rsync://host/mod/a.crl", 1, 1));
        store.insert(crl("rsync://host/mod/c.crl", 2, 3));

        let crls = store.crls_by_aki(ski(1));
        assert_eq!(crls.len(), 2);
        assert_eq!(crls[0].uri().as_str(), "rsync://host/mod/b.crl");
        assert_eq!(crls[1].uri().as_str(), "rsync://host/mod/a.crl");
        assert!(store.crls_by_aki(ski(9)).is_empty());
    }

    #[test]
    fn insert_replaces_in_place() {
        let store = MemoryStorage::new();
        store.insert(crl("rsync://host/mod/a.crl", 1, 1));
        store.insert(crl("rsync://host/mod/a.crl", 1, 2));
        assert_eq!(store.len(), 1);
        let stored = store.object(
            &uri("rsync://host/mod/a.crl")
        ).unwrap();
        assert_eq!(stored.content().as_crl().unwrap().crl_number(), 2);
    }

    #[test]
    fn manifest_lookup() {
        let store = MemoryStorage::new();
        store.insert(RepositoryObject::new(
            uri("rsync://host/mod/ca.mft"),
            ObjectDigest::from([9; 32]),
            ObjectContent::Manifest(
                ManifestContent::new(ski(1), 7, Vec::new())
            ),
        ));
        let manifests = store.manifests_by_aki(ski(1));
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].content().manifest_number(), 7);
    }
}
