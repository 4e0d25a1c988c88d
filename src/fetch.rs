//! Deduplicated repository fetching.
//!
//! A validation run touches the same publication point many times: every
//! certificate of a CA names the repository it issues into, and several
//! CAs may share one. Fetching is expensive, so [`RepoService`] keeps a
//! table of when each URI was last fetched and only calls down into the
//! [`RepoFetcher`] when the last visit is outside the freshness window
//! or a fetch is forced.
//!
//! Visits to one URI are serialized: each URI owns its own lock which is
//! held across the check, the fetch, and the recording of the visit
//! time. Distinct URIs proceed concurrently. A failed fetch leaves no
//! trace in the table, so the next visit retries.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};


//------------ RepoFetcher ---------------------------------------------------

/// Something that can populate the object store from a remote location.
///
/// Implementations fetch synchronously: when a method returns, every
/// object below the URI is in the store.
pub trait RepoFetcher {
    /// Fetches everything under the repository publication point `uri`.
    fn fetch_repo(&self, uri: &str) -> Result<(), FetchError>;

    /// Fetches the single trust anchor certificate at `uri`.
    fn fetch_trust_anchor_certificate(
        &self, uri: &str
    ) -> Result<(), FetchError>;
}


//------------ RepoService ---------------------------------------------------

/// The fetch deduplication service.
///
/// One value of this type is shared by all trust anchor walks of a
/// process. It is handed to each walker by reference.
#[derive(Debug)]
pub struct RepoService<F> {
    /// The underlying fetcher.
    fetcher: F,

    /// How long a recorded visit stays fresh.
    max_age: Duration,

    /// The time of the last successful visit, per URI.
    visited: Mutex<HashMap<String, VisitEntry>>,
}

/// The per-URI slot of the visit table.
///
/// The inner mutex is held for the whole visit including the fetch, so
/// at most one fetch per URI is ever in flight.
type VisitEntry = Arc<Mutex<Option<DateTime<Utc>>>>;

impl<F> RepoService<F> {
    /// Creates a new service around a fetcher.
    pub fn new(fetcher: F, max_age: Duration) -> Self {
        RepoService {
            fetcher,
            max_age,
            visited: Mutex::new(HashMap::new()),
        }
    }

    /// Forgets all recorded visits.
    ///
    /// This exists for tests and for starting a fresh validation pass
    /// that must not trust earlier fetches.
    pub fn reset(&self) {
        self.visited.lock().expect("poisoned visit table").clear();
    }

    /// Returns the slot for `uri`, creating it if necessary.
    fn entry(&self, uri: &str) -> VisitEntry {
        let mut visited = self.visited.lock().expect(
            "poisoned visit table"
        );
        visited.entry(uri.into()).or_default().clone()
    }
}

impl<F: RepoFetcher> RepoService<F> {
    /// Ensures the repository at `uri` has been fetched recently.
    ///
    /// If `force_fetch` is set, fetches unconditionally. Returns an
    /// error if the underlying fetch fails; in that case nothing is
    /// recorded and the next visit will retry.
    pub fn visit_repo(
        &self, force_fetch: bool, now: DateTime<Utc>, uri: &str
    ) -> Result<(), FetchError> {
        self.visit(force_fetch, now, uri, false)
    }

    /// Ensures the trust anchor certificate at `uri` has been fetched
    /// recently.
    pub fn visit_trust_anchor_certificate(
        &self, force_fetch: bool, now: DateTime<Utc>, uri: &str
    ) -> Result<(), FetchError> {
        self.visit(force_fetch, now, uri, true)
    }

    fn visit(
        &self,
        force_fetch: bool,
        now: DateTime<Utc>,
        uri: &str,
        trust_anchor: bool,
    ) -> Result<(), FetchError> {
        let entry = self.entry(uri);
        let mut last = entry.lock().expect("poisoned visit entry");
        if let Some(last_visited) = *last {
            if time_is_recent(
                last_visited, self.max_age, now, force_fetch
            ) {
                debug!("{}: visited recently, skipping fetch", uri);
                return Ok(())
            }
        }
        let res = if trust_anchor {
            self.fetcher.fetch_trust_anchor_certificate(uri)
        }
        else {
            self.fetcher.fetch_repo(uri)
        };
        match res {
            Ok(()) => {
                *last = Some(now);
                Ok(())
            }
            Err(err) => {
                warn!("{}: fetch failed: {}", uri, err);
                Err(err)
            }
        }
    }
}


//------------ time_is_recent ------------------------------------------------

/// Returns whether a visit at `last_visited` is still fresh at `now`.
///
/// A forced fetch is never fresh.
pub fn time_is_recent(
    last_visited: DateTime<Utc>,
    max_age: Duration,
    now: DateTime<Utc>,
    force_fetch: bool,
) -> bool {
    !force_fetch && now - last_visited <= max_age
}


//------------ FetchError ----------------------------------------------------

/// Fetching from a remote location failed.
///
/// The walker converts these into warnings attached to the location
/// being validated; they never abort a walk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchError(String);

impl FetchError {
    pub fn new(msg: impl Into<String>) -> Self {
        FetchError(msg.into())
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for FetchError { }


//============ Testing =======================================================
