//! RPKI relying-party validation.
//!
//! The _Resource Public Key Infrastructure_ (RPKI) is an application of
//! PKI to Internet routing security. It allows owners of IP address
//! prefixes and AS numbers to publish cryptographically signed statements
//! about these resources, which are collected and validated by a relying
//! party and distributed to routers for route origin validation.
//!
//! This crate implements the relying-party core: a top-down walk of the
//! certificate tree rooted in a trust anchor that selects the current
//! manifest and CRL for every certification authority, cross-checks the
//! manifest against the local object store, and produces a verdict for
//! every object it encounters. The resulting set of validated route
//! origins can be served to routers with the RPKI to Router protocol
//! implemented in the [`rtr`] module.
//!
//! Parsing and cryptographic verification of the individual objects is
//! left to an external library hooked in through the
//! [`CryptoValidator`][validation::CryptoValidator] trait, and the object
//! store is addressed through the [`Storage`][store::Storage] trait.

pub mod check;
pub mod crypto;
pub mod fetch;
pub mod object;
pub mod payload;
pub mod rtr;
pub mod store;
pub mod uri;
pub mod validation;
