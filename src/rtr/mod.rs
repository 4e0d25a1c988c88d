//! RTR: the RPKI to Router Protocol.
//!
//! Routers do not validate RPKI data themselves. They receive the
//! validated route origins from a relying party over a simple binary
//! protocol, the RPKI to Router Protocol or RTR for short. This module
//! implements the cache side of protocol version 0 as specified in
//! draft-ietf-sidr-rpki-rtr: the byte-exact PDU codec in [`pdu`], the
//! session state in [`state`], and a [`Server`] that answers reset
//! queries with the full payload set.
//!
//! The server is built atop [Tokio] and is generic over the concrete
//! socket type, so it can be used with different transports.
//!
//! [Tokio]: https://crates.io/crates/tokio

pub use self::server::{Server, VrpSource};
pub use self::state::{Serial, State};

pub mod pdu;
pub mod server;
pub mod state;
