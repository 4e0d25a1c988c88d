//! Session state.
//!
//! An RTR session is identified by a sixteen bit nonce chosen when the
//! cache starts a session, and every version of the served data set is
//! numbered by a [`Serial`]. The cache sends both in its cache response
//! and end-of-data PDUs so a router can tell whether the data it holds
//! still belongs to the session it is talking to. [`State`] bundles the
//! two.

use std::{cmp, fmt};
use std::time::SystemTime;


//------------ State ---------------------------------------------------------

/// The session state of an RTR cache.
///
/// The nonce stays fixed for the lifetime of a session while the serial
/// advances by one whenever the cache publishes a new version of its
/// data set. A router presenting a serial under a different nonce is
/// talking about somebody else's data and has to reset.
#[derive(Clone, Copy, Debug)]
pub struct State {
    /// The session nonce.
    nonce: u16,

    /// The serial of the currently served data set version.
    serial: Serial,
}

impl State {
    /// Creates the state for a fresh session.
    ///
    /// The nonce is derived from the current wall-clock time so that a
    /// restarted cache is unlikely to reuse the nonce of its previous
    /// incarnation. The serial starts at zero.
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        State {
            nonce: (now.as_secs() as u16) ^ now.subsec_millis() as u16,
            serial: Serial::default(),
        }
    }

    /// Creates a state value from its components.
    pub const fn from_parts(nonce: u16, serial: Serial) -> Self {
        State { nonce, serial }
    }

    /// Moves the state to the next data set version.
    ///
    /// The nonce is untouched; only the serial advances.
    pub fn advance(&mut self) {
        self.serial = self.serial.next();
    }

    /// Returns the session nonce.
    pub fn nonce(self) -> u16 {
        self.nonce
    }

    /// Returns the serial number.
    pub fn serial(self) -> Serial {
        self.serial
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}


//------------ Serial --------------------------------------------------------

/// The version number of a served data set.
///
/// Serials live in the circular number space of [RFC 1982]: they wrap
/// around after `u32::MAX`, and two serials compare by the wrapped
/// distance between them. A serial is smaller than another if fewer
/// than half the number space lies between the first and the second;
/// two serials exactly half the space apart have no defined order,
/// which is why the type only implements `PartialOrd`.
///
/// [RFC 1982]: https://tools.ietf.org/html/rfc1982
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Serial(pub u32);

impl Serial {
    /// The serial following this one.
    ///
    /// The successor of `Serial(u32::MAX)` is `Serial(0)` again.
    #[must_use]
    pub fn next(self) -> Self {
        Serial(self.0.wrapping_add(1))
    }

    /// Returns the wrapped distance from this serial to `other`.
    ///
    /// This is the number of times `next` has to be applied to reach
    /// `other`.
    fn distance_to(self, other: Serial) -> u32 {
        other.0.wrapping_sub(self.0)
    }
}


//--- From

impl From<u32> for Serial {
    fn from(value: u32) -> Serial {
        Serial(value)
    }
}

impl From<Serial> for u32 {
    fn from(serial: Serial) -> u32 {
        serial.0
    }
}


//--- PartialOrd

impl cmp::PartialOrd for Serial {
    fn partial_cmp(&self, other: &Serial) -> Option<cmp::Ordering> {
        // Half the serial number space.
        const HORIZON: u32 = 0x8000_0000;

        if self == other {
            return Some(cmp::Ordering::Equal)
        }
        match self.distance_to(*other) {
            HORIZON => None,
            dist if dist < HORIZON => Some(cmp::Ordering::Less),
            _ => Some(cmp::Ordering::Greater),
        }
    }
}


//--- Display

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}


//============ Testing =======================================================
