//! Validated payload data.
//!
//! The end product of validation is a set of route origins, each a
//! triple of an address prefix, an optional maximum prefix length, and
//! the AS number authorized to originate routes for the prefix. The
//! types in this module carry that data between the walker and the RTR
//! serving side. They implement ordering and hashing so sets of them can
//! be compared and deduplicated.

use std::{fmt, hash};
use std::cmp::Ordering;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};


//------------ Asn -----------------------------------------------------------

/// An AS number (ASN).
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize
)]
#[serde(transparent)]
pub struct Asn(u32);

impl Asn {
    /// Creates an AS number from a `u32`.
    pub fn from_u32(value: u32) -> Self {
        Asn(value)
    }

    /// Converts an AS number into a `u32`.
    pub fn into_u32(self) -> u32 {
        self.0
    }

    /// Converts an AS number into a network-order byte array.
    pub fn to_raw(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl From<u32> for Asn {
    fn from(value: u32) -> Self {
        Asn(value)
    }
}

impl From<Asn> for u32 {
    fn from(value: Asn) -> Self {
        value.0
    }
}

impl FromStr for Asn {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = match s.get(..2) {
            Some(prefix) if prefix.eq_ignore_ascii_case("as") => &s[2..],
            _ => s
        };
        u32::from_str(s).map(Asn).map_err(|_| ParseError::BadAsn)
    }
}

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AS{}", self.0)
    }
}


//------------ Prefix --------------------------------------------------------

/// An IP address prefix: an IP address and a prefix length.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Prefix {
    /// The network address of the prefix.
    addr: IpAddr,

    /// The prefix length.
    len: u8,
}

impl Prefix {
    /// Creates a new prefix from an address and a length.
    ///
    /// The function returns an error if `len` is too large for the
    /// address family of `addr` or if any host bits are set in `addr`.
    pub fn new(addr: IpAddr, len: u8) -> Result<Self, PrefixError> {
        let res = Self::new_relaxed(addr, len)?;
        if res.addr != addr {
            return Err(PrefixError::NonZeroHost)
        }
        Ok(res)
    }

    /// Creates a new prefix zeroing out any host bits.
    pub fn new_relaxed(
        addr: IpAddr, len: u8
    ) -> Result<Self, PrefixError> {
        match addr {
            IpAddr::V4(addr) => Self::new_v4_relaxed(addr, len),
            IpAddr::V6(addr) => Self::new_v6_relaxed(addr, len),
        }
    }

    /// Creates a new IPv4 prefix zeroing out any host bits.
    pub fn new_v4_relaxed(
        addr: Ipv4Addr, len: u8
    ) -> Result<Self, PrefixError> {
        if len > 32 {
            return Err(PrefixError::LenOverflow)
        }
        let bits = u32::from(addr) & mask_v4(len);
        Ok(Prefix { addr: IpAddr::V4(bits.into()), len })
    }

    /// Creates a new IPv6 prefix zeroing out any host bits.
    pub fn new_v6_relaxed(
        addr: Ipv6Addr, len: u8
    ) -> Result<Self, PrefixError> {
        if len > 128 {
            return Err(PrefixError::LenOverflow)
        }
        let bits = u128::from(addr) & mask_v6(len);
        Ok(Prefix { addr: IpAddr::V6(bits.into()), len })
    }

    /// Returns the network address of the prefix.
    pub fn addr(self) -> IpAddr {
        self.addr
    }

    /// Returns the prefix length.
    pub fn len(self) -> u8 {
        self.len
    }

    /// Returns whether the prefix is for an IPv4 address.
    pub fn is_v4(self) -> bool {
        self.addr.is_ipv4()
    }
}

fn mask_v4(len: u8) -> u32 {
    if len == 0 { 0 } else { u32::MAX << (32 - len) }
}

fn mask_v6(len: u8) -> u128 {
    if len == 0 { 0 } else { u128::MAX << (128 - len) }
}


//--- PartialOrd and Ord
//
// IPv4 sorts before IPv6, otherwise prefixes sort by address and then
// by length.

impl PartialOrd for Prefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Prefix {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.addr, other.addr) {
            (IpAddr::V4(_), IpAddr::V6(_)) => Ordering::Less,
            (IpAddr::V6(_), IpAddr::V4(_)) => Ordering::Greater,
            (left, right) => {
                match left.cmp(&right) {
                    Ordering::Equal => self.len.cmp(&other.len),
                    other => other
                }
            }
        }
    }
}


//--- FromStr and Display

impl FromStr for Prefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s.split_once('/').ok_or(
            ParseError::MissingLen
        )?;
        let addr = IpAddr::from_str(addr).map_err(
            |_| ParseError::BadAddr
        )?;
        let len = u8::from_str(len).map_err(|_| ParseError::BadLen)?;
        Prefix::new(addr, len).map_err(ParseError::BadPrefix)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}


//------------ MaxLenPrefix --------------------------------------------------

/// A prefix with an optional maximum prefix length.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MaxLenPrefix {
    /// The prefix.
    prefix: Prefix,

    /// The optional maximum prefix length.
    max_len: Option<u8>,
}

impl MaxLenPrefix {
    /// Creates a new value.
    ///
    /// The function returns an error if `max_len` is present and smaller
    /// than the prefix length or larger than the maximum prefix length
    /// of the prefix's address family.
    pub fn new(
        prefix: Prefix, max_len: Option<u8>
    ) -> Result<Self, MaxLenError> {
        if let Some(max_len) = max_len {
            if (prefix.is_v4() && max_len > 32) || max_len > 128 {
                return Err(MaxLenError::Overflow)
            }
            if prefix.len() > max_len {
                return Err(MaxLenError::Underflow)
            }
        }
        Ok(MaxLenPrefix { prefix, max_len })
    }

    /// Returns the actual prefix.
    pub fn prefix(self) -> Prefix {
        self.prefix
    }

    /// Returns the address of the prefix.
    pub fn addr(self) -> IpAddr {
        self.prefix.addr()
    }

    /// Returns the prefix length.
    pub fn prefix_len(self) -> u8 {
        self.prefix.len()
    }

    /// Returns the max-length.
    pub fn max_len(self) -> Option<u8> {
        self.max_len
    }

    /// Returns the max-length or the prefix length if there is none.
    pub fn resolved_max_len(self) -> u8 {
        self.max_len.unwrap_or_else(|| self.prefix.len())
    }
}

impl From<Prefix> for MaxLenPrefix {
    fn from(prefix: Prefix) -> Self {
        MaxLenPrefix { prefix, max_len: None }
    }
}


//--- FromStr and Display

impl FromStr for MaxLenPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, max_len) = match s.find('-') {
            Some(dash) => {
                (
                    Prefix::from_str(&s[..dash])?,
                    Some(
                        u8::from_str(&s[dash + 1..]).map_err(
                            |_| ParseError::BadLen
                        )?
                    )
                )
            }
            None => (Prefix::from_str(s)?, None)
        };
        MaxLenPrefix::new(prefix, max_len).map_err(
            ParseError::BadMaxLen
        )
    }
}

impl fmt::Display for MaxLenPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.max_len {
            Some(max_len) => write!(f, "{}-{}", self.prefix, max_len),
            None => self.prefix.fmt(f)
        }
    }
}


//--- Serialize and Deserialize

impl Serialize for MaxLenPrefix {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MaxLenPrefix {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D
    ) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}


//------------ RouteOrigin ---------------------------------------------------

/// A route origin authorization.
///
/// Values of this type authorize the autonomous system given in the
/// `asn` field to originate routes for the IP address prefix given in
/// the `prefix` field.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct RouteOrigin {
    /// The address prefix to authorize.
    pub prefix: MaxLenPrefix,

    /// The autonomous system allowed to announce the prefix.
    pub asn: Asn,
}

impl RouteOrigin {
    /// Creates a new value from a prefix and an ASN.
    pub fn new(prefix: MaxLenPrefix, asn: Asn) -> Self {
        RouteOrigin { prefix, asn }
    }

    /// Returns whether this is an IPv4 origin.
    pub fn is_v4(self) -> bool {
        self.prefix.prefix().is_v4()
    }
}


//--- PartialEq and Eq
//
// An omitted max-len and a max-len equal to the prefix length make no
// practical difference, so equality and ordering use the resolved
// max-len.

impl PartialEq for RouteOrigin {
    fn eq(&self, other: &Self) -> bool {
        self.prefix.prefix() == other.prefix.prefix()
        && self.prefix.resolved_max_len()
            == other.prefix.resolved_max_len()
        && self.asn == other.asn
    }
}

impl Eq for RouteOrigin { }


//--- PartialOrd and Ord

impl PartialOrd for RouteOrigin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RouteOrigin {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.prefix.prefix().cmp(&other.prefix.prefix()) {
            Ordering::Equal => { }
            other => return other
        }
        match self.prefix.resolved_max_len().cmp(
            &other.prefix.resolved_max_len()
        ) {
            Ordering::Equal => { }
            other => return other
        }
        self.asn.cmp(&other.asn)
    }
}


//--- Hash

impl hash::Hash for RouteOrigin {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.prefix.prefix().hash(state);
        self.prefix.resolved_max_len().hash(state);
        self.asn.hash(state);
    }
}


//------------ PrefixError ---------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrefixError {
    /// The prefix length is too large for the address family.
    LenOverflow,

    /// Host bits are set in the address.
    NonZeroHost,
}

impl fmt::Display for PrefixError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            PrefixError::LenOverflow => {
                "prefix length too large for address family"
            }
            PrefixError::NonZeroHost => "non-zero host portion",
        })
    }
}

impl std::error::Error for PrefixError { }


//------------ MaxLenError ---------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MaxLenError {
    /// The max-length is too large for the address family.
    Overflow,

    /// The max-length is smaller than the prefix length.
    Underflow,
}

impl fmt::Display for MaxLenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            MaxLenError::Overflow => {
                "max-length too large for address family"
            }
            MaxLenError::Underflow => {
                "max-length smaller than prefix length"
            }
        })
    }
}

impl std::error::Error for MaxLenError { }


//------------ ParseError ----------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    BadAddr,
    BadLen,
    MissingLen,
    BadAsn,
    BadPrefix(PrefixError),
    BadMaxLen(MaxLenError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParseError::BadAddr => f.write_str("invalid address"),
            ParseError::BadLen => f.write_str("invalid prefix length"),
            ParseError::MissingLen => f.write_str("missing prefix length"),
            ParseError::BadAsn => f.write_str("invalid AS number"),
            ParseError::BadPrefix(err) => err.fmt(f),
            ParseError::BadMaxLen(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ParseError { }


//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    fn origin(s: &str, asn: u32) -> RouteOrigin {
        RouteOrigin::new(
            MaxLenPrefix::from_str(s).unwrap(), Asn::from_u32(asn)
        )
    }

    #[test]
    fn prefix_from_str() {
        let prefix = Prefix::from_str("10.0.0.0/8").unwrap();
        assert_eq!(prefix.len(), 8);
        assert!(prefix.is_v4());
        assert_eq!(prefix.to_string(), "10.0.0.0/8");

        assert_eq!(
            Prefix::from_str("10.0.0.1/8"),
            Err(ParseError::BadPrefix(PrefixError::NonZeroHost))
        );
        assert_eq!(
            Prefix::from_str("10.0.0.0/33"),
            Err(ParseError::BadPrefix(PrefixError::LenOverflow))
        );
        assert_eq!(
            Prefix::from_str("2001:db8::/32").unwrap().to_string(),
            "2001:db8::/32"
        );
    }

    #[test]
    fn prefix_relaxed_clears_host_bits() {
        let prefix = Prefix::new_relaxed(
            "10.1.2.3".parse().unwrap(), 8
        ).unwrap();
        assert_eq!(prefix.to_string(), "10.0.0.0/8");
    }

    #[test]
    fn max_len_bounds() {
        let prefix = Prefix::from_str("10.0.0.0/16").unwrap();
        assert!(MaxLenPrefix::new(prefix, Some(24)).is_ok());
        assert_eq!(
            MaxLenPrefix::new(prefix, Some(8)),
            Err(MaxLenError::Underflow)
        );
        assert_eq!(
            MaxLenPrefix::new(prefix, Some(33)),
            Err(MaxLenError::Overflow)
        );
    }

    #[test]
    fn origin_eq_resolves_max_len() {
        assert_eq!(origin("10.0.0.0/16-16", 65000), origin("10.0.0.0/16", 65000));
        assert_ne!(origin("10.0.0.0/16-24", 65000), origin("10.0.0.0/16", 65000));
        assert_ne!(origin("10.0.0.0/16", 65000), origin("10.0.0.0/16", 65001));
    }

    #[test]
    fn asn_from_str() {
        assert_eq!(Asn::from_str("65000").unwrap(), Asn::from_u32(65000));
        assert_eq!(Asn::from_str("AS65000").unwrap(), Asn::from_u32(65000));
        assert_eq!(Asn::from_str("as65000").unwrap(), Asn::from_u32(65000));
        assert!(Asn::from_str("ASN65000").is_err());
        assert_eq!(Asn::from_u32(65000).to_string(), "AS65000");
    }

    #[test]
    fn v4_sorts_before_v6() {
        let v4 = Prefix::from_str("192.0.2.0/24").unwrap();
        let v6 = Prefix::from_str("2001:db8::/32").unwrap();
        assert!(v4 < v6);
    }
}
