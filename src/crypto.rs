//! Key identifiers and content digests.
//!
//! Validation needs two fixed-width byte strings over and over: the SHA-1
//! key identifiers that link a child object to its issuing certificate
//! (SKI and AKI) and the SHA-256 digests over raw object content that
//! manifests declare for the files of a publication point. Both are
//! defined here. The actual hashing happens in the external crypto
//! library; these types only carry the results around.

use std::fmt;
use std::convert::TryFrom;
use std::str::FromStr;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};


//------------ KeyIdentifier -------------------------------------------------

/// A key identifier.
///
/// This is the SHA-1 hash over the public key's bits. The identifier of
/// the subject key of a CA certificate doubles as the lookup key for all
/// objects issued by that CA and, in its hexadecimal text form, as the
/// log tag and cycle key of the validation walk.
#[derive(Clone, Copy, Eq, Hash)]
pub struct KeyIdentifier([u8; 20]);

impl KeyIdentifier {
    /// Returns an octet slice of the key identifier's value.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Returns the hex representation as an owned string.
    ///
    /// The digits are upper case. This is the canonical text form used
    /// wherever a key identifier appears in check parameters or log
    /// output.
    pub fn to_hex_string(self) -> String {
        self.to_string()
    }
}


//--- TryFrom and FromStr

impl TryFrom<&'_ [u8]> for KeyIdentifier {
    type Error = RepresentationError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        value.try_into().map(KeyIdentifier).map_err(
            |_| RepresentationError
        )
    }
}

impl From<[u8; 20]> for KeyIdentifier {
    fn from(value: [u8; 20]) -> Self {
        KeyIdentifier(value)
    }
}

impl FromStr for KeyIdentifier {
    type Err = RepresentationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let octets = ::hex::decode(value).map_err(
            |_| RepresentationError
        )?;
        Self::try_from(octets.as_slice())
    }
}


//--- AsRef and PartialEq

impl AsRef<[u8]> for KeyIdentifier {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<T: AsRef<[u8]>> PartialEq<T> for KeyIdentifier {
    fn eq(&self, other: &T) -> bool {
        self.0.as_ref().eq(other.as_ref())
    }
}


//--- Display and Debug

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for octet in self.as_slice() {
            write!(f, "{:02X}", octet)?;
        }
        Ok(())
    }
}

impl fmt::Debug for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KeyIdentifier({})", self)
    }
}


//--- Serialize and Deserialize

impl Serialize for KeyIdentifier {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex_string())
    }
}

impl<'de> Deserialize<'de> for KeyIdentifier {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D
    ) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}


//------------ ObjectDigest --------------------------------------------------

/// The SHA-256 digest over the raw content of a repository object.
///
/// Manifests declare one of these for every file of a publication point,
/// and the store keeps the digest of every object it holds. Comparing the
/// two is how the cross-checker decides whether a stored object is the
/// one the manifest meant.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct ObjectDigest([u8; 32]);

impl ObjectDigest {
    /// Returns an octet slice of the digest value.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Creates a digest value from wire bytes.
    ///
    /// Returns an error unless `bytes` is exactly 32 octets long.
    pub fn from_bytes(bytes: &Bytes) -> Result<Self, RepresentationError> {
        Self::try_from(bytes.as_ref())
    }
}


//--- TryFrom and From

impl TryFrom<&'_ [u8]> for ObjectDigest {
    type Error = RepresentationError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        value.try_into().map(ObjectDigest).map_err(
            |_| RepresentationError
        )
    }
}

impl From<[u8; 32]> for ObjectDigest {
    fn from(value: [u8; 32]) -> Self {
        ObjectDigest(value)
    }
}


//--- AsRef

impl AsRef<[u8]> for ObjectDigest {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}


//--- Display and Debug

impl fmt::Display for ObjectDigest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for octet in self.as_slice() {
            write!(f, "{:02X}", octet)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectDigest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectDigest({})", self)
    }
}


//--- Serialize

impl Serialize for ObjectDigest {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}


//------------ RepresentationError -------------------------------------------

/// A byte sequence of the wrong length was presented.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RepresentationError;

impl fmt::Display for RepresentationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid length for fixed-width value")
    }
}

impl std::error::Error for RepresentationError { }


//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    fn ski(fill: u8) -> KeyIdentifier {
        KeyIdentifier::from([fill; 20])
    }

    #[test]
    fn hex_is_upper_case() {
        assert_eq!(
            ski(0xab).to_hex_string(),
            "AB".repeat(20)
        );
    }

    #[test]
    fn from_str_round_trip() {
        let id = ski(0x3c);
        assert_eq!(
            KeyIdentifier::from_str(&id.to_hex_string()).unwrap(), id
        );
        // Lower case input is accepted, output stays canonical.
        assert_eq!(
            KeyIdentifier::from_str(&"3c".repeat(20)).unwrap(), id
        );
        assert!(KeyIdentifier::from_str("3c3c").is_err());
        assert!(KeyIdentifier::from_str("not hex at all").is_err());
    }

    #[test]
    fn digest_length() {
        assert!(ObjectDigest::try_from([0u8; 32].as_ref()).is_ok());
        assert!(ObjectDigest::try_from([0u8; 20].as_ref()).is_err());
    }
}
