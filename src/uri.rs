//! URIs.
//!
//! RPKI objects live at rsync URIs and repositories optionally announce
//! an RRDP notification file at an HTTPS URI. Only these two schemes
//! appear anywhere in validation, so instead of a general URI library
//! there are two dedicated types, [`Rsync`] and [`Https`].
//!
//! Parsing is simplified in that it only checks for the correct structure
//! and that no forbidden characters are present.
//!
//  In particular, forbidden characters are
//
//     SPACE CONTROL " # < > ? [ \\ ] ^ ` { | }
//
use std::{fmt, str};
use std::str::FromStr;
use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize, Serializer};


//------------ Rsync ---------------------------------------------------------

/// An rsync URI.
///
/// This implements a simplified form of the rsync URI defined in RFC 5781
/// which in turn references RFC 3986. Only absolute URIs including an
/// authority and a module are allowed.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Rsync(String);

impl Rsync {
    pub fn from_string(s: String) -> Result<Self, Error> {
        if !is_uri_ascii(s.as_bytes()) {
            return Err(Error::NotAscii)
        }
        let rest = match split_scheme(&s) {
            Some((Scheme::Rsync, rest)) => rest,
            _ => return Err(Error::BadScheme)
        };
        let mut parts = rest.splitn(3, '/');
        let authority = parts.next().ok_or(Error::BadUri)?;
        let module = parts.next().ok_or(Error::BadUri)?;
        let path = parts.next().ok_or(Error::BadUri)?;
        if authority.is_empty() || module.is_empty() {
            return Err(Error::BadUri)
        }
        Self::check_path(path)?;
        Ok(Rsync(s))
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        str::from_utf8(slice)
            .map_err(|_| Error::NotAscii)
            .and_then(|s| Self::from_string(s.into()))
    }

    fn check_path(path: &str) -> Result<(), Error> {
        // Don't allow "." or ".." anywhere. Don't allow empty segments
        // except at the end.
        let mut items = path.split('/');
        loop {
            let item = match items.next() {
                Some(item) => item,
                None => return Ok(())
            };
            if item.is_empty() {
                break
            }
            if item == ".." || item == "." {
                return Err(Error::DotSegments)
            }
        }
        if items.next().is_some() {
            Err(Error::EmptySegments)
        }
        else {
            Ok(())
        }
    }

    /// Returns the URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether the URI ends in a slash.
    pub fn is_directory(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Appends a file name to the URI.
    ///
    /// The name is the kind of relative name a manifest lists, so it must
    /// not contain any slashes. A separating slash is inserted unless the
    /// URI already ends in one.
    ///
    /// # Panics
    ///
    /// The method panics if `name` contains a slash or is not valid
    /// URI content. Manifest entry names must be checked before they
    /// are resolved.
    pub fn join(&self, name: &str) -> Self {
        assert!(is_uri_ascii(name.as_bytes()));
        assert!(!name.contains('/'));
        let mut res = String::with_capacity(
            self.0.len() + name.len() + 1
        );
        res.push_str(&self.0);
        if !self.0.ends_with('/') {
            res.push('/');
        }
        res.push_str(name);
        Rsync(res)
    }

    /// Compares two URIs ignoring ASCII case.
    ///
    /// Some CAs publish the manifest location in the certificate with
    /// different case than the repository uses, so the manifest location
    /// cross-check has to be lenient about case.
    pub fn eq_ignore_case(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}


//--- FromStr

impl FromStr for Rsync {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s.into())
    }
}


//--- AsRef

impl AsRef<str> for Rsync {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}


//--- Display

impl fmt::Display for Rsync {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}


//--- Serialize and Deserialize

impl Serialize for Rsync {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Rsync {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D
    ) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_string(s).map_err(serde::de::Error::custom)
    }
}


//------------ Https ---------------------------------------------------------

/// An HTTPS URI.
///
/// These appear as the RRDP notification URI a certificate may carry in
/// its subject information access extension.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Https(String);

impl Https {
    pub fn from_string(s: String) -> Result<Self, Error> {
        if !is_uri_ascii(s.as_bytes()) {
            return Err(Error::NotAscii)
        }
        let rest = match split_scheme(&s) {
            Some((Scheme::Https, rest)) => rest,
            _ => return Err(Error::BadScheme)
        };
        if rest.split('/').next().map_or(true, str::is_empty) {
            return Err(Error::BadUri)
        }
        Ok(Https(s))
    }

    /// Returns the URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}


//--- FromStr

impl FromStr for Https {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s.into())
    }
}


//--- AsRef

impl AsRef<str> for Https {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}


//--- Display

impl fmt::Display for Https {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}


//--- Serialize and Deserialize

impl Serialize for Https {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Https {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D
    ) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_string(s).map_err(serde::de::Error::custom)
    }
}


//------------ Scheme --------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Scheme {
    Https,
    Rsync,
}

/// Splits the scheme off the start of a URI.
///
/// Returns the scheme and the remainder after the `"://"`. Scheme
/// matching is case-insensitive.
fn split_scheme(s: &str) -> Option<(Scheme, &str)> {
    let (scheme, rest) = s.split_once("://")?;
    if scheme.eq_ignore_ascii_case("rsync") {
        Some((Scheme::Rsync, rest))
    }
    else if scheme.eq_ignore_ascii_case("https") {
        Some((Scheme::Https, rest))
    }
    else {
        None
    }
}

/// Returns whether `slice` contains only allowed URI characters.
pub fn is_uri_ascii(slice: &[u8]) -> bool {
    slice.iter().all(|&ch| {
        ch > b' ' && ch != b'"' && ch != b'#' && ch != b'<' && ch != b'>'
            && ch != b'?' && ch != b'[' && ch != b'\\' && ch != b']'
            && ch != b'^' && ch != b'`' && ch != b'{' && ch != b'|'
            && ch != b'}' && ch < 0x7F
    })
}


//------------ Error ---------------------------------------------------------

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Error {
    #[display(fmt = "invalid characters")]
    NotAscii,

    #[display(fmt = "bad URI")]
    BadUri,

    #[display(fmt = "bad URI scheme")]
    BadScheme,

    #[display(fmt = "dot path segments not allowed")]
    DotSegments,

    #[display(fmt = "empty path segments not allowed")]
    EmptySegments,
}

impl std::error::Error for Error { }


//============ Testing =======================================================
