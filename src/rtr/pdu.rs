//! Raw protocol data.
//!
//! This module contains types that represent the protocol data units of
//! RTR in protocol version 0 as specified in draft-ietf-sidr-rpki-rtr.
//! Every PDU starts with an eight octet header carrying the protocol
//! version, the PDU type, a sixteen bit field whose meaning depends on
//! the PDU type, and the total length including the header. All
//! multi-octet integers are big-endian.
//!
//! Encoding always produces the exact wire representation. Decoding
//! never fails with an error in the usual sense; anything that cannot
//! be turned into a PDU becomes a [`BadData`] value carrying the error
//! code to answer with and the offending bytes.

use std::{fmt, io};
use std::marker::Unpin;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt
};
use crate::payload::{Asn, RouteOrigin};
use super::state::{Serial, State};


/// The protocol version this codec speaks.
pub const PROTOCOL_VERSION: u8 = 0;

/// The length of the common PDU header.
const HEADER_LEN: usize = 8;

/// The largest PDU we are prepared to read from a socket.
///
/// Only error report PDUs have a variable length and even a generous
/// error text stays far below this.
const MAX_PDU_LEN: u32 = 0x1_0000;

/// The flags value marking a prefix announcement.
const FLAG_ANNOUNCE: u8 = 1;


//------------ Macro for Common Impls ----------------------------------------

macro_rules! common {
    ( $type:ident ) => {
        impl $type {
            /// Encodes the PDU into its exact wire representation.
            pub fn encode(&self) -> Bytes {
                let mut target = BytesMut::with_capacity(
                    self.size() as usize
                );
                self.push(&mut target);
                target.freeze()
            }

            /// Writes the PDU to a writer.
            pub async fn write<A: AsyncWrite + Unpin>(
                &self, a: &mut A
            ) -> Result<(), io::Error> {
                a.write_all(self.encode().as_ref()).await
            }
        }

        impl From<$type> for Pdu {
            fn from(pdu: $type) -> Self {
                Pdu::$type(pdu)
            }
        }
    }
}

/// Appends the common header to `target`.
fn push_header(
    target: &mut BytesMut, pdu: u8, header_short: u16, length: u32
) {
    target.put_u8(PROTOCOL_VERSION);
    target.put_u8(pdu);
    target.put_u16(header_short);
    target.put_u32(length);
}


//------------ ResetQuery ----------------------------------------------------

/// A reset query requests the complete current set of data.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResetQuery;

impl ResetQuery {
    /// The PDU type of a reset query.
    pub const PDU: u8 = 2;

    /// Creates a new reset query.
    pub fn new() -> Self {
        ResetQuery
    }

    /// Returns the PDU size.
    pub fn size(self) -> u32 {
        8
    }

    fn push(self, target: &mut BytesMut) {
        push_header(target, Self::PDU, 0, self.size())
    }
}

common!(ResetQuery);


//------------ CacheResponse -------------------------------------------------

/// The cache response starts a sequence of payload PDUs with data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CacheResponse {
    /// The nonce of the session the data belongs to.
    nonce: u16,
}

impl CacheResponse {
    /// The PDU type of a cache response.
    pub const PDU: u8 = 3;

    /// Creates a new cache response with the given nonce.
    pub fn new(nonce: u16) -> Self {
        CacheResponse { nonce }
    }

    /// Creates a cache response for the given session state.
    pub fn from_state(state: State) -> Self {
        Self::new(state.nonce())
    }

    /// Returns the session nonce.
    pub fn nonce(self) -> u16 {
        self.nonce
    }

    /// Returns the PDU size.
    pub fn size(self) -> u32 {
        8
    }

    fn push(self, target: &mut BytesMut) {
        push_header(target, Self::PDU, self.nonce, self.size())
    }
}

common!(CacheResponse);


//------------ Ipv4Prefix ----------------------------------------------------

/// The payload PDU for a route origin authorisation in IPv4.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv4Prefix {
    flags: u8,
    prefix_len: u8,
    max_len: u8,
    prefix: Ipv4Addr,
    asn: Asn,
}

impl Ipv4Prefix {
    /// The PDU type of an IPv4 prefix.
    pub const PDU: u8 = 4;

    /// Creates a new IPv4 prefix from all the various fields.
    pub fn new(
        flags: u8,
        prefix_len: u8,
        max_len: u8,
        prefix: Ipv4Addr,
        asn: Asn,
    ) -> Self {
        Ipv4Prefix { flags, prefix_len, max_len, prefix, asn }
    }

    /// Returns the flags field of the prefix.
    ///
    /// The only flag currently used is the least significant bit that
    /// is 1 for an announcement and 0 for a withdrawal.
    pub fn flags(self) -> u8 {
        self.flags
    }

    /// Returns the prefix length.
    pub fn prefix_len(self) -> u8 {
        self.prefix_len
    }

    /// Returns the max length.
    pub fn max_len(self) -> u8 {
        self.max_len
    }

    /// Returns the prefix as an IPv4 address.
    pub fn prefix(self) -> Ipv4Addr {
        self.prefix
    }

    /// Returns the autonomous system number.
    pub fn asn(self) -> Asn {
        self.asn
    }

    /// Returns the PDU size.
    pub fn size(self) -> u32 {
        20
    }

    fn push(self, target: &mut BytesMut) {
        push_header(target, Self::PDU, 0, self.size());
        target.put_u8(self.flags);
        target.put_u8(self.prefix_len);
        target.put_u8(self.max_len);
        target.put_u8(0);
        target.put_u32(self.prefix.into());
        target.put_u32(self.asn.into_u32());
    }
}

common!(Ipv4Prefix);


//------------ Ipv6Prefix ----------------------------------------------------

/// The payload PDU for a route origin authorisation in IPv6.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv6Prefix {
    flags: u8,
    prefix_len: u8,
    max_len: u8,
    prefix: Ipv6Addr,
    asn: Asn,
}

impl Ipv6Prefix {
    /// The PDU type of an IPv6 prefix.
    pub const PDU: u8 = 6;

    /// Creates a new IPv6 prefix from all the various fields.
    pub fn new(
        flags: u8,
        prefix_len: u8,
        max_len: u8,
        prefix: Ipv6Addr,
        asn: Asn,
    ) -> Self {
        Ipv6Prefix { flags, prefix_len, max_len, prefix, asn }
    }

    /// Returns the flags field of the prefix.
    pub fn flags(self) -> u8 {
        self.flags
    }

    /// Returns the prefix length.
    pub fn prefix_len(self) -> u8 {
        self.prefix_len
    }

    /// Returns the max length.
    pub fn max_len(self) -> u8 {
        self.max_len
    }

    /// Returns the prefix as an IPv6 address.
    pub fn prefix(self) -> Ipv6Addr {
        self.prefix
    }

    /// Returns the autonomous system number.
    pub fn asn(self) -> Asn {
        self.asn
    }

    /// Returns the PDU size.
    pub fn size(self) -> u32 {
        32
    }

    fn push(self, target: &mut BytesMut) {
        push_header(target, Self::PDU, 0, self.size());
        target.put_u8(self.flags);
        target.put_u8(self.prefix_len);
        target.put_u8(self.max_len);
        target.put_u8(0);
        target.put_u128(self.prefix.into());
        target.put_u32(self.asn.into_u32());
    }
}

common!(Ipv6Prefix);


//------------ EndOfData -----------------------------------------------------

/// End-of-data marks the end of a sequence of payload PDUs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EndOfData {
    /// The nonce of the session the data belongs to.
    nonce: u16,

    /// The serial number of the data version just transferred.
    serial: Serial,
}

impl EndOfData {
    /// The PDU type of the end-of-data PDU.
    pub const PDU: u8 = 7;

    /// Creates a new end-of-data PDU.
    pub fn new(nonce: u16, serial: Serial) -> Self {
        EndOfData { nonce, serial }
    }

    /// Creates an end-of-data PDU for the given session state.
    pub fn from_state(state: State) -> Self {
        Self::new(state.nonce(), state.serial())
    }

    /// Returns the session nonce.
    pub fn nonce(self) -> u16 {
        self.nonce
    }

    /// Returns the serial number.
    pub fn serial(self) -> Serial {
        self.serial
    }

    /// Returns the PDU size.
    pub fn size(self) -> u32 {
        12
    }

    fn push(self, target: &mut BytesMut) {
        push_header(target, Self::PDU, self.nonce, self.size());
        target.put_u32(self.serial.into());
    }
}

common!(EndOfData);


//------------ ErrorReport ---------------------------------------------------

/// An error report tells the other side why its input was unacceptable.
///
/// The report carries the PDU that caused the error, if any, and an
/// optional UTF-8 error text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorReport {
    /// The error code, carried in the header's sixteen bit field.
    error_code: ErrorCode,

    /// The bytes of the PDU that caused the error.
    causing_pdu: Bytes,

    /// The error text.
    text: String,
}

impl ErrorReport {
    /// The PDU type of an error report.
    pub const PDU: u8 = 10;

    /// Creates a new error report.
    ///
    /// # Panics
    ///
    /// The function panics if the length of the resulting PDU does not
    /// fit in a `u32`.
    pub fn new(
        error_code: ErrorCode, causing_pdu: Bytes, text: String
    ) -> Self {
        let res = ErrorReport { error_code, causing_pdu, text };
        let _ = res.size();
        res
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    /// Returns the bytes of the PDU that caused the error.
    pub fn causing_pdu(&self) -> &Bytes {
        &self.causing_pdu
    }

    /// Returns the error text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the PDU size.
    pub fn size(&self) -> u32 {
        u32::try_from(
            HEADER_LEN + 4 + self.causing_pdu.len()
                + 4 + self.text.len()
        ).expect("error report PDU size overflow")
    }

    fn push(&self, target: &mut BytesMut) {
        push_header(
            target, Self::PDU, self.error_code.into(), self.size()
        );
        target.put_u32(self.causing_pdu.len() as u32);
        target.put_slice(&self.causing_pdu);
        target.put_u32(self.text.len() as u32);
        target.put_slice(self.text.as_bytes());
    }
}

common!(ErrorReport);


//------------ Pdu -----------------------------------------------------------

/// Any of the PDUs of the protocol.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Pdu {
    ResetQuery(ResetQuery),
    CacheResponse(CacheResponse),
    Ipv4Prefix(Ipv4Prefix),
    Ipv6Prefix(Ipv6Prefix),
    EndOfData(EndOfData),
    ErrorReport(ErrorReport),
}

impl Pdu {
    /// Creates the announcement PDU for a single route origin.
    ///
    /// Returns an IPv4 or IPv6 prefix PDU depending on the address
    /// family of the origin's prefix.
    pub fn announce(origin: &RouteOrigin) -> Self {
        match origin.prefix.addr() {
            IpAddr::V4(addr) => {
                Pdu::Ipv4Prefix(Ipv4Prefix::new(
                    FLAG_ANNOUNCE,
                    origin.prefix.prefix_len(),
                    origin.prefix.resolved_max_len(),
                    addr,
                    origin.asn,
                ))
            }
            IpAddr::V6(addr) => {
                Pdu::Ipv6Prefix(Ipv6Prefix::new(
                    FLAG_ANNOUNCE,
                    origin.prefix.prefix_len(),
                    origin.prefix.resolved_max_len(),
                    addr,
                    origin.asn,
                ))
            }
        }
    }

    /// Returns the PDU size.
    pub fn size(&self) -> u32 {
        match *self {
            Pdu::ResetQuery(pdu) => pdu.size(),
            Pdu::CacheResponse(pdu) => pdu.size(),
            Pdu::Ipv4Prefix(pdu) => pdu.size(),
            Pdu::Ipv6Prefix(pdu) => pdu.size(),
            Pdu::EndOfData(pdu) => pdu.size(),
            Pdu::ErrorReport(ref pdu) => pdu.size(),
        }
    }

    /// Encodes the PDU into its exact wire representation.
    pub fn encode(&self) -> Bytes {
        match *self {
            Pdu::ResetQuery(pdu) => pdu.encode(),
            Pdu::CacheResponse(pdu) => pdu.encode(),
            Pdu::Ipv4Prefix(pdu) => pdu.encode(),
            Pdu::Ipv6Prefix(pdu) => pdu.encode(),
            Pdu::EndOfData(pdu) => pdu.encode(),
            Pdu::ErrorReport(ref pdu) => pdu.encode(),
        }
    }

    /// Writes the PDU to a writer.
    pub async fn write<A: AsyncWrite + Unpin>(
        &self, a: &mut A
    ) -> Result<(), io::Error> {
        a.write_all(self.encode().as_ref()).await
    }

    /// Decodes a PDU from the byte buffer of exactly one PDU.
    ///
    /// Anything unacceptable is returned as a [`BadData`] carrying the
    /// error code to answer with and the offending bytes.
    pub fn decode(bytes: Bytes) -> Result<Self, BadData> {
        let mut buf = bytes.clone();
        let err = |code| Err(BadData::new(code, bytes.clone()));

        if buf.remaining() < HEADER_LEN {
            return err(ErrorCode::CORRUPT_DATA)
        }
        let version = buf.get_u8();
        if version != PROTOCOL_VERSION {
            return err(ErrorCode::UNSUPPORTED_PROTOCOL_VERSION)
        }
        let pdu_type = buf.get_u8();
        let header_short = buf.get_u16();
        let length = buf.get_u32();
        if length as usize != bytes.len() {
            return err(ErrorCode::CORRUPT_DATA)
        }

        match pdu_type {
            ResetQuery::PDU => {
                if buf.has_remaining() {
                    return err(ErrorCode::CORRUPT_DATA)
                }
                Ok(Pdu::ResetQuery(ResetQuery))
            }
            CacheResponse::PDU => {
                if buf.has_remaining() {
                    return err(ErrorCode::CORRUPT_DATA)
                }
                Ok(Pdu::CacheResponse(CacheResponse::new(header_short)))
            }
            Ipv4Prefix::PDU => {
                if buf.remaining() != 12 {
                    return err(ErrorCode::CORRUPT_DATA)
                }
                let flags = buf.get_u8();
                if flags != FLAG_ANNOUNCE {
                    // Withdrawals only make sense in incremental
                    // updates which this cache never sends or takes.
                    return err(ErrorCode::UNSUPPORTED_PDU_TYPE)
                }
                let prefix_len = buf.get_u8();
                let max_len = buf.get_u8();
                buf.advance(1);
                let prefix = Ipv4Addr::from(buf.get_u32());
                let asn = Asn::from_u32(buf.get_u32());
                Ok(Pdu::Ipv4Prefix(Ipv4Prefix::new(
                    flags, prefix_len, max_len, prefix, asn
                )))
            }
            Ipv6Prefix::PDU => {
                if buf.remaining() != 24 {
                    return err(ErrorCode::CORRUPT_DATA)
                }
                let flags = buf.get_u8();
                if flags != FLAG_ANNOUNCE {
                    return err(ErrorCode::UNSUPPORTED_PDU_TYPE)
                }
                let prefix_len = buf.get_u8();
                let max_len = buf.get_u8();
                buf.advance(1);
                let prefix = Ipv6Addr::from(buf.get_u128());
                let asn = Asn::from_u32(buf.get_u32());
                Ok(Pdu::Ipv6Prefix(Ipv6Prefix::new(
                    flags, prefix_len, max_len, prefix, asn
                )))
            }
            EndOfData::PDU => {
                if buf.remaining() != 4 {
                    return err(ErrorCode::CORRUPT_DATA)
                }
                let serial = Serial(buf.get_u32());
                Ok(Pdu::EndOfData(EndOfData::new(header_short, serial)))
            }
            ErrorReport::PDU => {
                if buf.remaining() < 4 {
                    return err(ErrorCode::CORRUPT_DATA)
                }
                let causing_len = buf.get_u32() as usize;
                if buf.remaining() < causing_len {
                    return err(ErrorCode::CORRUPT_DATA)
                }
                let causing_pdu = buf.copy_to_bytes(causing_len);
                if buf.remaining() < 4 {
                    return err(ErrorCode::CORRUPT_DATA)
                }
                let text_len = buf.get_u32() as usize;
                if buf.remaining() != text_len {
                    return err(ErrorCode::CORRUPT_DATA)
                }
                let text = match String::from_utf8(
                    buf.copy_to_bytes(text_len).to_vec()
                ) {
                    Ok(text) => text,
                    Err(_) => return err(ErrorCode::CORRUPT_DATA)
                };
                Ok(Pdu::ErrorReport(ErrorReport::new(
                    ErrorCode::from(header_short), causing_pdu, text
                )))
            }
            _ => err(ErrorCode::UNSUPPORTED_PDU_TYPE)
        }
    }

    /// Reads a single PDU from a reader.
    ///
    /// The outer result reports I/O trouble including a clean shutdown
    /// of the socket. The inner result carries the decoding verdict.
    pub async fn read<Sock: AsyncRead + Unpin>(
        sock: &mut Sock
    ) -> Result<Result<Self, BadData>, io::Error> {
        let mut header = [0u8; HEADER_LEN];
        sock.read_exact(&mut header).await?;
        let length = u32::from_be_bytes(
            header[4..8].try_into().expect("header slice length")
        );
        if length < HEADER_LEN as u32 || length > MAX_PDU_LEN {
            return Ok(Err(BadData::new(
                ErrorCode::CORRUPT_DATA,
                Bytes::copy_from_slice(&header),
            )))
        }
        let mut bytes = BytesMut::with_capacity(length as usize);
        bytes.extend_from_slice(&header);
        bytes.resize(length as usize, 0);
        sock.read_exact(&mut bytes[HEADER_LEN..]).await?;
        Ok(Self::decode(bytes.freeze()))
    }
}


//------------ ErrorCode -----------------------------------------------------

/// The error code of an error report PDU.
///
/// The type is a thin wrapper around the raw sixteen bit value so that
/// codes from newer protocol revisions survive a decode unharmed. The
/// known codes are associated constants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ErrorCode(u16);

impl ErrorCode {
    pub const CORRUPT_DATA: Self = ErrorCode(0);
    pub const INTERNAL_ERROR: Self = ErrorCode(1);
    pub const NO_DATA_AVAILABLE: Self = ErrorCode(2);
    pub const INVALID_REQUEST: Self = ErrorCode(3);
    pub const UNSUPPORTED_PROTOCOL_VERSION: Self = ErrorCode(4);
    pub const UNSUPPORTED_PDU_TYPE: Self = ErrorCode(5);
    pub const WITHDRAWAL_OF_UNKNOWN_RECORD: Self = ErrorCode(6);
    pub const DUPLICATE_ANNOUNCEMENT_RECEIVED: Self = ErrorCode(7);

    /// Returns whether the error ends the session.
    ///
    /// Every error except "no data available" is fatal. Unknown codes
    /// count as fatal, too.
    pub fn is_fatal(self) -> bool {
        self != Self::NO_DATA_AVAILABLE
    }
}

impl From<u16> for ErrorCode {
    fn from(value: u16) -> Self {
        ErrorCode(value)
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::CORRUPT_DATA => f.write_str("corrupt data"),
            Self::INTERNAL_ERROR => f.write_str("internal error"),
            Self::NO_DATA_AVAILABLE => f.write_str("no data available"),
            Self::INVALID_REQUEST => f.write_str("invalid request"),
            Self::UNSUPPORTED_PROTOCOL_VERSION => {
                f.write_str("unsupported protocol version")
            }
            Self::UNSUPPORTED_PDU_TYPE => {
                f.write_str("unsupported PDU type")
            }
            Self::WITHDRAWAL_OF_UNKNOWN_RECORD => {
                f.write_str("withdrawal of unknown record")
            }
            Self::DUPLICATE_ANNOUNCEMENT_RECEIVED => {
                f.write_str("duplicate announcement received")
            }
            ErrorCode(value) => write!(f, "error code {}", value),
        }
    }
}


//------------ BadData -------------------------------------------------------

/// Bytes that could not be decoded into a PDU.
///
/// Callers answer with the error report produced by [`to_error`] and,
/// if the code is fatal, drop the session.
///
/// [`to_error`]: Self::to_error
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BadData {
    error_code: ErrorCode,
    bytes: Bytes,
}

impl BadData {
    /// Creates a new value from an error code and the offending bytes.
    pub fn new(error_code: ErrorCode, bytes: Bytes) -> Self {
        BadData { error_code, bytes }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    /// Returns the offending bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Returns the error report PDU answering the bad data.
    pub fn to_error(&self) -> ErrorReport {
        ErrorReport::new(
            self.error_code, self.bytes.clone(), String::new()
        )
    }
}

impl fmt::Display for BadData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} in a {} octet PDU", self.error_code,
               self.bytes.len())
    }
}

impl std::error::Error for BadData { }


//============ Testing =======================================================
