//! The RTR server.
//!
//! This module implements a generic RTR server through [`Server`]. The
//! server receives its data from a type implementing [`VrpSource`] and
//! speaks the reset-query exchange of protocol version 0: a router asks
//! for the complete data set and receives a cache response, one prefix
//! PDU per route origin, and an end-of-data marker.
//!
//! Unacceptable input is answered with an error report PDU. If its code
//! is fatal, the connection is dropped.

use std::io;
use std::marker::Unpin;
use bytes::Bytes;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::spawn;
use tokio_stream::{Stream, StreamExt};
use crate::payload::RouteOrigin;
use super::pdu::{CacheResponse, EndOfData, ErrorCode, ErrorReport, Pdu};
use super::state::State;


//============ Traits ========================================================

//------------ VrpSource -----------------------------------------------------

/// A source of route origins for an RTR server.
///
/// The server asks for the session state and the full origin set
/// whenever a router sends a reset query. It never asks unless
/// [`ready`] returns `true`, which allows the source to finish its
/// initial validation first.
///
/// [`ready`]: Self::ready
pub trait VrpSource: Clone + Sync + Send + 'static {
    /// Returns whether the source is ready to serve data.
    fn ready(&self) -> bool;

    /// Returns the current state and the full set of route origins.
    fn full(&self) -> (State, Vec<RouteOrigin>);
}


//------------ Socket --------------------------------------------------------

/// A stream socket to be used for an RTR connection.
///
/// Apart from being able to read and write asynchronously and being
/// spawned as an async task, the trait allows additional processing
/// when a client has been successfully updated.
pub trait Socket: AsyncRead + AsyncWrite + Unpin + Sync + Send + 'static {
    /// The client has been successfully updated to the given state.
    fn update(&self, state: State) {
        let _ = state;
    }
}

impl Socket for tokio::net::TcpStream { }


//============ Server ========================================================

//------------ Server --------------------------------------------------------

/// An RTR server.
///
/// The server takes a stream socket listener, i.e. a stream of new
/// sockets, and a VRP source and serves RTR data. Each accepted socket
/// is handled on its own task.
pub struct Server<Listener, Source> {
    /// The listener socket.
    listener: Listener,

    /// The source of route origins.
    source: Source,
}

impl<Listener, Source> Server<Listener, Source> {
    /// Creates a new RTR server from its components.
    pub fn new(listener: Listener, source: Source) -> Self {
        Server { listener, source }
    }

    /// Runs the server.
    ///
    /// The asynchronous function will return successfully when the
    /// listener socket (which is a stream over new connections)
    /// finishes. It will return with an error if the listener socket
    /// errors out.
    pub async fn run<Sock>(mut self) -> Result<(), io::Error>
    where
        Listener: Stream<Item = Result<Sock, io::Error>> + Unpin,
        Sock: Socket,
        Source: VrpSource,
    {
        while let Some(sock) = self.listener.next().await {
            let connection = Connection::new(sock?, self.source.clone());
            let _ = spawn(connection.run());
        }
        Ok(())
    }
}


//------------ Connection ----------------------------------------------------

/// A single RTR connection.
struct Connection<Sock, Source> {
    /// The socket to run the connection on.
    sock: Sock,

    /// The source of route origins.
    source: Source,
}

impl<Sock: Socket, Source: VrpSource> Connection<Sock, Source> {
    /// Creates a connection from a socket and a source.
    fn new(sock: Sock, source: Source) -> Self {
        Connection { sock, source }
    }

    /// Runs the connection until the router goes away or errs out.
    async fn run(mut self) -> Result<(), io::Error> {
        loop {
            let pdu = match Pdu::read(&mut self.sock).await? {
                Ok(pdu) => pdu,
                Err(bad) => {
                    debug!("RTR connection: {}", bad);
                    bad.to_error().write(&mut self.sock).await?;
                    if bad.error_code().is_fatal() {
                        return Ok(())
                    }
                    continue
                }
            };
            match pdu {
                Pdu::ResetQuery(_) => {
                    self.reset().await?;
                }
                other => {
                    // A router has no business sending anything else
                    // in this serving model.
                    debug!(
                        "RTR connection: unexpected PDU, dropping"
                    );
                    ErrorReport::new(
                        ErrorCode::INVALID_REQUEST,
                        other.encode(),
                        String::new(),
                    ).write(&mut self.sock).await?;
                    return Ok(())
                }
            }
        }
    }

    /// Answers a reset query with the full data set.
    async fn reset(&mut self) -> Result<(), io::Error> {
        if !self.source.ready() {
            return ErrorReport::new(
                ErrorCode::NO_DATA_AVAILABLE,
                Bytes::new(),
                String::new(),
            ).write(&mut self.sock).await
        }
        let (state, origins) = self.source.full();
        debug!(
            "RTR connection: serving {} origins at serial {}",
            origins.len(), state.serial()
        );
        CacheResponse::from_state(state).write(&mut self.sock).await?;
        for origin in &origins {
            Pdu::announce(origin).write(&mut self.sock).await?;
        }
        EndOfData::from_state(state).write(&mut self.sock).await?;
        self.sock.update(state);
        Ok(())
    }
}


//============ Testing =======================================================

#[cfg(test)]
mod test {
    use std::str::FromStr;
    use crate::payload::{Asn, MaxLenPrefix};
    use crate::rtr::pdu::ResetQuery;
    use crate::rtr::state::Serial;
    use super::*;

    impl Socket for tokio::io::DuplexStream { }

    #[derive(Clone)]
    struct TestSource {
        ready: bool,
        origins: Vec<RouteOrigin>,
    }

    impl VrpSource for TestSource {
        fn ready(&self) -> bool {
            self.ready
        }

        fn full(&self) -> (State, Vec<RouteOrigin>) {
            (
                State::from_parts(0x1234, Serial(41)),
                self.origins.clone()
            )
        }
    }

    fn origin(s: &str, asn: u32) -> RouteOrigin {
        RouteOrigin::new(
            MaxLenPrefix::from_str(s).unwrap(), Asn::from_u32(asn)
        )
    }

    async fn read_pdu(sock: &mut tokio::io::DuplexStream) -> Pdu {
        Pdu::read(sock).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn reset_query_serves_the_full_set() {
        let (server_side, mut client) = tokio::io::duplex(4096);
        let source = TestSource {
            ready: true,
            origins: vec![
                origin("10.0.0.0/16-24", 65000),
                origin("2001:db8::/32", 65001),
            ],
        };
        let server = Server::new(
            tokio_stream::iter(vec![
                Ok::<_, io::Error>(server_side)
            ]),
            source,
        );
        let _ = spawn(server.run());

        Pdu::ResetQuery(ResetQuery::new())
            .write(&mut client).await.unwrap();

        match read_pdu(&mut client).await {
            Pdu::CacheResponse(pdu) => {
                assert_eq!(pdu.nonce(), 0x1234);
            }
            other => panic!("expected cache response, got {:?}", other),
        }
        match read_pdu(&mut client).await {
            Pdu::Ipv4Prefix(pdu) => {
                assert_eq!(pdu.prefix_len(), 16);
                assert_eq!(pdu.max_len(), 24);
                assert_eq!(pdu.asn(), Asn::from_u32(65000));
            }
            other => panic!("expected IPv4 prefix, got {:?}", other),
        }
        match read_pdu(&mut client).await {
            Pdu::Ipv6Prefix(pdu) => {
                assert_eq!(pdu.asn(), Asn::from_u32(65001));
            }
            other => panic!("expected IPv6 prefix, got {:?}", other),
        }
        match read_pdu(&mut client).await {
            Pdu::EndOfData(pdu) => {
                assert_eq!(pdu.nonce(), 0x1234);
                assert_eq!(pdu.serial(), Serial(41));
            }
            other => panic!("expected end of data, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unready_source_answers_no_data_available() {
        let (server_side, mut client) = tokio::io::duplex(4096);
        let server = Server::new(
            tokio_stream::iter(vec![
                Ok::<_, io::Error>(server_side)
            ]),
            TestSource { ready: false, origins: Vec::new() },
        );
        let _ = spawn(server.run());

        Pdu::ResetQuery(ResetQuery::new())
            .write(&mut client).await.unwrap();

        match read_pdu(&mut client).await {
            Pdu::ErrorReport(pdu) => {
                assert_eq!(
                    pdu.error_code(), ErrorCode::NO_DATA_AVAILABLE
                );
                assert!(!pdu.error_code().is_fatal());
            }
            other => panic!("expected error report, got {:?}", other),
        }
    }
}
