/*
 * socket.rs
 *
 * Copyright (C) 2024 Posit Software, PBC. All rights reserved.
 *
 */

use uuid::Uuid;

use crate::error::Error;
use crate::session::Session;

/// Represents a socket that sends and receives messages that are optionally
/// signed with a SHA-256 HMAC.
pub struct Socket {
    /// The session information associated with the socket, including the
    /// session ID and HMAC signing key
    pub session: Session,

    /// The name of the socket; used only to give context to debugging/trace
    /// messages
    pub name: String,

    /// A ZeroMQ socket over which signed messages are to be sent/received
    socket: zmq::Socket,
}

impl Socket {
    /// Create a new Socket instance from a session and a ZeroMQ context.
    ///
    /// The socket kind decides which side of the conversation this is: the
    /// connect-side kinds (DEALER, SUB) are used by the sidecar itself, and
    /// the bind-side kinds (ROUTER, XPUB, REP) by test fixtures standing in
    /// for a kernel.
    pub fn new(
        session: Session,
        ctx: zmq::Context,
        name: String,
        kind: zmq::SocketType,
        identity: Option<&[u8]>,
        endpoint: String,
        max_message_size: Option<i64>,
    ) -> Result<Self, Error> {
        let socket = match ctx.socket(kind) {
            Ok(s) => s,
            Err(err) => return Err(Error::CreateSocketFailed(name, err)),
        };

        if let Some(identity) = identity {
            if let Err(err) = socket.set_identity(identity) {
                return Err(Error::CreateSocketFailed(name, err));
            }
        }

        // An inbound frame larger than this limit causes ZeroMQ to close the
        // peer connection; the channel watcher relies on the resulting
        // disconnect event to cycle the socket.
        if let Some(limit) = max_message_size {
            if let Err(err) = socket.set_maxmsgsize(limit) {
                return Err(Error::CreateSocketFailed(name, err));
            }
        }

        if kind == zmq::SocketType::XPUB {
            // Report subscription events even for topics that already have
            // a subscriber. Without this, a re-subscription racing the
            // teardown of a dead connection can go unreported.
            if let Err(err) = socket.set_xpub_verbose(true) {
                return Err(Error::CreateSocketFailed(name, err));
            }
        }

        if kind == zmq::SocketType::SUB {
            // Subscribe to all message types. It is important to subscribe
            // BEFORE we `connect()`: if the publisher processes our connect
            // before the subscription is registered, early messages are
            // silently dropped.
            if let Err(err) = socket.set_subscribe(b"") {
                return Err(Error::CreateSocketFailed(name, err));
            }
        }

        // One side of a socket must `bind()` to its endpoint, and the other
        // side must `connect()` to the same endpoint.
        match kind {
            zmq::SocketType::ROUTER | zmq::SocketType::XPUB | zmq::SocketType::REP => {
                log::trace!("Binding to ZeroMQ '{}' socket at {}", name, endpoint);
                if let Err(err) = socket.bind(&endpoint) {
                    return Err(Error::SocketBindError(name, endpoint, err));
                }
            },
            zmq::SocketType::DEALER | zmq::SocketType::SUB | zmq::SocketType::REQ => {
                log::trace!("Connecting to ZeroMQ '{}' socket at {}", name, endpoint);
                if let Err(err) = socket.connect(&endpoint) {
                    return Err(Error::SocketConnectError(name, endpoint, err));
                }
            },
            _ => return Err(Error::UnsupportedSocketType(kind)),
        }

        Ok(Self {
            socket,
            session,
            name,
        })
    }

    /// Set up a monitor for connection events on this socket and return the
    /// PAIR socket on which the events are delivered. Must be called before
    /// the socket starts exchanging messages.
    pub fn monitor(&self, ctx: &zmq::Context) -> Result<zmq::Socket, Error> {
        let endpoint = format!("inproc://monitor-{}-{}", self.name, Uuid::new_v4());
        self.socket
            .monitor(&endpoint, zmq::SocketEvent::ALL as i32)
            .map_err(|err| Error::SocketMonitorError(self.name.clone(), err))?;
        let pair = ctx
            .socket(zmq::PAIR)
            .map_err(|err| Error::SocketMonitorError(self.name.clone(), err))?;
        pair.connect(&endpoint)
            .map_err(|err| Error::SocketMonitorError(self.name.clone(), err))?;
        Ok(pair)
    }

    /// The local port the socket is bound to; used by fixtures that bind to
    /// port 0 and need to advertise the actual port.
    pub fn port(&self) -> Result<u16, Error> {
        let endpoint = match self.socket.get_last_endpoint() {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) | Err(_) => {
                return Err(Error::ZmqError(
                    self.name.clone(),
                    zmq::Error::EINVAL,
                ))
            },
        };
        match endpoint.rsplit(':').next().and_then(|p| p.parse().ok()) {
            Some(port) => Ok(port),
            None => Err(Error::ZmqError(self.name.clone(), zmq::Error::EINVAL)),
        }
    }

    /// Receive a multi-part message from the socket.
    ///
    /// **Note**: This will block until a message is delivered on the socket.
    pub fn recv_multipart(&self) -> Result<Vec<Vec<u8>>, Error> {
        match self.socket.recv_multipart(0) {
            Ok(data) => Ok(data),
            Err(err) => Err(Error::ZmqError(self.name.clone(), err)),
        }
    }

    /// Send a multi-part message on the socket.
    pub fn send_multipart(&self, data: &Vec<Vec<u8>>) -> Result<(), Error> {
        match self.socket.send_multipart(data, 0) {
            Ok(data) => Ok(data),
            Err(err) => Err(Error::ZmqError(self.name.clone(), err)),
        }
    }

    pub fn poll_incoming(&self, timeout_ms: i64) -> zmq::Result<bool> {
        Ok(self.socket.poll(zmq::PollEvents::POLLIN, timeout_ms)? != 0)
    }

    pub fn has_incoming_data(&self) -> zmq::Result<bool> {
        self.poll_incoming(0)
    }
}
